//! JSON Web Key (JWK) representation of Ed25519 keys and RFC 7638 thumbprints.
//!
//! Ed25519 keys are represented as OKP (Octet Key Pair) JWKs. A private JWK
//! additionally carries the `d` member:
//!
//! ```json
//! {
//!   "kty": "OKP",
//!   "crv": "Ed25519",
//!   "x": "<base64url public key>",
//!   "d": "<base64url private key>"
//! }
//! ```
//!
//! # Thumbprint
//!
//! The key identifier used as `keyid` in signatures is the RFC 7638 thumbprint
//! of the public key:
//!
//! 1. Take the public members `crv`, `kty` and `x` (never `kid` or `d`)
//! 2. Serialize them with lexicographically sorted keys and no whitespace
//! 3. SHA-256 the UTF-8 bytes and base64url-encode the digest without padding
//!
//! The result depends only on the public key bytes.

use base64::Engine as _;
use ed25519_dalek::{SECRET_KEY_LENGTH, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SignerError};

/// OKP key type.
pub const KEY_TYPE_OKP: &str = "OKP";
/// Ed25519 curve name.
pub const CURVE_ED25519: &str = "Ed25519";
/// JOSE algorithm name advertised in key directories.
pub const JOSE_ALG_EDDSA: &str = "EdDSA";

/// JSON Web Key for an Ed25519 key pair or public key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type (`"OKP"`).
    pub kty: String,
    /// Curve (`"Ed25519"`).
    pub crv: String,
    /// Public key (base64url, no padding).
    pub x: String,
    /// Private key (base64url, no padding). Absent on public JWKs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// Key identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended key usage.
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

impl Jwk {
    /// Creates a public JWK from an Ed25519 verifying key.
    ///
    /// # Examples
    ///
    /// ```
    /// use ed25519_dalek::SigningKey;
    /// use web_bot_auth::keys::Jwk;
    ///
    /// let signing_key = SigningKey::from_bytes(&[0u8; 32]);
    /// let jwk = Jwk::from_verifying_key(&signing_key.verifying_key());
    ///
    /// assert_eq!(jwk.kty, "OKP");
    /// assert_eq!(jwk.crv, "Ed25519");
    /// assert!(jwk.d.is_none());
    /// ```
    #[must_use]
    pub fn from_verifying_key(verifying_key: &VerifyingKey) -> Self {
        Self {
            kty: KEY_TYPE_OKP.to_owned(),
            crv: CURVE_ED25519.to_owned(),
            x: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifying_key.as_bytes()),
            d: None,
            kid: None,
            alg: None,
            key_use: None,
        }
    }

    /// Creates a private JWK (with `d`) from an Ed25519 signing key.
    #[must_use]
    pub fn from_signing_key(signing_key: &SigningKey) -> Self {
        Self {
            d: Some(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signing_key.to_bytes())),
            ..Self::from_verifying_key(&signing_key.verifying_key())
        }
    }

    /// Creates the public JWK published in a key directory.
    ///
    /// Sets `kid` to the thumbprint, `alg` to `EdDSA` and `use` to `sig`.
    #[must_use]
    pub fn for_directory(verifying_key: &VerifyingKey) -> Self {
        let jwk = Self::from_verifying_key(verifying_key);
        Self {
            kid: Some(jwk.thumbprint()),
            alg: Some(JOSE_ALG_EDDSA.to_owned()),
            key_use: Some("sig".to_owned()),
            ..jwk
        }
    }

    /// Returns a copy of this JWK without private material.
    #[must_use]
    pub fn public(&self) -> Self {
        Self { d: None, ..self.clone() }
    }

    /// Returns `true` if this JWK carries a private key.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Converts a private JWK into a signing key.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::KeyLoad`] if the key is not an Ed25519 OKP key,
    /// has no `d` member, or if `x` does not match the public half of `d`.
    pub fn to_signing_key(&self) -> Result<SigningKey> {
        self.check_type()?;
        let d = self
            .d
            .as_deref()
            .ok_or_else(|| SignerError::KeyLoad("JWK has no private key member 'd'".to_owned()))?;
        let secret: [u8; SECRET_KEY_LENGTH] = decode_member("d", d)?;
        let signing_key = SigningKey::from_bytes(&secret);

        if Self::from_verifying_key(&signing_key.verifying_key()).x != self.x {
            return Err(SignerError::KeyLoad(
                "JWK public member 'x' does not match private member 'd'".to_owned(),
            ));
        }
        Ok(signing_key)
    }

    /// Converts this JWK into a verifying key.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::KeyLoad`] if the key is not an Ed25519 OKP key
    /// or `x` is not a valid curve point.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey> {
        self.check_type()?;
        let public: [u8; 32] = decode_member("x", &self.x)?;
        VerifyingKey::from_bytes(&public)
            .map_err(|e| SignerError::KeyLoad(format!("invalid Ed25519 public key: {e}")))
    }

    /// Computes the RFC 7638 thumbprint of this key.
    ///
    /// Only `crv`, `kty` and `x` take part, so the result is identical for the
    /// private and public form of the same key.
    ///
    /// # Examples
    ///
    /// ```
    /// use ed25519_dalek::SigningKey;
    /// use web_bot_auth::keys::Jwk;
    ///
    /// let signing_key = SigningKey::from_bytes(&[0u8; 32]);
    /// let private = Jwk::from_signing_key(&signing_key);
    /// let public = Jwk::from_verifying_key(&signing_key.verifying_key());
    ///
    /// assert_eq!(private.thumbprint(), public.thumbprint());
    /// assert_eq!(public.thumbprint().len(), 43);
    /// ```
    #[must_use]
    pub fn thumbprint(&self) -> String {
        // serde_json::Map is ordered by key, which yields the canonical member order.
        let mut canonical = serde_json::Map::new();
        canonical.insert("crv".to_owned(), self.crv.clone().into());
        canonical.insert("kty".to_owned(), self.kty.clone().into());
        canonical.insert("x".to_owned(), self.x.clone().into());

        let json = serde_json::Value::Object(canonical).to_string();
        let hash = Sha256::digest(json.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
    }

    /// Serializes this JWK as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::KeyLoad`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SignerError::KeyLoad(format!("cannot serialize JWK: {e}")))
    }

    fn check_type(&self) -> Result<()> {
        if self.kty != KEY_TYPE_OKP || self.crv != CURVE_ED25519 {
            return Err(SignerError::KeyLoad(format!(
                "unsupported key type {}/{}, expected {KEY_TYPE_OKP}/{CURVE_ED25519}",
                self.kty, self.crv
            )));
        }
        Ok(())
    }
}

fn decode_member<const N: usize>(member: &str, value: &str) -> Result<[u8; N]> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| SignerError::KeyLoad(format!("JWK member '{member}' is not base64url: {e}")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        SignerError::KeyLoad(format!(
            "JWK member '{member}' has {} bytes, expected {N}",
            bytes.len()
        ))
    })
}

/// JSON Web Key Set served at `/.well-known/http-message-signatures-directory`.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use web_bot_auth::keys::{Jwk, Jwks};
///
/// let signing_key = SigningKey::from_bytes(&[0u8; 32]);
/// let jwks = Jwks::new(Jwk::for_directory(&signing_key.verifying_key()));
///
/// let json = jwks.to_json().unwrap();
/// assert!(json.contains("\"keys\""));
/// assert!(json.contains("\"use\": \"sig\""));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    /// Keys in the set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Creates a set with a single key.
    #[must_use]
    pub fn new(jwk: Jwk) -> Self {
        Self { keys: vec![jwk] }
    }

    /// Creates a set from several keys, dropping any private members.
    #[must_use]
    pub fn from_keys(keys: impl IntoIterator<Item = Jwk>) -> Self {
        Self { keys: keys.into_iter().map(|k| k.public()).collect() }
    }

    /// Serializes the set as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::KeyLoad`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SignerError::KeyLoad(format!("cannot serialize JWKS: {e}")))
    }
}
