//! Verification of signatures produced by [`MessageSigner`](super::MessageSigner).
//!
//! The verifier parses `Signature-Input` and `Signature`, rebuilds the
//! signature base from the message and checks it with a known public key.
//! There is no nonce store; replay tracking is left to the caller.

use ed25519_dalek::{Signature, VerifyingKey};
use tracing::{debug, instrument, warn};

use crate::{
    error::{Result, SignerError},
    signature::{
        base::SignatureBaseBuilder,
        component::{ComponentId, HttpMessage},
        sfv::{self, BareItem, Dictionary, ListEntry, Parameters},
        signer::{SIGNATURE, SIGNATURE_INPUT, unix_now},
    },
};

/// A successfully verified signature.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedSignature {
    /// Signature label.
    pub label: String,
    /// Covered components in signed order.
    pub covered_components: Vec<ComponentId>,
    /// Signature parameters as transmitted.
    pub params: Parameters,
    /// The reconstructed signature base.
    pub signature_base: String,
}

impl VerifiedSignature {
    /// The `keyid` parameter.
    #[must_use]
    pub fn keyid(&self) -> Option<&str> {
        sfv::string_param(&self.params, "keyid")
    }

    /// The `tag` parameter.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        sfv::string_param(&self.params, "tag")
    }

    /// The `created` parameter.
    #[must_use]
    pub fn created(&self) -> Option<i64> {
        sfv::integer_param(&self.params, "created")
    }

    /// The `expires` parameter.
    #[must_use]
    pub fn expires(&self) -> Option<i64> {
        sfv::integer_param(&self.params, "expires")
    }
}

/// Verifies Ed25519 HTTP message signatures.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use ed25519_dalek::SigningKey;
/// use reqwest::{Method, Request};
/// use web_bot_auth::{
///     keys::InMemoryKeyResolver,
///     signature::{MessageSigner, MessageVerifier, SignOptions},
/// };
///
/// let key = SigningKey::from_bytes(&[0u8; 32]);
/// let mut resolver = InMemoryKeyResolver::new();
/// let key_id = resolver.add(key.clone());
/// let signer = MessageSigner::new(Arc::new(resolver));
///
/// let mut request = Request::new(Method::GET, "https://api.example.com/".parse().unwrap());
/// signer.sign(&mut request, &SignOptions::new(key_id.clone())).unwrap();
///
/// let verified = MessageVerifier::new().verify(&request, "sig1", &key.verifying_key()).unwrap();
/// assert_eq!(verified.keyid(), Some(key_id.as_str()));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageVerifier {
    check_expiry: bool,
}

impl MessageVerifier {
    /// Creates a verifier that does not enforce `expires`.
    #[must_use]
    pub const fn new() -> Self {
        Self { check_expiry: false }
    }

    /// Enables or disables rejection of expired signatures.
    #[must_use]
    pub const fn with_expiry_check(mut self, check_expiry: bool) -> Self {
        self.check_expiry = check_expiry;
        self
    }

    /// Verifies the signature labelled `label` on `message`.
    ///
    /// # Errors
    ///
    /// - [`SignerError::ComponentNotFound`] if a signature header or covered component is missing
    /// - [`SignerError::StructuredField`] if the signature headers are malformed or lack `label`
    /// - [`SignerError::SignatureBase`] if the covered components are invalid
    /// - [`SignerError::Crypto`] if the signature does not verify or has expired
    #[instrument(skip(self, message, verifying_key))]
    pub fn verify<M: HttpMessage + ?Sized>(
        &self,
        message: &M,
        label: &str,
        verifying_key: &VerifyingKey,
    ) -> Result<VerifiedSignature> {
        let (covered, params) = signature_input(message, label)?;
        let signature = signature_bytes(message, label)?;
        let base = SignatureBaseBuilder::build(message, &covered, &params)?.base;

        verifying_key.verify_strict(base.as_bytes(), &signature).map_err(|e| {
            warn!(label, "signature verification failed");
            SignerError::Crypto(format!("signature verification failed: {e}"))
        })?;

        let verified = VerifiedSignature {
            label: label.to_owned(),
            covered_components: covered,
            params,
            signature_base: base,
        };

        if self.check_expiry {
            if let Some(expires) = verified.expires() {
                let now = unix_now()?;
                if u64::try_from(expires).map_or(true, |expires| expires < now) {
                    return Err(SignerError::Crypto(format!("signature expired at {expires}")));
                }
            }
        }

        debug!(keyid = ?verified.keyid(), "signature verified");
        Ok(verified)
    }
}

/// Rebuilds the signature base for `label` from the message and its
/// `Signature-Input` header.
///
/// # Errors
///
/// Same as [`MessageVerifier::verify`], except for cryptographic failures.
pub fn reconstruct_signature_base<M: HttpMessage + ?Sized>(
    message: &M,
    label: &str,
) -> Result<String> {
    let (covered, params) = signature_input(message, label)?;
    Ok(SignatureBaseBuilder::build(message, &covered, &params)?.base)
}

fn signature_input<M: HttpMessage + ?Sized>(
    message: &M,
    label: &str,
) -> Result<(Vec<ComponentId>, Parameters)> {
    let dict = header_dictionary(message, SIGNATURE_INPUT.as_str())?;
    let list = match dict.get(label) {
        Some(ListEntry::InnerList(list)) => list,
        Some(ListEntry::Item(_)) => {
            return Err(SignerError::StructuredField(format!(
                "Signature-Input member '{label}' is not an inner list"
            )));
        }
        None => {
            return Err(SignerError::StructuredField(format!(
                "Signature-Input has no member '{label}'"
            )));
        }
    };
    let covered = list.items.iter().map(ComponentId::from_item).collect::<Result<Vec<_>>>()?;
    Ok((covered, list.params.clone()))
}

fn signature_bytes<M: HttpMessage + ?Sized>(message: &M, label: &str) -> Result<Signature> {
    let dict = header_dictionary(message, SIGNATURE.as_str())?;
    match dict.get(label) {
        Some(ListEntry::Item(item)) => match &item.bare_item {
            BareItem::ByteSeq(bytes) => Signature::from_slice(bytes)
                .map_err(|e| SignerError::Crypto(format!("malformed Ed25519 signature: {e}"))),
            _ => Err(SignerError::StructuredField(format!(
                "Signature member '{label}' is not a byte sequence"
            ))),
        },
        _ => Err(SignerError::StructuredField(format!("Signature has no item member '{label}'"))),
    }
}

fn header_dictionary<M: HttpMessage + ?Sized>(message: &M, name: &str) -> Result<Dictionary> {
    let values = message
        .headers()
        .get_all(name)
        .iter()
        .map(|v| {
            v.to_str().map_err(|e| SignerError::InvalidHeaderValue {
                name: name.to_owned(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if values.is_empty() {
        return Err(SignerError::ComponentNotFound(name.to_owned()));
    }
    sfv::parse_dictionary(&values.join(", "))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ed25519_dalek::SigningKey;
    use reqwest::{Method, Request, header::HeaderValue};

    use super::*;
    use crate::{
        keys::InMemoryKeyResolver,
        signature::signer::{MessageSigner, SignOptions},
    };

    fn signed_request(options: impl FnOnce(SignOptions) -> SignOptions) -> (Request, SigningKey) {
        let key = SigningKey::from_bytes(&[11u8; 32]);
        let mut resolver = InMemoryKeyResolver::new();
        let key_id = resolver.add(key.clone());
        let signer = MessageSigner::new(Arc::new(resolver));

        let mut req = Request::new(Method::POST, "https://api.example.com/v1/trips?x=1".parse().unwrap());
        signer.sign(&mut req, &options(SignOptions::new(key_id))).unwrap();
        (req, key)
    }

    #[test]
    fn test_verify_roundtrip() {
        let (req, key) = signed_request(|o| {
            o.with_covered_components(["@authority", "@method", "@path", "@query"])
                .with_signature_agent("trip.example.com")
        });
        let verified = MessageVerifier::new().verify(&req, "sig1", &key.verifying_key()).unwrap();

        assert_eq!(verified.tag(), Some("web-bot-auth"));
        assert_eq!(verified.covered_components.len(), 5);
        assert!(verified.created().is_some());
    }

    #[test]
    fn test_reconstructed_base_matches_signed_base() {
        let key = SigningKey::from_bytes(&[12u8; 32]);
        let mut resolver = InMemoryKeyResolver::new();
        let key_id = resolver.add(key);
        let signer = MessageSigner::new(Arc::new(resolver));
        let mut req = Request::new(Method::GET, "https://api.example.com/weather".parse().unwrap());

        let sig = signer.sign(&mut req, &SignOptions::new(key_id)).unwrap();
        assert_eq!(reconstruct_signature_base(&req, "sig1").unwrap(), sig.signature_base);
    }

    #[test]
    fn test_tampered_agent_fails() {
        let (mut req, key) = signed_request(|o| o.with_signature_agent("trip.example.com"));
        req.headers_mut().insert("signature-agent", HeaderValue::from_static("evil.example.com"));

        let err = MessageVerifier::new().verify(&req, "sig1", &key.verifying_key()).unwrap_err();
        assert!(matches!(err, SignerError::Crypto(_)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (req, _) = signed_request(|o| o);
        let other = SigningKey::from_bytes(&[13u8; 32]).verifying_key();
        assert!(matches!(
            MessageVerifier::new().verify(&req, "sig1", &other),
            Err(SignerError::Crypto(_))
        ));
    }

    #[test]
    fn test_unknown_label() {
        let (req, key) = signed_request(|o| o);
        assert!(matches!(
            MessageVerifier::new().verify(&req, "sig2", &key.verifying_key()),
            Err(SignerError::StructuredField(_))
        ));
    }

    #[test]
    fn test_unsigned_message() {
        let req = Request::new(Method::GET, "https://api.example.com/".parse().unwrap());
        let key = SigningKey::from_bytes(&[1u8; 32]).verifying_key();
        assert!(matches!(
            MessageVerifier::new().verify(&req, "sig1", &key),
            Err(SignerError::ComponentNotFound(_))
        ));
    }

    #[test]
    fn test_expiry_check() {
        let (req, key) = signed_request(|o| o.with_created(1_000).with_expires(2_000));

        assert!(MessageVerifier::new().verify(&req, "sig1", &key.verifying_key()).is_ok());
        let err = MessageVerifier::new()
            .with_expiry_check(true)
            .verify(&req, "sig1", &key.verifying_key())
            .unwrap_err();
        assert!(err.to_string().contains("expired"));
    }
}
