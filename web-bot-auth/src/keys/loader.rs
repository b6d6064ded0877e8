//! Loading, generating and persisting Ed25519 key material.
//!
//! Key files hold either a private JWK (JSON) or an unencrypted PKCS#8 PEM
//! private key. [`parse_keypair`] tries JSON first and falls back to PEM.

use std::{
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use ed25519_dalek::{
    SigningKey, VerifyingKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey, spki::der::pem::LineEnding},
};
use rand::rngs::OsRng;
use tracing::{debug, instrument};

use crate::{
    error::{Result, SignerError},
    keys::jwk::Jwk,
};

/// File name prefix of private agent keys.
pub const PRIVATE_KEY_PREFIX: &str = "private_ed25519_";

/// File extension of JWK key files.
pub const JWK_EXTENSION: &str = "jwk";

/// Loads a signing key from a key file.
///
/// # Errors
///
/// - [`SignerError::FileNotFound`] if `path` does not exist
/// - [`SignerError::KeyLoad`] if the file is unreadable or is neither a private
///   JWK nor a PEM private key
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_keypair(path: impl AsRef<Path>) -> Result<SigningKey> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SignerError::FileNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| SignerError::KeyLoad(format!("cannot read {}: {e}", path.display())))?;
    parse_keypair(&contents)
}

/// Parses key material held in memory.
///
/// Text that parses as JSON is treated as a JWK. Anything else is tried as a
/// PKCS#8 PEM private key.
///
/// # Errors
///
/// Returns [`SignerError::KeyLoad`] if neither format applies, or if the JSON
/// is a JWK without usable Ed25519 private material.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use web_bot_auth::keys::{Jwk, parse_keypair};
///
/// let signing_key = SigningKey::from_bytes(&[1u8; 32]);
/// let json = Jwk::from_signing_key(&signing_key).to_json().unwrap();
///
/// let loaded = parse_keypair(&json).unwrap();
/// assert_eq!(loaded.to_bytes(), signing_key.to_bytes());
/// ```
pub fn parse_keypair(contents: &str) -> Result<SigningKey> {
    match serde_json::from_str::<Jwk>(contents) {
        Ok(jwk) => {
            debug!("parsed key material as JWK");
            jwk.to_signing_key()
        }
        Err(json_err) => {
            let key = SigningKey::from_pkcs8_pem(contents.trim()).map_err(|pem_err| {
                SignerError::KeyLoad(format!("not a JWK ({json_err}) and not a PEM key ({pem_err})"))
            })?;
            debug!("parsed key material as PKCS#8 PEM");
            Ok(key)
        }
    }
}

/// Generates a fresh Ed25519 signing key from the OS random source.
#[must_use]
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Computes the canonical key identifier (JWK thumbprint) of a public key.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use web_bot_auth::keys::public_identifier;
///
/// let key = SigningKey::from_bytes(&[0u8; 32]);
/// let id = public_identifier(&key.verifying_key());
/// assert_eq!(id, public_identifier(&key.verifying_key()));
/// assert_eq!(id.len(), 43);
/// ```
#[must_use]
pub fn public_identifier(verifying_key: &VerifyingKey) -> String {
    Jwk::from_verifying_key(verifying_key).thumbprint()
}

/// Loads a key file and returns the identifier of its public half.
///
/// # Errors
///
/// Same as [`load_keypair`].
pub fn key_id_from_file(path: impl AsRef<Path>) -> Result<String> {
    let key = load_keypair(path)?;
    Ok(public_identifier(&key.verifying_key()))
}

/// Encodes a signing key as an unencrypted PKCS#8 PEM document.
///
/// # Errors
///
/// Returns [`SignerError::KeyLoad`] if encoding fails.
pub fn to_pkcs8_pem(signing_key: &SigningKey) -> Result<String> {
    let pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| SignerError::KeyLoad(format!("cannot encode PKCS#8 PEM: {e}")))?;
    Ok(pem.as_str().to_owned())
}

/// Writes a private JWK file. On Unix the file is created with mode `0600`.
///
/// # Errors
///
/// Returns [`SignerError::KeyLoad`] if the file cannot be written.
pub fn write_private_jwk(path: &Path, signing_key: &SigningKey) -> Result<()> {
    let json = Jwk::from_signing_key(signing_key).to_json()?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }

    options
        .open(path)
        .and_then(|mut file| file.write_all(json.as_bytes()))
        .map_err(|e| SignerError::KeyLoad(format!("cannot write {}: {e}", path.display())))
}

/// Writes a public JWK file.
///
/// # Errors
///
/// Returns [`SignerError::KeyLoad`] if the file cannot be written.
pub fn write_public_jwk(path: &Path, verifying_key: &VerifyingKey) -> Result<()> {
    let json = Jwk::from_verifying_key(verifying_key).to_json()?;
    fs::write(path, json)
        .map_err(|e| SignerError::KeyLoad(format!("cannot write {}: {e}", path.display())))
}

/// Files produced by [`generate_agent_keypair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKey {
    /// Logical agent name.
    pub agent_name: String,
    /// Private JWK file.
    pub private_key_path: PathBuf,
    /// Public JWK file, named by the key identifier.
    pub public_key_path: PathBuf,
    /// Key identifier.
    pub key_id: String,
}

/// Returns the private key file name used for `agent_name`.
#[must_use]
pub fn agent_key_file_name(agent_name: &str) -> String {
    format!("{PRIVATE_KEY_PREFIX}{agent_name}.{JWK_EXTENSION}")
}

/// Generates a keypair for an agent and persists it under `keys_dir`.
///
/// Writes `private_ed25519_<agent>.jwk` holding the private JWK and
/// `<key id>.jwk` holding the public JWK. Existing files are overwritten.
///
/// # Errors
///
/// - [`SignerError::Config`] if `agent_name` is empty or contains a path separator
/// - [`SignerError::KeyLoad`] if the directory or files cannot be written
#[instrument(skip(keys_dir), fields(keys_dir = %keys_dir.display()))]
pub fn generate_agent_keypair(keys_dir: &Path, agent_name: &str) -> Result<GeneratedKey> {
    validate_agent_name(agent_name)?;
    fs::create_dir_all(keys_dir)
        .map_err(|e| SignerError::KeyLoad(format!("cannot create {}: {e}", keys_dir.display())))?;

    let signing_key = generate_keypair();
    let verifying_key = signing_key.verifying_key();
    let key_id = public_identifier(&verifying_key);

    let private_key_path = keys_dir.join(agent_key_file_name(agent_name));
    let public_key_path = keys_dir.join(format!("{key_id}.{JWK_EXTENSION}"));
    write_private_jwk(&private_key_path, &signing_key)?;
    write_public_jwk(&public_key_path, &verifying_key)?;

    debug!(key_id = %key_id, "generated agent keypair");
    Ok(GeneratedKey { agent_name: agent_name.to_owned(), private_key_path, public_key_path, key_id })
}

/// Converts a PEM private key file into a private JWK file.
///
/// Returns the key identifier of the converted key.
///
/// # Errors
///
/// - [`SignerError::FileNotFound`] if `pem_path` does not exist
/// - [`SignerError::KeyLoad`] if the source is not a key or the output cannot be written
#[instrument(skip_all, fields(pem_path = %pem_path.display(), jwk_path = %jwk_path.display()))]
pub fn import_pem(pem_path: &Path, jwk_path: &Path) -> Result<String> {
    let signing_key = load_keypair(pem_path)?;
    write_private_jwk(jwk_path, &signing_key)?;
    Ok(public_identifier(&signing_key.verifying_key()))
}

pub(crate) fn validate_agent_name(agent_name: &str) -> Result<()> {
    if agent_name.is_empty() {
        return Err(SignerError::Config("agent name cannot be empty".to_owned()));
    }
    if agent_name.contains(['/', '\\']) || agent_name == "." || agent_name == ".." {
        return Err(SignerError::Config(format!(
            "agent name '{agent_name}' must not contain path separators"
        )));
    }
    Ok(())
}
