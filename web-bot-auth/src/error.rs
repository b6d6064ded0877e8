//! Error types for agent request signing.
//!
//! This module defines all error types that can occur while loading keys,
//! building signature bases and signing outgoing HTTP requests.
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Key Errors** ([`SignerError::KeyLoad`], [`SignerError::FileNotFound`],
//!   [`SignerError::KeyResolution`]): key material is missing or unreadable
//! - **Message Errors** ([`SignerError::ComponentNotFound`],
//!   [`SignerError::InvalidHeaderValue`]): the message cannot supply a covered component
//! - **Structural Errors** ([`SignerError::SignatureBase`],
//!   [`SignerError::StructuredField`]): the covered component list or parameters are invalid
//! - **Transport Errors** ([`SignerError::Http`], [`SignerError::UnexpectedStatus`]):
//!   only raised by the signed-send wrapper
//!
//! None of these errors are transient from the signer's point of view; the
//! signer never retries and never produces a partial signature.
//!
//! # Examples
//!
//! ```
//! use web_bot_auth::error::{Result, SignerError};
//!
//! fn require_authority(components: &[&str]) -> Result<()> {
//!     if !components.contains(&"@authority") {
//!         return Err(SignerError::SignatureBase("@authority must be covered".to_owned()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_authority(&["@method"]).is_err());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for signing operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, SignerError>;

/// Errors that can occur while signing agent requests.
///
/// # Error Recovery
///
/// - **Key errors**: check the key file path and its format (private JWK or PKCS#8 PEM)
/// - **Message errors**: add the missing header to the request or drop it from the
///   covered components
/// - **Structural errors**: fix the covered component list passed by the caller
/// - **Transport errors**: retry at the caller's discretion, the signature itself was valid
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum SignerError {
    /// Key material could not be parsed as a JWK nor as a PEM private key.
    ///
    /// # Examples
    ///
    /// ```
    /// use web_bot_auth::keys::parse_keypair;
    ///
    /// let err = parse_keypair("not a key").unwrap_err();
    /// assert!(err.to_string().contains("could not load key"));
    /// ```
    #[error("could not load key material: {0}")]
    KeyLoad(String),

    /// The key source does not exist.
    #[error("key file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No private key is available for the requested key identifier.
    #[error("no private key available for key id '{key_id}': {reason}")]
    KeyResolution {
        /// Key identifier (or agent name) that was requested.
        key_id: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A covered message component is absent from the message.
    #[error("message component not found: {0}")]
    ComponentNotFound(String),

    /// A structural precondition of the signature base was violated.
    ///
    /// Raised for a missing `@authority`, a duplicated component, an explicit
    /// `@signature-params` entry or a component key containing a newline.
    #[error("invalid signature base: {0}")]
    SignatureBase(String),

    /// A header value is not a valid HTTP field value.
    #[error("invalid value for header '{name}': {reason}")]
    InvalidHeaderValue {
        /// Header field name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A structured field value could not be parsed or serialized.
    #[error("structured field error: {0}")]
    StructuredField(String),

    /// A low-level cryptographic operation failed.
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    /// The system clock is set before the Unix epoch.
    #[error("system clock error: {0}")]
    Clock(String),

    /// Signer configuration is invalid.
    #[error("invalid signer configuration: {0}")]
    Config(String),

    /// Sending the signed request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote endpoint rejected the signed request.
    #[error("remote endpoint returned status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
}
