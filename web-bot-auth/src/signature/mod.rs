//! RFC 9421 HTTP Message Signatures for agent requests.
//!
//! # Overview
//!
//! Signing a request adds two headers:
//!
//! - **Signature-Input**: covered components plus parameters, e.g.
//!   `sig1=("@authority" "signature-agent");created=..;expires=..;keyid="..";nonce="..";tag="web-bot-auth";alg="ed25519"`
//! - **Signature**: the Ed25519 signature over the signature base, e.g. `sig1=:<base64>:`
//!
//! The signature base has one line per covered component followed by the
//! `"@signature-params"` line:
//!
//! ```text
//! "@authority": api.example.com
//! "signature-agent": trip.example.com
//! "@signature-params": ("@authority" "signature-agent");created=1700000000;keyid="...";tag="web-bot-auth"
//! ```
//!
//! # Key Components
//!
//! - [`ComponentResolver`]: resolves derived components and header fields
//! - [`SignatureBaseBuilder`]: builds the signature base and enforces its invariants
//! - [`MessageSigner`]: resolves the key, picks components, signs and writes headers
//! - [`MessageVerifier`]: checks a signature with a known public key
//! - [`ComponentPreset`]: default covered component selection
//!
//! # Coverage Rules
//!
//! - `@authority` is always covered
//! - `@signature-params` is never listed explicitly
//! - whenever the message carries `Signature-Agent`, `signature-agent` is covered
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ed25519_dalek::SigningKey;
//! use reqwest::{Method, Request};
//! use web_bot_auth::{
//!     keys::InMemoryKeyResolver,
//!     signature::{MessageSigner, SignOptions},
//! };
//!
//! # fn example() -> web_bot_auth::Result<()> {
//! let mut resolver = InMemoryKeyResolver::new();
//! let key_id = resolver.add(SigningKey::from_bytes(&[0u8; 32]));
//! let signer = MessageSigner::new(Arc::new(resolver));
//!
//! let mut request = Request::new(Method::GET, "https://api.example.com/weather".parse().unwrap());
//! let options = SignOptions::new(key_id).with_signature_agent("trip.example.com");
//! let signature = signer.sign(&mut request, &options)?;
//!
//! println!("Signature-Input: {}", signature.signature_input);
//! println!("Signature: {}", signature.signature);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod base;
pub mod component;
pub mod policy;
pub mod sfv;
pub mod signer;
pub mod verifier;

#[cfg(test)]
#[path = "tests/proptest_signatures.rs"]
mod proptest_signatures;

pub use base::{SignatureBase, SignatureBaseBuilder, SignatureParams};
pub use component::{ComponentId, ComponentResolver, HttpMessage};
pub use policy::{BOT_AUTH_COMPONENTS, ComponentPreset, ENHANCED_COMPONENTS, MINIMAL_COMPONENTS};
pub use signer::{
    DEFAULT_SIGNATURE_LABEL, ED25519_ALG, MessageSignature, MessageSigner, RequestSigningOptions,
    SignOptions, WEB_BOT_AUTH_TAG, generate_nonce, sign_request,
};
pub use verifier::{MessageVerifier, VerifiedSignature, reconstruct_signature_base};
