//! Web Bot Auth: HTTP Message Signatures for automated agents
//!
//! A Rust library that signs outgoing agent HTTP requests with
//! [RFC 9421 HTTP Message Signatures](https://www.rfc-editor.org/rfc/rfc9421.html)
//! using Ed25519 keys identified by
//! [RFC 7638 JWK Thumbprints](https://www.rfc-editor.org/rfc/rfc7638.html),
//! tagged `web-bot-auth`.
//!
//! # What does a signed request look like?
//!
//! ```text
//! GET /weather HTTP/1.1
//! Host: api.example.com
//! Signature-Agent: trip.example.com
//! Signature-Input: sig1=("@authority" "signature-agent");created=1700000000;
//!   expires=1700086400;keyid="poqkLGiymh_W0uP6PZFw-dvez3QJT5SolqXBCW38r0U";
//!   nonce="...";tag="web-bot-auth";alg="ed25519"
//! Signature: sig1=:<base64 Ed25519 signature>:
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   key id    ┌──────────────────┐
//! │  MessageSigner   │────────────▶│   KeyResolver    │  file, registry or memory
//! └────────┬─────────┘             └──────────────────┘
//!          │ covered components + params
//! ┌────────▼─────────┐  component  ┌──────────────────┐
//! │ SignatureBase-   │────────────▶│ ComponentResolver│  @authority, headers, ...
//! │ Builder          │             └──────────────────┘
//! └────────┬─────────┘
//!          │ Ed25519 signature
//! ┌────────▼─────────┐
//! │ Signature-Input, │  written onto the caller's request
//! │ Signature        │
//! └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Sign a Request with a Key File
//!
//! ```rust
//! use ed25519_dalek::SigningKey;
//! use reqwest::{Method, Request};
//! use web_bot_auth::{
//!     keys::loader::write_private_jwk,
//!     signature::{RequestSigningOptions, sign_request},
//! };
//!
//! # fn example() -> web_bot_auth::Result<()> {
//! # let dir = tempfile::tempdir().unwrap();
//! # let key_path = dir.path().join("private_ed25519_trip_agent.jwk");
//! # write_private_jwk(&key_path, &SigningKey::from_bytes(&[0u8; 32]))?;
//! let mut request = Request::new(Method::GET, "https://api.example.com/weather".parse().unwrap());
//!
//! let options = RequestSigningOptions::new(&key_path).with_signature_agent("trip.example.com");
//! let signature = sign_request(&mut request, &options)?;
//!
//! println!("Signature-Input: {}", signature.signature_input);
//! println!("Signature: {}", signature.signature);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## 2. Publish the Key Directory
//!
//! ```rust
//! use ed25519_dalek::SigningKey;
//! use web_bot_auth::keys::{Jwk, Jwks};
//!
//! # fn example() -> web_bot_auth::Result<()> {
//! let signing_key = SigningKey::from_bytes(&[0u8; 32]);
//! let jwks = Jwks::new(Jwk::for_directory(&signing_key.verifying_key()));
//!
//! // Serve this at /.well-known/http-message-signatures-directory
//! println!("{}", jwks.to_json()?);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Module Organization
//!
//! - [`signature`]: signature base construction, signing and verification
//! - [`keys`]: key identifiers, key files and key resolution
//! - [`config`]: TOML signer configuration and the agent registry
//! - [`transport`]: signed sending over `reqwest`
//! - [`error`]: error types
//!
//! # Logging
//!
//! The library emits [`tracing`] events and spans and never prints. Private
//! keys and signature bytes are never recorded.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod keys;
pub mod signature;
pub mod transport;

pub use config::SignerConfig;
pub use error::{Result, SignerError};
pub use signature::{MessageSigner, SignOptions, sign_request};
