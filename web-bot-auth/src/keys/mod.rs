//! Key identity and key resolution.
//!
//! - [`jwk`]: JWK representation and RFC 7638 thumbprints
//! - [`loader`]: loading key files (JWK or PEM), generation and persistence
//! - [`resolver`]: the [`KeyResolver`] capability and its implementations

pub mod jwk;
pub mod loader;
pub mod resolver;

pub use jwk::{Jwk, Jwks};
pub use loader::{
    GeneratedKey, generate_agent_keypair, generate_keypair, import_pem, key_id_from_file,
    load_keypair, parse_keypair, public_identifier,
};
pub use resolver::{AgentKeyResolver, InMemoryKeyResolver, KeyResolver, StaticKeyResolver};
