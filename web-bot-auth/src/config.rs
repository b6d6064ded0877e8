//! Signer configuration.
//!
//! This module defines the TOML-deserializable signer configuration and the
//! agent registry mapping logical agent names to key files. The registry is
//! read-only once loaded.
//!
//! # Examples
//!
//! ```toml
//! keys_dir = "keys"
//! default_key = "private_ed25519_default.jwk"
//! signature_agent = "agent.example.com"
//! expires_secs = 86400
//! components = "auto"
//!
//! [agents.weather_agent]
//! key = "private_ed25519_weather_agent.jwk"
//!
//! [agents.trip_agent]
//! key = "private_ed25519_trip_agent.jwk"
//! signature_agent = "trip.example.com"
//!
//! [http]
//! timeout_secs = 30
//! user_agent = "trip-planner/1.0"
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::header::HeaderValue;
use serde::Deserialize;

use crate::{
    error::{Result, SignerError},
    keys::{AgentKeyResolver, loader::validate_agent_name},
    signature::{ComponentPreset, RequestSigningOptions},
};

/// Longest accepted validity window (one year).
pub const MAX_EXPIRES_SECS: u64 = 31_536_000;

/// `User-Agent` sent by [`SignedClient`](crate::transport::SignedClient) unless configured.
pub const DEFAULT_USER_AGENT: &str = concat!("web-bot-auth/", env!("CARGO_PKG_VERSION"));

/// Root signer configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SignerConfig {
    /// Directory relative key paths are resolved against.
    #[serde(default = "default_keys_dir")]
    pub keys_dir: PathBuf,

    /// Key used when no agent is named.
    #[serde(default)]
    pub default_key: Option<PathBuf>,

    /// Default `Signature-Agent` value.
    #[serde(default)]
    pub signature_agent: Option<String>,

    /// Signature validity window in seconds.
    #[serde(default = "default_expires_secs")]
    pub expires_secs: u64,

    /// Covered component preset used without an explicit list.
    #[serde(default)]
    pub components: ComponentPreset,

    /// Agent registry.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentEntry>,

    /// HTTP client settings for sending signed requests.
    #[serde(default)]
    pub http: HttpSettings,
}

/// One registered agent.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AgentEntry {
    /// Private key file of the agent.
    pub key: PathBuf,

    /// `Signature-Agent` value for this agent, overriding the default.
    #[serde(default)]
    pub signature_agent: Option<String>,
}

/// HTTP client settings (`[http]` table).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum idle connections per host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    /// Validates timeouts and the user agent.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Config`] if:
    /// - `timeout_secs` is not within 1..=300
    /// - `connect_timeout_secs` is not within 1..=60
    /// - `user_agent` is empty or not a valid header value
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(SignerError::Config(
                "http.timeout_secs must be between 1 and 300".to_owned(),
            ));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 60 {
            return Err(SignerError::Config(
                "http.connect_timeout_secs must be between 1 and 60".to_owned(),
            ));
        }
        if self.user_agent.is_empty() {
            return Err(SignerError::Config("http.user_agent cannot be empty".to_owned()));
        }
        HeaderValue::from_str(&self.user_agent).map_err(|e| {
            SignerError::Config(format!("invalid http.user_agent '{}': {e}", self.user_agent))
        })?;
        Ok(())
    }

    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            keys_dir: default_keys_dir(),
            default_key: None,
            signature_agent: None,
            expires_secs: default_expires_secs(),
            components: ComponentPreset::default(),
            agents: BTreeMap::new(),
            http: HttpSettings::default(),
        }
    }
}

impl SignerConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Config`] if the TOML is malformed or fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use web_bot_auth::config::SignerConfig;
    ///
    /// let config = SignerConfig::from_toml(
    ///     r#"
    ///     keys_dir = "/etc/agent/keys"
    ///     [agents.trip_agent]
    ///     key = "trip.jwk"
    ///     "#,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(config.expires_secs, 86_400);
    /// assert_eq!(
    ///     config.key_path(Some("trip_agent")).unwrap(),
    ///     std::path::Path::new("/etc/agent/keys/trip.jwk")
    /// );
    /// ```
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)
            .map_err(|e| SignerError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// Relative `keys_dir` values are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// - [`SignerError::FileNotFound`] if `path` does not exist
    /// - [`SignerError::Config`] if it cannot be read, parsed or validated
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SignerError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| SignerError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&contents)?;
        if config.keys_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.keys_dir = parent.join(&config.keys_dir);
            }
        }
        Ok(config)
    }

    /// Validates configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Config`] if:
    /// - `expires_secs` is not within 1..=31536000
    /// - an agent name is empty or contains a path separator
    /// - a `Signature-Agent` value is empty
    /// - the `[http]` settings are out of range (see [`HttpSettings::validate`])
    ///
    /// Key files are not checked here; missing files surface when a key is resolved.
    pub fn validate(&self) -> Result<()> {
        if self.expires_secs == 0 || self.expires_secs > MAX_EXPIRES_SECS {
            return Err(SignerError::Config(format!(
                "expires_secs must be between 1 and {MAX_EXPIRES_SECS}"
            )));
        }
        if self.signature_agent.as_deref().is_some_and(str::is_empty) {
            return Err(SignerError::Config("signature_agent cannot be empty".to_owned()));
        }
        for (name, entry) in &self.agents {
            validate_agent_name(name)?;
            if entry.signature_agent.as_deref().is_some_and(str::is_empty) {
                return Err(SignerError::Config(format!(
                    "agents.{name}.signature_agent cannot be empty"
                )));
            }
        }
        self.http.validate()
    }

    /// Signature validity window.
    #[must_use]
    pub const fn validity(&self) -> Duration {
        Duration::from_secs(self.expires_secs)
    }

    /// Resolves `path` against `keys_dir` unless it is absolute.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.keys_dir.join(path) }
    }

    /// Key file for `agent`, or the default key when `agent` is `None`.
    ///
    /// # Errors
    ///
    /// - [`SignerError::KeyResolution`] if `agent` is not registered
    /// - [`SignerError::Config`] if no agent is named and there is no `default_key`
    pub fn key_path(&self, agent: Option<&str>) -> Result<PathBuf> {
        match agent {
            Some(name) => self
                .agents
                .get(name)
                .map(|entry| self.resolve_path(&entry.key))
                .ok_or_else(|| SignerError::KeyResolution {
                    key_id: name.to_owned(),
                    reason: "agent is not registered in the configuration".to_owned(),
                }),
            None => self
                .default_key
                .as_deref()
                .map(|key| self.resolve_path(key))
                .ok_or_else(|| SignerError::Config("no agent named and no default_key".to_owned())),
        }
    }

    /// Builds [`RequestSigningOptions`] for `agent` (or the default key).
    ///
    /// The agent's own `signature_agent` wins over the global default; the
    /// agent name is sent as `X-Agent-Name`.
    ///
    /// # Errors
    ///
    /// Same as [`SignerConfig::key_path`].
    pub fn request_options(&self, agent: Option<&str>) -> Result<RequestSigningOptions> {
        let key_path = self.key_path(agent)?;
        let signature_agent = agent
            .and_then(|name| self.agents.get(name))
            .and_then(|entry| entry.signature_agent.clone())
            .or_else(|| self.signature_agent.clone());

        Ok(RequestSigningOptions {
            key_path,
            signature_agent,
            agent_name: agent.map(str::to_owned),
            covered_components: None,
            preset: self.components,
            validity: self.validity(),
        })
    }

    /// Key resolver over the agent registry.
    #[must_use]
    pub fn registry_resolver(&self) -> AgentKeyResolver {
        AgentKeyResolver::new(
            self.agents
                .iter()
                .map(|(name, entry)| (name.clone(), self.resolve_path(&entry.key)))
                .collect(),
        )
    }
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from("keys")
}

const fn default_expires_secs() -> u64 {
    86_400
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_pool_max_idle() -> usize {
    10
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        keys_dir = "/srv/keys"
        default_key = "default.jwk"
        signature_agent = "agent.example.com"
        components = "enhanced"

        [agents.weather_agent]
        key = "weather.jwk"

        [agents.trip_agent]
        key = "/abs/trip.jwk"
        signature_agent = "trip.example.com"
    "#;

    #[test]
    fn test_defaults() {
        let config = SignerConfig::from_toml("").unwrap();
        assert_eq!(config, SignerConfig::default());
        assert_eq!(config.keys_dir, PathBuf::from("keys"));
        assert_eq!(config.validity(), Duration::from_secs(86_400));
        assert_eq!(config.components, ComponentPreset::Auto);
    }

    #[test]
    fn test_key_paths() {
        let config = SignerConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.key_path(None).unwrap(), PathBuf::from("/srv/keys/default.jwk"));
        assert_eq!(
            config.key_path(Some("weather_agent")).unwrap(),
            PathBuf::from("/srv/keys/weather.jwk")
        );
        assert_eq!(config.key_path(Some("trip_agent")).unwrap(), PathBuf::from("/abs/trip.jwk"));
        assert!(matches!(
            config.key_path(Some("llm_agent")),
            Err(SignerError::KeyResolution { .. })
        ));
    }

    #[test]
    fn test_request_options_agent_overrides() {
        let config = SignerConfig::from_toml(SAMPLE).unwrap();

        let trip = config.request_options(Some("trip_agent")).unwrap();
        assert_eq!(trip.signature_agent.as_deref(), Some("trip.example.com"));
        assert_eq!(trip.agent_name.as_deref(), Some("trip_agent"));
        assert_eq!(trip.preset, ComponentPreset::Enhanced);

        let weather = config.request_options(Some("weather_agent")).unwrap();
        assert_eq!(weather.signature_agent.as_deref(), Some("agent.example.com"));
    }

    #[test]
    fn test_missing_default_key() {
        let config = SignerConfig::from_toml("").unwrap();
        assert!(matches!(config.key_path(None), Err(SignerError::Config(_))));
    }

    #[test]
    fn test_validate_expires_range() {
        assert!(SignerConfig::from_toml("expires_secs = 0").is_err());
        assert!(SignerConfig::from_toml("expires_secs = 31536001").is_err());
        assert!(SignerConfig::from_toml("expires_secs = 480").is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_agent_names() {
        let err = SignerConfig::from_toml("[agents.\"\"]\nkey = \"k.jwk\"").unwrap_err();
        assert!(matches!(err, SignerError::Config(_)));
        let err = SignerConfig::from_toml("[agents.\"a/b\"]\nkey = \"k.jwk\"").unwrap_err();
        assert!(matches!(err, SignerError::Config(_)));
    }

    #[test]
    fn test_http_settings() {
        let config = SignerConfig::from_toml("").unwrap();
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.http.connect_timeout(), Duration::from_secs(10));
        assert!(config.http.user_agent.starts_with("web-bot-auth/"));

        let config =
            SignerConfig::from_toml("[http]\ntimeout_secs = 5\nuser_agent = \"trip-planner/1.0\"")
                .unwrap();
        assert_eq!(config.http.timeout(), Duration::from_secs(5));
        assert_eq!(config.http.user_agent, "trip-planner/1.0");
        assert_eq!(config.http.pool_max_idle_per_host, 10);
    }

    #[test]
    fn test_validate_http_settings() {
        assert!(SignerConfig::from_toml("[http]\ntimeout_secs = 0").is_err());
        assert!(SignerConfig::from_toml("[http]\ntimeout_secs = 301").is_err());
        assert!(SignerConfig::from_toml("[http]\nconnect_timeout_secs = 0").is_err());
        assert!(SignerConfig::from_toml("[http]\nuser_agent = \"\"").is_err());
        assert!(SignerConfig::from_toml("[http]\nuser_agent = \"bad\\nagent\"").is_err());
        assert!(SignerConfig::from_toml("[http]\nretries = 3").is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = SignerConfig::from_toml("keydir = \"x\"").unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));
    }

    #[test]
    fn test_from_file_resolves_relative_keys_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signer.toml");
        fs::write(&path, "keys_dir = \"keys\"\n[agents.a]\nkey = \"a.jwk\"\n").unwrap();

        let config = SignerConfig::from_file(&path).unwrap();
        assert_eq!(config.key_path(Some("a")).unwrap(), dir.path().join("keys").join("a.jwk"));

        assert!(matches!(
            SignerConfig::from_file(&dir.path().join("absent.toml")),
            Err(SignerError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_registry_resolver_lists_agents() {
        let config = SignerConfig::from_toml(SAMPLE).unwrap();
        let resolver = config.registry_resolver();
        let names: Vec<_> = resolver.agents().map(|(name, _)| name).collect();
        assert_eq!(names, ["trip_agent", "weather_agent"]);
    }
}
