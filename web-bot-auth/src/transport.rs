//! Signed HTTP sending.
//!
//! A thin wrapper that signs each outgoing [`reqwest::Request`] with
//! [`sign_request`] and sends it on a pooled client.

use reqwest::{Client, Method, Request};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    config::{HttpSettings, SignerConfig},
    error::{Result, SignerError},
    signature::{MessageSignature, RequestSigningOptions, sign_request},
};

/// Builds the pooled HTTP client signed requests go out on.
///
/// Timeouts, pool size and `User-Agent` come from the `[http]` table of the
/// signer configuration.
///
/// # Errors
///
/// - [`SignerError::Config`] if `settings` fail validation
/// - [`SignerError::Http`] if the client cannot be built
pub fn create_http_client(settings: &HttpSettings) -> Result<Client> {
    settings.validate()?;
    debug!(
        timeout_secs = settings.timeout_secs,
        user_agent = %settings.user_agent,
        "building HTTP client"
    );
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .pool_max_idle_per_host(settings.pool_max_idle_per_host)
        .timeout(settings.timeout())
        .connect_timeout(settings.connect_timeout())
        .build()
        .map_err(SignerError::Http)
}

/// Response of a signed request.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
    /// Signature that was attached to the request.
    pub signature: MessageSignature,
}

/// HTTP client that signs every request before sending it.
#[derive(Debug, Clone)]
pub struct SignedClient {
    client: Client,
    options: RequestSigningOptions,
}

impl SignedClient {
    /// Creates a client with the default `[http]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Http`] if the HTTP client cannot be built.
    pub fn new(options: RequestSigningOptions) -> Result<Self> {
        Self::with_settings(options, &HttpSettings::default())
    }

    /// Creates a client with explicit HTTP settings.
    ///
    /// # Errors
    ///
    /// Same as [`create_http_client`].
    pub fn with_settings(options: RequestSigningOptions, settings: &HttpSettings) -> Result<Self> {
        Ok(Self::with_client(create_http_client(settings)?, options))
    }

    /// Creates a client for `agent` (or the default key) from a signer configuration.
    ///
    /// # Errors
    ///
    /// Any error from [`SignerConfig::request_options`] or [`create_http_client`].
    pub fn from_config(config: &SignerConfig, agent: Option<&str>) -> Result<Self> {
        Self::with_settings(config.request_options(agent)?, &config.http)
    }

    /// Creates a client on top of an existing [`Client`].
    #[must_use]
    pub const fn with_client(client: Client, options: RequestSigningOptions) -> Self {
        Self { client, options }
    }

    /// Signing options applied to every request.
    #[must_use]
    pub const fn options(&self) -> &RequestSigningOptions {
        &self.options
    }

    /// Signs and sends `request`.
    ///
    /// # Errors
    ///
    /// - any signing error from [`sign_request`]; nothing is sent in that case
    /// - [`SignerError::Http`] on connection failure or timeout
    /// - [`SignerError::UnexpectedStatus`] if the response status is not 2xx
    #[instrument(skip(self, request), fields(method = %request.method(), url = %request.url()))]
    pub async fn send(&self, mut request: Request) -> Result<SignedResponse> {
        let signature = sign_request(&mut request, &self.options)?;

        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "signed request rejected");
            return Err(SignerError::UnexpectedStatus { status: status.as_u16(), body });
        }

        debug!(status = status.as_u16(), body_len = body.len(), "signed request accepted");
        Ok(SignedResponse { status: status.as_u16(), body, signature })
    }

    /// Signs and sends a `GET` request to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Config`] if `url` is not a valid URL, otherwise
    /// the same errors as [`SignedClient::send`].
    pub async fn get(&self, url: &str) -> Result<SignedResponse> {
        let url = Url::parse(url)
            .map_err(|e| SignerError::Config(format!("invalid request URL '{url}': {e}")))?;
        self.send(Request::new(Method::GET, url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_http_client() {
        assert!(create_http_client(&HttpSettings::default()).is_ok());
    }

    #[test]
    fn test_create_http_client_rejects_invalid_settings() {
        let settings = HttpSettings { timeout_secs: 0, ..HttpSettings::default() };
        assert!(matches!(create_http_client(&settings), Err(SignerError::Config(_))));

        let settings =
            HttpSettings { user_agent: "bad\nagent".to_owned(), ..HttpSettings::default() };
        assert!(matches!(create_http_client(&settings), Err(SignerError::Config(_))));
    }

    #[test]
    fn test_from_config_uses_agent_registry() {
        let config = SignerConfig::from_toml(
            "keys_dir = \"/srv/keys\"\n[agents.trip_agent]\nkey = \"trip.jwk\"\n[http]\ntimeout_secs = 5",
        )
        .unwrap();
        let client = SignedClient::from_config(&config, Some("trip_agent")).unwrap();
        assert_eq!(client.options().key_path, std::path::Path::new("/srv/keys/trip.jwk"));
        assert_eq!(client.options().agent_name.as_deref(), Some("trip_agent"));

        assert!(matches!(
            SignedClient::from_config(&config, Some("llm_agent")),
            Err(SignerError::KeyResolution { .. })
        ));
    }

    #[tokio::test]
    async fn test_signing_failure_sends_nothing() {
        let client =
            SignedClient::new(RequestSigningOptions::new("/nonexistent/agent.jwk")).unwrap();
        // Port 9 (discard) is never contacted because signing fails first.
        let err = client.get("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, SignerError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = SignedClient::new(RequestSigningOptions::new("agent.jwk")).unwrap();
        assert!(matches!(client.get("not a url").await, Err(SignerError::Config(_))));
    }
}
