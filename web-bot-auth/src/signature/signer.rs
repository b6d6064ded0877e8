//! Message signing using RFC 9421 HTTP Message Signatures with Ed25519.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use base64::Engine as _;
use rand::{RngCore as _, rngs::OsRng};
use reqwest::header::{HeaderName, HeaderValue};
use signature::Signer as _;
use tracing::{debug, instrument};

use crate::{
    error::{Result, SignerError},
    keys::{KeyResolver, StaticKeyResolver, key_id_from_file},
    signature::{
        base::{SignatureBase, SignatureBaseBuilder, SignatureParams},
        component::{ComponentId, HttpMessage},
        policy::{ComponentPreset, MINIMAL_COMPONENTS},
        sfv::{self, BareItem, Dictionary, Item, ListEntry},
    },
};

/// Label of the single signature produced per message.
pub const DEFAULT_SIGNATURE_LABEL: &str = "sig1";

/// Tag asserting the web bot authentication profile.
pub const WEB_BOT_AUTH_TAG: &str = "web-bot-auth";

/// RFC 9421 algorithm identifier for Ed25519.
pub const ED25519_ALG: &str = "ed25519";

/// Default signature validity window (one day).
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(86_400);

/// Identity header carrying the agent's logical name.
pub const X_AGENT_NAME: HeaderName = HeaderName::from_static("x-agent-name");
/// Header asserting on whose behalf the request is signed.
pub const SIGNATURE_AGENT: HeaderName = HeaderName::from_static("signature-agent");
/// Signature metadata header.
pub const SIGNATURE_INPUT: HeaderName = HeaderName::from_static("signature-input");
/// Signature value header.
pub const SIGNATURE: HeaderName = HeaderName::from_static("signature");

/// Options of a single [`MessageSigner::sign`] call.
///
/// # Examples
///
/// ```
/// use web_bot_auth::signature::SignOptions;
///
/// let options = SignOptions::new("key-id")
///     .with_created(1_700_000_000)
///     .with_expires(1_700_086_400)
///     .with_signature_agent("trip.example.com");
///
/// assert_eq!(options.label, "sig1");
/// assert_eq!(options.tag, "web-bot-auth");
/// assert_eq!(options.covered_components, ["@authority"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    /// Key identifier passed to the key resolver and written as `keyid`.
    pub key_id: String,
    /// Creation time; the current time when `None`.
    pub created: Option<u64>,
    /// Expiration time.
    pub expires: Option<u64>,
    /// Nonce; omitted when `None` or empty.
    pub nonce: Option<String>,
    /// Protocol tag.
    pub tag: String,
    /// Signature label.
    pub label: String,
    /// Whether the `alg` parameter is written.
    pub include_alg: bool,
    /// Covered components, bare or as serialized sf-items.
    pub covered_components: Vec<String>,
    /// Value of the `Signature-Agent` header to set.
    pub signature_agent: Option<String>,
    /// Value of the `X-Agent-Name` header to set.
    pub agent_name: Option<String>,
}

impl SignOptions {
    /// Creates options for `key_id` covering only `@authority`.
    #[must_use]
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            created: None,
            expires: None,
            nonce: None,
            tag: WEB_BOT_AUTH_TAG.to_owned(),
            label: DEFAULT_SIGNATURE_LABEL.to_owned(),
            include_alg: true,
            covered_components: MINIMAL_COMPONENTS.iter().map(|&c| c.to_owned()).collect(),
            signature_agent: None,
            agent_name: None,
        }
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_created(mut self, created: u64) -> Self {
        self.created = Some(created);
        self
    }

    /// Sets the expiration time.
    #[must_use]
    pub const fn with_expires(mut self, expires: u64) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Sets the signature label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Controls whether `alg` is written.
    #[must_use]
    pub const fn with_alg(mut self, include_alg: bool) -> Self {
        self.include_alg = include_alg;
        self
    }

    /// Replaces the covered component list.
    #[must_use]
    pub fn with_covered_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.covered_components = components.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the `Signature-Agent` header value.
    #[must_use]
    pub fn with_signature_agent(mut self, signature_agent: impl Into<String>) -> Self {
        self.signature_agent = Some(signature_agent.into());
        self
    }

    /// Sets the `X-Agent-Name` header value.
    #[must_use]
    pub fn with_agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }
}

/// Result of a signing call. The same values are written onto the message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSignature {
    /// Signature label.
    pub label: String,
    /// `Signature-Input` header value.
    pub signature_input: String,
    /// `Signature` header value.
    pub signature: String,
    /// Covered components after automatic extension.
    pub covered_components: Vec<ComponentId>,
    /// Signature parameters.
    pub params: SignatureParams,
    /// The signed signature base.
    pub signature_base: String,
    /// Advisory notes from base construction.
    pub advisories: Vec<String>,
}

/// Signs HTTP messages with Ed25519 keys obtained from a [`KeyResolver`].
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
///     signature::{MessageSigner, SignOptions},
/// };
///
/// # fn example() -> web_bot_auth::Result<()> {
/// let mut resolver = InMemoryKeyResolver::new();
/// let key_id = resolver.add(SigningKey::from_bytes(&[0u8; 32]));
/// let signer = MessageSigner::new(Arc::new(resolver));
///
/// let mut request = Request::new(Method::GET, "https://api.example.com/weather".parse().unwrap());
/// let signature = signer.sign(&mut request, &SignOptions::new(key_id))?;
///
/// assert!(signature.signature_input.starts_with("sig1=(\"@authority\")"));
/// assert!(request.headers().contains_key("signature"));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct MessageSigner {
    key_resolver: Arc<dyn KeyResolver>,
}

impl MessageSigner {
    /// Creates a signer over `key_resolver`.
    #[must_use]
    pub fn new(key_resolver: Arc<dyn KeyResolver>) -> Self {
        Self { key_resolver }
    }

    /// Signs `message` and writes `Signature-Input` and `Signature` onto it.
    ///
    /// When `options.agent_name` or `options.signature_agent` are set, the
    /// `X-Agent-Name` and `Signature-Agent` headers are written first. Whenever
    /// the message carries a `Signature-Agent` header, `signature-agent` is
    /// appended to the covered components if not already listed. Existing
    /// `Signature-Input` and `Signature` values are replaced.
    ///
    /// On failure the message headers are left as they were.
    ///
    /// # Errors
    ///
    /// - [`SignerError::KeyResolution`] (or a key loading error) from the resolver
    /// - [`SignerError::SignatureBase`] if the covered components are invalid
    /// - [`SignerError::ComponentNotFound`] if a covered component is absent
    /// - [`SignerError::InvalidHeaderValue`] if an identity value is not a valid header value
    /// - [`SignerError::StructuredField`] if the label or a parameter cannot be serialized
    /// - [`SignerError::Clock`] if `created` is unset and the clock is before the epoch
    #[instrument(skip(self, message, options), fields(key_id = %options.key_id, label = %options.label))]
    pub fn sign<M: HttpMessage + ?Sized>(
        &self,
        message: &mut M,
        options: &SignOptions,
    ) -> Result<MessageSignature> {
        let key = self.key_resolver.resolve_private_key(&options.key_id)?;
        let created = match options.created {
            Some(created) => created,
            None => unix_now()?,
        };

        let snapshot = HeaderSnapshot::take(message);
        let result = Self::sign_with_key(message, options, &key, created);
        if result.is_err() {
            snapshot.restore(message);
        }
        result
    }

    fn sign_with_key<M: HttpMessage + ?Sized>(
        message: &mut M,
        options: &SignOptions,
        key: &ed25519_dalek::SigningKey,
        created: u64,
    ) -> Result<MessageSignature> {
        if let Some(agent_name) = non_empty(options.agent_name.as_deref()) {
            message.headers_mut().insert(X_AGENT_NAME, header_value(&X_AGENT_NAME, agent_name)?);
        }
        if let Some(agent) = non_empty(options.signature_agent.as_deref()) {
            message.headers_mut().insert(SIGNATURE_AGENT, header_value(&SIGNATURE_AGENT, agent)?);
        }

        let mut covered = options
            .covered_components
            .iter()
            .map(|c| ComponentId::parse(c))
            .collect::<Result<Vec<_>>>()?;
        if message.headers().contains_key(SIGNATURE_AGENT)
            && !covered.iter().any(|c| c.is(SIGNATURE_AGENT.as_str()))
        {
            debug!("covering signature-agent header");
            covered.push(ComponentId::new(SIGNATURE_AGENT.as_str()));
        }

        let params = SignatureParams {
            created,
            expires: options.expires,
            keyid: options.key_id.clone(),
            nonce: options.nonce.clone().filter(|n| !n.is_empty()),
            tag: options.tag.clone(),
            alg: options.include_alg.then(|| ED25519_ALG.to_owned()),
        };
        let SignatureBase { base, params_line, advisories } =
            SignatureBaseBuilder::build(&*message, &covered, &params.to_parameters()?)?;

        let signature = key.sign(base.as_bytes());

        let mut input_dict = Dictionary::new();
        input_dict.insert(options.label.clone(), ListEntry::InnerList(params_line));
        let signature_input = sfv::serialize_dictionary(&input_dict)?;

        let mut signature_dict = Dictionary::new();
        signature_dict.insert(
            options.label.clone(),
            ListEntry::Item(Item::new(BareItem::ByteSeq(signature.to_bytes().to_vec()))),
        );
        let signature_value = sfv::serialize_dictionary(&signature_dict)?;

        let input_header = header_value(&SIGNATURE_INPUT, &signature_input)?;
        let signature_header = header_value(&SIGNATURE, &signature_value)?;
        message.headers_mut().insert(SIGNATURE_INPUT, input_header);
        message.headers_mut().insert(SIGNATURE, signature_header);

        debug!(components = covered.len(), "message signed");
        Ok(MessageSignature {
            label: options.label.clone(),
            signature_input,
            signature: signature_value,
            covered_components: covered,
            params,
            signature_base: base,
            advisories,
        })
    }
}

struct HeaderSnapshot(Vec<(HeaderName, Vec<HeaderValue>)>);

impl HeaderSnapshot {
    fn take<M: HttpMessage + ?Sized>(message: &M) -> Self {
        let names = [X_AGENT_NAME, SIGNATURE_AGENT, SIGNATURE_INPUT, SIGNATURE];
        Self(
            names
                .into_iter()
                .map(|name| {
                    let values = message.headers().get_all(&name).iter().cloned().collect();
                    (name, values)
                })
                .collect(),
        )
    }

    fn restore<M: HttpMessage + ?Sized>(self, message: &mut M) {
        let headers = message.headers_mut();
        for (name, values) in self.0 {
            headers.remove(&name);
            for value in values {
                headers.append(name.clone(), value);
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| SignerError::InvalidHeaderValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|e| SignerError::Clock(e.to_string()))?
        .as_secs())
}

/// Generates a nonce: 32 random bytes, standard base64.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Options of the one-call [`sign_request`] helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSigningOptions {
    /// Private key file (JWK or PEM).
    pub key_path: PathBuf,
    /// `Signature-Agent` header value.
    pub signature_agent: Option<String>,
    /// `X-Agent-Name` header value.
    pub agent_name: Option<String>,
    /// Explicit covered components; `preset` decides when `None`.
    pub covered_components: Option<Vec<String>>,
    /// Component preset used without an explicit list.
    pub preset: ComponentPreset,
    /// Signature validity window (`expires - created`).
    pub validity: Duration,
}

impl RequestSigningOptions {
    /// Creates options signing with the key at `key_path`.
    #[must_use]
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            signature_agent: None,
            agent_name: None,
            covered_components: None,
            preset: ComponentPreset::Auto,
            validity: DEFAULT_VALIDITY,
        }
    }

    /// Sets the `Signature-Agent` header value.
    #[must_use]
    pub fn with_signature_agent(mut self, signature_agent: impl Into<String>) -> Self {
        self.signature_agent = Some(signature_agent.into());
        self
    }

    /// Sets the `X-Agent-Name` header value.
    #[must_use]
    pub fn with_agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    /// Sets an explicit covered component list.
    #[must_use]
    pub fn with_covered_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.covered_components = Some(components.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the component preset.
    #[must_use]
    pub const fn with_preset(mut self, preset: ComponentPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Sets the validity window.
    #[must_use]
    pub const fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }
}

/// Signs `message` with the key file named in `options`.
///
/// The key identifier is the thumbprint of the key file, `created` is now,
/// `expires` is now plus the validity window and a fresh nonce is generated.
///
/// # Errors
///
/// Same as [`MessageSigner::sign`], plus key loading errors for `key_path`.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use reqwest::{Method, Request};
/// use web_bot_auth::{
///     keys::loader::write_private_jwk,
///     signature::{RequestSigningOptions, sign_request},
/// };
///
/// # fn example() -> web_bot_auth::Result<()> {
/// let dir = tempfile::tempdir().unwrap();
/// let key_path = dir.path().join("agent.jwk");
/// write_private_jwk(&key_path, &SigningKey::from_bytes(&[7u8; 32]))?;
///
/// let mut request = Request::new(Method::GET, "https://api.example.com/weather".parse().unwrap());
/// let options = RequestSigningOptions::new(&key_path).with_signature_agent("trip.example.com");
/// let signature = sign_request(&mut request, &options)?;
///
/// assert!(signature.signature_input.starts_with("sig1=(\"@authority\" \"signature-agent\")"));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[instrument(skip_all, fields(key_path = %options.key_path.display()))]
pub fn sign_request<M: HttpMessage + ?Sized>(
    message: &mut M,
    options: &RequestSigningOptions,
) -> Result<MessageSignature> {
    let key_id = key_id_from_file(&options.key_path)?;
    let has_agent = non_empty(options.signature_agent.as_deref()).is_some();
    let components = options.preset.select(options.covered_components.as_deref(), has_agent);
    debug!(key_id = %key_id, ?components, "signing request");

    let created = unix_now()?;
    let expires = created
        .checked_add(options.validity.as_secs())
        .ok_or_else(|| SignerError::Config("validity window overflows".to_owned()))?;

    let mut sign_options = SignOptions::new(key_id)
        .with_created(created)
        .with_expires(expires)
        .with_nonce(generate_nonce())
        .with_covered_components(components);
    sign_options.signature_agent = options.signature_agent.clone();
    sign_options.agent_name = options.agent_name.clone();

    let signer = MessageSigner::new(Arc::new(StaticKeyResolver::new(&options.key_path)));
    signer.sign(message, &sign_options)
}
