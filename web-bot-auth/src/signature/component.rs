//! Covered component identifiers and their resolution against a message.
//!
//! A component is either a derived component (`@authority`, `@method`, `@path`, ...)
//! computed from request metadata, or an ordinary header field read from the
//! message's header collection. See RFC 9421 §2.

use std::fmt;

use reqwest::{
    Method, Request,
    header::{HeaderMap, HeaderName},
};
use url::Url;

use crate::{
    error::{Result, SignerError},
    signature::sfv::{self, BareItem, Item, Parameters},
};

/// Reserved pseudo-component carrying the signature parameters.
pub const SIGNATURE_PARAMS: &str = "@signature-params";

/// Mandatory derived component.
pub const AUTHORITY: &str = "@authority";

/// An outgoing HTTP message that can be signed.
///
/// Implemented for [`reqwest::Request`]; other client libraries can implement
/// it over their own request type.
pub trait HttpMessage {
    /// HTTP method.
    fn method(&self) -> &Method;

    /// Target URL (scheme, host, optional port, path, query).
    fn url(&self) -> &Url;

    /// Case-insensitive multi-value header collection.
    fn headers(&self) -> &HeaderMap;

    /// Mutable access to the header collection.
    fn headers_mut(&mut self) -> &mut HeaderMap;
}

impl HttpMessage for Request {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn url(&self) -> &Url {
        Request::url(self)
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Request::headers_mut(self)
    }
}

/// Identifier of a covered message component, with optional parameters.
///
/// # Examples
///
/// ```
/// use web_bot_auth::signature::ComponentId;
///
/// let bare = ComponentId::parse("signature-agent").unwrap();
/// let quoted = ComponentId::parse("\"signature-agent\"").unwrap();
/// assert_eq!(bare, quoted);
/// assert_eq!(bare.serialized_key().unwrap(), "\"signature-agent\"");
///
/// let param = ComponentId::parse("\"@query-param\";name=\"id\"").unwrap();
/// assert!(param.is_derived());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentId {
    name: String,
    params: Parameters,
}

impl ComponentId {
    /// Creates a component identifier without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Parameters::new() }
    }

    /// Adds a component parameter (e.g. `name` for `@query-param`).
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: BareItem) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Parses a component identifier.
    ///
    /// A bare form (`@authority`, `content-type`) is taken literally. A form
    /// starting with `"` is parsed as a serialized structured field item, so
    /// component parameters may be given (`"@query-param";name="id"`).
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::SignatureBase`] if a quoted form is not a valid
    /// string item.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if !input.starts_with('"') {
            return Ok(Self::new(input));
        }
        let item = sfv::parse_item(input).map_err(|e| {
            SignerError::SignatureBase(format!("invalid component identifier {input}: {e}"))
        })?;
        Self::from_item(&item)
    }

    /// Builds a component identifier from a parsed structured field item.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::SignatureBase`] if the item is not a string.
    pub fn from_item(item: &Item) -> Result<Self> {
        match &item.bare_item {
            BareItem::String(name) => Ok(Self { name: name.clone(), params: item.params.clone() }),
            other => Err(SignerError::SignatureBase(format!(
                "component identifier must be a string, got {other:?}"
            ))),
        }
    }

    /// Component name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component parameters.
    #[must_use]
    pub const fn params(&self) -> &Parameters {
        &self.params
    }

    /// Returns `true` for derived components (names starting with `@`).
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.name.starts_with('@')
    }

    /// Returns `true` if this identifier names `component`, ignoring ASCII case.
    #[must_use]
    pub fn is(&self, component: &str) -> bool {
        self.name.eq_ignore_ascii_case(component)
    }

    /// Structured field item form of this identifier.
    #[must_use]
    pub fn to_item(&self) -> Item {
        Item::with_params(BareItem::String(self.name.clone()), self.params.clone())
    }

    /// Canonical component key as it appears in the signature base,
    /// e.g. `"@authority"` or `"@query-param";name="id"`.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::StructuredField`] if the name or a parameter
    /// cannot be serialized.
    pub fn serialized_key(&self) -> Result<String> {
        sfv::serialize_item(&self.to_item())
    }

    /// Key used for duplicate detection: lowercased name plus parameters.
    pub(crate) fn normalized_key(&self) -> Result<String> {
        let normalized = Self { name: self.name.to_ascii_lowercase(), params: self.params.clone() };
        normalized.serialized_key()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resolves component identifiers to their signature base values.
///
/// Resolution never mutates the message.
#[derive(Debug)]
pub struct ComponentResolver<'a, M: HttpMessage + ?Sized> {
    message: &'a M,
}

impl<'a, M: HttpMessage + ?Sized> ComponentResolver<'a, M> {
    /// Creates a resolver over `message`.
    #[must_use]
    pub const fn new(message: &'a M) -> Self {
        Self { message }
    }

    /// Resolves `component` to its value.
    ///
    /// # Errors
    ///
    /// - [`SignerError::ComponentNotFound`] if a header is absent or the derived
    ///   component cannot be computed for this message
    /// - [`SignerError::SignatureBase`] for unsupported component parameters
    /// - [`SignerError::InvalidHeaderValue`] if a header value is not valid UTF-8
    pub fn resolve(&self, component: &ComponentId) -> Result<String> {
        if component.is_derived() {
            self.resolve_derived(component)
        } else {
            self.resolve_header(component)
        }
    }

    fn resolve_derived(&self, component: &ComponentId) -> Result<String> {
        let name = component.name();
        if name != "@query-param" && !component.params().is_empty() {
            return Err(SignerError::SignatureBase(format!(
                "unsupported parameters on derived component {name}"
            )));
        }

        let url = self.message.url();
        match name {
            "@method" => Ok(self.message.method().as_str().to_ascii_uppercase()),
            "@target-uri" => Ok(target_uri(url)),
            "@authority" => authority(url),
            "@scheme" => Ok(url.scheme().to_ascii_lowercase()),
            "@request-target" => Ok(match url.query() {
                Some(query) => format!("{}?{query}", path(url)),
                None => path(url).to_owned(),
            }),
            "@path" => Ok(path(url).to_owned()),
            "@query" => Ok(format!("?{}", url.query().unwrap_or_default())),
            "@query-param" => query_param(url, component),
            "@status" => Err(SignerError::ComponentNotFound(
                "@status is only defined for responses".to_owned(),
            )),
            _ => Err(SignerError::ComponentNotFound(format!("unsupported derived component {name}"))),
        }
    }

    fn resolve_header(&self, component: &ComponentId) -> Result<String> {
        if !component.params().is_empty() {
            return Err(SignerError::SignatureBase(format!(
                "unsupported parameters on header component {}",
                component.name()
            )));
        }

        let lowercase = component.name().to_ascii_lowercase();
        let header_name = HeaderName::from_bytes(lowercase.as_bytes()).map_err(|e| {
            SignerError::SignatureBase(format!("invalid header field name {lowercase:?}: {e}"))
        })?;

        let mut values = Vec::new();
        for value in self.message.headers().get_all(&header_name) {
            // Field values are bytes; obs-text is kept when it is valid UTF-8.
            let value = std::str::from_utf8(value.as_bytes()).map_err(|e| {
                SignerError::InvalidHeaderValue { name: lowercase.clone(), reason: e.to_string() }
            })?;
            values.push(value.trim());
        }

        if values.is_empty() {
            return Err(SignerError::ComponentNotFound(lowercase));
        }
        Ok(values.join(", "))
    }
}

fn authority(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| SignerError::ComponentNotFound("@authority: target URL has no host".to_owned()))?
        .to_ascii_lowercase();

    // `Url::port` is `None` when the port is the scheme's default.
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Absolute target URI as sent; the fragment never goes on the wire.
fn target_uri(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

fn path(url: &Url) -> &str {
    match url.path() {
        "" => "/",
        p => p,
    }
}

fn query_param(url: &Url, component: &ComponentId) -> Result<String> {
    let wanted = sfv::string_param(component.params(), "name").ok_or_else(|| {
        SignerError::SignatureBase("@query-param requires a string 'name' parameter".to_owned())
    })?;

    let mut matches = url.query_pairs().filter(|(name, _)| name == wanted).map(|(_, value)| value);
    let value = matches
        .next()
        .ok_or_else(|| SignerError::ComponentNotFound(format!("@query-param {wanted}")))?;
    if matches.next().is_some() {
        return Err(SignerError::SignatureBase(format!(
            "@query-param {wanted} occurs more than once"
        )));
    }

    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    Ok(encoded.replace('+', "%20"))
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).unwrap())
    }

    fn resolve(req: &Request, id: &str) -> Result<String> {
        ComponentResolver::new(req).resolve(&ComponentId::parse(id).unwrap())
    }

    #[test]
    fn test_authority_lowercases_host_and_omits_default_port() {
        let req = request(Method::GET, "https://API.Example.com/weather");
        assert_eq!(resolve(&req, "@authority").unwrap(), "api.example.com");

        let req = request(Method::GET, "https://api.example.com:443/weather");
        assert_eq!(resolve(&req, "@authority").unwrap(), "api.example.com");
    }

    #[test]
    fn test_authority_includes_non_default_port() {
        let req = request(Method::GET, "http://localhost:8080/weather");
        assert_eq!(resolve(&req, "@authority").unwrap(), "localhost:8080");
    }

    #[test]
    fn test_method_is_uppercase() {
        let req = request(Method::POST, "https://api.example.com/");
        assert_eq!(resolve(&req, "@method").unwrap(), "POST");
    }

    #[test]
    fn test_path_defaults_to_slash() {
        let req = request(Method::GET, "https://api.example.com");
        assert_eq!(resolve(&req, "@path").unwrap(), "/");

        let req = request(Method::GET, "https://api.example.com/a/b?c=d");
        assert_eq!(resolve(&req, "@path").unwrap(), "/a/b");
    }

    #[test]
    fn test_query_and_request_target() {
        let req = request(Method::GET, "https://api.example.com/search?q=rain&city=Paris");
        assert_eq!(resolve(&req, "@query").unwrap(), "?q=rain&city=Paris");
        assert_eq!(resolve(&req, "@request-target").unwrap(), "/search?q=rain&city=Paris");
        assert_eq!(resolve(&req, "@scheme").unwrap(), "https");

        let req = request(Method::GET, "https://api.example.com/search");
        assert_eq!(resolve(&req, "@query").unwrap(), "?");
    }

    #[test]
    fn test_query_param_is_reencoded() {
        let req = request(Method::GET, "https://api.example.com/search?q=light+rain&city=Paris");
        assert_eq!(resolve(&req, "\"@query-param\";name=\"q\"").unwrap(), "light%20rain");
        assert!(matches!(
            resolve(&req, "\"@query-param\";name=\"missing\""),
            Err(SignerError::ComponentNotFound(_))
        ));
        assert!(matches!(resolve(&req, "@query-param"), Err(SignerError::SignatureBase(_))));
    }

    #[test]
    fn test_header_values_are_trimmed_and_combined() {
        let mut req = request(Method::GET, "https://api.example.com/");
        req.headers_mut().append("cache-control", HeaderValue::from_static("  max-age=60 "));
        req.headers_mut().append("cache-control", HeaderValue::from_static("must-revalidate"));
        assert_eq!(resolve(&req, "cache-control").unwrap(), "max-age=60, must-revalidate");
    }

    #[test]
    fn test_target_uri_drops_fragment() {
        let req = request(Method::GET, "https://api.example.com/a?b=1#frag");
        assert_eq!(resolve(&req, "@target-uri").unwrap(), "https://api.example.com/a?b=1");
    }

    #[test]
    fn test_non_ascii_header_value_is_resolved() {
        let mut req = request(Method::GET, "https://api.example.com/");
        req.headers_mut().insert("x-name", HeaderValue::from_bytes("café".as_bytes()).unwrap());
        assert_eq!(resolve(&req, "x-name").unwrap(), "café");

        req.headers_mut().insert("x-latin1", HeaderValue::from_bytes(&[b'c', 0xe9]).unwrap());
        assert!(matches!(
            resolve(&req, "x-latin1"),
            Err(SignerError::InvalidHeaderValue { name, .. }) if name == "x-latin1"
        ));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut req = request(Method::GET, "https://api.example.com/");
        req.headers_mut().insert("Signature-Agent", HeaderValue::from_static("trip.example.com"));
        assert_eq!(resolve(&req, "Signature-Agent").unwrap(), "trip.example.com");
        assert_eq!(resolve(&req, "signature-agent").unwrap(), "trip.example.com");
    }

    #[test]
    fn test_missing_header_is_component_not_found() {
        let req = request(Method::GET, "https://api.example.com/");
        let err = resolve(&req, "signature-agent").unwrap_err();
        assert!(matches!(err, SignerError::ComponentNotFound(name) if name == "signature-agent"));
    }

    #[test]
    fn test_unknown_derived_component_and_status() {
        let req = request(Method::GET, "https://api.example.com/");
        assert!(matches!(resolve(&req, "@status"), Err(SignerError::ComponentNotFound(_))));
        assert!(matches!(resolve(&req, "@nonsense"), Err(SignerError::ComponentNotFound(_))));
    }

    #[test]
    fn test_resolution_does_not_mutate_message() {
        let mut req = request(Method::GET, "https://api.example.com/");
        req.headers_mut().insert("x-agent-name", HeaderValue::from_static("trip_agent"));
        let before = req.headers().clone();
        let _ = resolve(&req, "x-agent-name");
        let _ = resolve(&req, "missing");
        assert_eq!(req.headers(), &before);
    }

    #[test]
    fn test_parse_quoted_and_bare_forms_are_equal() {
        assert_eq!(ComponentId::parse("@authority").unwrap(), ComponentId::parse("\"@authority\"").unwrap());
        assert!(ComponentId::parse("\"unterminated").is_err());
        assert!(ComponentId::parse("1").is_ok());
        assert!(ComponentId::parse("\"a\";name").is_ok());
    }

    #[test]
    fn test_normalized_key_ignores_case() {
        let upper = ComponentId::new("Signature-Agent");
        let lower = ComponentId::new("signature-agent");
        assert_eq!(upper.normalized_key().unwrap(), lower.normalized_key().unwrap());
        assert_ne!(upper.serialized_key().unwrap(), lower.serialized_key().unwrap());
    }
}
