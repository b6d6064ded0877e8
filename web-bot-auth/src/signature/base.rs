//! Signature base construction per RFC 9421 §2.5.

use std::collections::HashSet;

use tracing::{instrument, warn};

use crate::{
    error::{Result, SignerError},
    signature::{
        component::{AUTHORITY, ComponentId, ComponentResolver, HttpMessage, SIGNATURE_PARAMS},
        sfv::{self, BareItem, InnerList, Parameters},
    },
};

/// Signature metadata parameters.
///
/// Serialization order is fixed: `created`, `expires`, `keyid`, `nonce`,
/// `tag`, `alg`. Optional parameters are omitted when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    /// Creation time (Unix seconds).
    pub created: u64,
    /// Expiration time (Unix seconds).
    pub expires: Option<u64>,
    /// Key identifier (JWK thumbprint of the signing key).
    pub keyid: String,
    /// Nonce.
    pub nonce: Option<String>,
    /// Protocol tag.
    pub tag: String,
    /// Algorithm identifier.
    pub alg: Option<String>,
}

impl SignatureParams {
    /// Converts to the ordered structured field parameter list.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::StructuredField`] if a timestamp does not fit a
    /// structured field integer.
    pub fn to_parameters(&self) -> Result<Parameters> {
        let mut params = Parameters::new();
        params.insert("created".to_owned(), BareItem::Integer(to_integer(self.created)?));
        if let Some(expires) = self.expires {
            params.insert("expires".to_owned(), BareItem::Integer(to_integer(expires)?));
        }
        params.insert("keyid".to_owned(), BareItem::String(self.keyid.clone()));
        if let Some(nonce) = self.nonce.as_ref().filter(|n| !n.is_empty()) {
            params.insert("nonce".to_owned(), BareItem::String(nonce.clone()));
        }
        params.insert("tag".to_owned(), BareItem::String(self.tag.clone()));
        if let Some(alg) = &self.alg {
            params.insert("alg".to_owned(), BareItem::String(alg.clone()));
        }
        Ok(params)
    }
}

fn to_integer(timestamp: u64) -> Result<i64> {
    i64::try_from(timestamp)
        .map_err(|_| SignerError::StructuredField(format!("timestamp out of range: {timestamp}")))
}

/// A built signature base.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureBase {
    /// The exact string that is signed.
    pub base: String,
    /// Covered components plus parameters; becomes the `Signature-Input` member.
    pub params_line: InnerList,
    /// Advisory notes that did not prevent building (non-lowercase identifiers).
    pub advisories: Vec<String>,
}

/// Builds RFC 9421 signature bases.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureBaseBuilder;

impl SignatureBaseBuilder {
    /// Builds the signature base for `covered` components of `message`.
    ///
    /// Each component contributes a line `<component-key>: <value>`; the last
    /// line is `"@signature-params": <inner list with params>`. Lines are joined
    /// with `\n` and there is no trailing newline.
    ///
    /// # Errors
    ///
    /// - [`SignerError::SignatureBase`] if `covered` contains `@signature-params`,
    ///   lacks `@authority`, contains a duplicate or a name with a newline
    /// - [`SignerError::ComponentNotFound`] if a component is absent from the message
    ///
    /// # Examples
    ///
    /// ```
    /// use reqwest::{Method, Request};
    /// use web_bot_auth::signature::{ComponentId, SignatureBaseBuilder, sfv::Parameters};
    ///
    /// let request = Request::new(Method::GET, "https://api.example.com/weather".parse().unwrap());
    /// let covered = [ComponentId::new("@authority")];
    /// let base = SignatureBaseBuilder::build(&request, &covered, &Parameters::new()).unwrap();
    /// assert_eq!(base.base, "\"@authority\": api.example.com\n\"@signature-params\": (\"@authority\")");
    /// ```
    #[instrument(skip_all, fields(components = covered.len()))]
    pub fn build<M: HttpMessage + ?Sized>(
        message: &M,
        covered: &[ComponentId],
        params: &Parameters,
    ) -> Result<SignatureBase> {
        let advisories = Self::check_structure(covered)?;

        let resolver = ComponentResolver::new(message);
        let mut lines = Vec::with_capacity(covered.len() + 1);
        for component in covered {
            let key = component.serialized_key().map_err(|e| {
                SignerError::SignatureBase(format!("cannot serialize component {component}: {e}"))
            })?;
            let value = resolver.resolve(component)?;
            lines.push(format!("{key}: {value}"));
        }

        let params_line = InnerList::with_params(
            covered.iter().map(ComponentId::to_item).collect(),
            params.clone(),
        );
        lines.push(format!("\"{SIGNATURE_PARAMS}\": {}", sfv::serialize_inner_list(&params_line)?));

        Ok(SignatureBase { base: lines.join("\n"), params_line, advisories })
    }

    fn check_structure(covered: &[ComponentId]) -> Result<Vec<String>> {
        if covered.iter().any(|c| c.is(SIGNATURE_PARAMS)) {
            return Err(SignerError::SignatureBase(format!(
                "{SIGNATURE_PARAMS} must not be listed as a covered component"
            )));
        }
        if !covered.iter().any(|c| c.name() == AUTHORITY) {
            return Err(SignerError::SignatureBase(format!("{AUTHORITY} must be covered")));
        }

        let mut seen = HashSet::with_capacity(covered.len());
        let mut advisories = Vec::new();
        for component in covered {
            if component.name().contains('\n') {
                return Err(SignerError::SignatureBase(format!(
                    "component identifier {:?} contains a newline",
                    component.name()
                )));
            }
            let normalized = component.normalized_key().map_err(|e| {
                SignerError::SignatureBase(format!("cannot serialize component {component}: {e}"))
            })?;
            if !seen.insert(normalized) {
                return Err(SignerError::SignatureBase(format!(
                    "component {component} appears more than once"
                )));
            }
            if component.name() != component.name().to_ascii_lowercase() {
                warn!(component = %component, "component identifier is not all lowercase");
                advisories.push(format!(
                    "component identifier {component} is not all lowercase; lowercase is recommended"
                ));
            }
        }
        Ok(advisories)
    }
}
