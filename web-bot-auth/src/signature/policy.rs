//! Covered component selection.

use serde::{Deserialize, Serialize};

/// Covers only the target authority.
pub const MINIMAL_COMPONENTS: &[&str] = &["@authority"];

/// Covers the authority and the `Signature-Agent` identity claim.
pub const BOT_AUTH_COMPONENTS: &[&str] = &["@authority", "signature-agent"];

/// Additionally binds the method and path.
pub const ENHANCED_COMPONENTS: &[&str] = &["@authority", "signature-agent", "@method", "@path"];

/// Named covered-component presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPreset {
    /// [`MINIMAL_COMPONENTS`] without a signature agent, [`BOT_AUTH_COMPONENTS`] with one.
    #[default]
    Auto,
    /// [`MINIMAL_COMPONENTS`].
    Minimal,
    /// [`BOT_AUTH_COMPONENTS`].
    BotAuth,
    /// [`ENHANCED_COMPONENTS`].
    Enhanced,
}

impl ComponentPreset {
    /// Returns the component list of this preset.
    ///
    /// # Examples
    ///
    /// ```
    /// use web_bot_auth::signature::ComponentPreset;
    ///
    /// assert_eq!(ComponentPreset::Auto.components(false), ["@authority"]);
    /// assert_eq!(ComponentPreset::Auto.components(true), ["@authority", "signature-agent"]);
    /// ```
    #[must_use]
    pub const fn components(self, has_agent: bool) -> &'static [&'static str] {
        match self {
            Self::Auto if has_agent => BOT_AUTH_COMPONENTS,
            Self::Auto | Self::Minimal => MINIMAL_COMPONENTS,
            Self::BotAuth => BOT_AUTH_COMPONENTS,
            Self::Enhanced => ENHANCED_COMPONENTS,
        }
    }

    /// Picks the covered components for a signing call.
    ///
    /// An explicit list always wins; otherwise the preset decides.
    #[must_use]
    pub fn select(self, explicit: Option<&[String]>, has_agent: bool) -> Vec<String> {
        match explicit {
            Some(components) => components.to_vec(),
            None => self.components(has_agent).iter().map(|&c| c.to_owned()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_selection() {
        assert_eq!(ComponentPreset::Auto.select(None, false), ["@authority"]);
        assert_eq!(ComponentPreset::Auto.select(None, true), ["@authority", "signature-agent"]);
    }

    #[test]
    fn test_fixed_presets_ignore_agent() {
        assert_eq!(ComponentPreset::Minimal.components(true), MINIMAL_COMPONENTS);
        assert_eq!(ComponentPreset::BotAuth.components(false), BOT_AUTH_COMPONENTS);
        assert_eq!(ComponentPreset::Enhanced.components(false), ENHANCED_COMPONENTS);
    }

    #[test]
    fn test_explicit_list_wins() {
        let explicit = vec!["@authority".to_owned(), "@method".to_owned()];
        assert_eq!(ComponentPreset::Enhanced.select(Some(&explicit), true), explicit);
    }

    #[test]
    fn test_preset_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            components: ComponentPreset,
        }
        let holder: Holder = toml::from_str("components = \"bot_auth\"").unwrap();
        assert_eq!(holder.components, ComponentPreset::BotAuth);
    }
}
