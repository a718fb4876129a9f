use serde::{Deserialize, Serialize};

use cfgweave_types::NamedFlags;

use crate::directive::SEPARATOR;
use crate::error::{MergeError, MergeResult};

/// How a directive token that is neither a registered flag nor a built-in
/// directive is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownDirectivePolicy {
    /// The token has no effect.
    #[default]
    Ignore,
    /// The key carrying the token is dropped, as if it named a flag that is
    /// switched off.
    Exclude,
}

/// Configuration for a [`MergeEngine`](crate::MergeEngine).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Named flags registered at construction, applied over the built-in
    /// `disabled = false`.
    pub flags: NamedFlags,
    /// Treatment of unrecognized directive tokens.
    pub unknown_directives: UnknownDirectivePolicy,
}

impl EngineConfig {
    /// A configuration that drops keys carrying unrecognized tokens.
    pub fn strict() -> Self {
        Self {
            unknown_directives: UnknownDirectivePolicy::Exclude,
            ..Default::default()
        }
    }

    /// Register an initial flag.
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.set(name, value);
        self
    }

    /// Reject flag names that no key directive could ever reference.
    pub fn validate(&self) -> MergeResult<()> {
        for (name, _) in self.flags.iter() {
            if let Some(reason) = unreachable_reason(name) {
                return Err(MergeError::UnreachableFlag {
                    name: name.to_string(),
                    reason: reason.into(),
                });
            }
        }
        Ok(())
    }
}

/// Why `name` can never appear as a directive token, if it cannot.
pub(crate) fn unreachable_reason(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("flag name is empty")
    } else if name.contains(SEPARATOR) {
        Some("flag name contains the directive separator '|'")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ignores_unknown_directives() {
        let config = EngineConfig::default();
        assert_eq!(config.unknown_directives, UnknownDirectivePolicy::Ignore);
        assert!(config.flags.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn strict_excludes_unknown_directives() {
        assert_eq!(
            EngineConfig::strict().unknown_directives,
            UnknownDirectivePolicy::Exclude
        );
    }

    #[test]
    fn validate_rejects_empty_name() {
        let err = EngineConfig::default().with_flag("", true).validate().unwrap_err();
        assert!(matches!(err, MergeError::UnreachableFlag { ref name, .. } if name.is_empty()));
    }

    #[test]
    fn validate_rejects_separator_in_name() {
        let err = EngineConfig::default()
            .with_flag("debug|prod", true)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("debug|prod"));
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"flags": {"debug": true}}"#).unwrap();
        assert_eq!(config.flags.get("debug"), Some(true));
        assert_eq!(config.unknown_directives, UnknownDirectivePolicy::Ignore);

        let config: EngineConfig =
            serde_json::from_str(r#"{"unknown_directives": "exclude"}"#).unwrap();
        assert_eq!(config, EngineConfig::strict());
    }
}
