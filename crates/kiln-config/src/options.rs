//! The flat `[options]` mapping, read once when the pipeline starts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Option switching off mandatory signing.
pub const DEV: &str = "dev";
/// Option that stops before any upload.
pub const DRY_RUN: &str = "dry-run";

/// A single option value as written in `kiln.toml` or passed with `-P`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Named boolean/string options. Immutable once the pipeline starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn new(values: BTreeMap<String, OptionValue>) -> Self {
        Self { values }
    }

    /// Apply `key=value` overrides (from `-P` flags) on top of these options.
    ///
    /// # Errors
    /// Returns an error if an override has no `=` or an empty key.
    pub fn with_overrides<S: AsRef<str>>(mut self, overrides: &[S]) -> Result<Self, OptionsError> {
        for raw in overrides {
            let raw = raw.as_ref();
            let Some((key, value)) = raw.split_once('=') else {
                return Err(OptionsError::MalformedOverride {
                    raw: raw.to_owned(),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(OptionsError::MalformedOverride {
                    raw: raw.to_owned(),
                });
            }
            self.values
                .insert(key.to_owned(), OptionValue::Text(value.trim().to_owned()));
        }
        Ok(self)
    }

    /// Read a boolean option, or `default` when it is not set.
    ///
    /// Accepts TOML booleans and the strings `"true"`/`"false"` (any case).
    ///
    /// # Errors
    /// Returns `OptionsError::NotABoolean` for any other value.
    pub fn flag(&self, name: &str, default: bool) -> Result<bool, OptionsError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(OptionValue::Bool(b)) => Ok(*b),
            Some(OptionValue::Text(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
            Some(OptionValue::Text(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
            Some(OptionValue::Text(s)) => Err(OptionsError::NotABoolean {
                name: name.to_owned(),
                value: s.clone(),
            }),
        }
    }

    /// Read a string option. Booleans are rendered as `"true"`/`"false"`.
    pub fn string(&self, name: &str) -> Option<String> {
        self.values.get(name).map(ToString::to_string)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("option `{name}` must be true or false, got \"{value}\"")]
    NotABoolean { name: String, value: String },

    #[error("malformed option override \"{raw}\" — expected key=value")]
    MalformedOverride { raw: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, OptionValue)]) -> Options {
        Options::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn flag_reads_bool_and_text() {
        let opts = options(&[
            ("dev", OptionValue::Bool(true)),
            ("spotless.apply", OptionValue::Text("FALSE".to_owned())),
        ]);
        assert!(opts.flag("dev", false).unwrap());
        assert!(!opts.flag("spotless.apply", true).unwrap());
    }

    #[test]
    fn flag_default_when_absent() {
        let opts = Options::default();
        assert!(opts.flag(DRY_RUN, true).unwrap());
        assert!(!opts.flag(DRY_RUN, false).unwrap());
    }

    #[test]
    fn flag_rejects_non_boolean() {
        let opts = options(&[("dev", OptionValue::Text("yes".to_owned()))]);
        let err = opts.flag("dev", false).unwrap_err();
        assert!(err.to_string().contains("dev"), "{err}");
    }

    #[test]
    fn overrides_replace_values() {
        let opts = options(&[("dev", OptionValue::Bool(false))])
            .with_overrides(&["dev=true", "repo = local"])
            .unwrap();
        assert!(opts.flag("dev", false).unwrap());
        assert_eq!(opts.string("repo").as_deref(), Some("local"));
    }

    #[test]
    fn malformed_override_rejected() {
        assert!(Options::default().with_overrides(&["dev"]).is_err());
        assert!(Options::default().with_overrides(&["=true"]).is_err());
    }

    #[test]
    fn string_renders_bools() {
        let opts = options(&[("dev", OptionValue::Bool(true))]);
        assert_eq!(opts.string("dev").as_deref(), Some("true"));
        assert!(opts.string("missing").is_none());
    }
}
