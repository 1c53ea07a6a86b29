//! User variables declared by packages.
//!
//! A package may ask for configuration at install time through its
//! `user_vars` field. Each entry has the form `NAME [default] "description"`:
//!
//! ```text
//! user_vars =
//!     LIBRDKAFKA_ROOT [/usr] "Path to the librdkafka installation"
//!     KAFKA_TOPIC [zeek] "Topic the plugin publishes to"
//! ```
//!
//! The value used for a variable comes from, in order: an explicit
//! `NAME=value` override, the environment variable `NAME`, the value saved in
//! the engine configuration, and finally the declared default.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{FieldParse, Metadata, USER_VARS_FIELD};

/// A user variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVar {
    /// Variable name (word characters only).
    pub name: String,
    /// Value used when nothing else supplies one.
    pub default: String,
    /// Human readable description shown when prompting.
    pub description: String,
}

/// Where a resolved user variable value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVarSource {
    /// A `NAME=value` override given by the caller.
    Override,
    /// The process environment.
    Environment,
    /// A value saved in the engine configuration.
    Config,
    /// The declared default.
    Default,
}

impl fmt::Display for UserVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] \"{}\"", self.name, self.default, self.description)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl UserVar {
    /// Creates a declaration.
    pub fn new(
        name: impl Into<String>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            description: description.into(),
        }
    }

    /// Parses the `user_vars` field of a metadata record.
    ///
    /// An absent field is [`FieldParse::Absent`], a blank field yields an empty
    /// list, and a single bad entry makes the whole field malformed.
    #[must_use]
    pub fn parse_metadata(metadata: &Metadata) -> FieldParse<Vec<Self>> {
        match metadata.get(USER_VARS_FIELD) {
            None => FieldParse::Absent,
            Some(text) => match Self::parse_list(text) {
                Ok(vars) => FieldParse::Present(vars),
                Err(reason) => {
                    tracing::debug!("Malformed user_vars field: {}", reason);
                    FieldParse::Malformed(reason)
                }
            },
        }
    }

    /// Parses a whitespace separated list of declarations.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, String> {
        let entry = Regex::new(r#"^(\w+)\s*\[([^\]]*)\]\s*"([^"]*)""#)
            .map_err(|e| format!("invalid user variable grammar: {e}"))?;

        let mut rval = Vec::new();
        let mut rest = text.trim_start();

        while !rest.is_empty() {
            let Some(caps) = entry.captures(rest) else {
                return Err(format!("invalid user variable declaration at '{}'", first_token(rest)));
            };
            let name = &caps[1];

            let remaining = &rest[caps[0].len()..];
            if remaining.starts_with(|c: char| !c.is_whitespace()) {
                return Err(format!("unexpected text after user variable '{name}'"));
            }

            rval.push(Self::new(name, &caps[2], &caps[3]));
            rest = remaining.trim_start();
        }

        Ok(rval)
    }

    /// Parses a `NAME=value` override.
    ///
    /// Returns `None` when there is no `=` or the name is not a valid
    /// variable name.
    #[must_use]
    pub fn parse_arg(arg: &str) -> Option<(String, String)> {
        let (name, value) = arg.split_once('=')?;
        if name.is_empty() || !name.chars().all(is_word_char) {
            return None;
        }
        Some((name.to_string(), value.to_string()))
    }

    /// Resolves the value of this variable along with where it came from.
    pub fn resolve(
        &self,
        overrides: &HashMap<String, String>,
        config_values: &BTreeMap<String, String>,
    ) -> (String, UserVarSource) {
        if let Some(value) = overrides.get(&self.name) {
            return (value.clone(), UserVarSource::Override);
        }
        if let Ok(value) = std::env::var(&self.name) {
            return (value, UserVarSource::Environment);
        }
        if let Some(value) = config_values.get(&self.name) {
            return (value.clone(), UserVarSource::Config);
        }
        (self.default.clone(), UserVarSource::Default)
    }
}

fn first_token(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn meta(value: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert(USER_VARS_FIELD.to_string(), value.to_string());
        m
    }

    #[test]
    fn test_parse_declarations() {
        let m = meta(
            "LIBRDKAFKA_ROOT [/usr] \"Path to the librdkafka installation\"\n\
             KAFKA_TOPIC [zeek] \"Topic the plugin publishes to\"",
        );
        let vars = UserVar::parse_metadata(&m).present().unwrap();
        assert_eq!(
            vars,
            vec![
                UserVar::new("LIBRDKAFKA_ROOT", "/usr", "Path to the librdkafka installation"),
                UserVar::new("KAFKA_TOPIC", "zeek", "Topic the plugin publishes to"),
            ]
        );
    }

    #[test]
    fn test_parse_empty_default_and_spacing() {
        let vars = UserVar::parse_list("OPT   []   \"optional\"").unwrap();
        assert_eq!(vars, vec![UserVar::new("OPT", "", "optional")]);
    }

    #[test]
    fn test_absent_blank_and_malformed() {
        assert!(UserVar::parse_metadata(&Metadata::new()).is_absent());
        assert_eq!(UserVar::parse_metadata(&meta("  \n ")), FieldParse::Present(Vec::new()));

        for bad in [
            "NAME \"no default\"",
            "NAME [x]",
            "NAME [x \"unterminated default\"",
            "[x] \"no name\"",
            "A [1] \"ok\" B [2]",
            "A [1] \"ok\"trailing",
        ] {
            assert!(UserVar::parse_metadata(&meta(bad)).is_malformed(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_malformed_reason_names_offending_entry() {
        let err = UserVar::parse_list("A [1] \"ok\"trailing").unwrap_err();
        assert_eq!(err, "unexpected text after user variable 'A'");

        let err = UserVar::parse_list("A [1] \"ok\" [x] \"no name\"").unwrap_err();
        assert_eq!(err, "invalid user variable declaration at '[x]'");
    }

    #[test]
    fn test_display_round_trips() {
        let var = UserVar::new("ROOT", "/opt", "Install root");
        let parsed = UserVar::parse_list(&var.to_string()).unwrap();
        assert_eq!(parsed, vec![var]);
    }

    #[test]
    fn test_parse_arg() {
        assert_eq!(
            UserVar::parse_arg("ROOT=/opt/x=y"),
            Some(("ROOT".to_string(), "/opt/x=y".to_string()))
        );
        assert_eq!(UserVar::parse_arg("ROOT="), Some(("ROOT".to_string(), String::new())));
        assert_eq!(UserVar::parse_arg("ROOT"), None);
        assert_eq!(UserVar::parse_arg("=value"), None);
        assert_eq!(UserVar::parse_arg("BAD-NAME=1"), None);
    }

    #[test]
    #[serial]
    fn test_resolve_precedence() {
        let var = UserVar::new("ZKG_CORE_TEST_RESOLVE_VAR", "fallback", "test variable");
        let mut overrides = HashMap::new();
        let mut config = BTreeMap::new();

        // SAFETY: serialized with other environment-mutating tests.
        unsafe { std::env::remove_var(&var.name) };
        assert_eq!(
            var.resolve(&overrides, &config),
            ("fallback".to_string(), UserVarSource::Default)
        );

        config.insert(var.name.clone(), "saved".to_string());
        assert_eq!(var.resolve(&overrides, &config), ("saved".to_string(), UserVarSource::Config));

        // SAFETY: serialized with other environment-mutating tests.
        unsafe { std::env::set_var(&var.name, "from-env") };
        assert_eq!(
            var.resolve(&overrides, &config),
            ("from-env".to_string(), UserVarSource::Environment)
        );

        overrides.insert(var.name.clone(), "explicit".to_string());
        assert_eq!(
            var.resolve(&overrides, &config),
            ("explicit".to_string(), UserVarSource::Override)
        );

        // SAFETY: serialized with other environment-mutating tests.
        unsafe { std::env::remove_var(&var.name) };
    }
}
