//! Package metadata fields and their interpretation.
//!
//! A package describes itself in a flat key/value record read from its
//! `zkg.meta` file (see [`file`]) or taken from a package source's aggregated
//! metadata cache. Only a handful of fields are interpreted here:
//!
//! - `aliases` - alternative names, separated by commas or whitespace
//! - `tags` - keyword tags, separated by commas
//! - `description` - free text; [`short_description`] extracts the first sentence
//! - `depends` and other `*depends` fields - `package constraint` pairs
//! - `user_vars` - installation-time variables (see [`user_var`])
//!
//! Unknown fields are carried through untouched.
//!
//! # Absent vs. malformed
//!
//! A field that is not declared and a field that is declared but unusable lead
//! to different decisions: "no dependencies" lets an installation proceed,
//! "unparsable dependencies" must stop it. The parsers that can fail therefore
//! return a [`FieldParse`] instead of overloading an empty container.
//!
//! ```rust
//! use zkg_core::metadata::{dependencies, FieldParse, Metadata};
//!
//! let mut meta = Metadata::new();
//! assert!(dependencies(&meta, "depends").is_absent());
//!
//! meta.insert("depends".into(), "zeek >=4.0.0 foo *".into());
//! let deps = dependencies(&meta, "depends").present().unwrap();
//! assert_eq!(deps["foo"], "*");
//!
//! meta.insert("depends".into(), "zeek >=4.0.0 foo".into());
//! assert!(matches!(dependencies(&meta, "depends"), FieldParse::Malformed(_)));
//! ```

pub mod file;
pub mod user_var;

use crate::core::ZkgError;
use regex::Regex;
use std::collections::BTreeMap;

pub use user_var::{UserVar, UserVarSource};

/// Raw metadata record: field name to field value.
pub type Metadata = BTreeMap<String, String>;

/// Parsed dependency declarations: package (or `zeek`/`zkg`) to version constraint.
pub type Dependencies = BTreeMap<String, String>;

/// Field holding package aliases.
pub const ALIASES_FIELD: &str = "aliases";
/// Field holding keyword tags.
pub const TAGS_FIELD: &str = "tags";
/// Field holding the package description.
pub const DESCRIPTION_FIELD: &str = "description";
/// Default dependency field.
pub const DEPENDS_FIELD: &str = "depends";
/// Field holding user variable declarations.
pub const USER_VARS_FIELD: &str = "user_vars";

/// Outcome of parsing an optional, structured metadata field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldParse<T> {
    /// The field is not declared.
    Absent,
    /// The field is declared but cannot be interpreted.
    Malformed(String),
    /// The field was parsed successfully.
    Present(T),
}

impl<T> FieldParse<T> {
    /// Whether the field is missing from the metadata.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Whether the field is declared but unusable.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// The parsed value, if the field was present and well-formed.
    #[must_use]
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Borrowing view of this outcome.
    #[must_use]
    pub fn as_ref(&self) -> FieldParse<&T> {
        match self {
            Self::Absent => FieldParse::Absent,
            Self::Malformed(reason) => FieldParse::Malformed(reason.clone()),
            Self::Present(value) => FieldParse::Present(value),
        }
    }

    /// Transforms a present value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldParse<U> {
        match self {
            Self::Absent => FieldParse::Absent,
            Self::Malformed(reason) => FieldParse::Malformed(reason),
            Self::Present(value) => FieldParse::Present(f(value)),
        }
    }

    /// Converts a malformed outcome into [`ZkgError::MalformedField`].
    ///
    /// `Absent` becomes `Ok(None)`.
    pub fn into_result(self, field: &str) -> Result<Option<T>, ZkgError> {
        match self {
            Self::Absent => Ok(None),
            Self::Malformed(reason) => Err(ZkgError::MalformedField {
                field: field.to_string(),
                reason,
            }),
            Self::Present(value) => Ok(Some(value)),
        }
    }
}

impl<T: Default> FieldParse<T> {
    /// Treats an absent field as its empty value while still failing on malformed input.
    pub fn or_empty(self, field: &str) -> Result<T, ZkgError> {
        self.into_result(field).map(Option::unwrap_or_default)
    }
}

/// Returns the package aliases declared in the `aliases` field.
///
/// The field is split on commas (with any following whitespace) and on
/// whitespace runs. An absent field yields no aliases.
#[must_use]
pub fn aliases(metadata: &Metadata) -> Vec<String> {
    let Some(value) = metadata.get(ALIASES_FIELD) else {
        return Vec::new();
    };

    let Ok(separator) = Regex::new(r",\s*|\s+") else {
        return vec![value.clone()];
    };

    separator
        .split(value)
        .filter(|alias| !alias.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the keyword tags declared in the `tags` field.
///
/// Tags are comma separated and may themselves contain spaces.
#[must_use]
pub fn tags(metadata: &Metadata) -> Vec<String> {
    let Some(value) = metadata.get(TAGS_FIELD) else {
        return Vec::new();
    };

    let Ok(separator) = Regex::new(r",\s*") else {
        return vec![value.clone()];
    };

    separator
        .split(value)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Index of the first period in `s` that ends a sentence.
///
/// A period ends a sentence when it is the last character or is followed by
/// whitespace, so `1.2.3` and `e.g.` in the middle of a line do not count.
#[must_use]
pub fn find_sentence_end(s: &str) -> Option<usize> {
    let mut iter = s.char_indices().peekable();

    while let Some((idx, c)) = iter.next() {
        if c != '.' {
            continue;
        }
        match iter.peek() {
            None => return Some(idx),
            Some((_, next)) if next.is_whitespace() => return Some(idx),
            Some(_) => {}
        }
    }

    None
}

/// Returns the first sentence of the `description` field.
///
/// Lines are left-trimmed and joined by single spaces until the line holding
/// the first sentence end. An absent field yields an empty string.
#[must_use]
pub fn short_description(metadata: &Metadata) -> String {
    let Some(description) = metadata.get(DESCRIPTION_FIELD) else {
        return String::new();
    };

    let mut rval = String::new();

    for line in description.split('\n') {
        let line = line.trim_start();
        rval.push(' ');

        match find_sentence_end(line) {
            Some(idx) => {
                rval.push_str(&line[..=idx]);
                break;
            }
            None => rval.push_str(line),
        }
    }

    rval.trim_start().to_string()
}

/// Parses a dependency field into `package -> version constraint` pairs.
///
/// The value is split on whitespace and read as alternating keys and values.
/// An odd token count is malformed. Keys are package names or URLs; the keys
/// `zeek` and `zkg` constrain the Zeek and package manager versions.
#[must_use]
pub fn dependencies(metadata: &Metadata, field: &str) -> FieldParse<Dependencies> {
    let Some(value) = metadata.get(field) else {
        return FieldParse::Absent;
    };

    let parts: Vec<&str> = value.split_whitespace().collect();

    if parts.len() % 2 != 0 {
        return FieldParse::Malformed(format!(
            "expected package/version pairs but found {} tokens",
            parts.len()
        ));
    }

    FieldParse::Present(
        parts
            .chunks_exact(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect(),
    )
}

/// Names of all dependency fields in the metadata (`depends`, `external_depends`, ...).
#[must_use]
pub fn dependency_fields(metadata: &Metadata) -> Vec<&str> {
    metadata
        .keys()
        .map(String::as_str)
        .filter(|key| key.ends_with(DEPENDS_FIELD))
        .collect()
}

/// Parses the `user_vars` field.
#[must_use]
pub fn user_vars(metadata: &Metadata) -> FieldParse<Vec<UserVar>> {
    UserVar::parse_metadata(metadata)
}
