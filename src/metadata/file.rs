//! Reading and writing `zkg.meta` files.
//!
//! The metadata file is INI-flavoured key/value text:
//!
//! ```text
//! [package]
//! description = Parses the Foo protocol.
//!     Also ships a few helper scripts.
//! tags = zeek plugin, protocol analyzer
//! depends =
//!     zeek >=4.0.0
//!     zeek/alice/bar *
//! ```
//!
//! - An optional `[package]` header; fields under any other section are ignored
//! - `key = value` or `key: value`, keys are case-insensitive (stored lower-case)
//! - Indented lines continue the previous value, joined with `\n`
//! - Lines starting with `#` or `;` are comments

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use super::Metadata;
use crate::constants::{LEGACY_METADATA_FILENAME, METADATA_FILENAME, METADATA_SECTION};
use crate::core::ZkgError;

/// Returns the metadata file of a package checkout, preferring `zkg.meta`
/// over the legacy `bro-pkg.meta`.
#[must_use]
pub fn find_metadata_file(dir: &Path) -> Option<PathBuf> {
    [METADATA_FILENAME, LEGACY_METADATA_FILENAME]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Parses metadata text.
///
/// `origin` names the text's source in error messages.
pub fn parse_metadata(text: &str, origin: &str) -> Result<Metadata> {
    let section_re = Regex::new(r"^\[([^\]]+)\]\s*$")?;
    let field_re = Regex::new(r"^([^=:\s][^=:]*?)\s*[=:]\s*(.*)$")?;

    let mut metadata = Metadata::new();
    let mut in_package_section = true;
    let mut current_key: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if raw_line.starts_with(char::is_whitespace) {
            let Some(key) = current_key.as_ref() else {
                return Err(parse_error(origin, line_no, "continuation line without a field"));
            };
            if in_package_section {
                if let Some(value) = metadata.get_mut(key) {
                    value.push('\n');
                    value.push_str(trimmed);
                }
            }
            continue;
        }

        if let Some(caps) = section_re.captures(trimmed) {
            in_package_section = caps[1].trim() == METADATA_SECTION;
            current_key = None;
            continue;
        }

        let Some(caps) = field_re.captures(trimmed) else {
            return Err(parse_error(origin, line_no, "expected 'key = value'"));
        };

        let key = caps[1].trim().to_lowercase();
        if in_package_section {
            metadata.insert(key.clone(), caps[2].to_string());
        }
        current_key = Some(key);
    }

    for value in metadata.values_mut() {
        let stripped = value.trim();
        if stripped.len() != value.len() {
            *value = stripped.to_string();
        }
    }

    tracing::trace!("Parsed {} metadata fields from {}", metadata.len(), origin);
    Ok(metadata)
}

fn parse_error(origin: &str, line: usize, reason: &str) -> anyhow::Error {
    ZkgError::MetadataParseError {
        file: origin.to_string(),
        line,
        reason: reason.to_string(),
    }
    .into()
}

/// Renders metadata back into `zkg.meta` text under a `[package]` header.
///
/// Multi-line values are written as indented continuation lines, so
/// [`parse_metadata`] reads the output back into the same record.
#[must_use]
pub fn render_metadata(metadata: &Metadata) -> String {
    let mut out = format!("[{METADATA_SECTION}]\n");

    for (key, value) in metadata {
        let mut lines = value.split('\n');
        match lines.next() {
            Some(first) if !first.is_empty() => out.push_str(&format!("{key} = {first}\n")),
            _ => out.push_str(&format!("{key} =\n")),
        }
        for line in lines {
            out.push_str(&format!("    {line}\n"));
        }
    }

    out
}

/// Reads and parses a metadata file.
pub fn read_metadata_file(path: &Path) -> Result<Metadata> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata file {}", path.display()))?;
    parse_metadata(&content, &path.display().to_string())
}

/// Writes a metadata file, replacing any existing content.
pub fn write_metadata_file(path: &Path, metadata: &Metadata) -> Result<()> {
    fs::write(path, render_metadata(metadata))
        .with_context(|| format!("Failed to write metadata file {}", path.display()))
}

/// Locates and parses the metadata file of a package checkout.
///
/// # Errors
///
/// Returns [`ZkgError::MetadataFileNotFound`] when the checkout carries
/// neither `zkg.meta` nor `bro-pkg.meta`.
pub fn load_package_metadata(dir: &Path) -> Result<(PathBuf, Metadata)> {
    let path = find_metadata_file(dir).ok_or_else(|| ZkgError::MetadataFileNotFound {
        path: dir.display().to_string(),
    })?;
    let metadata = read_metadata_file(&path)?;
    Ok((path, metadata))
}
