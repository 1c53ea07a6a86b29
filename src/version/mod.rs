//! Version tag normalization and ordering.
//!
//! Packages publish releases as Git tags. Tags are free-form, so before they can
//! be ordered they are normalized (a leading `v` before a digit is dropped) and
//! coerced into a three-component semantic version. Tags that cannot be coerced
//! are not versions: they are silently left out of every ordered list rather
//! than reported as errors.
//!
//! # Coercion
//!
//! [`coerce`] accepts anything that starts with `MAJOR[.MINOR[.PATCH]]`:
//!
//! | Tag | Version |
//! |-----|---------|
//! | `1` | `1.0.0` |
//! | `1.2` | `1.2.0` |
//! | `1.2.3.4` | `1.2.3+4` |
//! | `1.0-beta.2` | `1.0.0-beta.2` |
//! | `2.0.0rc1+build` | `2.0.0-rc1+build` |
//! | `release-1` | not a version |
//!
//! # Examples
//!
//! ```rust
//! use zkg_core::version::sorted_version_tags;
//!
//! let tags = ["v1.10.0", "main-snapshot", "v1.2.0", "0.9"];
//! assert_eq!(sorted_version_tags(&tags), vec!["0.9", "v1.2.0", "v1.10.0"]);
//! ```

use semver::{BuildMetadata, Prerelease, Version};

/// Given a version string `vX.Y.Z`, returns `X.Y.Z`.
///
/// Only a `v` directly followed by a digit is stripped; every other input is
/// returned unchanged, which makes the function idempotent.
#[must_use]
pub fn normalize_tag(tag: &str) -> &str {
    let mut chars = tag.chars();
    match (chars.next(), chars.next()) {
        (Some('v'), Some(c)) if c.is_ascii_digit() => &tag[1..],
        _ => tag,
    }
}

/// Best-effort conversion of an (already normalized) tag into a semantic version.
///
/// Returns `None` when the tag does not begin with a numeric version core or when
/// its pre-release/build remainder is not valid semver.
#[must_use]
pub fn coerce(tag: &str) -> Option<Version> {
    let bytes = tag.as_bytes();
    let mut core: Vec<u64> = Vec::with_capacity(3);
    let mut pos = 0;

    loop {
        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }

        if pos == start {
            if core.is_empty() {
                return None;
            }
            // The '.' we consumed does not belong to the version core.
            pos = start - 1;
            break;
        }

        core.push(tag[start..pos].parse().ok()?);

        if core.len() == 3 || pos >= bytes.len() || bytes[pos] != b'.' {
            break;
        }
        pos += 1;
    }

    core.resize(3, 0);
    let mut version = Version::new(core[0], core[1], core[2]);

    let rest: String = tag[pos..]
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if rest.is_empty() {
        return Some(version);
    }

    let (pre, build) = match rest.as_bytes()[0] {
        b'+' | b'.' => ("", &rest[1..]),
        b'-' => rest[1..].split_once('+').unwrap_or((&rest[1..], "")),
        _ => rest.split_once('+').unwrap_or((rest.as_str(), "")),
    };

    version.pre = Prerelease::new(pre).ok()?;
    version.build = BuildMetadata::new(&build.replace('+', ".")).ok()?;
    Some(version)
}

/// Coerces a raw tag, applying [`normalize_tag`] first.
#[must_use]
pub fn coerce_tag(tag: &str) -> Option<Version> {
    coerce(normalize_tag(tag))
}

/// Sorts raw tags by semantic-version precedence, dropping tags that are not versions.
///
/// The returned strings keep their original spelling (`v1.0.0` stays `v1.0.0`).
/// Build metadata does not take part in the ordering, and tags with equal
/// precedence keep their input order.
#[must_use]
pub fn sorted_version_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut versions: Vec<(Version, &str)> = tags
        .iter()
        .filter_map(|tag| {
            let tag = tag.as_ref();
            coerce_tag(tag).map(|version| (version, tag))
        })
        .collect();

    versions.sort_by(|a, b| a.0.cmp_precedence(&b.0));
    versions.into_iter().map(|(_, tag)| tag.to_string()).collect()
}

/// Whether `s` looks like a full 40-character hexadecimal SHA-1 commit hash.
#[must_use]
pub fn is_sha1(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("v1.2.3"), "1.2.3");
        assert_eq!(normalize_tag("1.2.3"), "1.2.3");
        assert_eq!(normalize_tag("version-1"), "version-1");
        assert_eq!(normalize_tag("v"), "v");
        assert_eq!(normalize_tag("vx1"), "vx1");
        assert_eq!(normalize_tag(""), "");
    }

    #[test]
    fn test_normalize_tag_is_idempotent() {
        for tag in ["v1.0.0", "vv1.0", "v", "", "1.0", "v2", "release", "v1v2"] {
            let once = normalize_tag(tag);
            assert_eq!(normalize_tag(once), once, "not idempotent for {tag:?}");
        }
    }

    #[test]
    fn test_coerce_partial_versions() {
        assert_eq!(coerce("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(coerce("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(coerce("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(coerce("01.002.3"), Some(Version::new(1, 2, 3)));
    }

    #[test]
    fn test_coerce_remainders() {
        assert_eq!(coerce("1.2.3.4").unwrap().to_string(), "1.2.3+4");
        assert_eq!(coerce("1.0-beta.2").unwrap().to_string(), "1.0.0-beta.2");
        assert_eq!(coerce("2.0.0rc1+build").unwrap().to_string(), "2.0.0-rc1+build");
        assert_eq!(coerce("1.0.0+a+b").unwrap().to_string(), "1.0.0+a.b");
        assert_eq!(coerce("1.x").unwrap().to_string(), "1.0.0+x");
        assert_eq!(coerce("1.0_alpha").unwrap().to_string(), "1.0.0-alpha");
    }

    #[test]
    fn test_coerce_rejects_non_versions() {
        assert_eq!(coerce("release-1"), None);
        assert_eq!(coerce("v1.0.0"), None);
        assert_eq!(coerce(""), None);
        assert_eq!(coerce("1.0.0-beta..1"), None);
        assert_eq!(coerce_tag("v1.0.0"), Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_sorted_version_tags_orders_semantically() {
        let tags = ["v1.10.0", "v1.2.0", "v1.9.3", "v0.1.0"];
        assert_eq!(sorted_version_tags(&tags), vec!["v0.1.0", "v1.2.0", "v1.9.3", "v1.10.0"]);
    }

    #[test]
    fn test_sorted_version_tags_drops_and_preserves_spelling() {
        let tags = vec![
            "nightly".to_string(),
            "v2.0.0".to_string(),
            "1.0".to_string(),
            "2.0.0-rc.1".to_string(),
            "latest".to_string(),
        ];
        assert_eq!(sorted_version_tags(&tags), vec!["1.0", "2.0.0-rc.1", "v2.0.0"]);
    }

    #[test]
    fn test_sorted_version_tags_prerelease_ordering() {
        let tags = ["1.0.0", "1.0.0-rc.1", "1.0.0-alpha", "1.0.0-alpha.10", "1.0.0-alpha.2"];
        assert_eq!(
            sorted_version_tags(&tags),
            vec!["1.0.0-alpha", "1.0.0-alpha.2", "1.0.0-alpha.10", "1.0.0-rc.1", "1.0.0"]
        );
    }

    #[test]
    fn test_sorted_version_tags_is_stable_for_ties() {
        let tags = ["v1.0.0", "1.0.0", "1.0", "1.0.0+meta"];
        assert_eq!(sorted_version_tags(&tags), vec!["v1.0.0", "1.0.0", "1.0", "1.0.0+meta"]);
    }

    #[test]
    fn test_sorted_version_tags_is_non_decreasing() {
        let tags = ["3", "0.0.1", "v2.5", "2.5.0-beta", "10.0.0", "bogus", "1.1.1.1", "v0.9"];
        let sorted = sorted_version_tags(&tags);
        let versions: Vec<Version> = sorted.iter().map(|t| coerce_tag(t).unwrap()).collect();
        for pair in versions.windows(2) {
            assert_ne!(pair[0].cmp_precedence(&pair[1]), Ordering::Greater);
        }
        assert_eq!(sorted.len(), 7);
    }

    #[test]
    fn test_is_sha1() {
        assert!(is_sha1("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_sha1("0123456789ABCDEF0123456789abcdef01234567"));
        assert!(!is_sha1("0123456789abcdef"));
        assert!(!is_sha1(""));
        assert!(!is_sha1("main"));
    }
}
