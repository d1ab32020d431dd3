//! URI normalization and single-wildcard pattern matching.
//!
//! URIs are opaque strings to the index, with one equivalence: a single
//! trailing `/` is not significant, so `sogo://alice@mail/` and
//! `sogo://alice@mail` name the same record. Lookup patterns may carry at
//! most one `*` wildcard, which matches any run of characters (including
//! none) between a fixed prefix and suffix.

use crate::error::{CoreError, CoreResult};

/// Strip at most one trailing `/` from a URI.
pub fn normalize_uri(uri: &str) -> &str {
    uri.strip_suffix('/').unwrap_or(uri)
}

/// A parsed lookup pattern: either a literal URI or a `prefix*suffix`
/// wildcard. Matching always applies trailing-slash normalization to both
/// the pattern (at parse time) and the candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UriPattern {
    Exact(String),
    Wildcard { prefix: String, suffix: String },
}

impl UriPattern {
    /// Parse a pattern with wildcard support. More than one `*` is an error.
    pub fn parse(pattern: &str) -> CoreResult<Self> {
        let pattern = normalize_uri(pattern);
        let mut parts = pattern.split('*');
        let first = parts.next().unwrap_or_default();
        match (parts.next(), parts.next()) {
            (None, _) => Ok(UriPattern::Exact(first.to_string())),
            (Some(rest), None) => Ok(UriPattern::Wildcard {
                prefix: first.to_string(),
                suffix: rest.to_string(),
            }),
            (Some(_), Some(_)) => Err(CoreError::InvalidPattern(format!(
                "at most one '*' wildcard is allowed: {pattern:?}"
            ))),
        }
    }

    /// Treat a string as a literal URI, wildcards and all.
    pub fn literal(uri: &str) -> Self {
        UriPattern::Exact(normalize_uri(uri).to_string())
    }

    pub fn matches(&self, uri: &str) -> bool {
        let uri = normalize_uri(uri);
        match self {
            UriPattern::Exact(exact) => uri == exact,
            UriPattern::Wildcard { prefix, suffix } => {
                uri.len() >= prefix.len() + suffix.len()
                    && uri.starts_with(prefix.as_str())
                    && uri.ends_with(suffix.as_str())
            }
        }
    }
}
