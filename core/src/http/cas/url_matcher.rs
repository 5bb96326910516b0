//! URL exclusion pattern matching.
//!
//! The authentication filter can be configured to leave certain request
//! URLs completely untouched. Three matching strategies are supported,
//! selected by a type name at startup:
//!
//! - `CONTAINS` - substring test (the default)
//! - `REGEX` - full regular-expression match against the complete request
//!   URL including the query string
//! - `EXACT` - full-string equality, case-sensitive or not per
//!   configuration
//!
//! # Examples
//!
//! ```rust
//! use actix_cas_core::http::cas::UrlPatternMatcher;
//!
//! let matcher = UrlPatternMatcher::contains("/rest");
//! assert!(matcher.matches("http://host/rest/status"));
//! assert!(!matcher.matches("http://host/protected"));
//!
//! let matcher = UrlPatternMatcher::from_type("REGEX", r".*/public/.*", false).unwrap();
//! assert!(matcher.matches("http://host/public/logo.png"));
//! ```

use regex::Regex;

use crate::http::error::CasError;

/// A URL exclusion predicate, constructed once at startup and read-only
/// thereafter.
#[derive(Debug, Clone)]
pub enum UrlPatternMatcher {
    /// Substring test.
    Contains { pattern: String },
    /// Full regular-expression match against the complete URL.
    Regex { pattern: Regex },
    /// Full-string equality.
    Exact { pattern: String, ignore_case: bool },
}

impl UrlPatternMatcher {
    /// Builds a matcher from a configured type name.
    ///
    /// Unknown type names and invalid regular expressions are configuration
    /// errors; they fail at startup, never per request.
    pub fn from_type(
        type_name: &str,
        pattern: &str,
        ignore_case: bool,
    ) -> Result<Self, CasError> {
        match type_name.to_ascii_uppercase().as_str() {
            "CONTAINS" => Ok(Self::contains(pattern)),
            "REGEX" => Self::regex(pattern),
            "EXACT" => Ok(Self::exact(pattern, ignore_case)),
            other => Err(CasError::configuration(format!(
                "unknown ignoreUrlPatternType [{}]; expected CONTAINS, REGEX or EXACT",
                other
            ))),
        }
    }

    pub fn contains(pattern: impl Into<String>) -> Self {
        UrlPatternMatcher::Contains {
            pattern: pattern.into(),
        }
    }

    /// The pattern must match the entire URL, not just a fragment of it.
    pub fn regex(pattern: &str) -> Result<Self, CasError> {
        let anchored = format!(r"\A(?:{})\z", pattern);
        let pattern = Regex::new(&anchored).map_err(|e| {
            CasError::configuration(format!("invalid ignorePattern regex [{}]: {}", pattern, e))
        })?;
        Ok(UrlPatternMatcher::Regex { pattern })
    }

    pub fn exact(pattern: impl Into<String>, ignore_case: bool) -> Self {
        UrlPatternMatcher::Exact {
            pattern: pattern.into(),
            ignore_case,
        }
    }

    /// Tests the complete request URL (including query string).
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPatternMatcher::Contains { pattern } => url.contains(pattern.as_str()),
            UrlPatternMatcher::Regex { pattern } => pattern.is_match(url),
            UrlPatternMatcher::Exact {
                pattern,
                ignore_case,
            } => {
                if *ignore_case {
                    pattern.eq_ignore_ascii_case(url)
                } else {
                    pattern == url
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
