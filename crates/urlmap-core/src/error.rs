//! Core error types for the urlmap engine.
//!
//! Two disjoint failure families live here. [`Resolver404`] and
//! [`NoReverseMatch`] are the structured "no match found" outcomes of forward
//! and reverse resolution; both carry the ordered list of everything that was
//! attempted so that callers can render useful diagnostics. Everything else in
//! [`UrlmapError`] is a configuration or programmer error and is never
//! produced during normal matching.

use std::fmt;

use thiserror::Error;

/// The structured payload of a failed forward resolution.
///
/// `tried` holds one entry per pattern chain attempted, in the order the
/// resolver attempted them. Each chain lists the pattern descriptions from
/// the outermost prefix down to the leaf that failed. An empty `tried` means
/// the path did not even match the root prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver404 {
    /// The path that failed to resolve.
    pub path: String,
    /// Every pattern chain attempted, in attempt order.
    pub tried: Vec<Vec<String>>,
}

impl fmt::Display for Resolver404 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tried.is_empty() {
            write!(f, "No URL pattern matched '{}'", self.path)
        } else {
            write!(
                f,
                "No URL pattern matched '{}'. {} pattern chain(s) tried: [",
                self.path,
                self.tried.len()
            )?;
            for (i, chain) in self.tried.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", chain.join(" "))?;
            }
            write!(f, "]")
        }
    }
}

impl std::error::Error for Resolver404 {}

/// The structured payload of a failed reverse lookup.
///
/// Each variant preserves what was being looked up and, where applicable,
/// the ordered list of candidate patterns that were tried before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoReverseMatch {
    /// The name is not registered anywhere in the active resolver tree.
    UnknownName {
        /// The view name that was looked up.
        lookup: String,
    },
    /// A namespace segment was not found while descending the namespace path.
    UnknownNamespace {
        /// The namespace segment that failed to resolve.
        namespace: String,
        /// The successfully resolved portion of the namespace path, if any.
        within: Option<String>,
    },
    /// A handler reference is bound under more than one distinct name.
    AmbiguousHandler {
        /// The handler's display label.
        handler: String,
        /// Every qualified name the handler is bound to.
        names: Vec<String>,
    },
    /// Candidates existed under the name, but none accepted the arguments.
    Exhausted {
        /// The view name that was looked up.
        lookup: String,
        /// A human-readable description of the supplied arguments.
        arg_desc: String,
        /// The pattern text of every candidate tried, in attempt order.
        tried: Vec<String>,
    },
}

impl fmt::Display for NoReverseMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownName { lookup } => write!(
                f,
                "Reverse for '{lookup}' not found. '{lookup}' is not a valid \
                 view function or pattern name."
            ),
            Self::UnknownNamespace { namespace, within } => match within {
                Some(path) => write!(
                    f,
                    "'{namespace}' is not a registered namespace inside '{path}'"
                ),
                None => write!(f, "'{namespace}' is not a registered namespace"),
            },
            Self::AmbiguousHandler { handler, names } => write!(
                f,
                "Reverse for handler '{handler}' is ambiguous: it is bound to \
                 {} names: {names:?}",
                names.len()
            ),
            Self::Exhausted {
                lookup,
                arg_desc,
                tried,
            } => write!(
                f,
                "Reverse for '{lookup}' with {arg_desc} not found. \
                 {} pattern(s) tried: {tried:?}",
                tried.len()
            ),
        }
    }
}

impl std::error::Error for NoReverseMatch {}

/// The primary error type for the urlmap engine.
///
/// [`NotFound`](UrlmapError::NotFound) and
/// [`NoReverseMatch`](UrlmapError::NoReverseMatch) are the expected
/// "no match" outcomes of resolution and reversal. All other variants are
/// fatal configuration or programmer errors: the engine never swallows them
/// into a retry or a 404.
#[derive(Error, Debug)]
pub enum UrlmapError {
    /// Forward resolution exhausted every pattern without a match.
    #[error("{0}")]
    NotFound(Resolver404),

    /// Reverse construction exhausted every candidate without a match.
    #[error("{0}")]
    NoReverseMatch(NoReverseMatch),

    /// The URL configuration itself is invalid.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    /// A converter failed with something other than a value mismatch.
    /// This indicates a bug in the converter, not bad input.
    #[error("Converter error: {0}")]
    ConverterError(String),

    /// An I/O error occurred (settings loading).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A convenience type alias for `Result<T, UrlmapError>`.
pub type UrlmapResult<T> = Result<T, UrlmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver404_display_without_tried() {
        let err = Resolver404 {
            path: "missing/".to_string(),
            tried: Vec::new(),
        };
        assert_eq!(err.to_string(), "No URL pattern matched 'missing/'");
    }

    #[test]
    fn test_resolver404_display_with_tried() {
        let err = Resolver404 {
            path: "articles/xx/".to_string(),
            tried: vec![
                vec!["'articles/<int:year>/'".to_string()],
                vec!["'api/'".to_string(), "'posts/'".to_string()],
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 pattern chain(s) tried"));
        assert!(text.contains("'articles/<int:year>/'"));
        assert!(text.contains("'api/' 'posts/'"));
    }

    #[test]
    fn test_no_reverse_match_unknown_name() {
        let err = NoReverseMatch::UnknownName {
            lookup: "nonexistent-view".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Reverse for 'nonexistent-view' not found. 'nonexistent-view' is \
             not a valid view function or pattern name."
        );
    }

    #[test]
    fn test_no_reverse_match_unknown_namespace() {
        let err = NoReverseMatch::UnknownNamespace {
            namespace: "blog".to_string(),
            within: None,
        };
        assert_eq!(err.to_string(), "'blog' is not a registered namespace");

        let err = NoReverseMatch::UnknownNamespace {
            namespace: "inner".to_string(),
            within: Some("outer".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "'inner' is not a registered namespace inside 'outer'"
        );
    }

    #[test]
    fn test_no_reverse_match_exhausted() {
        let err = NoReverseMatch::Exhausted {
            lookup: "places".to_string(),
            arg_desc: "no arguments".to_string(),
            tried: vec!["places/([0-9]+)/$".to_string()],
        };
        let text = err.to_string();
        assert!(text.starts_with("Reverse for 'places' with no arguments not found."));
        assert!(text.contains("1 pattern(s) tried"));
    }

    #[test]
    fn test_urlmap_error_display() {
        let err = UrlmapError::ImproperlyConfigured("bad route".to_string());
        assert_eq!(err.to_string(), "Improperly configured: bad route");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: UrlmapError = io_err.into();
        assert!(err.to_string().contains("file missing"));
    }
}
