//! Path converters for URL pattern matching.
//!
//! This module provides the [`PathConverter`] trait, the built-in converters,
//! and the process-wide converter registry that maps a short tag (`int`,
//! `str`, `slug`, `uuid`, `path`, or a user-registered tag) to a converter.
//!
//! # Built-in converters
//!
//! | Tag    | Regex                                  | Rust type |
//! |--------|----------------------------------------|-----------|
//! | `int`  | `[0-9]+`                               | `i64`     |
//! | `str`  | `[^/]+`                                | `String`  |
//! | `slug` | `[-a-zA-Z0-9_]+`                       | `String`  |
//! | `uuid` | `[0-9a-f]{8}-...-[0-9a-f]{12}`         | `Uuid`    |
//! | `path` | `.+`                                   | `String`  |
//!
//! Conversion failures come in two flavors with very different handling:
//! [`ConversionError::Invalid`] means "this value does not fit" and makes the
//! engine try the next pattern or candidate, while
//! [`ConversionError::Failure`] is a bug in the converter and always
//! propagates out of `resolve()`/`reverse()`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use urlmap_core::{UrlmapError, UrlmapResult};

/// A typed value captured from a URL path segment, or supplied to a reverse
/// lookup.
///
/// Custom converters reuse these variants for their own types; the common
/// case is parsing into [`PathValue::Str`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathValue {
    /// An integer value, produced by [`IntConverter`].
    Int(i64),
    /// A string value (no slashes), produced by [`StrConverter`].
    Str(String),
    /// A slug value (letters, digits, hyphens, underscores), produced by
    /// [`SlugConverter`].
    Slug(String),
    /// A UUID value, produced by [`UuidConverter`].
    Uuid(uuid::Uuid),
    /// A path value (may contain slashes), produced by
    /// [`PathSegmentConverter`].
    Path(String),
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) | Self::Slug(v) | Self::Path(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for PathValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for PathValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PathValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<uuid::Uuid> for PathValue {
    fn from(v: uuid::Uuid) -> Self {
        Self::Uuid(v)
    }
}

/// A failed conversion between a path segment and a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The value does not fit this converter. Recoverable: the engine treats
    /// it as "no match" and moves on to the next pattern or candidate.
    Invalid(String),
    /// The converter itself misbehaved. Fatal: never caught by the engine.
    Failure(String),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid value: {msg}"),
            Self::Failure(msg) => write!(f, "converter failure: {msg}"),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Trait for converting URL path segments to typed values and back.
///
/// `regex` constrains what a placeholder using this converter can match;
/// `to_rust` runs on every successful regex capture during forward
/// resolution; `to_url` runs on every candidate substitution during reverse
/// construction.
pub trait PathConverter: Send + Sync + fmt::Debug {
    /// Returns the regex fragment that matches valid values for this
    /// converter. The fragment is spliced into a larger pattern, so it must
    /// not contain capture groups or anchors.
    fn regex(&self) -> &str;

    /// Converts a matched string segment into a typed [`PathValue`].
    ///
    /// # Errors
    ///
    /// [`ConversionError::Invalid`] if the value cannot be parsed (the
    /// pattern then simply does not match); [`ConversionError::Failure`] for
    /// converter bugs.
    fn to_rust(&self, value: &str) -> Result<PathValue, ConversionError>;

    /// Converts a [`PathValue`] back into a URL path segment.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Invalid`] if the value cannot be rendered by this
    /// converter (the reverse candidate is then skipped);
    /// [`ConversionError::Failure`] for converter bugs.
    fn to_url(&self, value: &PathValue) -> Result<String, ConversionError>;
}

/// Converter for integer path segments.
///
/// Matches one or more digits and converts them to `i64`. A digit string too
/// large for `i64` is an invalid value, so the pattern does not match.
#[derive(Debug, Clone, Copy)]
pub struct IntConverter;

impl PathConverter for IntConverter {
    fn regex(&self) -> &str {
        "[0-9]+"
    }

    fn to_rust(&self, value: &str) -> Result<PathValue, ConversionError> {
        value
            .parse::<i64>()
            .map(PathValue::Int)
            .map_err(|_| ConversionError::Invalid(format!("not an integer: {value}")))
    }

    fn to_url(&self, value: &PathValue) -> Result<String, ConversionError> {
        match value {
            PathValue::Int(v) => Ok(v.to_string()),
            // A pre-rendered digit string is accepted; the reverse engine's
            // final regex check rejects anything that is not all digits.
            PathValue::Str(v) | PathValue::Slug(v) => Ok(v.clone()),
            other => Err(ConversionError::Invalid(format!(
                "IntConverter cannot render {other:?}"
            ))),
        }
    }
}

/// Converter for string path segments (no slashes).
#[derive(Debug, Clone, Copy)]
pub struct StrConverter;

impl PathConverter for StrConverter {
    fn regex(&self) -> &str {
        "[^/]+"
    }

    fn to_rust(&self, value: &str) -> Result<PathValue, ConversionError> {
        if value.is_empty() {
            return Err(ConversionError::Invalid(
                "str converter requires a non-empty value".to_string(),
            ));
        }
        Ok(PathValue::Str(value.to_string()))
    }

    fn to_url(&self, value: &PathValue) -> Result<String, ConversionError> {
        Ok(value.to_string())
    }
}

/// Converter for slug path segments: ASCII letters, digits, hyphens, and
/// underscores.
#[derive(Debug, Clone, Copy)]
pub struct SlugConverter;

impl PathConverter for SlugConverter {
    fn regex(&self) -> &str {
        "[-a-zA-Z0-9_]+"
    }

    fn to_rust(&self, value: &str) -> Result<PathValue, ConversionError> {
        if value.is_empty() {
            return Err(ConversionError::Invalid(
                "slug converter requires a non-empty value".to_string(),
            ));
        }
        Ok(PathValue::Slug(value.to_string()))
    }

    fn to_url(&self, value: &PathValue) -> Result<String, ConversionError> {
        match value {
            PathValue::Slug(v) | PathValue::Str(v) => Ok(v.clone()),
            other => Err(ConversionError::Invalid(format!(
                "SlugConverter cannot render {other:?}"
            ))),
        }
    }
}

/// Converter for UUID path segments.
///
/// Matches only the canonical 36-character dashed lowercase hex form.
#[derive(Debug, Clone, Copy)]
pub struct UuidConverter;

impl PathConverter for UuidConverter {
    fn regex(&self) -> &str {
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"
    }

    fn to_rust(&self, value: &str) -> Result<PathValue, ConversionError> {
        value
            .parse::<uuid::Uuid>()
            .map(PathValue::Uuid)
            .map_err(|_| ConversionError::Invalid(format!("not a UUID: {value}")))
    }

    fn to_url(&self, value: &PathValue) -> Result<String, ConversionError> {
        match value {
            PathValue::Uuid(v) => Ok(v.to_string()),
            PathValue::Str(v) => v
                .parse::<uuid::Uuid>()
                .map(|u| u.to_string())
                .map_err(|_| ConversionError::Invalid(format!("not a UUID: {v}"))),
            other => Err(ConversionError::Invalid(format!(
                "UuidConverter cannot render {other:?}"
            ))),
        }
    }
}

/// Converter for path segments that may contain slashes.
///
/// Useful for capturing the remainder of a URL path.
#[derive(Debug, Clone, Copy)]
pub struct PathSegmentConverter;

impl PathConverter for PathSegmentConverter {
    fn regex(&self) -> &str {
        ".+"
    }

    fn to_rust(&self, value: &str) -> Result<PathValue, ConversionError> {
        if value.is_empty() {
            return Err(ConversionError::Invalid(
                "path converter requires a non-empty value".to_string(),
            ));
        }
        Ok(PathValue::Path(value.to_string()))
    }

    fn to_url(&self, value: &PathValue) -> Result<String, ConversionError> {
        Ok(value.to_string())
    }
}

type ConverterMap = HashMap<String, Arc<dyn PathConverter>>;

static CONVERTERS: Lazy<RwLock<ConverterMap>> = Lazy::new(|| {
    let mut map: ConverterMap = HashMap::new();
    map.insert("int".to_string(), Arc::new(IntConverter));
    map.insert("str".to_string(), Arc::new(StrConverter));
    map.insert("slug".to_string(), Arc::new(SlugConverter));
    map.insert("uuid".to_string(), Arc::new(UuidConverter));
    map.insert("path".to_string(), Arc::new(PathSegmentConverter));
    RwLock::new(map)
});

/// Registers a converter under the given tag, making it available to route
/// patterns as `<tag:name>`.
///
/// Re-registering an existing tag (including a built-in) overwrites the
/// previous converter; patterns compiled before the overwrite keep the
/// converter they were compiled with.
pub fn register_converter(tag: &str, converter: Arc<dyn PathConverter>) {
    if let Ok(mut map) = CONVERTERS.write() {
        map.insert(tag.to_string(), converter);
    }
}

/// Looks up the converter registered under `tag`.
///
/// # Errors
///
/// Returns [`UrlmapError::ImproperlyConfigured`] if no converter is
/// registered under the tag.
pub fn get_converter(tag: &str) -> UrlmapResult<Arc<dyn PathConverter>> {
    CONVERTERS
        .read()
        .ok()
        .and_then(|map| map.get(tag).cloned())
        .ok_or_else(|| {
            UrlmapError::ImproperlyConfigured(format!("Unknown path converter type: {tag}"))
        })
}
