//! URL pattern compilation and matching.
//!
//! A [`Pattern`] is the compiled form of one route definition, produced by
//! either of two parse paths: route syntax (`"articles/<int:year>/"`) or raw
//! regex syntax (`r"^articles/(?P<year>[0-9]{4})/$"`). Both produce the same
//! shape — a compiled matcher plus ordered placeholder descriptors — so the
//! resolver and reverse engines never care which syntax a pattern came from.
//!
//! [`URLPattern`] binds a compiled pattern to a handler reference, an
//! optional name for reverse lookups, and fixed default kwargs.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use urlmap_core::utils::text::is_identifier;
use urlmap_core::{UrlmapError, UrlmapResult};

use crate::converters::{self, ConversionError, PathConverter, PathValue};
use crate::handler::HandlerRef;

/// A named converter entry: `(parameter_name, converter)`.
pub type ConverterEntry = (String, Arc<dyn PathConverter>);

/// Matches the `<converter:parameter>` components of a route string.
static PATH_PARAMETER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:(?P<converter>[^>:]+):)?(?P<parameter>[^>]+)>")
        .expect("placeholder component regex is valid")
});

/// Which parse path produced a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    /// Route syntax with `<converter:name>` placeholders.
    Route,
    /// Raw regex syntax.
    Regex,
}

/// One placeholder of a pattern, in order of appearance.
///
/// `name` is `None` for an unnamed regex group; `converter` is `None` for
/// regex-syntax placeholders, which capture raw strings.
#[derive(Debug, Clone)]
pub struct Placeholder {
    /// The parameter name, if the placeholder is named.
    pub name: Option<String>,
    /// The converter, for route-syntax placeholders.
    pub converter: Option<Arc<dyn PathConverter>>,
}

/// The result of matching a pattern against (a prefix of) a path.
#[derive(Debug, Clone)]
pub struct PathMatch {
    /// The part of the path after the matched prefix.
    pub remainder: String,
    /// Positional captures; populated only when the pattern has no named
    /// groups.
    pub args: Vec<PathValue>,
    /// Named captures, converted to typed values for route patterns.
    pub kwargs: HashMap<String, PathValue>,
}

/// A compiled route matcher plus its reconstruction metadata.
///
/// Immutable once compiled. An endpoint pattern anchors to the end of the
/// input (route syntax appends `$`; regex syntax is taken as written, so an
/// unterminated endpoint regex is deliberately open-ended); a prefix pattern
/// matches a leading portion and exposes the remainder.
pub struct Pattern {
    text: String,
    regex: Regex,
    kind: PatternKind,
    is_endpoint: bool,
    converters: Vec<ConverterEntry>,
    placeholders: Vec<Placeholder>,
    has_named_groups: bool,
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("text", &self.text)
            .field("regex", &self.regex.as_str())
            .field("is_endpoint", &self.is_endpoint)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Pattern {
    /// Compiles a route-syntax pattern such as `"articles/<int:year>/"`.
    ///
    /// # Errors
    ///
    /// [`UrlmapError::ImproperlyConfigured`] when a placeholder references an
    /// unknown converter tag, a parameter name is not a valid identifier or
    /// repeats, a placeholder contains whitespace, or brackets are
    /// unbalanced.
    pub fn route(route: &str, is_endpoint: bool) -> UrlmapResult<Self> {
        check_balanced_brackets(route)?;

        let mut regex_str = String::from("^");
        let mut converter_list: Vec<ConverterEntry> = Vec::new();
        let mut placeholders = Vec::new();
        let mut previous_end = 0;

        for caps in PATH_PARAMETER_RE.captures_iter(route) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.as_str().chars().any(char::is_whitespace) {
                return Err(UrlmapError::ImproperlyConfigured(format!(
                    "URL route '{route}' cannot contain whitespace in angle brackets <...>."
                )));
            }
            let tag = caps.name("converter").map_or("str", |m| m.as_str());
            let parameter = caps.name("parameter").map_or("", |m| m.as_str());
            if !is_identifier(parameter) {
                return Err(UrlmapError::ImproperlyConfigured(format!(
                    "URL route '{route}' uses parameter name '{parameter}' which \
                     isn't a valid identifier."
                )));
            }
            if converter_list.iter().any(|(n, _)| n == parameter) {
                return Err(UrlmapError::ImproperlyConfigured(format!(
                    "URL route '{route}' uses parameter name '{parameter}' more \
                     than once."
                )));
            }
            let converter = converters::get_converter(tag).map_err(|_| {
                UrlmapError::ImproperlyConfigured(format!(
                    "URL route '{route}' uses invalid converter '{tag}'."
                ))
            })?;

            regex_str.push_str(&regex::escape(&route[previous_end..whole.start()]));
            write!(regex_str, "(?P<{parameter}>{})", converter.regex()).ok();
            previous_end = whole.end();

            placeholders.push(Placeholder {
                name: Some(parameter.to_string()),
                converter: Some(Arc::clone(&converter)),
            });
            converter_list.push((parameter.to_string(), converter));
        }

        regex_str.push_str(&regex::escape(&route[previous_end..]));
        if is_endpoint {
            regex_str.push('$');
        }

        let regex = Regex::new(&regex_str).map_err(|e| {
            UrlmapError::ImproperlyConfigured(format!(
                "'{route}' compiled to an invalid regular expression: {e}"
            ))
        })?;

        let has_named_groups = !converter_list.is_empty();
        Ok(Self {
            text: route.to_string(),
            regex,
            kind: PatternKind::Route,
            is_endpoint,
            converters: converter_list,
            placeholders,
            has_named_groups,
        })
    }

    /// Compiles a regex-syntax pattern, taken exactly as written.
    ///
    /// An un-anchored pattern is accepted; anchoring below the root is a
    /// configuration smell, not an error.
    ///
    /// # Errors
    ///
    /// [`UrlmapError::ImproperlyConfigured`] when the regex does not compile.
    pub fn from_regex(regex_str: &str, is_endpoint: bool) -> UrlmapResult<Self> {
        Self::from_regex_with_converters(regex_str, Vec::new(), is_endpoint)
    }

    /// Compiles a regex-syntax pattern with pre-associated converters.
    ///
    /// Used when reconstructing namespace prefixes whose captured parameters
    /// carry converters from route-syntax ancestors.
    pub(crate) fn from_regex_with_converters(
        regex_str: &str,
        converters: Vec<ConverterEntry>,
        is_endpoint: bool,
    ) -> UrlmapResult<Self> {
        let regex = Regex::new(regex_str).map_err(|e| {
            UrlmapError::ImproperlyConfigured(format!(
                "'{regex_str}' is not a valid regular expression: {e}"
            ))
        })?;

        let mut placeholders = Vec::new();
        let mut has_named_groups = false;
        for name in regex.capture_names().skip(1) {
            match name {
                Some(n) => {
                    has_named_groups = true;
                    placeholders.push(Placeholder {
                        name: Some(n.to_string()),
                        converter: None,
                    });
                }
                None => placeholders.push(Placeholder {
                    name: None,
                    converter: None,
                }),
            }
        }

        Ok(Self {
            text: regex_str.to_string(),
            regex,
            kind: PatternKind::Regex,
            is_endpoint,
            converters,
            placeholders,
            has_named_groups,
        })
    }

    /// Returns the original route or regex text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the compiled regex.
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Returns `true` if this pattern must consume the full remaining path.
    pub const fn is_endpoint(&self) -> bool {
        self.is_endpoint
    }

    /// Returns the named converters, in placeholder order.
    pub fn converters(&self) -> &[ConverterEntry] {
        &self.converters
    }

    /// Returns the placeholder descriptors, in order of appearance.
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// The compiled regex text without its leading `^`, for splicing after
    /// an ancestor prefix.
    pub(crate) fn regex_str_unanchored(&self) -> &str {
        self.regex.as_str().strip_prefix('^').unwrap_or_else(|| self.regex.as_str())
    }

    /// Formats the pattern for diagnostics.
    pub fn describe(&self) -> String {
        format!("'{}'", self.text)
    }

    /// Attempts to match the given path against this pattern.
    ///
    /// Returns `Ok(None)` when the pattern does not match, including when a
    /// converter rejects a captured value. For patterns with any named
    /// groups only named captures are produced; otherwise all captures are
    /// positional.
    ///
    /// # Errors
    ///
    /// [`UrlmapError::ConverterError`] when a converter fails with something
    /// other than a value mismatch. This is a converter bug and is never
    /// treated as "no match".
    pub fn match_path(&self, path: &str) -> UrlmapResult<Option<PathMatch>> {
        let Some(caps) = self.regex.captures(path) else {
            return Ok(None);
        };
        let Some(whole) = caps.get(0) else {
            return Ok(None);
        };

        let mut kwargs = HashMap::new();
        let mut args = Vec::new();

        match self.kind {
            PatternKind::Route => {
                for (name, converter) in &self.converters {
                    if let Some(m) = caps.name(name) {
                        match converter.to_rust(m.as_str()) {
                            Ok(value) => {
                                kwargs.insert(name.clone(), value);
                            }
                            Err(ConversionError::Invalid(_)) => return Ok(None),
                            Err(ConversionError::Failure(msg)) => {
                                return Err(UrlmapError::ConverterError(format!(
                                    "converter for '{name}' failed on '{}': {msg}",
                                    m.as_str()
                                )));
                            }
                        }
                    }
                }
            }
            PatternKind::Regex => {
                if self.has_named_groups {
                    // Named groups win: unnamed captures are ignored.
                    for name in self.regex.capture_names().flatten() {
                        if let Some(m) = caps.name(name) {
                            kwargs.insert(
                                name.to_string(),
                                PathValue::Str(m.as_str().to_string()),
                            );
                        }
                    }
                } else {
                    for i in 1..caps.len() {
                        if let Some(m) = caps.get(i) {
                            args.push(PathValue::Str(m.as_str().to_string()));
                        }
                    }
                }
            }
        }

        Ok(Some(PathMatch {
            remainder: path[whole.end()..].to_string(),
            args,
            kwargs,
        }))
    }
}

fn check_balanced_brackets(route: &str) -> UrlmapResult<()> {
    let mut open = 0i32;
    for c in route.chars() {
        match c {
            '<' => open += 1,
            '>' => {
                open -= 1;
                if open < 0 {
                    return Err(UrlmapError::ImproperlyConfigured(format!(
                        "URL route '{route}' has an unmatched '>' bracket."
                    )));
                }
            }
            _ => {}
        }
    }
    if open > 0 {
        return Err(UrlmapError::ImproperlyConfigured(format!(
            "URL route '{route}' has an unmatched '<' bracket."
        )));
    }
    Ok(())
}

/// A single URL pattern binding a compiled matcher to a handler.
///
/// Created once at configuration time and never mutated.
pub struct URLPattern {
    pattern: Pattern,
    callback: HandlerRef,
    default_args: HashMap<String, PathValue>,
    name: Option<String>,
}

impl fmt::Debug for URLPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("URLPattern")
            .field("pattern", &self.pattern)
            .field("name", &self.name)
            .field("callback", &self.callback)
            .finish_non_exhaustive()
    }
}

impl URLPattern {
    /// Creates a leaf pattern.
    pub fn new(
        pattern: Pattern,
        callback: HandlerRef,
        default_args: HashMap<String, PathValue>,
        name: Option<&str>,
    ) -> Self {
        Self {
            pattern,
            callback,
            default_args,
            name: name.map(String::from),
        }
    }

    /// Returns the compiled pattern.
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the handler reference.
    pub const fn callback(&self) -> &HandlerRef {
        &self.callback
    }

    /// Returns the fixed default kwargs merged into every match.
    pub const fn default_args(&self) -> &HashMap<String, PathValue> {
        &self.default_args
    }

    /// Returns the pattern name used for reverse lookups, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Formats the pattern for diagnostics, including its name.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} [name='{name}']", self.pattern.describe()),
            None => self.pattern.describe(),
        }
    }
}
