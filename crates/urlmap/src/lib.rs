//! # urlmap
//!
//! A standalone URL resolution and reverse-URL construction engine:
//!
//! - [`pattern`]: route definitions via `path()` (converter syntax) and
//!   `re_path()` (regex syntax), compiled once into [`Pattern`]s
//! - [`converters`]: pluggable typed path converters (`int`, `str`, `slug`,
//!   `uuid`, `path`, and user-registered tags)
//! - [`resolver`]: hierarchical resolution over a tree of nested route
//!   tables, with namespace and app-name scoping
//! - [`reverse`]: reverse URL generation from named patterns or handler
//!   references, with query-string and fragment assembly
//! - [`registry`]: the process-wide cache of built resolver trees
//!
//! The engine maps path strings to structured matches and back; transports,
//! handler invocation, and everything else belong to the caller.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//!
//! use urlmap::{path, reverse, root, HandlerRef, PathValue};
//!
//! let handler = HandlerRef::new("views.year_archive");
//! let resolver = root(vec![
//!     path("articles/<int:year>/", handler, Some("article-year")).unwrap(),
//! ])
//! .unwrap();
//!
//! // Forward resolution.
//! let m = resolver.resolve("/articles/2024/").unwrap();
//! assert_eq!(m.kwargs.get("year"), Some(&PathValue::Int(2024)));
//!
//! // Reverse construction, from the converted value.
//! let mut kwargs = HashMap::new();
//! kwargs.insert("year", PathValue::Int(2024));
//! let url = reverse("article-year", &[], &kwargs, &resolver).unwrap();
//! assert_eq!(url, "/articles/2024/");
//! ```

pub mod converters;
pub mod handler;
mod normalize;
pub mod pattern;
pub mod registry;
pub mod resolver;
pub mod reverse;

pub use converters::{
    get_converter, register_converter, ConversionError, PathConverter, PathValue,
};
pub use handler::HandlerRef;
pub use pattern::{Pattern, Placeholder, URLPattern};
pub use registry::{clear_url_caches, ResolverRegistry};
pub use resolver::{
    include, include_app, include_dynamic, path, path_with_defaults, re_include, re_path,
    re_path_with_defaults, root, ResolverMatch, URLEntry, URLResolver, UrlConf, UrlConfProvider,
};
pub use reverse::{reverse, reverse_with, LookupTarget, QueryPairs, ReverseOpts};

pub use urlmap_core::{NoReverseMatch, Resolver404, UrlmapError, UrlmapResult};

/// Resolves `path` against a resolver tree.
///
/// Equivalent to [`URLResolver::resolve`]; provided for symmetry with
/// [`reverse`].
///
/// # Errors
///
/// [`UrlmapError::NotFound`] when nothing matches.
pub fn resolve(path: &str, urlconf: &URLResolver) -> UrlmapResult<ResolverMatch> {
    urlconf.resolve(path)
}
