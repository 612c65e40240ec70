//! Reverse URL construction.
//!
//! [`reverse`] regenerates a canonical path from a symbolic, possibly
//! namespaced name and argument values. Candidates registered under the name
//! are tried from last-registered to first-registered; the first one whose
//! placeholders are all satisfiable — and whose substituted text re-matches
//! the candidate's own pattern — wins. [`reverse_with`] adds `current_app`
//! disambiguation, query-string assembly, and fragment handling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use regex::Regex;
use tracing::trace;

use urlmap_core::utils::text::escape_leading_slashes;
use urlmap_core::{NoReverseMatch, UrlmapError, UrlmapResult};

use crate::converters::{ConversionError, PathValue};
use crate::handler::HandlerRef;
use crate::normalize::substitute;
use crate::pattern::{ConverterEntry, Pattern};
use crate::resolver::{URLEntry, URLResolver, UrlConf};

/// `quote_plus` semantics for query strings: everything except ASCII
/// alphanumerics and `_.-~` is percent-encoded, then spaces become `+`.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// RFC 3986 path quoting: unreserved characters, sub-delimiters, and
/// `/~:@` stay literal.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'/')
    .remove(b':')
    .remove(b'@');

/// An ordered query string under construction: keys in supplied order, with
/// multi-valued keys expanded in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPairs {
    pairs: Vec<(String, Vec<String>)>,
}

impl QueryPairs {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one key/value pair.
    pub fn append(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.pairs.push((key.into(), vec![value.to_string()]));
    }

    /// Appends a key with several values, expanded adjacently in the
    /// rendered query string.
    pub fn append_all<V: fmt::Display>(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) {
        self.pairs
            .push((key.into(), values.into_iter().map(|v| v.to_string()).collect()));
    }

    /// Returns `true` if the query would render to nothing.
    pub fn is_empty(&self) -> bool {
        self.pairs.iter().all(|(_, values)| values.is_empty())
    }
}

impl<K: Into<String>, V: fmt::Display> FromIterator<(K, V)> for QueryPairs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (key, value) in iter {
            query.append(key, value);
        }
        query
    }
}

/// What a reverse lookup is asked to find: a (possibly namespaced) pattern
/// name, or a handler whose unique bound name is discovered first.
#[derive(Debug, Clone, Copy)]
pub enum LookupTarget<'a> {
    /// A symbolic name, colon-separated for namespaces.
    Name(&'a str),
    /// A direct handler reference.
    Handler(&'a HandlerRef),
}

impl<'a> From<&'a str> for LookupTarget<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a HandlerRef> for LookupTarget<'a> {
    fn from(handler: &'a HandlerRef) -> Self {
        Self::Handler(handler)
    }
}

/// Optional parameters of [`reverse_with`].
#[derive(Debug, Clone, Default)]
pub struct ReverseOpts<'a> {
    /// The current application's dotted instance path, used to pick among
    /// several instances of one app namespace.
    pub current_app: Option<&'a str>,
    /// Query pairs appended after `?`. An empty query appends nothing.
    pub query: Option<QueryPairs>,
    /// Fragment appended after `#`. `Some("")` appends a bare `#`; `None`
    /// appends nothing. Escaped only for control characters — spaces stay,
    /// unlike in the query string. That asymmetry is intentional API
    /// behavior.
    pub fragment: Option<&'a str>,
}

/// Generates a URL for a named pattern, substituting the given arguments.
///
/// Namespaced lookups use colon-separated names (e.g. `"users:detail"`).
/// Candidates under the name are tried from last-registered to
/// first-registered.
///
/// # Errors
///
/// [`UrlmapError::NoReverseMatch`] when no candidate accepts the arguments,
/// listing every pattern tried; [`UrlmapError::ImproperlyConfigured`] when
/// both positional and keyword arguments are supplied.
pub fn reverse(
    viewname: &str,
    args: &[PathValue],
    kwargs: &HashMap<&str, PathValue>,
    urlconf: &URLResolver,
) -> UrlmapResult<String> {
    reverse_with(
        LookupTarget::Name(viewname),
        args,
        kwargs,
        &ReverseOpts::default(),
        urlconf,
    )
}

/// [`reverse`] with `current_app`, query, and fragment handling.
///
/// # Errors
///
/// As for [`reverse`]; additionally, an unknown namespace segment or an
/// ambiguous handler target produce a structured
/// [`UrlmapError::NoReverseMatch`].
pub fn reverse_with(
    target: LookupTarget<'_>,
    args: &[PathValue],
    kwargs: &HashMap<&str, PathValue>,
    opts: &ReverseOpts<'_>,
    urlconf: &URLResolver,
) -> UrlmapResult<String> {
    if !args.is_empty() && !kwargs.is_empty() {
        return Err(UrlmapError::ImproperlyConfigured(
            "Don't mix positional args and keyword args in a call to reverse().".to_string(),
        ));
    }
    urlconf.ensure_populated()?;

    let viewname = match target {
        LookupTarget::Name(name) => name.to_string(),
        LookupTarget::Handler(handler) => find_handler_name(urlconf, handler)?,
    };

    let parts: Vec<&str> = viewname.split(':').collect();
    let (view, ns_path) = parts
        .split_last()
        .map_or(("", &[] as &[&str]), |(v, rest)| (*v, rest));

    let descent = descend_namespaces(urlconf, ns_path, opts.current_app)?;

    let mut url = match descent {
        Descent::Root => reverse_with_prefix(urlconf, view, "/", args, kwargs)?,
        Descent::Namespaced {
            ns_pattern,
            ns_converters,
            terminal,
        } => {
            // Reverse through an ephemeral wrapper so the accumulated
            // namespace prefix (and its captured parameters) participates in
            // candidate composition.
            let ns_resolver = URLResolver::new(
                Pattern::from_regex_with_converters(&ns_pattern, ns_converters, false)?,
                UrlConf::from_shared(terminal.entries()?),
                None,
                None,
            );
            let wrapper = URLResolver::new(
                Pattern::from_regex("^/", false)?,
                UrlConf::from_entries(vec![URLEntry::Include(Arc::new(ns_resolver))]),
                None,
                None,
            );
            reverse_with_prefix(&wrapper, view, "/", args, kwargs)?
        }
    };

    if let Some(query) = &opts.query {
        if !query.is_empty() {
            url.push('?');
            url.push_str(&urlencode(query));
        }
    }
    if let Some(fragment) = opts.fragment {
        url.push('#');
        url.push_str(&utf8_percent_encode(fragment, CONTROLS).to_string());
    }
    Ok(url)
}

enum Descent {
    Root,
    Namespaced {
        ns_pattern: String,
        ns_converters: Vec<ConverterEntry>,
        terminal: Arc<URLResolver>,
    },
}

/// Walks the namespace path from the root, consulting the app-namespace
/// index and the `current_app` hint at each step.
fn descend_namespaces(
    urlconf: &URLResolver,
    ns_path: &[&str],
    current_app: Option<&str>,
) -> UrlmapResult<Descent> {
    if ns_path.is_empty() {
        return Ok(Descent::Root);
    }

    let mut current_path: Option<Vec<&str>> = current_app.map(|c| c.split(':').collect());
    let mut consumed = 0usize;
    let mut resolved_path: Vec<String> = Vec::new();
    let mut ns_pattern = String::new();
    let mut ns_converters: Vec<ConverterEntry> = Vec::new();
    let mut cursor: Option<Arc<URLResolver>> = None;

    for &ns in ns_path {
        let current_ns = current_path
            .as_ref()
            .and_then(|cp| cp.get(consumed))
            .copied();
        consumed += 1;

        // Borrow the current node only long enough to pull out owned data,
        // so the cursor can advance afterwards.
        let step = {
            let current = cursor.as_deref().unwrap_or(urlconf);
            let indexes = current.indexes()?;

            // The segment may be an application namespace; translate it to
            // an instance namespace. An exact current-app match wins;
            // otherwise an instance sharing the application's name is the
            // default, falling back to the most recently registered
            // instance.
            let effective = match indexes.app_dict.get(ns) {
                Some(app_list) => {
                    if let Some(cns) = current_ns.filter(|c| app_list.iter().any(|x| x == c)) {
                        cns.to_string()
                    } else if app_list.iter().any(|x| x == ns) {
                        ns.to_string()
                    } else {
                        app_list.last().cloned().unwrap_or_else(|| ns.to_string())
                    }
                }
                None => ns.to_string(),
            };

            let found = indexes.namespace_dict.get(&effective).map(|ns_target| {
                let converters: Vec<ConverterEntry> = ns_target
                    .converters
                    .iter()
                    .map(|(n, c)| (n.clone(), Arc::clone(c)))
                    .collect();
                (
                    ns_target.prefix.clone(),
                    converters,
                    Arc::clone(&ns_target.resolver),
                )
            });
            match found {
                Some((prefix, converters, next)) => Ok((effective, prefix, converters, next)),
                None => Err(effective),
            }
        };

        match step {
            Ok((effective, prefix, converters, next)) => {
                if current_ns != Some(effective.as_str()) {
                    // The hint diverged; a partial match never substitutes
                    // for an exact one.
                    current_path = None;
                }
                resolved_path.push(effective);
                ns_pattern.push_str(&prefix);
                ns_converters.extend(converters);
                cursor = Some(next);
            }
            Err(effective) => {
                return Err(UrlmapError::NoReverseMatch(
                    NoReverseMatch::UnknownNamespace {
                        namespace: effective,
                        within: if resolved_path.is_empty() {
                            None
                        } else {
                            Some(resolved_path.join(":"))
                        },
                    },
                ));
            }
        }
    }

    let terminal = cursor.ok_or_else(|| {
        UrlmapError::ImproperlyConfigured("namespace descent produced no resolver".to_string())
    })?;
    Ok(Descent::Namespaced {
        ns_pattern,
        ns_converters,
        terminal,
    })
}

/// The candidate loop: tries every reverse possibility for `lookup`, from
/// the last-registered candidate to the first.
fn reverse_with_prefix(
    resolver: &URLResolver,
    lookup: &str,
    prefix: &str,
    args: &[PathValue],
    kwargs: &HashMap<&str, PathValue>,
) -> UrlmapResult<String> {
    let indexes = resolver.indexes()?;
    let Some(candidates) = indexes.reverse_dict.get_list(&lookup.to_string()) else {
        return Err(UrlmapError::NoReverseMatch(NoReverseMatch::UnknownName {
            lookup: lookup.to_string(),
        }));
    };

    for candidate in candidates.iter().rev() {
        'possibility: for (format, params) in &candidate.possibilities {
            // Collect the substitutions this possibility would use.
            let mut subs: HashMap<String, &PathValue> = HashMap::new();
            if args.is_empty() {
                // Every parameter must come from kwargs or the candidate's
                // defaults, and every kwarg must be consumed by a parameter
                // or match a default.
                for param in params {
                    if !kwargs.contains_key(param.as_str())
                        && !candidate.defaults.contains_key(param)
                    {
                        continue 'possibility;
                    }
                }
                for key in kwargs.keys() {
                    if !params.iter().any(|p| p == key)
                        && !candidate.defaults.contains_key(*key)
                    {
                        continue 'possibility;
                    }
                }
                for (key, default) in &candidate.defaults {
                    if params.iter().any(|p| p == key) {
                        continue;
                    }
                    if let Some(supplied) = kwargs.get(key.as_str()) {
                        if supplied != default {
                            continue 'possibility;
                        }
                    }
                }
                for (key, value) in kwargs {
                    subs.insert((*key).to_string(), value);
                }
                for param in params {
                    if !subs.contains_key(param) {
                        if let Some(default) = candidate.defaults.get(param) {
                            subs.insert(param.clone(), default);
                        }
                    }
                }
            } else {
                // Positional arity must match exactly.
                if args.len() != params.len() {
                    continue 'possibility;
                }
                for (param, value) in params.iter().zip(args) {
                    subs.insert(param.clone(), value);
                }
            }

            // Render each substitution through its converter.
            let mut text_subs: HashMap<String, String> = HashMap::new();
            for (key, value) in &subs {
                let rendered = match candidate.converters.get(key) {
                    Some(converter) => match converter.to_url(value) {
                        Ok(text) => text,
                        Err(ConversionError::Invalid(_)) => continue 'possibility,
                        Err(ConversionError::Failure(msg)) => {
                            return Err(UrlmapError::ConverterError(format!(
                                "converter for '{key}' failed rendering {value:?}: {msg}"
                            )));
                        }
                    },
                    None => value.to_string(),
                };
                text_subs.insert(key.clone(), rendered);
            }

            let Some(candidate_path) = substitute(format, &text_subs) else {
                continue 'possibility;
            };
            let unquoted = format!("{prefix}{candidate_path}");

            // The substituted text must re-match the candidate's own
            // pattern; this is where argument types are enforced.
            let gate = format!("^{}{}", regex::escape(prefix), candidate.pattern);
            let Ok(gate_re) = Regex::new(&gate) else {
                continue 'possibility;
            };
            if gate_re.is_match(&unquoted) {
                trace!(lookup, url = %unquoted, "reverse match");
                let quoted = utf8_percent_encode(&unquoted, PATH_ENCODE_SET).to_string();
                return Ok(escape_leading_slashes(&quoted));
            }
        }
    }

    let arg_desc = if args.is_empty() && kwargs.is_empty() {
        "no arguments".to_string()
    } else if args.is_empty() {
        let ordered: BTreeMap<&str, String> =
            kwargs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        format!("keyword arguments {ordered:?}")
    } else {
        let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
        format!("arguments {rendered:?}")
    };
    Err(UrlmapError::NoReverseMatch(NoReverseMatch::Exhausted {
        lookup: lookup.to_string(),
        arg_desc,
        tried: candidates.iter().rev().map(|c| c.pattern.clone()).collect(),
    }))
}

/// Finds the unique qualified name bound to `handler` anywhere in the tree.
fn find_handler_name(urlconf: &URLResolver, handler: &HandlerRef) -> UrlmapResult<String> {
    let mut names: BTreeSet<String> = BTreeSet::new();
    let mut visiting: Vec<usize> = Vec::new();
    collect_handler_names(urlconf, handler.id(), "", &mut names, &mut visiting)?;

    match names.len() {
        0 => Err(UrlmapError::NoReverseMatch(NoReverseMatch::UnknownName {
            lookup: handler.label().to_string(),
        })),
        1 => Ok(names
            .into_iter()
            .next()
            .unwrap_or_default()),
        _ => Err(UrlmapError::NoReverseMatch(
            NoReverseMatch::AmbiguousHandler {
                handler: handler.label().to_string(),
                names: names.into_iter().collect(),
            },
        )),
    }
}

fn collect_handler_names(
    resolver: &URLResolver,
    handler_id: usize,
    prefix: &str,
    names: &mut BTreeSet<String>,
    visiting: &mut Vec<usize>,
) -> UrlmapResult<()> {
    let resolver_id = resolver as *const URLResolver as usize;
    if visiting.contains(&resolver_id) {
        return Ok(());
    }
    visiting.push(resolver_id);

    let entries = resolver.entries()?;
    for entry in entries.iter() {
        match entry {
            URLEntry::Pattern(leaf) => {
                if leaf.callback().id() == handler_id {
                    if let Some(name) = leaf.name() {
                        names.insert(format!("{prefix}{name}"));
                    }
                }
            }
            URLEntry::Include(child) => {
                let child_prefix = match child.effective_namespace()? {
                    Some(ns) => format!("{prefix}{ns}:"),
                    None => prefix.to_string(),
                };
                collect_handler_names(child, handler_id, &child_prefix, names, visiting)?;
            }
        }
    }

    visiting.pop();
    Ok(())
}

fn urlencode(query: &QueryPairs) -> String {
    let mut parts = Vec::new();
    for (key, values) in &query.pairs {
        for value in values {
            parts.push(format!("{}={}", quote_plus(key), quote_plus(value)));
        }
    }
    parts.join("&")
}

fn quote_plus(s: &str) -> String {
    utf8_percent_encode(s, QUERY_ENCODE_SET)
        .to_string()
        .replace("%20", "+")
}
