//! URL resolver tree, index population, and forward resolution.
//!
//! A [`URLResolver`] is an internal node of the route tree: a prefix pattern,
//! an ordered list of children (leaf [`URLPattern`]s and nested resolvers),
//! and an optional namespace/app-name pair. Forward resolution is a
//! depth-first, left-to-right prefix-stripping descent; reverse lookups use
//! lazily built per-resolver indexes.
//!
//! Child lists come from a [`UrlConf`]: either a static entry list or a
//! [`UrlConfProvider`] resolved exactly once and memoized.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, trace};

use urlmap_core::utils::MultiValueDict;
use urlmap_core::{Resolver404, UrlmapError, UrlmapResult};

use crate::converters::{PathConverter, PathValue};
use crate::handler::HandlerRef;
use crate::normalize::{normalize, Possibility};
use crate::pattern::{ConverterEntry, PathMatch, Pattern, URLPattern};

/// The ordered chains of pattern descriptions attempted during a failed
/// resolution, outermost prefix first within each chain.
type Tried = Vec<Vec<String>>;

/// The result of successfully resolving a URL path to a handler.
///
/// Created fresh per successful [`URLResolver::resolve`] call and never
/// mutated afterwards. Holds a live [`HandlerRef`], so it is deliberately
/// not serializable.
#[derive(Clone)]
pub struct ResolverMatch {
    /// The matched handler.
    pub func: HandlerRef,
    /// Positional captures (regex patterns with no named groups anywhere on
    /// the chain).
    pub args: Vec<PathValue>,
    /// All keyword captures plus fixed default kwargs.
    pub kwargs: HashMap<String, PathValue>,
    /// The name of the matched pattern, if it has one.
    pub url_name: Option<String>,
    /// Each ancestor's application namespace, root to leaf.
    pub app_names: Vec<String>,
    /// Each ancestor's instance namespace, root to leaf.
    pub namespaces: Vec<String>,
    /// The concatenated route text of the matched chain.
    pub route: String,
    /// The leaf pattern's own named captures, without defaults.
    pub captured_kwargs: HashMap<String, PathValue>,
    /// The fixed default kwargs that were merged in.
    pub extra_kwargs: HashMap<String, PathValue>,
}

impl fmt::Debug for ResolverMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverMatch")
            .field("func", &self.func.label())
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .field("url_name", &self.url_name)
            .field("app_names", &self.app_names)
            .field("namespaces", &self.namespaces)
            .field("route", &self.route)
            .field("captured_kwargs", &self.captured_kwargs)
            .field("extra_kwargs", &self.extra_kwargs)
            .finish()
    }
}

impl ResolverMatch {
    /// The fully-qualified view name: namespaces joined with the URL name,
    /// or with the handler label for unnamed patterns.
    pub fn view_name(&self) -> String {
        let mut parts: Vec<&str> = self.namespaces.iter().map(String::as_str).collect();
        let tail = self.url_name.as_deref().unwrap_or_else(|| self.func.label());
        parts.push(tail);
        parts.join(":")
    }

    /// The application namespace path, colon-joined.
    pub fn app_name(&self) -> String {
        self.app_names.join(":")
    }

    /// The instance namespace path, colon-joined.
    pub fn namespace(&self) -> String {
        self.namespaces.join(":")
    }
}

/// An entry in a URL configuration: a leaf pattern or a nested resolver.
#[derive(Debug, Clone)]
pub enum URLEntry {
    /// A leaf URL pattern that directly maps to a handler.
    Pattern(Arc<URLPattern>),
    /// A nested resolver, created via the `include*` builders.
    Include(Arc<URLResolver>),
}

impl From<URLPattern> for URLEntry {
    fn from(p: URLPattern) -> Self {
        Self::Pattern(Arc::new(p))
    }
}

impl From<URLResolver> for URLEntry {
    fn from(r: URLResolver) -> Self {
        Self::Include(Arc::new(r))
    }
}

/// A provider of nested URL entries, resolved once and memoized.
///
/// Implementations return `(entries, app_name, namespace)`. A provider that
/// has no instance namespace of its own returns `None` for the third
/// element; the include site may then supply one.
pub trait UrlConfProvider: Send + Sync {
    /// Produces the nested URL entries plus the application and instance
    /// namespaces this include carries.
    ///
    /// # Errors
    ///
    /// Implementations may fail with [`UrlmapError::ImproperlyConfigured`]
    /// when they cannot produce a valid entry list.
    fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)>;
}

/// The resolved child configuration of a resolver.
struct ConfData {
    entries: Arc<Vec<URLEntry>>,
    app_name: Option<String>,
    namespace: Option<String>,
}

enum ConfInner {
    Static(Arc<Vec<URLEntry>>),
    Dynamic {
        provider: Arc<dyn UrlConfProvider>,
        resolved: OnceLock<ConfData>,
    },
}

/// The child configuration of a [`URLResolver`]: a static ordered entry
/// list, or a provider resolved on first use.
pub struct UrlConf(ConfInner);

impl UrlConf {
    /// A static, ordered list of entries.
    pub fn from_entries(entries: Vec<URLEntry>) -> Self {
        Self(ConfInner::Static(Arc::new(entries)))
    }

    /// A static configuration sharing an already-built entry list.
    pub fn from_shared(entries: Arc<Vec<URLEntry>>) -> Self {
        Self(ConfInner::Static(entries))
    }

    /// A dynamic configuration resolved from `provider` exactly once.
    pub fn dynamic(provider: Arc<dyn UrlConfProvider>) -> Self {
        Self(ConfInner::Dynamic {
            provider,
            resolved: OnceLock::new(),
        })
    }
}

impl fmt::Debug for UrlConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ConfInner::Static(entries) => {
                f.debug_tuple("Static").field(&entries.len()).finish()
            }
            ConfInner::Dynamic { resolved, .. } => f
                .debug_tuple("Dynamic")
                .field(&resolved.get().map(|d| d.entries.len()))
                .finish(),
        }
    }
}

/// A reverse-lookup candidate: one named pattern with its accumulated
/// ancestor prefix folded in. Built once at index population.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// Reconstruction possibilities from [`normalize`] over the composed
    /// pattern text.
    pub(crate) possibilities: Vec<Possibility>,
    /// The composed regex text, without a leading `^`.
    pub(crate) pattern: String,
    /// The leaf's fixed default kwargs.
    pub(crate) defaults: HashMap<String, PathValue>,
    /// Converters for every named parameter along the chain.
    pub(crate) converters: HashMap<String, Arc<dyn PathConverter>>,
}

/// Where a namespace leads: the accumulated literal prefix, the converters
/// captured along it, and the sub-resolver to continue in.
pub(crate) struct NamespaceTarget {
    pub(crate) prefix: String,
    pub(crate) converters: Vec<ConverterEntry>,
    pub(crate) resolver: Arc<URLResolver>,
}

/// The lazily built derived indexes of one resolver.
pub(crate) struct Indexes {
    pub(crate) reverse_dict: MultiValueDict<String, Candidate>,
    pub(crate) namespace_dict: HashMap<String, NamespaceTarget>,
    pub(crate) app_dict: HashMap<String, Vec<String>>,
}

/// Visible re-entrancy guard for index population.
///
/// Carries the set of resolvers currently being populated plus a depth cap,
/// replacing hidden thread-local state. Population re-entering a resolver
/// that is already in progress, or nesting deeper than the cap, is a fatal
/// configuration error.
pub(crate) struct PopulateContext {
    in_progress: HashSet<usize>,
    depth: usize,
    seen_unnamespaced_dynamic: HashSet<usize>,
}

const MAX_POPULATE_DEPTH: usize = 64;

impl PopulateContext {
    fn new() -> Self {
        Self {
            in_progress: HashSet::new(),
            depth: 0,
            seen_unnamespaced_dynamic: HashSet::new(),
        }
    }

    fn enter(&mut self, id: usize) -> UrlmapResult<()> {
        if !self.in_progress.insert(id) {
            return Err(UrlmapError::ImproperlyConfigured(
                "URL configuration contains a circular, un-namespaced include."
                    .to_string(),
            ));
        }
        self.depth += 1;
        if self.depth > MAX_POPULATE_DEPTH {
            return Err(UrlmapError::ImproperlyConfigured(format!(
                "URL configuration nests more than {MAX_POPULATE_DEPTH} levels deep."
            )));
        }
        Ok(())
    }

    fn leave(&mut self, id: usize) {
        self.in_progress.remove(&id);
        self.depth -= 1;
    }
}

/// An internal node of the route tree.
///
/// Holds an ordered list of children behind a prefix pattern. All derived
/// state (the reverse and namespace indexes) is built lazily, exactly once,
/// and the configuration is treated as immutable afterwards.
pub struct URLResolver {
    pattern: Pattern,
    conf: UrlConf,
    namespace: Option<String>,
    app_name: Option<String>,
    indexes: OnceLock<Indexes>,
}

impl fmt::Debug for URLResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("URLResolver")
            .field("pattern", &self.pattern)
            .field("conf", &self.conf)
            .field("namespace", &self.namespace)
            .field("app_name", &self.app_name)
            .finish_non_exhaustive()
    }
}

impl URLResolver {
    /// Creates a resolver from a prefix pattern and a child configuration.
    ///
    /// For a dynamic configuration, `namespace` is the include site's
    /// override and `app_name` must be `None`; both are reconciled with what
    /// the provider supplies on first use.
    pub fn new(
        pattern: Pattern,
        conf: UrlConf,
        namespace: Option<&str>,
        app_name: Option<&str>,
    ) -> Self {
        Self {
            pattern,
            conf,
            namespace: namespace.map(String::from),
            app_name: app_name.map(String::from),
            indexes: OnceLock::new(),
        }
    }

    /// Returns the prefix pattern.
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the declared instance namespace, if any. For dynamic
    /// configurations the provider may supply one on first use instead.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the declared application namespace, if any.
    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    /// Returns the child entries, resolving a dynamic configuration on
    /// first use.
    pub fn entries(&self) -> UrlmapResult<Arc<Vec<URLEntry>>> {
        Ok(self.resolved_parts()?.0)
    }

    /// The instance namespace after resolving a dynamic configuration.
    pub(crate) fn effective_namespace(&self) -> UrlmapResult<Option<String>> {
        Ok(self.resolved_parts()?.2)
    }

    /// Formats the resolver's prefix for diagnostics.
    pub fn describe(&self) -> String {
        self.pattern.describe()
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn dynamic_provider_id(&self) -> Option<usize> {
        match &self.conf.0 {
            ConfInner::Dynamic { provider, .. } => {
                Some(Arc::as_ptr(provider).cast::<()>() as usize)
            }
            ConfInner::Static(_) => None,
        }
    }

    /// Returns `(entries, effective app_name, effective namespace)`.
    fn resolved_parts(&self) -> UrlmapResult<(Arc<Vec<URLEntry>>, Option<String>, Option<String>)> {
        match &self.conf.0 {
            ConfInner::Static(entries) => Ok((
                Arc::clone(entries),
                self.app_name.clone(),
                self.namespace.clone(),
            )),
            ConfInner::Dynamic { provider, resolved } => {
                if let Some(data) = resolved.get() {
                    return Ok((
                        Arc::clone(&data.entries),
                        data.app_name.clone(),
                        data.namespace.clone(),
                    ));
                }
                let built = self.resolve_dynamic(provider.as_ref())?;
                let data = resolved.get_or_init(|| built);
                Ok((
                    Arc::clone(&data.entries),
                    data.app_name.clone(),
                    data.namespace.clone(),
                ))
            }
        }
    }

    fn resolve_dynamic(&self, provider: &dyn UrlConfProvider) -> UrlmapResult<ConfData> {
        let (entries, app_name, provider_ns) = provider.urls()?;
        if self.namespace.is_some() && provider_ns.is_some() {
            return Err(UrlmapError::ImproperlyConfigured(
                "Cannot override the namespace for a nested urlconf that already \
                 specifies one."
                    .to_string(),
            ));
        }
        let instance_ns = self.namespace.clone().or(provider_ns);
        if instance_ns.is_some() && app_name.is_none() {
            return Err(UrlmapError::ImproperlyConfigured(
                "Specifying a namespace in include() without providing an \
                 app_name is not supported."
                    .to_string(),
            ));
        }
        let namespace = instance_ns.or_else(|| app_name.clone());
        Ok(ConfData {
            entries: Arc::new(entries),
            app_name,
            namespace,
        })
    }

    /// Builds this resolver's derived indexes if they do not exist yet.
    ///
    /// This is the explicit laziness contract: called at the top of both
    /// [`resolve`](Self::resolve) and the reverse engine. Population is
    /// pure, and the index slot is assigned only after a full build, so
    /// concurrent first use can duplicate work but never observe a
    /// partially built index.
    pub fn ensure_populated(&self) -> UrlmapResult<()> {
        if self.indexes.get().is_some() {
            return Ok(());
        }
        let mut ctx = PopulateContext::new();
        self.populate(&mut ctx).map(|_| ())
    }

    pub(crate) fn populate(&self, ctx: &mut PopulateContext) -> UrlmapResult<&Indexes> {
        if let Some(indexes) = self.indexes.get() {
            return Ok(indexes);
        }
        ctx.enter(self.id())?;
        let built = self.build_indexes(ctx);
        ctx.leave(self.id());
        let built = built?;
        Ok(self.indexes.get_or_init(|| built))
    }

    pub(crate) fn indexes(&self) -> UrlmapResult<&Indexes> {
        let mut ctx = PopulateContext::new();
        self.populate(&mut ctx)
    }

    #[allow(clippy::too_many_lines)]
    fn build_indexes(&self, ctx: &mut PopulateContext) -> UrlmapResult<Indexes> {
        let (entries, _, _) = self.resolved_parts()?;
        debug!(
            pattern = %self.pattern.text(),
            children = entries.len(),
            "populating URL indexes"
        );

        let mut reverse_dict: MultiValueDict<String, Candidate> = MultiValueDict::new();
        let mut namespace_dict: HashMap<String, NamespaceTarget> = HashMap::new();
        let mut app_dict: HashMap<String, Vec<String>> = HashMap::new();

        for entry in entries.iter() {
            match entry {
                URLEntry::Pattern(leaf) => {
                    let Some(name) = leaf.name() else { continue };
                    let p_pattern = leaf.pattern().regex_str_unanchored().to_string();
                    let mut converters: HashMap<String, Arc<dyn PathConverter>> =
                        HashMap::new();
                    for (n, c) in self.pattern.converters() {
                        converters.insert(n.clone(), Arc::clone(c));
                    }
                    for (n, c) in leaf.pattern().converters() {
                        converters.insert(n.clone(), Arc::clone(c));
                    }
                    reverse_dict.append(
                        name.to_string(),
                        Candidate {
                            possibilities: normalize(leaf.pattern().regex().as_str()),
                            pattern: p_pattern,
                            defaults: leaf.default_args().clone(),
                            converters,
                        },
                    );
                }
                URLEntry::Include(child) => {
                    let p_pattern = child.pattern.regex_str_unanchored().to_string();
                    let (_, child_app, child_ns) = child.resolved_parts()?;
                    if let Some(app) = child_app {
                        // A namespaced boundary: record it and stop. Its own
                        // indexes are built when a reverse lookup descends
                        // into it.
                        let ns = child_ns.unwrap_or_else(|| app.clone());
                        app_dict.entry(app).or_default().push(ns.clone());
                        namespace_dict.insert(
                            ns,
                            NamespaceTarget {
                                prefix: p_pattern,
                                converters: child.pattern.converters().to_vec(),
                                resolver: Arc::clone(child),
                            },
                        );
                        continue;
                    }

                    // Reversing an un-namespaced dynamic include used more
                    // than once would be ambiguous.
                    if let Some(provider_id) = child.dynamic_provider_id() {
                        if !ctx.seen_unnamespaced_dynamic.insert(provider_id) {
                            return Err(UrlmapError::ImproperlyConfigured(
                                "A dynamic include without a namespace is \
                                 instantiated more than once; its names cannot \
                                 be reversed unambiguously."
                                    .to_string(),
                            ));
                        }
                    }

                    // Un-namespaced: flatten the child's names into this
                    // level, accumulating prefixes, converters, and defaults.
                    let sub = child.populate(ctx)?;
                    for (name, candidates) in sub.reverse_dict.iter() {
                        for cand in candidates {
                            let composed = format!("{p_pattern}{}", cand.pattern);
                            let mut converters: HashMap<String, Arc<dyn PathConverter>> =
                                HashMap::new();
                            for (n, c) in self.pattern.converters() {
                                converters.insert(n.clone(), Arc::clone(c));
                            }
                            for (n, c) in child.pattern.converters() {
                                converters.insert(n.clone(), Arc::clone(c));
                            }
                            for (n, c) in &cand.converters {
                                converters.insert(n.clone(), Arc::clone(c));
                            }
                            reverse_dict.append(
                                name.clone(),
                                Candidate {
                                    possibilities: normalize(&composed),
                                    pattern: composed,
                                    defaults: cand.defaults.clone(),
                                    converters,
                                },
                            );
                        }
                    }
                    for (ns, target) in &sub.namespace_dict {
                        let mut converters = child.pattern.converters().to_vec();
                        converters.extend(
                            target
                                .converters
                                .iter()
                                .map(|(n, c)| (n.clone(), Arc::clone(c))),
                        );
                        namespace_dict.insert(
                            ns.clone(),
                            NamespaceTarget {
                                prefix: format!("{p_pattern}{}", target.prefix),
                                converters,
                                resolver: Arc::clone(&target.resolver),
                            },
                        );
                    }
                    for (app, namespaces) in &sub.app_dict {
                        app_dict
                            .entry(app.clone())
                            .or_default()
                            .extend(namespaces.iter().cloned());
                    }
                }
            }
        }

        Ok(Indexes {
            reverse_dict,
            namespace_dict,
            app_dict,
        })
    }

    /// Resolves a URL path to a [`ResolverMatch`].
    ///
    /// Children are tried in configuration order; a child failing to match
    /// backtracks to the next sibling rather than aborting.
    ///
    /// # Errors
    ///
    /// [`UrlmapError::NotFound`] with the ordered list of every pattern
    /// chain attempted when nothing matches; fatal errors (converter bugs,
    /// broken dynamic configuration) propagate as themselves.
    pub fn resolve(&self, path: &str) -> UrlmapResult<ResolverMatch> {
        self.ensure_populated()?;
        match self.try_resolve(path)? {
            Ok(matched) => Ok(matched),
            Err(tried) => Err(UrlmapError::NotFound(Resolver404 {
                path: path.to_string(),
                tried,
            })),
        }
    }

    fn try_resolve(&self, path: &str) -> UrlmapResult<Result<ResolverMatch, Tried>> {
        trace!(pattern = %self.pattern.text(), path, "matching prefix");
        let Some(prefix_match) = self.pattern.match_path(path)? else {
            return Ok(Err(Vec::new()));
        };
        let (entries, app_name, namespace) = self.resolved_parts()?;

        let mut tried: Tried = Vec::new();
        for entry in entries.iter() {
            match entry {
                URLEntry::Pattern(leaf) => {
                    match leaf.resolve(&prefix_match.remainder)? {
                        Some(sub) => {
                            return Ok(Ok(compose_match(
                                &prefix_match,
                                sub,
                                app_name,
                                namespace,
                                None,
                            )));
                        }
                        None => tried.push(vec![leaf.describe()]),
                    }
                }
                URLEntry::Include(child) => {
                    match child.try_resolve(&prefix_match.remainder)? {
                        Ok(sub) => {
                            return Ok(Ok(compose_match(
                                &prefix_match,
                                sub,
                                app_name,
                                namespace,
                                Some(child.pattern.text()),
                            )));
                        }
                        Err(sub_tried) => {
                            if sub_tried.is_empty() {
                                tried.push(vec![child.describe()]);
                            } else {
                                for chain in sub_tried {
                                    let mut full = Vec::with_capacity(chain.len() + 1);
                                    full.push(child.describe());
                                    full.extend(chain);
                                    tried.push(full);
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(Err(tried))
    }
}

impl URLPattern {
    /// Resolves a path against this leaf pattern.
    ///
    /// Returns `None` when the pattern does not match. An end-anchored
    /// pattern leaves no remainder by construction; an open-ended endpoint
    /// pattern matches a prefix and discards the rest.
    ///
    /// # Errors
    ///
    /// Propagates fatal converter failures.
    pub fn resolve(&self, path: &str) -> UrlmapResult<Option<ResolverMatch>> {
        let Some(matched) = self.pattern().match_path(path)? else {
            return Ok(None);
        };
        // Fixed defaults win over captures on a key collision.
        let mut kwargs = matched.kwargs.clone();
        for (k, v) in self.default_args() {
            kwargs.insert(k.clone(), v.clone());
        }
        Ok(Some(ResolverMatch {
            func: self.callback().clone(),
            args: matched.args,
            kwargs,
            url_name: self.name().map(String::from),
            app_names: Vec::new(),
            namespaces: Vec::new(),
            route: self.pattern().text().to_string(),
            captured_kwargs: matched.kwargs,
            extra_kwargs: self.default_args().clone(),
        }))
    }
}

/// Merges a prefix-level match into a child's match, prepending this level's
/// captures, namespaces, and route.
fn compose_match(
    prefix: &PathMatch,
    sub: ResolverMatch,
    app_name: Option<String>,
    namespace: Option<String>,
    child_route: Option<&str>,
) -> ResolverMatch {
    let mut kwargs = prefix.kwargs.clone();
    kwargs.extend(sub.kwargs);

    // Positional args survive only while no keyword capture exists anywhere
    // on the chain.
    let args = if kwargs.is_empty() {
        let mut args = prefix.args.clone();
        args.extend(sub.args);
        args
    } else {
        sub.args
    };

    let mut namespaces = Vec::with_capacity(sub.namespaces.len() + 1);
    if let Some(ns) = namespace {
        namespaces.push(ns);
    }
    namespaces.extend(sub.namespaces);

    let mut app_names = Vec::with_capacity(sub.app_names.len() + 1);
    if let Some(app) = app_name {
        app_names.push(app);
    }
    app_names.extend(sub.app_names);

    let route = match child_route {
        Some(prefix_route) => {
            let sub_route = sub.route.strip_prefix('^').unwrap_or(&sub.route);
            format!("{prefix_route}{sub_route}")
        }
        None => sub.route,
    };

    ResolverMatch {
        func: sub.func,
        args,
        kwargs,
        url_name: sub.url_name,
        app_names,
        namespaces,
        route,
        captured_kwargs: sub.captured_kwargs,
        extra_kwargs: sub.extra_kwargs,
    }
}

/// Creates a leaf entry from a route-syntax pattern.
///
/// # Errors
///
/// Propagates pattern compilation failures.
pub fn path(route: &str, view: HandlerRef, name: Option<&str>) -> UrlmapResult<URLEntry> {
    Ok(URLPattern::new(Pattern::route(route, true)?, view, HashMap::new(), name).into())
}

/// Creates a leaf entry from a route-syntax pattern with fixed default
/// kwargs merged into every match.
///
/// # Errors
///
/// Propagates pattern compilation failures.
pub fn path_with_defaults(
    route: &str,
    view: HandlerRef,
    defaults: HashMap<String, PathValue>,
    name: Option<&str>,
) -> UrlmapResult<URLEntry> {
    Ok(URLPattern::new(Pattern::route(route, true)?, view, defaults, name).into())
}

/// Creates a leaf entry from a regex-syntax pattern.
///
/// # Errors
///
/// Propagates regex compilation failures.
pub fn re_path(regex: &str, view: HandlerRef, name: Option<&str>) -> UrlmapResult<URLEntry> {
    Ok(URLPattern::new(Pattern::from_regex(regex, true)?, view, HashMap::new(), name).into())
}

/// Creates a leaf entry from a regex-syntax pattern with fixed default
/// kwargs.
///
/// # Errors
///
/// Propagates regex compilation failures.
pub fn re_path_with_defaults(
    regex: &str,
    view: HandlerRef,
    defaults: HashMap<String, PathValue>,
    name: Option<&str>,
) -> UrlmapResult<URLEntry> {
    Ok(URLPattern::new(Pattern::from_regex(regex, true)?, view, defaults, name).into())
}

/// Nests `entries` under a route-syntax prefix, without a namespace.
///
/// # Errors
///
/// Propagates prefix compilation failures.
pub fn include(prefix: &str, entries: Vec<URLEntry>) -> UrlmapResult<URLEntry> {
    Ok(URLResolver::new(
        Pattern::route(prefix, false)?,
        UrlConf::from_entries(entries),
        None,
        None,
    )
    .into())
}

/// Nests `entries` under a route-syntax prefix as application `app_name`.
///
/// The instance namespace defaults to the application namespace when not
/// given, mirroring `(entries, app_name)` versus
/// `(entries, app_name, namespace)` configuration tuples.
///
/// # Errors
///
/// Propagates prefix compilation failures.
pub fn include_app(
    prefix: &str,
    entries: Vec<URLEntry>,
    app_name: &str,
    namespace: Option<&str>,
) -> UrlmapResult<URLEntry> {
    let instance_ns = namespace.unwrap_or(app_name);
    Ok(URLResolver::new(
        Pattern::route(prefix, false)?,
        UrlConf::from_entries(entries),
        Some(instance_ns),
        Some(app_name),
    )
    .into())
}

/// Nests `entries` under a regex-syntax prefix, without a namespace.
///
/// # Errors
///
/// Propagates prefix compilation failures.
pub fn re_include(prefix: &str, entries: Vec<URLEntry>) -> UrlmapResult<URLEntry> {
    Ok(URLResolver::new(
        Pattern::from_regex(prefix, false)?,
        UrlConf::from_entries(entries),
        None,
        None,
    )
    .into())
}

/// Nests a dynamic configuration under a route-syntax prefix.
///
/// `namespace` overrides the provider's instance namespace; supplying both
/// is a configuration error surfaced on first use.
///
/// # Errors
///
/// Propagates prefix compilation failures.
pub fn include_dynamic(
    prefix: &str,
    provider: Arc<dyn UrlConfProvider>,
    namespace: Option<&str>,
) -> UrlmapResult<URLEntry> {
    Ok(URLResolver::new(
        Pattern::route(prefix, false)?,
        UrlConf::dynamic(provider),
        namespace,
        None,
    )
    .into())
}

/// Creates the root resolver. Its prefix matches the leading `/`, so
/// [`URLResolver::resolve`] takes absolute paths.
///
/// # Errors
///
/// Propagates prefix compilation failures.
pub fn root(entries: Vec<URLEntry>) -> UrlmapResult<URLResolver> {
    Ok(URLResolver::new(
        Pattern::from_regex("^/", false)?,
        UrlConf::from_entries(entries),
        None,
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(label: &str) -> HandlerRef {
        HandlerRef::new(label)
    }

    #[test]
    fn test_resolve_simple_pattern() {
        let resolver = root(vec![
            path("articles/", handler("views.articles"), Some("articles")).unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/articles/").unwrap();
        assert_eq!(m.url_name.as_deref(), Some("articles"));
        assert!(m.kwargs.is_empty());
        assert_eq!(m.route, "articles/");
    }

    #[test]
    fn test_resolve_pattern_with_params() {
        let resolver = root(vec![
            path("articles/<int:year>/", handler("views.year"), Some("article-year")).unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/articles/2024/").unwrap();
        assert_eq!(m.kwargs.get("year"), Some(&PathValue::Int(2024)));
        assert_eq!(m.captured_kwargs.get("year"), Some(&PathValue::Int(2024)));
        assert_eq!(m.url_name.as_deref(), Some("article-year"));
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let resolver = root(vec![
            path("articles/", handler("views.first"), Some("first")).unwrap(),
            path("articles/", handler("views.second"), Some("second")).unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/articles/").unwrap();
        assert_eq!(m.url_name.as_deref(), Some("first"));
    }

    #[test]
    fn test_resolve_backtracks_to_next_sibling() {
        let resolver = root(vec![
            path("x/<int:a>/", handler("views.int_view"), Some("int-view")).unwrap(),
            path("x/<str:a>/", handler("views.str_view"), Some("str-view")).unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/x/abc/").unwrap();
        assert_eq!(m.url_name.as_deref(), Some("str-view"));
    }

    #[test]
    fn test_resolve_nested_include() {
        let users = vec![
            path("", handler("views.user_list"), Some("user-list")).unwrap(),
            path("<int:id>/", handler("views.user_detail"), Some("user-detail")).unwrap(),
        ];
        let resolver = root(vec![
            include_app("users/", users, "users", Some("users")).unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/users/").unwrap();
        assert_eq!(m.url_name.as_deref(), Some("user-list"));
        assert_eq!(m.namespaces, vec!["users"]);

        let m = resolver.resolve("/users/42/").unwrap();
        assert_eq!(m.url_name.as_deref(), Some("user-detail"));
        assert_eq!(m.kwargs.get("id"), Some(&PathValue::Int(42)));
        assert_eq!(m.view_name(), "users:user-detail");
    }

    #[test]
    fn test_resolve_deeply_nested_accumulates() {
        let info = vec![path("info/", handler("views.info"), Some("info")).unwrap()];
        let detail = vec![include_app("<int:id>/", info, "detail", None).unwrap()];
        let resolver = root(vec![
            include_app("users/", detail, "users", None).unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/users/42/info/").unwrap();
        assert_eq!(m.url_name.as_deref(), Some("info"));
        assert_eq!(m.kwargs.get("id"), Some(&PathValue::Int(42)));
        assert_eq!(m.namespaces, vec!["users", "detail"]);
        assert_eq!(m.app_names, vec!["users", "detail"]);
        assert_eq!(m.route, "users/<int:id>/info/");
    }

    #[test]
    fn test_resolve_not_found_carries_tried() {
        let resolver = root(vec![
            path("articles/", handler("views.articles"), Some("articles")).unwrap(),
            include("api/", vec![
                path("posts/", handler("views.posts"), Some("posts")).unwrap(),
            ])
            .unwrap(),
        ])
        .unwrap();

        let err = resolver.resolve("/api/missing/").unwrap_err();
        let UrlmapError::NotFound(e404) = err else {
            panic!("expected NotFound");
        };
        assert_eq!(e404.path, "/api/missing/");
        assert_eq!(
            e404.tried,
            vec![
                vec!["'articles/' [name='articles']".to_string()],
                vec!["'api/'".to_string(), "'posts/' [name='posts']".to_string()],
            ]
        );
    }

    #[test]
    fn test_resolve_empty_tree_is_404() {
        let resolver = root(Vec::new()).unwrap();
        assert!(matches!(
            resolver.resolve("/anything/"),
            Err(UrlmapError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_no_leading_slash_is_404() {
        let resolver = root(vec![
            path("articles/", handler("v"), Some("articles")).unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            resolver.resolve("articles/"),
            Err(UrlmapError::NotFound(_))
        ));
    }

    #[test]
    fn test_regex_positional_args_accumulate() {
        let inner = vec![
            re_path(r"^no_kwargs/([0-9]+)/([0-9]+)/$", handler("views.nk"), Some("inc-no-kwargs"))
                .unwrap(),
        ];
        let resolver = root(vec![
            re_include(r"^included/([0-9]+)/", inner).unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/included/12/no_kwargs/42/37/").unwrap();
        assert_eq!(
            m.args,
            vec![
                PathValue::Str("12".into()),
                PathValue::Str("42".into()),
                PathValue::Str("37".into()),
            ]
        );
        assert!(m.kwargs.is_empty());
    }

    #[test]
    fn test_kwargs_anywhere_suppress_args() {
        let inner = vec![
            re_path(r"^mixed_args/([0-9]+)/(?P<arg2>[0-9]+)/$", handler("views.ma"), Some("inc-mixed-args"))
                .unwrap(),
        ];
        let resolver = root(vec![re_include(r"^included/", inner).unwrap()]).unwrap();

        let m = resolver.resolve("/included/mixed_args/42/37/").unwrap();
        assert!(m.args.is_empty());
        assert_eq!(m.kwargs.get("arg2"), Some(&PathValue::Str("37".into())));
    }

    #[test]
    fn test_default_args_merge_and_win() {
        let mut defaults = HashMap::new();
        defaults.insert("format".to_string(), PathValue::Str("html".into()));
        let resolver = root(vec![
            path_with_defaults(
                "page/<int:num>/",
                handler("views.page"),
                defaults,
                Some("page"),
            )
            .unwrap(),
        ])
        .unwrap();

        let m = resolver.resolve("/page/3/").unwrap();
        assert_eq!(m.kwargs.get("num"), Some(&PathValue::Int(3)));
        assert_eq!(m.kwargs.get("format"), Some(&PathValue::Str("html".into())));
        assert_eq!(m.extra_kwargs.get("format"), Some(&PathValue::Str("html".into())));
        assert!(!m.captured_kwargs.contains_key("format"));
    }

    #[test]
    fn test_dynamic_include_resolved_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingProvider {
            calls: AtomicUsize,
        }

        impl UrlConfProvider for CountingProvider {
            fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok((
                    vec![path("inner/", HandlerRef::new("views.inner"), Some("inner")).unwrap()],
                    Some("testapp".to_string()),
                    None,
                ))
            }
        }

        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let resolver = root(vec![
            include_dynamic("dyn/", Arc::clone(&provider) as Arc<dyn UrlConfProvider>, None)
                .unwrap(),
        ])
        .unwrap();

        resolver.resolve("/dyn/inner/").unwrap();
        resolver.resolve("/dyn/inner/").unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dynamic_include_namespace_defaults_to_app_name() {
        struct AppProvider;

        impl UrlConfProvider for AppProvider {
            fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
                Ok((
                    vec![path("inner/", HandlerRef::new("views.inner"), Some("inner")).unwrap()],
                    Some("testapp".to_string()),
                    None,
                ))
            }
        }

        let resolver = root(vec![
            include_dynamic("dyn/", Arc::new(AppProvider), None).unwrap(),
        ])
        .unwrap();
        let m = resolver.resolve("/dyn/inner/").unwrap();
        assert_eq!(m.app_names, vec!["testapp"]);
        assert_eq!(m.namespaces, vec!["testapp"]);
    }

    #[test]
    fn test_dynamic_namespace_override_conflict() {
        struct NamespacedProvider;

        impl UrlConfProvider for NamespacedProvider {
            fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
                Ok((
                    Vec::new(),
                    Some("app".to_string()),
                    Some("provided-ns".to_string()),
                ))
            }
        }

        let resolver = root(vec![
            include_dynamic("dyn/", Arc::new(NamespacedProvider), Some("override")).unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            resolver.resolve("/dyn/x/"),
            Err(UrlmapError::ImproperlyConfigured(_))
        ));
    }

    #[test]
    fn test_dynamic_namespace_without_app_name_errors() {
        struct PlainProvider;

        impl UrlConfProvider for PlainProvider {
            fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
                Ok((Vec::new(), None, None))
            }
        }

        let resolver = root(vec![
            include_dynamic("dyn/", Arc::new(PlainProvider), Some("ns")).unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            resolver.resolve("/dyn/x/"),
            Err(UrlmapError::ImproperlyConfigured(_))
        ));
    }

    #[test]
    fn test_unnamespaced_dynamic_reused_twice_errors() {
        struct PlainProvider;

        impl UrlConfProvider for PlainProvider {
            fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
                Ok((
                    vec![path("x/", HandlerRef::new("views.x"), Some("x")).unwrap()],
                    None,
                    None,
                ))
            }
        }

        let provider: Arc<dyn UrlConfProvider> = Arc::new(PlainProvider);
        let resolver = root(vec![
            include_dynamic("a/", Arc::clone(&provider), None).unwrap(),
            include_dynamic("b/", Arc::clone(&provider), None).unwrap(),
        ])
        .unwrap();

        let err = resolver.ensure_populated().unwrap_err();
        assert!(matches!(err, UrlmapError::ImproperlyConfigured(_)));
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_namespaced_dynamic_reused_twice_is_fine() {
        struct AppProvider;

        impl UrlConfProvider for AppProvider {
            fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
                Ok((
                    vec![path("x/", HandlerRef::new("views.x"), Some("x")).unwrap()],
                    Some("app".to_string()),
                    None,
                ))
            }
        }

        let provider: Arc<dyn UrlConfProvider> = Arc::new(AppProvider);
        let resolver = root(vec![
            include_dynamic("a/", Arc::clone(&provider), Some("ns-a")).unwrap(),
            include_dynamic("b/", Arc::clone(&provider), Some("ns-b")).unwrap(),
        ])
        .unwrap();
        resolver.ensure_populated().unwrap();

        assert_eq!(resolver.resolve("/a/x/").unwrap().namespaces, vec!["ns-a"]);
        assert_eq!(resolver.resolve("/b/x/").unwrap().namespaces, vec!["ns-b"]);
    }

    #[test]
    fn test_view_name_falls_back_to_handler_label() {
        let resolver = root(vec![
            path("unnamed/", handler("views.unnamed_view"), None).unwrap(),
        ])
        .unwrap();
        let m = resolver.resolve("/unnamed/").unwrap();
        assert_eq!(m.url_name, None);
        assert_eq!(m.view_name(), "views.unnamed_view");
    }

    #[test]
    fn test_converter_value_error_tries_next_pattern() {
        // i64 overflow inside the converter, not the regex, still means
        // "does not match" and resolution moves on.
        let resolver = root(vec![
            path("n/<int:x>/", handler("views.int_x"), Some("int-x")).unwrap(),
            path("n/<str:x>/", handler("views.str_x"), Some("str-x")).unwrap(),
        ])
        .unwrap();
        let m = resolver.resolve("/n/99999999999999999999999/").unwrap();
        assert_eq!(m.url_name.as_deref(), Some("str-x"));
    }

    #[test]
    fn test_resolver_match_debug() {
        let resolver = root(vec![path("t/", handler("views.t"), Some("t")).unwrap()]).unwrap();
        let m = resolver.resolve("/t/").unwrap();
        let debug = format!("{m:?}");
        assert!(debug.contains("url_name"));
        assert!(debug.contains("views.t"));
    }

    #[test]
    fn test_include_prefix_params_flow_into_kwargs() {
        let inner = vec![path("posts/", handler("views.posts"), Some("posts")).unwrap()];
        let resolver = root(vec![
            include_app("api/<str:version>/", inner, "api", None).unwrap(),
        ])
        .unwrap();
        let m = resolver.resolve("/api/v2/posts/").unwrap();
        assert_eq!(m.kwargs.get("version"), Some(&PathValue::Str("v2".into())));
        assert_eq!(m.url_name.as_deref(), Some("posts"));
    }
}
