//! Integration tests for namespace scoping.
//!
//! Builds a configuration shaped like a real multi-app project: two urlconf
//! providers that include each other under instance namespaces, plus a
//! reusable url-object provider mounted several times. Covers:
//!
//! 1. Deep resolution accumulating app_names and namespaces root-to-leaf
//! 2. Reverse construction from colon-joined namespace paths
//! 3. Instance namespace defaulting to the application namespace
//! 4. current_app preference and default-instance selection
//! 5. Parameters captured by namespace prefixes

use std::collections::HashMap;
use std::sync::Arc;

use urlmap::{
    include_app, include_dynamic, path, re_path, reverse, reverse_with, root, HandlerRef,
    LookupTarget, PathValue, ReverseOpts, URLEntry, UrlConfProvider, UrlmapResult,
};

fn handler(label: &str) -> HandlerRef {
    HandlerRef::new(label)
}

fn kw(pairs: &[(&'static str, PathValue)]) -> HashMap<&'static str, PathValue> {
    pairs.iter().cloned().collect()
}

fn no_kwargs() -> HashMap<&'static str, PathValue> {
    HashMap::new()
}

/// A reusable bundle of inner patterns, mounted under several namespaces.
struct UrlObject {
    app_name: &'static str,
    namespace: Option<&'static str>,
}

impl UrlConfProvider for UrlObject {
    fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
        Ok((
            vec![
                re_path(r"^inner/$", handler("views.urlobject_view"), Some("urlobject-view"))?,
                re_path(
                    r"^inner/(?P<arg1>[0-9]+)/(?P<arg2>[0-9]+)/$",
                    handler("views.urlobject_view"),
                    Some("urlobject-view"),
                )?,
                re_path(
                    r"^inner/\+\\\$\*/$",
                    handler("views.urlobject_special_view"),
                    Some("urlobject-special-view"),
                )?,
            ],
            Some(self.app_name.to_string()),
            self.namespace.map(String::from),
        ))
    }
}

fn testobj3() -> Arc<dyn UrlConfProvider> {
    Arc::new(UrlObject {
        app_name: "testapp",
        namespace: Some("test-ns3"),
    })
}

/// Mirrors a urlconf module with `app_name = "namespace_urls"`.
struct NamespaceUrls;

impl UrlConfProvider for NamespaceUrls {
    fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
        Ok((
            namespace_urls_entries()?,
            Some("namespace_urls".to_string()),
            None,
        ))
    }
}

fn namespace_urls_entries() -> UrlmapResult<Vec<URLEntry>> {
    Ok(vec![
        re_path(
            r"^normal/(?P<arg1>[0-9]+)/(?P<arg2>[0-9]+)/$",
            handler("views.normal"),
            Some("inc-normal-view"),
        )?,
        include_dynamic("test3/", testobj3(), None)?,
        include_dynamic("ns-included1/", Arc::new(IncludedNamespaceUrls), Some("inc-ns1"))?,
        include_dynamic("ns-included2/", Arc::new(IncludedNamespaceUrls), Some("inc-ns2"))?,
    ])
}

/// Mirrors a urlconf module with `app_name = "included_namespace_urls"`;
/// includes `NamespaceUrls` back, so the two configurations are mutually
/// recursive and can only be expanded lazily.
struct IncludedNamespaceUrls;

impl UrlConfProvider for IncludedNamespaceUrls {
    fn urls(&self) -> UrlmapResult<(Vec<URLEntry>, Option<String>, Option<String>)> {
        Ok((
            vec![
                re_path(
                    r"^normal/(?P<arg1>[0-9]+)/(?P<arg2>[0-9]+)/$",
                    handler("views.normal"),
                    Some("inc-normal-view"),
                )?,
                re_path(
                    r"^\+\\\$\*/$",
                    handler("views.special"),
                    Some("inc-special-view"),
                )?,
                include_dynamic("test3/", testobj3(), None)?,
                include_dynamic("ns-included4/", Arc::new(NamespaceUrls), Some("inc-ns4"))?,
            ],
            Some("included_namespace_urls".to_string()),
            None,
        ))
    }
}

fn namespace_resolver() -> urlmap::URLResolver {
    root(namespace_urls_entries().unwrap()).unwrap()
}

#[test]
fn test_deeply_nested_resolution() {
    let resolver = namespace_resolver();
    let m = resolver
        .resolve("/ns-included1/ns-included4/ns-included2/test3/inner/42/37/")
        .unwrap();

    assert_eq!(m.url_name.as_deref(), Some("urlobject-view"));
    assert_eq!(
        m.app_names,
        vec![
            "included_namespace_urls",
            "namespace_urls",
            "included_namespace_urls",
            "testapp",
        ]
    );
    assert_eq!(m.namespaces, vec!["inc-ns1", "inc-ns4", "inc-ns2", "test-ns3"]);
    assert_eq!(m.view_name(), "inc-ns1:inc-ns4:inc-ns2:test-ns3:urlobject-view");
    assert_eq!(m.kwargs.get("arg1"), Some(&PathValue::Str("42".into())));
    assert_eq!(m.kwargs.get("arg2"), Some(&PathValue::Str("37".into())));
    assert_eq!(
        m.app_name(),
        "included_namespace_urls:namespace_urls:included_namespace_urls:testapp"
    );
    assert_eq!(m.namespace(), "inc-ns1:inc-ns4:inc-ns2:test-ns3");
}

#[test]
fn test_single_level_namespace_resolution() {
    let resolver = namespace_resolver();
    let m = resolver.resolve("/ns-included1/normal/42/37/").unwrap();
    assert_eq!(m.url_name.as_deref(), Some("inc-normal-view"));
    assert_eq!(m.app_names, vec!["included_namespace_urls"]);
    assert_eq!(m.namespaces, vec!["inc-ns1"]);
    assert_eq!(m.view_name(), "inc-ns1:inc-normal-view");
}

#[test]
fn test_deeply_nested_reverse() {
    let resolver = namespace_resolver();
    let url = reverse(
        "inc-ns1:inc-ns4:inc-ns2:test-ns3:urlobject-view",
        &[],
        &kw(&[("arg1", PathValue::Int(42)), ("arg2", PathValue::Int(37))]),
        &resolver,
    )
    .unwrap();
    assert_eq!(url, "/ns-included1/ns-included4/ns-included2/test3/inner/42/37/");
}

#[test]
fn test_namespaced_reverse_without_args_picks_plain_pattern() {
    let resolver = namespace_resolver();
    assert_eq!(
        reverse("inc-ns1:test-ns3:urlobject-view", &[], &no_kwargs(), &resolver).unwrap(),
        "/ns-included1/test3/inner/"
    );
    assert_eq!(
        reverse(
            "inc-ns1:test-ns3:urlobject-view",
            &[PathValue::Int(37), PathValue::Int(42)],
            &no_kwargs(),
            &resolver,
        )
        .unwrap(),
        "/ns-included1/test3/inner/37/42/"
    );
}

#[test]
fn test_namespaced_special_characters_are_quoted() {
    let resolver = namespace_resolver();
    assert_eq!(
        reverse("inc-ns1:inc-special-view", &[], &no_kwargs(), &resolver).unwrap(),
        "/ns-included1/+%5C$*/"
    );
}

#[test]
fn test_namespace_round_trip() {
    let resolver = namespace_resolver();
    let path_str = "/ns-included1/test3/inner/42/37/";
    let m = resolver.resolve(path_str).unwrap();

    let kwargs: HashMap<&str, PathValue> = m
        .captured_kwargs
        .iter()
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();
    let rebuilt = reverse(&m.view_name(), &[], &kwargs, &resolver).unwrap();
    assert_eq!(rebuilt, path_str);
}

#[test]
fn test_static_include_namespace_defaults_to_app_name() {
    // An include carrying only an app_name uses it as the instance
    // namespace too.
    let inner = vec![path("x/", handler("views.x"), Some("x")).unwrap()];
    let resolver = root(vec![
        include_app("included/", inner, "included_namespace_urls", None).unwrap(),
    ])
    .unwrap();

    let m = resolver.resolve("/included/x/").unwrap();
    assert_eq!(m.app_names, vec!["included_namespace_urls"]);
    assert_eq!(m.namespaces, vec!["included_namespace_urls"]);
    assert_eq!(
        reverse("included_namespace_urls:x", &[], &no_kwargs(), &resolver).unwrap(),
        "/included/x/"
    );
}

fn news_resolver() -> urlmap::URLResolver {
    // Two instances of one application namespace.
    let one = vec![path("latest/", handler("views.latest"), Some("latest")).unwrap()];
    let two = vec![path("latest/", handler("views.latest"), Some("latest")).unwrap()];
    root(vec![
        include_app("one/", one, "newsapp", Some("news-1")).unwrap(),
        include_app("two/", two, "newsapp", Some("news-2")).unwrap(),
    ])
    .unwrap()
}

#[test]
fn test_current_app_selects_instance() {
    let resolver = news_resolver();

    let opts = ReverseOpts {
        current_app: Some("news-1"),
        ..ReverseOpts::default()
    };
    let url = reverse_with(
        LookupTarget::Name("newsapp:latest"),
        &[],
        &no_kwargs(),
        &opts,
        &resolver,
    )
    .unwrap();
    assert_eq!(url, "/one/latest/");

    let opts = ReverseOpts {
        current_app: Some("news-2"),
        ..ReverseOpts::default()
    };
    let url = reverse_with(
        LookupTarget::Name("newsapp:latest"),
        &[],
        &no_kwargs(),
        &opts,
        &resolver,
    )
    .unwrap();
    assert_eq!(url, "/two/latest/");
}

#[test]
fn test_no_current_app_defaults_to_most_recent_instance() {
    let resolver = news_resolver();
    let url = reverse("newsapp:latest", &[], &no_kwargs(), &resolver).unwrap();
    assert_eq!(url, "/two/latest/");
}

#[test]
fn test_unknown_current_app_is_ignored_entirely() {
    // A current_app that matches no instance never partially applies.
    let resolver = news_resolver();
    let opts = ReverseOpts {
        current_app: Some("news-9"),
        ..ReverseOpts::default()
    };
    let url = reverse_with(
        LookupTarget::Name("newsapp:latest"),
        &[],
        &no_kwargs(),
        &opts,
        &resolver,
    )
    .unwrap();
    assert_eq!(url, "/two/latest/");
}

#[test]
fn test_instance_namespace_lookup_bypasses_app_default() {
    let resolver = news_resolver();
    assert_eq!(
        reverse("news-1:latest", &[], &no_kwargs(), &resolver).unwrap(),
        "/one/latest/"
    );
}

#[test]
fn test_namespace_prefix_captures_participate_in_reverse() {
    let inner = vec![
        path("nothing/", handler("views.nothing"), Some("inner-nothing")).unwrap(),
        path("extra/<str:extra>/", handler("views.extra"), Some("inner-extra")).unwrap(),
    ];
    let resolver = root(vec![
        include_app("inc<int:outer>/", inner, "included_urls", Some("inc-ns5")).unwrap(),
    ])
    .unwrap();

    let m = resolver.resolve("/inc70/nothing/").unwrap();
    assert_eq!(m.kwargs.get("outer"), Some(&PathValue::Int(70)));
    assert_eq!(m.namespaces, vec!["inc-ns5"]);

    assert_eq!(
        reverse(
            "inc-ns5:inner-nothing",
            &[],
            &kw(&[("outer", PathValue::Int(70))]),
            &resolver,
        )
        .unwrap(),
        "/inc70/nothing/"
    );
    assert_eq!(
        reverse(
            "inc-ns5:inner-extra",
            &[],
            &kw(&[
                ("outer", PathValue::Int(78)),
                ("extra", PathValue::Str("foobar".into())),
            ]),
            &resolver,
        )
        .unwrap(),
        "/inc78/extra/foobar/"
    );
}

#[test]
fn test_reverse_by_handler_across_namespace() {
    let detail = handler("views.detail");
    let inner = vec![path("detail/<int:id>/", detail.clone(), Some("detail")).unwrap()];
    let resolver = root(vec![
        include_app("shop/", inner, "shop", None).unwrap(),
    ])
    .unwrap();

    let url = reverse_with(
        LookupTarget::Handler(&detail),
        &[],
        &kw(&[("id", PathValue::Int(9))]),
        &ReverseOpts::default(),
        &resolver,
    )
    .unwrap();
    assert_eq!(url, "/shop/detail/9/");
}
