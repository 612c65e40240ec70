//! The process-wide resolver cache.
//!
//! Resolver trees are expensive to build, so they are cached by an opaque
//! "urlconf identity" key. [`ResolverRegistry`] is an explicit object rather
//! than a hidden global: tests inject their own isolated instance, while
//! production code can use [`global`] and [`clear_url_caches`].
//!
//! Concurrent first use of one key is safe by construction: the builder runs
//! outside the lock and is pure, and the cache slot is assigned only after
//! the tree is fully built. A racing build wastes work but the first
//! fully-built tree wins and is what every reader sees.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use urlmap_core::UrlmapResult;

use crate::resolver::URLResolver;

/// A cache of built resolver trees keyed by urlconf identity.
#[derive(Default)]
pub struct ResolverRegistry {
    entries: RwLock<HashMap<String, Arc<URLResolver>>>,
}

impl ResolverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached resolver for `key`, building it with `build` on
    /// first use.
    ///
    /// # Errors
    ///
    /// Propagates the builder's error; nothing is cached on failure.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> UrlmapResult<Arc<URLResolver>>
    where
        F: FnOnce() -> UrlmapResult<URLResolver>,
    {
        if let Ok(entries) = self.entries.read() {
            if let Some(resolver) = entries.get(key) {
                return Ok(Arc::clone(resolver));
            }
        }

        debug!(key, "building resolver tree");
        let built = Arc::new(build()?);

        if let Ok(mut entries) = self.entries.write() {
            // A concurrent build may have won the race; keep the first
            // fully-built tree so every reader sees one consistent instance.
            return Ok(Arc::clone(
                entries.entry(key.to_string()).or_insert(built),
            ));
        }
        Ok(built)
    }

    /// Returns the cached resolver for `key` without building.
    pub fn get(&self, key: &str) -> Option<Arc<URLResolver>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Discards every cache entry. Trees are rebuilt from scratch on next
    /// use; in-flight readers keep whatever tree they already hold.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Returns the number of cached trees.
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static GLOBAL: Lazy<ResolverRegistry> = Lazy::new(ResolverRegistry::new);

/// The process-wide registry instance.
pub fn global() -> &'static ResolverRegistry {
    &GLOBAL
}

/// Discards every cached resolver tree in the global registry.
pub fn clear_url_caches() {
    global().clear();
}
