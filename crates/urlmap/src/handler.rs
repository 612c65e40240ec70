//! Opaque handler references.
//!
//! The engine maps paths to handlers and back but never invokes them; a
//! [`HandlerRef`] is an inert, cheaply clonable token the embedding
//! framework attaches its actual callable (or anything else) to. Identity is
//! pointer-based: two clones of one `HandlerRef` are the same handler, two
//! separately constructed refs are different even with equal labels. That
//! identity is what reverse-by-handler lookups compare.
//!
//! A `HandlerRef` (and therefore a `ResolverMatch`) is deliberately not
//! serializable: it stands for live code in this process, and pretending
//! otherwise would have to fail at runtime. Here it fails at compile time.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

struct HandlerInner {
    label: String,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

/// An opaque reference to the code that will handle a matched route.
#[derive(Clone)]
pub struct HandlerRef {
    inner: Arc<HandlerInner>,
}

impl HandlerRef {
    /// Creates a handler reference with a display label, typically the
    /// dotted path of the function it stands for (e.g. `"blog.views.detail"`).
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                label: label.into(),
                payload: None,
            }),
        }
    }

    /// Creates a handler reference carrying an arbitrary payload the
    /// embedding framework can recover with [`downcast_payload`](Self::downcast_payload).
    pub fn with_payload(
        label: impl Into<String>,
        payload: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                label: label.into(),
                payload: Some(payload),
            }),
        }
    }

    /// Returns the display label.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Returns the payload downcast to `T`, if a payload of that type was
    /// attached.
    pub fn downcast_payload<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .payload
            .as_ref()
            .and_then(|p| Arc::clone(p).downcast::<T>().ok())
    }

    /// A stable identity for this handler, shared by all clones.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for HandlerRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for HandlerRef {}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerRef").field(&self.inner.label).finish()
    }
}
