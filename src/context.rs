//! Hierarchical containers of bindings with parent-delegated lookup.
//!
//! A [Context] exclusively owns its binding map and its cache of resolved
//! values. Sharing happens only through the explicit parent chain, which is
//! weak and lookup-only: a child never keeps its parent alive, and resolving a
//! key never mutates an ancestor's bindings.

use crate::binding::{Binding, BindingBuilder, BindingScope};
use crate::error::ResolutionError;
use crate::inject::InjectionRegistry;
use crate::session::{ResolutionElement, ResolutionSession};
use crate::value::{BoundValue, ResolveFuture, ValueOrPromise};
use futures::future::Shared;
use futures::FutureExt;
use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use parking_lot::RwLock;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Tag lookup argument: an exact tag, or a pattern matched against each tag of
/// a binding.
#[derive(Clone, Debug)]
pub enum TagFilter {
    Exact(String),
    Pattern(Regex),
}

impl TagFilter {
    fn matches(&self, binding: &Binding) -> bool {
        match self {
            Self::Exact(tag) => binding.has_tag(tag),
            Self::Pattern(pattern) => binding.tags().any(|tag| pattern.is_match(tag)),
        }
    }
}

impl From<&str> for TagFilter {
    fn from(tag: &str) -> Self {
        Self::Exact(tag.to_string())
    }
}

impl From<String> for TagFilter {
    fn from(tag: String) -> Self {
        Self::Exact(tag)
    }
}

impl From<Regex> for TagFilter {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

#[derive(Clone)]
enum CachedValue {
    Ready(BoundValue),
    Pending(Shared<ResolveFuture>),
}

struct ContextInner {
    name: String,
    parent: Option<Weak<ContextInner>>,
    bindings: RwLock<IndexMap<String, Binding>>,
    cache: RwLock<FxHashMap<String, CachedValue>>,
    injections: Arc<InjectionRegistry>,
}

/// A hierarchical registry of bindings. Cloning is cheap and refers to the
/// same container.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                parent: None,
                bindings: Default::default(),
                cache: Default::default(),
                injections: Arc::new(InjectionRegistry::default()),
            }),
        }
    }

    /// Creates a child context delegating failed lookups here. The child holds
    /// only a weak reference and never keeps its parent alive. Injection
    /// metadata is shared with the whole tree.
    pub fn create_child(&self, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                parent: Some(Arc::downgrade(&self.inner)),
                bindings: Default::default(),
                cache: Default::default(),
                injections: self.inner.injections.clone(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<Context> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Context { inner })
    }

    /// Injection metadata registry shared across this context tree.
    pub fn injections(&self) -> &Arc<InjectionRegistry> {
        &self.inner.injections
    }

    /// Creates a binding for `key` and returns its configuration builder.
    /// Rebinding an existing key replaces the binding (keeping its position in
    /// insertion order) and drops this context's cached value for it.
    pub fn bind(&self, key: impl Into<String>) -> BindingBuilder {
        let key = key.into();
        debug!(context = %self.inner.name, key = %key, "binding key");

        self.inner.cache.write().remove(&key);
        self.inner
            .bindings
            .write()
            .insert(key.clone(), Binding::new(key.clone()));

        BindingBuilder::new(self.clone(), key)
    }

    /// Removes the binding for `key`, along with this context's cached value.
    /// Returns whether a binding was removed.
    pub fn unbind(&self, key: &str) -> bool {
        self.inner.cache.write().remove(key);
        let removed = self.inner.bindings.write().shift_remove(key).is_some();
        if removed {
            debug!(context = %self.inner.name, key, "unbound key");
        }

        removed
    }

    /// Whether `key` is bound in this context, ignoring ancestors.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.bindings.read().contains_key(key)
    }

    /// Locally bound keys in insertion order.
    pub fn binding_keys(&self) -> Vec<String> {
        self.inner.bindings.read().keys().cloned().collect()
    }

    /// Finds the binding for `key` here or in the closest ancestor.
    pub fn get_binding(&self, key: &str) -> Option<Binding> {
        self.find_owner(key).map(|(_, binding)| binding)
    }

    fn find_owner(&self, key: &str) -> Option<(Context, Binding)> {
        if let Some(binding) = self.inner.bindings.read().get(key) {
            return Some((self.clone(), binding.clone()));
        }

        self.parent().and_then(|parent| parent.find_owner(key))
    }

    pub(crate) fn with_binding(&self, key: &str, configure: impl FnOnce(&mut Binding)) {
        if let Some(binding) = self.inner.bindings.write().get_mut(key) {
            configure(binding);
        }
    }

    /// Resolves `key` with a fresh session.
    pub fn get(&self, key: &str) -> Result<ValueOrPromise, ResolutionError> {
        self.get_with_session(key, &ResolutionSession::new())
    }

    /// Resolves `key`, threading the given session through nested resolutions.
    /// The provider runs against this (requesting) context, so dependencies
    /// resolve with child-local overrides; caching follows the binding scope.
    pub fn get_with_session(
        &self,
        key: &str,
        session: &ResolutionSession,
    ) -> Result<ValueOrPromise, ResolutionError> {
        let (owner, binding) = self
            .find_owner(key)
            .ok_or_else(|| ResolutionError::KeyNotBound {
                key: key.to_string(),
                context: self.inner.name.clone(),
            })?;

        trace!(context = %self.inner.name, key, scope = ?binding.scope(), "resolving key");

        self.resolve_binding(&owner, &binding, session)
    }

    /// Resolves an already-located binding against this (requesting) context,
    /// with caching directed by the binding scope. Tag matches resolve through
    /// here rather than by key, so a non-matching local shadow of the same key
    /// can never be substituted for the matched binding.
    pub(crate) fn resolve_binding(
        &self,
        owner: &Context,
        binding: &Binding,
        session: &ResolutionSession,
    ) -> Result<ValueOrPromise, ResolutionError> {
        match binding.scope() {
            BindingScope::Transient => binding.get_value(self, session),
            BindingScope::Singleton => owner.resolve_cached(self, binding, session),
            BindingScope::Context => {
                // the per-requesting-context cache is keyed by binding key; a
                // binding reached past a local shadow of that key must not
                // share the shadow's slot, so it resolves uncached here
                let shadowed = self
                    .find_owner(binding.key())
                    .map(|(key_owner, _)| !Arc::ptr_eq(&key_owner.inner, &owner.inner))
                    .unwrap_or(true);

                if shadowed {
                    binding.get_value(self, session)
                } else {
                    self.resolve_cached(self, binding, session)
                }
            }
        }
    }

    /// Resolves `key` synchronously, failing if the value turns out to be a
    /// promise.
    pub fn get_sync(&self, key: &str) -> Result<BoundValue, ResolutionError> {
        self.get(key)?.into_sync(key)
    }

    /// Resolves through the cache slot owned by `self`, producing the value in
    /// the `requesting` context on a miss. Each slot computes at most once:
    /// pending results are stored as shared futures immediately, so
    /// interleaved awaits of the same slot join one computation.
    fn resolve_cached(
        &self,
        requesting: &Context,
        binding: &Binding,
        session: &ResolutionSession,
    ) -> Result<ValueOrPromise, ResolutionError> {
        let cached = self.inner.cache.read().get(binding.key()).cloned();
        match cached {
            Some(CachedValue::Ready(value)) => return Ok(ValueOrPromise::Ready(value)),
            Some(CachedValue::Pending(shared)) => {
                // a pending slot awaited from inside its own production would
                // never settle; a live stack entry for the key means the
                // production has not finished on this session, so the request
                // is rejected as a cycle. Concurrent handles to a pending slot
                // belong on forked sessions.
                let guard = session.push(ResolutionElement::Binding(binding.key().to_string()))?;
                drop(guard);

                match shared.peek() {
                    Some(Ok(value)) => return Ok(ValueOrPromise::Ready(value.clone())),
                    // a settled failure was delivered to every waiter of that
                    // computation; it does not poison the slot, so the
                    // provider reruns for this request
                    Some(Err(_)) => {
                        self.inner.cache.write().remove(binding.key());
                    }
                    None => return Ok(ValueOrPromise::Pending(shared.boxed())),
                }
            }
            None => {}
        }

        match binding.get_value(requesting, session)? {
            ValueOrPromise::Ready(value) => {
                self.inner
                    .cache
                    .write()
                    .insert(binding.key().to_string(), CachedValue::Ready(value.clone()));
                Ok(ValueOrPromise::Ready(value))
            }
            ValueOrPromise::Pending(future) => {
                let shared = future.shared();
                self.inner.cache.write().insert(
                    binding.key().to_string(),
                    CachedValue::Pending(shared.clone()),
                );
                Ok(ValueOrPromise::Pending(shared.boxed()))
            }
        }
    }

    /// Returns all bindings whose tag set matches `filter`. Local bindings
    /// precede inherited ones, each group in insertion order; a matching local
    /// key shadows the same key in an ancestor.
    pub fn find_by_tag(&self, filter: impl Into<TagFilter>) -> Vec<Binding> {
        self.matching_bindings(&filter.into())
            .into_iter()
            .map(|(_, binding)| binding)
            .collect()
    }

    /// Like [`find_by_tag`](Self::find_by_tag), but pairs each match with the
    /// context that owns it, so the match can be resolved with its owner's
    /// cache even when this context binds the same key without the tag.
    pub(crate) fn matching_bindings(&self, filter: &TagFilter) -> Vec<(Context, Binding)> {
        let mut found = Vec::new();
        let mut seen: FxHashSet<String> = Default::default();
        let mut current = Some(self.clone());

        while let Some(context) = current {
            for binding in context.inner.bindings.read().values() {
                if !seen.contains(binding.key()) && filter.matches(binding) {
                    seen.insert(binding.key().to_string());
                    found.push((context.clone(), binding.clone()));
                }
            }

            current = context.parent();
        }

        found
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.inner.name)
            .field("bindings", &self.inner.bindings.read().len())
            .finish()
    }
}
