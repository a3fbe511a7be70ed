//! Bindings map a key to a value provider and a caching scope.
//!
//! A binding is created by [Context::bind](crate::context::Context::bind) and
//! configured through the returned [BindingBuilder]. Exactly one provider
//! strategy is active at a time; configuring another replaces the previous one.

use crate::context::Context;
use crate::error::ResolutionError;
use crate::provide::{ClassProvider, Instantiate};
use crate::resolver::resolve_class;
use crate::session::{ResolutionElement, ResolutionSession};
use crate::value::{BoundValue, ValueOrPromise};
use derivative::Derivative;
use fxhash::FxHashSet;
use std::any::Any;
use std::sync::Arc;

/// Caching policy for a binding's resolved value.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum BindingScope {
    /// The provider runs on every `get`.
    #[default]
    Transient,
    /// The value is produced once and cached on the context owning the
    /// binding, for the lifetime of that context.
    Singleton,
    /// The value is cached once per requesting context, so a binding shared
    /// down a context tree can still differ per child.
    Context,
}

/// Factory callable invoked with the resolution context and session.
pub type ProviderFn = Arc<dyn Fn(&Context, &ResolutionSession) -> ValueOrPromise + Send + Sync>;

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub(crate) enum Provider {
    Unconfigured,
    Constant(#[derivative(Debug = "ignore")] BoundValue),
    Class(ClassProvider),
    Factory(#[derivative(Debug = "ignore")] ProviderFn),
}

/// A named, scoped slot whose value is produced by exactly one provider
/// strategy.
#[derive(Clone, Debug)]
pub struct Binding {
    key: String,
    scope: BindingScope,
    tags: FxHashSet<String>,
    provider: Provider,
}

impl Binding {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scope: BindingScope::default(),
            tags: Default::default(),
            provider: Provider::Unconfigured,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scope(&self) -> BindingScope {
        self.scope
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub(crate) fn set_provider(&mut self, provider: Provider) {
        self.provider = provider;
    }

    pub(crate) fn set_scope(&mut self, scope: BindingScope) {
        self.scope = scope;
    }

    pub(crate) fn add_tag(&mut self, tag: String) {
        self.tags.insert(tag);
    }

    /// Produces the binding's value in the given context. Constants return
    /// immediately without touching the session; class and factory providers
    /// record the binding on the session for cycle detection, holding the
    /// entry until the value settles.
    pub fn get_value(
        &self,
        ctx: &Context,
        session: &ResolutionSession,
    ) -> Result<ValueOrPromise, ResolutionError> {
        match &self.provider {
            Provider::Unconfigured => Err(ResolutionError::ProviderMissing {
                key: self.key.clone(),
            }),
            Provider::Constant(value) => Ok(ValueOrPromise::Ready(value.clone())),
            Provider::Class(class) => {
                let guard = session.push(ResolutionElement::Binding(self.key.clone()))?;
                resolve_class(class, ctx, session).map(|value| value.guarded(guard))
            }
            Provider::Factory(factory) => {
                let guard = session.push(ResolutionElement::Binding(self.key.clone()))?;
                Ok(factory(ctx, session).guarded(guard))
            }
        }
    }
}

/// Fluent configuration handle for a binding stored in a context. All calls
/// write through to the stored binding, so configuration is visible to lookups
/// immediately.
pub struct BindingBuilder {
    context: Context,
    key: String,
}

impl BindingBuilder {
    pub(crate) fn new(context: Context, key: String) -> Self {
        Self { context, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Binds to a constant value.
    pub fn to<T: Any + Send + Sync>(self, value: T) -> Self {
        self.to_value(Arc::new(value))
    }

    /// Binds to an already type-erased constant value.
    pub fn to_value(self, value: BoundValue) -> Self {
        self.configure(|binding| binding.set_provider(Provider::Constant(value)))
    }

    /// Binds to a class constructed by the container, with its injections
    /// resolved from the requesting context.
    pub fn to_class<T: Instantiate>(self) -> Self {
        self.configure(|binding| binding.set_provider(Provider::Class(ClassProvider::of::<T>())))
    }

    /// Binds to a factory invoked on resolution.
    pub fn to_provider<F>(self, provider: F) -> Self
    where
        F: Fn(&Context, &ResolutionSession) -> ValueOrPromise + Send + Sync + 'static,
    {
        self.configure(|binding| binding.set_provider(Provider::Factory(Arc::new(provider))))
    }

    /// Adds a tag; adding the same tag twice is a no-op.
    pub fn tag(self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.configure(|binding| binding.add_tag(tag))
    }

    /// Sets the caching scope.
    pub fn in_scope(self, scope: BindingScope) -> Self {
        self.configure(|binding| binding.set_scope(scope))
    }

    fn configure(self, configure: impl FnOnce(&mut Binding)) -> Self {
        self.context.with_binding(&self.key, configure);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::error::ResolutionError;
    use crate::session::{ResolutionElement, ResolutionSession};
    use crate::value::{downcast, ValueOrPromise};

    #[test]
    fn should_fail_for_unconfigured_binding() {
        let ctx = Context::new("test");
        ctx.bind("empty");

        assert_eq!(
            ctx.get("empty").unwrap_err(),
            ResolutionError::ProviderMissing {
                key: "empty".to_string()
            }
        );
    }

    #[test]
    fn should_replace_provider_on_reconfiguration() {
        let ctx = Context::new("test");
        ctx.bind("value")
            .to(1_i32)
            .to_provider(|_, _| ValueOrPromise::from_value(2_i32));

        let value = ctx.get_sync("value").unwrap();
        assert_eq!(*downcast::<i32>(value).unwrap(), 2);
    }

    #[test]
    fn should_keep_tags_idempotent() {
        let ctx = Context::new("test");
        ctx.bind("value").to(1_i32).tag("number").tag("number");

        let binding = ctx.get_binding("value").unwrap();
        assert_eq!(binding.tags().count(), 1);
        assert!(binding.has_tag("number"));
    }

    #[test]
    fn should_resolve_constants_without_session_interaction() {
        let ctx = Context::new("test");
        ctx.bind("value").to(1_i32);

        // a constant must not trip cycle detection even when its own key is
        // already on the stack
        let session = ResolutionSession::new();
        let _guard = session
            .push(ResolutionElement::Binding("value".to_string()))
            .unwrap();

        let binding = ctx.get_binding("value").unwrap();
        assert!(binding.get_value(&ctx, &session).is_ok());
        assert_eq!(session.depth(), 1);
    }

    #[test]
    fn should_record_factory_resolution_on_session() {
        let ctx = Context::new("test");
        ctx.bind("value").to_provider(|_, session| {
            assert_eq!(session.depth(), 1);
            ValueOrPromise::from_value(1_i32)
        });

        let session = ResolutionSession::new();
        ctx.get_with_session("value", &session).unwrap();
        assert_eq!(session.depth(), 0);
    }
}
