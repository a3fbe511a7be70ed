//! Strategies for resolving injection points.
//!
//! All strategies share one shape: given the resolution context, the injection
//! descriptor and the current session, produce a sync-or-async value. The
//! default strategy fetches the descriptor's key; [Injection](crate::inject::Injection)
//! constructors select the getter, setter and tag-array strategies instead.

use crate::context::Context;
use crate::error::ResolutionError;
use crate::inject::Injection;
use crate::provide::{ClassProvider, InstantiationArgs};
use crate::session::{ResolutionElement, ResolutionSession};
use crate::value::{join_values, BoundValue, ValueOrPromise};
use fxhash::FxHashMap;
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// Resolves a single injection point, recording it on the session so cycle
/// paths name the class and member. Dispatches to the descriptor's custom
/// resolver when present, otherwise fetches the binding key.
pub(crate) fn resolve_injection(
    ctx: &Context,
    class: &str,
    site: &str,
    injection: &Injection,
    session: &ResolutionSession,
) -> Result<ValueOrPromise, ResolutionError> {
    let guard = session.push(ResolutionElement::Injection {
        class: class.to_string(),
        site: site.to_string(),
    })?;

    let resolved = match &injection.resolve {
        Some(resolve) => resolve(ctx, injection, session),
        None => ctx.get_with_session(&injection.binding_key, session),
    };

    match resolved {
        Ok(value) => Ok(value.guarded(guard)),
        // name the requesting class for unbound keys; other errors already
        // carry their own diagnostics
        Err(error @ ResolutionError::KeyNotBound { .. }) => {
            Err(ResolutionError::injection(class, site, error))
        }
        Err(error) => Err(error),
    }
}

/// Resolves constructor and property injections for a class binding, then
/// constructs the instance. Synchronous when every dependency resolved
/// synchronously; otherwise one pending result joins them in declaration
/// order before construction proceeds.
pub(crate) fn resolve_class(
    provider: &ClassProvider,
    ctx: &Context,
    session: &ResolutionSession,
) -> Result<ValueOrPromise, ResolutionError> {
    let class = provider.class_name();
    let registry = ctx.injections();
    let parameters = registry.arguments_by_id(provider.type_id(), "");
    let properties = registry.properties_by_id(provider.type_id());

    trace!(
        class,
        parameters = parameters.len(),
        properties = properties.len(),
        "resolving class injections"
    );

    let mut resolved = Vec::with_capacity(parameters.len() + properties.len());
    for (index, slot) in parameters.iter().enumerate() {
        let injection = slot
            .as_ref()
            .ok_or_else(|| ResolutionError::NonInjectedParameter {
                class: class.to_string(),
                index,
            })?;

        // each argument resolves on its own session fork, so siblings cannot
        // trip each other's cycle detection
        resolved.push(resolve_injection(
            ctx,
            class,
            &format!("constructor[{index}]"),
            injection,
            &session.fork(),
        )?);
    }

    let mut property_names = Vec::with_capacity(properties.len());
    for (name, injection) in &properties {
        resolved.push(resolve_injection(ctx, class, name, injection, &session.fork())?);
        property_names.push(name.clone());
    }

    let argument_count = parameters.len();
    let provider = provider.clone();
    join_values(resolved, move |mut values| {
        let properties: FxHashMap<_, _> = property_names
            .into_iter()
            .zip(values.split_off(argument_count))
            .collect();

        provider.construct(InstantiationArgs::new(
            provider.class_name(),
            values,
            properties,
        ))
    })
}

/// Deferred lookup handle injected by [Injection::getter](crate::inject::Injection::getter).
/// Owns a session snapshot and a handle to the context, so it stays valid
/// after the originating resolution completed.
#[derive(Clone)]
pub struct Getter {
    context: Context,
    binding_key: String,
    session: ResolutionSession,
}

impl Getter {
    pub fn key(&self) -> &str {
        &self.binding_key
    }

    /// Performs the deferred lookup.
    pub fn get(&self) -> Result<ValueOrPromise, ResolutionError> {
        self.context
            .get_with_session(&self.binding_key, &self.session)
    }
}

pub(crate) fn resolve_as_getter(
    ctx: &Context,
    injection: &Injection,
    session: &ResolutionSession,
) -> Result<ValueOrPromise, ResolutionError> {
    // the session is forked now; the getter may run long after the original
    // stack has been popped
    Ok(ValueOrPromise::from_value(Getter {
        context: ctx.clone(),
        binding_key: injection.binding_key.clone(),
        session: session.fork(),
    }))
}

/// Binding populator injected by [Injection::setter](crate::inject::Injection::setter).
/// Writes a constant binding; classes and providers cannot be bound through
/// this path.
#[derive(Clone)]
pub struct Setter {
    context: Context,
    binding_key: String,
}

impl Setter {
    pub fn key(&self) -> &str {
        &self.binding_key
    }

    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        self.context.bind(self.binding_key.clone()).to(value);
    }
}

pub(crate) fn resolve_as_setter(
    ctx: &Context,
    injection: &Injection,
    _session: &ResolutionSession,
) -> Result<ValueOrPromise, ResolutionError> {
    // no session propagates into the setter; binding a constant cannot recurse
    Ok(ValueOrPromise::from_value(Setter {
        context: ctx.clone(),
        binding_key: injection.binding_key.clone(),
    }))
}

/// Resolves every binding matching the tag filter in the injection metadata
/// into an ordered `Vec<BoundValue>`, following
/// [find_by_tag](crate::context::Context::find_by_tag) order. The result is
/// ready when every element is ready. A failed element fails the whole array;
/// elements are never dropped silently.
pub(crate) fn resolve_by_tag(
    ctx: &Context,
    injection: &Injection,
    session: &ResolutionSession,
) -> Result<ValueOrPromise, ResolutionError> {
    let filter = injection
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.tag.clone())
        .ok_or(ResolutionError::MissingTagFilter)?;

    let bindings = ctx.matching_bindings(&filter);
    trace!(matches = bindings.len(), "resolving tag injection");

    let mut values = Vec::with_capacity(bindings.len());
    for (owner, binding) in &bindings {
        // the matched binding is resolved directly; a by-key lookup here could
        // land on a non-matching binding shadowing the key in `ctx`. Each
        // element gets its own session fork, so resolving siblings in parallel
        // cannot cross-contaminate cycle detection
        values.push(ctx.resolve_binding(owner, binding, &session.fork())?);
    }

    join_values(values, |values| Ok(Arc::new(values) as BoundValue))
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::inject::Injection;
    use crate::resolver::{resolve_injection, Getter, Setter};
    use crate::session::ResolutionSession;
    use crate::value::downcast;

    #[test]
    fn should_resolve_direct_injection_by_key() {
        let ctx = Context::new("test");
        ctx.bind("a").to(1_i32);

        let value = resolve_injection(
            &ctx,
            "TestComponent",
            "constructor[0]",
            &Injection::key("a"),
            &ResolutionSession::new(),
        )
        .unwrap()
        .into_sync("a")
        .unwrap();

        assert_eq!(*downcast::<i32>(value).unwrap(), 1);
    }

    #[test]
    fn should_name_requesting_class_for_unbound_key() {
        let ctx = Context::new("test");

        let error = resolve_injection(
            &ctx,
            "TestComponent",
            "constructor[0]",
            &Injection::key("missing"),
            &ResolutionSession::new(),
        )
        .unwrap_err();

        assert!(error.to_string().contains("TestComponent"));
        assert!(error.to_string().contains("missing"));
    }

    #[test]
    fn should_defer_lookup_through_getter() {
        let ctx = Context::new("test");
        let session = ResolutionSession::new();

        let getter = resolve_injection(
            &ctx,
            "TestComponent",
            "constructor[0]",
            &Injection::getter("late"),
            &session,
        )
        .unwrap()
        .into_sync("late")
        .unwrap();
        let getter = downcast::<Getter>(getter).unwrap();

        // the key becomes bound only after the getter was injected
        assert!(getter.get().is_err());
        ctx.bind("late").to(2_i32);

        let value = getter.get().unwrap().into_sync("late").unwrap();
        assert_eq!(*downcast::<i32>(value).unwrap(), 2);
    }

    #[test]
    fn should_populate_binding_through_setter() {
        let ctx = Context::new("test");

        let setter = resolve_injection(
            &ctx,
            "TestComponent",
            "out",
            &Injection::setter("produced"),
            &ResolutionSession::new(),
        )
        .unwrap()
        .into_sync("produced")
        .unwrap();
        let setter = downcast::<Setter>(setter).unwrap();

        setter.set("done".to_string());

        let value = ctx.get_sync("produced").unwrap();
        assert_eq!(*downcast::<String>(value).unwrap(), "done");
    }
}
