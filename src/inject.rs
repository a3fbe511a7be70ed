//! Injection metadata: descriptors for injection points and the registry which
//! stands in for decorator-attached metadata.
//!
//! Injection points are declared through explicit registration calls on the
//! [InjectionRegistry] owned by the root [Context](crate::context::Context)
//! and shared across its whole tree:
//!
//! ```
//! use contexture::context::Context;
//! use contexture::inject::Injection;
//!
//! struct Greeter;
//!
//! let ctx = Context::new("app");
//! ctx.injections()
//!     .register_parameter::<Greeter>(None, 0, Injection::key("greeting"));
//! ```

use crate::context::{Context, TagFilter};
use crate::error::{RegistrationError, ResolutionError};
use crate::resolver;
use crate::session::ResolutionSession;
use crate::value::ValueOrPromise;
use derivative::Derivative;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::sync::Arc;
use tracing::debug;

/// Custom resolution strategy carried by an injection descriptor, overriding
/// the default fetch-by-key behavior.
pub type ResolverFn = Arc<
    dyn Fn(&Context, &Injection, &ResolutionSession) -> Result<ValueOrPromise, ResolutionError>
        + Send
        + Sync,
>;

/// Free-form attributes guiding an injection, e.g. the tag filter driving
/// tag-array injection.
#[derive(Clone, Debug, Default)]
pub struct InjectionMetadata {
    pub tag: Option<TagFilter>,
    pub attributes: FxHashMap<String, String>,
}

/// Descriptor for a single injection point.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Injection {
    /// Key to resolve. Empty for purely metadata-driven strategies such as
    /// tag-array injection.
    pub binding_key: String,
    pub metadata: Option<InjectionMetadata>,
    #[derivative(Debug = "ignore")]
    pub resolve: Option<ResolverFn>,
}

impl Injection {
    /// Plain fetch-by-key injection.
    pub fn key(binding_key: impl Into<String>) -> Self {
        Self {
            binding_key: binding_key.into(),
            metadata: None,
            resolve: None,
        }
    }

    /// Injects a deferred [Getter](crate::resolver::Getter) for the key. The
    /// lookup happens when the getter is invoked, which may be long after the
    /// instance was constructed. Useful when a dependency only becomes bound
    /// in a later phase.
    pub fn getter(binding_key: impl Into<String>) -> Self {
        Self::key(binding_key).with_resolver(Arc::new(resolver::resolve_as_getter))
    }

    /// Injects a [Setter](crate::resolver::Setter) which populates the key
    /// with a constant value.
    pub fn setter(binding_key: impl Into<String>) -> Self {
        Self::key(binding_key).with_resolver(Arc::new(resolver::resolve_as_setter))
    }

    /// Injects all values whose bindings match the tag filter, ordered like
    /// [find_by_tag](crate::context::Context::find_by_tag).
    pub fn tag(filter: impl Into<TagFilter>) -> Self {
        Self {
            binding_key: String::new(),
            metadata: Some(InjectionMetadata {
                tag: Some(filter.into()),
                attributes: Default::default(),
            }),
            resolve: Some(Arc::new(resolver::resolve_by_tag)),
        }
    }

    pub fn with_metadata(mut self, metadata: InjectionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_resolver(mut self, resolve: ResolverFn) -> Self {
        self.resolve = Some(resolve);
        self
    }
}

/// Kind of class member targeted by a property injection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemberKind {
    InstanceProperty,
    StaticProperty,
    Method,
}

/// Explicit registry of injection descriptors, keyed by target type. Plays the
/// role decorator metadata plays in reflective languages: injection points are
/// declared through registration calls instead of annotations.
#[derive(Default)]
pub struct InjectionRegistry {
    parameters: RwLock<FxHashMap<(TypeId, String), Vec<Option<Injection>>>>,
    properties: RwLock<FxHashMap<TypeId, FxHashMap<String, Injection>>>,
}

impl InjectionRegistry {
    /// Registers an injection for a constructor or method parameter. `method`
    /// of `None` targets the constructor. Slots between registered indices
    /// stay empty until registered themselves.
    pub fn register_parameter<T: 'static>(
        &self,
        method: Option<&str>,
        index: usize,
        injection: Injection,
    ) {
        debug!(
            class = type_name::<T>(),
            method = method.unwrap_or("constructor"),
            index,
            "registering parameter injection"
        );

        let mut parameters = self.parameters.write();
        let slots = parameters
            .entry((TypeId::of::<T>(), method.unwrap_or_default().to_string()))
            .or_default();

        if slots.len() <= index {
            slots.resize(index + 1, None);
        }
        slots[index] = Some(injection);
    }

    /// Registers an injection for an instance property. Static members and
    /// whole methods are rejected outright; only a single parameter of a
    /// method can be an injection target.
    pub fn register_property<T: 'static>(
        &self,
        member: &str,
        kind: MemberKind,
        injection: Injection,
    ) -> Result<(), RegistrationError> {
        match kind {
            MemberKind::StaticProperty => Err(RegistrationError::StaticMemberInjection {
                class: type_name::<T>().to_string(),
                member: member.to_string(),
            }),
            MemberKind::Method => Err(RegistrationError::MethodInjection {
                class: type_name::<T>().to_string(),
                member: member.to_string(),
            }),
            MemberKind::InstanceProperty => {
                debug!(
                    class = type_name::<T>(),
                    member, "registering property injection"
                );

                self.properties
                    .write()
                    .entry(TypeId::of::<T>())
                    .or_default()
                    .insert(member.to_string(), injection);

                Ok(())
            }
        }
    }

    /// Ordered per-parameter descriptors for a constructor (`method` `None`)
    /// or a named method. Slots without a registered injection are `None` and
    /// are left for the caller to fill by other means.
    pub fn describe_injected_arguments<T: 'static>(
        &self,
        method: Option<&str>,
    ) -> Vec<Option<Injection>> {
        self.arguments_by_id(TypeId::of::<T>(), method.unwrap_or_default())
    }

    pub(crate) fn arguments_by_id(&self, type_id: TypeId, method: &str) -> Vec<Option<Injection>> {
        self.parameters
            .read()
            .get(&(type_id, method.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Property-name to descriptor map for a class.
    pub fn describe_injected_properties<T: 'static>(&self) -> FxHashMap<String, Injection> {
        self.properties_by_id(TypeId::of::<T>())
    }

    pub(crate) fn properties_by_id(&self, type_id: TypeId) -> FxHashMap<String, Injection> {
        self.properties
            .read()
            .get(&type_id)
            .cloned()
            .unwrap_or_default()
    }
}
