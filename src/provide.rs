//! Class providers: producing a binding's value by constructing a type whose
//! dependencies are themselves resolved through the container.
//!
//! Since there is no reflection, the container's "constructor reference" is the
//! [Instantiate] trait: the container resolves the injections registered for
//! the type (see [InjectionRegistry](crate::inject::InjectionRegistry)) and
//! hands them over as [InstantiationArgs], already in declaration order.

use crate::error::ResolutionError;
use crate::value::{downcast, BoundValue};
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

/// Contract for types constructible by the container.
///
/// ```
/// use contexture::error::ResolutionError;
/// use contexture::provide::{Instantiate, InstantiationArgs};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Instantiate for Greeter {
///     fn instantiate(args: InstantiationArgs) -> Result<Self, ResolutionError> {
///         Ok(Self {
///             greeting: args.argument_cloned::<String>(0)?,
///         })
///     }
/// }
/// ```
pub trait Instantiate: Send + Sync + Sized + 'static {
    /// Assembles an instance from its resolved constructor arguments and
    /// properties.
    fn instantiate(args: InstantiationArgs) -> Result<Self, ResolutionError>;
}

/// Resolved inputs handed to [Instantiate::instantiate].
pub struct InstantiationArgs {
    class_name: &'static str,
    arguments: Vec<BoundValue>,
    properties: FxHashMap<String, BoundValue>,
}

impl InstantiationArgs {
    pub(crate) fn new(
        class_name: &'static str,
        arguments: Vec<BoundValue>,
        properties: FxHashMap<String, BoundValue>,
    ) -> Self {
        Self {
            class_name,
            arguments,
            properties,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    /// Injected constructor argument at `index`, downcast to its concrete type.
    pub fn argument<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ResolutionError> {
        let value = self
            .arguments
            .get(index)
            .ok_or_else(|| ResolutionError::NonInjectedParameter {
                class: self.class_name.to_string(),
                index,
            })?;

        downcast(value.clone())
    }

    /// By-value variant of [argument](Self::argument) for `Clone` payloads.
    pub fn argument_cloned<T: Any + Send + Sync + Clone>(
        &self,
        index: usize,
    ) -> Result<T, ResolutionError> {
        self.argument::<T>(index).map(|value| (*value).clone())
    }

    /// Injected property `name`, downcast to its concrete type.
    pub fn property<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ResolutionError> {
        let value = self
            .properties
            .get(name)
            .ok_or_else(|| ResolutionError::NonInjectedProperty {
                class: self.class_name.to_string(),
                name: name.to_string(),
            })?;

        downcast(value.clone())
    }

    /// By-value variant of [property](Self::property) for `Clone` payloads.
    pub fn property_cloned<T: Any + Send + Sync + Clone>(
        &self,
        name: &str,
    ) -> Result<T, ResolutionError> {
        self.property::<T>(name).map(|value| (*value).clone())
    }
}

type ConstructFn = fn(InstantiationArgs) -> Result<BoundValue, ResolutionError>;

/// Type-erased constructor reference stored in a class binding.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ClassProvider {
    type_id: TypeId,
    class_name: &'static str,
    #[derivative(Debug = "ignore")]
    construct: ConstructFn,
}

impl ClassProvider {
    pub fn of<T: Instantiate>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            class_name: type_name::<T>(),
            construct: construct_erased::<T>,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn construct(
        &self,
        args: InstantiationArgs,
    ) -> Result<BoundValue, ResolutionError> {
        (self.construct)(args)
    }
}

fn construct_erased<T: Instantiate>(
    args: InstantiationArgs,
) -> Result<BoundValue, ResolutionError> {
    T::instantiate(args).map(|instance| Arc::new(instance) as BoundValue)
}

#[cfg(test)]
mod tests {
    use crate::error::ResolutionError;
    use crate::provide::{ClassProvider, Instantiate, InstantiationArgs};
    use crate::value::{downcast, BoundValue};
    use std::sync::Arc;

    struct TestComponent {
        value: i32,
        label: String,
    }

    impl Instantiate for TestComponent {
        fn instantiate(args: InstantiationArgs) -> Result<Self, ResolutionError> {
            Ok(Self {
                value: args.argument_cloned::<i32>(0)?,
                label: args.property_cloned::<String>("label")?,
            })
        }
    }

    fn create_args() -> InstantiationArgs {
        InstantiationArgs::new(
            "TestComponent",
            vec![Arc::new(5_i32) as BoundValue],
            [("label".to_string(), Arc::new("a".to_string()) as BoundValue)]
                .into_iter()
                .collect(),
        )
    }

    #[test]
    fn should_construct_through_erased_provider() {
        let provider = ClassProvider::of::<TestComponent>();
        let instance = provider.construct(create_args()).unwrap();
        let instance = downcast::<TestComponent>(instance).unwrap();

        assert_eq!(instance.value, 5);
        assert_eq!(instance.label, "a");
    }

    #[test]
    fn should_report_missing_argument() {
        let args = InstantiationArgs::new("TestComponent", vec![], Default::default());
        assert_eq!(
            args.argument::<i32>(0).unwrap_err(),
            ResolutionError::NonInjectedParameter {
                class: "TestComponent".to_string(),
                index: 0,
            }
        );
    }

    #[test]
    fn should_report_missing_property() {
        let args = InstantiationArgs::new("TestComponent", vec![], Default::default());
        assert_eq!(
            args.property::<String>("label").unwrap_err(),
            ResolutionError::NonInjectedProperty {
                class: "TestComponent".to_string(),
                name: "label".to_string(),
            }
        );
    }
}
