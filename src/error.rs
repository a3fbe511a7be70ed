use thiserror::Error;

/// Errors raised when declaring injection metadata. These are configuration
/// errors and are fatal at registration time.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum RegistrationError {
    #[error("Injection is not supported for static member '{class}.{member}'")]
    StaticMemberInjection { class: String, member: String },
    #[error("Injection cannot target method '{class}.{member}' itself; annotate one of its parameters instead")]
    MethodInjection { class: String, member: String },
}

/// Errors raised while resolving bindings. Cloneable, since failed cached
/// resolutions replay the same error to every waiter.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum ResolutionError {
    #[error("The key '{key}' is not bound to any value in context '{context}' or its ancestors")]
    KeyNotBound { key: String, context: String },
    #[error("Circular dependency detected: {path}")]
    CircularDependency { path: String },
    #[error("Cannot get the value for key '{key}' synchronously: the value is a promise")]
    ValueIsPromise { key: String },
    #[error("Binding '{key}' has no value provider configured")]
    ProviderMissing { key: String },
    #[error("Bound value cannot be downcast to the requested type '{requested}'")]
    IncompatibleValue { requested: &'static str },
    #[error("Cannot instantiate '{class}': constructor parameter {index} has no registered injection")]
    NonInjectedParameter { class: String, index: usize },
    #[error("Cannot instantiate '{class}': no injected property '{name}' was resolved")]
    NonInjectedProperty { class: String, name: String },
    #[error("Tag injection carries no tag filter in its metadata")]
    MissingTagFilter,
    #[error("Cannot resolve injection '{site}' of '{class}': {source}")]
    Injection {
        class: String,
        site: String,
        #[source]
        source: Box<ResolutionError>,
    },
}

impl ResolutionError {
    pub(crate) fn injection(class: &str, site: &str, source: ResolutionError) -> Self {
        Self::Injection {
            class: class.to_string(),
            site: site.to_string(),
            source: Box::new(source),
        }
    }
}
