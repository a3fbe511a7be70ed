//! Runtime inversion-of-control container with hierarchical contexts, scoped
//! bindings and sync-or-async resolution.
//!
//! A [Context](context::Context) maps string keys to
//! [Binding](binding::Binding)s. Each binding produces its value through one
//! provider strategy (a constant, a class constructed by the container, or a
//! factory), caches it according to its [scope](binding::BindingScope) and can
//! carry tags for group lookup. Lookups not satisfied locally are delegated up
//! the parent chain. Resolution may be asynchronous, but never forces callers
//! into async code: a [ValueOrPromise](value::ValueOrPromise) is ready
//! whenever the whole resolution completed synchronously, and
//! [get_sync](context::Context::get_sync) turns unexpected asynchrony into an
//! explicit error. A [ResolutionSession](session::ResolutionSession) threads
//! through every nested resolution and rejects circular dependencies with the
//! full cycle path.
//!
//! ```
//! use contexture::context::Context;
//! use contexture::value::downcast;
//!
//! let ctx = Context::new("app");
//! ctx.bind("config.port").to(8080_i32);
//!
//! let port = ctx.get_sync("config.port").unwrap();
//! assert_eq!(*downcast::<i32>(port).unwrap(), 8080);
//! ```
//!
//! Classes participate by implementing
//! [Instantiate](provide::Instantiate) and registering their injection points
//! in the context's [InjectionRegistry](inject::InjectionRegistry); see the
//! [inject] and [provide] module docs.

pub mod binding;
pub mod context;
pub mod error;
pub mod inject;
pub mod provide;
pub mod resolver;
pub mod session;
pub mod value;

pub mod future {
    //! Re-exports of the future types appearing in resolution results.
    pub use futures::future::BoxFuture;
    pub use futures::FutureExt;
}

pub use error::{RegistrationError, ResolutionError};
