//! Type-erased bound values and the sync-or-async resolution result.
//!
//! Resolution never forces callers into async code: a [ValueOrPromise] is
//! [Ready](ValueOrPromise::Ready) whenever every step of the resolution
//! completed synchronously, and only becomes
//! [Pending](ValueOrPromise::Pending) when some provider actually yielded.

use crate::error::ResolutionError;
use crate::session::SessionGuard;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

/// A value held by a binding, erased to its most general form.
pub type BoundValue = Arc<dyn Any + Send + Sync>;

/// Future produced by an asynchronous resolution.
pub type ResolveFuture = BoxFuture<'static, Result<BoundValue, ResolutionError>>;

/// Result of resolving a binding: either immediately available or still being
/// produced.
pub enum ValueOrPromise {
    Ready(BoundValue),
    Pending(ResolveFuture),
}

impl ValueOrPromise {
    /// Wraps a concrete value as a ready result.
    pub fn from_value<T: Any + Send + Sync>(value: T) -> Self {
        Self::Ready(Arc::new(value))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Awaits the value regardless of variant.
    pub async fn resolve(self) -> Result<BoundValue, ResolutionError> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Pending(future) => future.await,
        }
    }

    /// Unwraps a synchronously available value, failing if the resolution
    /// turned out to be asynchronous. `key` is only used for the error text.
    pub fn into_sync(self, key: &str) -> Result<BoundValue, ResolutionError> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Pending(_) => Err(ResolutionError::ValueIsPromise {
                key: key.to_string(),
            }),
        }
    }

    /// Keeps the given session guard alive until the value settles, so cycle
    /// detection covers the asynchronous tail of a resolution.
    pub(crate) fn guarded(self, guard: SessionGuard) -> Self {
        match self {
            Self::Ready(value) => {
                drop(guard);
                Self::Ready(value)
            }
            Self::Pending(future) => Self::Pending(
                async move {
                    let _guard = guard;
                    future.await
                }
                .boxed(),
            ),
        }
    }
}

impl fmt::Debug for ValueOrPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("ValueOrPromise::Ready(..)"),
            Self::Pending(_) => f.write_str("ValueOrPromise::Pending(..)"),
        }
    }
}

/// Downcasts a bound value to its concrete type.
pub fn downcast<T: Any + Send + Sync>(value: BoundValue) -> Result<Arc<T>, ResolutionError> {
    value
        .downcast()
        .map_err(|_| ResolutionError::IncompatibleValue {
            requested: type_name::<T>(),
        })
}

/// Joins multiple resolution results and assembles them into a single value.
/// Synchronous when every input is ready; otherwise produces one pending
/// result which awaits all inputs, reassembled back into their original order.
pub(crate) fn join_values<F>(
    values: Vec<ValueOrPromise>,
    assemble: F,
) -> Result<ValueOrPromise, ResolutionError>
where
    F: FnOnce(Vec<BoundValue>) -> Result<BoundValue, ResolutionError> + Send + 'static,
{
    if values.iter().any(ValueOrPromise::is_pending) {
        Ok(ValueOrPromise::Pending(
            async move {
                let values = try_join_all(values.into_iter().map(ValueOrPromise::resolve)).await?;
                assemble(values)
            }
            .boxed(),
        ))
    } else {
        let mut ready = Vec::with_capacity(values.len());
        for value in values {
            if let ValueOrPromise::Ready(value) = value {
                ready.push(value);
            }
        }
        assemble(ready).map(ValueOrPromise::Ready)
    }
}
