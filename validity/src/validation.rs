//! The value returned by `validate()`.

use std::fmt;
use std::future::IntoFuture;

use futures::FutureExt;
use futures::future::{self, join_all};

use crate::registry::BoxFuture;

/// Outcome of starting a validation.
///
/// Synchronous validators settle before `validate()` returns, giving
/// [`Settled`](Self::Settled). As soon as one validator is asynchronous the
/// call yields [`Pending`](Self::Pending): its async validators make progress
/// while the future is polled, and it resolves to the aggregate validity once
/// every validator of this call has settled.
///
/// Either form can be awaited:
///
/// ```ignore
/// let valid = field.validate().await;
/// ```
pub enum Validation {
    Settled(bool),
    Pending(BoxFuture<'static, bool>),
}

impl Validation {
    /// The verdict, if it is already known.
    pub fn settled(&self) -> Option<bool> {
        match self {
            Self::Settled(valid) => Some(*valid),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Combine several validations into one that is valid when all are.
    ///
    /// Stays synchronous when every part is.
    pub fn all(parts: Vec<Validation>) -> Self {
        if parts.iter().all(|part| !part.is_pending()) {
            return Self::Settled(parts.iter().all(|part| part.settled() == Some(true)));
        }
        Self::Pending(Box::pin(async move {
            join_all(parts.into_iter().map(IntoFuture::into_future))
                .await
                .into_iter()
                .all(|valid| valid)
        }))
    }
}

impl IntoFuture for Validation {
    type Output = bool;
    type IntoFuture = BoxFuture<'static, bool>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Settled(valid) => future::ready(valid).boxed(),
            Self::Pending(fut) => fut,
        }
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settled(valid) => f.debug_tuple("Settled").field(valid).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
