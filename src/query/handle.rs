//! Single-resolution result handles
//!
//! Every execute call schedules its work on the ambient Tokio runtime and
//! returns a `ResultHandle` at once. The handle resolves exactly once, with
//! the result or with the error that rejected it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::errors::{QueryError, QueryResult};

/// Pending result of one query or store call
#[derive(Debug)]
pub struct ResultHandle<T> {
    task: JoinHandle<QueryResult<T>>,
}

impl<T: Send + 'static> ResultHandle<T> {
    /// Schedules `work` and returns its handle.
    ///
    /// Fails synchronously when called outside a Tokio runtime.
    pub(crate) fn spawn<F>(work: F) -> QueryResult<Self>
    where
        F: FnOnce() -> QueryResult<T> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| QueryError::NoRuntime(e.to_string()))?;
        Ok(Self {
            task: runtime.spawn(async move { work() }),
        })
    }

    /// Continues with one of two callbacks, depending on the outcome
    pub fn then<U, F, R>(self, on_fulfilled: F, on_rejected: R) -> impl Future<Output = U>
    where
        F: FnOnce(T) -> U,
        R: FnOnce(QueryError) -> U,
    {
        self.map(|outcome| match outcome {
            Ok(value) => on_fulfilled(value),
            Err(err) => on_rejected(err),
        })
    }
}

impl<T> Future for ResultHandle<T> {
    type Output = QueryResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().task).poll(cx).map(|joined| match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(QueryError::Aborted(e.to_string())),
        })
    }
}
