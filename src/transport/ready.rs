//! Readiness gate shared by every transport.
//!
//! A transport's asynchronous initialization (opening files, connecting to
//! a backing store) is wrapped in a shared future armed exactly once, at
//! construction. Writes await it and therefore queue behind initialization
//! instead of failing while it is in flight; once resolved, every waiter
//! observes the same outcome.

use crate::error::TransportError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::Arc;

pub(crate) type Readiness<T> = Shared<BoxFuture<'static, Result<T, Arc<TransportError>>>>;

/// Arms the gate. When called inside a Tokio runtime the initialization is
/// started eagerly on a spawned task; otherwise the first write drives it.
pub(crate) fn arm<T, F>(init: F) -> Readiness<T>
where
    T: Clone + Send + Sync + 'static,
    F: Future<Output = Result<T, TransportError>> + Send + 'static,
{
    let readiness = init.map(|result| result.map_err(Arc::new)).boxed().shared();
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(readiness.clone());
    }
    readiness
}

pub(crate) async fn wait<T>(readiness: &Readiness<T>) -> Result<T, TransportError>
where
    T: Clone + Send + Sync + 'static,
{
    readiness.clone().await.map_err(TransportError::Init)
}
