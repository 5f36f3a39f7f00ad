//! Scoped acquisition of broker resources
//!
//! `scoped` runs an operation against a resource and closes the resource
//! afterwards whatever the outcome. Nesting `scoped` calls releases handles
//! innermost first. Close failures are logged and dropped so they never
//! replace the operation's own result.
//!
//! Teardown survives cancellation. The close runs on a spawned task, and a
//! scope dropped before its operation finished (a timed-out or abandoned
//! request) spawns the close from `Drop`.

use std::future::Future;
use std::sync::Arc;

use mqweb_client::Resource;
use mqweb_types::Result;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Close a resource, logging instead of returning a failure
pub async fn release<R>(resource: &R)
where
    R: Resource + ?Sized,
{
    match resource.close().await {
        Ok(()) => debug!(resource = %resource.kind(), "Released"),
        Err(e) => warn!(resource = %resource.kind(), error = %e, "Failed to close broker resource"),
    }
}

/// Releases its resource on a background task unless disarmed first
struct ReleaseGuard<R>
where
    R: Resource + ?Sized + 'static,
{
    resource: Option<Arc<R>>,
}

impl<R> ReleaseGuard<R>
where
    R: Resource + ?Sized + 'static,
{
    fn new(resource: Arc<R>) -> Self {
        Self {
            resource: Some(resource),
        }
    }

    /// Close the resource and wait for it
    ///
    /// The close keeps running if the caller stops waiting.
    async fn release(mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        let kind = resource.kind();
        let task = tokio::spawn(async move { release(resource.as_ref()).await });
        if let Err(e) = task.await {
            warn!(resource = %kind, error = %e, "Release task failed");
        }
    }
}

impl<R> Drop for ReleaseGuard<R>
where
    R: Resource + ?Sized + 'static,
{
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                debug!(resource = %resource.kind(), "Scope abandoned, releasing in background");
                handle.spawn(async move { release(resource.as_ref()).await });
            }
            Err(_) => {
                warn!(resource = %resource.kind(), "Scope abandoned outside a runtime, resource not closed");
            }
        }
    }
}

/// Run `operation` with `resource`, then release it
pub async fn scoped<R, T, F, Fut>(resource: Arc<R>, operation: F) -> Result<T>
where
    R: Resource + ?Sized + 'static,
    F: FnOnce(Arc<R>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = ReleaseGuard::new(Arc::clone(&resource));
    let outcome = operation(resource).await;
    guard.release().await;
    outcome
}
