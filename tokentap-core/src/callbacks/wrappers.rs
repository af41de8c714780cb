use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::callbacks::{InvocationMode, TelemetryManager};
use crate::{extract, CallRecord, CallShape, ProviderResponse, RequestSnapshot};

/// Async callable wrapped with telemetry.
///
/// `call` returns exactly what the inner callable returned; telemetry is
/// emitted to the manager's handlers in between.
pub struct Instrumented<F> {
    inner: F,
    manager: TelemetryManager,
}

impl<F> Instrumented<F> {
    pub fn new(inner: F, manager: TelemetryManager) -> Self {
        Self { inner, manager }
    }

    pub fn mode(&self) -> InvocationMode {
        InvocationMode::Async
    }

    pub fn manager(&self) -> &TelemetryManager {
        &self.manager
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    pub async fn call<Req, Fut, Resp, E>(&self, request: Req) -> Result<Resp, E>
    where
        F: Fn(Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
        Req: CallShape,
        Resp: ProviderResponse,
        E: fmt::Display,
    {
        if self.manager.is_noop() {
            return (self.inner)(request).await;
        }

        let snapshot = RequestSnapshot::capture(&request);
        let timestamp = Utc::now();
        let start = Instant::now();
        let result = (self.inner)(request).await;
        let record = extract(&snapshot, result.as_ref(), start.elapsed(), timestamp);
        self.manager.on_call(&record).await;

        result
    }

    /// Converts the wrapper into a plain clonable function.
    pub fn into_fn<Req, Fut, Resp, E>(
        self,
    ) -> impl Fn(Req) -> BoxFuture<'static, Result<Resp, E>> + Clone + Send + Sync
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Req: CallShape + Send + 'static,
        Resp: ProviderResponse + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let this = Arc::new(self);
        move |request: Req| -> BoxFuture<'static, Result<Resp, E>> {
            let this = Arc::clone(&this);
            Box::pin(async move { this.call(request).await })
        }
    }
}

/// Synchronous callable wrapped with telemetry.
///
/// Inside a tokio runtime the handlers run as a detached task so the caller
/// is not held up. Outside one they run to completion on a private
/// current-thread runtime created on first use.
pub struct BlockingInstrumented<F> {
    inner: F,
    manager: TelemetryManager,
    runtime: OnceLock<Option<Runtime>>,
}

impl<F> BlockingInstrumented<F> {
    pub fn new(inner: F, manager: TelemetryManager) -> Self {
        Self {
            inner,
            manager,
            runtime: OnceLock::new(),
        }
    }

    pub fn mode(&self) -> InvocationMode {
        InvocationMode::Blocking
    }

    pub fn manager(&self) -> &TelemetryManager {
        &self.manager
    }

    pub fn call<Req, Resp, E>(&self, request: Req) -> Result<Resp, E>
    where
        F: Fn(Req) -> Result<Resp, E>,
        Req: CallShape,
        Resp: ProviderResponse,
        E: fmt::Display,
    {
        if self.manager.is_noop() {
            return (self.inner)(request);
        }

        let snapshot = RequestSnapshot::capture(&request);
        let timestamp = Utc::now();
        let start = Instant::now();
        let result = (self.inner)(request);
        let record = extract(&snapshot, result.as_ref(), start.elapsed(), timestamp);
        self.emit(record);

        result
    }

    pub fn into_fn<Req, Resp, E>(self) -> impl Fn(Req) -> Result<Resp, E> + Clone + Send + Sync
    where
        F: Fn(Req) -> Result<Resp, E> + Send + Sync + 'static,
        Req: CallShape,
        Resp: ProviderResponse,
        E: fmt::Display,
    {
        let this = Arc::new(self);
        move |request: Req| this.call(request)
    }

    fn emit(&self, record: CallRecord) {
        if let Ok(handle) = Handle::try_current() {
            let manager = self.manager.clone();
            handle.spawn(async move {
                manager.on_call(&record).await;
            });
            return;
        }

        match self.runtime() {
            Some(runtime) => runtime.block_on(self.manager.on_call(&record)),
            None => tracing::warn!(
                call_id = %record.call_id,
                "telemetry runtime unavailable; dropping call record"
            ),
        }
    }

    fn runtime(&self) -> Option<&Runtime> {
        self.runtime
            .get_or_init(|| {
                match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => Some(runtime),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to build telemetry runtime");
                        None
                    }
                }
            })
            .as_ref()
    }
}

impl<F> Drop for BlockingInstrumented<F> {
    fn drop(&mut self) {
        // Dropping a runtime inside an async context panics.
        if let Some(Some(runtime)) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
