use std::sync::Arc;

use async_trait::async_trait;

use crate::CallRecord;

mod wrappers;

pub use wrappers::{BlockingInstrumented, Instrumented};

/// How a wrapped callable is invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationMode {
    /// The callable returns a future that is awaited.
    Async,
    /// The callable returns its result directly.
    Blocking,
}

/// Receives one [`CallRecord`] per completed call.
///
/// Handlers run after the wrapped call has finished and before its result is
/// handed back, so they must contain their own failures.
#[async_trait]
pub trait TelemetryHandler: Send + Sync {
    async fn on_call(&self, record: &CallRecord);
}

#[derive(Clone, Default)]
pub struct TelemetryManager {
    handlers: Vec<Arc<dyn TelemetryHandler>>,
}

impl std::fmt::Debug for TelemetryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryManager")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl TelemetryManager {
    pub fn new(handlers: Vec<Arc<dyn TelemetryHandler>>) -> Self {
        Self { handlers }
    }

    pub fn noop() -> Self {
        Self { handlers: vec![] }
    }

    pub fn with_handler(mut self, handler: Arc<dyn TelemetryHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn is_noop(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn on_call(&self, record: &CallRecord) {
        for handler in &self.handlers {
            handler.on_call(record).await;
        }
    }
}
