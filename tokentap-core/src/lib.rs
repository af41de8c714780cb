//! Core types for instrumenting LLM API calls.
//!
//! A callable is wrapped with [`Instrumented`] (async) or
//! [`BlockingInstrumented`] (sync). Each call is timed, its arguments and
//! outcome are normalized into a [`CallRecord`] by [`extract`], and the record
//! is handed to every registered [`TelemetryHandler`]. The wrapped call's
//! result is returned unchanged.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tokentap_core::{
//!     CallRecord, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Instrumented,
//!     TelemetryHandler, TelemetryManager,
//! };
//!
//! struct PrintHandler;
//!
//! #[async_trait::async_trait]
//! impl TelemetryHandler for PrintHandler {
//!     async fn on_call(&self, record: &CallRecord) {
//!         println!("{} took {:.1}ms", record.model, record.latency_ms);
//!     }
//! }
//!
//! async fn create(request: ChatCompletionRequest) -> Result<ChatCompletionResponse, String> {
//!     todo!("call the provider with {request:?}")
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = TelemetryManager::noop().with_handler(Arc::new(PrintHandler));
//!     let create = Instrumented::new(create, manager);
//!     let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("hi")]);
//!     let _ = create.call(request).await;
//! }
//! ```
pub mod callbacks;
mod error;
mod extract;
mod llm;
mod pricing;
mod record;

pub use callbacks::{
    BlockingInstrumented, InvocationMode, Instrumented, TelemetryHandler, TelemetryManager,
};
pub use error::PricingError;
pub use extract::{estimate_tokens, extract, CHARS_PER_TOKEN};
pub use llm::{
    CallShape, ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    CompletionChoice, CompletionRequest, CompletionResponse, ProviderResponse, ResponseMessage,
    Role, Usage,
};
pub use pricing::{CostEstimate, ModelPrice, PriceMatch, PriceTable};
pub use record::{
    CallRecord, CallStatus, EndpointKind, RequestPayload, RequestSnapshot, ResponsePayload,
    TokenSource, UNKNOWN_MODEL,
};
pub use serde_json::Value;
