//! OpenAI-style request and response shapes.
//!
//! The wrapper never talks to a provider itself; it only needs to read the
//! arguments and return values of the callable it instruments. [`CallShape`]
//! and [`ProviderResponse`] describe what it reads, so caller-defined types
//! can be instrumented as long as they implement them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
    Tool,
    Function,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Developer => "developer",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Function => "function",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Request body for the chat completions endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Request body for the legacy completions endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Token counters reported by the provider.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ResponseMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CompletionChoice {
    #[serde(default)]
    pub index: u32,
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Read access to the arguments of an intercepted call.
///
/// A request exposes a chat message array, a single prompt, or neither.
pub trait CallShape {
    fn model(&self) -> Option<&str>;

    fn messages(&self) -> Option<Vec<ChatMessage>> {
        None
    }

    fn prompt(&self) -> Option<String> {
        None
    }
}

/// Read access to the value returned by an intercepted call.
pub trait ProviderResponse {
    fn model(&self) -> Option<&str>;

    fn usage(&self) -> Option<Usage>;

    /// Text of the first choice.
    fn output_text(&self) -> Option<String>;

    fn role(&self) -> Option<String> {
        None
    }

    fn finish_reason(&self) -> Option<String> {
        None
    }
}

impl CallShape for ChatCompletionRequest {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    fn messages(&self) -> Option<Vec<ChatMessage>> {
        Some(self.messages.clone())
    }
}

impl CallShape for CompletionRequest {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    fn prompt(&self) -> Option<String> {
        Some(self.prompt.clone())
    }
}

impl CallShape for Value {
    fn model(&self) -> Option<&str> {
        self.get("model").and_then(Value::as_str)
    }

    fn messages(&self) -> Option<Vec<ChatMessage>> {
        let items = self.get("messages")?.as_array()?;
        Some(items.iter().map(message_from_value).collect())
    }

    fn prompt(&self) -> Option<String> {
        match self.get("prompt")? {
            Value::String(text) => Some(text.clone()),
            Value::Array(parts) => Some(
                parts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

impl ProviderResponse for ChatCompletionResponse {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    fn usage(&self) -> Option<Usage> {
        self.usage
    }

    fn output_text(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.clone())
    }

    fn role(&self) -> Option<String> {
        self.choices.first().map(|choice| choice.message.role.clone())
    }

    fn finish_reason(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.clone())
    }
}

impl ProviderResponse for CompletionResponse {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    fn usage(&self) -> Option<Usage> {
        self.usage
    }

    fn output_text(&self) -> Option<String> {
        self.choices.first().map(|choice| choice.text.clone())
    }

    fn finish_reason(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.clone())
    }
}

impl ProviderResponse for Value {
    fn model(&self) -> Option<&str> {
        self.get("model").and_then(Value::as_str)
    }

    fn usage(&self) -> Option<Usage> {
        self.get("usage")
            .and_then(|usage| serde_json::from_value(usage.clone()).ok())
    }

    fn output_text(&self) -> Option<String> {
        let choice = first_choice(self)?;
        if let Some(message) = choice.get("message") {
            return message.get("content").map(content_text);
        }
        choice.get("text").and_then(Value::as_str).map(str::to_string)
    }

    fn role(&self) -> Option<String> {
        first_choice(self)?
            .get("message")?
            .get("role")?
            .as_str()
            .map(str::to_string)
    }

    fn finish_reason(&self) -> Option<String> {
        first_choice(self)?
            .get("finish_reason")?
            .as_str()
            .map(str::to_string)
    }
}

fn first_choice(value: &Value) -> Option<&Value> {
    value.get("choices")?.as_array()?.first()
}

// Messages with a missing or unknown role are kept as user messages so their
// content still counts.
fn message_from_value(value: &Value) -> ChatMessage {
    let role = value
        .get("role")
        .and_then(|role| serde_json::from_value(role.clone()).ok())
        .unwrap_or_else(|| {
            tracing::debug!(
                role = ?value.get("role"),
                "unrecognised message role; treating as user"
            );
            Role::User
        });
    let content = value.get("content").map(content_text).unwrap_or_default();
    let name = value.get("name").and_then(Value::as_str).map(str::to_string);
    ChatMessage {
        role,
        content,
        name,
    }
}

// Content is either a plain string or an array of typed parts.
fn content_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
