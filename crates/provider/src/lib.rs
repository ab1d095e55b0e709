//! Model service boundary
//!
//! Message, tool and response types shared by the agent loop and the
//! provider adapters, plus the `Provider` trait they implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use thiserror::Error;
use tracing::{debug, trace};

pub mod gemini;

pub use gemini::GeminiProvider;

/// Model service errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("no API key configured")]
    NoApiKey,

    #[error("invalid response from model service")]
    InvalidResponse,

    #[error("rate limited by model service")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_TOOL: &str = "tool";

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The result of one executed call, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub call_id: String,
    pub name: String,
    pub content: String,
}

impl ToolResponse {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Token accounting normalized across adapters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    pub fn calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls,
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }
}

/// One entry of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_responses: Option<Vec<ToolResponse>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_responses: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_responses: None,
        }
    }

    /// Assistant turn that requested calls; text is kept when present
    pub fn assistant_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: content.filter(|c| !c.is_empty()),
            tool_calls: Some(tool_calls),
            tool_responses: None,
        }
    }

    /// A single turn bundling every call result, in request order
    pub fn tool_responses(responses: Vec<ToolResponse>) -> Self {
        Self {
            role: ROLE_TOOL.to_string(),
            content: None,
            tool_calls: None,
            tool_responses: Some(responses),
        }
    }
}

/// Tool specification advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Request parameters for one model call
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tool_choice: ToolChoice,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            system: None,
            messages: Vec::new(),
            tools: Vec::new(),
            max_tokens: 4096,
            temperature: 0.7,
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// Tool selection mode
#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    Auto,
    Required(String),
    None,
}

/// A model service the agent loop can talk to
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse>;
    fn default_model(&self) -> String;
    fn is_configured(&self) -> bool;
}

/// Log a reply summary at trace/debug level
pub(crate) fn log_response(response: &ChatResponse) {
    debug!(
        "Model replied with {} call(s), finish_reason={}",
        response.tool_calls.len(),
        response.finish_reason
    );
    trace!("Reply text: {:?}", response.content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_error_display() {
        assert_eq!(ProviderError::NoApiKey.to_string(), "no API key configured");
        assert_eq!(
            ProviderError::Api("quota".to_string()).to_string(),
            "API error: quota"
        );
        assert_eq!(
            ProviderError::InvalidResponse.to_string(),
            "invalid response from model service"
        );
        assert_eq!(
            ProviderError::RateLimited.to_string(),
            "rate limited by model service"
        );
    }

    #[test]
    fn test_chat_response_text_builder() {
        let response = ChatResponse::text("Hello, world!");
        assert_eq!(response.content, Some("Hello, world!".to_string()));
        assert!(!response.has_tool_calls());
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage, Usage::default());
    }

    #[test]
    fn test_chat_response_calls_builder() {
        let response =
            ChatResponse::calls(None, vec![ToolCall::new("call_0", "get_files_info", json!({}))]);
        assert!(response.has_tool_calls());
        assert_eq!(response.finish_reason, "tool_calls");
    }

    #[test]
    fn test_usage_add_assign() {
        let mut total = Usage::default();
        total += Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        total += Usage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        };
        assert_eq!(total.prompt_tokens, 11);
        assert_eq!(total.completion_tokens, 7);
        assert_eq!(total.total_tokens, 18);
    }

    #[test]
    fn test_message_user() {
        let msg = Message::user("What's in this folder?");
        assert_eq!(msg.role, ROLE_USER);
        assert_eq!(msg.content.as_deref(), Some("What's in this folder?"));
        assert!(msg.tool_calls.is_none());
        assert!(msg.tool_responses.is_none());
    }

    #[test]
    fn test_message_assistant_calls_drops_empty_text() {
        let call = ToolCall::new("call_0", "get_files_info", json!({"directory": "."}));
        let msg = Message::assistant_calls(Some(String::new()), vec![call.clone()]);
        assert_eq!(msg.role, ROLE_ASSISTANT);
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls, Some(vec![call]));

        let msg = Message::assistant_calls(Some("Looking".to_string()), vec![]);
        assert_eq!(msg.content.as_deref(), Some("Looking"));
    }

    #[test]
    fn test_message_tool_responses_keeps_order() {
        let msg = Message::tool_responses(vec![
            ToolResponse::new("call_0", "get_files_info", "first"),
            ToolResponse::new("call_1", "get_file_content", "second"),
        ]);
        assert_eq!(msg.role, ROLE_TOOL);
        let responses = msg.tool_responses.unwrap();
        assert_eq!(responses[0].content, "first");
        assert_eq!(responses[1].name, "get_file_content");
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json_str = serde_json::to_string(&Message::user("Hello")).unwrap();
        assert!(json_str.contains("\"role\":\"user\""));
        assert!(json_str.contains("\"content\":\"Hello\""));
        assert!(!json_str.contains("tool_calls"));
        assert!(!json_str.contains("tool_responses"));
    }

    #[test]
    fn test_tool_new() {
        let params = json!({"type": "object", "properties": {}});
        let tool = Tool::new("write_file", "Write a file", params.clone());
        assert_eq!(tool.tool_type, "function");
        assert_eq!(tool.function.name, "write_file");
        assert_eq!(tool.function.description, "Write a file");
        assert_eq!(tool.function.parameters, params);
    }

    #[test]
    fn test_chat_params_default() {
        let params = ChatParams::default();
        assert_eq!(params.model, "");
        assert!(params.system.is_none());
        assert!(params.messages.is_empty());
        assert!(params.tools.is_empty());
        assert_eq!(params.max_tokens, 4096);
        assert_eq!(params.tool_choice, ToolChoice::Auto);
    }
}
