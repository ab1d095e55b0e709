//! Context builder for assembling the system prompt and turn history

use codepilot_provider::{ChatResponse, Message, ToolResponse};

const SYSTEM_PROMPT: &str = r#"You are a helpful AI coding agent.

When a user asks a question or makes a request, make a function call plan. You can perform the following operations:

- List files and directories
- Read file contents
- Write or overwrite files
- Execute Python files with optional arguments

All paths you provide should be relative to the working directory. You do not need to specify the working directory in your function calls as it is automatically injected for security reasons."#;

/// Builds the system instruction and grows the per-invocation history
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the system instruction
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// History for a fresh invocation: the user prompt alone
    pub fn initial_history(&self, prompt: &str) -> Vec<Message> {
        vec![Message::user(prompt)]
    }

    /// Append a model reply that requested tool calls
    pub fn add_model_reply(history: &mut Vec<Message>, response: &ChatResponse) {
        history.push(Message::assistant_calls(
            response.content.clone(),
            response.tool_calls.clone(),
        ));
    }

    /// Append one message carrying every tool result of a turn, in call order
    pub fn add_tool_results(history: &mut Vec<Message>, results: Vec<ToolResponse>) {
        if !results.is_empty() {
            history.push(Message::tool_responses(results));
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
