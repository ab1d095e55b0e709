//! Agent loop - alternates model calls and tool dispatch under an iteration ceiling

use std::sync::Arc;
use tracing::{debug, info, warn};

use codepilot_config::Config;
use codepilot_provider::{ChatParams, Message, Provider, ToolCall, ToolChoice, ToolResponse, Usage};

use crate::context::ContextBuilder;
use crate::tools::ToolRegistry;

/// Per-invocation limits and sampling settings
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub max_iterations: u32,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Log the prompt, requested calls and token counts at `info`
    pub verbose: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default_model(),
            max_iterations: config.agent.max_iterations,
            max_tokens: config.agent.max_tokens,
            temperature: config.agent.temperature,
            verbose: false,
        }
    }
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// The model replied without requesting any call
    Completed,
    /// The ceiling was reached while the model still wanted calls
    IterationLimit,
}

/// Result of one invocation
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Text of the last model reply (possibly empty)
    pub text: String,
    pub status: LoopStatus,
    /// Number of model calls made
    pub iterations: u32,
    pub history: Vec<Message>,
    pub usage: Usage,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done,
}

/// Drives one prompt to completion against a provider and a fixed tool set
pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    tools: ToolRegistry,
    context: ContextBuilder,
    settings: LoopSettings,
}

impl<P: Provider> AgentLoop<P> {
    pub fn new(provider: P, tools: ToolRegistry, settings: LoopSettings) -> Self {
        Self::with_shared_provider(Arc::new(provider), tools, settings)
    }

    pub fn with_shared_provider(provider: Arc<P>, tools: ToolRegistry, settings: LoopSettings) -> Self {
        Self {
            provider,
            tools,
            context: ContextBuilder::new(),
            settings,
        }
    }

    /// Use a different system instruction
    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Run one invocation. Only a failed model call is an error; tool
    /// failures are fed back to the model as text.
    pub async fn run(&self, prompt: &str) -> crate::Result<LoopOutcome> {
        if self.settings.verbose {
            info!("User prompt: {}", prompt);
        }

        let mut history = self.context.initial_history(prompt);
        let mut iterations: u32 = 0;
        let mut usage = Usage::default();
        let mut text = String::new();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.settings.max_iterations {
                        warn!(
                            "Stopping after {} model calls without a final answer",
                            iterations
                        );
                        return Ok(LoopOutcome {
                            text,
                            status: LoopStatus::IterationLimit,
                            iterations,
                            history,
                            usage,
                        });
                    }
                    iterations += 1;
                    debug!("Agent iteration {}", iterations);

                    let params = ChatParams {
                        model: self.settings.model.clone(),
                        system: Some(self.context.system_prompt().to_string()),
                        messages: history.clone(),
                        tools: self.tools.definitions(),
                        max_tokens: self.settings.max_tokens,
                        temperature: self.settings.temperature,
                        tool_choice: ToolChoice::Auto,
                    };
                    let response = self.provider.chat(params).await?;

                    usage += response.usage;
                    if self.settings.verbose {
                        info!("Prompt tokens: {}", response.usage.prompt_tokens);
                        info!("Response tokens: {}", response.usage.completion_tokens);
                    }
                    text = response.content.clone().unwrap_or_default();

                    if response.has_tool_calls() {
                        ContextBuilder::add_model_reply(&mut history, &response);
                        LoopState::ExecutingTools(response.tool_calls)
                    } else {
                        LoopState::Done
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        if self.settings.verbose {
                            info!("Calling function: {}({})", call.name, call.arguments);
                        } else {
                            debug!("Calling function: {}", call.name);
                        }
                        let output = self.tools.dispatch(call).await;
                        results.push(ToolResponse::new(&call.id, &call.name, output));
                    }
                    ContextBuilder::add_tool_results(&mut history, results);
                    LoopState::AwaitingModel
                }
                LoopState::Done => {
                    info!("Completed after {} model calls", iterations);
                    return Ok(LoopOutcome {
                        text,
                        status: LoopStatus::Completed,
                        iterations,
                        history,
                        usage,
                    });
                }
            };
        }
    }
}
