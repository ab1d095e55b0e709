//! Google Gemini `generateContent` adapter

use crate::*;
use reqwest::Client;
use serde_json::json;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Gemini REST client
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_base = api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base,
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// `models/<name>` path segment; accepts names with or without the prefix
    fn model_path(model: &str) -> String {
        if model.starts_with("models/") || model.starts_with("tunedModels/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = params
            .messages
            .iter()
            .filter_map(Self::to_content)
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": params.max_tokens,
                "temperature": params.temperature,
            },
        });

        if let Some(system) = params.system.as_deref().filter(|s| !s.is_empty()) {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        if !params.tools.is_empty() {
            let declarations: Vec<serde_json::Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": &t.function.name,
                        "description": &t.function.description,
                        "parameters": gemini_schema(&t.function.parameters),
                    })
                })
                .collect();

            body["tools"] = json!([{ "functionDeclarations": declarations }]);
            body["toolConfig"] = json!({
                "functionCallingConfig": match &params.tool_choice {
                    ToolChoice::Auto => json!({ "mode": "AUTO" }),
                    ToolChoice::Required(name) => {
                        json!({ "mode": "ANY", "allowedFunctionNames": [name] })
                    }
                    ToolChoice::None => json!({ "mode": "NONE" }),
                }
            });
        }

        body
    }

    /// Map one history entry onto a Gemini `Content`; empty entries are dropped
    fn to_content(message: &Message) -> Option<serde_json::Value> {
        let mut parts = Vec::new();

        if let Some(text) = message.content.as_deref().filter(|t| !t.is_empty()) {
            parts.push(json!({ "text": text }));
        }
        for call in message.tool_calls.iter().flatten() {
            parts.push(json!({
                "functionCall": { "name": &call.name, "args": &call.arguments }
            }));
        }
        for response in message.tool_responses.iter().flatten() {
            parts.push(json!({
                "functionResponse": {
                    "name": &response.name,
                    "response": { "result": &response.content },
                }
            }));
        }

        if parts.is_empty() {
            return None;
        }

        let role = if message.role == ROLE_ASSISTANT {
            "model"
        } else {
            "user"
        };
        Some(json!({ "role": role, "parts": parts }))
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let candidate = match json["candidates"].get(0) {
            Some(candidate) => candidate,
            None => {
                if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
                    return Err(ProviderError::Api(format!("prompt blocked: {}", reason)));
                }
                return Err(ProviderError::InvalidResponse);
            }
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if part["thought"].as_bool().unwrap_or(false) {
                    continue;
                }
                if let Some(t) = part["text"].as_str() {
                    text.push_str(t);
                }
                if let Some(call) = part.get("functionCall") {
                    let arguments = match &call["args"] {
                        serde_json::Value::Null => json!({}),
                        args => args.clone(),
                    };
                    tool_calls.push(ToolCall {
                        id: format!("call_{}", tool_calls.len()),
                        name: call["name"].as_str().unwrap_or("").to_string(),
                        arguments,
                    });
                }
            }
        }

        let finish_reason = candidate["finishReason"]
            .as_str()
            .unwrap_or("STOP")
            .to_string();

        let usage = match json["usageMetadata"].as_object() {
            Some(meta) => {
                let count = |key: &str| meta.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                Usage {
                    prompt_tokens: count("promptTokenCount"),
                    completion_tokens: count("candidatesTokenCount"),
                    total_tokens: count("totalTokenCount"),
                }
            }
            None => Usage::default(),
        };

        Ok(ChatResponse {
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls,
            finish_reason,
            usage,
        })
    }

    /// Turn a non-success HTTP reply into an error
    fn error_for_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if status.as_u16() == 429 {
            return ProviderError::RateLimited;
        }
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body.trim()));
        ProviderError::Api(message)
    }

    /// Names of the models visible to this API key
    pub async fn list_models(&self) -> Result<Vec<String>> {
        if !self.is_configured() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/models", self.api_base);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(Self::error_for_status(status, &body));
            }

            let json: serde_json::Value = serde_json::from_str(&body)?;
            if let Some(models) = json["models"].as_array() {
                names.extend(
                    models
                        .iter()
                        .filter_map(|m| m["name"].as_str())
                        .map(|s| s.to_string()),
                );
            }

            match json["nextPageToken"].as_str().filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(names)
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if !self.is_configured() {
            return Err(ProviderError::NoApiKey);
        }

        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };
        let url = format!(
            "{}/{}:generateContent",
            self.api_base,
            Self::model_path(&model)
        );
        trace!("POST {}", url);

        let body = self.build_request(&params);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Self::error_for_status(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let response = self.parse_response(json)?;
        log_response(&response);
        Ok(response)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Gemini expects OpenAPI-style upper-case `type` values
pub fn gemini_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => {
            let converted = map
                .iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("type", serde_json::Value::String(t)) => json!(t.to_uppercase()),
                        ("properties", serde_json::Value::Object(props)) => {
                            serde_json::Value::Object(
                                props
                                    .iter()
                                    .map(|(name, prop)| (name.clone(), gemini_schema(prop)))
                                    .collect(),
                            )
                        }
                        ("items", items) => gemini_schema(items),
                        (_, other) => other.clone(),
                    };
                    (key.clone(), value)
                })
                .collect();
            serde_json::Value::Object(converted)
        }
        other => other.clone(),
    }
}
