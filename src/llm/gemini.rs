//! Gemini API client
//!
//! Implements `ChatModel` over the `generateContent` endpoint, including
//! function calling. Uses a long-lived reqwest::Client for connection pooling.

use crate::config::ModelConfig;
use crate::error::OrchestrationError;
use crate::llm::{ChatModel, FunctionDeclaration, Message, ModelTurn, Role, ToolCall};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation: GenerationConfig,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model_name.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            generation: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[FunctionDeclaration],
    ) -> GeminiRequest {
        let (system_instruction, contents) = convert_messages(messages);

        let tools = if tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: tools.to_vec(),
            }])
        };

        GeminiRequest {
            contents,
            generation_config: self.generation.clone(),
            system_instruction,
            tools,
        }
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[FunctionDeclaration],
    ) -> Result<ModelTurn> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = self.build_request(messages, tools);

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                if e.is_timeout() {
                    OrchestrationError::Timeout(self.timeout.as_secs())
                } else {
                    OrchestrationError::LlmError(format!("Gemini API error: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);

            let message = serde_json::from_str::<GeminiError>(&error_text)
                .map(|e| format!("{} {}", e.error.code, e.error.message))
                .unwrap_or(error_text);

            return Err(OrchestrationError::LlmError(format!(
                "Gemini API error ({}): {}",
                status, message
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            OrchestrationError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        convert_response(gemini_response)
    }
}

/// Split system messages off into the system instruction and map the rest
/// onto Gemini contents. Consecutive tool results share one content block.
fn convert_messages(messages: &[Message]) -> (Option<Content>, Vec<Content>) {
    let system_parts: Vec<Part> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| Part::text(&m.content))
        .collect();

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(Content {
            role: None,
            parts: system_parts,
        })
    };

    let mut contents: Vec<Content> = Vec::new();

    for message in messages {
        match message.role {
            Role::System => continue,
            Role::User => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(&message.content)],
            }),
            Role::Model => {
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(Part::text(&message.content));
                }
                for call in &message.tool_calls {
                    parts.push(Part {
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        }),
                        ..Default::default()
                    });
                }
                contents.push(Content {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            Role::Tool => {
                let part = Part {
                    function_response: Some(FunctionResponse {
                        name: message.tool_name.clone().unwrap_or_default(),
                        response: json!({ "content": message.content }),
                    }),
                    ..Default::default()
                };

                match contents.last_mut() {
                    Some(last) if last.role.as_deref() == Some("function") => {
                        last.parts.push(part)
                    }
                    _ => contents.push(Content {
                        role: Some("function".to_string()),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    (system_instruction, contents)
}

fn convert_response(response: GeminiResponse) -> Result<ModelTurn> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        OrchestrationError::LlmError("No response from Gemini API".to_string())
    })?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            if !text.is_empty() {
                texts.push(text);
            }
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                name: call.name,
                arguments: call.args,
            });
        }
    }

    if texts.is_empty() && tool_calls.is_empty() {
        return Err(OrchestrationError::LlmError(format!(
            "Empty response from Gemini (finish_reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(ModelTurn {
        text: if texts.is_empty() {
            None
        } else {
            Some(texts.join(""))
        },
        tool_calls,
        finish_reason: candidate.finish_reason,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetails {
    code: u16,
    message: String,
}
