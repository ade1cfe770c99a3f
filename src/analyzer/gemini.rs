// Gemini generateContent wire types and a minimal chat client over reqwest.
// The session keeps the full content history and replays it every turn.

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Sub-deadline for one model call; the iteration cap bounds the dialogue.
const CALL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reasoning parts are marked thought=true and excluded from output.
    #[serde(default, skip_serializing_if = "is_false")]
    pub thought: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_output_tokens: cfg.max_output_tokens,
        })
    }

    /// Points the client at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn chat(&self, tools: Vec<Tool>) -> ChatSession<'_> {
        ChatSession {
            client: self,
            tools,
            history: Vec::new(),
        }
    }
}

/// One dialogue: send() appends the user turn, calls the API with the whole
/// history, appends the model turn, and returns the response.
pub struct ChatSession<'a> {
    client: &'a GeminiClient,
    tools: Vec<Tool>,
    history: Vec<Content>,
}

impl ChatSession<'_> {
    pub async fn send(&mut self, parts: Vec<Part>) -> Result<GenerateContentResponse> {
        self.history.push(Content {
            role: "user".to_string(),
            parts,
        });

        let request = GenerateContentRequest {
            contents: &self.history,
            tools: if self.tools.is_empty() {
                None
            } else {
                Some(&self.tools)
            },
            generation_config: GenerationConfig {
                temperature: self.client.temperature,
                max_output_tokens: self.client.max_output_tokens,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.client.base_url, self.client.model
        );
        let resp = self
            .client
            .http
            .post(&url)
            .query(&[("key", self.client.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("model request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::BackendUnavailable(format!(
                "model returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let response: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| Error::Parse(format!("model response: {}", e)))?;

        if let Some(content) = response.candidates.first().and_then(|c| c.content.clone()) {
            self.history.push(content);
        }
        Ok(response)
    }
}
