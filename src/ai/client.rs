use super::format::build_summary_prompt;
use super::{AiError, AiProvider, ModelOption, MAX_OUTPUT_TOKENS};
use crate::util::normalize_base_url;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;
const ANTHROPIC_VERSION: &str = "2023-06-01";
const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Hosted provider API roots. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub anthropic: String,
    pub gemini: String,
    pub perplexity: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            anthropic: "https://api.anthropic.com".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
            perplexity: "https://api.perplexity.ai".to_string(),
        }
    }
}

/// HTTP adapter for the summarization providers.
#[derive(Debug, Clone)]
pub struct AiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

// ---- response shapes (every field optional, providers vary) ----

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    error: Option<ErrorDetail>,
    message: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TextPart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AnthropicResponse {
    content: Vec<TextPart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiContent {
    parts: Vec<TextPart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OllamaResponse {
    response: Option<String>,
    message: Option<ChatMessage>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct NamedModel {
    id: Option<String>,
    name: Option<String>,
    model: Option<String>,
    display_name: Option<String>,
    #[serde(rename = "displayName")]
    display_name_camel: Option<String>,
    #[serde(rename = "supportedGenerationMethods")]
    supported_generation_methods: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelEntry {
    Id(String),
    Named(NamedModel),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ModelList {
    data: Option<Vec<ModelEntry>>,
    models: Option<Vec<ModelEntry>>,
    result: Option<Vec<ModelEntry>>,
}

impl ModelList {
    fn into_entries(self) -> Vec<ModelEntry> {
        self.data.or(self.models).or(self.result).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

fn join_texts(parts: Vec<TextPart>) -> String {
    parts
        .into_iter()
        .filter_map(|p| non_empty(p.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn anthropic_fallback_models() -> Vec<ModelOption> {
    vec![
        ModelOption::new("claude-3-5-sonnet-latest", "Claude 3.5 Sonnet"),
        ModelOption::new("claude-3-5-haiku-latest", "Claude 3.5 Haiku"),
        ModelOption::new("claude-3-opus-20240229", "Claude 3 Opus"),
    ]
}

fn perplexity_fallback_models() -> Vec<ModelOption> {
    vec![
        ModelOption::new("sonar", "Sonar"),
        ModelOption::new("sonar-pro", "Sonar Pro"),
        ModelOption::new("sonar-reasoning", "Sonar Reasoning"),
    ]
}

/// `{base}{path}` for a local server URL.
fn ollama_url(base: &str, path: &str) -> String {
    format!("{}{}", normalize_base_url(base), path)
}

/// `{base}/v1{path}`, without doubling `/v1` when the user already typed it.
fn lmstudio_url(base: &str, path: &str) -> String {
    let base = normalize_base_url(base);
    if base.ends_with("/v1") {
        format!("{base}{path}")
    } else {
        format!("{base}/v1{path}")
    }
}

/// A raw HTTP answer: status plus body text (possibly not JSON).
struct RawResponse {
    status: reqwest::StatusCode,
    body: String,
}

impl RawResponse {
    fn json<T: DeserializeOwned + Default>(&self) -> T {
        serde_json::from_str(&self.body).unwrap_or_default()
    }

    /// `Ok(())` for 2xx, otherwise the provider's message or the status text.
    fn ensure_success(&self) -> Result<(), AiError> {
        if self.status.is_success() {
            return Ok(());
        }
        let parsed: ErrorBody = self.json();
        let message = parsed
            .error
            .and_then(|e| non_empty(e.message))
            .or_else(|| non_empty(parsed.message))
            .unwrap_or_else(|| {
                self.status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        Err(AiError::Provider {
            status: self.status.as_u16(),
            message,
        })
    }
}

impl AiClient {
    pub fn new(timeout: Duration) -> Result<Self, AiError> {
        Self::with_endpoints(timeout, Endpoints::default())
    }

    pub fn with_endpoints(timeout: Duration, endpoints: Endpoints) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fluxread/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, endpoints })
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<RawResponse, AiError> {
        let response = request.send().await?;
        let status = response.status();

        if let Some(len) = response.content_length() {
            if len as usize > MAX_RESPONSE_SIZE {
                return Err(AiError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }
        }
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len().saturating_add(chunk.len()) > MAX_RESPONSE_SIZE {
                return Err(AiError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(RawResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Summarizes one article with the given provider.
    ///
    /// Returns the provider's raw text. Fails on non-2xx answers, transport
    /// errors, and answers that carry no text. Single attempt, no retry.
    pub async fn summarize(
        &self,
        provider: AiProvider,
        api_key: &str,
        model: &str,
        title: &str,
        content: &str,
    ) -> Result<String, AiError> {
        let prompt = build_summary_prompt(title, content);
        tracing::debug!(
            provider = %provider,
            model,
            prompt_chars = prompt.chars().count(),
            "Requesting AI summary"
        );

        let text = match provider {
            AiProvider::None => return Err(AiError::UnsupportedProvider),
            AiProvider::Anthropic => {
                let messages = [Message {
                    role: "user",
                    content: &prompt,
                }];
                let request = self
                    .http
                    .post(format!("{}/v1/messages", self.endpoints.anthropic))
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&json!({
                        "model": model,
                        "max_tokens": MAX_OUTPUT_TOKENS,
                        "messages": messages,
                    }));
                let raw = self.execute(request).await?;
                raw.ensure_success()?;
                join_texts(raw.json::<AnthropicResponse>().content)
            }
            AiProvider::Gemini => {
                let request = self
                    .http
                    .post(format!(
                        "{}/v1beta/models/{}:generateContent",
                        self.endpoints.gemini, model
                    ))
                    .query(&[("key", api_key)])
                    .json(&json!({
                        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                        "generationConfig": {"maxOutputTokens": MAX_OUTPUT_TOKENS},
                    }));
                let raw = self.execute(request).await?;
                raw.ensure_success()?;
                raw.json::<GeminiResponse>()
                    .candidates
                    .into_iter()
                    .next()
                    .map(|c| join_texts(c.content.parts))
                    .unwrap_or_default()
            }
            AiProvider::Perplexity => {
                let request = self
                    .http
                    .post(format!("{}/chat/completions", self.endpoints.perplexity))
                    .bearer_auth(api_key)
                    .json(&chat_body(model, &prompt));
                let raw = self.execute(request).await?;
                raw.ensure_success()?;
                first_choice(raw.json())
            }
            AiProvider::Ollama => {
                let request = self
                    .http
                    .post(ollama_url(api_key, "/api/generate"))
                    .json(&json!({"model": model, "prompt": prompt, "stream": false}));
                let raw = self.execute(request).await?;
                raw.ensure_success()?;
                let parsed: OllamaResponse = raw.json();
                non_empty(parsed.response)
                    .or_else(|| parsed.message.and_then(|m| non_empty(m.content)))
                    .unwrap_or_default()
            }
            AiProvider::Lmstudio => {
                let request = self
                    .http
                    .post(lmstudio_url(api_key, "/chat/completions"))
                    .json(&chat_body(model, &prompt));
                let raw = self.execute(request).await?;
                raw.ensure_success()?;
                first_choice(raw.json())
            }
        };

        if text.trim().is_empty() {
            tracing::warn!(provider = %provider, "AI provider returned no text");
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }

    /// Lists the models `provider` offers for `api_key`.
    ///
    /// A blank key yields an empty list without a request. Anthropic and
    /// Perplexity fall back to a built-in list when the listing is unavailable.
    pub async fn fetch_provider_models(
        &self,
        provider: AiProvider,
        api_key: &str,
    ) -> Result<Vec<ModelOption>, AiError> {
        if api_key.is_empty() {
            return Ok(Vec::new());
        }

        match provider {
            AiProvider::None => Ok(Vec::new()),
            AiProvider::Anthropic => {
                let request = self
                    .http
                    .get(format!("{}/v1/models", self.endpoints.anthropic))
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION);
                let raw = self.execute(request).await?;
                if !raw.status.is_success() {
                    return Ok(anthropic_fallback_models());
                }
                let models: Vec<ModelOption> = raw
                    .json::<ModelList>()
                    .models
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        ModelEntry::Named(m) => {
                            let id = non_empty(m.id)?;
                            let label = non_empty(m.display_name)
                                .or_else(|| non_empty(m.name))
                                .unwrap_or_else(|| id.clone());
                            Some(ModelOption { id, label })
                        }
                        ModelEntry::Id(_) => None,
                    })
                    .collect();
                Ok(if models.is_empty() {
                    anthropic_fallback_models()
                } else {
                    models
                })
            }
            AiProvider::Gemini => {
                let request = self
                    .http
                    .get(format!("{}/v1beta/models", self.endpoints.gemini))
                    .query(&[("key", api_key)]);
                let raw = self.execute(request).await?;
                raw.ensure_success()?;
                Ok(raw
                    .json::<ModelList>()
                    .models
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        ModelEntry::Named(m) => Some(m),
                        ModelEntry::Id(_) => None,
                    })
                    .filter(|m| {
                        m.supported_generation_methods
                            .iter()
                            .any(|method| method == "generateContent")
                    })
                    .filter_map(|m| {
                        let name = non_empty(m.name)?;
                        let id = name.strip_prefix("models/").unwrap_or(&name).to_string();
                        if id.is_empty() {
                            return None;
                        }
                        let label = m
                            .display_name_camel
                            .map(|l| l.trim().to_string())
                            .filter(|l| !l.is_empty())
                            .unwrap_or_else(|| id.clone());
                        Some(ModelOption { id, label })
                    })
                    .filter(|m| m.id.contains("gemini") && !m.id.contains("embedding"))
                    .collect())
            }
            AiProvider::Perplexity => {
                let request = self
                    .http
                    .get(format!("{}/models", self.endpoints.perplexity))
                    .header(reqwest::header::ACCEPT, "application/json")
                    .bearer_auth(api_key);
                let raw = match self.execute(request).await {
                    Ok(raw) if raw.status.is_success() => raw,
                    Ok(raw) => {
                        tracing::debug!(status = raw.status.as_u16(), "Perplexity model list unavailable");
                        return Ok(perplexity_fallback_models());
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Perplexity model list request failed");
                        return Ok(perplexity_fallback_models());
                    }
                };
                let models: Vec<ModelOption> = raw
                    .json::<ModelList>()
                    .into_entries()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        ModelEntry::Id(id) if !id.is_empty() => Some(ModelOption::new(id.clone(), id)),
                        ModelEntry::Id(_) => None,
                        ModelEntry::Named(m) => {
                            let id = non_empty(m.id).or_else(|| non_empty(m.name.clone()))?;
                            let label = non_empty(m.display_name)
                                .or_else(|| non_empty(m.name))
                                .unwrap_or_else(|| id.clone());
                            Some(ModelOption { id, label })
                        }
                    })
                    .collect();
                Ok(if models.is_empty() {
                    perplexity_fallback_models()
                } else {
                    models
                })
            }
            AiProvider::Ollama => {
                let raw = self
                    .execute(self.http.get(ollama_url(api_key, "/api/tags")))
                    .await?;
                raw.ensure_success()?;
                Ok(ids_only(raw.json::<ModelList>().models, |m| {
                    non_empty(m.name).or_else(|| non_empty(m.model))
                }))
            }
            AiProvider::Lmstudio => {
                let raw = self
                    .execute(self.http.get(lmstudio_url(api_key, "/models")))
                    .await?;
                raw.ensure_success()?;
                Ok(ids_only(raw.json::<ModelList>().data, |m| {
                    non_empty(m.id).or_else(|| non_empty(m.name))
                }))
            }
        }
    }
}

fn chat_body(model: &str, prompt: &str) -> serde_json::Value {
    let messages = [
        Message {
            role: "system",
            content: SYSTEM_PROMPT,
        },
        Message {
            role: "user",
            content: prompt,
        },
    ];
    json!({
        "model": model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "messages": messages,
    })
}

fn first_choice(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| non_empty(c.message.content))
        .unwrap_or_default()
}

/// Models whose label is their id, as local servers report them.
fn ids_only(
    entries: Option<Vec<ModelEntry>>,
    pick: impl Fn(NamedModel) -> Option<String>,
) -> Vec<ModelOption> {
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match entry {
            ModelEntry::Named(m) => pick(m),
            ModelEntry::Id(_) => None,
        })
        .map(|id| ModelOption::new(id.clone(), id))
        .collect()
}
