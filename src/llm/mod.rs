//! LLM module - chat completion providers
//!
//! Every agent talks to the language model through the [`ChatModel`] trait.
//! The concrete client speaks the OpenAI-compatible `/chat/completions`
//! protocol, which both Groq and OpenAI expose.
//!
//! ## Usage
//! ```rust,ignore
//! let llm = create_chat_model(0.1)?;
//! let answer = llm.ask("Combien de réacteurs ?").await?;
//! ```

#[cfg(test)]
pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{send_with_retry, RetryPolicy};

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// ChatModel Trait
// ============================================================================

/// Chat model trait
///
/// Implementations return the assistant's text for a message list.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Single user prompt
    async fn ask(&self, prompt: &str) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)]).await
    }

    /// Model identifier
    fn name(&self) -> &str;
}

// ============================================================================
// Providers
// ============================================================================

/// Supported providers, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    OpenAi,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 2] = [LlmProvider::Groq, LlmProvider::OpenAi];

    pub fn api_key_var(self) -> &'static str {
        match self {
            LlmProvider::Groq => "GROQ_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            LlmProvider::Groq => "https://api.groq.com/openai/v1",
            LlmProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Groq => "llama-3.3-70b-versatile",
            LlmProvider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LlmProvider::Groq => "Groq",
            LlmProvider::OpenAi => "OpenAI",
        }
    }

    /// API key from the environment, if set and non-empty
    pub fn api_key(self) -> Option<String> {
        std::env::var(self.api_key_var())
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

// ============================================================================
// OpenAI-compatible client
// ============================================================================

#[derive(Debug)]
pub struct OpenAiCompatChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatChat {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Client for a known provider with its configured model
    pub fn for_provider(provider: LlmProvider, api_key: String, temperature: f32) -> Result<Self> {
        Self::new(provider.base_url(), chat_model_name(provider), api_key, temperature)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let body = send_with_retry("LLM", &self.retry, || {
            self.client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
        })
        .await?;

        let parsed: CompletionResponse =
            serde_json::from_str(&body).context("Failed to parse chat response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat response contained no content"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// Chat model: `REACTOR_CHAT_MODEL` when set, else the provider default
pub fn chat_model_name(provider: LlmProvider) -> String {
    model_or_default(provider, std::env::var("REACTOR_CHAT_MODEL").ok().as_deref())
}

fn model_or_default(provider: LlmProvider, configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| provider.default_model())
        .to_string()
}

fn chat_label(provider: LlmProvider, model: &str) -> String {
    format!("{} ({})", provider.label(), model)
}

/// First provider with a configured key (Groq > OpenAI)
pub fn resolve_provider() -> Option<(LlmProvider, String)> {
    LlmProvider::ALL
        .into_iter()
        .find_map(|p| p.api_key().map(|key| (p, key)))
}

/// Chat model for the first configured provider
pub fn create_chat_model(temperature: f32) -> Result<Arc<dyn ChatModel>> {
    let (provider, key) = resolve_provider().ok_or_else(|| {
        anyhow::anyhow!(
            "No LLM API key found. Set GROQ_API_KEY or OPENAI_API_KEY.\n\
             Get a free Groq key at: https://console.groq.com/keys"
        )
    })?;

    let chat = OpenAiCompatChat::for_provider(provider, key, temperature)?;
    tracing::info!("Using {} chat model: {}", provider.label(), chat.name());
    Ok(Arc::new(chat))
}

/// Which providers are configured
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub groq: bool,
    pub openai: bool,
    pub gemini: bool,
    pub active_chat: Option<String>,
    pub embedding: String,
}

pub fn provider_info() -> ProviderInfo {
    let active_chat = resolve_provider().map(|(p, _)| chat_label(p, &chat_model_name(p)));

    ProviderInfo {
        groq: LlmProvider::Groq.api_key().is_some(),
        openai: LlmProvider::OpenAi.api_key().is_some(),
        gemini: crate::embedding::has_api_key(),
        active_chat,
        embedding: crate::embedding::resolve_backend().label().to_string(),
    }
}

// ============================================================================
// Response Cleanup
// ============================================================================

/// Strip a surrounding markdown code fence (```sql, ```json, ...)
///
/// Text without a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut inner = trimmed.splitn(3, "```").nth(1).unwrap_or_default();
    // Drop the language tag on the opening line
    if let Some(first_newline) = inner.find('\n') {
        let tag = inner[..first_newline].trim();
        if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            inner = &inner[first_newline + 1..];
        }
    } else {
        for tag in ["sql", "json"] {
            if let Some(rest) = inner.strip_prefix(tag) {
                inner = rest;
                break;
            }
        }
    }

    inner.trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================
