//! Embedding module - text vectorization
//!
//! Turns document chunks and questions into vectors for semantic search.
//! Three backends sit behind [`EmbeddingProvider`]:
//!
//! - Gemini `gemini-embedding-001` (rate limited, 768 dims)
//! - OpenAI `text-embedding-3-small` (requested at 768 dims)
//! - a local feature-hashing embedder that needs no key
//!
//! ## Usage
//! ```rust,ignore
//! let embedder = create_embedder()?;
//! let embedding = embedder.embed("pompe primaire").await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::http::{send_with_retry, RetryPolicy};
use crate::knowledge::EMBEDDING_DIMENSION;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// Embedding provider trait
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts (default: sequential calls)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Vector dimension
    fn dimension(&self) -> usize;

    /// Provider name
    fn name(&self) -> &str;
}

/// Dimension shared by every backend (matches the vector table schema)
pub const DEFAULT_DIMENSION: usize = EMBEDDING_DIMENSION as usize;

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// Gemini free tier: 60 RPM
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// Minimum spacing between calls
const MIN_DELAY_MS: u64 = 1000;

#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Sliding-window limiter with a minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// Vectors are requested at [`DEFAULT_DIMENSION`], the vector table width
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            retry: RetryPolicy::default(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
            ))),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    fn request(&self, text: &str) -> GeminiRequest {
        GeminiRequest {
            model: "models/gemini-embedding-001".to_string(),
            content: GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            },
            task_type: "RETRIEVAL_DOCUMENT".to_string(),
            output_dimensionality: Some(DEFAULT_DIMENSION),
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    model: String,
    content: GeminiContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    embedding: GeminiValues,
}

#[derive(Debug, Deserialize)]
struct GeminiValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; DEFAULT_DIMENSION]);
        }

        let request = self.request(text);
        let body = send_with_retry("Embedding", &self.retry, || {
            let client = &self.client;
            let limiter = self.rate_limiter.clone();
            let request = &request;
            async move {
                limiter.lock().await.acquire().await;
                client
                    .post(GEMINI_EMBED_URL)
                    .header("x-goog-api-key", &self.api_key)
                    .json(request)
                    .send()
                    .await
            }
        })
        .await?;

        let parsed: GeminiResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        Ok(parsed.embedding.values)
    }

    fn dimension(&self) -> usize {
        DEFAULT_DIMENSION
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

const OPENAI_EMBED_URL: &str = "https://api.openai.com/v1/embeddings";
const OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";

#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    client: reqwest::Client,
    url: String,
    dimension: usize,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            url: OPENAI_EMBED_URL.to_string(),
            dimension: DEFAULT_DIMENSION,
            retry: RetryPolicy::default(),
        })
    }

    /// Point at another OpenAI-compatible embeddings endpoint
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // The API rejects empty strings; keep their slots as zero vectors
        let non_empty: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.clone()))
            .collect();

        let mut results = vec![vec![0.0; self.dimension]; texts.len()];
        if non_empty.is_empty() {
            return Ok(results);
        }

        let inputs: Vec<String> = non_empty.iter().map(|(_, t)| t.clone()).collect();
        let request = OpenAiRequest {
            model: OPENAI_EMBED_MODEL,
            input: &inputs,
            dimensions: self.dimension,
        };

        let body = send_with_retry("Embedding", &self.retry, || {
            self.client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
        })
        .await?;

        let parsed: OpenAiResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        for datum in parsed.data {
            if let Some((slot, _)) = non_empty.get(datum.index) {
                results[*slot] = datum.embedding;
            }
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        OPENAI_EMBED_MODEL
    }
}

// ============================================================================
// Local Hashing Embedding
// ============================================================================

/// Deterministic bag-of-features embedding
///
/// Lower-cased word tokens plus their character trigrams are hashed into
/// signed buckets and L2-normalized. Texts sharing vocabulary land close
/// together, which is enough for offline demos and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Synchronous embedding used by the async trait impl
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            self.accumulate(&mut vector, &token, 1.0);

            let padded: Vec<char> = format!("#{}#", token).chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                self.accumulate(&mut vector, &gram, 0.5);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local-hashing"
    }
}

/// Lower-cased alphanumeric runs
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

// ============================================================================
// API Key Management
// ============================================================================

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.is_empty())
}

/// Gemini key: `GEMINI_API_KEY` > `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Result<String> {
    env_key("GEMINI_API_KEY")
        .or_else(|| env_key("GOOGLE_AI_API_KEY"))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
                 Get your API key at: https://aistudio.google.com/app/apikey"
            )
        })
}

/// Whether a Gemini key is configured
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Factory Function
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Gemini,
    OpenAi,
    Hashing,
}

impl EmbeddingBackend {
    pub fn label(self) -> &'static str {
        match self {
            EmbeddingBackend::Gemini => "gemini-embedding-001",
            EmbeddingBackend::OpenAi => OPENAI_EMBED_MODEL,
            EmbeddingBackend::Hashing => "local-hashing",
        }
    }
}

/// Backend choice
///
/// `REACTOR_CHAT_EMBEDDINGS=gemini|openai|hashing` forces one; otherwise
/// Gemini, then OpenAI, then the local embedder.
pub fn resolve_backend() -> EmbeddingBackend {
    select_backend(
        std::env::var("REACTOR_CHAT_EMBEDDINGS").ok().as_deref(),
        has_api_key(),
        env_key("OPENAI_API_KEY").is_some(),
    )
}

fn select_backend(forced: Option<&str>, gemini_key: bool, openai_key: bool) -> EmbeddingBackend {
    let forced = forced.map(|v| v.trim().to_lowercase()).unwrap_or_default();

    match forced.as_str() {
        "gemini" => return EmbeddingBackend::Gemini,
        "openai" => return EmbeddingBackend::OpenAi,
        "hashing" | "local" => return EmbeddingBackend::Hashing,
        "" => {}
        other => tracing::warn!("Unknown REACTOR_CHAT_EMBEDDINGS={:?}, auto-selecting", other),
    }

    if gemini_key {
        EmbeddingBackend::Gemini
    } else if openai_key {
        EmbeddingBackend::OpenAi
    } else {
        EmbeddingBackend::Hashing
    }
}

/// Create the configured embedding provider
pub fn create_embedder() -> Result<Arc<dyn EmbeddingProvider>> {
    let backend = resolve_backend();
    let embedder: Arc<dyn EmbeddingProvider> = match backend {
        EmbeddingBackend::Gemini => Arc::new(GeminiEmbedding::from_env()?),
        EmbeddingBackend::OpenAi => {
            let key = env_key("OPENAI_API_KEY")
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
            Arc::new(OpenAiEmbedding::new(key)?)
        }
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedding::new()),
    };

    tracing::info!(
        "Using {} embeddings (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================
