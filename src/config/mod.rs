//! Runtime settings
//!
//! Paths and tunables resolved from the environment (and an optional `.env`).
//! Default location: ~/.reactor-chat/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default LLM sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default number of chunks retrieved per question
pub const DEFAULT_TOP_K: usize = 5;

// ============================================================================
// Data Directory
// ============================================================================

/// Data directory (~/.reactor-chat/)
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env_non_empty("REACTOR_CHAT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reactor-chat")
}

/// Load `.env` from the working directory if present
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to read .env: {}", e),
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Operational SQLite database (reactors, maintenances, ...)
    pub db_path: PathBuf,
    /// Source documents for the knowledge base
    pub docs_dir: PathBuf,
    /// LanceDB directory
    pub vector_dir: PathBuf,
    /// Document registry
    pub knowledge_db: PathBuf,
    /// JSON Lines interaction log
    pub interaction_log: PathBuf,
    pub charts_dir: PathBuf,
    pub temperature: f32,
    pub top_k: usize,
}

impl Settings {
    /// All paths derived from a single data directory
    pub fn with_data_dir(dir: &Path) -> Self {
        Self {
            data_dir: dir.to_path_buf(),
            db_path: dir.join("operational.db"),
            docs_dir: dir.join("docs"),
            vector_dir: dir.join("vectors.lance"),
            knowledge_db: dir.join("knowledge.db"),
            interaction_log: dir.join("interactions.jsonl"),
            charts_dir: dir.join("charts"),
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Resolve settings from environment variables
    ///
    /// - `REACTOR_CHAT_DATA_DIR`: data directory
    /// - `REACTOR_CHAT_DB`: operational database path
    /// - `REACTOR_CHAT_DOCS`: documents directory
    /// - `REACTOR_CHAT_TEMPERATURE`, `REACTOR_CHAT_TOP_K`
    pub fn from_env() -> Self {
        let mut settings = Self::with_data_dir(&get_data_dir());

        if let Some(db) = env_non_empty("REACTOR_CHAT_DB") {
            settings.db_path = PathBuf::from(db);
        }
        if let Some(docs) = env_non_empty("REACTOR_CHAT_DOCS") {
            settings.docs_dir = PathBuf::from(docs);
        }
        settings.temperature =
            parse_env_or("REACTOR_CHAT_TEMPERATURE", DEFAULT_TEMPERATURE);
        settings.top_k = parse_env_or("REACTOR_CHAT_TOP_K", DEFAULT_TOP_K);

        settings
    }

    /// Create data, docs and charts directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.docs_dir, &self.charts_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory {:?}", dir))?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    parse_or(key, env_non_empty(key), default)
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={:?}", key, raw);
                default
            }
        },
        None => default,
    }
}

// ============================================================================
// Tests
// ============================================================================
