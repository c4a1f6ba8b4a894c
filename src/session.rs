//! Chat session: transcript, chart files and the interaction log

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::agents::{SessionContext, Supervisor};
use crate::config::Settings;
use crate::ingest::{index_directory, seed_database, DEFAULT_SEED, DEFAULT_YEARS};
use crate::knowledge::{DocumentRetriever, RetrievedChunk};
use crate::llm::{create_chat_model, ChatModel};
use crate::viz::write_chart_html;

pub const NO_ANSWER: &str = "Pas de réponse générée.";

/// Starter questions offered by the REPL
pub const EXAMPLE_QUESTIONS: [&str; 6] = [
    "Combien de réacteurs sont opérationnels en France ?",
    "Quelle est la procédure de maintenance des pompes primaires ?",
    "Graphique des maintenances par type d'équipement",
    "Statistiques des incidents par niveau de sévérité",
    "Durée moyenne des maintenances correctives vs préventives",
    "Quels sont les critères de sûreté nucléaire (défense en profondeur) ?",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RetrievedChunk>,
}

impl ChatTurn {
    fn user(content: &str) -> Self {
        Self {
            role: TurnRole::User,
            content: content.to_string(),
            agent: None,
            chart_path: None,
            code: None,
            sources: Vec::new(),
        }
    }
}

/// One JSON Lines record per question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: String,
    pub session_id: String,
    pub question: String,
    pub agent_used: String,
    pub success: bool,
}

pub struct ChatSession {
    id: String,
    settings: Settings,
    supervisor: Supervisor,
    context: Arc<SessionContext>,
    transcript: Vec<ChatTurn>,
}

impl ChatSession {
    /// Open a session, seeding the database and the knowledge base when missing
    pub async fn open(settings: Settings) -> Result<Self> {
        settings.ensure_dirs()?;

        if !settings.db_path.exists() {
            tracing::info!("Creating operational database at {:?}", settings.db_path);
            seed_database(&settings.db_path, DEFAULT_YEARS, DEFAULT_SEED)?;
        }

        let retriever = DocumentRetriever::open(&settings)
            .await
            .context("Failed to open knowledge base")?;
        if retriever.vector_count().await? == 0 {
            tracing::info!("Knowledge base empty, indexing {:?}", settings.docs_dir);
            index_directory(&retriever, &settings.docs_dir, false).await?;
        }

        let context = Arc::new(SessionContext::new(&settings.db_path));
        if let Err(e) = context.load_operational_data() {
            tracing::warn!("Operational data unavailable: {:#}", e);
        }

        let llm = create_chat_model(settings.temperature)?;
        Self::with_parts(settings, llm, Arc::new(retriever), context)
    }

    pub fn with_parts(
        settings: Settings,
        llm: Arc<dyn ChatModel>,
        retriever: Arc<DocumentRetriever>,
        context: Arc<SessionContext>,
    ) -> Result<Self> {
        let supervisor = Supervisor::new(llm, retriever, context.clone(), settings.top_k)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            settings,
            supervisor,
            context,
            transcript: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Forget the conversation and the last query result
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.context.clear_last_query();
    }

    /// Run one question through the agents and record the turn
    pub async fn ask(&mut self, question: &str) -> Result<ChatTurn> {
        self.transcript.push(ChatTurn::user(question));

        let state = self.supervisor.run(question).await;
        let agent = state.next_agent.map(|a| a.to_string());

        let mut turn = ChatTurn {
            role: TurnRole::Assistant,
            content: if state.final_answer.is_empty() {
                NO_ANSWER.to_string()
            } else {
                state.final_answer.clone()
            },
            agent: agent.clone(),
            chart_path: None,
            code: None,
            sources: state
                .doc_results
                .as_ref()
                .map(|d| d.sources.clone())
                .unwrap_or_default(),
        };

        if let Some(chart) = state.viz_results.as_ref().and_then(|v| v.chart.as_ref()) {
            let path = self
                .settings
                .charts_dir
                .join(format!("{}.html", uuid::Uuid::new_v4()));
            match write_chart_html(chart, &path) {
                Ok(()) => turn.chart_path = Some(path),
                Err(e) => tracing::warn!("Failed to write chart: {:#}", e),
            }
            turn.code = Some(chart.code.clone());
        }

        let record = InteractionRecord {
            timestamp: Utc::now().to_rfc3339(),
            session_id: self.id.clone(),
            question: question.to_string(),
            agent_used: agent.unwrap_or_else(|| "Unknown".to_string()),
            success: !state.final_answer.is_empty(),
        };
        if let Err(e) = append_interaction(&self.settings.interaction_log, &record) {
            tracing::warn!("Failed to log interaction: {:#}", e);
        }

        self.transcript.push(turn.clone());
        Ok(turn)
    }
}

/// Append one record to a JSON Lines file
pub fn append_interaction(path: &Path, record: &InteractionRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open interaction log {:?}", path))?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Records from a JSON Lines file; malformed lines are skipped
pub fn read_interactions(path: &Path) -> Result<Vec<InteractionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read interaction log {:?}", path))?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
