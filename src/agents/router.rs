//! Question router: LLM choice with a keyword fallback

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::prompts;
use super::state::{AgentKind, AgentState, AgentUpdate};
use crate::graph::Node;
use crate::llm::ChatModel;

const VIZ_KEYWORDS: &[&str] = &["graphique", "courbe", "visualis", "plot", "chart", "diagramme"];
const DATA_KEYWORDS: &[&str] = &[
    "combien",
    "nombre",
    "total",
    "statistique",
    "moyenne",
    "tendance",
    "how many",
    "count",
    "average",
];
const SUMMARY_KEYWORDS: &[&str] = &[
    "synthèse",
    "résumé",
    "global",
    "récapitul",
    "summary",
    "overview",
];

/// Keyword routing used when the LLM is unreachable
pub fn keyword_route(question: &str) -> AgentKind {
    let lower = question.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if hit(VIZ_KEYWORDS) {
        AgentKind::VizAgent
    } else if hit(DATA_KEYWORDS) {
        AgentKind::DataAgent
    } else if hit(SUMMARY_KEYWORDS) {
        AgentKind::SummaryAgent
    } else {
        AgentKind::DocAgent
    }
}

pub struct Router {
    llm: Arc<dyn ChatModel>,
}

impl Router {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    pub async fn route(&self, question: &str) -> AgentKind {
        match self.llm.ask(&prompts::routing(question)).await {
            Ok(reply) => AgentKind::parse(reply.trim()).unwrap_or_else(|| {
                tracing::debug!("Unrecognized route {:?}, using DocAgent", reply.trim());
                AgentKind::DocAgent
            }),
            Err(e) => {
                tracing::warn!("Routing LLM failed, using keywords: {:#}", e);
                keyword_route(question)
            }
        }
    }
}

#[async_trait]
impl Node<AgentState> for Router {
    async fn run(&self, state: &AgentState) -> Result<AgentUpdate> {
        let agent = self.route(state.question()).await;
        tracing::info!("Routing to {}", agent);
        Ok(AgentUpdate::route(agent))
    }
}
