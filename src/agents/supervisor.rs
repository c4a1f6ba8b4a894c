//! Supervisor: router plus the four agents wired into a state graph
//!
//! ```text
//! router ─┬─► DocAgent ──► SummaryAgent ─► END
//!         ├─► DataAgent ─► SummaryAgent ─► END
//!         ├─► VizAgent ───────────────────► END
//!         └─► SummaryAgent ───────────────► END
//! ```

use std::sync::Arc;

use super::context::SessionContext;
use super::data::DataAgent;
use super::doc::DocAgent;
use super::router::Router;
use super::state::{AgentKind, AgentState};
use super::summary::SummaryAgent;
use super::viz::VizAgent;
use crate::graph::{CompiledGraph, GraphError, StateGraph, END};
use crate::knowledge::DocumentRetriever;
use crate::llm::ChatModel;

const ROUTER: &str = "router";

pub struct Supervisor {
    graph: CompiledGraph<AgentState>,
}

impl Supervisor {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        retriever: Arc<DocumentRetriever>,
        context: Arc<SessionContext>,
        top_k: usize,
    ) -> Result<Self, GraphError> {
        let doc = AgentKind::DocAgent.as_str();
        let data = AgentKind::DataAgent.as_str();
        let viz = AgentKind::VizAgent.as_str();
        let summary = AgentKind::SummaryAgent.as_str();

        let graph = StateGraph::new()
            .add_node(ROUTER, Router::new(llm.clone()))
            .add_node(doc, DocAgent::new(llm.clone(), retriever, top_k))
            .add_node(data, DataAgent::new(llm.clone(), context.clone()))
            .add_node(viz, VizAgent::new(llm.clone(), context))
            .add_node(summary, SummaryAgent::new(llm))
            .set_entry_point(ROUTER)
            .add_conditional_edges(
                ROUTER,
                |state: &AgentState| {
                    state
                        .next_agent
                        .map(|agent| agent.as_str().to_string())
                        .unwrap_or_default()
                },
                &[(doc, doc), (data, data), (viz, viz), (summary, summary)],
            )
            .add_edge(doc, summary)
            .add_edge(data, summary)
            .add_edge(viz, END)
            .add_edge(summary, END)
            .compile()?;

        Ok(Self { graph })
    }

    /// Run one question; graph failures become a system error answer
    pub async fn run(&self, question: &str) -> AgentState {
        match self.graph.invoke(AgentState::new(question)).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Agent graph failed: {}", e);
                AgentState {
                    final_answer: format!("❌ Erreur système: {}", e),
                    error: Some(e.to_string()),
                    ..AgentState::new(question)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedding;
    use crate::knowledge::{default_chunker, KnowledgeStore, LanceVectorStore};
    use crate::llm::mock::ScriptedChat;
    use rusqlite::Connection;
    use tempfile::TempDir;

    async fn create_supervisor(dir: &TempDir, llm: Arc<ScriptedChat>) -> Supervisor {
        let db_path = dir.path().join("operational.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE reactors (name TEXT, status TEXT);
            INSERT INTO reactors VALUES ('Civaux-1', 'Operational');
            INSERT INTO reactors VALUES ('Fessenheim-1', 'Shutdown');
            "#,
        )
        .unwrap();

        let store = KnowledgeStore::open(&dir.path().join("knowledge.db")).unwrap();
        let vectors = Arc::new(
            LanceVectorStore::open(&dir.path().join("vectors.lance"))
                .await
                .unwrap(),
        );
        let retriever = DocumentRetriever::new(
            store,
            vectors,
            Arc::new(HashingEmbedding::new()),
            default_chunker(),
        )
        .await
        .unwrap();

        Supervisor::new(
            llm,
            Arc::new(retriever),
            Arc::new(SessionContext::new(&db_path)),
            5,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_data_question_flows_through_summary() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedChat::new([
            "DataAgent",
            "SELECT COUNT(*) AS n FROM reactors WHERE status = 'Operational'",
            "1 réacteur opérationnel.",
            "Il y a 1 réacteur opérationnel.",
        ]));
        let supervisor = create_supervisor(&dir, llm.clone()).await;

        let state = supervisor.run("Combien de réacteurs opérationnels ?").await;
        assert_eq!(state.next_agent, Some(AgentKind::DataAgent));
        assert!(state.final_answer.starts_with("Il y a 1 réacteur opérationnel."));
        assert!(state.final_answer.contains("📊 **Requête SQL utilisée:**"));
        assert_eq!(state.messages.len(), 3);
        assert!(state.messages[1].starts_with("[DataAgent] 1 réacteur opérationnel."));
        assert!(state.messages[2].starts_with("[SummaryAgent] "));
        assert_eq!(llm.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_viz_question_skips_summary() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(ScriptedChat::new(["VizAgent"]));
        let supervisor = create_supervisor(&dir, llm.clone()).await;

        let state = supervisor.run("Graphique des réacteurs").await;
        assert_eq!(state.next_agent, Some(AgentKind::VizAgent));
        assert!(state.final_answer.starts_with("❌ Aucune donnée disponible"));
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_system_error() {
        let dir = TempDir::new().unwrap();
        // routed to SummaryAgent, whose general answer then fails
        let llm = Arc::new(ScriptedChat::new(["SummaryAgent"]));
        let supervisor = create_supervisor(&dir, llm).await;

        let state = supervisor.run("Vue d'ensemble").await;
        assert!(state.final_answer.starts_with("❌ Erreur système:"));
        assert!(state.error.is_some());
    }
}
