//! SummaryAgent: synthesis of the other agents' results

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::data::sql_block;
use super::prompts;
use super::state::{AgentKind, AgentState, AgentUpdate, DataResults, DocResults};
use crate::graph::Node;
use crate::llm::{ChatMessage, ChatModel};
use crate::operational::ColumnStatistics;

/// Sources listed under a synthesis
const SUMMARY_SOURCES: usize = 3;
/// Top values shown per categorical column
const TOP_VALUES: usize = 3;

/// Context block handed to the synthesis prompt
pub fn aggregate_results(doc: Option<&DocResults>, data: Option<&DataResults>) -> String {
    let mut parts = Vec::new();

    if let Some(doc) = doc.filter(|d| !d.answer.is_empty()) {
        parts.push(format!(
            "\n## Résultats documentaires (DocAgent)\n{}\n",
            doc.answer
        ));
    }

    match data {
        Some(data) if data.success => {
            let mut summary = format!(
                "\n## Résultats analytiques (DataAgent)\n- Nombre de lignes: {}\n- Colonnes: {}\n",
                data.row_count,
                data.columns.join(", ")
            );
            if !data.statistics.is_empty() {
                summary.push_str("\n**Statistiques:**\n");
                for (col, stats) in &data.statistics {
                    match stats {
                        ColumnStatistics::Numeric(s) => summary.push_str(&format!(
                            "- {}: moyenne={:.2}, écart-type={:.2}\n",
                            col, s.mean, s.std
                        )),
                        ColumnStatistics::Categorical(s) => {
                            let top = s
                                .top_values
                                .iter()
                                .take(TOP_VALUES)
                                .map(|(value, count)| format!("{} ({})", value, count))
                                .collect::<Vec<_>>()
                                .join(", ");
                            summary.push_str(&format!("- {}: {}\n", col, top));
                        }
                    }
                }
            }
            parts.push(summary);
        }
        Some(DataResults {
            error: Some(error), ..
        }) => {
            parts.push(format!(
                "\n## Résultats analytiques (DataAgent)\n⚠️ Erreur: {}\n",
                error
            ));
        }
        _ => {}
    }

    if parts.is_empty() {
        return "Aucun résultat disponible des autres agents.".to_string();
    }
    parts.join("\n")
}

/// Up to three sources with relevance `1 - score`
pub fn format_summary_sources(doc: &DocResults) -> String {
    let mut out = String::from("\n\n---\n📚 **Sources documentaires:**\n");
    for src in doc.sources.iter().take(SUMMARY_SOURCES) {
        out.push_str(&format!(
            "- {} (p.{}) - pertinence: {:.1}%\n",
            src.source,
            src.page,
            (1.0 - src.score) * 100.0
        ));
    }
    out
}

pub struct SummaryAgent {
    llm: Arc<dyn ChatModel>,
}

impl SummaryAgent {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    async fn synthesize(&self, prompt: String) -> Result<String> {
        let messages = [
            ChatMessage::system(prompts::SUMMARY_SYSTEM),
            ChatMessage::user(prompt),
        ];
        self.llm.complete(&messages).await
    }

    pub async fn summarize(&self, state: &AgentState) -> Result<String> {
        let question = state.original_question();
        let doc = state.doc_results.as_ref();
        let data = state.data_results.as_ref();

        let has_doc = doc.map(|d| !d.answer.is_empty()).unwrap_or(false);
        let has_data = data
            .map(|d| d.success || d.error.is_some())
            .unwrap_or(false);

        if !has_doc && !has_data {
            return self.synthesize(prompts::general_synthesis(question)).await;
        }

        let context = aggregate_results(doc, data);
        let mut answer = match self
            .synthesize(prompts::executive_summary(&context, question))
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Synthesis failed: {:#}", e);
                return Ok(format!("❌ Erreur lors de la synthèse: {}", e));
            }
        };

        if let Some(doc) = doc.filter(|d| !d.sources.is_empty()) {
            answer.push_str(&format_summary_sources(doc));
        }
        if let Some(sql) = data.and_then(|d| d.sql.as_deref()) {
            answer.push_str(&format!(
                "\n\n📊 **Requête SQL utilisée:**\n{}",
                sql_block(sql)
            ));
        }
        Ok(answer)
    }
}

#[async_trait]
impl Node<AgentState> for SummaryAgent {
    async fn run(&self, state: &AgentState) -> Result<AgentUpdate> {
        let answer = self.summarize(state).await?;
        Ok(AgentUpdate::answer(AgentKind::SummaryAgent, answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::RetrievedChunk;
    use crate::llm::mock::ScriptedChat;
    use crate::operational::NumericStats;

    fn doc_results() -> DocResults {
        DocResults {
            answer: "La procédure impose un contrôle vibratoire.".to_string(),
            sources: (0..4)
                .map(|i| RetrievedChunk {
                    content: String::new(),
                    source: format!("DOC-{}.txt", i),
                    page: 1,
                    doc_type: "procedure".to_string(),
                    score: 0.25,
                    is_error: false,
                })
                .collect(),
            query: "procédure ?".to_string(),
        }
    }

    fn data_results() -> DataResults {
        DataResults {
            success: true,
            sql: Some("SELECT COUNT(*) AS n FROM reactors".to_string()),
            row_count: 1,
            columns: vec!["n".to_string()],
            statistics: vec![(
                "n".to_string(),
                ColumnStatistics::Numeric(NumericStats {
                    count: 1,
                    mean: 56.0,
                    ..Default::default()
                }),
            )],
            ..Default::default()
        }
    }

    #[test]
    fn test_aggregate_results() {
        assert_eq!(
            aggregate_results(None, None),
            "Aucun résultat disponible des autres agents."
        );

        let context = aggregate_results(Some(&doc_results()), Some(&data_results()));
        assert!(context.contains("## Résultats documentaires (DocAgent)\nLa procédure"));
        assert!(context.contains("- Nombre de lignes: 1\n- Colonnes: n\n"));
        assert!(context.contains("- n: moyenne=56.00, écart-type=0.00\n"));

        let failed = DataResults::failed("no such table: x", None);
        assert!(aggregate_results(None, Some(&failed)).contains("⚠️ Erreur: no such table: x"));
    }

    #[tokio::test]
    async fn test_general_answer_without_results() {
        let llm = Arc::new(ScriptedChat::new(["Vue d'ensemble du parc."]));
        let agent = SummaryAgent::new(llm.clone());

        let update = agent.run(&AgentState::new("Fais une synthèse")).await.unwrap();
        assert_eq!(update.final_answer.as_deref(), Some("Vue d'ensemble du parc."));
        assert!(llm.prompt(0).contains("Question: Fais une synthèse"));
        assert!(llm.prompt(0).contains("analyse multi-facettes"));
    }

    #[tokio::test]
    async fn test_executive_summary_appends_sources_and_sql() {
        let llm = Arc::new(ScriptedChat::new(["Il y a 56 réacteurs."]));
        let agent = SummaryAgent::new(llm.clone());

        let mut state = AgentState::new("Combien de réacteurs ?");
        state.messages.push("[DataAgent] 56".to_string());
        state.doc_results = Some(doc_results());
        state.data_results = Some(data_results());

        let answer = agent.summarize(&state).await.unwrap();
        assert!(answer.starts_with("Il y a 56 réacteurs."));
        assert!(answer.contains("- DOC-0.txt (p.1) - pertinence: 75.0%\n"));
        assert!(answer.contains("DOC-2.txt"));
        assert!(!answer.contains("DOC-3.txt"));
        assert!(answer.ends_with("```sql\nSELECT COUNT(*) AS n FROM reactors\n```"));

        // the original question, not the last agent message
        assert!(llm.prompt(0).contains("QUESTION ORIGINALE: Combien de réacteurs ?"));
    }

    #[tokio::test]
    async fn test_synthesis_failure() {
        let agent = SummaryAgent::new(Arc::new(ScriptedChat::failing()));
        let mut state = AgentState::new("q");
        state.data_results = Some(data_results());

        let answer = agent.summarize(&state).await.unwrap();
        assert!(answer.starts_with("❌ Erreur lors de la synthèse:"));

        // no prior results: the failure propagates
        assert!(agent.summarize(&AgentState::new("q")).await.is_err());
    }
}
