//! VizAgent: chart configuration by LLM, rendering by `viz`

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::context::SessionContext;
use super::prompts;
use super::state::{AgentKind, AgentState, AgentUpdate, VizConfig, VizResults};
use crate::graph::Node;
use crate::llm::{strip_code_fence, ChatMessage, ChatModel};
use crate::operational::{format_cell, QueryTable};
use crate::viz::{generate_chart, ChartConfig, ChartType};

pub const NO_DATA_ANSWER: &str = "❌ Aucune donnée disponible pour créer une visualisation. Veuillez d'abord interroger les données.";
const NO_DATA_ERROR: &str = "Aucune donnée disponible pour la visualisation. Exécutez d'abord une requête de données.";
const DEFAULT_TITLE: &str = "Visualisation des données";
const SAMPLE_ROWS: usize = 3;

/// LLM reply; every field may be missing
#[derive(Debug, Deserialize)]
struct Proposal {
    chart_type: Option<String>,
    x_col: Option<String>,
    y_col: Option<String>,
    color: Option<String>,
    title: Option<String>,
    reasoning: Option<String>,
}

/// Bar chart of the first two columns
pub fn default_config(table: &QueryTable) -> VizConfig {
    let first = table.columns.first().cloned().unwrap_or_default();
    let second = table.columns.get(1).cloned().unwrap_or_else(|| first.clone());
    VizConfig {
        chart_type: "bar".to_string(),
        x_col: first,
        y_col: second,
        color: None,
        title: DEFAULT_TITLE.to_string(),
        reasoning: "Configuration par défaut".to_string(),
    }
}

/// Parse the LLM's JSON proposal, falling back to `default_config`
pub fn parse_config(reply: &str, table: &QueryTable) -> VizConfig {
    let proposal: Proposal = match serde_json::from_str(&strip_code_fence(reply)) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Unparsable chart config ({}), using default", e);
            return default_config(table);
        }
    };

    let first = table.columns.first().cloned().unwrap_or_default();
    let last = table.columns.last().cloned().unwrap_or_default();
    VizConfig {
        chart_type: proposal.chart_type.unwrap_or_else(|| "bar".to_string()),
        x_col: proposal.x_col.unwrap_or(first),
        y_col: proposal.y_col.unwrap_or(last),
        color: proposal.color.filter(|c| !c.is_empty() && c != "null"),
        title: proposal.title.unwrap_or_else(|| "Visualisation".to_string()),
        reasoning: proposal.reasoning.unwrap_or_default(),
    }
}

/// `- col: type (n valeurs uniques)` lines for the prompt
pub fn describe_columns(table: &QueryTable) -> String {
    table
        .columns
        .iter()
        .map(|col| {
            let kind = if table.is_numeric_column(col) {
                "numérique"
            } else {
                "texte"
            };
            let unique: HashSet<String> = table
                .column_values(col)
                .unwrap_or_default()
                .into_iter()
                .filter(|v| !v.is_null())
                .map(format_cell)
                .collect();
            format!("- {}: {} ({} valeurs uniques)", col, kind, unique.len())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct VizAgent {
    llm: Arc<dyn ChatModel>,
    context: Arc<SessionContext>,
}

impl VizAgent {
    pub fn new(llm: Arc<dyn ChatModel>, context: Arc<SessionContext>) -> Self {
        Self { llm, context }
    }

    async fn propose(&self, table: &QueryTable, question: &str) -> Result<VizConfig> {
        let prompt = prompts::viz_config(
            &describe_columns(table),
            &table.head(SAMPLE_ROWS).to_markdown(),
            question,
        );
        let messages = [
            ChatMessage::system(prompts::VIZ_SYSTEM),
            ChatMessage::user(prompt),
        ];
        let reply = self.llm.complete(&messages).await?;
        Ok(parse_config(&reply, table))
    }

    pub async fn visualize(&self, question: &str) -> AgentUpdate {
        let table = match self.context.available_table() {
            Some(table) if !table.is_empty() => table,
            _ => {
                return AgentUpdate {
                    messages: vec!["[VizAgent] ❌ Aucune donnée disponible".to_string()],
                    viz_results: Some(VizResults {
                        error: Some(NO_DATA_ERROR.to_string()),
                        ..Default::default()
                    }),
                    final_answer: Some(NO_DATA_ANSWER.to_string()),
                    ..Default::default()
                };
            }
        };

        let config = match self.propose(&table, question).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("VizAgent failed: {:#}", e);
                return AgentUpdate {
                    messages: vec![format!("[VizAgent] ❌ Erreur: {}", e)],
                    viz_results: Some(VizResults {
                        error: Some(e.to_string()),
                        ..Default::default()
                    }),
                    final_answer: Some(format!(
                        "❌ Erreur lors de la création du graphique: {}",
                        e
                    )),
                    ..Default::default()
                };
            }
        };

        let chart_type = ChartType::parse(&config.chart_type);
        let mut chart_config = ChartConfig::new(chart_type, &config.x_col, &config.y_col, &config.title);
        chart_config.color = config.color.clone();

        match generate_chart(&table, &chart_config) {
            Ok(chart) => {
                tracing::info!("Generated {} chart with {} points", chart_type, chart.data_points);
                let answer = format!(
                    "📊 **Graphique généré avec succès !**\n\n**Type:** {}\n**Raison:** {}\n\nLe graphique est affiché ci-dessous.",
                    chart_type.label(),
                    config.reasoning
                );
                let mut update = AgentUpdate::answer(AgentKind::VizAgent, answer);
                update.viz_results = Some(VizResults {
                    success: true,
                    chart: Some(chart),
                    config: Some(config),
                    error: None,
                });
                update
            }
            Err(e) => {
                let mut update = AgentUpdate::answer(AgentKind::VizAgent, format!("❌ {}", e));
                update.viz_results = Some(VizResults {
                    success: false,
                    chart: None,
                    config: Some(config),
                    error: Some(e.to_string()),
                });
                update
            }
        }
    }
}

#[async_trait]
impl Node<AgentState> for VizAgent {
    async fn run(&self, state: &AgentState) -> Result<AgentUpdate> {
        Ok(self.visualize(state.question()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedChat;
    use serde_json::json;
    use std::path::Path;

    fn maintenances() -> QueryTable {
        QueryTable::new(
            vec![
                "equipment".to_string(),
                "duration_hours".to_string(),
                "status".to_string(),
            ],
            vec![
                vec![json!("Pompe primaire"), json!(12), json!("Completed")],
                vec![json!("Turbine"), json!(30), json!("Completed")],
                vec![json!("Pompe primaire"), json!(8), json!("Planned")],
            ],
        )
    }

    fn agent_with(replies: Vec<&str>, table: Option<QueryTable>) -> VizAgent {
        let context = Arc::new(SessionContext::new(Path::new("unused.db")));
        if let Some(table) = table {
            context.set_operational_data(table).unwrap();
        }
        VizAgent::new(Arc::new(ScriptedChat::new(replies)), context)
    }

    #[test]
    fn test_parse_config() {
        let table = maintenances();
        let reply = "```json\n{\"chart_type\": \"pie\", \"x_col\": \"equipment\", \"y_col\": \"duration\", \"color\": null, \"title\": \"Durées\", \"reasoning\": \"Répartition\"}\n```";
        let config = parse_config(reply, &table);
        assert_eq!(config.chart_type, "pie");
        assert_eq!(config.y_col, "duration");
        assert_eq!(config.color, None);
        assert_eq!(config.reasoning, "Répartition");

        // missing fields: first column, last column
        let config = parse_config("{\"chart_type\": \"line\"}", &table);
        assert_eq!(config.x_col, "equipment");
        assert_eq!(config.y_col, "status");
        assert_eq!(config.title, "Visualisation");

        assert_eq!(parse_config("pas du JSON", &table), default_config(&table));
        assert_eq!(default_config(&table).y_col, "duration_hours");
    }

    #[test]
    fn test_describe_columns() {
        let described = describe_columns(&maintenances());
        assert_eq!(
            described,
            "- equipment: texte (2 valeurs uniques)\n- duration_hours: numérique (3 valeurs uniques)\n- status: texte (2 valeurs uniques)"
        );
    }

    #[tokio::test]
    async fn test_no_data() {
        let agent = agent_with(vec![], None);
        let update = agent.visualize("Graphique ?").await;
        assert_eq!(update.final_answer.as_deref(), Some(NO_DATA_ANSWER));
        assert_eq!(update.messages, vec!["[VizAgent] ❌ Aucune donnée disponible"]);
        assert!(!update.viz_results.unwrap().success);
    }

    #[tokio::test]
    async fn test_chart_with_fuzzy_column() {
        let agent = agent_with(
            vec!["{\"chart_type\": \"bar\", \"x_col\": \"equipment\", \"y_col\": \"duration\", \"title\": \"Durées par équipement\", \"reasoning\": \"Comparaison entre catégories\"}"],
            Some(maintenances()),
        );

        let update = agent.visualize("Graphique des durées par équipement").await;
        let answer = update.final_answer.unwrap();
        assert!(answer.contains("**Type:** Bar"));
        assert!(answer.contains("**Raison:** Comparaison entre catégories"));

        let results = update.viz_results.unwrap();
        assert!(results.success);
        let chart = results.chart.unwrap();
        assert_eq!(chart.y, "duration_hours");
        assert_eq!(chart.title, "Durées par équipement");
    }

    #[tokio::test]
    async fn test_unknown_column_is_reported() {
        let agent = agent_with(
            vec!["{\"chart_type\": \"scatter\", \"x_col\": \"temperature\", \"y_col\": \"duration_hours\"}"],
            Some(maintenances()),
        );

        let update = agent.visualize("Nuage de points").await;
        let answer = update.final_answer.unwrap();
        assert!(answer.starts_with("❌ Colonne X 'temperature' non trouvée."));
        assert!(!update.viz_results.unwrap().success);
    }

    #[tokio::test]
    async fn test_llm_failure() {
        let agent = agent_with(vec![], Some(maintenances()));
        let update = agent.visualize("Graphique").await;
        assert!(update
            .final_answer
            .unwrap()
            .starts_with("❌ Erreur lors de la création du graphique:"));
    }
}
