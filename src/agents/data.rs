//! DataAgent: text-to-SQL over the operational database

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::context::SessionContext;
use super::prompts;
use super::state::{AgentKind, AgentState, AgentUpdate, DataResults};
use crate::graph::Node;
use crate::llm::{strip_code_fence, ChatMessage, ChatModel};
use crate::operational::{compute_statistics, OperationalDb, QueryTable};

/// Rows kept as records in the data results
const RESULT_RECORDS: usize = 20;

pub fn sql_block(sql: &str) -> String {
    format!("```sql\n{}\n```", sql)
}

pub struct DataAgent {
    llm: Arc<dyn ChatModel>,
    context: Arc<SessionContext>,
}

impl DataAgent {
    pub fn new(llm: Arc<dyn ChatModel>, context: Arc<SessionContext>) -> Self {
        Self { llm, context }
    }

    async fn generate_sql(&self, question: &str, schema: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(prompts::DATA_SYSTEM),
            ChatMessage::user(prompts::sql_generation(question, schema)),
        ];
        let reply = self.llm.complete(&messages).await?;
        Ok(strip_code_fence(&reply))
    }

    async fn format_results(&self, table: &QueryTable, question: &str) -> Result<String> {
        self.llm
            .ask(&prompts::result_formatting(question, &table.format_for_llm()))
            .await
    }

    /// Answer and results; `Err` only for failures outside SQL execution
    pub async fn analyze(&self, question: &str) -> Result<(String, DataResults)> {
        let db = OperationalDb::open(self.context.db_path())?;
        let schema = db
            .table_schemas()
            .unwrap_or_else(|e| format!("Erreur schéma: {}", e));

        let sql = self.generate_sql(question, &schema).await?;
        tracing::info!("Generated SQL: {}", sql);

        let result = match db.execute_query(&sql) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("SQL rejected or failed: {}", e);
                let answer = format!(
                    "❌ Erreur SQL: {}\n\nRequête générée:\n{}",
                    e,
                    sql_block(&sql)
                );
                return Ok((answer, DataResults::failed(e.to_string(), Some(sql))));
            }
        };

        let table = result.table;
        let formatted = self.format_results(&table, question).await?;
        let answer = format!(
            "{}\n\n📊 **Requête SQL exécutée:**\n{}",
            formatted,
            sql_block(&sql)
        );

        let statistics = table
            .numeric_columns()
            .into_iter()
            .filter_map(|col| {
                let stats = compute_statistics(&table, &col).ok()?;
                Some((col, stats))
            })
            .collect();

        let results = DataResults {
            success: true,
            sql: Some(sql),
            error: None,
            row_count: table.len(),
            columns: table.columns.clone(),
            data: table.to_records(RESULT_RECORDS),
            statistics,
        };

        self.context.set_last_query(table)?;
        Ok((answer, results))
    }
}

#[async_trait]
impl Node<AgentState> for DataAgent {
    async fn run(&self, state: &AgentState) -> Result<AgentUpdate> {
        let (answer, results) = match self.analyze(state.question()).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("DataAgent failed: {:#}", e);
                (
                    format!("❌ Erreur lors de l'analyse: {}", e),
                    DataResults::failed(e.to_string(), None),
                )
            }
        };

        let mut update = AgentUpdate::answer(AgentKind::DataAgent, answer);
        update.data_results = Some(results);
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedChat;
    use crate::operational::ColumnStatistics;
    use rusqlite::Connection;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_test_db(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("operational.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE maintenances (id INTEGER, reactor_name TEXT, type TEXT, duration_hours REAL);
            INSERT INTO maintenances VALUES (1, 'Civaux-1', 'Preventive', 4);
            INSERT INTO maintenances VALUES (2, 'Civaux-1', 'Corrective', 10);
            INSERT INTO maintenances VALUES (3, 'Civaux-2', 'Preventive', 7);
            "#,
        )
        .unwrap();
        path
    }

    fn agent(llm: Arc<ScriptedChat>, db: &Path) -> (DataAgent, Arc<SessionContext>) {
        let context = Arc::new(SessionContext::new(db));
        (DataAgent::new(llm, context.clone()), context)
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let dir = TempDir::new().unwrap();
        let db = create_test_db(&dir);
        let llm = Arc::new(ScriptedChat::new([
            "```sql\nSELECT type, AVG(duration_hours) AS avg_hours FROM maintenances GROUP BY type ORDER BY type\n```",
            "Les maintenances correctives durent 10 h en moyenne.",
        ]));
        let (agent, context) = agent(llm.clone(), &db);

        let update = agent
            .run(&AgentState::new("Durée moyenne par type ?"))
            .await
            .unwrap();
        let results = update.data_results.unwrap();

        assert!(results.success);
        assert_eq!(results.row_count, 2);
        assert_eq!(results.columns, vec!["type", "avg_hours"]);
        assert_eq!(results.statistics.len(), 1);
        assert_eq!(results.statistics[0].0, "avg_hours");
        match &results.statistics[0].1 {
            ColumnStatistics::Numeric(stats) => assert_eq!(stats.mean, 7.75),
            other => panic!("unexpected {:?}", other),
        }

        let answer = update.final_answer.unwrap();
        assert!(answer.starts_with("Les maintenances correctives durent 10 h en moyenne."));
        assert!(answer.ends_with(
            "📊 **Requête SQL exécutée:**\n```sql\nSELECT type, AVG(duration_hours) AS avg_hours FROM maintenances GROUP BY type ORDER BY type\n```"
        ));

        // schema reaches the SQL prompt, results reach the formatting prompt
        assert!(llm
            .prompt(0)
            .contains("- maintenances (3 lignes): id (INTEGER), reactor_name (TEXT)"));
        assert!(llm.prompt(1).contains("| Corrective | 10"));

        assert_eq!(context.last_query().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_sql_reports_statement() {
        let dir = TempDir::new().unwrap();
        let db = create_test_db(&dir);
        let llm = Arc::new(ScriptedChat::new(["DELETE FROM maintenances"]));
        let (agent, context) = agent(llm, &db);

        let (answer, results) = agent.analyze("Supprime tout").await.unwrap();
        assert_eq!(
            answer,
            "❌ Erreur SQL: Seules les requêtes SELECT sont autorisées.\n\nRequête générée:\n```sql\nDELETE FROM maintenances\n```"
        );
        assert!(!results.success);
        assert_eq!(results.sql.as_deref(), Some("DELETE FROM maintenances"));
        assert!(context.last_query().is_none());
    }

    #[tokio::test]
    async fn test_formatting_failure_keeps_no_result() {
        let dir = TempDir::new().unwrap();
        let db = create_test_db(&dir);
        let llm = Arc::new(
            ScriptedChat::new(["SELECT COUNT(*) FROM maintenances"]).then_fail("rate limited"),
        );
        let (agent, context) = agent(llm, &db);

        let err = agent.analyze("Combien ?").await.unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
        assert!(context.last_query().is_none());
    }

    #[tokio::test]
    async fn test_llm_failure_is_analysis_error() {
        let dir = TempDir::new().unwrap();
        let db = create_test_db(&dir);
        let (agent, _) = agent(Arc::new(ScriptedChat::failing()), &db);

        let update = agent.run(&AgentState::new("Combien ?")).await.unwrap();
        assert!(update
            .final_answer
            .unwrap()
            .starts_with("❌ Erreur lors de l'analyse:"));
        assert!(update.data_results.unwrap().error.is_some());
    }
}
