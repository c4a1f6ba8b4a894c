//! Shared agent state and partial updates

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::GraphState;
use crate::knowledge::RetrievedChunk;
use crate::operational::ColumnStatistics;
use crate::viz::Chart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    DocAgent,
    DataAgent,
    VizAgent,
    SummaryAgent,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::DocAgent,
        AgentKind::DataAgent,
        AgentKind::VizAgent,
        AgentKind::SummaryAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::DocAgent => "DocAgent",
            AgentKind::DataAgent => "DataAgent",
            AgentKind::VizAgent => "VizAgent",
            AgentKind::SummaryAgent => "SummaryAgent",
        }
    }

    /// Exact agent name only
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Agent results
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocResults {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
    pub query: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataResults {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub row_count: usize,
    pub columns: Vec<String>,
    /// First rows as records
    pub data: Vec<Map<String, Value>>,
    /// Numeric columns, in column order
    pub statistics: Vec<(String, ColumnStatistics)>,
}

impl DataResults {
    pub fn failed(error: impl Into<String>, sql: Option<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            sql,
            ..Default::default()
        }
    }
}

/// Chart settings proposed for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizConfig {
    pub chart_type: String,
    pub x_col: String,
    pub y_col: String,
    pub color: Option<String>,
    pub title: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VizResults {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Chart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<VizConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentState {
    /// Question first, then one `[Agent] answer` entry per agent
    pub messages: Vec<String>,
    pub next_agent: Option<AgentKind>,
    pub doc_results: Option<DocResults>,
    pub data_results: Option<DataResults>,
    pub viz_results: Option<VizResults>,
    pub final_answer: String,
    pub error: Option<String>,
}

impl AgentState {
    pub fn new(question: &str) -> Self {
        Self {
            messages: vec![question.to_string()],
            ..Default::default()
        }
    }

    /// Most recent message
    pub fn question(&self) -> &str {
        self.messages.last().map(String::as_str).unwrap_or("")
    }

    /// The user's question as asked
    pub fn original_question(&self) -> &str {
        self.messages.first().map(String::as_str).unwrap_or("")
    }
}

/// Partial update: messages are appended, other present fields overwrite
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub messages: Vec<String>,
    pub next_agent: Option<AgentKind>,
    pub doc_results: Option<DocResults>,
    pub data_results: Option<DataResults>,
    pub viz_results: Option<VizResults>,
    pub final_answer: Option<String>,
    pub error: Option<String>,
}

impl AgentUpdate {
    pub fn route(agent: AgentKind) -> Self {
        Self {
            next_agent: Some(agent),
            ..Default::default()
        }
    }

    /// Final answer, logged as `[agent] answer`
    pub fn answer(agent: AgentKind, answer: String) -> Self {
        Self {
            messages: vec![format!("[{}] {}", agent, answer)],
            final_answer: Some(answer),
            ..Default::default()
        }
    }
}

impl GraphState for AgentState {
    type Update = AgentUpdate;

    fn apply(&mut self, update: AgentUpdate) {
        self.messages.extend(update.messages);
        if let Some(next) = update.next_agent {
            self.next_agent = Some(next);
        }
        if let Some(doc) = update.doc_results {
            self.doc_results = Some(doc);
        }
        if let Some(data) = update.data_results {
            self.data_results = Some(data);
        }
        if let Some(viz) = update.viz_results {
            self.viz_results = Some(viz);
        }
        if let Some(answer) = update.final_answer {
            self.final_answer = answer;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_kind_parse() {
        assert_eq!(AgentKind::parse("VizAgent"), Some(AgentKind::VizAgent));
        assert_eq!(AgentKind::parse("vizagent"), None);
        assert_eq!(AgentKind::parse(" DocAgent"), None);
        for kind in AgentKind::ALL {
            assert_eq!(AgentKind::parse(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn test_apply_appends_messages_and_overwrites_fields() {
        let mut state = AgentState::new("Combien de réacteurs ?");
        state.apply(AgentUpdate::route(AgentKind::DataAgent));
        state.apply(AgentUpdate::answer(AgentKind::DataAgent, "56".to_string()));

        assert_eq!(state.next_agent, Some(AgentKind::DataAgent));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.question(), "[DataAgent] 56");
        assert_eq!(state.original_question(), "Combien de réacteurs ?");
        assert_eq!(state.final_answer, "56");

        // absent fields leave the state alone
        state.apply(AgentUpdate::default());
        assert_eq!(state.final_answer, "56");
        assert_eq!(state.next_agent, Some(AgentKind::DataAgent));
    }
}
