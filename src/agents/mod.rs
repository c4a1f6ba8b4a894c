//! Agents
//!
//! - router: picks one agent per question
//! - doc: document retrieval (RAG)
//! - data: text-to-SQL over the operational database
//! - viz: Plotly chart generation
//! - summary: synthesis of the others' results
//! - supervisor: the state graph tying them together

pub mod context;
pub mod data;
pub mod doc;
pub mod prompts;
pub mod router;
pub mod state;
pub mod summary;
pub mod supervisor;
pub mod viz;

pub use context::{SessionContext, FALLBACK_TABLE};
pub use data::DataAgent;
pub use doc::{format_sources, relevance_marker, DocAgent};
pub use router::{keyword_route, Router};
pub use state::{
    AgentKind, AgentState, AgentUpdate, DataResults, DocResults, VizConfig, VizResults,
};
pub use summary::SummaryAgent;
pub use supervisor::Supervisor;
pub use viz::VizAgent;
