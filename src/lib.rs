//! reactor-chat - multi-agent assistant for nuclear plant operations
//!
//! Questions are routed to one of four agents: document retrieval over
//! technical documents, text-to-SQL over the operational database, Plotly
//! chart generation, and a synthesis agent. A state graph sequences them.

pub mod agents;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod graph;
pub mod http;
pub mod ingest;
pub mod knowledge;
pub mod llm;
pub mod operational;
pub mod session;
pub mod viz;

// Re-exports
pub use agents::{AgentKind, AgentState, SessionContext, Supervisor};
pub use config::{get_data_dir, Settings};
pub use embedding::{create_embedder, EmbeddingProvider, HashingEmbedding};
pub use graph::{CompiledGraph, GraphError, GraphState, Node, StateGraph, END};
pub use knowledge::{DocumentRetriever, KnowledgeStore, LanceVectorStore, RetrievedChunk};
pub use llm::{create_chat_model, ChatMessage, ChatModel};
pub use operational::{OperationalDb, QueryResult, QueryTable, SqlGuardError};
pub use session::{ChatSession, ChatTurn};
pub use viz::{generate_chart, Chart, ChartConfig, ChartError, ChartType};
