//! DocAgent: retrieval-augmented answers over the technical documents

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::prompts;
use super::state::{AgentKind, AgentState, AgentUpdate, DocResults};
use crate::graph::Node;
use crate::knowledge::{DocumentRetriever, RetrievedChunk};
use crate::llm::{ChatMessage, ChatModel};

/// Traffic-light marker for an L2 distance
pub fn relevance_marker(score: f32) -> &'static str {
    if score < 0.5 {
        "🟢"
    } else if score < 1.0 {
        "🟡"
    } else {
        "🔴"
    }
}

pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("[Source: {}, Page: {}]\n{}", c.source, c.page, c.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn format_sources(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::from("\n\n📚 **Sources consultées:**\n");
    for (i, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} **{}** (p.{}) - score: {:.3}\n",
            i + 1,
            relevance_marker(chunk.score),
            chunk.source,
            chunk.page,
            chunk.score
        ));
    }
    out
}

pub struct DocAgent {
    llm: Arc<dyn ChatModel>,
    retriever: Arc<DocumentRetriever>,
    top_k: usize,
}

impl DocAgent {
    pub fn new(llm: Arc<dyn ChatModel>, retriever: Arc<DocumentRetriever>, top_k: usize) -> Self {
        Self {
            llm,
            retriever,
            top_k,
        }
    }

    pub async fn answer(&self, question: &str) -> DocResults {
        let mut sources = self.retriever.search_technical_docs(question, self.top_k).await;
        tracing::debug!("DocAgent retrieved {} chunks", sources.len());

        let messages = [
            ChatMessage::system(prompts::DOC_SYSTEM),
            ChatMessage::user(prompts::rag(&build_context(&sources), question)),
        ];

        let answer = match self.llm.complete(&messages).await {
            Ok(reply) => reply + &format_sources(&sources),
            Err(e) => {
                tracing::warn!("DocAgent generation failed: {:#}", e);
                sources.clear();
                format!("❌ Erreur lors de la génération de la réponse: {}", e)
            }
        };

        DocResults {
            answer,
            sources,
            query: question.to_string(),
        }
    }
}

#[async_trait]
impl Node<AgentState> for DocAgent {
    async fn run(&self, state: &AgentState) -> Result<AgentUpdate> {
        let results = self.answer(state.question()).await;
        let mut update = AgentUpdate::answer(AgentKind::DocAgent, results.answer.clone());
        update.doc_results = Some(results);
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedding;
    use crate::knowledge::{default_chunker, KnowledgeStore, LanceVectorStore};
    use crate::llm::mock::ScriptedChat;
    use tempfile::TempDir;

    async fn create_test_retriever(dir: &TempDir) -> Arc<DocumentRetriever> {
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
        Arc::new(retriever)
    }

    fn chunk(source: &str, page: i32, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            content: format!("contenu de {}", source),
            source: source.to_string(),
            page,
            doc_type: "procedure".to_string(),
            score,
            is_error: false,
        }
    }

    #[test]
    fn test_relevance_marker() {
        assert_eq!(relevance_marker(0.2), "🟢");
        assert_eq!(relevance_marker(0.5), "🟡");
        assert_eq!(relevance_marker(1.0), "🔴");
    }

    #[test]
    fn test_context_and_sources() {
        let chunks = [chunk("A.txt", 1, 0.25), chunk("B.pdf", 3, 1.5)];

        let context = build_context(&chunks);
        assert_eq!(
            context,
            "[Source: A.txt, Page: 1]\ncontenu de A.txt\n\n---\n\n[Source: B.pdf, Page: 3]\ncontenu de B.pdf"
        );

        let sources = format_sources(&chunks);
        assert!(sources.starts_with("\n\n📚 **Sources consultées:**\n"));
        assert!(sources.contains("1. 🟢 **A.txt** (p.1) - score: 0.250\n"));
        assert!(sources.contains("2. 🔴 **B.pdf** (p.3) - score: 1.500\n"));
    }

    #[tokio::test]
    async fn test_answer_with_sources() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;
        retriever
            .index_source(
                "PROC-PUMP-MAINTENANCE-001.txt",
                "procedure",
                &[(1, "Contrôle des vibrations des pompes primaires: seuil 4.5 mm/s.".to_string())],
                false,
            )
            .await
            .unwrap();

        let llm = Arc::new(ScriptedChat::new(["Le seuil est 4.5 mm/s."]));
        let agent = DocAgent::new(llm.clone(), retriever, 5);

        let update = agent
            .run(&AgentState::new("Seuil de vibration des pompes ?"))
            .await
            .unwrap();
        let results = update.doc_results.unwrap();

        assert!(results.answer.starts_with("Le seuil est 4.5 mm/s."));
        assert!(results.answer.contains("**PROC-PUMP-MAINTENANCE-001.txt** (p.1)"));
        assert_eq!(results.sources.len(), 1);
        assert_eq!(update.messages[0], format!("[DocAgent] {}", results.answer));

        let prompt = llm.prompt(0);
        assert!(prompt.contains("[Source: PROC-PUMP-MAINTENANCE-001.txt, Page: 1]"));
        assert!(prompt.contains("Question de l'utilisateur: Seuil de vibration des pompes ?"));
    }

    #[tokio::test]
    async fn test_llm_failure_drops_sources() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;
        let agent = DocAgent::new(Arc::new(ScriptedChat::failing()), retriever, 5);

        let results = agent.answer("procédure ?").await;
        assert!(results
            .answer
            .starts_with("❌ Erreur lors de la génération de la réponse:"));
        assert!(results.sources.is_empty());
    }
}
