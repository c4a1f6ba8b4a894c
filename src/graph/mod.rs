//! State graph
//!
//! Nodes read the shared state and return a partial update; the graph
//! applies it and follows a direct or conditional edge to the next node
//! until `END`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Terminal pseudo-node
pub const END: &str = "__end__";

/// Guard against routing cycles
pub const DEFAULT_STEP_LIMIT: usize = 25;

pub trait GraphState: Clone + Send + Sync {
    type Update: Send;

    fn apply(&mut self, update: Self::Update);
}

#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    async fn run(&self, state: &S) -> anyhow::Result<S::Update>;
}

/// Picks a route key from the current state
pub type Selector<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph has no entry point")]
    MissingEntryPoint,

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("node added twice: {0}")]
    DuplicateNode(String),

    #[error("node {0} has more than one outgoing edge")]
    ConflictingEdges(String),

    #[error("node {0} has no outgoing edge")]
    NoOutgoingEdge(String),

    #[error("node {node} routed to {route:?}, which has no mapping")]
    UnmappedRoute { node: String, route: String },

    #[error("step limit of {0} reached")]
    StepLimit(usize),

    #[error("node {node} failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: anyhow::Error,
    },
}

enum Edge<S> {
    Direct(String),
    Conditional {
        selector: Selector<S>,
        mapping: HashMap<String, String>,
    },
}

// ============================================================================
// Builder
// ============================================================================

pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    entry: Option<String>,
    problems: Vec<GraphError>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            problems: Vec::new(),
        }
    }

    pub fn add_node(mut self, name: &str, node: impl Node<S> + 'static) -> Self {
        if self.nodes.contains_key(name) || name == END {
            self.problems.push(GraphError::DuplicateNode(name.to_string()));
        } else {
            self.nodes.insert(name.to_string(), Arc::new(node));
        }
        self
    }

    pub fn add_edge(self, from: &str, to: &str) -> Self {
        self.insert_edge(from, Edge::Direct(to.to_string()))
    }

    /// Route by `selector`, looked up in `mapping` (route key -> node or `END`)
    pub fn add_conditional_edges<F>(self, from: &str, selector: F, mapping: &[(&str, &str)]) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        let mapping = mapping
            .iter()
            .map(|(route, target)| (route.to_string(), target.to_string()))
            .collect();
        self.insert_edge(
            from,
            Edge::Conditional {
                selector: Arc::new(selector),
                mapping,
            },
        )
    }

    fn insert_edge(mut self, from: &str, edge: Edge<S>) -> Self {
        if self.edges.contains_key(from) {
            self.problems
                .push(GraphError::ConflictingEdges(from.to_string()));
        } else {
            self.edges.insert(from.to_string(), edge);
        }
        self
    }

    pub fn set_entry_point(mut self, name: &str) -> Self {
        self.entry = Some(name.to_string());
        self
    }

    /// Check wiring and freeze the graph
    pub fn compile(mut self) -> Result<CompiledGraph<S>, GraphError> {
        if let Some(problem) = self.problems.drain(..).next() {
            return Err(problem);
        }

        let entry = self.entry.clone().ok_or(GraphError::MissingEntryPoint)?;
        let known = |name: &str| name == END || self.nodes.contains_key(name);

        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::UnknownNode(entry));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownNode(from.clone()));
            }
            let targets: Vec<&String> = match edge {
                Edge::Direct(to) => vec![to],
                Edge::Conditional { mapping, .. } => mapping.values().collect(),
            };
            if let Some(missing) = targets.into_iter().find(|t| !known(t.as_str())) {
                return Err(GraphError::UnknownNode(missing.clone()));
            }
        }

        let wired: HashSet<&String> = self.edges.keys().collect();
        let mut unwired: Vec<&String> = self.nodes.keys().filter(|n| !wired.contains(n)).collect();
        unwired.sort();
        if let Some(node) = unwired.first() {
            return Err(GraphError::NoOutgoingEdge((*node).clone()));
        }

        Ok(CompiledGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            step_limit: DEFAULT_STEP_LIMIT,
        })
    }
}

// ============================================================================
// Execution
// ============================================================================

pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    entry: String,
    step_limit: usize,
}

impl<S: GraphState> CompiledGraph<S> {
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run from the entry point until `END`
    pub async fn invoke(&self, mut state: S) -> Result<S, GraphError> {
        let mut current = self.entry.clone();
        let mut steps = 0;

        while current != END {
            if steps >= self.step_limit {
                return Err(GraphError::StepLimit(self.step_limit));
            }
            steps += 1;

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::UnknownNode(current.clone()))?;

            tracing::debug!("Running node {}", current);
            let update = node
                .run(&state)
                .await
                .map_err(|source| GraphError::NodeFailed {
                    node: current.clone(),
                    source,
                })?;
            state.apply(update);

            let next = match self.edges.get(&current) {
                Some(Edge::Direct(to)) => to.clone(),
                Some(Edge::Conditional { selector, mapping }) => {
                    let route = selector(&state);
                    mapping
                        .get(&route)
                        .cloned()
                        .ok_or_else(|| GraphError::UnmappedRoute {
                            node: current.clone(),
                            route,
                        })?
                }
                None => return Err(GraphError::NoOutgoingEdge(current)),
            };
            current = next;
        }

        tracing::debug!("Graph finished after {} steps", steps);
        Ok(state)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Trace {
        visited: Vec<String>,
        counter: u32,
    }

    impl GraphState for Trace {
        type Update = (String, u32);

        fn apply(&mut self, (name, inc): Self::Update) {
            self.visited.push(name);
            self.counter += inc;
        }
    }

    struct Step(&'static str, u32);

    #[async_trait]
    impl Node<Trace> for Step {
        async fn run(&self, _state: &Trace) -> anyhow::Result<(String, u32)> {
            Ok((self.0.to_string(), self.1))
        }
    }

    struct Failing;

    #[async_trait]
    impl Node<Trace> for Failing {
        async fn run(&self, _state: &Trace) -> anyhow::Result<(String, u32)> {
            anyhow::bail!("boom")
        }
    }

    fn router_graph() -> StateGraph<Trace> {
        StateGraph::new()
            .add_node("router", Step("router", 0))
            .add_node("small", Step("small", 1))
            .add_node("big", Step("big", 10))
            .set_entry_point("router")
            .add_conditional_edges(
                "router",
                |s: &Trace| if s.counter > 0 { "big".into() } else { "small".into() },
                &[("small", "small"), ("big", "big")],
            )
            .add_edge("small", END)
            .add_edge("big", END)
    }

    #[tokio::test]
    async fn test_conditional_routing() {
        let graph = router_graph().compile().unwrap();
        let out = graph.invoke(Trace::default()).await.unwrap();
        assert_eq!(out.visited, vec!["router", "small"]);
        assert_eq!(out.counter, 1);

        let out = graph
            .invoke(Trace {
                counter: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.visited, vec!["router", "big"]);
    }

    #[tokio::test]
    async fn test_unmapped_route() {
        let graph = StateGraph::new()
            .add_node("a", Step("a", 0))
            .set_entry_point("a")
            .add_conditional_edges("a", |_: &Trace| "elsewhere".into(), &[("x", END)])
            .compile()
            .unwrap();

        match graph.invoke(Trace::default()).await {
            Err(GraphError::UnmappedRoute { node, route }) => {
                assert_eq!(node, "a");
                assert_eq!(route, "elsewhere");
            }
            other => panic!("unexpected {:?}", other.map(|s| s.visited)),
        }
    }

    #[tokio::test]
    async fn test_step_limit() {
        let graph = StateGraph::new()
            .add_node("a", Step("a", 1))
            .add_node("b", Step("b", 1))
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", "a")
            .compile()
            .unwrap()
            .with_step_limit(5);

        assert!(matches!(
            graph.invoke(Trace::default()).await,
            Err(GraphError::StepLimit(5))
        ));
    }

    #[tokio::test]
    async fn test_node_failure() {
        let graph = StateGraph::new()
            .add_node("bad", Failing)
            .set_entry_point("bad")
            .add_edge("bad", END)
            .compile()
            .unwrap();

        let err = graph.invoke(Trace::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "node bad failed: boom");
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            StateGraph::<Trace>::new()
                .add_node("a", Step("a", 0))
                .add_edge("a", END)
                .compile(),
            Err(GraphError::MissingEntryPoint)
        ));

        assert!(matches!(
            StateGraph::new()
                .add_node("a", Step("a", 0))
                .set_entry_point("a")
                .add_edge("a", "ghost")
                .compile(),
            Err(GraphError::UnknownNode(n)) if n == "ghost"
        ));

        assert!(matches!(
            StateGraph::new()
                .add_node("a", Step("a", 0))
                .add_node("b", Step("b", 0))
                .set_entry_point("a")
                .add_edge("a", END)
                .compile(),
            Err(GraphError::NoOutgoingEdge(n)) if n == "b"
        ));

        assert!(matches!(
            router_graph().add_edge("router", END).compile(),
            Err(GraphError::ConflictingEdges(n)) if n == "router"
        ));

        assert!(matches!(
            router_graph().add_node("small", Step("x", 0)).compile(),
            Err(GraphError::DuplicateNode(n)) if n == "small"
        ));
    }
}
