//! Graph definition: named nodes, a transition table and nested subgraphs.
//!
//! A [`Workflow`] is a set of [`Graph`]s with one root. Each graph maps node
//! names to a [`GraphNode`] (a registered step or a subgraph call) and its
//! [`Transition`]. The engine walks this table with an explicit position
//! stack instead of nested calls.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use mealflow_types::session::{Frame, Position};
use mealflow_types::state::WorkflowState;

use crate::node::{BoxNode, NodeRegistry};

/// Routing predicate: inspects the state and names the next node.
pub type Router = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// Errors found while building or walking a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph '{0}' has no entry point")]
    MissingEntry(String),

    #[error("graph '{graph}' references unknown node '{node}'")]
    UnknownNode { graph: String, node: String },

    #[error("node '{node}' in graph '{graph}' has no outgoing transition")]
    MissingTransition { graph: String, node: String },

    #[error("duplicate node '{node}' in graph '{graph}'")]
    DuplicateNode { graph: String, node: String },

    #[error("unknown graph '{0}'")]
    UnknownGraph(String),

    #[error("router of '{from}' chose '{chosen}', which is not a declared target")]
    UndeclaredTarget { from: String, chosen: String },

    #[error("subgraph cycle through graph '{0}'")]
    SubgraphCycle(String),
}

/// Where control goes after a node finishes.
#[derive(Clone)]
pub enum Transition {
    /// Fixed successor in the same graph.
    To(String),
    /// Successor chosen by a predicate over state, among declared targets.
    Conditional { router: Router, targets: Vec<String> },
    /// Leave this graph (return to the parent, or complete at the root).
    End,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::To(next) => f.debug_tuple("To").field(next).finish(),
            Transition::Conditional { targets, .. } => {
                f.debug_struct("Conditional").field("targets", targets).finish()
            }
            Transition::End => f.write_str("End"),
        }
    }
}

/// Outcome of resolving a transition against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Node(String),
    End,
}

impl Transition {
    pub fn resolve(&self, from: &str, state: &WorkflowState) -> Result<Next, GraphError> {
        match self {
            Transition::To(next) => Ok(Next::Node(next.clone())),
            Transition::Conditional { router, targets } => {
                let chosen = router(state);
                if targets.contains(&chosen) {
                    Ok(Next::Node(chosen))
                } else {
                    Err(GraphError::UndeclaredTarget {
                        from: from.to_string(),
                        chosen,
                    })
                }
            }
            Transition::End => Ok(Next::End),
        }
    }

    fn targets(&self) -> Vec<&str> {
        match self {
            Transition::To(next) => vec![next.as_str()],
            Transition::Conditional { targets, .. } => targets.iter().map(String::as_str).collect(),
            Transition::End => Vec::new(),
        }
    }
}

/// A vertex of a graph.
#[derive(Debug, Clone)]
pub enum GraphNode {
    /// A registered node.
    Step(Arc<BoxNode>),
    /// Enter another graph; from the parent's view this is a single node.
    Subgraph {
        graph: String,
        status: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct GraphEntry {
    pub node: GraphNode,
    pub transition: Transition,
}

/// A validated graph.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    entry: Transition,
    nodes: HashMap<String, GraphEntry>,
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, node: &str) -> Option<&GraphEntry> {
        self.nodes.get(node)
    }

    /// First node to run when entering this graph with `state`.
    pub fn entry_node(&self, state: &WorkflowState) -> Result<Option<String>, GraphError> {
        match self.entry.resolve("START", state)? {
            Next::Node(node) => Ok(Some(node)),
            Next::End => Ok(None),
        }
    }

    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

enum PendingNode {
    Step,
    Subgraph { graph: String, status: Option<String> },
}

/// Builder for a single [`Graph`].
///
/// Nodes are referenced by name and resolved against a [`NodeRegistry`] in
/// [`GraphBuilder::build`].
pub struct GraphBuilder {
    name: String,
    entry: Option<Transition>,
    order: Vec<String>,
    nodes: HashMap<String, PendingNode>,
    transitions: HashMap<String, Transition>,
    duplicate: Option<String>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            order: Vec::new(),
            nodes: HashMap::new(),
            transitions: HashMap::new(),
            duplicate: None,
        }
    }

    fn insert(&mut self, name: String, node: PendingNode) {
        if self.nodes.contains_key(&name) {
            self.duplicate.get_or_insert(name);
            return;
        }
        self.order.push(name.clone());
        self.nodes.insert(name, node);
    }

    /// Add a registered node by name.
    pub fn step(mut self, node: impl Into<String>) -> Self {
        self.insert(node.into(), PendingNode::Step);
        self
    }

    /// Add a node that runs graph `graph` as a nested subgraph.
    pub fn subgraph(
        mut self,
        node: impl Into<String>,
        graph: impl Into<String>,
        status: Option<&str>,
    ) -> Self {
        let graph = graph.into();
        self.insert(
            node.into(),
            PendingNode::Subgraph {
                graph,
                status: status.map(str::to_string),
            },
        );
        self
    }

    /// Fixed entry node.
    pub fn entry(mut self, node: impl Into<String>) -> Self {
        self.entry = Some(Transition::To(node.into()));
        self
    }

    /// Entry node chosen by `router` among `targets`.
    pub fn conditional_entry<F>(mut self, router: F, targets: &[&str]) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        self.entry = Some(Transition::Conditional {
            router: Arc::new(router),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.transitions.insert(from.into(), Transition::To(to.into()));
        self
    }

    pub fn conditional<F>(mut self, from: impl Into<String>, router: F, targets: &[&str]) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        self.transitions.insert(
            from.into(),
            Transition::Conditional {
                router: Arc::new(router),
                targets: targets.iter().map(|t| t.to_string()).collect(),
            },
        );
        self
    }

    /// Mark `from` as a last node of the graph.
    pub fn end(mut self, from: impl Into<String>) -> Self {
        self.transitions.insert(from.into(), Transition::End);
        self
    }

    /// Resolve step names against `registry` and validate the topology.
    pub fn build(mut self, registry: &NodeRegistry) -> Result<Graph, GraphError> {
        if let Some(node) = self.duplicate.take() {
            return Err(GraphError::DuplicateNode {
                graph: self.name,
                node,
            });
        }
        let entry = self
            .entry
            .take()
            .ok_or_else(|| GraphError::MissingEntry(self.name.clone()))?;

        let unknown = |node: &str| GraphError::UnknownNode {
            graph: self.name.clone(),
            node: node.to_string(),
        };

        for target in entry.targets() {
            if !self.nodes.contains_key(target) {
                return Err(unknown(target));
            }
        }

        let mut nodes = HashMap::with_capacity(self.nodes.len());
        for name in &self.order {
            let transition = self
                .transitions
                .get(name)
                .cloned()
                .ok_or_else(|| GraphError::MissingTransition {
                    graph: self.name.clone(),
                    node: name.clone(),
                })?;
            for target in transition.targets() {
                if !self.nodes.contains_key(target) {
                    return Err(unknown(target));
                }
            }

            let node = match &self.nodes[name] {
                PendingNode::Step => GraphNode::Step(registry.get(name).ok_or_else(|| unknown(name))?),
                PendingNode::Subgraph { graph, status } => GraphNode::Subgraph {
                    graph: graph.clone(),
                    status: status.clone(),
                },
            };
            nodes.insert(name.clone(), GraphEntry { node, transition });
        }

        for from in self.transitions.keys() {
            if !self.nodes.contains_key(from) {
                return Err(unknown(from));
            }
        }

        Ok(Graph {
            name: self.name,
            entry,
            nodes,
        })
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A root graph plus every graph it can enter.
#[derive(Debug, Clone)]
pub struct Workflow {
    root: String,
    graphs: HashMap<String, Graph>,
}

impl Workflow {
    /// Validate that every subgraph reference resolves and that no graph
    /// (transitively) enters itself.
    pub fn new(root: Graph, subgraphs: Vec<Graph>) -> Result<Self, GraphError> {
        let root_name = root.name.clone();
        let mut graphs = HashMap::new();
        for graph in std::iter::once(root).chain(subgraphs) {
            graphs.insert(graph.name.clone(), graph);
        }
        let workflow = Self {
            root: root_name,
            graphs,
        };
        workflow.check_subgraphs(&workflow.root, &mut HashSet::new())?;
        Ok(workflow)
    }

    fn check_subgraphs<'a>(
        &'a self,
        graph: &'a str,
        active: &mut HashSet<&'a str>,
    ) -> Result<(), GraphError> {
        let g = self.graph(graph)?;
        if !active.insert(graph) {
            return Err(GraphError::SubgraphCycle(graph.to_string()));
        }
        for entry in g.nodes.values() {
            if let GraphNode::Subgraph { graph: child, .. } = &entry.node {
                self.check_subgraphs(child, active)?;
            }
        }
        active.remove(graph);
        Ok(())
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn graph(&self, name: &str) -> Result<&Graph, GraphError> {
        self.graphs
            .get(name)
            .ok_or_else(|| GraphError::UnknownGraph(name.to_string()))
    }

    /// Initial position for a session starting with `state`.
    pub fn entry_position(&self, state: &WorkflowState) -> Result<Position, GraphError> {
        let root = self.graph(&self.root)?;
        match root.entry_node(state)? {
            Some(node) => Ok(Position::root(self.root.clone(), node)),
            None => Ok(Position::default()),
        }
    }

    /// Resolve the entry frame of a subgraph.
    pub fn enter(&self, graph: &str, state: &WorkflowState) -> Result<Option<Frame>, GraphError> {
        Ok(self
            .graph(graph)?
            .entry_node(state)?
            .map(|node| Frame::new(graph, node)))
    }
}
