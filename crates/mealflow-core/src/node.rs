//! Nodes and the node registry.
//!
//! A node is a named step that reads the workflow state and returns a
//! [`NodeOutcome`]. Interrupt nodes are run twice: once without resume input
//! (they return [`NodeOutcome::Interrupt`]) and once more when the session is
//! resumed, with the caller's input, to compute their update.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mealflow_types::interrupt::InterruptPayload;
use mealflow_types::state::WorkflowState;
use mealflow_types::update::StateUpdate;

/// What a node produced for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Partial state update; the graph picks the successor.
    Update(StateUpdate),
    /// Halt here and show the payload to the caller.
    Interrupt(InterruptPayload),
    /// Unrecoverable error for this session; routed to the failed path.
    Fail(String),
}

/// A named unit of work in a graph.
///
/// `reads`/`writes` document which state fields the node touches. They are
/// not enforced by the engine but are asserted in tests against the fields a
/// node's updates actually set.
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    fn is_interrupt(&self) -> bool {
        false
    }

    /// Progress text emitted as a `status` event before the node runs.
    /// Interrupt nodes emit it when first entered, not when resumed.
    fn status_message(&self) -> Option<&str> {
        None
    }

    fn reads(&self) -> &'static [&'static str] {
        &[]
    }

    fn writes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Run the node. `resume` is `Some` only when re-entering an interrupt
    /// node with the caller's input.
    fn run(
        &self,
        state: &WorkflowState,
        resume: Option<&str>,
    ) -> impl Future<Output = NodeOutcome> + Send;
}

// ---------------------------------------------------------------------------
// BoxNode
// ---------------------------------------------------------------------------

/// Object-safe version of [`Node`] with a boxed future.
pub trait NodeDyn: Send + Sync {
    fn name_dyn(&self) -> &str;
    fn is_interrupt_dyn(&self) -> bool;
    fn status_message_dyn(&self) -> Option<&str>;
    fn reads_dyn(&self) -> &'static [&'static str];
    fn writes_dyn(&self) -> &'static [&'static str];
    fn run_boxed<'a>(
        &'a self,
        state: &'a WorkflowState,
        resume: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = NodeOutcome> + Send + 'a>>;
}

impl<T: Node> NodeDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn is_interrupt_dyn(&self) -> bool {
        self.is_interrupt()
    }

    fn status_message_dyn(&self) -> Option<&str> {
        self.status_message()
    }

    fn reads_dyn(&self) -> &'static [&'static str] {
        self.reads()
    }

    fn writes_dyn(&self) -> &'static [&'static str] {
        self.writes()
    }

    fn run_boxed<'a>(
        &'a self,
        state: &'a WorkflowState,
        resume: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = NodeOutcome> + Send + 'a>> {
        Box::pin(self.run(state, resume))
    }
}

/// Type-erased node so heterogeneous nodes can share one registry.
pub struct BoxNode {
    inner: Box<dyn NodeDyn>,
}

impl BoxNode {
    pub fn new<T: Node + 'static>(node: T) -> Self {
        Self {
            inner: Box::new(node),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name_dyn()
    }

    pub fn is_interrupt(&self) -> bool {
        self.inner.is_interrupt_dyn()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.inner.status_message_dyn()
    }

    pub fn reads(&self) -> &'static [&'static str] {
        self.inner.reads_dyn()
    }

    pub fn writes(&self) -> &'static [&'static str] {
        self.inner.writes_dyn()
    }

    pub async fn run(&self, state: &WorkflowState, resume: Option<&str>) -> NodeOutcome {
        self.inner.run_boxed(state, resume).await
    }
}

impl std::fmt::Debug for BoxNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNode")
            .field("name", &self.name())
            .field("is_interrupt", &self.is_interrupt())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// NodeRegistry
// ---------------------------------------------------------------------------

/// Catalogue of nodes by name. Graphs reference nodes from here.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<BoxNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its own name, replacing any previous one.
    pub fn register<T: Node + 'static>(&mut self, node: T) -> &mut Self {
        let node = BoxNode::new(node);
        self.nodes.insert(node.name().to_string(), Arc::new(node));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<BoxNode>> {
        self.nodes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FnNode
// ---------------------------------------------------------------------------

type NodeFn = dyn Fn(&WorkflowState, Option<&str>) -> NodeOutcome + Send + Sync;

/// Node backed by a synchronous closure, for small glue steps and tests.
pub struct FnNode {
    name: String,
    interrupt: bool,
    status: Option<String>,
    func: Box<NodeFn>,
}

impl FnNode {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&WorkflowState, Option<&str>) -> NodeOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            interrupt: false,
            status: None,
            func: Box::new(func),
        }
    }

    pub fn interrupting(mut self) -> Self {
        self.interrupt = true;
        self
    }

    pub fn with_status(mut self, message: impl Into<String>) -> Self {
        self.status = Some(message.into());
        self
    }
}

impl Node for FnNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_interrupt(&self) -> bool {
        self.interrupt
    }

    fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    async fn run(&self, state: &WorkflowState, resume: Option<&str>) -> NodeOutcome {
        (self.func)(state, resume)
    }
}
