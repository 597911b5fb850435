//! Execution engine: drives a session through the workflow graph.
//!
//! Starting from the session's stored position the engine repeatedly runs
//! the active node, merges its update, advances the position stack and
//! checkpoints, until a node interrupts, the root graph ends, or a node
//! fails. Each node runs under a bounded timeout; a timeout is treated as
//! the node failing.
//!
//! # Checkpoint ordering
//!
//! Every step is committed with a revision compare-and-swap before the next
//! node starts, so writes for one session are strictly ordered and a second
//! executor holding a stale copy cannot overwrite progress.

use std::sync::Arc;
use std::time::Duration;

use mealflow_types::config::EngineConfig;
use mealflow_types::error::RepositoryError;
use mealflow_types::interrupt::InterruptPayload;
use mealflow_types::session::{Session, SessionStatus};
use mealflow_types::state::WorkflowState;
use mealflow_types::update::StateUpdate;

use crate::checkpoint::{self, BoxCheckpointStore};
use crate::emitter::EventEmitter;
use crate::graph::{GraphError, GraphNode, Next, Workflow};
use crate::interrupt::InterruptController;
use crate::merge;
use crate::node::NodeOutcome;

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResult {
    /// A node suspended; the session waits for resume input.
    Interrupted(InterruptPayload),
    /// The root graph finished.
    Completed(WorkflowState),
    /// The session took the error path; carries the `error` field.
    Failed(String),
}

/// Engine-internal failures. These are invariant violations, not business
/// errors: business errors end as [`EngineResult::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("checkpoint write failed: {0}")]
    Checkpoint(#[from] RepositoryError),

    #[error("corrupt position: {0}")]
    CorruptPosition(String),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("run exceeded {0} steps")]
    StepLimitExceeded(u32),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cheap to clone; all shared parts live behind `Arc`.
#[derive(Clone)]
pub struct Engine {
    workflow: Arc<Workflow>,
    store: Arc<BoxCheckpointStore>,
    controller: InterruptController,
    step_timeout: Duration,
    max_steps: u32,
}

impl Engine {
    pub fn new(workflow: Arc<Workflow>, store: Arc<BoxCheckpointStore>, config: &EngineConfig) -> Self {
        Self {
            workflow,
            controller: InterruptController::new(Arc::clone(&store)),
            store,
            step_timeout: Duration::from_secs(config.step_timeout_secs),
            max_steps: config.max_steps_per_run,
        }
    }

    /// Override the per-node timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn store(&self) -> &Arc<BoxCheckpointStore> {
        &self.store
    }

    pub fn controller(&self) -> &InterruptController {
        &self.controller
    }

    /// Run `session` (already persisted as `running`) until it interrupts,
    /// completes or fails. `resume` is fed to the node at the stored
    /// position.
    ///
    /// On an engine error other than a checkpoint failure the session is
    /// marked failed on a best-effort basis before the error is returned.
    pub async fn run(
        &self,
        session: &mut Session,
        resume: Option<String>,
        emitter: &EventEmitter,
    ) -> Result<EngineResult, EngineError> {
        match self.run_steps(session, resume, emitter).await {
            Ok(result) => Ok(result),
            Err(EngineError::Checkpoint(e)) => {
                tracing::error!(
                    session_id = %session.id,
                    position = %session.position,
                    error = %e,
                    "checkpoint write failed"
                );
                Err(EngineError::Checkpoint(e))
            }
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "engine invariant violated");
                merge::apply(&mut session.state, StateUpdate::new().error(e.to_string()));
                if let Err(save_err) = self.finish(session, SessionStatus::Failed).await {
                    tracing::error!(
                        session_id = %session.id,
                        error = %save_err,
                        "could not mark session failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        session: &mut Session,
        mut resume: Option<String>,
        emitter: &EventEmitter,
    ) -> Result<EngineResult, EngineError> {
        let mut steps = 0u32;

        loop {
            let Some(frame) = session.position.top().cloned() else {
                self.finish(session, SessionStatus::Complete).await?;
                tracing::info!(session_id = %session.id, "session complete");
                return Ok(EngineResult::Completed(session.state.clone()));
            };

            steps += 1;
            if steps > self.max_steps {
                return Err(EngineError::StepLimitExceeded(self.max_steps));
            }

            let graph = self.workflow.graph(&frame.graph)?;
            let entry = graph.get(&frame.node).ok_or_else(|| {
                EngineError::CorruptPosition(format!(
                    "node '{}' not in graph '{}'",
                    frame.node, frame.graph
                ))
            })?;

            match &entry.node {
                GraphNode::Subgraph { graph: child, status } => {
                    if let Some(message) = status {
                        emitter.status(&frame.node, message);
                    }
                    tracing::debug!(
                        session_id = %session.id,
                        node = frame.node.as_str(),
                        subgraph = child.as_str(),
                        "entering subgraph"
                    );
                    match self.workflow.enter(child, &session.state)? {
                        Some(inner) => session.position.push(inner),
                        None => self.advance(session)?,
                    }
                    checkpoint::commit(&self.store, session).await?;
                }
                GraphNode::Step(node) => {
                    let input = resume.take();
                    // Re-entering an interrupt node with input already announced it.
                    if input.is_none() {
                        if let Some(message) = node.status_message() {
                            emitter.status(node.name(), message);
                        }
                    }

                    tracing::debug!(
                        session_id = %session.id,
                        node = node.name(),
                        resumed = input.is_some(),
                        "running node"
                    );

                    let outcome =
                        match tokio::time::timeout(self.step_timeout, node.run(&session.state, input.as_deref()))
                            .await
                        {
                            Ok(outcome) => outcome,
                            Err(_elapsed) => NodeOutcome::Fail(format!(
                                "step '{}' timed out after {}s",
                                node.name(),
                                self.step_timeout.as_secs()
                            )),
                        };

                    match outcome {
                        NodeOutcome::Update(update) => {
                            let failed = update.sets_error();
                            merge::apply(&mut session.state, update);
                            if failed {
                                return self.fail(session, node.name()).await;
                            }
                            self.advance(session)?;
                            checkpoint::commit(&self.store, session).await?;
                        }
                        NodeOutcome::Interrupt(payload) => {
                            let payload = self.controller.suspend(session, payload).await?;
                            tracing::info!(
                                session_id = %session.id,
                                node = node.name(),
                                "session interrupted"
                            );
                            return Ok(EngineResult::Interrupted(payload));
                        }
                        NodeOutcome::Fail(message) => {
                            merge::apply(&mut session.state, StateUpdate::new().error(message));
                            return self.fail(session, node.name()).await;
                        }
                    }
                }
            }
        }
    }

    /// Move the innermost frame to its successor, popping finished
    /// subgraphs and advancing their parents.
    fn advance(&self, session: &mut Session) -> Result<(), EngineError> {
        while let Some(frame) = session.position.top().cloned() {
            let entry = self.workflow.graph(&frame.graph)?.get(&frame.node).ok_or_else(|| {
                EngineError::CorruptPosition(format!(
                    "node '{}' not in graph '{}'",
                    frame.node, frame.graph
                ))
            })?;
            match entry.transition.resolve(&frame.node, &session.state)? {
                Next::Node(next) => {
                    session.position.advance_to(next);
                    return Ok(());
                }
                Next::End => {
                    session.position.pop();
                }
            }
        }
        Ok(())
    }

    async fn fail(&self, session: &mut Session, node: &str) -> Result<EngineResult, EngineError> {
        self.finish(session, SessionStatus::Failed).await?;
        let message = session.state.error.clone().unwrap_or_default();
        tracing::warn!(session_id = %session.id, node, error = message.as_str(), "session failed");
        Ok(EngineResult::Failed(message))
    }

    async fn finish(&self, session: &mut Session, status: SessionStatus) -> Result<(), EngineError> {
        session.status = status;
        session.pending_interrupt = None;
        checkpoint::commit(&self.store, session).await?;
        Ok(())
    }
}
