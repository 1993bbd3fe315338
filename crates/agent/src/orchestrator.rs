//! Control loop over the planning, executing and replanning nodes
//!
//! The orchestrator owns a thread's state for the length of a turn and saves
//! it after every node. A turn interrupted between nodes can be continued with
//! `resume`; the node that was running is executed again.

use std::sync::Arc;
use tracing::{error, info, warn};

use stepwise_capability::CapabilityRegistry;
use stepwise_provider::{Message, Provider};
use stepwise_session::{Checkpointer, ConversationState, Node, StateUpdate};

use crate::executor::Executor;
use crate::planner::Planner;
use crate::prompts::PromptTemplates;
use crate::replanner::Replanner;
use crate::{AgentError, AgentSettings, Result};

pub struct Orchestrator<P: Provider> {
    planner: Planner<P>,
    executor: Executor<P>,
    replanner: Replanner<P>,
    checkpointer: Arc<dyn Checkpointer>,
    settings: AgentSettings,
}

impl<P: Provider> Orchestrator<P> {
    pub fn new(
        provider: P,
        registry: CapabilityRegistry,
        checkpointer: Arc<dyn Checkpointer>,
        prompts: PromptTemplates,
        settings: AgentSettings,
    ) -> Self {
        let provider = Arc::new(provider);
        let prompts = Arc::new(prompts);

        Self {
            planner: Planner::new(
                provider.clone(),
                &registry,
                prompts.clone(),
                settings.clone(),
            ),
            replanner: Replanner::new(
                provider.clone(),
                &registry,
                prompts.clone(),
                settings.clone(),
            ),
            executor: Executor::new(provider, registry, prompts, settings.clone()),
            checkpointer,
            settings,
        }
    }

    /// Run one user request to its final answer
    pub async fn run_turn(&self, thread_id: &str, input: &str) -> Result<String> {
        let mut state = self.load_or_new(thread_id).await?;
        if state.is_mid_turn() {
            return Err(AgentError::TurnInProgress(thread_id.to_string()));
        }

        info!("turn started on thread {}", thread_id);
        state.begin_turn(input);
        self.checkpointer.save(&state).await?;
        self.drive(state).await
    }

    /// Continue an interrupted turn from its last checkpoint
    pub async fn resume(&self, thread_id: &str) -> Result<String> {
        let state = self
            .pending_turn(thread_id)
            .await?
            .ok_or_else(|| AgentError::NothingToResume(thread_id.to_string()))?;

        info!("resuming thread {} at {}", thread_id, state.next);
        self.drive(state).await
    }

    /// Discard an interrupted turn; `true` if there was one
    pub async fn abandon(&self, thread_id: &str) -> Result<bool> {
        match self.pending_turn(thread_id).await? {
            Some(mut state) => {
                info!("abandoning turn on thread {} at {}", thread_id, state.next);
                state.abort();
                self.checkpointer.save(&state).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The saved state if the thread stopped mid-turn
    pub async fn pending_turn(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        Ok(self
            .checkpointer
            .load(thread_id)
            .await?
            .filter(ConversationState::is_mid_turn))
    }

    /// User requests and final answers recorded on the thread
    pub async fn history(&self, thread_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .checkpointer
            .load(thread_id)
            .await?
            .map(|s| s.global_history)
            .unwrap_or_default())
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    async fn load_or_new(&self, thread_id: &str) -> Result<ConversationState> {
        Ok(self
            .checkpointer
            .load(thread_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(thread_id)))
    }

    async fn drive(&self, mut state: ConversationState) -> Result<String> {
        let mut executed = 0u32;
        let mut answer = None;

        while state.next != Node::Done {
            if executed >= self.settings.recursion_limit {
                let err = AgentError::RecursionLimit(self.settings.recursion_limit);
                return Err(self.fail(state, err).await);
            }
            executed += 1;

            let node = state.next;
            let update = match self.run_node(node, &state).await {
                Ok(update) => update,
                Err(e) => return Err(self.fail(state, e).await),
            };

            state.apply(update);
            state.next = route(node, &state);
            info!("{} -> {}", node, state.next);
            // The answer joins the history in the same save that closes the turn
            if state.next == Node::Done {
                answer = state.finish();
            }
            self.checkpointer.save(&state).await?;
        }

        info!("turn finished on thread {}", state.thread_id);
        Ok(answer.unwrap_or_default())
    }

    async fn run_node(&self, node: Node, state: &ConversationState) -> Result<StateUpdate> {
        match node {
            Node::Planning => self.planner.run(state).await,
            Node::Executing => self.executor.run(state).await,
            Node::Replanning => self.replanner.run(state).await,
            Node::Done => Ok(StateUpdate::default()),
        }
    }

    /// Close the turn without an answer so the thread accepts the next one
    async fn fail(&self, mut state: ConversationState, err: AgentError) -> AgentError {
        error!("turn failed at {}: {}", state.next, err);
        state.abort();
        if let Err(save_err) = self.checkpointer.save(&state).await {
            warn!("failed to checkpoint aborted turn: {}", save_err);
        }
        err
    }
}

/// Next node after `node` has been applied to `state`
fn route(node: Node, state: &ConversationState) -> Node {
    match node {
        Node::Planning if state.response.is_some() && state.plan.is_empty() => Node::Done,
        Node::Planning => Node::Executing,
        Node::Executing => Node::Replanning,
        Node::Replanning if state.is_terminal() => Node::Done,
        Node::Replanning => Node::Executing,
        Node::Done => Node::Done,
    }
}
