//! Replanning node

use std::sync::Arc;
use tracing::info;

use stepwise_capability::CapabilityRegistry;
use stepwise_provider::{Message, Provider};
use stepwise_session::{ConversationState, StateUpdate};

use crate::decision::{Decision, DecisionAdapter};
use crate::prompts::PromptTemplates;
use crate::{AgentSettings, Result};

/// Reviews progress after each step
pub struct Replanner<P: Provider> {
    adapter: DecisionAdapter<P>,
    prompts: Arc<PromptTemplates>,
    tools: String,
}

impl<P: Provider> Replanner<P> {
    pub fn new(
        provider: Arc<P>,
        registry: &CapabilityRegistry,
        prompts: Arc<PromptTemplates>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            adapter: DecisionAdapter::new(provider, settings),
            prompts,
            tools: registry.render(),
        }
    }

    pub fn build_messages(&self, state: &ConversationState) -> Vec<Message> {
        let mut messages = state.global_history.clone();
        messages.push(Message::user(self.prompts.render_replanner(
            &self.tools,
            &state.input,
            &state.past_steps,
            &state.plan,
        )));
        messages
    }

    /// A new plan replaces whatever remained; an answer clears it
    pub async fn run(&self, state: &ConversationState) -> Result<StateUpdate> {
        info!(
            "replanning after {} completed steps, {} remaining",
            state.past_steps.len(),
            state.plan.len()
        );
        let decision = self.adapter.decide(self.build_messages(state)).await?;

        Ok(match decision {
            Decision::FinalAnswer(answer) => {
                info!("final answer ready");
                StateUpdate::response(answer).with_plan(Vec::new())
            }
            Decision::StepPlan(steps) => {
                info!("updated plan: {:?}", steps);
                StateUpdate::plan(steps)
            }
        })
    }
}
