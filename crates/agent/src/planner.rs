//! Planning node

use std::sync::Arc;
use tracing::info;

use stepwise_capability::CapabilityRegistry;
use stepwise_provider::{Message, Provider};
use stepwise_session::{ConversationState, StateUpdate};

use crate::decision::{Decision, DecisionAdapter};
use crate::prompts::PromptTemplates;
use crate::{AgentSettings, Result};

/// Answers directly or produces the first plan of a turn
pub struct Planner<P: Provider> {
    adapter: DecisionAdapter<P>,
    prompts: Arc<PromptTemplates>,
    tools: String,
}

impl<P: Provider> Planner<P> {
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

    /// Global history followed by the planning prompt
    pub fn build_messages(&self, state: &ConversationState) -> Vec<Message> {
        let mut messages = state.global_history.clone();
        messages.push(Message::user(
            self.prompts.render_planner(&self.tools, &state.input),
        ));
        messages
    }

    pub async fn run(&self, state: &ConversationState) -> Result<StateUpdate> {
        info!("planning: {}", state.input);
        let decision = self.adapter.decide(self.build_messages(state)).await?;

        Ok(match decision {
            Decision::FinalAnswer(answer) => {
                info!("answering directly");
                StateUpdate::response(answer)
            }
            Decision::StepPlan(steps) => {
                info!("plan: {:?}", steps);
                StateUpdate::plan(steps)
            }
        })
    }
}
