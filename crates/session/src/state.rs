//! Conversation state and the partial updates nodes return

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use stepwise_provider::Message;

/// Node the control loop runs next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Planning,
    Executing,
    Replanning,
    #[default]
    Done,
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Node::Planning => "planning",
            Node::Executing => "executing",
            Node::Replanning => "replanning",
            Node::Done => "done",
        };
        f.write_str(name)
    }
}

/// Full state of one conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: String,
    /// User requests and final answers across every turn
    #[serde(default)]
    pub global_history: Vec<Message>,
    /// Executor transcript for the step in progress
    #[serde(default)]
    pub internal_history: Vec<Message>,
    #[serde(default)]
    pub input: String,
    /// Pending steps, next one first
    #[serde(default)]
    pub plan: Vec<String>,
    #[serde(default)]
    pub past_steps: Vec<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub next: Node,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl ConversationState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            thread_id: thread_id.into(),
            global_history: Vec::new(),
            internal_history: Vec::new(),
            input: String::new(),
            plan: Vec::new(),
            past_steps: Vec::new(),
            response: None,
            next: Node::Done,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reset the per-turn fields and record the user's request
    pub fn begin_turn(&mut self, input: impl Into<String>) {
        let input = input.into();
        self.global_history.push(Message::user(input.clone()));
        self.input = input;
        self.internal_history.clear();
        self.plan.clear();
        self.past_steps.clear();
        self.response = None;
        self.next = Node::Planning;
        self.touch();
    }

    /// Merge a node's update: list fields append, the rest replace
    pub fn apply(&mut self, update: StateUpdate) {
        self.global_history.extend(update.global_history);
        self.past_steps.extend(update.past_steps);

        if let Some(internal_history) = update.internal_history {
            self.internal_history = internal_history;
        }
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        if let Some(response) = update.response {
            self.response = Some(response);
        }
        if let Some(input) = update.input {
            self.input = input;
        }
        self.touch();
    }

    /// A non-empty answer with nothing left to do
    pub fn is_terminal(&self) -> bool {
        self.response.as_deref().is_some_and(|r| !r.is_empty()) && self.plan.is_empty()
    }

    /// A turn was started and has not reached `Done`
    pub fn is_mid_turn(&self) -> bool {
        self.next != Node::Done
    }

    pub fn current_step(&self) -> Option<&str> {
        self.plan.first().map(String::as_str)
    }

    /// Close the turn, recording the answer in the global history
    pub fn finish(&mut self) -> Option<String> {
        let answer = self.response.clone();
        if let Some(answer) = &answer {
            self.global_history.push(Message::assistant(answer.clone()));
        }
        self.internal_history.clear();
        self.next = Node::Done;
        self.touch();
        answer
    }

    /// Close the turn without an answer; the user message stays in history
    pub fn abort(&mut self) {
        self.internal_history.clear();
        self.plan.clear();
        self.response = None;
        self.next = Node::Done;
        self.touch();
    }

    /// Number of user requests recorded
    pub fn turn_count(&self) -> usize {
        self.global_history
            .iter()
            .filter(|m| m.role == "user")
            .count()
    }

    fn touch(&mut self) {
        self.updated_at = Local::now();
    }
}

/// Partial state returned by a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Appended
    pub global_history: Vec<Message>,
    /// Appended
    pub past_steps: Vec<String>,
    /// Replaced when set
    pub internal_history: Option<Vec<Message>>,
    /// Replaced when set
    pub plan: Option<Vec<String>>,
    /// Replaced when set
    pub response: Option<String>,
    /// Replaced when set
    pub input: Option<String>,
}

impl StateUpdate {
    pub fn response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Self::default()
        }
    }

    pub fn plan(steps: Vec<String>) -> Self {
        Self {
            plan: Some(steps),
            ..Self::default()
        }
    }

    pub fn with_past_step(mut self, record: impl Into<String>) -> Self {
        self.past_steps.push(record.into());
        self
    }

    pub fn with_internal_history(mut self, history: Vec<Message>) -> Self {
        self.internal_history = Some(history);
        self
    }

    pub fn with_plan(mut self, steps: Vec<String>) -> Self {
        self.plan = Some(steps);
        self
    }
}
