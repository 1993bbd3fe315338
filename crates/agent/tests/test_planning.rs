//! Planner, replanner and decision adapter against a mocked model

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;

use stepwise_agent::{AgentError, Decision, DecisionAdapter, Planner, PromptTemplates, Replanner};
use stepwise_provider::{ChatResponse, Message, ProviderError, ToolChoice};
use stepwise_session::ConversationState;

async fn planner(mock: MockProvider) -> Planner<MockProvider> {
    Planner::new(
        Arc::new(mock),
        &registry(FakeCapabilities::new()).await,
        Arc::new(PromptTemplates::default()),
        settings(),
    )
}

async fn replanner(mock: MockProvider) -> Replanner<MockProvider> {
    Replanner::new(
        Arc::new(mock),
        &registry(FakeCapabilities::new()).await,
        Arc::new(PromptTemplates::default()),
        settings(),
    )
}

fn fresh_turn(input: &str) -> ConversationState {
    let mut state = ConversationState::new("t");
    state.begin_turn(input);
    state
}

#[tokio::test]
async fn test_adapter_forces_act() {
    let mut mock = MockProvider::new();
    mock.expect_chat().times(1).returning(|params| {
        assert_eq!(params.tool_choice, ToolChoice::Required("act".to_string()));
        assert_eq!(params.tools.len(), 1);
        assert_eq!(params.tools[0].function.name, "act");
        assert_eq!(params.model, "test-model");
        Ok(act_answer("42"))
    });

    let adapter = DecisionAdapter::new(Arc::new(mock), settings());
    let decision = adapter.decide(vec![Message::user("q")]).await.unwrap();
    assert_eq!(decision, Decision::FinalAnswer("42".to_string()));
}

#[tokio::test]
async fn test_adapter_rejects_plain_text() {
    let mut mock = MockProvider::new();
    expect_responses(&mut mock, vec![ChatResponse::text("I think the answer is 42")]);

    let adapter = DecisionAdapter::new(Arc::new(mock), settings());
    let err = adapter.decide(vec![Message::user("q")]).await.unwrap_err();
    assert!(matches!(err, AgentError::DecisionAdapter(_)));
}

#[tokio::test]
async fn test_adapter_rejects_wrong_function() {
    let mut mock = MockProvider::new();
    expect_responses(
        &mut mock,
        vec![calls(vec![tool_call("c", "echo", json!({"text": "x"}))])],
    );

    let adapter = DecisionAdapter::new(Arc::new(mock), settings());
    assert!(adapter.decide(vec![Message::user("q")]).await.is_err());
}

#[tokio::test]
async fn test_adapter_passes_provider_errors() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Err(ProviderError::RateLimited));

    let adapter = DecisionAdapter::new(Arc::new(mock), settings());
    let err = adapter.decide(vec![Message::user("q")]).await.unwrap_err();
    assert!(matches!(err, AgentError::Provider(ProviderError::RateLimited)));
}

#[tokio::test]
async fn test_planner_direct_answer() {
    let mut mock = MockProvider::new();
    expect_responses(&mut mock, vec![act_answer("Hello!")]);

    let update = planner(mock).await.run(&fresh_turn("hi")).await.unwrap();
    assert_eq!(update.response.as_deref(), Some("Hello!"));
    assert_eq!(update.plan, None);
}

#[tokio::test]
async fn test_planner_plan() {
    let mut mock = MockProvider::new();
    expect_responses(&mut mock, vec![act_plan(&["list files", "read notes.txt"])]);

    let update = planner(mock)
        .await
        .run(&fresh_turn("what do my notes say?"))
        .await
        .unwrap();
    assert_eq!(update.response, None);
    assert_eq!(
        update.plan,
        Some(vec!["list files".to_string(), "read notes.txt".to_string()])
    );
}

#[tokio::test]
async fn test_planner_prompt_carries_history_tools_and_request() {
    let mut mock = MockProvider::new();
    mock.expect_chat().times(1).returning(|params| {
        // earlier user + earlier answer + current user + planning prompt
        assert_eq!(params.messages.len(), 4);
        assert_eq!(params.messages[0], Message::user("earlier question"));
        assert_eq!(params.messages[1], Message::assistant("earlier answer"));
        assert_eq!(params.messages[2], Message::user("new question"));
        let prompt = last_user_prompt(&params);
        assert!(prompt.contains("new question"));
        assert!(prompt.contains("- echo: Return the text argument"));
        assert!(prompt.contains("- sleepy:"));
        Ok(act_answer("ok"))
    });

    let mut state = ConversationState::new("t");
    state.global_history = vec![
        Message::user("earlier question"),
        Message::assistant("earlier answer"),
    ];
    state.begin_turn("new question");
    planner(mock).await.run(&state).await.unwrap();
}

#[tokio::test]
async fn test_planner_is_idempotent_under_deterministic_model() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(2)
        .returning(|_| Ok(act_plan(&["a", "b"])));

    let planner = planner(mock).await;
    let state = fresh_turn("same request");
    let first = planner.run(&state).await.unwrap();
    let second = planner.run(&state).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_planner_empty_plan_is_failure() {
    let mut mock = MockProvider::new();
    expect_responses(&mut mock, vec![act_plan(&[])]);

    let err = planner(mock)
        .await
        .run(&fresh_turn("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::DecisionAdapter(_)));
}

#[tokio::test]
async fn test_replanner_prompt_lists_progress() {
    let mut mock = MockProvider::new();
    mock.expect_chat().times(1).returning(|params| {
        let prompt = last_user_prompt(&params);
        assert!(prompt.contains("1. Step: list files | Result: a.txt"));
        assert!(prompt.contains("1. read a.txt"));
        assert!(prompt.contains("summarize a.txt"));
        Ok(act_plan(&["read a.txt"]))
    });

    let mut state = fresh_turn("summarize a.txt");
    state.past_steps = vec!["Step: list files | Result: a.txt".to_string()];
    state.plan = vec!["read a.txt".to_string()];

    let update = replanner(mock).await.run(&state).await.unwrap();
    assert_eq!(update.plan, Some(vec!["read a.txt".to_string()]));
}

#[tokio::test]
async fn test_replanner_answer_clears_plan() {
    let mut mock = MockProvider::new();
    expect_responses(&mut mock, vec![act_answer("It says hello.")]);

    let mut state = fresh_turn("read it");
    state.plan = vec!["leftover".to_string()];

    let update = replanner(mock).await.run(&state).await.unwrap();
    assert_eq!(update.response.as_deref(), Some("It says hello."));
    assert_eq!(update.plan, Some(Vec::new()));
}
