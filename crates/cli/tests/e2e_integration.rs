//! End-to-end integration tests for Taskloom.
//!
//! These tests exercise the full pipeline from a mode and settings, through
//! the controller, to agent and flow runs with real built-in tools and a
//! scripted reasoning backend.

use std::sync::Arc;

use serde_json::json;
use taskloom_agent::test_helpers::{ScriptedProvider, respond, text};
use taskloom_agent::{AgentStreamEvent, CollectingSink, Termination};
use taskloom_config::{ConfigStore, FileConfigStore, Settings};
use taskloom_controller::{Controller, ControllerContext, Report, Runnable};
use taskloom_core::error::{ProviderError, ToolError};
use taskloom_core::message::Message;
use taskloom_core::provider::ProviderResponse;
use taskloom_core::tool::{Tool, ToolCallRequest, ToolOutput};
use taskloom_core::{AgentState, Role};
use taskloom_flow::FlowOutcome;

// ── Scripted backend ─────────────────────────────────────────────────────

fn scripted(responses: Vec<ProviderResponse>) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(responses))
}

fn scripted_results(
    script: Vec<Result<ProviderResponse, ProviderError>>,
) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::from_results(script))
}

fn call(id: &str, tool: &str, args: serde_json::Value) -> ProviderResponse {
    respond(Message::assistant_with_calls(
        "",
        vec![ToolCallRequest::new(id, tool, args)],
    ))
}

fn terminate(id: &str, message: &str) -> ProviderResponse {
    call(
        id,
        "terminate",
        json!({"status": "success", "message": message}),
    )
}

// ── Extra tool ───────────────────────────────────────────────────────────

struct UpperTool;

#[async_trait::async_trait]
impl Tool for UpperTool {
    fn name(&self) -> &str {
        "upper"
    }

    fn description(&self) -> &str {
        "Uppercase the given text"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: "upper".into(),
                reason: "text must be a string".into(),
            })?;
        Ok(ToolOutput::success(text.to_uppercase()))
    }
}

fn controller(provider: Arc<ScriptedProvider>) -> Controller {
    Controller::new(ControllerContext::new(provider).with_tool(Arc::new(UpperTool)))
}

fn no_retry() -> Settings {
    Settings::new().with("max_retries", 0u32)
}

fn agent_summary(report: Report) -> taskloom_agent::RunSummary {
    match report {
        Report::Agent(summary) => summary,
        Report::Flow(_) => panic!("expected an agent report"),
    }
}

// ── Single agent ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_chat_answers_in_one_step() {
    let provider = scripted(vec![text("The answer is 4.")]);
    let mut runnable = controller(provider.clone())
        .create("chat", &no_retry())
        .unwrap();

    let sink = CollectingSink::new();
    let summary = agent_summary(runnable.execute("What is 2 + 2?", &sink).await);

    assert_eq!(summary.termination, Termination::Finished);
    assert_eq!(summary.final_output.as_deref(), Some("The answer is 4."));
    assert_eq!(summary.steps, 1);
    assert_eq!(provider.call_count(), 1);

    let request = &provider.requests()[0];
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages.iter().any(|m| m.content == "What is 2 + 2?"));
}

#[tokio::test]
async fn e2e_tool_then_terminate_streams_every_step() {
    let provider = scripted(vec![
        call("c1", "upper", json!({"text": "hello"})),
        terminate("c2", "shouted HELLO"),
    ]);
    let mut runnable = controller(provider.clone())
        .create("standard", &no_retry())
        .unwrap();

    let sink = CollectingSink::new();
    let summary = agent_summary(runnable.execute("Shout hello", &sink).await);

    assert_eq!(summary.termination, Termination::Finished);
    assert_eq!(summary.steps, 2);
    assert!(summary.step_outputs[0].contains("HELLO"));
    assert!(summary.final_output.as_deref().unwrap().contains("shouted HELLO"));

    // The step events are exactly the summary's step outputs, in order.
    assert_eq!(sink.step_outputs(), summary.step_outputs);

    let events = sink.events();
    let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec!["tool_call", "tool_result", "step", "tool_call", "tool_result", "step", "done"]
    );
}

#[tokio::test]
async fn e2e_unknown_tool_is_observed_and_run_continues() {
    let provider = scripted(vec![
        call("c1", "teleport", json!({"to": "mars"})),
        terminate("c2", "gave up on teleporting"),
    ]);
    let mut runnable = controller(provider.clone())
        .create("standard", &no_retry())
        .unwrap();

    let sink = CollectingSink::new();
    let summary = agent_summary(runnable.execute("Go to mars", &sink).await);

    assert_eq!(summary.termination, Termination::Finished);
    assert!(summary.step_outputs[0].starts_with("Error:"));
    assert!(sink.events().iter().any(|e| matches!(
        e,
        AgentStreamEvent::ToolResult { name, is_error: true, .. } if name == "teleport"
    )));
}

#[tokio::test]
async fn e2e_budget_exhaustion_returns_to_idle() {
    let provider = scripted(vec![call("c1", "upper", json!({"text": "again"}))]);
    let settings = no_retry().with("max_steps", 3u32);
    let mut runnable = controller(provider.clone())
        .create("standard", &settings)
        .unwrap();

    let summary = agent_summary(runnable.execute("loop forever", &CollectingSink::new()).await);

    assert_eq!(summary.termination, Termination::BudgetExhausted);
    assert_eq!(summary.steps, 3);
    assert!(summary.text.ends_with("terminated: step budget reached (3 steps)"));
    assert_eq!(provider.call_count(), 3);

    let Runnable::Agent(agent) = runnable else {
        panic!("expected an agent");
    };
    assert_eq!(agent.state(), AgentState::Idle);
    assert_eq!(agent.current_step(), 0);
}

#[tokio::test]
async fn e2e_cancelled_before_start_stops_cleanly() {
    let provider = scripted(vec![text("never asked")]);
    let mut runnable = controller(provider.clone())
        .create("standard", &no_retry())
        .unwrap();
    runnable.cancel_handle().cancel();

    let summary = agent_summary(runnable.execute("anything", &CollectingSink::new()).await);

    assert_eq!(summary.termination, Termination::Cancelled);
    assert_eq!(summary.steps, 0);
    assert_eq!(provider.call_count(), 0);

    let Runnable::Agent(agent) = runnable else {
        panic!("expected an agent");
    };
    assert_eq!(agent.state(), AgentState::Stopped);
}

#[tokio::test]
async fn e2e_backend_failure_then_rejection() {
    let provider = scripted_results(vec![Err(ProviderError::AuthenticationFailed(
        "bad key".into(),
    ))]);
    let mut runnable = controller(provider.clone())
        .create("standard", &no_retry())
        .unwrap();

    let failed = agent_summary(runnable.execute("hi", &CollectingSink::new()).await);
    assert_eq!(failed.termination, Termination::Failed);
    assert!(failed.text.contains("bad key"));

    let rejected = agent_summary(runnable.execute("hi again", &CollectingSink::new()).await);
    assert_eq!(rejected.termination, Termination::Rejected);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn e2e_transient_failure_is_retried() {
    let provider = scripted_results(vec![
        Err(ProviderError::Timeout("slow".into())),
        Ok(text("recovered")),
    ]);
    let settings = Settings::new()
        .with("max_retries", 2u32)
        .with("retry_base_delay_ms", 10u32);
    let mut runnable = controller(provider.clone()).create("chat", &settings).unwrap();

    let summary = agent_summary(runnable.execute("hi", &CollectingSink::new()).await);
    assert_eq!(summary.termination, Termination::Finished);
    assert_eq!(summary.final_output.as_deref(), Some("recovered"));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn e2e_coder_reads_workspace_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();

    let provider = scripted(vec![
        call("c1", "file_read", json!({"path": "notes.txt"})),
        terminate("c2", "the note says to remember the milk"),
    ]);
    let settings = no_retry().with("workspace", dir.path().to_string_lossy().to_string());
    let mut runnable = controller(provider.clone()).create("coder", &settings).unwrap();

    let summary = agent_summary(
        runnable
            .execute("What does the note say?", &CollectingSink::new())
            .await,
    );

    assert_eq!(summary.termination, Termination::Finished);
    assert!(summary.step_outputs[0].contains("Observed output of cmd `file_read`"));
    assert!(summary.step_outputs[0].contains("remember the milk"));
}

// ── Flow ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_flow_converges_on_second_pass() {
    let provider = scripted(vec![
        // pass 1
        text("1. Uppercase the word"),
        terminate("e1", "did it lowercase"),
        text("The word is not uppercase. Redo step 1."),
        // pass 2
        text("1. Uppercase the word, for real"),
        terminate("e2", "WORD"),
        text("ACCEPT\nThe word is uppercase now."),
    ]);
    let settings = no_retry().with("flow.max_iterations", 3u32);
    let mut runnable = controller(provider.clone()).create("flow", &settings).unwrap();

    let sink = CollectingSink::new();
    let report = runnable.execute("Uppercase 'word'", &sink).await;
    assert!(report.is_success());

    let Report::Flow(summary) = report else {
        panic!("expected a flow report");
    };
    assert_eq!(summary.outcome, FlowOutcome::Converged);
    assert_eq!(summary.passes, 2);
    assert_eq!(summary.outputs.len(), 6);
    assert!(summary.text.contains("flow converged on pass 2 of 3"));
    assert_eq!(provider.call_count(), 6);

    let started: Vec<(u32, String)> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentStreamEvent::MemberStarted { pass, role } => Some((pass, role)),
            _ => None,
        })
        .collect();
    assert_eq!(started.len(), 6);
    assert_eq!(started[3], (2, "planner".to_string()));

    // The planner's second pass sees the critic's feedback.
    let planner_pass_two = &provider.requests()[3];
    assert!(planner_pass_two
        .messages
        .iter()
        .any(|m| m.content.contains("Redo step 1.")));
}

#[tokio::test]
async fn e2e_flow_not_converged_reports_note() {
    let provider = scripted(vec![
        text("plan"),
        terminate("e1", "done"),
        text("Not yet."),
    ]);
    let settings = no_retry()
        .with("flow.max_iterations", 1u32)
        .with("roles.executor.max_steps", 2u32);
    let mut runnable = controller(provider).create("flow", &settings).unwrap();

    let report = runnable.execute("task", &CollectingSink::new()).await;
    assert!(!report.is_success());
    assert!(report.text().contains("convergence not reached after 1 passes"));
}

// ── Saved configurations ─────────────────────────────────────────────────

#[test]
fn e2e_saved_configuration_rebuilds_identical_agent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path());
    let settings = Settings::new()
        .with("max_steps", 6u32)
        .with("tool_choice", "required")
        .with("tools.file_read", true);
    store.save("standard", "careful", &settings).unwrap();

    let loaded = store.load("standard", "careful").unwrap().unwrap();
    assert_eq!(loaded, settings);

    let controller = controller(scripted(vec![text("x")]));
    let Runnable::Agent(from_saved) = controller.create("standard", &loaded).unwrap() else {
        panic!("expected an agent");
    };
    let Runnable::Agent(direct) = controller.create("standard", &settings).unwrap() else {
        panic!("expected an agent");
    };

    assert_eq!(from_saved.config(), direct.config());
    assert_eq!(from_saved.tools().names(), direct.tools().names());
    assert!(from_saved.tools().contains("file_read"));
    assert_eq!(store.list("standard").unwrap(), vec!["careful"]);
}
