// tests/driver_test.rs — Integration test: root driver with scripted transports

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use rlm_refine::core::delegate::DELEGATE_ERROR_PREFIX;
use rlm_refine::core::system_prompt::FINAL_INSTRUCTION;
use rlm_refine::core::types::{Context, EngineConfig, RlmEvent, Termination};
use rlm_refine::core::RlmDriver;
use rlm_refine::infra::errors::RlmError;
use rlm_refine::provider::transport::{ModelTransport, Prompt};
use rlm_refine::provider::{Message, Role};

/// Root model stand-in: replays canned replies in order and records requests.
struct ScriptedRoot {
    replies: Mutex<VecDeque<Result<String, RlmError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedRoot {
    fn new(replies: &[&str]) -> Arc<Self> {
        Self::with_results(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn with_results(replies: Vec<Result<String, RlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ModelTransport for ScriptedRoot {
    fn name(&self) -> &str {
        "scripted-root"
    }

    fn complete(&self, prompt: Prompt<'_>, _max_tokens: u32) -> Result<String, RlmError> {
        match prompt {
            Prompt::Messages(m) => self.requests.lock().unwrap().push(m.to_vec()),
            Prompt::Text(t) => self.requests.lock().unwrap().push(vec![Message::user(t)]),
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Still thinking.".into()))
    }
}

/// Sub-model stand-in: answers through a closure and records prompts.
struct FnSub<F> {
    answer: F,
    prompts: Mutex<Vec<String>>,
}

impl<F> FnSub<F>
where
    F: Fn(&str) -> Result<String, RlmError> + Send + Sync,
{
    fn new(answer: F) -> Arc<Self> {
        Arc::new(Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

impl<F> ModelTransport for FnSub<F>
where
    F: Fn(&str) -> Result<String, RlmError> + Send + Sync,
{
    fn name(&self) -> &str {
        "fn-sub"
    }

    fn complete(&self, prompt: Prompt<'_>, _max_tokens: u32) -> Result<String, RlmError> {
        let Prompt::Text(text) = prompt else {
            panic!("delegate should send a single prompt string");
        };
        self.prompts.lock().unwrap().push(text.to_string());
        (self.answer)(text)
    }
}

fn echo_sub() -> Arc<FnSub<impl Fn(&str) -> Result<String, RlmError> + Send + Sync>> {
    FnSub::new(|p: &str| Ok(format!("sub saw {} chars", p.len())))
}

fn config(max_turns: u32) -> EngineConfig {
    EngineConfig {
        max_turns,
        ..Default::default()
    }
}

fn paris_context() -> Context {
    Context::from_json(serde_json::json!({
        "a": "Paris is the capital of France.",
        "b": "France is in Europe."
    }))
}

fn tool_outputs(transcript: &[Message]) -> Vec<&str> {
    transcript
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect()
}

// ─── End to end ─────────────────────────────────────────────────────────────

#[test]
fn test_paris_europe_scenario() {
    let root = ScriptedRoot::new(&[
        "Let me check each slice.\n```repl\nlet city = llm_query(\"Which city is the capital?\", \"dict_a\");\nlet continent = llm_query(\"Which continent?\", \"dict_b\");\nupdate_hypothesis(city);\nupdate_hypothesis(city + \" \" + continent);\nprint(get_hypothesis());\n```",
        "```repl\nlet final_answer = get_hypothesis();\n```\nFINAL_VAR(final_answer)",
    ]);
    let sub = FnSub::new(|p: &str| {
        if p.contains("Paris is the capital") {
            Ok("Paris is the capital of France.".into())
        } else if p.contains("Europe") {
            Ok("France is in Europe.".into())
        } else {
            Ok("unknown".into())
        }
    });

    let driver = RlmDriver::new(root.clone(), sub.clone(), config(5));
    let outcome = driver
        .run(paris_context(), "Where is Paris, and which continent is it on?")
        .unwrap();

    assert!(outcome.answer.contains("Paris"));
    assert!(outcome.answer.contains("Europe"));
    assert_eq!(
        outcome.termination,
        Termination::VariableAnswer {
            name: "final_answer".into()
        }
    );
    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.root_calls, 2);
    assert_eq!(outcome.delegate_calls, 2);
    assert_eq!(outcome.hypothesis.history().len(), 1);
    assert_eq!(outcome.slice_ids, vec!["dict_a".to_string(), "dict_b".to_string()]);

    let prompts = sub.prompts.lock().unwrap();
    assert!(prompts[0].starts_with("Context slice 'dict_a':\nParis is the capital of France."));
    assert!(prompts[1].starts_with("Context slice 'dict_b':\nFrance is in Europe."));
}

#[test]
fn test_completion_returns_answer_only() {
    let root = ScriptedRoot::new(&["FINAL(42)"]);
    let driver = RlmDriver::new(root, echo_sub(), config(3));
    assert_eq!(driver.completion("some text", "What is it?").unwrap(), "42");
}

// ─── Turn budget ────────────────────────────────────────────────────────────

#[test]
fn test_zero_turns_forces_single_call_over_seed_transcript() {
    let root = ScriptedRoot::new(&["Forced answer."]);
    let driver = RlmDriver::new(root.clone(), echo_sub(), config(0));
    let outcome = driver.run("ctx", "q").unwrap();

    assert_eq!(outcome.answer, "Forced answer.");
    assert_eq!(outcome.termination, Termination::BudgetExhausted);
    assert_eq!(outcome.turns, 0);
    assert_eq!(root.calls(), 1);

    let requests = root.requests.lock().unwrap();
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[0][0].role, Role::System);
    assert_eq!(requests[0][1], Message::user(FINAL_INSTRUCTION));
}

#[test]
fn test_root_calls_bounded_by_max_turns_plus_one() {
    for max_turns in [1, 3, 6] {
        let root = ScriptedRoot::new(&[]);
        let driver = RlmDriver::new(root.clone(), echo_sub(), config(max_turns));
        let outcome = driver.run("ctx", "q").unwrap();
        assert_eq!(root.calls(), max_turns as usize + 1);
        assert_eq!(outcome.root_calls, max_turns + 1);
        assert_eq!(outcome.answer, "Still thinking.");
    }
}

// ─── Environment across turns ───────────────────────────────────────────────

#[test]
fn test_variables_persist_across_turns() {
    let root = ScriptedRoot::new(&[
        "```repl\nlet secret = 6 * 7;\n```",
        "```repl\nprint(secret);\n```",
        "FINAL_VAR(secret)",
    ]);
    let driver = RlmDriver::new(root, echo_sub(), config(5));
    let outcome = driver.run("ctx", "q").unwrap();

    assert_eq!(outcome.answer, "42");
    let outputs = tool_outputs(&outcome.transcript);
    assert!(outputs[1].ends_with("REPL output:\n42"));
}

#[test]
fn test_code_runs_before_final_var_is_resolved() {
    let root = ScriptedRoot::new(&["```repl\nlet answer = \"computed\";\n```\nFINAL_VAR(answer)"]);
    let driver = RlmDriver::new(root, echo_sub(), config(5));
    let outcome = driver.run("ctx", "q").unwrap();
    assert_eq!(outcome.answer, "computed");
    assert_eq!(outcome.turns, 1);
}

#[test]
fn test_fragment_errors_do_not_abort() {
    let root = ScriptedRoot::new(&["```repl\nthis is not rhai (\n```", "FINAL(recovered)"]);
    let driver = RlmDriver::new(root, echo_sub(), config(5));
    let outcome = driver.run("ctx", "q").unwrap();
    assert_eq!(outcome.answer, "recovered");
    assert!(tool_outputs(&outcome.transcript)[0].contains("REPL output:\nError:"));
}

#[test]
fn test_each_block_gets_its_own_tool_output() {
    let root = ScriptedRoot::new(&[
        "```repl\nprint(\"one\");\n```\nand\n```repl\nprint(\"two\");\n```",
        "FINAL(ok)",
    ]);
    let driver = RlmDriver::new(root, echo_sub(), config(5));
    let outcome = driver.run("ctx", "q").unwrap();
    let outputs = tool_outputs(&outcome.transcript);
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].ends_with("one"));
    assert!(outputs[1].ends_with("two"));
}

// ─── Delegate behavior ──────────────────────────────────────────────────────

#[test]
fn test_failing_delegate_returns_error_text() {
    let root = ScriptedRoot::new(&[
        "```repl\nlet r = llm_query(\"hi\");\nprint(r);\n```",
        "FINAL(done)",
    ]);
    let sub = FnSub::new(|_p: &str| {
        Err(RlmError::Provider {
            provider: "sub".into(),
            message: "upstream unavailable".into(),
            retriable: false,
        })
    });
    let driver = RlmDriver::new(root, sub, config(5));
    let outcome = driver.run("ctx", "q").unwrap();

    assert_eq!(outcome.answer, "done");
    assert_eq!(outcome.delegate_calls, 1);
    let outputs = tool_outputs(&outcome.transcript);
    assert!(outputs[0].contains(DELEGATE_ERROR_PREFIX));
    assert!(outputs[0].contains("upstream unavailable"));
}

#[test]
fn test_unknown_slice_sends_unscoped_prompt() {
    let root = ScriptedRoot::new(&[
        "```repl\nllm_query(\"Q\", \"no_such_slice\");\nllm_query(\"Q\");\n```\nFINAL(x)",
    ]);
    let sub = echo_sub();
    let driver = RlmDriver::new(root, sub.clone(), config(2));
    driver.run(paris_context(), "q").unwrap();

    let prompts = sub.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
    assert_eq!(prompts[0], "Q");
}

// ─── Final-answer handling ──────────────────────────────────────────────────

#[test]
fn test_unresolved_final_var_continues() {
    let root = ScriptedRoot::new(&["FINAL_VAR(missing)", "FINAL(fallback)"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let seen = events.clone();
    let driver = RlmDriver::new(root.clone(), echo_sub(), config(5))
        .with_progress(move |e| seen.lock().unwrap().push(e));
    let outcome = driver.run("ctx", "q").unwrap();

    assert_eq!(outcome.answer, "fallback");
    assert_eq!(outcome.turns, 2);
    assert!(tool_outputs(&outcome.transcript)[0].contains("FINAL_VAR(missing) could not be resolved"));
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, RlmEvent::UnresolvedVariable { name, .. } if name == "missing")));
}

#[test]
fn test_forced_final_resolves_variable() {
    let root = ScriptedRoot::new(&["```repl\nlet best = \"from variable\";\n```", "FINAL_VAR(best)"]);
    // The FINAL_VAR arrives on the forced call, after the budget is spent.
    let driver = RlmDriver::new(root, echo_sub(), config(1));
    let outcome = driver.run("ctx", "q").unwrap();
    assert_eq!(outcome.termination, Termination::BudgetExhausted);
    assert_eq!(outcome.answer, "from variable");
}

// ─── Errors & events ────────────────────────────────────────────────────────

#[test]
fn test_root_transport_error_propagates() {
    let root = ScriptedRoot::with_results(vec![Err(RlmError::Provider {
        provider: "root".into(),
        message: "boom".into(),
        retriable: false,
    })]);
    let driver = RlmDriver::new(root, echo_sub(), config(3));
    let err = driver.completion("ctx", "q").unwrap_err();
    assert!(err.to_string().contains("boom"));
}

#[test]
fn test_event_sequence() {
    let root = ScriptedRoot::new(&[
        "```repl\nupdate_hypothesis(llm_query(\"guess\"));\n```",
        "FINAL(end)",
    ]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let seen = events.clone();
    let driver = RlmDriver::new(root, echo_sub(), config(4))
        .with_progress(move |e| seen.lock().unwrap().push(e));
    driver.run("ctx", "q").unwrap();

    let names: Vec<&'static str> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| match e {
            RlmEvent::CallStart { .. } => "call_start",
            RlmEvent::TurnStart { .. } => "turn_start",
            RlmEvent::ModelResponse { .. } => "model_response",
            RlmEvent::CodeExecuted { .. } => "code_executed",
            RlmEvent::DelegateCall { .. } => "delegate_call",
            RlmEvent::UnresolvedVariable { .. } => "unresolved_variable",
            RlmEvent::TurnEnd { .. } => "turn_end",
            RlmEvent::BudgetExhausted { .. } => "budget_exhausted",
            RlmEvent::FinalAnswer { .. } => "final_answer",
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "call_start",
            "turn_start",
            "model_response",
            "delegate_call",
            "code_executed",
            "turn_end",
            "turn_start",
            "model_response",
            "turn_end",
            "final_answer",
        ]
    );

    let events = events.lock().unwrap();
    match &events[5] {
        RlmEvent::TurnEnd {
            hypothesis,
            delegate_calls,
            ..
        } => {
            assert_eq!(hypothesis.as_deref(), Some("sub saw 5 chars"));
            assert_eq!(*delegate_calls, 1);
        }
        other => panic!("expected turn_end, got {:?}", other),
    }
}
