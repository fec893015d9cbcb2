// src/core/driver.rs — Root driver: the turn loop
//
// INIT → ITERATING → DONE(answer). Each turn sends the transcript plus a
// transient turn instruction to the root model, runs any ```repl fragments,
// then looks for a final-answer marker. When the turn budget runs out, one
// more call asks for the answer directly.

use std::sync::Arc;
use std::time::Instant;

use super::delegate::{Delegate, SubModelDelegate, TracedDelegate};
use super::environment::{EnvironmentLimits, ExecutionEnvironment};
use super::parser::{extract_code_blocks, find_final_answer, unwrap_final, FinalMarker, REPL_TAG};
use super::slicer::ContextSlicer;
use super::system_prompt::{
    build_system_prompt, turn_instruction, ContextSummary, DEFAULT_QUERY, FINAL_INSTRUCTION,
};
use super::transcript::Transcript;
use super::types::{CompletionOutcome, Context, EngineConfig, EventSink, RlmEvent, Termination};
use crate::infra::errors::RlmError;
use crate::provider::transport::{ModelTransport, Prompt};
use crate::provider::Message;

pub struct RlmDriver {
    root: Arc<dyn ModelTransport>,
    sub: Arc<dyn ModelTransport>,
    config: EngineConfig,
    /// Optional observer for structured run events.
    on_progress: Option<EventSink>,
}

/// Bookkeeping for one call.
struct CallState {
    call_id: String,
    started: Instant,
    delegate: Arc<dyn Delegate>,
    slice_ids: Vec<String>,
    root_calls: u32,
}

impl RlmDriver {
    pub fn new(
        root: Arc<dyn ModelTransport>,
        sub: Arc<dyn ModelTransport>,
        config: EngineConfig,
    ) -> Self {
        Self {
            root,
            sub,
            config,
            on_progress: None,
        }
    }

    /// Set a callback for run events.
    pub fn with_progress(self, cb: impl Fn(RlmEvent) + Send + Sync + 'static) -> Self {
        self.with_sink(Arc::new(cb))
    }

    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.on_progress = Some(sink);
        self
    }

    fn emit(&self, event: RlmEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Answer `query` over `context`. Only transport failures of the root
    /// model are returned as errors.
    pub fn completion(&self, context: impl Into<Context>, query: &str) -> Result<String, RlmError> {
        self.run(context, query).map(|outcome| outcome.answer)
    }

    /// Like [`completion`](Self::completion), with the full record of the call.
    pub fn run(
        &self,
        context: impl Into<Context>,
        query: &str,
    ) -> Result<CompletionOutcome, RlmError> {
        let context = context.into();
        let query = if query.trim().is_empty() {
            DEFAULT_QUERY.to_string()
        } else {
            query.to_string()
        };
        let call_id = uuid::Uuid::new_v4().to_string();
        let max_turns = self.config.max_turns;

        // INIT
        let slices = Arc::new(ContextSlicer::new(self.config.slicer.clone()).slice(&context));
        let base = SubModelDelegate::new(self.sub.clone(), slices.clone(), self.config.sub_max_tokens);
        let delegate: Arc<dyn Delegate> = match self.on_progress {
            Some(ref sink) => Arc::new(TracedDelegate::new(
                base,
                slices.clone(),
                sink.clone(),
                call_id.clone(),
            )),
            None => Arc::new(base),
        };

        let summary = ContextSummary::new(&context, &slices);
        let mut transcript = Transcript::new(build_system_prompt(&summary)?);

        tracing::info!(
            call_id = %call_id,
            context_kind = context.kind(),
            context_size = context.size(),
            slices = slices.len(),
            max_turns,
            "Starting completion"
        );
        self.emit(RlmEvent::CallStart {
            call_id: call_id.clone(),
            query: query.clone(),
            context_kind: context.kind().to_string(),
            context_size: context.size(),
            slice_count: slices.len(),
            max_turns,
        });

        let mut env = ExecutionEnvironment::new(
            context,
            query.clone(),
            slices.clone(),
            delegate.clone(),
            &EnvironmentLimits {
                output: self.config.output,
                sandbox: self.config.sandbox.clone(),
            },
        );
        let mut call = CallState {
            call_id,
            started: Instant::now(),
            delegate,
            slice_ids: slices.ids(),
            root_calls: 0,
        };

        // ITERATING
        for turn in 0..max_turns {
            self.emit(RlmEvent::TurnStart {
                call_id: call.call_id.clone(),
                turn,
                max_turns,
            });

            let request = transcript.with_instruction(turn_instruction(&query, turn)?);
            let response = self
                .root
                .complete(Prompt::Messages(&request), self.config.root_max_tokens)?;
            call.root_calls += 1;
            self.emit(RlmEvent::ModelResponse {
                call_id: call.call_id.clone(),
                turn,
                response: response.clone(),
            });

            let blocks = extract_code_blocks(&response, REPL_TAG);
            tracing::debug!(turn, blocks = blocks.len(), "Root model responded");
            if blocks.is_empty() {
                transcript.push(Message::assistant(response.as_str()));
            }
            for (block, code) in blocks.iter().enumerate() {
                let report = env.execute(code);
                self.emit(RlmEvent::CodeExecuted {
                    call_id: call.call_id.clone(),
                    turn,
                    block,
                    code: code.clone(),
                    output: report.output.clone(),
                    failed: report.failed,
                    truncated: report.truncated,
                });
                transcript.push(Message::tool_output(format_execution(code, &report.output)));
            }

            self.emit(RlmEvent::TurnEnd {
                call_id: call.call_id.clone(),
                turn,
                hypothesis: env.hypothesis().current().map(str::to_string),
                delegate_calls: call.delegate.call_count(),
            });

            match find_final_answer(&response) {
                Some(FinalMarker::Literal(answer)) => {
                    return Ok(self.finish(call, &env, transcript, answer, Termination::InlineAnswer, turn + 1));
                }
                Some(FinalMarker::Variable(name)) => match env.resolve_variable(&name) {
                    Some(answer) => {
                        let termination = Termination::VariableAnswer { name };
                        return Ok(self.finish(call, &env, transcript, answer, termination, turn + 1));
                    }
                    None => {
                        tracing::warn!(turn, variable = %name, "FINAL_VAR names an unknown variable");
                        self.emit(RlmEvent::UnresolvedVariable {
                            call_id: call.call_id.clone(),
                            turn,
                            name: name.clone(),
                        });
                        transcript.push(Message::tool_output(format!(
                            "FINAL_VAR({name}) could not be resolved: no variable named '{name}' exists in the REPL. \
                             Define it in a ```repl``` block first, or answer with FINAL(...)."
                        )));
                    }
                },
                None => {}
            }
        }

        // Budget spent: ask once more, without the turn instruction.
        tracing::info!(turns = max_turns, "Turn budget exhausted, forcing a final answer");
        self.emit(RlmEvent::BudgetExhausted {
            call_id: call.call_id.clone(),
            turns: max_turns,
        });
        transcript.push(Message::user(FINAL_INSTRUCTION));
        let response = self
            .root
            .complete(Prompt::Messages(transcript.messages()), self.config.root_max_tokens)?;
        call.root_calls += 1;
        self.emit(RlmEvent::ModelResponse {
            call_id: call.call_id.clone(),
            turn: max_turns,
            response: response.clone(),
        });
        transcript.push(Message::assistant(response.as_str()));

        let answer = match find_final_answer(&response) {
            Some(FinalMarker::Variable(name)) => env
                .resolve_variable(&name)
                .unwrap_or_else(|| response.trim().to_string()),
            _ => unwrap_final(&response),
        };
        Ok(self.finish(call, &env, transcript, answer, Termination::BudgetExhausted, max_turns))
    }

    fn finish(
        &self,
        call: CallState,
        env: &ExecutionEnvironment,
        transcript: Transcript,
        answer: String,
        termination: Termination,
        turns: u32,
    ) -> CompletionOutcome {
        let delegate_calls = call.delegate.call_count();
        let elapsed_ms = call.started.elapsed().as_millis() as u64;

        tracing::info!(
            call_id = %call.call_id,
            termination = %termination,
            turns,
            root_calls = call.root_calls,
            delegate_calls,
            elapsed_ms,
            "Completion finished"
        );
        self.emit(RlmEvent::FinalAnswer {
            call_id: call.call_id.clone(),
            answer: answer.clone(),
            termination: termination.clone(),
            turns,
            root_calls: call.root_calls,
            delegate_calls,
            elapsed_ms,
        });

        CompletionOutcome {
            call_id: call.call_id,
            answer,
            termination,
            turns,
            root_calls: call.root_calls,
            delegate_calls,
            hypothesis: env.hypothesis(),
            transcript: transcript.into_messages(),
            slice_ids: call.slice_ids,
        }
    }
}

fn format_execution(code: &str, output: &str) -> String {
    format!("Code executed:\n```repl\n{code}\n```\n\nREPL output:\n{output}")
}
