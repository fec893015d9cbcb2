// src/core/environment.rs — Persistent REPL namespace backed by Rhai
//
// One environment per call. Top-level `let` bindings live in the scope and
// `fn` definitions are carried forward in a functions-only AST, so both
// survive from one fragment to the next.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rhai::{Dynamic, Engine, Scope, AST};

use super::delegate::Delegate;
use super::hypothesis::Hypothesis;
use super::sandbox::{create_engine, dynamic_to_text, json_to_dynamic, SandboxLimits};
use super::truncation::{BoundedOutput, OutputLimits};
use super::types::{Context, SliceSet};

/// Marker returned when a fragment produced nothing.
pub const NO_OUTPUT: &str = "[no output]";

#[derive(Debug, Clone, Default)]
pub struct EnvironmentLimits {
    pub output: OutputLimits,
    pub sandbox: SandboxLimits,
}

/// Captured result of one fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub output: String,
    /// The fragment raised a parse or runtime error.
    pub failed: bool,
    pub truncated: bool,
}

struct SharedState {
    output: RefCell<BoundedOutput>,
    hypothesis: RefCell<Hypothesis>,
}

impl SharedState {
    fn new(limits: OutputLimits) -> Self {
        Self {
            output: RefCell::new(BoundedOutput::new(limits)),
            hypothesis: RefCell::new(Hypothesis::new()),
        }
    }
}

pub struct ExecutionEnvironment {
    engine: Engine,
    scope: Scope<'static>,
    functions: AST,
    state: Rc<SharedState>,
    context: Context,
    query: String,
    slices: Arc<SliceSet>,
    delegate: Arc<dyn Delegate>,
    limits: EnvironmentLimits,
}

impl ExecutionEnvironment {
    pub fn new(
        context: Context,
        query: impl Into<String>,
        slices: Arc<SliceSet>,
        delegate: Arc<dyn Delegate>,
        limits: &EnvironmentLimits,
    ) -> Self {
        let state = Rc::new(SharedState::new(limits.output));
        let engine = build_engine(&limits.sandbox, &state, &slices, &delegate);
        let query = query.into();
        let scope = seed_scope(&context, &query);

        Self {
            engine,
            scope,
            functions: AST::empty(),
            state,
            context,
            query,
            slices,
            delegate,
            limits: limits.clone(),
        }
    }

    /// Run a fragment and capture everything it printed.
    pub fn execute(&mut self, code: &str) -> ExecutionReport {
        let mut failed = false;

        match self.engine.compile(code) {
            Ok(ast) => {
                let merged = self.functions.merge(&ast);
                self.functions = merged.clone_functions_only();

                match self
                    .engine
                    .eval_ast_with_scope::<Dynamic>(&mut self.scope, &merged)
                {
                    Ok(value) if !value.is_unit() => {
                        let mut out = self.state.output.borrow_mut();
                        out.push(&dynamic_to_text(&value));
                        out.push("\n");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        failed = true;
                        self.state
                            .output
                            .borrow_mut()
                            .push(&format!("Error: {}\n", e));
                    }
                }
            }
            Err(e) => {
                failed = true;
                self.state
                    .output
                    .borrow_mut()
                    .push(&format!("Error: {}\n", e));
            }
        }

        let Some(result) = self.state.output.borrow_mut().finish() else {
            return ExecutionReport {
                output: NO_OUTPUT.to_string(),
                failed,
                truncated: false,
            };
        };
        if failed {
            tracing::debug!(output = %result.content, "Fragment raised an error");
        }
        ExecutionReport {
            output: result.content,
            failed,
            truncated: result.was_truncated,
        }
    }

    /// Run a fragment and return only its captured output.
    pub fn run(&mut self, code: &str) -> String {
        self.execute(code).output
    }

    /// Read a namespace variable as text. Unit and missing names are unresolved.
    pub fn resolve_variable(&self, name: &str) -> Option<String> {
        let name = name.trim().trim_matches(|c| c == '"' || c == '\'');
        let value = self.scope.get_value::<Dynamic>(name)?;
        if value.is_unit() {
            None
        } else {
            Some(dynamic_to_text(&value))
        }
    }

    /// Drop all variables, functions and the hypothesis, then rebind the helpers.
    pub fn reset(&mut self) {
        self.state = Rc::new(SharedState::new(self.limits.output));
        self.engine = build_engine(&self.limits.sandbox, &self.state, &self.slices, &self.delegate);
        self.scope = seed_scope(&self.context, &self.query);
        self.functions = AST::empty();
    }

    pub fn hypothesis(&self) -> Hypothesis {
        self.state.hypothesis.borrow().clone()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.scope.contains(name)
    }
}

fn seed_scope(context: &Context, query: &str) -> Scope<'static> {
    let mut scope = Scope::new();
    scope.push_constant("context", json_to_dynamic(&context.to_value()));
    scope.push_constant("query", query.to_string());
    scope
}

fn build_engine(
    limits: &SandboxLimits,
    state: &Rc<SharedState>,
    slices: &Arc<SliceSet>,
    delegate: &Arc<dyn Delegate>,
) -> Engine {
    let mut engine = create_engine(limits);

    // Output capture
    let s = state.clone();
    engine.on_print(move |text| {
        let mut out = s.output.borrow_mut();
        out.push(text);
        out.push("\n");
    });
    let s = state.clone();
    engine.on_debug(move |text, _source, _pos| {
        let mut out = s.output.borrow_mut();
        out.push(text);
        out.push("\n");
    });

    // Slices
    let sl = slices.clone();
    engine.register_fn("list_slices", move || -> rhai::Array {
        sl.ids().into_iter().map(Dynamic::from).collect()
    });
    let sl = slices.clone();
    engine.register_fn("get_slice", move |id: &str| -> Dynamic {
        sl.get(id)
            .map(|slice| json_to_dynamic(&slice.content))
            .unwrap_or(Dynamic::UNIT)
    });
    let sl = slices.clone();
    engine.register_fn("get_slice_info", move || -> rhai::Array {
        sl.infos().iter().map(json_to_dynamic).collect()
    });
    let sl = slices.clone();
    engine.register_fn("get_slice_info", move |id: &str| -> Dynamic {
        sl.get(id)
            .map(|slice| json_to_dynamic(&slice.info()))
            .unwrap_or(Dynamic::UNIT)
    });

    // Sub-model
    let d = delegate.clone();
    engine.register_fn("llm_query", move |prompt: &str| -> String {
        d.completion(prompt, None)
    });
    let d = delegate.clone();
    engine.register_fn("llm_query", move |prompt: &str, slice_id: &str| -> String {
        d.completion(prompt, Some(slice_id))
    });
    let d = delegate.clone();
    engine.register_fn("llm_query", move |prompt: &str, _: ()| -> String {
        d.completion(prompt, None)
    });

    // Hypothesis
    let s = state.clone();
    engine.register_fn("update_hypothesis", move |value: Dynamic| {
        s.hypothesis.borrow_mut().update(dynamic_to_text(&value));
    });
    let s = state.clone();
    engine.register_fn("get_hypothesis", move || -> Dynamic {
        match s.hypothesis.borrow().current() {
            Some(v) => Dynamic::from(v.to_string()),
            None => Dynamic::UNIT,
        }
    });
    let s = state.clone();
    engine.register_fn("get_hypothesis_history", move || -> rhai::Array {
        s.hypothesis
            .borrow()
            .history()
            .iter()
            .cloned()
            .map(Dynamic::from)
            .collect()
    });

    engine
}
