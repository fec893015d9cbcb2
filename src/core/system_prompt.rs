// src/core/system_prompt.rs — Root-model prompts rendered with minijinja

use minijinja::{context, Environment};
use serde::Serialize;

use super::types::{Context, SliceSet};
use crate::infra::errors::RlmError;

/// Query used when the caller supplies none.
pub const DEFAULT_QUERY: &str = "Please read through the context and answer any queries or respond to any instructions contained within it.";

/// Sent once the turn budget is spent.
pub const FINAL_INSTRUCTION: &str =
    "Based on all the information you have, provide a final answer to the user's query.";

/// Slice ids listed in the system prompt before eliding the rest.
const MAX_LISTED_SLICES: usize = 50;

const SYSTEM_TEMPLATE: &str = r#"You are tasked with answering a query with associated context. You can access, transform, and analyze this context interactively in a REPL environment that can recursively query sub-LLMs, which you are strongly encouraged to use as much as possible. You will be queried iteratively until you provide a final answer.

The REPL runs Rhai scripts and is initialized with:
1. A `context` constant holding the {{ kind }} context ({{ size }} {{ unit }}). Look through it sufficiently before answering.
2. A `query` constant holding the user's query.
3. `llm_query(prompt)` and `llm_query(prompt, slice_id)`, which ask a sub-LLM that can handle around 500K characters. Passing a slice id sends only that slice of the context along with the prompt.
4. Context slice helpers:
   - `list_slices()` returns the ids of the pre-computed context slices
   - `get_slice(slice_id)` returns the content of one slice
   - `get_slice_info()` returns metadata, content type and size for every slice
5. Hypothesis helpers for iterative refinement:
   - `update_hypothesis(value)` replaces the working answer
   - `get_hypothesis()` returns the working answer, or `()` when none is set
   - `get_hypothesis_history()` returns every earlier version
6. `print(...)` to see values. The value of a fragment's last expression is shown too.

The context has been pre-segmented into {{ slice_count }} slice(s):
{% for id in slice_ids %}- {{ id }}
{% endfor %}{% if elided > 0 %}- ... and {{ elided }} more (call `list_slices()`)
{% endif %}
## Iterative refinement workflow

1. Discover slices with `list_slices()` or `get_slice_info()`.
2. Set an initial hypothesis with `update_hypothesis(...)`.
3. For each relevant slice call `llm_query(question, slice_id)` to collect findings.
4. After each finding, refine the hypothesis with `update_hypothesis(...)`.
5. Once the relevant slices are covered, the hypothesis is your answer.

{% raw %}Example:
```repl
let slices = list_slices();
print(`Available slices: ${slices}`);
update_hypothesis("Initial understanding: investigating the question");
for id in slices {
    let finding = llm_query("What information here relates to the question?", id);
    let current = get_hypothesis();
    let refined = llm_query(`Current hypothesis: ${current}\n\nNew finding: ${finding}\n\nProvide a refined hypothesis:`);
    update_hypothesis(refined);
    print(`Updated hypothesis after ${id}`);
}
let final_answer = get_hypothesis();
```

Wrap code in triple backticks with the `repl` language tag. Variables declared with `let` at the top level persist between fragments. Functions declared with `fn` persist too, but cannot see outer variables: pass what they need as parameters. Strings support `len()`, `sub_string(start, len)`, `split(sep)` and `contains(text)`; maps support `keys()` and `values()`.

You will only see truncated REPL output, so store large intermediate values in variables and hand them to `llm_query` instead of printing them.
{% endraw %}
IMPORTANT: When you are done, provide the final answer outside of any code block, at the start of a line, in one of two forms:
1. FINAL(your final answer here) to give the answer directly
2. FINAL_VAR(variable_name) to return a variable you created in the REPL
Do not use these markers until you have completed your task.

Think step by step, plan, and execute the plan in your response. Use the REPL and sub-LLMs as much as possible. Remember to answer the original query explicitly in your final answer."#;

const TURN_TEMPLATE: &str = r#"{% if first %}You have not interacted with the REPL environment or seen your context yet. Your next action should be to look through it; do not provide a final answer yet.

{% else %}The history above is your previous interaction with the REPL environment. {% endif %}Think step by step about how to use the REPL environment (which holds the context) to answer the original query: "{{ query }}".

Continue using the REPL environment, which has the `context` constant, and query sub-LLMs by writing ```repl``` blocks to determine your answer. Your next action:"#;

/// Shape of the context as described to the root model.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSummary {
    pub kind: String,
    pub size: usize,
    pub slice_ids: Vec<String>,
}

impl ContextSummary {
    pub fn new(context: &Context, slices: &SliceSet) -> Self {
        Self {
            kind: context.kind().to_string(),
            size: context.size(),
            slice_ids: slices.ids(),
        }
    }

    fn unit(&self) -> &'static str {
        match self.kind.as_str() {
            "text" => "characters",
            "sequence" => "items",
            _ => "keys",
        }
    }
}

fn environment() -> Result<Environment<'static>, RlmError> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)?;
    env.add_template("turn", TURN_TEMPLATE)?;
    Ok(env)
}

/// System instruction that seeds every transcript.
pub fn build_system_prompt(summary: &ContextSummary) -> Result<String, RlmError> {
    let env = environment()?;
    let listed = summary.slice_ids.len().min(MAX_LISTED_SLICES);
    let rendered = env.get_template("system")?.render(context! {
        kind => &summary.kind,
        size => summary.size,
        unit => summary.unit(),
        slice_count => summary.slice_ids.len(),
        slice_ids => &summary.slice_ids[..listed],
        elided => summary.slice_ids.len() - listed,
    })?;
    Ok(rendered)
}

/// Per-turn instruction. Turn 0 tells the model to inspect the context first.
pub fn turn_instruction(query: &str, turn: u32) -> Result<String, RlmError> {
    let env = environment()?;
    let rendered = env.get_template("turn")?.render(context! {
        query => query,
        first => turn == 0,
    })?;
    Ok(rendered)
}
