// src/core/sandbox.rs — Rhai engine factory for the REPL
//
// Rhai has no built-in I/O. Module imports are disabled and `eval` is
// removed, so scripts reach the outside world only through the helpers the
// execution environment registers.

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine};

#[derive(Debug, Clone)]
pub struct SandboxLimits {
    /// Upper bound on script operations per run (0 = unlimited).
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
        }
    }
}

impl From<&crate::infra::config::SandboxConfig> for SandboxLimits {
    fn from(cfg: &crate::infra::config::SandboxConfig) -> Self {
        Self {
            max_operations: cfg.max_operations,
            max_call_levels: cfg.max_call_levels,
            max_expr_depth: cfg.max_expr_depth,
            max_function_expr_depth: cfg.max_function_expr_depth,
        }
    }
}

/// Create a Rhai engine with safety limits applied and no host functions.
///
/// String and collection sizes are left unbounded: the context itself can be
/// many megabytes.
pub fn create_engine(limits: &SandboxLimits) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");

    engine
}

/// Convert a serde_json::Value to a Rhai Dynamic.
pub fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::UNIT,
        serde_json::Value::Bool(b) => Dynamic::from(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        serde_json::Value::String(s) => Dynamic::from(s.clone()),
        serde_json::Value::Array(arr) => {
            let rhai_arr: rhai::Array = arr.iter().map(json_to_dynamic).collect();
            Dynamic::from(rhai_arr)
        }
        serde_json::Value::Object(obj) => {
            let mut map = rhai::Map::new();
            for (k, v) in obj {
                map.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

/// Render a script value as text. Strings are returned verbatim.
pub fn dynamic_to_text(value: &Dynamic) -> String {
    if value.is_string() {
        value.clone().into_string().unwrap_or_default()
    } else {
        value.to_string()
    }
}
