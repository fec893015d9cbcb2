// src/infra/logger.rs — Structured logging with tracing
//
// Logs always go to stderr. stdout carries only the final answer.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted after RUST_LOG.
pub const LOG_ENV: &str = "RLM_REFINE_LOG";

pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(level));

    // A second init (tests, embedding) is harmless.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
