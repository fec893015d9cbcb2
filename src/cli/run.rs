// src/cli/run.rs — Default command: answer a query over a context

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use super::progress::terminal_progress;
use super::trace::jsonl_trace;
use super::Cli;
use crate::core::types::{fan_out, Context, EngineConfig, EventSink};
use crate::core::RlmDriver;
use crate::infra::config::Config;
use crate::provider::resolver::resolve_provider;
use crate::provider::retry::RetryConfig;
use crate::provider::roles::ModelRoles;
use crate::provider::transport::{ModelTransport, ProviderTransport};
use crate::provider::ModelRef;

/// Root model used when neither the CLI nor the config names one.
pub const DEFAULT_ROOT_MODEL: &str = "anthropic/claude-sonnet-4-5-20250929";

/// Load a context argument: `-` reads stdin (JSON is detected), a path is read
/// by extension.
pub fn load_context(arg: &str) -> anyhow::Result<Context> {
    if arg == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        return Ok(Context::sniff(raw));
    }
    let path = Path::new(arg);
    if !path.exists() {
        anyhow::bail!("context file not found: {}", path.display());
    }
    Ok(Context::load(path)?)
}

pub async fn run_task(cli: Cli, config: Config) -> anyhow::Result<()> {
    let Some(ref context_arg) = cli.context else {
        anyhow::bail!("no context given; pass --context FILE (or `-` for stdin)");
    };
    let context = load_context(context_arg)?;
    let query = cli.query.join(" ");

    let roles = ModelRoles::from_config(
        cli.model.as_deref().or(config.models.root.as_deref()),
        cli.sub_model.as_deref().or(config.models.sub.as_deref()),
        DEFAULT_ROOT_MODEL,
    )?;

    let mut engine = EngineConfig::from(&config);
    if let Some(turns) = cli.max_turns {
        engine.max_turns = turns;
    }

    let handle = tokio::runtime::Handle::current();
    let retry = RetryConfig::from(&config.transport);
    let root = Arc::new(build_transport(&roles.root, &retry, &config, handle.clone())?);
    let sub = if roles.sub == roles.root {
        root.clone()
    } else {
        Arc::new(build_transport(&roles.sub, &retry, &config, handle)?)
    };

    tracing::info!(root = %roles.root, sub = %roles.sub, max_turns = engine.max_turns, "Running");

    let mut sinks: Vec<EventSink> = Vec::new();
    if !cli.quiet {
        sinks.push(Arc::new(terminal_progress()));
    }
    if let Some(ref trace) = cli.trace {
        sinks.push(Arc::new(jsonl_trace(Path::new(trace))?));
    }

    let mut driver = RlmDriver::new(root.clone(), sub.clone(), engine);
    if !sinks.is_empty() {
        driver = driver.with_sink(fan_out(sinks));
    }

    // The driver blocks on model calls, so it runs off the async workers.
    let outcome = tokio::task::spawn_blocking(move || driver.run(context, &query)).await??;

    println!("{}", outcome.answer);

    if !cli.quiet {
        let mut usage = root.usage();
        if !Arc::ptr_eq(&root, &sub) {
            usage.add(&sub.usage());
        }
        eprintln!(
            "[usage] root_calls={} sub_calls={} tokens={} (in {} / out {})",
            outcome.root_calls,
            outcome.delegate_calls,
            usage.total(),
            usage.input_tokens,
            usage.output_tokens,
        );
    }

    Ok(())
}

fn build_transport(
    model: &ModelRef,
    retry: &RetryConfig,
    config: &Config,
    handle: tokio::runtime::Handle,
) -> anyhow::Result<ProviderTransport> {
    let provider = resolve_provider(model, retry.clone())?;
    Ok(ProviderTransport::new(provider, model, handle).with_temperature(config.transport.temperature))
}
