// src/main.rs — rlm-refine entry point

use clap::Parser;

use rlm_refine::cli::{Cli, Commands};
use rlm_refine::infra::config::Config;
use rlm_refine::infra::logger;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG / RLM_REFINE_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Some(Commands::Slices { ref context, json }) => {
            rlm_refine::cli::slices::show_slices(context, json, &config)
        }
        None => rlm_refine::cli::run::run_task(cli, config).await,
    }
}
