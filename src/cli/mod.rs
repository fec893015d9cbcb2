// src/cli/mod.rs — CLI definition (clap derive)

pub mod progress;
pub mod run;
pub mod slices;
pub mod trace;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "rlm-refine",
    about = "Answer questions over large contexts with an iterating root model",
    version
)]
pub struct Cli {
    /// Query to answer (defaults to "answer what the context asks")
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Context file (`.json` is parsed, anything else is text; `-` reads stdin)
    #[arg(short, long)]
    pub context: Option<String>,

    /// Root model (provider/model format)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sub-model used by llm_query (defaults to the root model)
    #[arg(long)]
    pub sub_model: Option<String>,

    /// Max turns before a final answer is forced
    #[arg(short = 't', long)]
    pub max_turns: Option<u32>,

    /// Suppress progress output (only emit the answer)
    #[arg(long)]
    pub quiet: bool,

    /// Append run events as JSON lines to this file
    #[arg(long)]
    pub trace: Option<String>,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how a context would be sliced, without calling any model
    Slices {
        /// Context file (`-` reads stdin)
        #[arg(short, long)]
        context: String,
        /// Print slice info as JSON
        #[arg(long)]
        json: bool,
    },
}
