// src/core/mod.rs — Iterative refinement engine

pub mod delegate;
pub mod driver;
pub mod environment;
pub mod hypothesis;
pub mod parser;
pub mod sandbox;
pub mod slicer;
pub mod system_prompt;
pub mod transcript;
pub mod truncation;
pub mod types;

pub use driver::RlmDriver;
pub use types::{CompletionOutcome, Context, EngineConfig, RlmEvent, Termination};
