// src/lib.rs — Library root for rlm-refine

pub mod cli;
pub mod core;
pub mod infra;
pub mod provider;
