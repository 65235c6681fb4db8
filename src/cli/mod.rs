//! CLI command handlers

pub mod commands;
pub mod prompt;

pub use commands::{fill, FillOptions, FillSummary};
pub use prompt::{parse_well_count, prompt};
