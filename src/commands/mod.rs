//! Command implementations for the CLI

pub mod analyze;
pub mod classify;
pub mod features;
pub mod once;
pub mod run;
