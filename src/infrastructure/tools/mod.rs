//! # Tools Module
//!
//! The three facades the agent dispatches to (files, processes and input,
//! telemetry), plus the path policy every file access goes through.

pub mod files;
pub mod input;
pub mod monitor;
pub mod policy;
pub mod processes;
