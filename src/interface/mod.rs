//! # Interface Layer
//!
//! The command-line surface: argument parsing and per-command handlers.

pub mod cli;
pub mod commands;
