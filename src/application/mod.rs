//! # Application Layer
//!
//! Orchestration on top of the facades: the action dispatcher, its bounded
//! history, and process-wide logging setup.

pub mod agent;
pub mod history;
pub mod logging;
