//! # Deckhand
//!
//! A local child agent. A planner sends typed action requests; the agent
//! executes them against the host (files, processes, input, telemetry) one at
//! a time and answers with uniform results.
//!
//! - Domain: configuration, actions, payloads, errors, driver traits
//! - Infrastructure: path policy and the file, process and telemetry facades
//! - Application: the dispatcher, its history, logging setup
//! - Interface: the `deckhand` command line

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interface;

pub use application::agent::{Capabilities, ChildAgent, SharedAgent};
pub use domain::config::AgentConfig;
pub use domain::error::OperationError;
pub use domain::payload::Payload;
pub use domain::types::{Action, ActionKind, ActionRequest, ActionResult, AgentStatus};
