//! # Domain Layer
//!
//! Core definitions, types, and traits that define the agent's contract.
//! Independent of the OS bindings, serving as the contract for other layers.

pub mod config;
pub mod error;
pub mod payload;
pub mod traits;
pub mod types;
