//! # Command Handlers
//!
//! One handler per `deckhand` subcommand. Handlers write to any `Write` so they
//! can be exercised without a terminal.

pub mod action;
pub mod status;
