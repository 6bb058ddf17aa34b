//! # Infrastructure Layer
//!
//! Handles interactions with the host operating system.
//! Implements the traits defined in the Domain layer (e.g., InputDriver).

pub mod tools;
