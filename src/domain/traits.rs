//! # Domain Traits
//!
//! Abstract interfaces for the collaborators the agent does not own.
//! Allows for pluggable implementations in the Infrastructure layer.

use async_trait::async_trait;

use crate::domain::types::MouseButton;

/// Synthetic keyboard and mouse input (e.g., xdotool, a test recorder).
///
/// Errors are plain strings; the controller wraps them into automation errors.
#[async_trait]
pub trait InputDriver: Send + Sync {
    /// Type `text`, waiting `interval_secs` between keystrokes.
    async fn type_text(&self, text: &str, interval_secs: f64) -> Result<(), String>;

    /// Press and release a named key `presses` times.
    async fn press_key(&self, key: &str, presses: u32) -> Result<(), String>;

    /// Click at `(x, y)`, or at the current position when `None`.
    async fn click(
        &self,
        position: Option<(i32, i32)>,
        clicks: u32,
        button: MouseButton,
    ) -> Result<(), String>;

    /// Screen dimensions in pixels.
    async fn screen_size(&self) -> Result<(u32, u32), String>;

    /// Current pointer position.
    async fn cursor_position(&self) -> Result<(i32, i32), String>;
}
