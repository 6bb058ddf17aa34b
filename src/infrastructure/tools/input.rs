//! # Input Driver
//!
//! Synthetic keyboard and mouse input through the `xdotool` binary.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;

use crate::domain::traits::InputDriver;
use crate::domain::types::MouseButton;

/// Upper bound for a single xdotool invocation, excluding typing delays.
const XDOTOOL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct XdotoolDriver {
    binary: String,
}

impl Default for XdotoolDriver {
    fn default() -> Self {
        Self::new("xdotool")
    }
}

impl XdotoolDriver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String], budget: Duration) -> Result<String, String> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| format!("{} is not available: {}", self.binary, e))?;

        let output = tokio::time::timeout(budget, child.wait_with_output())
            .await
            .map_err(|_| format!("{} timed out", self.binary))?
            .map_err(|e| format!("{} failed: {}", self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl InputDriver for XdotoolDriver {
    async fn type_text(&self, text: &str, interval_secs: f64) -> Result<(), String> {
        let delay_ms = (interval_secs * 1000.0).round() as u64;
        let typing = Duration::from_millis(delay_ms.saturating_mul(text.chars().count() as u64));
        let args = vec![
            "type".to_string(),
            "--delay".to_string(),
            delay_ms.to_string(),
            "--".to_string(),
            text.to_string(),
        ];
        self.run(&args, XDOTOOL_TIMEOUT + typing).await.map(|_| ())
    }

    async fn press_key(&self, key: &str, presses: u32) -> Result<(), String> {
        let args = vec![
            "key".to_string(),
            "--repeat".to_string(),
            presses.to_string(),
            "--".to_string(),
            keysym(key),
        ];
        self.run(&args, XDOTOOL_TIMEOUT).await.map(|_| ())
    }

    async fn click(
        &self,
        position: Option<(i32, i32)>,
        clicks: u32,
        button: MouseButton,
    ) -> Result<(), String> {
        let mut args = Vec::new();
        if let Some((x, y)) = position {
            args.extend(["mousemove".to_string(), x.to_string(), y.to_string()]);
        }
        args.extend([
            "click".to_string(),
            "--repeat".to_string(),
            clicks.to_string(),
            button_number(button).to_string(),
        ]);
        self.run(&args, XDOTOOL_TIMEOUT).await.map(|_| ())
    }

    async fn screen_size(&self) -> Result<(u32, u32), String> {
        let out = self
            .run(&["getdisplaygeometry".to_string()], XDOTOOL_TIMEOUT)
            .await?;
        parse_geometry(&out)
    }

    async fn cursor_position(&self) -> Result<(i32, i32), String> {
        let out = self
            .run(
                &["getmouselocation".to_string(), "--shell".to_string()],
                XDOTOOL_TIMEOUT,
            )
            .await?;
        parse_mouse_location(&out)
    }
}

fn button_number(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Middle => 2,
        MouseButton::Right => 3,
    }
}

/// Maps common lowercase key names onto X keysyms; anything else passes through.
fn keysym(key: &str) -> String {
    let mapped = match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => "Return",
        "tab" => "Tab",
        "esc" | "escape" => "Escape",
        "space" => "space",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "home" => "Home",
        "end" => "End",
        "pageup" => "Prior",
        "pagedown" => "Next",
        "ctrl" | "control" => "Control_L",
        "alt" => "Alt_L",
        "shift" => "Shift_L",
        "win" | "super" | "command" => "Super_L",
        _ => return key.to_string(),
    };
    mapped.to_string()
}

/// `getdisplaygeometry` prints `WIDTH HEIGHT`.
fn parse_geometry(out: &str) -> Result<(u32, u32), String> {
    let mut parts = out.split_whitespace().map(str::parse::<u32>);
    match (parts.next(), parts.next()) {
        (Some(Ok(w)), Some(Ok(h))) => Ok((w, h)),
        _ => Err(format!("unexpected display geometry: {:?}", out.trim())),
    }
}

/// `getmouselocation --shell` prints `X=..`, `Y=..`, `SCREEN=..`, `WINDOW=..` lines.
fn parse_mouse_location(out: &str) -> Result<(i32, i32), String> {
    let mut x = None;
    let mut y = None;
    for line in out.lines() {
        if let Some(v) = line.strip_prefix("X=") {
            x = v.trim().parse::<i32>().ok();
        } else if let Some(v) = line.strip_prefix("Y=") {
            y = v.trim().parse::<i32>().ok();
        }
    }
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(format!("unexpected mouse location: {:?}", out.trim())),
    }
}

/// True when the pointer sits in any corner of a `width` x `height` screen.
pub fn in_screen_corner(position: (i32, i32), screen: (u32, u32)) -> bool {
    let (x, y) = position;
    let max_x = screen.0.saturating_sub(1) as i32;
    let max_y = screen.1.saturating_sub(1) as i32;
    let at_x_edge = x <= 0 || x >= max_x;
    let at_y_edge = y <= 0 || y >= max_y;
    at_x_edge && at_y_edge
}

#[cfg(test)]
pub(crate) mod recording {
    //! In-memory driver for tests.

    use super::*;
    use std::sync::Mutex;

    pub struct RecordingDriver {
        pub calls: Mutex<Vec<String>>,
        pub cursor: Mutex<(i32, i32)>,
        pub screen: (u32, u32),
    }

    impl RecordingDriver {
        pub fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                cursor: Mutex::new((500, 400)),
                screen: (1920, 1080),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn move_cursor(&self, x: i32, y: i32) {
            *self.cursor.lock().unwrap() = (x, y);
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl InputDriver for RecordingDriver {
        async fn type_text(&self, text: &str, interval_secs: f64) -> Result<(), String> {
            self.record(format!("type {:?} {}", text, interval_secs));
            Ok(())
        }

        async fn press_key(&self, key: &str, presses: u32) -> Result<(), String> {
            self.record(format!("key {} x{}", key, presses));
            Ok(())
        }

        async fn click(
            &self,
            position: Option<(i32, i32)>,
            clicks: u32,
            button: MouseButton,
        ) -> Result<(), String> {
            if let Some((x, y)) = position {
                self.move_cursor(x, y);
            }
            self.record(format!("click {:?} x{} {}", position, clicks, button.as_str()));
            Ok(())
        }

        async fn screen_size(&self) -> Result<(u32, u32), String> {
            Ok(self.screen)
        }

        async fn cursor_position(&self) -> Result<(i32, i32), String> {
            Ok(*self.cursor.lock().unwrap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry() {
        assert_eq!(parse_geometry("1920 1080\n").unwrap(), (1920, 1080));
        assert!(parse_geometry("garbage").is_err());
    }

    #[test]
    fn test_parse_mouse_location() {
        let out = "X=812\nY=44\nSCREEN=0\nWINDOW=62914567\n";
        assert_eq!(parse_mouse_location(out).unwrap(), (812, 44));
        assert!(parse_mouse_location("SCREEN=0\n").is_err());
    }

    #[test]
    fn test_corner_detection() {
        let screen = (1920, 1080);
        assert!(in_screen_corner((0, 0), screen));
        assert!(in_screen_corner((1919, 0), screen));
        assert!(in_screen_corner((0, 1079), screen));
        assert!(in_screen_corner((1919, 1079), screen));
        assert!(!in_screen_corner((0, 500), screen));
        assert!(!in_screen_corner((960, 540), screen));
    }

    #[test]
    fn test_keysym_mapping() {
        assert_eq!(keysym("enter"), "Return");
        assert_eq!(keysym("Tab"), "Tab");
        assert_eq!(keysym("F5"), "F5");
        assert_eq!(keysym("a"), "a");
    }

    #[tokio::test]
    async fn test_missing_binary_reports_unavailable() {
        let driver = XdotoolDriver::new("definitely-not-a-real-xdotool-binary");
        let err = driver.screen_size().await.unwrap_err();
        assert!(err.contains("is not available"));
    }
}
