//! # App Controller
//!
//! Launches and closes applications, enumerates processes, and drives
//! synthetic keyboard and mouse input.
//!
//! Launched programs are remembered by executable basename so they can later
//! be closed by name. Closing is graceful first: SIGTERM, a bounded wait,
//! then SIGKILL if the process is still there.
//!
//! Every input call is guarded by the fail-safe (pointer parked in a screen
//! corner aborts the call) and paced so consecutive calls are at least
//! `pause_ms` apart.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, Process, ProcessStatus, System};

use crate::domain::config::{AutomationConfig, ProcessConfig};
use crate::domain::error::OperationError;
use crate::domain::payload::{
    CompletedProcess, Payload, ProcessDetails, ProcessList, ProcessSummary,
};
use crate::domain::traits::InputDriver;
use crate::domain::types::{AppOperation, MouseButton};
use crate::infrastructure::tools::input::in_screen_corner;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const CLOSE_GRACE: Duration = Duration::from_secs(5);
const EXIT_POLL: Duration = Duration::from_millis(100);

pub struct AppController {
    /// Executable basename -> pid of the most recent launch.
    registry: HashMap<String, u32>,
    timeout: Duration,
    close_grace: Duration,
    system: System,
    driver: Arc<dyn InputDriver>,
    fail_safe: bool,
    pause: Duration,
    last_input: Option<Instant>,
}

impl AppController {
    pub fn new(
        processes: &ProcessConfig,
        automation: &AutomationConfig,
        driver: Arc<dyn InputDriver>,
    ) -> Self {
        tracing::info!(
            "AppController initialized (timeout={}s, fail_safe={}, pause={}ms)",
            processes.timeout,
            automation.fail_safe,
            automation.pause_ms
        );
        Self {
            registry: HashMap::new(),
            timeout: Duration::from_secs(processes.timeout),
            close_grace: CLOSE_GRACE,
            system: System::new(),
            driver,
            fail_safe: automation.fail_safe,
            pause: Duration::from_millis(automation.pause_ms),
            last_input: None,
        }
    }

    /// Shortens the SIGTERM grace period.
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn tracked_pid(&self, app_name: &str) -> Option<u32> {
        self.registry.get(app_name).copied()
    }

    // -- launching ------------------------------------------------------------

    pub async fn launch_app(&mut self, app_path: &str, args: &[String], wait: bool) -> AppOperation {
        tracing::info!("Launching application: {} {:?} (wait={})", app_path, args, wait);
        let name = Some(app_path.to_string());
        match self.launch_inner(app_path, args, wait).await {
            Ok(op) => op,
            Err(e) => AppOperation::from_outcome("launch", name, Err(e)),
        }
    }

    async fn launch_inner(
        &mut self,
        app_path: &str,
        args: &[String],
        wait: bool,
    ) -> Result<AppOperation, OperationError> {
        let mut cmd = tokio::process::Command::new(app_path);
        cmd.args(args);
        cmd.stdin(Stdio::null());

        if wait {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);
            let child = cmd.spawn().map_err(|e| spawn_error(app_path, e))?;

            // On timeout the child is dropped, and with it killed.
            let output = tokio::time::timeout(self.timeout, child.wait_with_output())
                .await
                .map_err(|_| {
                    OperationError::Timeout(format!(
                        "Application launch timed out after {}s",
                        self.timeout.as_secs()
                    ))
                })?
                .map_err(|e| OperationError::io("Error waiting for application", e))?;

            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let success = output.status.success();
            let error = (!success).then(|| {
                if stderr.trim().is_empty() {
                    format!("Application exited with {}", output.status)
                } else {
                    stderr.clone()
                }
            });

            tracing::info!("Application {} finished: {}", app_path, output.status);
            return Ok(AppOperation::completed(
                "launch",
                Some(app_path.to_string()),
                success,
                error,
                Some(Payload::AppCompleted(CompletedProcess {
                    returncode: output.status.code(),
                    stdout,
                    stderr,
                })),
            ));
        }

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        let mut child = cmd.spawn().map_err(|e| spawn_error(app_path, e))?;
        let pid = child
            .id()
            .ok_or_else(|| OperationError::Internal("Launched process has no pid".into()))?;

        self.registry.insert(basename(app_path), pid);

        // Reap the child so it never lingers as a zombie.
        let label = app_path.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::debug!("{} (pid {}) exited: {}", label, pid, status),
                Err(e) => tracing::warn!("Lost track of {} (pid {}): {}", label, pid, e),
            }
        });

        let command = std::iter::once(app_path.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!("Launched {} with pid {}", app_path, pid);
        Ok(AppOperation::from_outcome(
            "launch",
            Some(app_path.to_string()),
            Ok(Payload::AppLaunched { pid, command }),
        ))
    }

    // -- closing --------------------------------------------------------------

    pub async fn close_app(
        &mut self,
        pid: Option<u32>,
        app_name: Option<&str>,
        force: bool,
    ) -> AppOperation {
        tracing::info!(
            "Closing application: pid={:?} name={:?} force={}",
            pid,
            app_name,
            force
        );
        let label = app_name
            .map(str::to_string)
            .or_else(|| pid.map(|p| p.to_string()));
        let outcome = self.close_inner(pid, app_name, force).await;
        AppOperation::from_outcome("close", label, outcome)
    }

    async fn close_inner(
        &mut self,
        pid: Option<u32>,
        app_name: Option<&str>,
        force: bool,
    ) -> Result<Payload, OperationError> {
        let pid = match (pid, app_name) {
            (Some(pid), _) => pid,
            (None, Some(name)) => self.registry.get(name).copied().ok_or_else(|| {
                OperationError::not_found(format!("No PID found for application: {}", name))
            })?,
            (None, None) => {
                return Err(OperationError::validation(
                    "Either pid or app_name must be provided",
                ));
            }
        };

        if pid == std::process::id() {
            return Err(OperationError::validation(
                "Refusing to close the agent's own process",
            ));
        }

        let mut escalated = false;
        if force {
            terminate(&mut self.system, pid, true)?;
        } else {
            terminate(&mut self.system, pid, false)?;
            if !self.wait_for_exit(pid, self.close_grace).await {
                tracing::warn!("PID {} ignored SIGTERM, escalating to SIGKILL", pid);
                match terminate(&mut self.system, pid, true) {
                    Ok(()) | Err(OperationError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                escalated = true;
            }
        }

        if !self.wait_for_exit(pid, self.close_grace).await {
            return Err(OperationError::Internal(format!(
                "Process did not exit: PID {}",
                pid
            )));
        }

        self.registry.retain(|_, tracked| *tracked != pid);
        tracing::info!("Closed PID {} (forced={}, escalated={})", pid, force, escalated);
        Ok(Payload::AppClosed {
            pid,
            forced: force,
            escalated,
        })
    }

    async fn wait_for_exit(&mut self, pid: u32, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        loop {
            if is_gone(&mut self.system, pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(EXIT_POLL).await;
        }
    }

    // -- enumeration ----------------------------------------------------------

    pub fn list_processes(&mut self, filter_name: Option<&str>) -> AppOperation {
        tracing::debug!("Listing processes (filter={:?})", filter_name);
        self.system.refresh_processes();
        let needle = filter_name.map(str::to_lowercase);

        let mut processes: Vec<ProcessSummary> = self
            .system
            .processes()
            .iter()
            .filter(|(_, p)| match &needle {
                Some(n) => p.name().to_lowercase().contains(n.as_str()),
                None => true,
            })
            .map(|(pid, p)| ProcessSummary {
                pid: pid.as_u32(),
                name: p.name().to_string(),
                status: status_name(p.status()),
                cpu_percent: p.cpu_usage(),
                memory_mb: p.memory() as f64 / BYTES_PER_MB,
                create_time: start_time(p),
            })
            .collect();
        processes.sort_by_key(|p| p.pid);

        AppOperation::from_outcome(
            "list_processes",
            filter_name.map(str::to_string),
            Ok(Payload::ProcessList(ProcessList {
                count: processes.len(),
                processes,
                filter: filter_name.map(str::to_string),
            })),
        )
    }

    pub fn get_process_info(&mut self, pid: u32) -> AppOperation {
        tracing::debug!("Getting process info for PID {}", pid);
        let outcome = self.process_info_inner(pid);
        AppOperation::from_outcome("get_process_info", None, outcome)
    }

    fn process_info_inner(&mut self, pid: u32) -> Result<Payload, OperationError> {
        let key = Pid::from_u32(pid);
        if !self.system.refresh_process(key) {
            return Err(OperationError::not_found(format!(
                "Process not found: PID {}",
                pid
            )));
        }
        let p = self
            .system
            .process(key)
            .ok_or_else(|| OperationError::not_found(format!("Process not found: PID {}", pid)))?;
        if p.exe().is_none() {
            check_process_access(pid)?;
        }

        Ok(Payload::ProcessInfo(ProcessDetails {
            pid,
            name: p.name().to_string(),
            status: status_name(p.status()),
            cpu_percent: p.cpu_usage(),
            memory_mb: p.memory() as f64 / BYTES_PER_MB,
            num_threads: p.tasks().map(|t| t.len()),
            create_time: start_time(p),
            exe: p.exe().map(|e| e.to_string_lossy().into_owned()),
            cwd: p.cwd().map(|c| c.to_string_lossy().into_owned()),
            cmdline: p.cmd().join(" "),
        }))
    }

    // -- input ------------------------------------------------------------------

    /// Fail-safe check plus pacing; runs before every input call.
    async fn guard(&mut self) -> Result<(), OperationError> {
        if self.fail_safe {
            let cursor = self
                .driver
                .cursor_position()
                .await
                .map_err(|e| automation("Error reading pointer for fail-safe", e))?;
            let screen = self
                .driver
                .screen_size()
                .await
                .map_err(|e| automation("Error reading screen for fail-safe", e))?;
            if in_screen_corner(cursor, screen) {
                tracing::warn!("Fail-safe triggered at {:?}", cursor);
                return Err(OperationError::Automation(format!(
                    "Fail-safe triggered: pointer in screen corner at {:?}",
                    cursor
                )));
            }
        }

        if let Some(last) = self.last_input {
            let elapsed = last.elapsed();
            if elapsed < self.pause {
                tokio::time::sleep(self.pause - elapsed).await;
            }
        }
        Ok(())
    }

    fn mark_input(&mut self) {
        self.last_input = Some(Instant::now());
    }

    pub async fn type_text(&mut self, text: &str, interval: f64) -> AppOperation {
        tracing::info!("Typing {} characters", text.chars().count());
        let outcome = self.type_inner(text, interval).await;
        AppOperation::from_outcome("type_text", None, outcome)
    }

    async fn type_inner(&mut self, text: &str, interval: f64) -> Result<Payload, OperationError> {
        if !interval.is_finite() || interval < 0.0 {
            return Err(OperationError::validation(format!(
                "Invalid typing interval: {}",
                interval
            )));
        }
        self.guard().await?;
        let result = self.driver.type_text(text, interval).await;
        self.mark_input();
        result.map_err(|e| automation("Error typing text", e))?;
        Ok(Payload::TextTyped {
            length: text.chars().count(),
            interval,
        })
    }

    pub async fn press_key(&mut self, key: &str, presses: u32) -> AppOperation {
        tracing::info!("Pressing key {} x{}", key, presses);
        let outcome = self.press_inner(key, presses).await;
        AppOperation::from_outcome("press_key", None, outcome)
    }

    async fn press_inner(&mut self, key: &str, presses: u32) -> Result<Payload, OperationError> {
        if key.trim().is_empty() {
            return Err(OperationError::validation("Key must not be empty"));
        }
        if presses == 0 {
            return Err(OperationError::validation("presses must be at least 1"));
        }
        self.guard().await?;
        let result = self.driver.press_key(key, presses).await;
        self.mark_input();
        result.map_err(|e| automation("Error pressing key", e))?;
        Ok(Payload::KeyPressed {
            key: key.to_string(),
            presses,
        })
    }

    pub async fn click_mouse(
        &mut self,
        x: Option<i32>,
        y: Option<i32>,
        clicks: u32,
        button: MouseButton,
    ) -> AppOperation {
        tracing::info!("Clicking {} at {:?},{:?} x{}", button.as_str(), x, y, clicks);
        let outcome = self.click_inner(x, y, clicks, button).await;
        AppOperation::from_outcome("click_mouse", None, outcome)
    }

    async fn click_inner(
        &mut self,
        x: Option<i32>,
        y: Option<i32>,
        clicks: u32,
        button: MouseButton,
    ) -> Result<Payload, OperationError> {
        let position = match (x, y) {
            (Some(x), Some(y)) => Some((x, y)),
            (None, None) => None,
            _ => {
                return Err(OperationError::validation(
                    "x and y must be provided together",
                ));
            }
        };
        if clicks == 0 {
            return Err(OperationError::validation("clicks must be at least 1"));
        }
        self.guard().await?;
        let result = self.driver.click(position, clicks, button).await;
        self.mark_input();
        result.map_err(|e| automation("Error clicking mouse", e))?;
        Ok(Payload::MouseClicked {
            x,
            y,
            clicks,
            button: button.as_str().to_string(),
        })
    }

    pub async fn get_screen_size(&self) -> AppOperation {
        let outcome = self
            .driver
            .screen_size()
            .await
            .map(|(width, height)| Payload::ScreenSize { width, height })
            .map_err(|e| automation("Error getting screen size", e));
        AppOperation::from_outcome("get_screen_size", None, outcome)
    }

    pub async fn get_mouse_position(&self) -> AppOperation {
        let outcome = self
            .driver
            .cursor_position()
            .await
            .map(|(x, y)| Payload::MousePosition { x, y })
            .map_err(|e| automation("Error getting mouse position", e));
        AppOperation::from_outcome("get_mouse_position", None, outcome)
    }
}

fn automation(doing: &str, e: String) -> OperationError {
    OperationError::Automation(format!("{}: {}", doing, e))
}

fn basename(app_path: &str) -> String {
    Path::new(app_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| app_path.to_string())
}

fn spawn_error(app_path: &str, e: std::io::Error) -> OperationError {
    match e.kind() {
        std::io::ErrorKind::NotFound => {
            OperationError::not_found(format!("Application not found: {}", app_path))
        }
        std::io::ErrorKind::PermissionDenied => OperationError::PermissionDenied(format!(
            "Permission denied to launch application: {}",
            app_path
        )),
        _ => OperationError::io(format!("Error launching application {}", app_path), e),
    }
}

/// sysinfo reports an unreadable executable link as `None`; ask procfs why.
#[cfg(target_os = "linux")]
fn check_process_access(pid: u32) -> Result<(), OperationError> {
    match std::fs::read_link(format!("/proc/{}/exe", pid)) {
        Err(e) => access_error(pid, &e).map_or(Ok(()), Err),
        Ok(_) => Ok(()),
    }
}

#[cfg(not(target_os = "linux"))]
fn check_process_access(_pid: u32) -> Result<(), OperationError> {
    Ok(())
}

/// Kernel threads have no executable at all; only EACCES/EPERM count as denied.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn access_error(pid: u32, e: &std::io::Error) -> Option<OperationError> {
    (e.kind() == std::io::ErrorKind::PermissionDenied).then(|| {
        OperationError::PermissionDenied(format!("Access denied for process: PID {}", pid))
    })
}

fn status_name(status: ProcessStatus) -> String {
    status.to_string().to_lowercase()
}

fn start_time(p: &Process) -> Option<DateTime<Local>> {
    let secs = i64::try_from(p.start_time()).ok()?;
    DateTime::from_timestamp(secs, 0).map(|t| t.with_timezone(&Local))
}

/// Gone means no longer in the process table, or a zombie awaiting its reaper.
fn is_gone(system: &mut System, pid: u32) -> bool {
    let key = Pid::from_u32(pid);
    if !system.refresh_process(key) {
        return true;
    }
    matches!(
        system.process(key).map(|p| p.status()),
        None | Some(ProcessStatus::Zombie) | Some(ProcessStatus::Dead)
    )
}

#[cfg(unix)]
fn terminate(_system: &mut System, pid: u32, kill: bool) -> Result<(), OperationError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;

    // pid 0 and negative pids address process groups.
    let raw = i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| OperationError::not_found(format!("Process not found: PID {}", pid)))?;
    let sig = if kill { Signal::SIGKILL } else { Signal::SIGTERM };

    match signal::kill(NixPid::from_raw(raw), sig) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(OperationError::not_found(format!(
            "Process not found: PID {}",
            pid
        ))),
        Err(Errno::EPERM) => Err(OperationError::PermissionDenied(format!(
            "Access denied to close process: PID {}",
            pid
        ))),
        Err(e) => Err(OperationError::Internal(format!(
            "Error closing process {}: {}",
            pid, e
        ))),
    }
}

#[cfg(not(unix))]
fn terminate(system: &mut System, pid: u32, kill: bool) -> Result<(), OperationError> {
    let key = Pid::from_u32(pid);
    if !system.refresh_process(key) {
        return Err(OperationError::not_found(format!(
            "Process not found: PID {}",
            pid
        )));
    }
    let process = system
        .process(key)
        .ok_or_else(|| OperationError::not_found(format!("Process not found: PID {}", pid)))?;
    let sent = if kill {
        process.kill()
    } else {
        process
            .kill_with(sysinfo::Signal::Term)
            .unwrap_or_else(|| process.kill())
    };
    if sent {
        Ok(())
    } else {
        Err(OperationError::PermissionDenied(format!(
            "Access denied to close process: PID {}",
            pid
        )))
    }
}
