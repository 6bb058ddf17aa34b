//! # Child Agent
//!
//! The action dispatcher. Owns the agent status, the bounded action history,
//! and the three facades; routes each action to exactly one facade and
//! normalises whatever comes back into an `ActionResult`.
//!
//! `execute` takes `&mut self`, so one agent runs one action at a time. Hosts
//! that need to share an agent wrap it in a `SharedAgent`.

use anyhow::{Result, anyhow};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::application::history::ActionHistory;
use crate::domain::config::AgentConfig;
use crate::domain::error::OperationError;
use crate::domain::payload::Payload;
use crate::domain::traits::InputDriver;
use crate::domain::types::{
    APPLICATION_OPERATIONS, Action, ActionKind, ActionRequest, ActionResult, AgentStatus,
    AppOperation, DecodeError, FILE_OPERATIONS, FileOperation, SYSTEM_MONITORING,
};
use crate::infrastructure::tools::files::FileManager;
use crate::infrastructure::tools::input::XdotoolDriver;
use crate::infrastructure::tools::monitor::SystemMonitor;
use crate::infrastructure::tools::processes::AppController;

pub type SharedAgent = Arc<Mutex<ChildAgent>>;

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: &'static str,
    pub status: AgentStatus,
    pub safety_checks_enabled: bool,
    pub capabilities: CapabilityGroups,
    pub total_actions_executed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityGroups {
    pub file_operations: &'static [&'static str],
    pub application_operations: &'static [&'static str],
    pub system_monitoring: &'static [&'static str],
}

/// What a facade produced, before timing and bookkeeping.
struct Outcome {
    success: bool,
    payload: Option<Payload>,
    error: Option<String>,
}

impl Outcome {
    fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    fn from_parts(success: bool, metadata: Option<Payload>, error: Option<String>) -> Self {
        if success {
            Self {
                success,
                payload: metadata,
                error: None,
            }
        } else {
            Self {
                success,
                payload: None,
                error: error.or_else(|| Some("Operation failed".to_string())),
            }
        }
    }

    fn into_result(self, action_id: &str) -> ActionResult {
        match (self.success, self.payload) {
            (true, Some(payload)) => ActionResult::success(action_id, payload),
            (true, None) => ActionResult::failure(action_id, "Operation returned no data"),
            (false, _) => ActionResult::failure(
                action_id,
                self.error.unwrap_or_else(|| "Operation failed".to_string()),
            ),
        }
    }
}

impl From<FileOperation> for Outcome {
    fn from(op: FileOperation) -> Self {
        Self::from_parts(op.success, op.metadata, op.error)
    }
}

impl From<AppOperation> for Outcome {
    fn from(op: AppOperation) -> Self {
        Self::from_parts(op.success, op.metadata, op.error)
    }
}

/// Telemetry queries report their own failures; they do not fail the agent.
fn telemetry(outcome: Result<Payload, OperationError>) -> Outcome {
    match outcome {
        Ok(payload) => Outcome::ok(payload),
        Err(e) => {
            tracing::error!("Telemetry query failed ({}): {}", e.category(), e);
            Outcome::from_parts(false, None, Some(e.to_string()))
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

pub struct ChildAgent {
    config: AgentConfig,
    status: AgentStatus,
    history: ActionHistory,
    executed: u64,
    files: FileManager,
    apps: AppController,
    monitor: SystemMonitor,
}

impl ChildAgent {
    /// Agent driving real input through xdotool.
    pub fn new(config: AgentConfig) -> Self {
        Self::with_driver(config, Arc::new(XdotoolDriver::default()))
    }

    pub fn with_driver(config: AgentConfig, driver: Arc<dyn InputDriver>) -> Self {
        let files = FileManager::from_config(&config.files);
        let apps = AppController::new(&config.processes, &config.automation, driver);
        let monitor = SystemMonitor::new(&config.monitor);
        let history = ActionHistory::new(config.agent.max_action_history);

        tracing::info!("Child agent '{}' created", config.agent.name);
        Self {
            config,
            status: AgentStatus::Idle,
            history,
            executed: 0,
            files,
            apps,
            monitor,
        }
    }

    pub fn into_shared(self) -> SharedAgent {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.config.agent.name
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Takes a baseline snapshot, which also warms the CPU counters.
    pub async fn initialize(&mut self) -> Result<()> {
        tracing::info!("Initializing child agent '{}'", self.config.agent.name);
        match self.monitor.get_current_metrics().await {
            Ok(snapshot) => {
                tracing::debug!("Baseline metrics: {:?}", snapshot);
                self.status = AgentStatus::Idle;
                tracing::info!("Child agent initialized");
                Ok(())
            }
            Err(e) => {
                self.status = AgentStatus::Error;
                tracing::error!("Failed to initialize child agent: {}", e);
                Err(anyhow!("Failed to initialize child agent: {}", e))
            }
        }
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if self.status != AgentStatus::Stopped {
            tracing::info!("Shutting down child agent '{}'", self.config.agent.name);
            self.status = AgentStatus::Stopped;
        }
        Ok(())
    }

    /// Decodes a wire request and executes it.
    pub async fn execute_request(&mut self, request: ActionRequest) -> ActionResult {
        let id = request.id.clone();
        match Action::try_from(request) {
            Ok(action) => self.execute(action).await,
            Err(DecodeError::UnknownType(t)) => {
                tracing::warn!("Rejected action {}: unknown type {}", id, t);
                ActionResult::failure(id, DecodeError::UnknownType(t).to_string())
            }
            Err(e) => {
                tracing::warn!("Rejected action {}: {}", id, e);
                let result = ActionResult::failure(id, e.to_string());
                self.record(result.clone());
                result
            }
        }
    }

    pub async fn execute(&mut self, action: Action) -> ActionResult {
        if self.status == AgentStatus::Stopped {
            tracing::warn!("Refusing action {}: agent is stopped", action.id());
            return ActionResult::failure(action.id(), "Agent is stopped");
        }

        tracing::info!(
            "Executing action {} ({}, priority {})",
            action.id(),
            action.kind().name(),
            action.priority()
        );
        self.status = AgentStatus::Running;
        let started = Instant::now();

        let routed = AssertUnwindSafe(self.route(action.kind()))
            .catch_unwind()
            .await;

        let (mut result, failed) = match routed {
            Ok(Ok(outcome)) => (outcome.into_result(action.id()), false),
            Ok(Err(e)) => {
                tracing::error!("Error executing action {}: {}", action.id(), e);
                let msg = format!("Error executing action: {}", e);
                (ActionResult::failure(action.id(), msg), true)
            }
            Err(panic) => {
                let msg = panic_message(panic);
                tracing::error!("Action {} panicked: {}", action.id(), msg);
                let msg = format!("Error executing action: {}", msg);
                (ActionResult::failure(action.id(), msg), true)
            }
        };
        result.execution_time = started.elapsed().as_secs_f64();

        self.record(result.clone());
        self.status = if failed {
            AgentStatus::Error
        } else {
            AgentStatus::Idle
        };

        tracing::info!(
            "Action {} finished: success={} in {:.3}s",
            result.action_id,
            result.success,
            result.execution_time
        );
        result
    }

    fn record(&mut self, result: ActionResult) {
        self.executed += 1;
        self.history.push(result);
    }

    async fn route(&mut self, kind: &ActionKind) -> Result<Outcome, OperationError> {
        let outcome: Outcome = match kind {
            ActionKind::ReadFile(p) => self.files.read_file(&p.file_path, &p.encoding).await.into(),
            ActionKind::WriteFile(p) => self
                .files
                .write_file(
                    &p.file_path,
                    &p.content,
                    &p.encoding,
                    p.create_dirs,
                    p.overwrite,
                )
                .await
                .into(),
            ActionKind::DeleteFile(p) => self.files.delete_file(&p.file_path, p.confirm).await.into(),
            ActionKind::ListDirectory(p) => {
                self.files.list_directory(&p.dir_path, &p.pattern).await.into()
            }
            ActionKind::GetFileInfo(p) => self.files.get_file_info(&p.file_path).await.into(),

            ActionKind::LaunchApp(p) => self.apps.launch_app(&p.app_path, &p.args, p.wait).await.into(),
            ActionKind::CloseApp(p) => self
                .apps
                .close_app(p.pid, p.app_name.as_deref(), p.force)
                .await
                .into(),
            ActionKind::ListProcesses(p) => {
                self.apps.list_processes(p.filter_name.as_deref()).into()
            }
            ActionKind::GetProcessInfo(p) => self.apps.get_process_info(p.pid).into(),
            ActionKind::TypeText(p) => self.apps.type_text(&p.text, p.interval).await.into(),
            ActionKind::PressKey(p) => self.apps.press_key(&p.key, p.presses).await.into(),
            ActionKind::ClickMouse(p) => self
                .apps
                .click_mouse(p.x, p.y, p.clicks, p.button)
                .await
                .into(),
            ActionKind::GetScreenSize => self.apps.get_screen_size().await.into(),
            ActionKind::GetMousePosition => self.apps.get_mouse_position().await.into(),

            ActionKind::GetCpuInfo => telemetry(self.monitor.get_cpu_info().await),
            ActionKind::GetMemoryInfo => telemetry(self.monitor.get_memory_info()),
            ActionKind::GetDiskInfo(p) => telemetry(self.monitor.get_disk_info(&p.path)),
            ActionKind::GetAllDisksInfo => telemetry(self.monitor.get_all_disks_info()),
            ActionKind::GetNetworkInfo => telemetry(self.monitor.get_network_info()),
            ActionKind::GetNetworkInterfaces => telemetry(self.monitor.get_network_interfaces()),
            ActionKind::GetSystemInfo => telemetry(self.monitor.get_system_info()),
            // A snapshot that cannot be taken means the host view is broken.
            ActionKind::GetCurrentMetrics => {
                Outcome::ok(Payload::Metrics(self.monitor.get_current_metrics().await?))
            }
            ActionKind::GetMetricsHistory(p) => Outcome::ok(Payload::MetricsHistory {
                snapshots: self.monitor.get_metrics_history(p.limit),
            }),
            ActionKind::GetTopProcesses(p) => {
                telemetry(self.monitor.get_top_processes(p.limit, &p.sort_by).await)
            }
            ActionKind::CheckResourceThresholds(p) => Outcome::ok(
                self.monitor
                    .check_resource_thresholds(p.cpu_threshold, p.memory_threshold, p.disk_threshold)
                    .await?,
            ),
        };
        Ok(outcome)
    }

    /// The most recent `limit` results, oldest first.
    pub fn history(&self, limit: usize) -> Vec<ActionResult> {
        self.history.recent(limit)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: self.config.agent.name.clone(),
            agent_type: "child_agent",
            status: self.status,
            safety_checks_enabled: self.config.agent.enable_safety_checks,
            capabilities: CapabilityGroups {
                file_operations: FILE_OPERATIONS,
                application_operations: APPLICATION_OPERATIONS,
                system_monitoring: SYSTEM_MONITORING,
            },
            total_actions_executed: self.executed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::MouseButton;
    use crate::infrastructure::tools::input::recording::RecordingDriver;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    fn agent_for(dir: &TempDir) -> ChildAgent {
        let mut config = AgentConfig::default();
        config.files.allowed_paths = vec![dir.path().to_str().unwrap().to_string()];
        config.automation.pause_ms = 0;
        ChildAgent::with_driver(config, Arc::new(RecordingDriver::new()))
    }

    fn request(id: &str, action_type: &str, params: serde_json::Value) -> ActionRequest {
        ActionRequest::new(id, action_type).with_parameters(params)
    }

    #[tokio::test]
    async fn test_unknown_action_type() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = agent_for(&temp_dir);

        let result = agent
            .execute_request(request("a1", "erase_disk", json!({})))
            .await;
        assert!(!result.success);
        assert!(
            result
                .error
                .unwrap()
                .to_lowercase()
                .contains("unknown action type")
        );
        assert_ne!(agent.status(), AgentStatus::Error);
        assert!(agent.history(10).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = agent_for(&temp_dir);

        let result = agent
            .execute_request(request("a1", "read_file", json!({"path": "/tmp/x"})))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid parameters for read_file"));
        assert_eq!(agent.status(), AgentStatus::Idle);
        assert_eq!(agent.history(10).len(), 1);

        let result = agent
            .execute_request(ActionRequest::new("a2", "get_system_info").with_priority(42))
            .await;
        assert!(result.error.unwrap().contains("Priority must be between 0 and 10"));
    }

    #[tokio::test]
    async fn test_write_and_read_through_dispatcher() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = agent_for(&temp_dir);
        let file = temp_dir.path().join("out.txt");
        let file = file.to_str().unwrap();

        let written = agent
            .execute_request(request(
                "w1",
                "write_file",
                json!({"file_path": file, "content": "payload", "overwrite": true}),
            ))
            .await;
        assert!(written.success, "{:?}", written.error);
        assert!(written.execution_time >= 0.0);

        let read = agent
            .execute_request(request("r1", "read_file", json!({"file_path": file})))
            .await;
        match read.payload {
            Some(Payload::FileContent(c)) => assert_eq!(c.content, "payload"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(agent.status(), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_failures_carry_no_payload() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = agent_for(&temp_dir);
        let missing = temp_dir.path().join("missing.txt");

        let result = agent
            .execute_request(request(
                "d1",
                "delete_file",
                json!({"file_path": missing.to_str().unwrap(), "confirm": true}),
            ))
            .await;
        assert!(!result.success);
        assert!(result.payload.is_none());
        assert!(result.error.unwrap().contains("does not exist"));
        // A failed operation is not an agent failure.
        assert_eq!(agent.status(), AgentStatus::Idle);
        assert_eq!(agent.history(10).len(), 1);
    }

    #[tokio::test]
    async fn test_close_by_name_without_launch() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = agent_for(&temp_dir);
        let result = agent
            .execute_request(request("c1", "close_app", json!({"app_name": "ghost"})))
            .await;
        assert!(result.error.unwrap().to_lowercase().contains("no pid found"));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = AgentConfig::default();
        config.files.allowed_paths = vec![temp_dir.path().to_str().unwrap().to_string()];
        config.agent.max_action_history = 4;
        let mut agent = ChildAgent::with_driver(config, Arc::new(RecordingDriver::new()));

        for i in 0..9 {
            let id = format!("m{}", i);
            agent
                .execute_request(request(&id, "get_metrics_history", json!({})))
                .await;
        }
        let history = agent.history(100);
        assert!(history.len() <= 4);
        assert_eq!(history.last().unwrap().action_id, "m8");
        assert_eq!(agent.capabilities().total_actions_executed, 9);
    }

    #[tokio::test]
    async fn test_input_actions_use_driver() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = agent_for(&temp_dir);
        let result = agent
            .execute_request(request(
                "k1",
                "click_mouse",
                json!({"x": 10, "y": 10, "button": "middle"}),
            ))
            .await;
        match result.payload {
            Some(Payload::MouseClicked { button, clicks, .. }) => {
                assert_eq!(button, MouseButton::Middle.as_str());
                assert_eq!(clicks, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shared_agent_serialises_callers() {
        let temp_dir = TempDir::new().unwrap();
        let shared = agent_for(&temp_dir).into_shared();

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let agent = shared.clone();
                tokio::spawn(async move {
                    let id = format!("s{}", i);
                    agent
                        .lock()
                        .await
                        .execute_request(request(&id, "get_metrics_history", json!({})))
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }
        assert_eq!(shared.lock().await.history(10).len(), 3);
    }

    struct PanickingDriver;

    #[async_trait]
    impl InputDriver for PanickingDriver {
        async fn type_text(&self, _text: &str, _interval_secs: f64) -> Result<(), String> {
            panic!("keyboard exploded")
        }
        async fn press_key(&self, _key: &str, _presses: u32) -> Result<(), String> {
            Ok(())
        }
        async fn click(
            &self,
            _position: Option<(i32, i32)>,
            _clicks: u32,
            _button: MouseButton,
        ) -> Result<(), String> {
            Ok(())
        }
        async fn screen_size(&self) -> Result<(u32, u32), String> {
            Ok((100, 100))
        }
        async fn cursor_position(&self) -> Result<(i32, i32), String> {
            Ok((50, 50))
        }
    }

    #[tokio::test]
    async fn test_panic_sets_error_status() {
        let mut config = AgentConfig::default();
        config.automation.pause_ms = 0;
        let mut agent = ChildAgent::with_driver(config, Arc::new(PanickingDriver));

        let result = agent
            .execute_request(request("p1", "type_text", json!({"text": "boom"})))
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Error executing action: keyboard exploded")
        );
        assert_eq!(agent.status(), AgentStatus::Error);
        assert_eq!(agent.history(1)[0].action_id, "p1");

        // The next clean action brings the agent back to idle.
        let result = agent
            .execute_request(request("p2", "press_key", json!({"key": "a"})))
            .await;
        assert!(result.success);
        assert_eq!(agent.status(), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_lifecycle_and_capabilities() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = agent_for(&temp_dir);

        agent.initialize().await.unwrap();
        assert_eq!(agent.status(), AgentStatus::Idle);

        let result = agent
            .execute_request(request("h1", "get_metrics_history", json!({"limit": 5})))
            .await;
        match result.payload {
            Some(Payload::MetricsHistory { snapshots }) => assert_eq!(snapshots.len(), 1),
            other => panic!("unexpected {:?}", other),
        }

        let caps = serde_json::to_value(agent.capabilities()).unwrap();
        assert_eq!(caps["type"], "child_agent");
        assert_eq!(caps["name"], "ChildAgent");
        assert_eq!(caps["status"], "idle");
        assert_eq!(caps["safety_checks_enabled"], true);
        assert_eq!(caps["capabilities"]["file_operations"].as_array().unwrap().len(), 5);

        agent.shutdown().await.unwrap();
        agent.shutdown().await.unwrap();
        assert_eq!(agent.status(), AgentStatus::Stopped);

        let result = agent
            .execute_request(request("late", "get_system_info", json!({})))
            .await;
        assert_eq!(result.error.as_deref(), Some("Agent is stopped"));
    }
}
