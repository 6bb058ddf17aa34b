//! # Domain Types
//!
//! Actions, results, and the per-facade operation records.
//! An `ActionRequest` is what a planner sends over the wire; it is decoded once
//! into a typed `Action` and never looked at as a string again.

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::OperationError;
use crate::domain::payload::Payload;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Error,
    Stopped,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

fn default_encoding() -> String {
    "utf-8".to_string()
}
fn default_true() -> bool {
    true
}
fn default_pattern() -> String {
    "*".to_string()
}
fn default_interval() -> f64 {
    0.05
}
fn default_one() -> u32 {
    1
}
fn default_disk_path() -> String {
    "/".to_string()
}
fn default_top_limit() -> usize {
    10
}
fn default_sort_by() -> String {
    "cpu".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReadFileParams {
    pub file_path: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WriteFileParams {
    pub file_path: String,
    pub content: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeleteFileParams {
    pub file_path: String,
    /// Must be explicitly `true`; a missing flag refuses the delete.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ListDirectoryParams {
    pub dir_path: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileInfoParams {
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LaunchAppParams {
    pub app_path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CloseAppParams {
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ListProcessesParams {
    #[serde(default)]
    pub filter_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProcessInfoParams {
    pub pid: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TypeTextParams {
    pub text: String,
    /// Seconds between keystrokes.
    #[serde(default = "default_interval")]
    pub interval: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PressKeyParams {
    pub key: String,
    #[serde(default = "default_one")]
    pub presses: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Middle => "middle",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClickMouseParams {
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default = "default_one")]
    pub clicks: u32,
    #[serde(default)]
    pub button: MouseButton,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiskInfoParams {
    #[serde(default = "default_disk_path")]
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsHistoryParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TopProcessesParams {
    #[serde(default = "default_top_limit")]
    pub limit: usize,
    /// `cpu` or `memory`; anything else keeps enumeration order.
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
}

/// Missing thresholds fall back to the configured ones.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdParams {
    #[serde(default)]
    pub cpu_threshold: Option<f64>,
    #[serde(default)]
    pub memory_threshold: Option<f64>,
    #[serde(default)]
    pub disk_threshold: Option<f64>,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// One variant per operation in the catalogue.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    ReadFile(ReadFileParams),
    WriteFile(WriteFileParams),
    DeleteFile(DeleteFileParams),
    ListDirectory(ListDirectoryParams),
    GetFileInfo(FileInfoParams),

    LaunchApp(LaunchAppParams),
    CloseApp(CloseAppParams),
    ListProcesses(ListProcessesParams),
    GetProcessInfo(ProcessInfoParams),
    TypeText(TypeTextParams),
    PressKey(PressKeyParams),
    ClickMouse(ClickMouseParams),
    GetScreenSize,
    GetMousePosition,

    GetCpuInfo,
    GetMemoryInfo,
    GetDiskInfo(DiskInfoParams),
    GetAllDisksInfo,
    GetNetworkInfo,
    GetNetworkInterfaces,
    GetSystemInfo,
    GetCurrentMetrics,
    GetMetricsHistory(MetricsHistoryParams),
    GetTopProcesses(TopProcessesParams),
    CheckResourceThresholds(ThresholdParams),
}

pub const FILE_OPERATIONS: &[&str] = &[
    "read_file",
    "write_file",
    "delete_file",
    "list_directory",
    "get_file_info",
];

pub const APPLICATION_OPERATIONS: &[&str] = &[
    "launch_app",
    "close_app",
    "list_processes",
    "get_process_info",
    "type_text",
    "press_key",
    "click_mouse",
    "get_screen_size",
    "get_mouse_position",
];

pub const SYSTEM_MONITORING: &[&str] = &[
    "get_cpu_info",
    "get_memory_info",
    "get_disk_info",
    "get_all_disks_info",
    "get_network_info",
    "get_network_interfaces",
    "get_system_info",
    "get_current_metrics",
    "get_metrics_history",
    "get_top_processes",
    "check_resource_thresholds",
];

/// Why an `ActionRequest` could not become an `Action`.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    UnknownType(String),
    InvalidParameters { action_type: String, reason: String },
    InvalidPriority(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "Unknown action type: {}", t),
            Self::InvalidParameters {
                action_type,
                reason,
            } => write!(f, "Invalid parameters for {}: {}", action_type, reason),
            Self::InvalidPriority(p) => {
                write!(f, "Priority must be between 0 and 10, got {}", p)
            }
        }
    }
}

fn params<T: DeserializeOwned>(
    action_type: &str,
    value: serde_json::Value,
) -> Result<T, DecodeError> {
    // A planner may send `null` for "no parameters".
    let value = if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| DecodeError::InvalidParameters {
        action_type: action_type.to_string(),
        reason: e.to_string(),
    })
}

impl ActionKind {
    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile(_) => "read_file",
            Self::WriteFile(_) => "write_file",
            Self::DeleteFile(_) => "delete_file",
            Self::ListDirectory(_) => "list_directory",
            Self::GetFileInfo(_) => "get_file_info",
            Self::LaunchApp(_) => "launch_app",
            Self::CloseApp(_) => "close_app",
            Self::ListProcesses(_) => "list_processes",
            Self::GetProcessInfo(_) => "get_process_info",
            Self::TypeText(_) => "type_text",
            Self::PressKey(_) => "press_key",
            Self::ClickMouse(_) => "click_mouse",
            Self::GetScreenSize => "get_screen_size",
            Self::GetMousePosition => "get_mouse_position",
            Self::GetCpuInfo => "get_cpu_info",
            Self::GetMemoryInfo => "get_memory_info",
            Self::GetDiskInfo(_) => "get_disk_info",
            Self::GetAllDisksInfo => "get_all_disks_info",
            Self::GetNetworkInfo => "get_network_info",
            Self::GetNetworkInterfaces => "get_network_interfaces",
            Self::GetSystemInfo => "get_system_info",
            Self::GetCurrentMetrics => "get_current_metrics",
            Self::GetMetricsHistory(_) => "get_metrics_history",
            Self::GetTopProcesses(_) => "get_top_processes",
            Self::CheckResourceThresholds(_) => "check_resource_thresholds",
        }
    }

    /// Decodes a wire `type` + `parameters` pair.
    pub fn decode(action_type: &str, parameters: serde_json::Value) -> Result<Self, DecodeError> {
        let t = action_type;
        let p = parameters;
        let kind = match t {
            "read_file" => Self::ReadFile(params(t, p)?),
            "write_file" => Self::WriteFile(params(t, p)?),
            "delete_file" => Self::DeleteFile(params(t, p)?),
            "list_directory" => Self::ListDirectory(params(t, p)?),
            "get_file_info" => Self::GetFileInfo(params(t, p)?),
            "launch_app" => Self::LaunchApp(params(t, p)?),
            "close_app" => Self::CloseApp(params(t, p)?),
            "list_processes" => Self::ListProcesses(params(t, p)?),
            "get_process_info" => Self::GetProcessInfo(params(t, p)?),
            "type_text" => Self::TypeText(params(t, p)?),
            "press_key" => Self::PressKey(params(t, p)?),
            "click_mouse" => Self::ClickMouse(params(t, p)?),
            "get_screen_size" => Self::GetScreenSize,
            "get_mouse_position" => Self::GetMousePosition,
            "get_cpu_info" => Self::GetCpuInfo,
            "get_memory_info" => Self::GetMemoryInfo,
            "get_disk_info" => Self::GetDiskInfo(params(t, p)?),
            "get_all_disks_info" => Self::GetAllDisksInfo,
            "get_network_info" => Self::GetNetworkInfo,
            "get_network_interfaces" => Self::GetNetworkInterfaces,
            "get_system_info" => Self::GetSystemInfo,
            "get_current_metrics" => Self::GetCurrentMetrics,
            "get_metrics_history" => Self::GetMetricsHistory(params(t, p)?),
            "get_top_processes" => Self::GetTopProcesses(params(t, p)?),
            "check_resource_thresholds" => Self::CheckResourceThresholds(params(t, p)?),
            other => return Err(DecodeError::UnknownType(other.to_string())),
        };
        Ok(kind)
    }
}

/// Untyped request as emitted by a planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    #[serde(alias = "action_id")]
    pub id: String,
    #[serde(rename = "type", alias = "action_type")]
    pub action_type: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub priority: u8,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action_type: action_type.into(),
            parameters: serde_json::Value::Object(Default::default()),
            priority: 0,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// A validated, typed request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    id: String,
    kind: ActionKind,
    priority: u8,
    created_at: DateTime<Local>,
}

pub const MAX_PRIORITY: u8 = 10;

impl Action {
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            priority: 0,
            created_at: Local::now(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Result<Self, DecodeError> {
        if priority > MAX_PRIORITY {
            return Err(DecodeError::InvalidPriority(priority));
        }
        self.priority = priority;
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

impl TryFrom<ActionRequest> for Action {
    type Error = DecodeError;

    fn try_from(request: ActionRequest) -> Result<Self, Self::Error> {
        let kind = ActionKind::decode(&request.action_type, request.parameters)?;
        Action::new(request.id, kind).with_priority(request.priority)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The normalized outcome of one action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub action_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
    /// Seconds.
    pub execution_time: f64,
}

impl ActionResult {
    pub fn success(action_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            action_id: action_id.into(),
            success: true,
            payload: Some(payload),
            error: None,
            timestamp: Local::now(),
            execution_time: 0.0,
        }
    }

    pub fn failure(action_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            success: false,
            payload: None,
            error: Some(error.into()),
            timestamp: Local::now(),
            execution_time: 0.0,
        }
    }
}

/// Record returned by every file operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileOperation {
    pub operation: &'static str,
    pub path: String,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
    pub metadata: Option<Payload>,
}

impl FileOperation {
    pub fn from_outcome(
        operation: &'static str,
        path: impl Into<String>,
        outcome: Result<Payload, OperationError>,
    ) -> Self {
        let path = path.into();
        match outcome {
            Ok(payload) => Self {
                operation,
                path,
                success: true,
                error: None,
                timestamp: Local::now(),
                metadata: Some(payload),
            },
            Err(e) => {
                tracing::error!("File {} failed ({}): {}", operation, e.category(), e);
                Self {
                    operation,
                    path,
                    success: false,
                    error: Some(e.to_string()),
                    timestamp: Local::now(),
                    metadata: None,
                }
            }
        }
    }
}

/// Record returned by every process and automation operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppOperation {
    pub operation: &'static str,
    pub app_name: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
    pub metadata: Option<Payload>,
}

impl AppOperation {
    pub fn from_outcome(
        operation: &'static str,
        app_name: Option<String>,
        outcome: Result<Payload, OperationError>,
    ) -> Self {
        match outcome {
            Ok(payload) => Self::completed(operation, app_name, true, None, Some(payload)),
            Err(e) => {
                tracing::error!("App {} failed ({}): {}", operation, e.category(), e);
                Self::completed(operation, app_name, false, Some(e.to_string()), None)
            }
        }
    }

    /// For outcomes that carry metadata even when unsuccessful (a non-zero exit).
    pub fn completed(
        operation: &'static str,
        app_name: Option<String>,
        success: bool,
        error: Option<String>,
        metadata: Option<Payload>,
    ) -> Self {
        Self {
            operation,
            app_name,
            success,
            error,
            timestamp: Local::now(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_typed_parameters() {
        let kind = ActionKind::decode(
            "write_file",
            json!({"file_path": "/tmp/a.txt", "content": "hi"}),
        )
        .unwrap();
        match kind {
            ActionKind::WriteFile(p) => {
                assert_eq!(p.file_path, "/tmp/a.txt");
                assert_eq!(p.encoding, "utf-8");
                assert!(p.create_dirs);
                assert!(!p.overwrite);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = ActionKind::decode("erase_disk", json!({})).unwrap_err();
        assert_eq!(err, DecodeError::UnknownType("erase_disk".into()));
        assert!(err.to_string().to_lowercase().contains("unknown action type"));
    }

    #[test]
    fn test_decode_rejects_unknown_and_missing_fields() {
        let err = ActionKind::decode("read_file", json!({"path": "/tmp/x"})).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidParameters { .. }));

        let err = ActionKind::decode("get_process_info", json!({})).unwrap_err();
        assert!(err.to_string().contains("get_process_info"));
    }

    #[test]
    fn test_delete_confirmation_defaults_to_false() {
        let kind = ActionKind::decode("delete_file", json!({"file_path": "/tmp/x"})).unwrap();
        assert_eq!(
            kind,
            ActionKind::DeleteFile(DeleteFileParams {
                file_path: "/tmp/x".into(),
                confirm: false,
            })
        );
    }

    #[test]
    fn test_null_parameters_use_defaults() {
        let kind = ActionKind::decode("get_top_processes", serde_json::Value::Null).unwrap();
        match kind {
            ActionKind::GetTopProcesses(p) => {
                assert_eq!(p.limit, 10);
                assert_eq!(p.sort_by, "cpu");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_catalogue_names_round_trip() {
        let all = FILE_OPERATIONS
            .iter()
            .chain(APPLICATION_OPERATIONS)
            .chain(SYSTEM_MONITORING);
        for name in all {
            // Only the parameter-free variants decode from an empty object;
            // the rest must at least be recognised.
            match ActionKind::decode(name, json!({})) {
                Ok(kind) => assert_eq!(kind.name(), *name),
                Err(DecodeError::InvalidParameters { action_type, .. }) => {
                    assert_eq!(action_type, *name)
                }
                Err(other) => panic!("{} not recognised: {}", name, other),
            }
        }
    }

    #[test]
    fn test_request_priority_bounds() {
        let request = ActionRequest::new("a1", "get_cpu_info").with_priority(11);
        let err = Action::try_from(request).unwrap_err();
        assert_eq!(err, DecodeError::InvalidPriority(11));

        let request = ActionRequest::new("a2", "get_cpu_info").with_priority(10);
        let action = Action::try_from(request).unwrap();
        assert_eq!(action.priority(), 10);
        assert_eq!(action.id(), "a2");
    }

    #[test]
    fn test_request_accepts_legacy_field_names() {
        let request: ActionRequest = serde_json::from_value(json!({
            "action_id": "x1",
            "action_type": "get_system_info",
        }))
        .unwrap();
        assert_eq!(request.id, "x1");
        assert_eq!(request.action_type, "get_system_info");
        assert_eq!(request.priority, 0);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AgentStatus::Idle).unwrap(), "\"idle\"");
        assert_eq!(AgentStatus::Stopped.to_string(), "stopped");
    }
}
