//! # Payloads
//!
//! Structured data returned by successful operations, as one tagged union keyed
//! by `kind`. Callers match on the variant instead of probing a loose map.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    FileContent(FileContent),
    FileWritten(WriteSummary),
    FileDeleted { size_bytes: u64 },
    DirectoryListing(DirectoryListing),
    FileInfo(FileInfo),

    AppLaunched { pid: u32, command: String },
    AppCompleted(CompletedProcess),
    AppClosed { pid: u32, forced: bool, escalated: bool },
    ProcessList(ProcessList),
    ProcessInfo(ProcessDetails),
    TextTyped { length: usize, interval: f64 },
    KeyPressed { key: String, presses: u32 },
    MouseClicked {
        x: Option<i32>,
        y: Option<i32>,
        clicks: u32,
        button: String,
    },
    ScreenSize { width: u32, height: u32 },
    MousePosition { x: i32, y: i32 },

    Cpu(CpuInfo),
    Memory(MemoryInfo),
    Disk(DiskUsage),
    Disks { disks: Vec<PartitionInfo> },
    Network(NetworkInfo),
    NetworkInterfaces { interfaces: BTreeMap<String, InterfaceInfo> },
    System(SystemInfo),
    Metrics(MetricsSnapshot),
    MetricsHistory { snapshots: Vec<MetricsSnapshot> },
    TopProcesses { processes: Vec<TopProcess> },
    Thresholds(ThresholdReport),
}

// -- files ------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileContent {
    pub content: String,
    pub size_bytes: u64,
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteSummary {
    pub size_bytes: u64,
    pub encoding: String,
    /// An existing file was replaced.
    pub overwritten: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryListing {
    pub files: Vec<FileEntry>,
    pub count: usize,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_file: bool,
    pub is_dir: bool,
    pub size_bytes: Option<u64>,
    pub modified: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub is_file: bool,
    pub is_dir: bool,
    pub size_bytes: u64,
    pub created: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    pub accessed: Option<DateTime<Local>>,
}

// -- processes ----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedProcess {
    /// `None` when the process was killed by a signal.
    pub returncode: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessList {
    pub processes: Vec<ProcessSummary>,
    pub count: usize,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessSummary {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub create_time: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessDetails {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub num_threads: Option<usize>,
    pub create_time: Option<DateTime<Local>>,
    /// `None` when the OS does not expose it to this user.
    pub exe: Option<String>,
    pub cwd: Option<String>,
    pub cmdline: String,
}

// -- telemetry ----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuInfo {
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub current_freq_mhz: Option<u64>,
    pub min_freq_mhz: Option<u64>,
    pub max_freq_mhz: Option<u64>,
    pub cpu_percent: f32,
    pub per_cpu_percent: Vec<f32>,
    pub architecture: Option<String>,
    pub processor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryInfo {
    pub total_mb: f64,
    pub available_mb: f64,
    pub used_mb: f64,
    pub percent: f64,
    pub swap_total_mb: f64,
    pub swap_used_mb: f64,
    pub swap_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiskUsage {
    pub path: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartitionInfo {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkInfo {
    pub bytes_sent_mb: f64,
    pub bytes_recv_mb: f64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
    /// Traffic since the monitor was created.
    pub session_sent_mb: f64,
    pub session_recv_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceInfo {
    pub mac_address: String,
    pub is_up: Option<bool>,
    pub speed_mbps: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemInfo {
    pub system: String,
    pub node_name: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub boot_time: Option<DateTime<Local>>,
    pub uptime_seconds: u64,
    pub uptime_hours: f64,
}

/// One point-in-time capture. Immutable once taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Local>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network_sent_mb: f64,
    pub network_recv_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopProcess {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f64,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdReport {
    pub cpu_ok: bool,
    pub memory_ok: bool,
    pub disk_ok: bool,
    pub all_ok: bool,
    pub alerts: Vec<String>,
    pub metrics: MetricsSnapshot,
}
