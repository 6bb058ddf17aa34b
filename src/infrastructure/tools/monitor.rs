//! # System Monitor
//!
//! Host telemetry: CPU, memory, disks, network, OS identity, and the busiest
//! processes. Snapshots taken by `get_current_metrics` are kept in a bounded
//! rolling buffer, oldest evicted first.

use chrono::{DateTime, Local};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use sysinfo::{Disks, Networks, System};

use crate::domain::config::{MonitorConfig, ResourceThresholds};
use crate::domain::error::OperationError;
use crate::domain::payload::{
    CpuInfo, DiskUsage, InterfaceInfo, MemoryInfo, MetricsSnapshot, NetworkInfo, PartitionInfo,
    Payload, SystemInfo, ThresholdReport, TopProcess,
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub struct SystemMonitor {
    system: System,
    networks: Networks,
    history: VecDeque<MetricsSnapshot>,
    history_size: usize,
    thresholds: ResourceThresholds,
    initial_sent: u64,
    initial_recv: u64,
}

impl SystemMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        let mut system = System::new();
        // Primes the counters so the first real sample has a baseline.
        system.refresh_cpu();
        let networks = Networks::new_with_refreshed_list();
        let (initial_sent, initial_recv) = network_totals(&networks);

        tracing::info!(
            "SystemMonitor initialized (history_size={})",
            config.history_size
        );
        Self {
            system,
            networks,
            history: VecDeque::with_capacity(config.history_size),
            history_size: config.history_size.max(1),
            thresholds: config.thresholds,
            initial_sent,
            initial_recv,
        }
    }

    pub fn thresholds(&self) -> ResourceThresholds {
        self.thresholds
    }

    async fn sample_cpu(&mut self) {
        self.system.refresh_cpu();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        self.system.refresh_cpu();
    }

    pub async fn get_cpu_info(&mut self) -> Result<Payload, OperationError> {
        self.sample_cpu().await;
        let cpus = self.system.cpus();
        let first = cpus.first();
        let (min_freq_mhz, max_freq_mhz) = frequency_bounds();

        Ok(Payload::Cpu(CpuInfo {
            physical_cores: self.system.physical_core_count(),
            logical_cores: cpus.len(),
            current_freq_mhz: first.map(|c| c.frequency()).filter(|f| *f > 0),
            min_freq_mhz,
            max_freq_mhz,
            cpu_percent: self.system.global_cpu_info().cpu_usage(),
            per_cpu_percent: cpus.iter().map(|c| c.cpu_usage()).collect(),
            architecture: System::cpu_arch(),
            processor: first.map(|c| c.brand().trim().to_string()).unwrap_or_default(),
        }))
    }

    pub fn get_memory_info(&mut self) -> Result<Payload, OperationError> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        Ok(Payload::Memory(MemoryInfo {
            total_mb: total as f64 / BYTES_PER_MB,
            available_mb: available as f64 / BYTES_PER_MB,
            used_mb: self.system.used_memory() as f64 / BYTES_PER_MB,
            percent: percent(total.saturating_sub(available), total),
            swap_total_mb: swap_total as f64 / BYTES_PER_MB,
            swap_used_mb: swap_used as f64 / BYTES_PER_MB,
            swap_percent: percent(swap_used, swap_total),
        }))
    }

    pub fn get_disk_info(&self, path: &str) -> Result<Payload, OperationError> {
        disk_usage(Path::new(path)).map(Payload::Disk)
    }

    pub fn get_all_disks_info(&self) -> Result<Payload, OperationError> {
        let disks = Disks::new_with_refreshed_list();
        let disks = disks
            .iter()
            .map(|d| {
                let total = d.total_space();
                let used = total.saturating_sub(d.available_space());
                PartitionInfo {
                    device: d.name().to_string_lossy().into_owned(),
                    mountpoint: d.mount_point().to_string_lossy().into_owned(),
                    fstype: d.file_system().to_string_lossy().into_owned(),
                    total_gb: total as f64 / BYTES_PER_GB,
                    used_gb: used as f64 / BYTES_PER_GB,
                    free_gb: d.available_space() as f64 / BYTES_PER_GB,
                    percent: percent(used, total),
                }
            })
            .collect();
        Ok(Payload::Disks { disks })
    }

    pub fn get_network_info(&mut self) -> Result<Payload, OperationError> {
        self.networks.refresh();
        let (sent, recv) = network_totals(&self.networks);
        let (mut packets_sent, mut packets_recv, mut errors_in, mut errors_out) = (0, 0, 0, 0);
        for (_, data) in self.networks.iter() {
            packets_sent += data.total_packets_transmitted();
            packets_recv += data.total_packets_received();
            errors_in += data.total_errors_on_received();
            errors_out += data.total_errors_on_transmitted();
        }

        Ok(Payload::Network(NetworkInfo {
            bytes_sent_mb: sent as f64 / BYTES_PER_MB,
            bytes_recv_mb: recv as f64 / BYTES_PER_MB,
            packets_sent,
            packets_recv,
            errors_in,
            errors_out,
            session_sent_mb: sent.saturating_sub(self.initial_sent) as f64 / BYTES_PER_MB,
            session_recv_mb: recv.saturating_sub(self.initial_recv) as f64 / BYTES_PER_MB,
        }))
    }

    pub fn get_network_interfaces(&mut self) -> Result<Payload, OperationError> {
        self.networks.refresh_list();
        let interfaces: BTreeMap<String, InterfaceInfo> = self
            .networks
            .iter()
            .map(|(name, data)| {
                let (is_up, speed_mbps) = link_state(name);
                (
                    name.clone(),
                    InterfaceInfo {
                        mac_address: data.mac_address().to_string(),
                        is_up,
                        speed_mbps,
                    },
                )
            })
            .collect();
        Ok(Payload::NetworkInterfaces { interfaces })
    }

    pub fn get_system_info(&self) -> Result<Payload, OperationError> {
        let uptime = System::uptime();
        let boot_time = i64::try_from(System::boot_time())
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|t| t.with_timezone(&Local));

        Ok(Payload::System(SystemInfo {
            system: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            node_name: System::host_name().unwrap_or_default(),
            release: System::kernel_version().unwrap_or_default(),
            version: System::long_os_version()
                .or_else(System::os_version)
                .unwrap_or_default(),
            machine: System::cpu_arch().unwrap_or_else(|| std::env::consts::ARCH.to_string()),
            boot_time,
            uptime_seconds: uptime,
            uptime_hours: uptime as f64 / 3600.0,
        }))
    }

    /// Captures a snapshot and appends it to the rolling buffer.
    pub async fn get_current_metrics(&mut self) -> Result<MetricsSnapshot, OperationError> {
        self.sample_cpu().await;
        self.system.refresh_memory();
        self.networks.refresh();

        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let disk = disk_usage(root_path())?;
        let (sent, recv) = network_totals(&self.networks);

        let snapshot = MetricsSnapshot {
            timestamp: Local::now(),
            cpu_percent: f64::from(self.system.global_cpu_info().cpu_usage()),
            memory_percent: percent(total.saturating_sub(available), total),
            disk_percent: disk.percent,
            network_sent_mb: sent as f64 / BYTES_PER_MB,
            network_recv_mb: recv as f64 / BYTES_PER_MB,
        };
        self.record(snapshot.clone());
        Ok(snapshot)
    }

    fn record(&mut self, snapshot: MetricsSnapshot) {
        self.history.push_back(snapshot);
        while self.history.len() > self.history_size {
            self.history.pop_front();
        }
    }

    /// Most recent `limit` snapshots, oldest first. `None` returns all of them.
    pub fn get_metrics_history(&self, limit: Option<usize>) -> Vec<MetricsSnapshot> {
        let skip = limit.map_or(0, |n| self.history.len().saturating_sub(n));
        self.history.iter().skip(skip).cloned().collect()
    }

    pub async fn get_top_processes(
        &mut self,
        limit: usize,
        sort_by: &str,
    ) -> Result<Payload, OperationError> {
        // CPU usage is a delta, so it needs two samples.
        self.system.refresh_processes();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        self.system.refresh_processes();
        self.system.refresh_memory();
        let total = self.system.total_memory();

        let mut processes: Vec<TopProcess> = self
            .system
            .processes()
            .iter()
            .map(|(pid, p)| TopProcess {
                pid: pid.as_u32(),
                name: p.name().to_string(),
                cpu_percent: p.cpu_usage(),
                memory_percent: percent(p.memory(), total),
                memory_mb: p.memory() as f64 / BYTES_PER_MB,
            })
            .collect();

        match sort_by {
            "cpu" => processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent)),
            "memory" => processes.sort_by(|a, b| b.memory_percent.total_cmp(&a.memory_percent)),
            _ => processes.sort_by_key(|p| p.pid),
        }
        processes.truncate(limit);
        Ok(Payload::TopProcesses { processes })
    }

    pub async fn check_resource_thresholds(
        &mut self,
        cpu: Option<f64>,
        memory: Option<f64>,
        disk: Option<f64>,
    ) -> Result<Payload, OperationError> {
        let metrics = self.get_current_metrics().await?;
        let report = evaluate_thresholds(
            metrics,
            cpu.unwrap_or(self.thresholds.cpu_percent),
            memory.unwrap_or(self.thresholds.memory_percent),
            disk.unwrap_or(self.thresholds.disk_percent),
        );
        if !report.all_ok {
            tracing::warn!("Resource thresholds exceeded: {:?}", report.alerts);
        }
        Ok(Payload::Thresholds(report))
    }
}

/// Compares a snapshot against thresholds. A value equal to its threshold is ok.
pub fn evaluate_thresholds(
    metrics: MetricsSnapshot,
    cpu_threshold: f64,
    memory_threshold: f64,
    disk_threshold: f64,
) -> ThresholdReport {
    let cpu_ok = metrics.cpu_percent <= cpu_threshold;
    let memory_ok = metrics.memory_percent <= memory_threshold;
    let disk_ok = metrics.disk_percent <= disk_threshold;

    let mut alerts = Vec::new();
    if !cpu_ok {
        alerts.push(format!(
            "CPU usage high: {:.1}% (threshold: {}%)",
            metrics.cpu_percent, cpu_threshold
        ));
    }
    if !memory_ok {
        alerts.push(format!(
            "Memory usage high: {:.1}% (threshold: {}%)",
            metrics.memory_percent, memory_threshold
        ));
    }
    if !disk_ok {
        alerts.push(format!(
            "Disk usage high: {:.1}% (threshold: {}%)",
            metrics.disk_percent, disk_threshold
        ));
    }

    ThresholdReport {
        cpu_ok,
        memory_ok,
        disk_ok,
        all_ok: cpu_ok && memory_ok && disk_ok,
        alerts,
        metrics,
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn root_path() -> &'static Path {
    if cfg!(windows) {
        Path::new("C:\\")
    } else {
        Path::new("/")
    }
}

fn network_totals(networks: &Networks) -> (u64, u64) {
    networks.iter().fold((0, 0), |(sent, recv), (_, data)| {
        (
            sent + data.total_transmitted(),
            recv + data.total_received(),
        )
    })
}

fn existing(path: &Path) -> Result<PathBuf, OperationError> {
    path.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            OperationError::not_found(format!("Path does not exist: {}", path.display()))
        }
        _ => OperationError::io(format!("Cannot resolve {}", path.display()), e),
    })
}

#[cfg(unix)]
fn disk_usage(path: &Path) -> Result<DiskUsage, OperationError> {
    let resolved = existing(path)?;
    let stat = nix::sys::statvfs::statvfs(&resolved).map_err(|e| {
        OperationError::io(
            format!("Cannot read disk usage for {}", path.display()),
            std::io::Error::from(e),
        )
    })?;

    let block = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * block;
    let free = stat.blocks_available() as u64 * block;
    let used = total.saturating_sub(stat.blocks_free() as u64 * block);

    Ok(DiskUsage {
        path: path.display().to_string(),
        total_gb: total as f64 / BYTES_PER_GB,
        used_gb: used as f64 / BYTES_PER_GB,
        free_gb: free as f64 / BYTES_PER_GB,
        // Matches `df`: reserved blocks count as neither used nor available.
        percent: percent(used, used + free),
    })
}

#[cfg(not(unix))]
fn disk_usage(path: &Path) -> Result<DiskUsage, OperationError> {
    let resolved = existing(path)?;
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .iter()
        .filter(|d| resolved.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .ok_or_else(|| {
            OperationError::not_found(format!("No disk found for path: {}", path.display()))
        })?;

    let total = disk.total_space();
    let free = disk.available_space();
    let used = total.saturating_sub(free);
    Ok(DiskUsage {
        path: path.display().to_string(),
        total_gb: total as f64 / BYTES_PER_GB,
        used_gb: used as f64 / BYTES_PER_GB,
        free_gb: free as f64 / BYTES_PER_GB,
        percent: percent(used, total),
    })
}

#[cfg(target_os = "linux")]
fn frequency_bounds() -> (Option<u64>, Option<u64>) {
    let read_khz = |file: &str| {
        std::fs::read_to_string(format!("/sys/devices/system/cpu/cpu0/cpufreq/{}", file))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|khz| khz / 1000)
    };
    (read_khz("cpuinfo_min_freq"), read_khz("cpuinfo_max_freq"))
}

#[cfg(not(target_os = "linux"))]
fn frequency_bounds() -> (Option<u64>, Option<u64>) {
    (None, None)
}

/// Link state and speed in Mbit/s, where the OS exposes them.
#[cfg(target_os = "linux")]
fn link_state(interface: &str) -> (Option<bool>, Option<u64>) {
    let base = Path::new("/sys/class/net").join(interface);
    let is_up = std::fs::read_to_string(base.join("operstate"))
        .ok()
        .map(|s| matches!(s.trim(), "up" | "unknown"));
    // Virtual interfaces report -1 or fail to read.
    let speed = std::fs::read_to_string(base.join("speed"))
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|s| u64::try_from(s).ok());
    (is_up, speed)
}

#[cfg(not(target_os = "linux"))]
fn link_state(_interface: &str) -> (Option<bool>, Option<u64>) {
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu: f64, memory: f64, disk: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Local::now(),
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            network_sent_mb: 0.0,
            network_recv_mb: 0.0,
        }
    }

    fn monitor(history_size: usize) -> SystemMonitor {
        SystemMonitor::new(&MonitorConfig {
            history_size,
            ..MonitorConfig::default()
        })
    }

    #[test]
    fn test_cpu_alert_only() {
        let report = evaluate_thresholds(snapshot(95.0, 50.0, 50.0), 80.0, 80.0, 90.0);
        assert!(!report.cpu_ok);
        assert!(report.memory_ok);
        assert!(report.disk_ok);
        assert!(!report.all_ok);
        assert_eq!(report.alerts.len(), 1);
        assert!(report.alerts[0].starts_with("CPU usage high: 95.0%"));
    }

    #[test]
    fn test_equal_to_threshold_is_ok() {
        let report = evaluate_thresholds(snapshot(80.0, 75.0, 90.0), 80.0, 75.0, 90.0);
        assert!(report.all_ok);
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn test_every_breach_alerts() {
        let report = evaluate_thresholds(snapshot(99.0, 99.0, 99.0), 10.0, 10.0, 10.0);
        assert_eq!(report.alerts.len(), 3);
        assert!(report.alerts[1].starts_with("Memory usage high"));
        assert!(report.alerts[2].starts_with("Disk usage high"));
    }

    #[test]
    fn test_history_is_bounded_oldest_first() {
        let mut monitor = monitor(3);
        for i in 0..5 {
            monitor.record(snapshot(i as f64, 0.0, 0.0));
        }
        let all = monitor.get_metrics_history(None);
        let cpus: Vec<f64> = all.iter().map(|s| s.cpu_percent).collect();
        assert_eq!(cpus, vec![2.0, 3.0, 4.0]);

        let last = monitor.get_metrics_history(Some(1));
        assert_eq!(last[0].cpu_percent, 4.0);
        assert_eq!(monitor.get_metrics_history(Some(10)).len(), 3);
    }

    #[tokio::test]
    async fn test_current_metrics_are_recorded() {
        let mut monitor = monitor(10);
        let snap = monitor.get_current_metrics().await.unwrap();
        assert!((0.0..=100.0).contains(&snap.memory_percent));
        assert!((0.0..=100.0).contains(&snap.disk_percent));
        assert_eq!(monitor.get_metrics_history(None), vec![snap]);
    }

    #[tokio::test]
    async fn test_thresholds_at_hundred_never_alert() {
        let mut monitor = monitor(10);
        // Nothing can exceed 100%.
        let payload = monitor
            .check_resource_thresholds(Some(100.0), Some(100.0), Some(100.0))
            .await
            .unwrap();
        match payload {
            Payload::Thresholds(report) => assert!(report.all_ok),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_memory_and_system_info() {
        let mut monitor = monitor(10);
        match monitor.get_memory_info().unwrap() {
            Payload::Memory(m) => {
                assert!(m.total_mb > 0.0);
                assert!((0.0..=100.0).contains(&m.percent));
            }
            other => panic!("unexpected {:?}", other),
        }
        match monitor.get_system_info().unwrap() {
            Payload::System(info) => {
                assert!(!info.machine.is_empty());
                assert!((info.uptime_hours * 3600.0 - info.uptime_seconds as f64).abs() < 1.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cpu_info() {
        let mut monitor = monitor(10);
        match monitor.get_cpu_info().await.unwrap() {
            Payload::Cpu(cpu) => {
                assert!(cpu.logical_cores >= 1);
                assert_eq!(cpu.per_cpu_percent.len(), cpu.logical_cores);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_disk_info() {
        let monitor = monitor(10);
        match monitor.get_disk_info(".").unwrap() {
            Payload::Disk(d) => {
                assert!(d.total_gb > 0.0);
                assert!((0.0..=100.0).contains(&d.percent));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = monitor
            .get_disk_info("/definitely/not/here")
            .unwrap_err();
        assert!(err.to_string().starts_with("Path does not exist"));
    }

    #[tokio::test]
    async fn test_top_processes_limit_and_order() {
        let mut monitor = monitor(10);
        match monitor.get_top_processes(3, "memory").await.unwrap() {
            Payload::TopProcesses { processes } => {
                assert!(processes.len() <= 3);
                assert!(
                    processes
                        .windows(2)
                        .all(|w| w[0].memory_percent >= w[1].memory_percent)
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
