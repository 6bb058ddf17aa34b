//! # Status Command
//!
//! Human-readable host summary built from three telemetry actions.

use anyhow::Result;
use std::io::Write;

use crate::application::agent::ChildAgent;
use crate::domain::payload::Payload;
use crate::domain::types::ActionRequest;

pub async fn handle_status(agent: &mut ChildAgent, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Agent:   {} ({})", agent.name(), agent.status())?;

    for action_type in ["get_system_info", "get_cpu_info", "get_memory_info"] {
        let result = agent
            .execute_request(ActionRequest::new(action_type, action_type))
            .await;
        match result.payload {
            Some(payload) => writeln!(out, "{}", summarize(&payload))?,
            None => writeln!(
                out,
                "{}: unavailable ({})",
                action_type,
                result.error.unwrap_or_default()
            )?,
        }
    }
    Ok(())
}

fn summarize(payload: &Payload) -> String {
    match payload {
        Payload::System(s) => format!(
            "Host:    {} ({} {}, {})\nUptime:  {:.1} h",
            s.node_name, s.system, s.release, s.machine, s.uptime_hours
        ),
        Payload::Cpu(c) => format!(
            "CPU:     {} logical cores, {:.1}% busy ({})",
            c.logical_cores, c.cpu_percent, c.processor
        ),
        Payload::Memory(m) => format!(
            "Memory:  {:.1} / {:.1} GB ({:.1}%)",
            (m.total_mb - m.available_mb) / 1024.0,
            m.total_mb / 1024.0,
            m.percent
        ),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::AgentConfig;
    use crate::infrastructure::tools::input::recording::RecordingDriver;
    use std::sync::Arc;

    #[test]
    fn test_memory_summary() {
        let payload = Payload::Memory(crate::domain::payload::MemoryInfo {
            total_mb: 2048.0,
            available_mb: 1024.0,
            used_mb: 1000.0,
            percent: 50.0,
            swap_total_mb: 0.0,
            swap_used_mb: 0.0,
            swap_percent: 0.0,
        });
        assert_eq!(summarize(&payload), "Memory:  1.0 / 2.0 GB (50.0%)");
    }

    #[tokio::test]
    async fn test_status_prints_every_section() {
        let mut agent =
            ChildAgent::with_driver(AgentConfig::default(), Arc::new(RecordingDriver::new()));
        let mut out = Vec::new();
        handle_status(&mut agent, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Agent:   ChildAgent"));
        assert!(text.contains("Host:"));
        assert!(text.contains("CPU:"));
        assert!(text.contains("Memory:"));
    }
}
