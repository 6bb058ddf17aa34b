//! # Action Commands
//!
//! `capabilities`, `exec` and `run`: thin wrappers that feed requests to the
//! agent and print results as JSON.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::application::agent::ChildAgent;
use crate::domain::types::{ActionRequest, ActionResult};

fn print_result(out: &mut impl Write, result: &ActionResult) -> Result<()> {
    let line = serde_json::to_string(result).context("Failed to serialize result")?;
    writeln!(out, "{}", line)?;
    Ok(())
}

pub fn handle_capabilities(agent: &ChildAgent, out: &mut impl Write) -> Result<()> {
    let caps = serde_json::to_string_pretty(&agent.capabilities())?;
    writeln!(out, "{}", caps)?;
    Ok(())
}

/// Returns whether the action succeeded.
pub async fn handle_exec(
    agent: &mut ChildAgent,
    action_type: &str,
    params: &str,
    priority: u8,
    out: &mut impl Write,
) -> Result<bool> {
    let parameters: serde_json::Value =
        serde_json::from_str(params).context("--params must be a JSON object")?;
    let request = ActionRequest::new("cli-1", action_type)
        .with_parameters(parameters)
        .with_priority(priority);

    let result = agent.execute_request(request).await;
    print_result(out, &result)?;
    Ok(result.success)
}

/// Runs every request in `file` in order. Returns the number of failures.
pub async fn handle_run(agent: &mut ChildAgent, file: &Path, out: &mut impl Write) -> Result<usize> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let requests: Vec<ActionRequest> = serde_json::from_str(&content)
        .with_context(|| format!("{} must hold a JSON array of action requests", file.display()))?;

    tracing::info!("Running {} actions from {}", requests.len(), file.display());
    let mut failures = 0;
    for request in requests {
        let result = agent.execute_request(request).await;
        if !result.success {
            failures += 1;
        }
        print_result(out, &result)?;
    }
    Ok(failures)
}
