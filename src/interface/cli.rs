//! # Command Line
//!
//! Argument definitions for the `deckhand` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "deckhand", version, about = "Local child agent for file, process, input and telemetry actions")]
pub struct Cli {
    /// Path to config.yaml (defaults to the platform config dir)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the agent's capabilities as JSON
    Capabilities,

    /// Execute a single action and print its result as JSON
    Exec {
        /// Action type, e.g. `read_file`
        action_type: String,

        /// Parameters as a JSON object
        #[arg(long, short, default_value = "{}")]
        params: String,

        #[arg(long, default_value_t = 0)]
        priority: u8,
    },

    /// Execute a JSON array of action requests in order, one result per line
    Run {
        file: PathBuf,
    },

    /// Print a short system summary
    Status,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("deckhand").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec() {
        let cli = Cli::parse_from([
            "deckhand",
            "--config",
            "/tmp/agent.yaml",
            "exec",
            "read_file",
            "--params",
            r#"{"file_path": "/tmp/x"}"#,
            "--priority",
            "3",
        ]);
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/agent.yaml"));
        match cli.command {
            Command::Exec {
                action_type,
                params,
                priority,
            } => {
                assert_eq!(action_type, "read_file");
                assert!(params.contains("file_path"));
                assert_eq!(priority, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exec_defaults() {
        let cli = Cli::parse_from(["deckhand", "exec", "get_cpu_info"]);
        match cli.command {
            Command::Exec { params, priority, .. } => {
                assert_eq!(params, "{}");
                assert_eq!(priority, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_config_after_subcommand() {
        let cli = Cli::parse_from(["deckhand", "status", "-c", "agent.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("agent.yaml")));
        assert!(matches!(cli.command, Command::Status));
    }
}
