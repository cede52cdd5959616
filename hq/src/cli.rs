//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::Priority;

/// hq - push requests through a rate-limit aware queue
#[derive(Parser)]
#[command(
    name = "hq",
    about = "Send HTTP requests through a self-regulating, rate-limit aware queue",
    version,
    after_help = after_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Push copies of a request through the queue and print each response
    Send {
        /// Target URL
        url: String,

        /// How many copies of the request to push
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Queue priority (first, prioritary, normal)
        #[arg(short, long, default_value = "normal")]
        priority: Priority,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra header as NAME:VALUE (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Query parameter as KEY=VALUE (repeatable)
        #[arg(short, long = "query", value_parser = parse_query)]
        query: Vec<(String, String)>,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Parse a NAME:VALUE header argument
pub fn parse_header(s: &str) -> Result<(String, String), String> {
    debug!(%s, "parse_header: called");
    match s.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.trim().to_string())),
        _ => Err(format!("Invalid header '{}', expected NAME:VALUE", s)),
    }
}

/// Parse a KEY=VALUE query argument
pub fn parse_query(s: &str) -> Result<(String, String), String> {
    debug!(%s, "parse_query: called");
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid query parameter '{}', expected KEY=VALUE", s)),
    }
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("httpqueue")
        .join("logs")
        .join("httpqueue.log");
    debug!(?path, "get_log_path: returning path");
    path
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}

/// Output format for responses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
