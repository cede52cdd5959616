//! hq - HttpQueue command-line client
//!
//! Pushes requests through a rate-limit aware queue and reports the responses.

use std::fs;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use futures::future::join_all;
use tracing::{debug, info};

use httpqueue::cli::{Cli, Command, OutputFormat, get_log_path};
use httpqueue::config::Config;
use httpqueue::{HttpQueue, HttpRequest, HttpResponse, Priority};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    info!(
        "hq loaded config: max-simultaneous-send-operations={}, retry-after={:?}",
        config.queue.max_simultaneous_send_operations, config.queue.retry_after
    );

    // Dispatch command
    match cli.command {
        Command::Send {
            url,
            count,
            priority,
            method,
            headers,
            query,
            body,
            format,
        } => {
            let template = build_request(&config, &url, &method, headers, query, body)?;
            cmd_send(&config, template, count, priority, format).await
        }
        Command::Config => cmd_config(&config),
    }
}

fn build_request(
    config: &Config,
    url: &str,
    method: &str,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<String>,
) -> Result<HttpRequest> {
    debug!(%url, %method, "build_request: called");
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    let mut request = HttpRequest::with_client(client, url, method)?
        .with_query(query)
        .with_timeout(Duration::from_millis(config.request.timeout_ms));
    for (name, value) in headers {
        request = request.with_header(&name, &value)?;
    }
    if let Some(body) = body {
        request = request.with_body(body);
    }
    Ok(request)
}

async fn cmd_send(
    config: &Config,
    template: HttpRequest,
    count: usize,
    priority: Priority,
    format: OutputFormat,
) -> Result<()> {
    debug!(%count, %priority, "cmd_send: called");
    let queue = HttpQueue::new(config.queue.clone()).context("Failed to create queue")?;

    let pending: Vec<_> = (0..count).map(|_| queue.push(template.clone(), priority)).collect();
    info!(%count, queued = queue.queue_size(), "cmd_send: requests pushed");

    let responses = join_all(pending).await;
    for (index, response) in responses.iter().enumerate() {
        match format {
            OutputFormat::Text => println!("{:>4}  {}", index + 1, describe(response)),
            OutputFormat::Json => println!("{}", serde_json::to_string(response)?),
        }
    }

    let stats = queue.stats();
    match format {
        OutputFormat::Text => {
            println!();
            println!(
                "sent {}  rate-limited {}  connection failures {}  peak in flight {}",
                stats.total_sent, stats.total_rate_limited, stats.total_connection_failures, stats.peak_in_flight
            );
        }
        OutputFormat::Json => eprintln!("{}", serde_json::to_string(&stats)?),
    }
    Ok(())
}

fn describe(response: &HttpResponse) -> String {
    if !response.connection_successful {
        return format!("{} {}", "FAILED".red().bold(), response.status_message);
    }
    let status = format!("{} {}", response.status_code, response.status_message);
    let status = if response.request_successful {
        status.green()
    } else if response.is_too_many_requests() {
        status.yellow()
    } else {
        status.red()
    };
    format!("{}  {} bytes", status, response.body.len())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
