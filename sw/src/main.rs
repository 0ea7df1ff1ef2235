//! swu - worker update coordinator
//!
//! CLI entry point for running coordinator scenarios against the simulated host.

use std::fs;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use swupdate::cli::{Cli, Command, OutputFormat, get_log_path};
use swupdate::config::Config;
use swupdate::events::CoordinatorEvent;
use swupdate::scenario::{Scenario, ScenarioReport};

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let log_path = get_log_path();
    let log_file = log_path
        .parent()
        .map(fs::create_dir_all)
        .transpose()
        .ok()
        .and_then(|_| fs::File::create(&log_path).ok());

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init(),
        None => tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init(),
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(script_url = %config.coordinator.script_url, "swu loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Simulate {
            scenario,
            script_url,
            no_rearm,
            format,
        } => cmd_simulate(config, scenario, script_url, no_rearm, format).await,
        Command::Scenarios => cmd_scenarios(),
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_simulate(
    config: Config,
    scenario: Scenario,
    script_url: Option<String>,
    no_rearm: bool,
    format: OutputFormat,
) -> Result<()> {
    debug!(%scenario, ?script_url, no_rearm, %format, "cmd_simulate: called");
    let mut coordinator = config.coordinator;
    if let Some(url) = script_url {
        coordinator.script_url = url;
    }
    if no_rearm {
        coordinator.rearm_on_update = false;
    }

    let report = scenario.run(&coordinator).await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &ScenarioReport) {
    println!("{} {}", "Scenario:".bold(), report.scenario.to_string().cyan());
    println!("  {}", report.scenario.description().dimmed());
    println!();

    for event in &report.events {
        println!("  {} {}", colored_type(event), event.summary());
    }
    println!();

    println!("{} {}", "Outcome:".bold(), report.outcome);
    println!("  Messages sent: {}", report.messages_sent);
    println!("  Reloads: {}", report.reloads);
}

fn colored_type(event: &CoordinatorEvent) -> ColoredString {
    let label = format!("{:<20}", event.event_type());
    match event {
        CoordinatorEvent::RegistrationFailed { .. } | CoordinatorEvent::ControlMessageFailed { .. } => label.red(),
        CoordinatorEvent::WatchAbandoned { .. }
        | CoordinatorEvent::WatchBypassed { .. }
        | CoordinatorEvent::Unsupported { .. }
        | CoordinatorEvent::ReloadSuppressed { .. } => label.yellow(),
        CoordinatorEvent::ControlMessageSent { .. } | CoordinatorEvent::Reloaded { .. } => label.green(),
        _ => label.normal(),
    }
}

fn cmd_scenarios() -> Result<()> {
    debug!("cmd_scenarios: called");
    for scenario in Scenario::ALL {
        println!("{:<26} {}", scenario.name().cyan(), scenario.description());
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", config.to_yaml()?);
    Ok(())
}
