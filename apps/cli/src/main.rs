use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pulse::{AppKind, ResourceKind, ServerCheck};

mod commands;
mod report;
mod tui;

/// opsmon - live health monitoring for websites, applications and servers
#[derive(Parser, Debug)]
#[command(name = "opsmon", version, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $XDG_CONFIG_HOME/opsmon/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live dashboard of every enabled resource
    Monitor(MonitorArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// Refresh interval in seconds
    #[arg(short, long)]
    refresh: Option<u64>,

    /// Check once, print the report and exit
    #[arg(short = '1', long)]
    once: bool,

    #[command(subcommand)]
    command: Option<MonitorCommand>,
}

#[derive(Subcommand, Debug)]
enum MonitorCommand {
    /// Check every enabled resource once
    Status,
    /// List configured resources, disabled ones included
    List,
    /// Add a website to the monitoring overlay
    AddWebsite {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        url: String,
        /// Expected HTTP status code
        #[arg(short, long = "status", default_value_t = 200)]
        expected_status: u16,
        /// Request timeout in seconds
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
        #[arg(short, long, default_value = "GET")]
        method: String,
    },
    /// Add an application to the monitoring overlay
    AddApp {
        #[arg(short, long)]
        name: String,
        /// docker, pm2, process, http, port or command
        #[arg(short = 't', long = "type", value_parser = parse_app_kind)]
        kind: AppKind,
        /// Container name, pm2 process name or process pattern
        #[arg(short, long, default_value = "")]
        identifier: String,
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Health endpoint path or absolute URL
        #[arg(long = "health")]
        health_endpoint: Option<String>,
        /// Command run by `command` apps
        #[arg(long)]
        command: Option<String>,
    },
    /// Add a server to the monitoring overlay
    AddServer {
        #[arg(short, long)]
        name: String,
        #[arg(short = 'H', long)]
        host: String,
        #[arg(short, long, default_value_t = 22)]
        port: u16,
        /// ping, ssh, http or port
        #[arg(short, long = "check", default_value = "ping", value_parser = parse_server_check)]
        check: ServerCheck,
    },
    /// Remove a resource from the monitoring overlay
    Remove {
        name: String,
        /// website, app or server (detected when the name is unique)
        #[arg(short = 't', long = "type")]
        kind: Option<ResourceKind>,
    },
    /// Show or update dashboard settings
    Settings {
        #[arg(short, long)]
        refresh: Option<u64>,
        #[arg(short, long)]
        failure_threshold: Option<u32>,
    },
}

fn parse_app_kind(raw: &str) -> Result<AppKind, String> {
    match AppKind::from(raw.to_string()) {
        AppKind::Other(other) => {
            Err(format!("invalid app type '{other}', expected one of: {}", AppKind::SUPPORTED.join(", ")))
        }
        kind => Ok(kind),
    }
}

fn parse_server_check(raw: &str) -> Result<ServerCheck, String> {
    match ServerCheck::from(raw.to_string()) {
        ServerCheck::Other(other) => {
            Err(format!("invalid check type '{other}', expected one of: {}", ServerCheck::SUPPORTED.join(", ")))
        }
        check => Ok(check),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = pulse::Settings::from_config(cli.config.as_deref())?;

    match cli.command {
        Command::Config => {
            print!("{settings}");
            Ok(())
        }
        Command::Monitor(args) => match args.command {
            None if !args.once => commands::dashboard(&settings, args.refresh).await,
            command => {
                logger::init_tracing();
                commands::run(&settings, command.unwrap_or(MonitorCommand::Status)).await
            }
        },
    }
}
