use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use pulse::{
    AppConfig, HealthChecker, OverlaySettings, OverlayStore, Resolver, ResourceKind, ResourceSet, ServerConfig,
    Settings, StatusProducer, WebsiteConfig,
};
use tracing::info;

use crate::MonitorCommand;
use crate::report;
use crate::tui;

const LOG_FILE: &str = "opsmon.log";

fn producer(settings: &Settings, resolver: Resolver) -> Result<StatusProducer> {
    let checker = HealthChecker::from_settings(&settings.monitor)?;
    Ok(StatusProducer::new(Arc::new(resolver), checker))
}

/// Flag first, then the overlay settings block, then `config.toml`
fn refresh_interval(flag: Option<u64>, overlay: Option<OverlaySettings>, settings: &Settings) -> Duration {
    let secs = flag
        .or_else(|| overlay.map(|stored| stored.refresh_interval))
        .unwrap_or(settings.monitor.refresh_interval);
    Duration::from_secs(secs.max(1))
}

/// Live terminal dashboard until `q`, `Esc` or `Ctrl+C`
pub async fn dashboard(settings: &Settings, refresh: Option<u64>) -> Result<()> {
    let stores_dir = settings.stores_dir()?;
    logger::init_to_file(&stores_dir.join(LOG_FILE))?;

    let resolver = Resolver::from_settings(settings)?;
    if resolver.list_all().is_empty() {
        print!("{}", report::empty_hint());
        return Ok(());
    }

    let interval = refresh_interval(refresh, resolver.overlay().stored_settings(), settings);
    info!(interval_secs = interval.as_secs(), stores = %stores_dir.display(), "starting dashboard");
    tui::run(producer(settings, resolver)?, interval).await
}

pub async fn run(settings: &Settings, command: MonitorCommand) -> Result<()> {
    let resolver = Resolver::from_settings(settings)?;

    match command {
        MonitorCommand::Status => status(settings, resolver).await,
        MonitorCommand::List => {
            print!("{}", report::render_listing(&resolver.list_all()));
            Ok(())
        }
        MonitorCommand::AddWebsite { name, url, expected_status, timeout, method } => {
            let mut website = WebsiteConfig::new(name, url);
            website.expected_status = expected_status;
            website.timeout = timeout;
            website.method = method.to_ascii_uppercase();
            resolver.overlay().add_website(website.clone())?;

            println!("Website '{}' added.", website.name);
            println!("  URL: {} {}", website.method, website.url);
            println!("  Expected: HTTP {}", website.expected_status);
            println!("  Timeout: {}s", website.timeout);
            Ok(())
        }
        MonitorCommand::AddApp { name, kind, identifier, host, port, health_endpoint, command } => {
            let mut app = AppConfig::new(name, kind, identifier);
            app.host = host;
            app.port = port;
            app.health_endpoint = health_endpoint;
            app.command = command;
            resolver.overlay().add_app(app.clone())?;

            println!("Application '{}' added.", app.name);
            println!("  Type: {}", app.kind);
            if !app.identifier.is_empty() {
                println!("  Identifier: {}", app.identifier);
            }
            if let Some(host) = &app.host {
                println!("  Host: {host}");
            }
            if let Some(port) = app.port {
                println!("  Port: {port}");
            }
            Ok(())
        }
        MonitorCommand::AddServer { name, host, port, check } => {
            let mut server = ServerConfig::new(name, host);
            server.port = port;
            server.check_type = check;
            resolver.overlay().add_server(server.clone())?;

            println!("Server '{}' added.", server.name);
            println!("  Host: {}:{}", server.host, server.port);
            println!("  Check: {}", server.check_type);
            Ok(())
        }
        MonitorCommand::Remove { name, kind } => {
            let kind = remove(resolver.overlay(), &name, kind)?;
            println!("Removed {kind} '{name}'.");
            Ok(())
        }
        MonitorCommand::Settings { refresh, failure_threshold } => {
            let overlay = resolver.overlay();
            let current = if refresh.is_none() && failure_threshold.is_none() {
                overlay.settings()
            } else {
                let updated = overlay.update_settings(refresh, failure_threshold)?;
                println!("Settings updated.");
                updated
            };
            print!("{}", report::render_settings(&current));
            Ok(())
        }
    }
}

/// Single check of every enabled resource
async fn status(settings: &Settings, resolver: Resolver) -> Result<()> {
    if resolver.list_all().is_empty() {
        print!("{}", report::empty_hint());
        return Ok(());
    }

    let refresh = producer(settings, resolver)?.refresh().await?;
    print!("{}", report::render_report(&refresh.report, &refresh.summary));
    Ok(())
}

fn detect_kind(overlay: &ResourceSet, name: &str) -> Result<ResourceKind> {
    let found: Vec<ResourceKind> = overlay
        .descriptors()
        .iter()
        .filter(|descriptor| descriptor.name() == name)
        .map(|descriptor| descriptor.kind())
        .collect();

    match found.as_slice() {
        [] => bail!("resource '{name}' not found in the monitoring overlay"),
        [kind] => Ok(*kind),
        kinds => {
            let kinds: Vec<String> = kinds.iter().map(ToString::to_string).collect();
            bail!("multiple resources named '{name}' found ({}), pass --type", kinds.join(", "))
        }
    }
}

fn remove(overlay: &OverlayStore, name: &str, kind: Option<ResourceKind>) -> Result<ResourceKind> {
    let kind = match kind {
        Some(kind) => kind,
        None => detect_kind(&overlay.load(), name)?,
    };
    overlay.remove(kind, name)?;
    Ok(kind)
}
