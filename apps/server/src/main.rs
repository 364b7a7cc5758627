#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::net::SocketAddr;

use actix_web::{App, HttpServer, web};
use pulse::Settings;
use tracing::info;

mod error;
mod routes;
mod state;

use error::AppError;
use logger::init_tracing;
use state::AppState;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut settings = Settings::from_config(env::var_os("OPSMON_CONFIG"))?;
    if let Ok(bind) = env::var("OPSMON_BIND") {
        settings.server.bind = bind;
    }
    if let Ok(port) = env::var("OPSMON_PORT") {
        settings.server.port = port.parse()?;
    }

    let addr: SocketAddr = format!("{}:{}", settings.server.bind, settings.server.port).parse()?;
    run_server(addr, settings).await
}

async fn run_server(addr: SocketAddr, settings: Settings) -> Result<(), AppError> {
    let state = web::Data::new(AppState::new(settings)?);
    let shutdown = state.shutdown.clone();

    // streams never finish on their own, so end them as soon as shutdown starts
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    info!(%addr, "starting opsmon server");
    let app_state = state.clone();
    HttpServer::new(move || App::new().app_data(app_state.clone()).configure(routes::routes))
        .shutdown_timeout(5)
        .bind(addr)?
        .run()
        .await?;

    shutdown.cancel();
    info!("opsmon server stopped");
    Ok(())
}
