//! Aegis API gateway server.
//!
//! Binds the data plane (catch-all proxy) and the admin plane (read-only
//! snapshots, health, reload) on separate listeners, then runs until a
//! shutdown signal. Exit codes: 0 on clean shutdown, 1 on configuration or
//! bind errors.

use aegis_rs::config::{loader, reload, validation::ConfigValidator};
use aegis_rs::logs::logger::configure_logger;
use aegis_rs::routes::{admin, gateway, health, AppState};
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use log::{error, info, warn};
use tokio::signal;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let config_path = loader::config_path();
    let settings = match loader::load_settings_from(&config_path) {
        Ok(settings) => settings,
        Err(err) => {
            error!("failed to load configuration: {}", err);
            std::process::exit(1);
        }
    };

    let report = ConfigValidator::validate_comprehensive(&settings);
    for warning in &report.warnings {
        warn!("config warning: {}", warning);
    }
    if !report.is_valid {
        error!("configuration validation failed:");
        for err in &report.errors {
            error!("  - {}", err);
        }
        std::process::exit(1);
    }

    info!(
        "starting aegis-gateway v{} with {} routes",
        env!("CARGO_PKG_VERSION"),
        settings.routes.len()
    );

    let listener = settings.listener.clone();
    let admin_listener = settings.admin.clone();

    let state = match AppState::new(settings, config_path) {
        Ok(state) => state,
        Err(err) => {
            error!("failed to build gateway runtime: {}", err);
            std::process::exit(1);
        }
    };

    let _watcher = reload::spawn_watcher(state.clone());

    let data_state = state.clone();
    let data_plane = HttpServer::new(move || {
        let state = data_state.clone();
        App::new()
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .configure(move |cfg| gateway::configure_gateway(cfg, state))
    })
    .bind((listener.host.as_str(), listener.port));
    let data_plane = match data_plane {
        Ok(server) => server.run(),
        Err(err) => {
            error!(
                "failed to bind listener {}:{}: {}",
                listener.host, listener.port, err
            );
            std::process::exit(1);
        }
    };

    let admin_state = state.clone();
    let admin_plane = HttpServer::new(move || {
        let state = admin_state.clone();
        App::new()
            .configure(health::configure_health)
            .configure(move |cfg| admin::configure_admin(cfg, state))
    })
    .bind((admin_listener.host.as_str(), admin_listener.port));
    let admin_plane = match admin_plane {
        Ok(server) => server.run(),
        Err(err) => {
            error!(
                "failed to bind admin listener {}:{}: {}",
                admin_listener.host, admin_listener.port, err
            );
            std::process::exit(1);
        }
    };

    info!(
        "listening on {}:{} (admin on {}:{})",
        listener.host, listener.port, admin_listener.host, admin_listener.port
    );

    tokio::select! {
        result = data_plane => {
            match result {
                Ok(_) => info!("listener stopped"),
                Err(err) => error!("listener error: {}", err),
            }
        }
        result = admin_plane => {
            match result {
                Ok(_) => info!("admin listener stopped"),
                Err(err) => error!("admin listener error: {}", err),
            }
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received, draining");
        }
    }

    state.grpc.close_all();
    info!("shutdown complete");
    Ok(())
}
