//! # Unit Orchestrator Demo
//!
//! Boots a small application made of three core units and two user plugins:
//!
//! - **Trace** (core, priority 1000): default entry only, with an uninstall hook.
//! - **Router** (core): provides the `router` capability, mounts routes on `load-router`.
//! - **Serve** (core): optionally uses a router, starts listening on `load-serve`,
//!   closes on `stop`.
//! - **Audit** (user): default entry only, so it runs during user activation.
//! - **Metrics** (user): contract on `router`, bound to `ready`.
//!
//! Try disabling the router in `CONFIG` (`"Router": { "enabled": false }`): Serve
//! still loads because its dependency is optional, while Metrics is skipped.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use unit_orchestrator::catalog::{StaticConfig, StaticRegistry, UnitMetadata};
use unit_orchestrator::lifecycle::tracing::setup_tracing;
use unit_orchestrator::lifecycle::EventBus;
use unit_orchestrator::model::{Application, Capability, Dependency, Phase, Unit, UnitOptions};
use unit_orchestrator::{Orchestrator, OrchestratorError, UnitError};

const CONFIG: &str = r#"{
    "server": { "port": 3000 },
    "plugin": {
        "list": ["Audit"],
        "config": {
            "Audit": { "level": "verbose" },
            "Metrics": { "priority": 5 }
        }
    }
}"#;

struct Trace;

#[async_trait]
impl Unit for Trace {
    async fn run(&self, _options: &UnitOptions, app: &Application) -> Result<(), UnitError> {
        app.set("tracer", json!({ "sampling": 1.0 }));
        info!("Tracer installed");
        Ok(())
    }

    async fn uninstall(&self, app: &Application) -> Result<(), UnitError> {
        app.remove("tracer");
        info!("Tracer removed");
        Ok(())
    }
}

struct Router;

#[async_trait]
impl Unit for Router {
    async fn handle(&self, _phase: Phase, handler: &str, app: &Application) -> Result<(), UnitError> {
        match handler {
            "mount" => {
                app.set("router", json!({ "routes": ["/health", "/users"] }));
                info!("Routes mounted");
                Ok(())
            }
            other => Err(UnitError::UnknownHandler(other.to_string())),
        }
    }
}

struct Serve;

#[async_trait]
impl Unit for Serve {
    async fn handle(&self, _phase: Phase, handler: &str, app: &Application) -> Result<(), UnitError> {
        match handler {
            "listen" => {
                let port = app
                    .config_store()
                    .get_key("server", "port")
                    .and_then(|p| p.as_u64())
                    .unwrap_or(8080);
                if !app.contains("router") {
                    warn!("No router mounted, serving 404 for every request");
                }
                app.set("server", json!({ "port": port }));
                info!(port, "Server listening");
                Ok(())
            }
            "close" => {
                app.remove("server");
                info!("Server closed");
                Ok(())
            }
            other => Err(UnitError::UnknownHandler(other.to_string())),
        }
    }
}

struct Audit;

#[async_trait]
impl Unit for Audit {
    async fn run(&self, options: &UnitOptions, _app: &Application) -> Result<(), UnitError> {
        let level = options.get("level").and_then(|v| v.as_str()).unwrap_or("normal");
        info!(level, "Audit log opened");
        Ok(())
    }
}

struct Metrics;

#[async_trait]
impl Unit for Metrics {
    async fn handle(&self, _phase: Phase, handler: &str, app: &Application) -> Result<(), UnitError> {
        match handler {
            "expose" => {
                app.set("metrics", json!("/metrics"));
                info!("Metrics endpoint exposed");
                Ok(())
            }
            other => Err(UnitError::UnknownHandler(other.to_string())),
        }
    }
}

/// The host application's own phase handlers.
struct Host;

#[async_trait]
impl Unit for Host {
    async fn handle(&self, phase: Phase, _handler: &str, app: &Application) -> Result<(), UnitError> {
        info!(%phase, app = app.name(), "Application started");
        Ok(())
    }
}

fn registry() -> Arc<StaticRegistry> {
    let registry = Arc::new(StaticRegistry::new());
    registry.component(
        "Trace",
        Trace,
        UnitMetadata::core()
            .priority(1000)
            .version("1.0.0")
            .description("Request tracing")
            .default_entry()
            .with_uninstall(),
    );
    registry.component(
        "Router",
        Router,
        UnitMetadata::core()
            .version("2.1.0")
            .description("HTTP routing")
            .provides(
                Capability::new("router", "2.1.0")
                    .with_validator(|app| Ok(app.contains("router"))),
            )
            .on(Phase::LoadRouter, "mount"),
    );
    registry.component(
        "Serve",
        Serve,
        UnitMetadata::core()
            .version("1.4.0")
            .description("HTTP server")
            .depends_on(
                Dependency::optional("Router")
                    .with_error_message("Serve runs without routes when no router is enabled"),
            )
            .provides(Capability::new("server", "1.4.0"))
            .on(Phase::LoadServe, "listen")
            .on(Phase::Stop, "close"),
    );
    registry.plugin("Audit", Audit, UnitMetadata::user().default_entry());
    registry.plugin(
        "Metrics",
        Metrics,
        UnitMetadata::user()
            .depends_on(Dependency::contract("router"))
            .on(Phase::Ready, "expose"),
    );
    registry
}

async fn run() -> Result<(), OrchestratorError> {
    let config = StaticConfig::from_json_str(CONFIG)?;
    let app = Arc::new(Application::new("demo", Arc::new(config)));
    let bus = Arc::new(EventBus::new());
    let mut orchestrator = Orchestrator::new(app.clone(), registry(), bus.clone());

    orchestrator.register_app_events(
        Arc::new(Host),
        UnitMetadata::core().on(Phase::Start, "announce"),
    );

    let loaded = orchestrator.bootstrap().await?;
    info!(?loaded, order = ?orchestrator.core_order(), "Bootstrap complete");

    bus.emit_startup(&app).await?;
    orchestrator.mark_ready()?;
    orchestrator.verify_capabilities();

    println!("{}", orchestrator.describe());

    bus.emit(Phase::Stop, &app).await?;
    orchestrator.deactivate_all().await;
    info!(stats = ?orchestrator.stats(), "Shut down");
    Ok(())
}

#[tokio::main]
async fn main() {
    setup_tracing();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}
