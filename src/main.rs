//! Application entry point: the vision controller daemon.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load the live [`ConfigStore`] (defaults on first run).
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the hub, remote client, audio output and workflow controller.
//! 5. Register the `config`, `system` and `vision` modules and start them.
//! 6. Serve the dashboard until Ctrl-C, then stop every module.

use std::sync::Arc;

use anyhow::{Context, Result};
use vision_controller::{
    audio::open_default_output,
    config::{AppConfig, AppPaths, ConfigStore},
    hub::StateHub,
    modules::{ConfigModule, ModuleRegistry, SystemModule, VisionModule},
    remote::HttpAnalysisClient,
    server::{self, AppState},
    workflow::WorkflowController,
};

fn main() -> Result<()> {
    // 1. Logging (RUST_LOG overrides the default level)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("vision controller {} starting up", env!("CARGO_PKG_VERSION"));

    // 2. Configuration
    let paths = AppPaths::new();
    let config = Arc::new(ConfigStore::load(&paths.settings_file).unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e:#}); using defaults");
        ConfigStore::with_path(AppConfig::default(), paths.settings_file.clone())
    }));
    log::info!("settings file: {}", paths.settings_file.display());

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config))
}

async fn run(config: Arc<ConfigStore>) -> Result<()> {
    let settings = config.snapshot();

    // 4. Core services
    let hub = Arc::new(StateHub::new(settings.notifications.capacity));
    let remote = Arc::new(HttpAnalysisClient::new(Arc::clone(&config)));
    let player = open_default_output();
    let controller = Arc::new(WorkflowController::new(
        remote,
        player,
        Arc::clone(&hub),
        Arc::clone(&config),
    ));

    if !settings.remote.is_configured() {
        log::warn!("analysis service not configured; set base_url and api_key from the dashboard");
    }

    // 5. Modules
    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(ConfigModule::new(Arc::clone(&config), Arc::clone(&hub))));
    registry.register(Arc::new(SystemModule::new(Arc::clone(&hub), Arc::clone(&config))));
    registry.register(Arc::new(VisionModule::new(controller, Arc::clone(&config))));
    let registry = Arc::new(registry);
    registry.start_all();

    // 6. Dashboard server
    let state = AppState {
        hub,
        registry: Arc::clone(&registry),
    };
    let served = server::serve(state, &settings.server.bind_addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("shutdown requested");
    })
    .await;

    registry.stop_all().await;
    log::info!("vision controller stopped");
    served
}
