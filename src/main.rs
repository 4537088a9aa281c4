use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vigil_execution_rs::api::{self, AppState};
use vigil_execution_rs::auto_mode::{AutoModeController, CountersStore};
use vigil_execution_rs::broker_client::{BrokerClient, HttpBrokerClient, UnconfiguredBroker};
use vigil_execution_rs::config::{AppConfig, SafetyFlags, SettingsStore};
use vigil_execution_rs::context::ExecutionContext;
use vigil_execution_rs::dedupe_store::DedupeStore;
use vigil_execution_rs::market_window::ClockSessionOracle;
use vigil_execution_rs::plan_log::PlanLog;
use vigil_execution_rs::position_store::PositionStore;
use vigil_execution_rs::router::ExecutionRouter;
use vigil_execution_rs::signal::JsonlSignalFeed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔═══════════════════════════════════════════════════════════════╗");
    info!("║              VIGIL EXECUTION RS - Control Plane               ║");
    info!("║         Signal-Driven Execution, Paper-Only by Default        ║");
    info!("╚═══════════════════════════════════════════════════════════════╝");

    dotenv::dotenv().ok();

    let app_config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let data_dir = app_config.data_dir();
    let flags = SafetyFlags::snapshot();
    info!(
        dry_run = flags.dry_run,
        live_trading = flags.live_trading,
        single_broker_only = flags.single_broker_only,
        kill_switch = flags.kill_switch,
        "Safety flags at startup"
    );

    let settings = Arc::new(SettingsStore::open(data_dir.join("settings.json"))?);
    let dedupe = Arc::new(DedupeStore::open(data_dir.join("executed_signals.jsonl"))?);
    let positions = Arc::new(PositionStore::open(
        data_dir.join("paper_open_positions.jsonl"),
    )?);
    let plan_log = Arc::new(PlanLog::open(data_dir.join("execution_plan.jsonl")));
    let counters = CountersStore::open(data_dir.join("auto_counters.json"))?;
    let feed = Arc::new(JsonlSignalFeed::new(data_dir.join("alerts_classified.jsonl")));

    let broker: Arc<dyn BrokerClient> = match app_config
        .broker
        .as_ref()
        .map(HttpBrokerClient::from_config)
    {
        Some(Ok(client)) => {
            info!("🔌 Broker client configured: {}", client.name());
            Arc::new(client)
        }
        Some(Err(e)) => {
            warn!("Broker not configured ({}); live path disabled", e);
            Arc::new(UnconfiguredBroker)
        }
        None => {
            warn!("No broker section in config; live path disabled");
            Arc::new(UnconfiguredBroker)
        }
    };

    let ctx = ExecutionContext::new_system();
    let router = Arc::new(ExecutionRouter::new(
        positions.clone(),
        broker.clone(),
        ctx.clone(),
    ));
    let oracle = Arc::new(ClockSessionOracle::new(broker.clone(), settings.clone()));

    let controller = Arc::new(AutoModeController::new(
        feed.clone(),
        dedupe.clone(),
        positions.clone(),
        router.clone(),
        plan_log.clone(),
        counters,
        oracle,
        settings.clone(),
        ctx,
    ));

    if flags.auto_mode_enabled {
        info!("AUTO_MODE_ENABLED is set; starting the controller");
        controller.enable();
    }

    let state = web::Data::new(AppState {
        controller: controller.clone(),
        settings,
        positions,
        dedupe,
        feed,
        plan_log,
    });

    let bind_address = format!("0.0.0.0:{}", app_config.port());
    info!("🚀 Starting control surface on {}", bind_address);

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::config)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    // Server stopped: drain the controller so the final summary is emitted.
    controller.disable().await;

    Ok(())
}
