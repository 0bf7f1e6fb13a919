// railpick entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Load the character/lightcone catalog
// 5. Build the app state (draft, stored settings, RNG)
// 6. Create channels
// 7. Spawn WebSocket server task
// 8. Spawn app logic task
// 9. Wait for Ctrl+C
// 10. Cleanup on exit

use std::path::Path;
use std::sync::Arc;

use railpick_app::app;
use railpick_app::config;
use railpick_core::catalog;
use railpick_core::db;
use railpick_core::ws_server;

use anyhow::Context;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("railpick starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {:?} {:?}, phase {}s, reserve {}s",
        config.draft.rule_set,
        config.draft.draft_mode,
        config.draft.settings.phase_time,
        config.draft.settings.reserve_time
    );

    // 3. Open database
    let db = db::Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Load the catalog
    let catalog = catalog::load_catalog(
        Path::new(&config.catalog_paths.characters),
        Path::new(&config.catalog_paths.lightcones),
    )
    .context("failed to load catalog")?;
    info!(
        "Loaded {} characters, {} lightcones",
        catalog.list_characters().len(),
        catalog.list_lightcones().len()
    );

    // 5. Build the app state
    let app_state = app::AppState::new(
        config.clone(),
        Arc::new(catalog),
        db,
        ChaCha8Rng::from_entropy(),
    );

    // 6. Create channels
    let (ws_tx, ws_rx) = mpsc::channel(256);
    let (out_tx, _) = broadcast::channel(256);

    // 7. Spawn WebSocket server task
    let ws_port = config.ws_port;
    let ws_outbound = out_tx.clone();
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(ws_port, ws_tx, ws_outbound).await {
            error!("WebSocket server error: {:#}", e);
        }
    });

    // 8. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(ws_rx, out_tx, app_state).await {
            error!("Application loop error: {:#}", e);
        }
    });

    // 9. Wait for Ctrl+C
    info!("Ready. WebSocket server listening on 127.0.0.1:{}", ws_port);
    println!("railpick listening on ws://127.0.0.1:{ws_port} (Ctrl+C to quit)");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown requested");

    // 10. Cleanup: stopping the server drops the event sender, which ends the
    // app loop.
    ws_handle.abort();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("railpick shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/railpick.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("railpick.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("railpick=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
