use tracing::{error, info, warn};

use apkdepot::depot::Depot;
use apkdepot::web::WebServer;
use apkdepot::Config;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Initialize logging
    if let Err(e) = apkdepot::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        apkdepot::logging::init_console_only(&config.logging.level);
    }

    info!("APK Depot starting");
    info!(
        uploads = %config.storage.uploads_path,
        metadata = %config.storage.metadata_path,
        "Storage configured"
    );

    let depot = match Depot::open(&config.storage).await {
        Ok(depot) => depot,
        Err(e) => {
            error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    match depot.recover_stashed().await {
        Ok(recovery) if recovery.restored.is_empty() && recovery.purged.is_empty() => {}
        Ok(recovery) => info!(
            restored = ?recovery.restored,
            purged = ?recovery.purged,
            "Finished interrupted deletes"
        ),
        Err(e) => warn!("Failed to recover stashed uploads: {}", e),
    }

    match depot.audit().await {
        Ok(report) if report.is_consistent() => info!("Storage audit passed"),
        Ok(report) => warn!(
            orphaned_entries = ?report.orphaned_entries,
            untracked_blobs = ?report.untracked_blobs,
            stashed_blobs = ?report.stashed_blobs,
            "Metadata and uploads directory disagree"
        ),
        Err(e) => warn!("Storage audit failed: {}", e),
    }

    let server = match WebServer::new(&config, depot) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Web server error: {}", e);
        std::process::exit(1);
    }
}
