use tracing::{error, info};

use feedcast::{App, Config};

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

    // Initialize logging
    if let Err(e) = feedcast::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedcast::logging::init_console_only(&config.logging.level);
    }

    info!("feedcast {}", env!("CARGO_PKG_VERSION"));
    info!(
        "{} feed source(s), database at {}",
        config.crawler.sources.len(),
        config.database.path
    );

    let app = match App::build(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("feedcast stopped with an error: {e}");
        std::process::exit(1);
    }
}
