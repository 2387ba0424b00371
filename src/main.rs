use goodwe_bridge::options::Options;
use goodwe_bridge::prelude::*;

#[tokio::main]
async fn main() {
    let options = Options::new();

    let config = match ConfigWrapper::new(options.config_file.clone()) {
        Ok(config) => config,
        Err(err) => {
            goodwe_bridge::init_logging("info");
            error!("Failed to load config {}: {:?}", options.config_file, err);
            std::process::exit(255);
        }
    };

    goodwe_bridge::init_logging(&config.loglevel());
    config.log_summary();

    // Create a channel for shutdown signaling
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        if let Err(e) = shutdown_tx.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    });

    if let Err(e) = goodwe_bridge::app(shutdown_rx, config).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}
