use std::sync::Arc;

use tracing::error;

use wishtree::config::{load_config, print_schema};
use wishtree::startup;
use wishtree::utils::logger::init_logging;

#[tokio::main]
async fn main() {
    if std::env::args().nth(1).as_deref() == Some("schema") {
        print_schema();
        return;
    }

    let config = load_config();
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error initialising logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = startup::run(Arc::new(config)).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
