use paperbot::{
    arguments::{self, print_help},
    config,
    logger::{self, LogTag},
};

/// Main entry point for PaperBot
///
/// Handles --help, loads the config file, then hands control to the service
/// wiring in `run`. The bot always runs unless --help is requested.
#[tokio::main]
async fn main() {
    logger::init();

    if arguments::is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    let config_path = arguments::get_config_path();
    if let Err(e) = config::load_config(&config_path) {
        eprintln!("❌ Failed to load config {}: {}", config_path, e);
        std::process::exit(1);
    }

    logger::info(LogTag::System, "🚀 PaperBot starting up...");

    match paperbot::run::run_bot().await {
        Ok(_) => {
            logger::info(LogTag::System, "✅ PaperBot exited cleanly");
        }
        Err(e) => {
            logger::error(LogTag::System, &format!("❌ PaperBot failed: {}", e));
            std::process::exit(1);
        }
    }
}
