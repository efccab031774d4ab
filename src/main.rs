//! relay-bot entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load and validate config from the environment
//!   3. Resolve effective log level (CLI `-v` flags > RUST_LOG > LOG_LEVEL)
//!   4. Init logger once
//!   5. Spawn SIGINT/SIGTERM watcher on a shared shutdown token
//!   6. Build the relay and run it until the token is cancelled

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::level_filters::LevelFilter;

use relay_bot::error::AppError;
use relay_bot::relay::RelayDispatcher;
use relay_bot::{config, logger, shutdown};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present. The file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load()?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level);
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        base_url = %config.provider.base_url,
        model = %config.provider.model,
        log_level = %effective_log_level,
        "config loaded"
    );

    let shutdown = CancellationToken::new();
    let signals = shutdown::spawn_signal_watcher(shutdown.clone());

    let relay = RelayDispatcher::new(&config)?;
    let result = relay.run(shutdown.clone()).await;

    // Stops the signal watcher when the relay exited on its own.
    shutdown.cancel();
    signals.await.ok();

    result?;
    info!("bye");
    Ok(())
}

struct CliArgs {
    log_level: Option<LevelFilter>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--" => break,
            "-h" | "--help" => {
                println!("Usage: relay-bot [OPTIONS]");
                println!();
                println!("Relays Telegram messages to an OpenAI-compatible chat completion API.");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                println!();
                println!("Environment:");
                println!("  BOT_TOKEN                  Telegram bot token (required)");
                println!("  PROVIDER_API_KEY           Completion provider API key (required)");
                println!("  PROVIDER_BASE_URL          Provider base URL (default: {})", config::DEFAULT_PROVIDER_BASE_URL);
                println!("  MODEL_NAME                 Model name (default: {})", config::DEFAULT_MODEL_NAME);
                println!("  BOT_API_URL                Custom Telegram Bot API server");
                println!("  LOG_LEVEL                  off|error|warn|info|debug|trace (default: {})", config::DEFAULT_LOG_LEVEL);
                std::process::exit(0);
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug
    //   -vvvv+  → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some(LevelFilter::WARN),
        2 => Some(LevelFilter::INFO),
        3 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    };

    CliArgs { log_level }
}
