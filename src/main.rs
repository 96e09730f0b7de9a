//! Dice settlement bot entry point.
//!
//! Loads configuration, initialises structured logging, opens the
//! pending-bet ledger, wires the wallet/fullnode/Telegram clients into
//! the settlement poller, and runs it with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use hathor_dice::clients::fullnode::FullnodeClient;
use hathor_dice::clients::telegram::TelegramNotifier;
use hathor_dice::clients::wallet::HeadlessWalletClient;
use hathor_dice::config::AppConfig;
use hathor_dice::engine::settlement::SettlementPoller;
use hathor_dice::storage::BetLedger;

const BANNER: &str = r#"
 ____  ___ ____ _____
|  _ \|_ _/ ___| ____|
| | | || | |   |  _|
| |_| || | |___| |___
|____/|___\____|_____|

  Hathor nano-contract dice — settlement engine
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        bot_name = %cfg.bot.name,
        network = %cfg.bot.network,
        poll_interval_secs = cfg.bot.poll_interval_secs,
        contract_id = %cfg.dice.contract_id,
        "Dice settlement engine starting up"
    );

    // -- Secrets -----------------------------------------------------------

    let wallet_id = AppConfig::resolve_env(&cfg.wallet.wallet_id_env)?;
    let bot_token = AppConfig::resolve_env(&cfg.telegram.bot_token_env)?;

    // -- Clients and storage ----------------------------------------------

    let wallet = Arc::new(HeadlessWalletClient::new(&cfg.wallet.base_url, &wallet_id)?);
    let node = Arc::new(FullnodeClient::new(&cfg.fullnode.base_url)?);
    let notifier = Arc::new(TelegramNotifier::new(&bot_token)?);

    let ledger = Arc::new(BetLedger::open(cfg.storage.ledger_path.as_deref())?);
    info!(pending = ledger.len(), "Ledger loaded");

    // -- Settlement loop ---------------------------------------------------

    let poller = SettlementPoller::new(
        wallet,
        node,
        notifier,
        Arc::clone(&ledger),
        cfg.settlement_config(),
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering settlement loop. Press Ctrl+C to stop.");

    tokio::select! {
        _ = poller.run() => {}
        _ = &mut shutdown => {
            info!("Shutdown signal received.");
        }
    }

    info!(pending = ledger.len(), "Dice settlement engine shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hathor_dice=info"));

    let json_logging = std::env::var("DICE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
