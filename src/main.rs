mod types;
mod indicators;
mod strategies;
mod exchange;
mod engine;
mod config;
mod crypto;
mod web;
mod analytics;
mod notifications;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{AppConfig, SettingsChangeEvent};
use exchange::BinanceClient;
use notifications::{EmailSender, TelegramSender};
use web::{start_server, AppState};

#[derive(Parser)]
#[command(name = "trading-dashboard")]
#[command(author = "Trading Bot")]
#[command(version)]
#[command(about = "JSON API backend for a Binance trading dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional config file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dashboard API server
    Serve {
        /// Port to listen on (defaults to PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a fresh ENCRYPTION_KEY
    GenKey,
    /// Send a test message with TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID
    TestTelegram,
    /// Send a test email with the SMTP_* settings
    TestEmail {
        /// Recipient (defaults to SMTP_USER)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show current prices and RSI signals for the tracked pairs
    Prices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let app_config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(app_config.port);
            serve(app_config, port).await?;
        }
        Commands::GenKey => {
            let key = crypto::generate_encryption_key();
            println!("Your encryption key: {}", key);
            println!("Add it to your .env: ENCRYPTION_KEY={}", key);
        }
        Commands::TestTelegram => {
            test_telegram(&app_config).await?;
        }
        Commands::TestEmail { to } => {
            test_email(&app_config, to.as_deref()).await?;
        }
        Commands::Prices => {
            show_prices(&app_config).await;
        }
    }

    Ok(())
}

async fn serve(app_config: AppConfig, port: u16) -> Result<()> {
    info!("Trading dashboard v{}", env!("CARGO_PKG_VERSION"));

    if app_config.binance_credentials().is_some() {
        info!("Binance API keys loaded from environment");
    } else {
        info!("No Binance API keys in environment; waiting for /api/config/api-keys");
    }
    if app_config.encryption_key.is_none() {
        info!("ENCRYPTION_KEY not set; dashboard-submitted keys will be refused");
    }

    let state = AppState::new(app_config);
    spawn_change_logger(&state);
    start_server(state, port).await
}

fn spawn_change_logger(state: &AppState) {
    let mut trading_rx = state.controller.subscribe();
    let mut settings_rx = state.settings.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(trading) = trading_rx.recv() => {
                    info!(active = trading.is_active, "Trading state changed");
                }
                Ok(change) = settings_rx.recv() => match change {
                    SettingsChangeEvent::RiskUpdated(risk) => info!(
                        stop_loss = risk.stop_loss.enabled,
                        take_profit = risk.take_profit.enabled,
                        "Risk settings changed"
                    ),
                    SettingsChangeEvent::NotificationsUpdated(n) => info!(
                        email = n.email.enabled,
                        telegram = n.telegram.enabled,
                        "Notification settings changed"
                    ),
                },
                else => break,
            }
        }
    });
}

async fn test_telegram(app_config: &AppConfig) -> Result<()> {
    let telegram = app_config
        .telegram()
        .ok_or_else(|| anyhow!("Set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID first"))?;

    let sender = TelegramSender::new(telegram);
    match sender
        .send_message("🤖 <b>Trading Bot Test</b>\n\n✅ Telegram is configured correctly!")
        .await
    {
        Ok(()) => {
            println!("✅ Message sent successfully!");
            Ok(())
        }
        Err(e) => {
            error!("Telegram test failed: {}", e);
            Err(e.into())
        }
    }
}

async fn test_email(app_config: &AppConfig, to: Option<&str>) -> Result<()> {
    let smtp = app_config
        .smtp()
        .ok_or_else(|| anyhow!("Set SMTP_HOST, SMTP_USER and SMTP_PASS first"))?;

    let sender = EmailSender::new(smtp, to);
    match sender
        .send_mail(
            "🤖 Trading Bot Test - Email",
            "Email is configured correctly! The bot can send you notifications.",
        )
        .await
    {
        Ok(()) => {
            println!("✅ Email sent to {}!", sender.recipient());
            Ok(())
        }
        Err(e) => {
            error!("Email test failed: {}", e);
            Err(e.into())
        }
    }
}

async fn show_prices(app_config: &AppConfig) {
    let client = BinanceClient::public_only(&app_config.binance_base_url);
    let rows = strategies::fetch_market_data(&client).await;

    println!("\n=== Current Prices ===");
    for row in rows {
        let change_symbol = if row.change_24h.is_sign_positive() { "+" } else { "" };
        println!(
            "{}: ${:.2} | 24h: {}{:.2}% | RSI: {} | {}",
            row.symbol, row.price, change_symbol, row.change_24h, row.rsi, row.signal
        );
    }
}
