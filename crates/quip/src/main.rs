use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use quip_core::{
    config::{BotOptions, Config},
    phrases::{ReplyPool, TriggerSet},
    ports::BotConnection,
    respond::Responder,
    supervisor,
};
use quip_discord::DiscordConnection;
use quip_telegram::TelegramConnection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quip_core::logging::init("quip")?;

    let cfg = Config::load()?;
    let connections = build_connections(&cfg)?;
    info!(
        bots = cfg.bots.len(),
        connections = connections.len(),
        "starting"
    );

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    supervisor::run_all(connections, cancel).await;
    Ok(())
}

/// Every (bot, platform) pair becomes its own connection with its own
/// responder; reply pools are never shared across identities.
fn build_connections(cfg: &Config) -> quip_core::Result<Vec<Box<dyn BotConnection>>> {
    let mut connections: Vec<Box<dyn BotConnection>> = Vec::new();
    for (name, bot) in &cfg.bots {
        if let Some(token) = bot.telegram_token() {
            let responder = build_responder(name, bot)?;
            connections.push(Box::new(TelegramConnection::new(token, responder)));
        }
        if let Some(token) = bot.discord_token() {
            let responder = build_responder(name, bot)?;
            connections.push(Box::new(DiscordConnection::new(token, responder)));
        }
    }
    Ok(connections)
}

fn build_responder(name: &str, bot: &BotOptions) -> quip_core::Result<Arc<Responder>> {
    let pool = ReplyPool::new(bot.replies.clone(), bot.history)?;
    Ok(Arc::new(Responder::new(
        name,
        TriggerSet::new(&bot.triggers),
        pool,
    )))
}
