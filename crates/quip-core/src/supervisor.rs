use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::ports::BotConnection;

/// Run every configured connection to completion in parallel.
///
/// Each connection gets its own task. A fatal error terminates that bot
/// alone and is logged; the shared token cancels all of them together on
/// shutdown. Returns once every connection has finished.
pub async fn run_all(connections: Vec<Box<dyn BotConnection>>, cancel: CancellationToken) {
    let mut tasks = JoinSet::new();
    for conn in connections {
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let label = conn.label().to_string();
            let result = conn.run(cancel).await;
            (label, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((label, Ok(()))) => info!(bot = %label, "connection closed"),
            Ok((label, Err(e))) => error!(bot = %label, error = %e, "connection failed"),
            Err(e) => error!(error = %e, "connection task panicked"),
        }
    }
}
