use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn a background task that pings every connected WebSocket client each
/// `interval` until `cancel` fires.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let pinged = ws_manager.ping_all().await;
                    tracing::debug!(pinged, "WebSocket heartbeat ping");
                }
            }
        }
        tracing::debug!("Heartbeat stopped");
    })
}
