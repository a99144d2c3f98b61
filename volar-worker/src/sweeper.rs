use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};
use volar_order::HoldStore;

/// Deletes expired holds every `period` until `shutdown` resolves.
///
/// Reads and writes already ignore expired holds, so this only keeps the
/// tables small.
pub async fn run<F>(holds: HoldStore, period: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(period_secs = period.as_secs(), "Hold sweeper started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                sweep_once(&holds).await;
            }
        }
    }
}

async fn sweep_once(holds: &HoldStore) -> u64 {
    match holds.sweep_expired().await {
        Ok(deleted) => {
            debug!(deleted, "Sweep finished");
            deleted
        }
        Err(e) => {
            error!("Hold sweep failed: {}", e);
            0
        }
    }
}
