//! Parent poller: mirrors the gateway listing into the cache on the main
//! cadence.

use crate::cache::JobCache;
use crate::EngineSignal;
use chrono::Utc;
use cwc_client::GatewayService;
use cwc_core::WatchConfig;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub async fn run_parent_poller(
    cache: Arc<JobCache>,
    gateway: Arc<dyn GatewayService>,
    config: WatchConfig,
    signals: mpsc::Sender<EngineSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        match gateway
            .list_jobs(&config.filters, config.limit, config.offset)
            .await
        {
            Ok(rows) => {
                let rows: Vec<_> = rows
                    .into_iter()
                    .filter(|job| config.filters.matches(job))
                    .collect();
                let active: HashSet<String> = rows.iter().map(|job| job.id.clone()).collect();
                for row in rows {
                    cache.upsert_parent(row);
                }
                // Eviction only from the full fetched result set for the
                // active filter window, and only on a successful fetch.
                let removed = cache.prune(&active);
                if !removed.is_empty() {
                    info!(event = "parent_prune", removed = removed.len());
                }
                cache.mark_listing_ok(Utc::now());
            }
            Err(err) if err.is_fatal() => {
                warn!(event = "parent_poll_fatal", error = %err);
                let _ = signals.send(EngineSignal::Fatal(err.to_string())).await;
                break;
            }
            Err(err) => {
                // One failed tick: keep the last good snapshot, surface the
                // indicator, retry on the next tick.
                warn!(event = "parent_poll_error", error = %err);
                cache.record_listing_error(&err.to_string());
            }
        }
    }
}
