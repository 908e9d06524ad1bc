//! Child resolver: fast worker tick, per-parent fetch tasks, one in flight
//! per parent, and permanent stop once a parent is fully terminal.

use crate::cache::JobCache;
use crate::gate::FetchGate;
use chrono::Utc;
use cwc_client::{RuntimeService, SourceError};
use cwc_core::WatchConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Worker cadence: how often the resolver looks for due parents. Much
/// faster than the fetch interval so newly discovered parents resolve
/// promptly; the `FetchGate` is what bounds the request rate.
pub const WORKER_TICK: Duration = Duration::from_millis(200);

pub async fn run_child_resolver(
    cache: Arc<JobCache>,
    runtime: Arc<dyn RuntimeService>,
    config: WatchConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let gate = Arc::new(Mutex::new(FetchGate::new(config.interval)));
    let mut ticker = tokio::time::interval(WORKER_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

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

        let now = Utc::now();
        let due: Vec<String> = {
            let mut gate = lock_gate(&gate);
            gate.retain(&cache.known_parent_ids());
            cache
                .unresolved_parent_ids()
                .into_iter()
                .filter(|parent_id| gate.try_claim(parent_id, now))
                .collect()
        };

        // One task per claimed parent: a slow runtime answer for one parent
        // never delays another parent's resolution.
        for parent_id in due {
            let cache = cache.clone();
            let runtime = runtime.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                resolve_parent(&cache, runtime.as_ref(), &parent_id).await;
                lock_gate(&gate).complete(&parent_id, Utc::now());
            });
        }
    }
}

async fn resolve_parent(cache: &JobCache, runtime: &dyn RuntimeService, parent_id: &str) {
    match runtime.execution_jobs(parent_id).await {
        Ok(children) => {
            debug!(event = "children_resolved", parent = parent_id, count = children.len());
            cache.upsert_children(parent_id, children, Utc::now());
        }
        Err(SourceError::NotFound(_)) => {
            // Vanished between listing and detail fetch: prune, not an error.
            debug!(event = "parent_vanished", parent = parent_id);
            cache.remove(parent_id);
        }
        Err(err) => {
            warn!(event = "child_resolve_error", parent = parent_id, error = %err);
            cache.record_children_error(parent_id, &err.to_string());
        }
    }
}

fn lock_gate(gate: &Mutex<FetchGate>) -> std::sync::MutexGuard<'_, FetchGate> {
    gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
