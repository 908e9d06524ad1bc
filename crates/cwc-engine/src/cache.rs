//! The shared job cache: single source of truth for both pollers, read by
//! the renderer through copy-on-read snapshots.

use chrono::{DateTime, Utc};
use cwc_core::{ExecutionJob, FunctionJob, ResolveState};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct CacheInner {
    jobs: HashMap<String, FunctionJob>,
    last_refresh_at: Option<DateTime<Utc>>,
    listing_error: Option<String>,
}

/// Internally consistent, point-in-time copy of the cache. Safe to iterate
/// while both pollers keep mutating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Ordered `created_at` descending, ties broken by `id` ascending;
    /// jobs without a timestamp sort last.
    pub jobs: Vec<FunctionJob>,
    pub taken_at: DateTime<Utc>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    /// Last transient listing failure; cleared by the next good fetch.
    pub listing_error: Option<String>,
}

/// Mutex-guarded map. Every public operation takes the lock once, so no
/// caller ever observes a half-updated parent.
#[derive(Debug, Default)]
pub struct JobCache {
    inner: Mutex<CacheInner>,
}

impl JobCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // A poisoned lock only means a panic mid-update in another thread;
        // the map itself is still coherent field-wise.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or merge a parent row from the listing. Status moves forward
    /// only; resolved children and fetch bookkeeping are preserved.
    pub fn upsert_parent(&self, incoming: FunctionJob) {
        let mut inner = self.lock();
        let entry = inner
            .jobs
            .entry(incoming.id.clone())
            .or_insert_with(|| FunctionJob::new(incoming.id.clone()));
        entry.status = entry.status.advance(incoming.status);
        entry.sub_status = incoming.sub_status;
        if incoming.function_name.is_some() {
            entry.function_name = incoming.function_name;
        }
        if incoming.created_at.is_some() {
            entry.created_at = incoming.created_at;
        }
    }

    /// Replace a parent's child view with a fresh resolution. Children are
    /// append-or-update in discovery order and never shrink; `Complete` is
    /// assigned here and only here, when the parent is terminal and every
    /// known child is terminal.
    pub fn upsert_children(&self, parent_id: &str, incoming: Vec<ExecutionJob>, now: DateTime<Utc>) {
        let mut inner = self.lock();
        let Some(entry) = inner.jobs.get_mut(parent_id) else {
            return;
        };
        for child in incoming {
            match entry.children.iter_mut().find(|known| known.id == child.id) {
                Some(known) => {
                    known.status = known.status.advance(child.status);
                    if child.backend_name.is_some() {
                        known.backend_name = child.backend_name;
                    }
                    known.last_fetched_at = child.last_fetched_at.or(Some(now));
                }
                None => entry.children.push(child),
            }
        }
        entry.last_children_fetch = Some(now);
        entry.children_error = None;
        entry.children_resolved = if entry.status.is_terminal()
            && entry.children.iter().all(|child| child.status.is_terminal())
        {
            ResolveState::Complete
        } else {
            ResolveState::Partial
        };
    }

    /// Transient child-fetch failure: indicator only, data untouched.
    pub fn record_children_error(&self, parent_id: &str, message: &str) {
        let mut inner = self.lock();
        if let Some(entry) = inner.jobs.get_mut(parent_id) {
            entry.children_error = Some(message.to_string());
        }
    }

    /// A successful listing pass: clears the error indicator and stamps the
    /// refresh time.
    pub fn mark_listing_ok(&self, now: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.listing_error = None;
        inner.last_refresh_at = Some(now);
    }

    /// Transient listing failure: the last good state stays untouched.
    pub fn record_listing_error(&self, message: &str) {
        let mut inner = self.lock();
        inner.listing_error = Some(message.to_string());
    }

    /// Evict entries that disappeared from the full logical result set.
    /// Never called on a failed fetch. Returns the evicted ids so the
    /// resolver can drop its bookkeeping for them.
    pub fn prune(&self, active_ids: &HashSet<String>) -> Vec<String> {
        let mut inner = self.lock();
        let removed: Vec<String> = inner
            .jobs
            .keys()
            .filter(|id| !active_ids.contains(*id))
            .cloned()
            .collect();
        for id in &removed {
            inner.jobs.remove(id);
        }
        removed
    }

    /// The job vanished between listing and detail fetch: treated as prune.
    pub fn remove(&self, parent_id: &str) -> bool {
        self.lock().jobs.remove(parent_id).is_some()
    }

    /// Parents the child resolver still owes work: everything not fully
    /// terminal. Fully terminal parents receive zero further fetches.
    pub fn unresolved_parent_ids(&self) -> Vec<String> {
        let inner = self.lock();
        let mut ids: Vec<String> = inner
            .jobs
            .values()
            .filter(|job| !job.is_fully_terminal())
            .map(|job| job.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn known_parent_ids(&self) -> HashSet<String> {
        self.lock().jobs.keys().cloned().collect()
    }

    pub fn get(&self, parent_id: &str) -> Option<FunctionJob> {
        self.lock().jobs.get(parent_id).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        let mut jobs: Vec<FunctionJob> = inner.jobs.values().cloned().collect();
        jobs.sort_by(compare_for_display);
        Snapshot {
            jobs,
            taken_at: Utc::now(),
            last_refresh_at: inner.last_refresh_at,
            listing_error: inner.listing_error.clone(),
        }
    }
}

fn compare_for_display(a: &FunctionJob, b: &FunctionJob) -> Ordering {
    match (b.created_at, a.created_at) {
        (Some(rhs), Some(lhs)) => rhs.cmp(&lhs).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.id.cmp(&b.id),
    }
}
