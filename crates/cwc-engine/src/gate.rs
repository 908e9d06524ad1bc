//! Per-parent fetch admission: at most one in-flight child fetch per parent
//! id, and a refresh interval between completed fetches.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
struct SlotState {
    in_flight: bool,
    next_eligible_at: DateTime<Utc>,
}

/// Pure bookkeeping, no clock of its own; callers pass `now` so every
/// interleaving is testable.
#[derive(Debug)]
pub struct FetchGate {
    refresh_interval: Duration,
    slots: HashMap<String, SlotState>,
}

impl FetchGate {
    pub fn new(refresh_interval: std::time::Duration) -> Self {
        Self {
            refresh_interval: Duration::from_std(refresh_interval)
                .unwrap_or_else(|_| Duration::seconds(1)),
            slots: HashMap::new(),
        }
    }

    /// Claim a fetch slot for a parent. A newly seen parent is eligible
    /// immediately; a parent with a fetch in flight, or inside its refresh
    /// interval, is skipped rather than queued.
    pub fn try_claim(&mut self, parent_id: &str, now: DateTime<Utc>) -> bool {
        let slot = self.slots.entry(parent_id.to_string()).or_insert(SlotState {
            in_flight: false,
            next_eligible_at: now,
        });
        if slot.in_flight || slot.next_eligible_at > now {
            return false;
        }
        slot.in_flight = true;
        true
    }

    /// Release the slot after the fetch finished (success or failure) and
    /// re-arm the refresh interval.
    pub fn complete(&mut self, parent_id: &str, now: DateTime<Utc>) {
        if let Some(slot) = self.slots.get_mut(parent_id) {
            slot.in_flight = false;
            slot.next_eligible_at = now + self.refresh_interval;
        }
    }

    pub fn in_flight(&self, parent_id: &str) -> bool {
        self.slots
            .get(parent_id)
            .map(|slot| slot.in_flight)
            .unwrap_or(false)
    }

    /// Drop bookkeeping for parents no longer in the cache. Slots with a
    /// fetch still in flight are kept so the one-in-flight bound holds even
    /// if the parent reappears before the old fetch lands.
    pub fn retain(&mut self, keep: &HashSet<String>) {
        self.slots
            .retain(|id, slot| slot.in_flight || keep.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms)
            .single()
            .expect("valid test timestamp")
    }

    fn gate(interval_ms: u64) -> FetchGate {
        FetchGate::new(std::time::Duration::from_millis(interval_ms))
    }

    #[test]
    fn first_claim_is_immediate_second_is_skipped() {
        let mut gate = gate(1000);
        assert!(gate.try_claim("job-1", ts(0)));
        assert!(gate.in_flight("job-1"));
        // A second tick while the fetch is in flight is skipped, not queued.
        assert!(!gate.try_claim("job-1", ts(500)));
        assert!(!gate.try_claim("job-1", ts(5000)));
    }

    #[test]
    fn complete_rearms_the_refresh_interval() {
        let mut gate = gate(1000);
        assert!(gate.try_claim("job-1", ts(0)));
        gate.complete("job-1", ts(200));
        assert!(!gate.try_claim("job-1", ts(900)));
        assert!(gate.try_claim("job-1", ts(1200)));
    }

    #[test]
    fn parents_are_independent() {
        let mut gate = gate(1000);
        assert!(gate.try_claim("job-1", ts(0)));
        assert!(gate.try_claim("job-2", ts(0)));
        gate.complete("job-2", ts(100));
        assert!(gate.in_flight("job-1"));
        assert!(!gate.in_flight("job-2"));
    }

    #[test]
    fn retain_keeps_in_flight_slots() {
        let mut gate = gate(1000);
        assert!(gate.try_claim("job-1", ts(0)));
        gate.try_claim("job-2", ts(0));
        gate.complete("job-2", ts(100));

        gate.retain(&HashSet::new());
        // job-1 still in flight: the bound must survive a prune/reappear.
        assert!(!gate.try_claim("job-1", ts(200)));
        // job-2 was dropped: a reappearing parent starts fresh.
        assert!(gate.try_claim("job-2", ts(200)));
    }

    #[test]
    fn completion_of_a_forgotten_slot_is_a_no_op() {
        let mut gate = gate(1000);
        gate.complete("never-claimed", ts(0));
        assert!(!gate.in_flight("never-claimed"));
        assert!(gate.try_claim("never-claimed", ts(0)));
    }
}
