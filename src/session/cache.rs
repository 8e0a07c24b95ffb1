//! Bounded, TTL-based read cache for reports fetched from the archive.
//! Purely an optimization: a miss always falls through to the archive.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::report::CombatReport;

#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, (Instant, CombatReport)>,
    order: VecDeque<String>,
}

#[derive(Debug)]
pub struct ReportCache {
    capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl ReportCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, combat_id: &str) -> Option<CombatReport> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match state.entries.get(combat_id) {
            Some((stored_at, report)) if stored_at.elapsed() < self.ttl => {
                return Some(report.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(combat_id);
            state.order.retain(|id| id != combat_id);
        }
        None
    }

    /// Insert or refresh; evicts the oldest entries beyond capacity.
    pub fn insert(&self, report: CombatReport) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = report.combat_id.clone();
        if state.entries.insert(id.clone(), (Instant::now(), report)).is_some() {
            state.order.retain(|existing| existing != &id);
        }
        state.order.push_back(id);
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::combat::CombatOutcome;
    use crate::report::RosterSnapshot;

    fn report(id: &str) -> CombatReport {
        CombatReport {
            combat_id: id.to_string(),
            user_id: "u".to_string(),
            base_id: "b".to_string(),
            date: Utc::now(),
            result: CombatOutcome::Draw,
            log: Vec::new(),
            damage_dealt: 0,
            damage_taken: 0,
            units_deployed: Vec::new(),
            units_lost: Vec::new(),
            rounds: 1,
            max_rounds: 10,
            roster: RosterSnapshot {
                pathogens: Vec::new(),
                antibodies: Vec::new(),
            },
        }
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let cache = ReportCache::new(2, Duration::from_secs(60));
        cache.insert(report("a"));
        cache.insert(report("b"));
        cache.insert(report("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn refresh_moves_entry_to_back() {
        let cache = ReportCache::new(2, Duration::from_secs(60));
        cache.insert(report("a"));
        cache.insert(report("b"));
        cache.insert(report("a"));
        cache.insert(report("c"));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = ReportCache::new(4, Duration::ZERO);
        cache.insert(report("a"));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }
}
