//! Last-good lane cache.
//!
//! Remembers the most recent live lane per (route, slot) so a request
//! arriving while the vessel feed has dropped a vessel can reuse the
//! previous observation, marked stale. Entries are read back only
//! within the TTL; there is no eviction sweep because `get` does its
//! own freshness check.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{Lane, LaneSlot};
use crate::services::LAST_GOOD_TTL_SECONDS;

struct CachedLane {
    lane: Lane,
    observed_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct LaneCache {
    entries: RwLock<HashMap<(i32, LaneSlot), CachedLane>>,
}

impl LaneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a clone of the cached lane if it was observed within the
    /// TTL. Stale-beyond-TTL entries are left in place and ignored.
    pub fn get(&self, route_id: i32, slot: LaneSlot, now: DateTime<Utc>) -> Option<Lane> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(&(route_id, slot))?;
        if (now - entry.observed_at).num_seconds() <= LAST_GOOD_TTL_SECONDS {
            Some(entry.lane.clone())
        } else {
            None
        }
    }

    /// Record a live lane observation. Stores a clone so callers can't
    /// mutate cache contents afterwards.
    pub fn put(&self, route_id: i32, slot: LaneSlot, lane: &Lane, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                (route_id, slot),
                CachedLane {
                    lane: lane.clone(),
                    observed_at: now,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Phase};
    use chrono::Duration;

    fn sample_lane(now: DateTime<Utc>) -> Lane {
        Lane {
            slot: 1,
            vessel_id: Some(36),
            vessel_name: "Tacoma".to_string(),
            at_dock: false,
            direction: Direction::WestToEast,
            departing_terminal_id: Some(3),
            arriving_terminal_id: Some(7),
            scheduled_departure: None,
            left_dock: Some(now - Duration::minutes(10)),
            eta: Some(now + Duration::minutes(25)),
            phase: Phase::Underway,
            dot_position: 0.3,
            current_arrival_time: None,
            dock_start_time: None,
            dock_start_is_synthetic: false,
            dock_arc_fraction: None,
            last_updated_vessels: now,
            is_stale: false,
        }
    }

    #[test]
    fn get_within_ttl_returns_clone() {
        let cache = LaneCache::new();
        let now = Utc::now();
        cache.put(5, LaneSlot::Upper, &sample_lane(now), now);

        let later = now + Duration::minutes(9);
        let lane = cache.get(5, LaneSlot::Upper, later).unwrap();
        assert_eq!(lane.vessel_id, Some(36));
    }

    #[test]
    fn get_past_ttl_returns_none() {
        let cache = LaneCache::new();
        let now = Utc::now();
        cache.put(5, LaneSlot::Upper, &sample_lane(now), now);

        let later = now + Duration::minutes(11);
        assert!(cache.get(5, LaneSlot::Upper, later).is_none());
    }

    #[test]
    fn slots_and_routes_are_independent() {
        let cache = LaneCache::new();
        let now = Utc::now();
        cache.put(5, LaneSlot::Upper, &sample_lane(now), now);

        assert!(cache.get(5, LaneSlot::Lower, now).is_none());
        assert!(cache.get(6, LaneSlot::Upper, now).is_none());
    }

    #[test]
    fn put_stores_a_copy() {
        let cache = LaneCache::new();
        let now = Utc::now();
        let mut lane = sample_lane(now);
        cache.put(5, LaneSlot::Upper, &lane, now);

        // Mutating the caller's lane must not reach into the cache.
        lane.vessel_name = "Walla Walla".to_string();
        let cached = cache.get(5, LaneSlot::Upper, now).unwrap();
        assert_eq!(cached.vessel_name, "Tacoma");
    }

    #[test]
    fn refresh_replaces_the_entry() {
        let cache = LaneCache::new();
        let now = Utc::now();
        cache.put(5, LaneSlot::Upper, &sample_lane(now), now);

        let later = now + Duration::minutes(8);
        let mut updated = sample_lane(later);
        updated.dot_position = 0.9;
        cache.put(5, LaneSlot::Upper, &updated, later);

        // Fresh relative to the second observation even though the
        // first has nearly expired.
        let read_at = now + Duration::minutes(15);
        let lane = cache.get(5, LaneSlot::Upper, read_at).unwrap();
        assert_eq!(lane.dot_position, 0.9);
        assert_eq!(cache.len(), 1);
    }
}
