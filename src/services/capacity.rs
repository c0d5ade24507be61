//! Capacity deriver.
//!
//! Picks the next departing sailing from each side of a route and
//! reports its advertised drive-up space. The schedule-chosen vessel is
//! preferred; when it isn't advertising space the earliest sailing that
//! is gets used instead (marked stale). Per-vessel maximum capacity is
//! "sticky": the first positive maximum ever observed for a vessel is
//! kept and never revised down, because the upstream intermittently
//! nulls the field mid-day.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::Capacity;
use crate::providers::wsf::TerminalSpace;
use crate::services::LAST_GOOD_TTL_SECONDS;

/// Which end of the route a capacity reading belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    West,
    East,
}

struct CachedCapacity {
    capacity: Capacity,
    observed_at: DateTime<Utc>,
}

/// Process-wide capacity memory: sticky per-vessel maxima plus the
/// last-good reading per (route, side).
#[derive(Default)]
pub struct CapacityStore {
    sticky_max: RwLock<HashMap<i32, i32>>,
    last_good: RwLock<HashMap<(i32, Side), CachedCapacity>>,
}

impl CapacityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `raw_max` if it is the vessel's first positive maximum,
    /// then return the sticky value. Nulls and zeros never overwrite.
    fn sticky_max(&self, vessel_id: i32, raw_max: Option<i32>) -> Option<i32> {
        if let Some(raw) = raw_max.filter(|m| *m > 0) {
            if let Ok(mut map) = self.sticky_max.write() {
                return Some(*map.entry(vessel_id).or_insert(raw));
            }
        }
        self.sticky_max
            .read()
            .ok()
            .and_then(|map| map.get(&vessel_id).copied())
    }

    fn last_good(&self, route_id: i32, side: Side, now: DateTime<Utc>) -> Option<Capacity> {
        let map = self.last_good.read().ok()?;
        let entry = map.get(&(route_id, side))?;
        if (now - entry.observed_at).num_seconds() <= LAST_GOOD_TTL_SECONDS {
            Some(entry.capacity.clone())
        } else {
            None
        }
    }

    fn put_last_good(&self, route_id: i32, side: Side, capacity: &Capacity, now: DateTime<Utc>) {
        if let Ok(mut map) = self.last_good.write() {
            map.insert(
                (route_id, side),
                CachedCapacity {
                    capacity: capacity.clone(),
                    observed_at: now,
                },
            );
        }
    }

    pub fn sticky_len(&self) -> usize {
        self.sticky_max.read().map(|m| m.len()).unwrap_or(0)
    }
}

struct SailingTuple<'a> {
    dep_time: DateTime<Utc>,
    vessel_id: i32,
    vessel_name: &'a str,
    raw_max: Option<i32>,
    drive_up: Option<i32>,
}

/// Derive one side's capacity from the terminal-space payload.
///
/// `scheduled_vessel_id` is the vessel the schedule put on this side's
/// next departure; `None` when no lane matched. Returns `None` rather
/// than fabricating zero availability.
pub fn derive_capacity(
    store: &CapacityStore,
    route_id: i32,
    side: Side,
    side_terminal: Option<i32>,
    opposite_terminal: Option<i32>,
    spaces: Option<&[TerminalSpace]>,
    scheduled_vessel_id: Option<i32>,
    now: DateTime<Utc>,
) -> Option<Capacity> {
    let (Some(terminal), Some(opposite)) = (side_terminal, opposite_terminal) else {
        return None;
    };

    let mut candidates: Vec<SailingTuple<'_>> = Vec::new();
    for record in spaces.unwrap_or_default() {
        if record.terminal_id != terminal {
            continue;
        }
        for departing in &record.departing_spaces {
            let Some(dep_time) = departing.departure else {
                continue;
            };
            if dep_time < now {
                continue;
            }
            for arrival in &departing.space_for_arrival_terminals {
                let matches_opposite = arrival.terminal_id == Some(opposite)
                    || arrival.arrival_terminal_ids.contains(&opposite);
                if !matches_opposite {
                    continue;
                }
                candidates.push(SailingTuple {
                    dep_time,
                    vessel_id: departing.vessel_id,
                    vessel_name: &departing.vessel_name,
                    raw_max: arrival.max_space_count,
                    drive_up: arrival.drive_up_space_count,
                });
            }
        }
    }
    candidates.sort_by_key(|c| c.dep_time);

    let preferred = candidates
        .iter()
        .find(|c| Some(c.vessel_id) == scheduled_vessel_id && c.drive_up.is_some());
    let fell_back = preferred.is_none();
    let chosen = preferred.or_else(|| candidates.iter().find(|c| c.drive_up.is_some()));

    let Some(chosen) = chosen else {
        // Nothing advertised: last-good within TTL or nothing at all.
        let last = store.last_good(route_id, side, now)?;
        if last.avail_auto.is_none() {
            return None;
        }
        return Some(Capacity {
            is_stale: true,
            ..last
        });
    };

    let max_auto = store.sticky_max(chosen.vessel_id, chosen.raw_max);
    let capacity = Capacity {
        terminal_id: terminal,
        vessel_id: chosen.vessel_id,
        vessel_name: chosen.vessel_name.to_string(),
        max_auto,
        avail_auto: chosen.drive_up,
        last_updated: now,
        is_stale: fell_back,
    };
    store.put_last_good(route_id, side, &capacity, now);
    Some(capacity)
}
