//! Dock-arc tracker.
//!
//! The upstream never says when a vessel tied up, so the moment of
//! docking has to be observed: a lane seen at dock that was underway on
//! the previous assembly docked "now". That observation is the only
//! state that must survive across requests. When there is no usable
//! history (process boot, or the lane was previously unknown) the dock
//! start is synthesised from the scheduled departure and flagged so the
//! display can weaken it.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{Lane, LaneSlot};

/// Loading a ferry takes roughly this long; the boot-time guess assumes
/// the vessel reached the dock that far ahead of its next departure.
const BOOT_DOCK_LEAD_MINUTES: i64 = 25;

const DOCK_ARC_WINDOW_SECONDS: f64 = 3600.0;

#[derive(Debug, Clone, Copy)]
struct DockRecord {
    at_dock: bool,
    dock_start_time: Option<DateTime<Utc>>,
    synthetic: bool,
}

/// Per (route, slot) memory of dock entry times.
#[derive(Default)]
pub struct DockTracker {
    records: Mutex<HashMap<(i32, LaneSlot), DockRecord>>,
}

impl DockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the lane's dock-start time from its current dock state
    /// and the previous observation, then remember the outcome.
    ///
    /// Callers must not pass stale lanes that were snapped to the dock
    /// by the past-eta rule; those keep a null dock start until the
    /// next live observation.
    pub fn annotate(&self, route_id: i32, slot: LaneSlot, lane: &mut Lane, now: DateTime<Utc>) {
        let key = (route_id, slot);
        let previous = self
            .records
            .lock()
            .ok()
            .and_then(|records| records.get(&key).copied());

        let next = if lane.at_dock {
            match previous {
                Some(prev) if prev.at_dock && prev.dock_start_time.is_some() => DockRecord {
                    at_dock: true,
                    dock_start_time: prev.dock_start_time,
                    synthetic: prev.synthetic,
                },
                Some(prev) if !prev.at_dock => DockRecord {
                    // Watched the vessel arrive: this instant is the
                    // real dock entry, not the telemetry timestamp.
                    at_dock: true,
                    dock_start_time: Some(now),
                    synthetic: false,
                },
                _ => DockRecord {
                    at_dock: true,
                    dock_start_time: Some(synthesize_boot_start(lane.scheduled_departure, now)),
                    synthetic: true,
                },
            }
        } else {
            DockRecord {
                at_dock: false,
                dock_start_time: None,
                synthetic: false,
            }
        };

        if let Ok(mut records) = self.records.lock() {
            records.insert(key, next);
        }

        lane.dock_start_time = next.dock_start_time;
        lane.dock_start_is_synthetic = next.synthetic;
        lane.dock_arc_fraction = next
            .dock_start_time
            .map(|start| dock_arc_fraction(start, now));
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

/// Fraction of one hour spent at the dock, saturating at 1.0.
fn dock_arc_fraction(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = (now - start).num_milliseconds() as f64 / 1000.0;
    (elapsed / DOCK_ARC_WINDOW_SECONDS).clamp(0.0, 1.0)
}

/// Boot-time guess for when the vessel reached the dock. Clamped so a
/// far-future scheduled departure can't place the start after `now`.
fn synthesize_boot_start(
    scheduled_departure: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match scheduled_departure {
        Some(departure) => (departure - Duration::minutes(BOOT_DOCK_LEAD_MINUTES)).min(now),
        None => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Phase};

    fn docked_lane(now: DateTime<Utc>, scheduled_departure: Option<DateTime<Utc>>) -> Lane {
        Lane {
            slot: 1,
            vessel_id: Some(36),
            vessel_name: "Tacoma".to_string(),
            at_dock: true,
            direction: Direction::WestToEast,
            departing_terminal_id: Some(3),
            arriving_terminal_id: Some(7),
            scheduled_departure,
            left_dock: None,
            eta: None,
            phase: Phase::AtDock,
            dot_position: 0.0,
            current_arrival_time: None,
            dock_start_time: None,
            dock_start_is_synthetic: false,
            dock_arc_fraction: None,
            last_updated_vessels: now,
            is_stale: false,
        }
    }

    fn underway_lane(now: DateTime<Utc>) -> Lane {
        let mut lane = docked_lane(now, None);
        lane.at_dock = false;
        lane.phase = Phase::Underway;
        lane
    }

    #[test]
    fn boot_synthesizes_from_scheduled_departure() {
        let tracker = DockTracker::new();
        let now = Utc::now();
        let mut lane = docked_lane(now, Some(now + Duration::minutes(10)));

        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);

        assert_eq!(lane.dock_start_time, Some(now - Duration::minutes(15)));
        assert!(lane.dock_start_is_synthetic);
        let fraction = lane.dock_arc_fraction.unwrap();
        assert!((fraction - 0.25).abs() < 1e-9);
    }

    #[test]
    fn boot_without_schedule_uses_now() {
        let tracker = DockTracker::new();
        let now = Utc::now();
        let mut lane = docked_lane(now, None);

        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);

        assert_eq!(lane.dock_start_time, Some(now));
        assert!(lane.dock_start_is_synthetic);
        assert_eq!(lane.dock_arc_fraction, Some(0.0));
    }

    #[test]
    fn boot_start_never_lands_in_the_future() {
        let tracker = DockTracker::new();
        let now = Utc::now();
        // Departure far enough out that departure - 25min > now.
        let mut lane = docked_lane(now, Some(now + Duration::hours(2)));

        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);

        assert_eq!(lane.dock_start_time, Some(now));
        assert!(lane.dock_start_is_synthetic);
    }

    #[test]
    fn real_transition_records_now() {
        let tracker = DockTracker::new();
        let now = Utc::now();

        let mut lane = underway_lane(now);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);
        assert!(lane.dock_start_time.is_none());
        assert!(lane.dock_arc_fraction.is_none());

        let later = now + Duration::minutes(5);
        let mut lane = docked_lane(later, Some(later + Duration::minutes(40)));
        tracker.annotate(5, LaneSlot::Upper, &mut lane, later);

        assert_eq!(lane.dock_start_time, Some(later));
        assert!(!lane.dock_start_is_synthetic);
        assert_eq!(lane.dock_arc_fraction, Some(0.0));
    }

    #[test]
    fn continued_docking_keeps_the_original_start() {
        let tracker = DockTracker::new();
        let now = Utc::now();

        let mut lane = underway_lane(now);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);

        let docked_at = now + Duration::minutes(1);
        let mut lane = docked_lane(docked_at, None);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, docked_at);

        let later = docked_at + Duration::minutes(30);
        let mut lane = docked_lane(later, None);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, later);

        assert_eq!(lane.dock_start_time, Some(docked_at));
        assert!(!lane.dock_start_is_synthetic);
        let fraction = lane.dock_arc_fraction.unwrap();
        assert!((fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn arc_fraction_saturates_at_one() {
        let tracker = DockTracker::new();
        let now = Utc::now();

        let mut lane = underway_lane(now);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);
        let mut lane = docked_lane(now, None);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);

        let later = now + Duration::hours(3);
        let mut lane = docked_lane(later, None);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, later);

        assert_eq!(lane.dock_arc_fraction, Some(1.0));
    }

    #[test]
    fn leaving_the_dock_clears_memory() {
        let tracker = DockTracker::new();
        let now = Utc::now();

        let mut lane = docked_lane(now, None);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, now);

        let mut lane = underway_lane(now + Duration::minutes(2));
        tracker.annotate(5, LaneSlot::Upper, &mut lane, now + Duration::minutes(2));
        assert!(lane.dock_start_time.is_none());
        assert!(!lane.dock_start_is_synthetic);
        assert!(lane.dock_arc_fraction.is_none());

        // Docking again after the clear is a real transition.
        let again = now + Duration::minutes(4);
        let mut lane = docked_lane(again, None);
        tracker.annotate(5, LaneSlot::Upper, &mut lane, again);
        assert_eq!(lane.dock_start_time, Some(again));
        assert!(!lane.dock_start_is_synthetic);
    }

    #[test]
    fn slots_track_independently() {
        let tracker = DockTracker::new();
        let now = Utc::now();

        let mut upper = docked_lane(now, None);
        tracker.annotate(5, LaneSlot::Upper, &mut upper, now);

        let mut lower = underway_lane(now);
        tracker.annotate(5, LaneSlot::Lower, &mut lower, now);

        assert!(upper.dock_start_time.is_some());
        assert!(lower.dock_start_time.is_none());
        assert_eq!(tracker.len(), 2);
    }
}
