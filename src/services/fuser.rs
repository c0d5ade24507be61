//! Vessel fuser.
//!
//! Joins the schedule-derived lane identity with the live vessel record
//! for that vessel, deriving direction, dock state, timing, and the
//! normalised dot position. When the live record is missing the fuser
//! falls back to the last-good lane cache, and failing that emits a
//! degraded placeholder lane so the snapshot schema always holds.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::catalog::{Route, TerminalIds};
use crate::models::{Direction, Lane, LaneSlot, LaneSource, Phase};
use crate::providers::wsf::LiveVessel;
use crate::services::lane_cache::LaneCache;
use crate::services::schedule::LaneIdentity;

/// How the live terminals relate to the route's west/east orientation.
/// Kept explicit so the nominal-direction fallback is a single branch
/// rather than a silent coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    MatchedForward,
    MatchedReverse,
    Unknown,
}

/// A fused lane plus bookkeeping the assembler needs.
#[derive(Debug, Clone)]
pub struct FusedLane {
    pub lane: Lane,
    pub source: LaneSource,
    /// True when the stale-snap rule fired: the lane is a cache reuse
    /// whose eta has already passed, so it was forced to the dock.
    /// Such lanes are excluded from dock-start tracking.
    pub stale_snapped: bool,
}

/// Fuse one lane slot from schedule identity and live telemetry.
pub fn fuse_lane(
    route: &Route,
    ids: TerminalIds,
    slot: LaneSlot,
    identity: Option<&LaneIdentity>,
    vessels_by_id: &HashMap<i32, LiveVessel>,
    cache: &LaneCache,
    now: DateTime<Utc>,
) -> FusedLane {
    let live = identity.and_then(|id| vessels_by_id.get(&id.vessel_id));

    if let (Some(identity), Some(vessel)) = (identity, live) {
        let lane = live_lane(route, ids, slot, identity, vessel, now);
        cache.put(route.route_id, slot, &lane, now);
        return FusedLane {
            lane,
            source: LaneSource::Live,
            stale_snapped: false,
        };
    }

    if let Some(mut lane) = cache.get(route.route_id, slot, now) {
        lane.is_stale = true;
        lane.last_updated_vessels = now;

        // A reused lane whose arrival estimate has passed would animate
        // a phantom vessel sailing off the end of the crossing; snap it
        // to the arrival dock instead. The dock arc stays unset until a
        // live observation confirms the docking.
        let snapped = lane.eta.is_some_and(|eta| eta < now);
        if snapped {
            lane.at_dock = true;
            lane.phase = Phase::AtDock;
            lane.dot_position = 1.0;
            lane.dock_start_time = None;
            lane.dock_start_is_synthetic = false;
            lane.dock_arc_fraction = None;
        }
        return FusedLane {
            lane,
            source: LaneSource::Stale,
            stale_snapped: snapped,
        };
    }

    FusedLane {
        lane: missing_lane(ids, slot, now),
        source: LaneSource::Missing,
        stale_snapped: false,
    }
}

fn live_lane(
    route: &Route,
    ids: TerminalIds,
    slot: LaneSlot,
    identity: &LaneIdentity,
    vessel: &LiveVessel,
    now: DateTime<Utc>,
) -> Lane {
    let direction = match orientation(vessel, ids) {
        Orientation::MatchedForward => Direction::WestToEast,
        Orientation::MatchedReverse => Direction::EastToWest,
        Orientation::Unknown => slot.nominal_direction(),
    };

    let left_dock = vessel.left_dock.or(vessel.scheduled_departure);
    let eta = vessel.eta.or_else(|| {
        match (left_dock, route.crossing_minutes > 0) {
            (Some(left), true) => Some(left + Duration::minutes(route.crossing_minutes)),
            _ => None,
        }
    });

    let dot_position = if vessel.at_dock {
        0.0
    } else {
        dot_position(now, left_dock, eta)
    };

    let phase = if vessel.at_dock {
        Phase::AtDock
    } else if eta.is_some() {
        Phase::Underway
    } else {
        Phase::Unknown
    };

    Lane {
        slot: slot.number(),
        vessel_id: Some(vessel.vessel_id),
        vessel_name: identity.vessel_name.clone(),
        at_dock: vessel.at_dock,
        direction,
        departing_terminal_id: vessel.departing_terminal_id,
        arriving_terminal_id: vessel.arriving_terminal_id,
        scheduled_departure: vessel.scheduled_departure,
        left_dock,
        eta,
        phase,
        dot_position,
        current_arrival_time: vessel.eta,
        dock_start_time: None,
        dock_start_is_synthetic: false,
        dock_arc_fraction: None,
        last_updated_vessels: now,
        is_stale: false,
    }
}

/// Placeholder lane for a slot with neither live telemetry nor a fresh
/// cached observation.
fn missing_lane(ids: TerminalIds, slot: LaneSlot, now: DateTime<Utc>) -> Lane {
    let direction = slot.nominal_direction();
    let (departing, arriving) = match direction {
        Direction::EastToWest => (ids.east, ids.west),
        _ => (ids.west, ids.east),
    };
    Lane {
        slot: slot.number(),
        vessel_id: None,
        vessel_name: "Unknown".to_string(),
        at_dock: true,
        direction,
        departing_terminal_id: departing,
        arriving_terminal_id: arriving,
        scheduled_departure: None,
        left_dock: None,
        eta: None,
        phase: Phase::Unknown,
        dot_position: 0.0,
        current_arrival_time: None,
        dock_start_time: None,
        dock_start_is_synthetic: false,
        dock_arc_fraction: None,
        last_updated_vessels: now,
        is_stale: false,
    }
}

fn orientation(vessel: &LiveVessel, ids: TerminalIds) -> Orientation {
    match (
        vessel.departing_terminal_id,
        vessel.arriving_terminal_id,
        ids.west,
        ids.east,
    ) {
        (Some(dep), Some(arr), Some(west), Some(east)) if dep == west && arr == east => {
            Orientation::MatchedForward
        }
        (Some(dep), Some(arr), Some(west), Some(east)) if dep == east && arr == west => {
            Orientation::MatchedReverse
        }
        _ => Orientation::Unknown,
    }
}

/// Position along the crossing in [0, 1]. Zero when timing is missing,
/// before departure, or when the interval is degenerate.
fn dot_position(
    now: DateTime<Utc>,
    left_dock: Option<DateTime<Utc>>,
    eta: Option<DateTime<Utc>>,
) -> f64 {
    let (Some(left), Some(eta)) = (left_dock, eta) else {
        return 0.0;
    };
    let total = (eta - left).num_milliseconds() as f64;
    if total <= 0.0 {
        return 0.0;
    }
    let elapsed = (now - left).num_milliseconds() as f64;
    (elapsed / total).clamp(0.0, 1.0)
}
