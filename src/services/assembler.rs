//! State assembler.
//!
//! Fuses the three upstream feeds into one internally consistent
//! snapshot per request. The feeds fail independently and are degraded
//! independently; the only error a caller ever sees is "unknown route".
//! Everything else comes back as a well-formed snapshot whose meta
//! block says what to distrust.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::catalog::{self, Route, TerminalIds};
use crate::models::{
    CapacityBySide, Fallback, FallbackMode, Lane, LaneSlot, LaneSource, LaneSources, Lanes, Meta,
    Phase, RouteEcho, Snapshot,
};
use crate::providers::wsf::{LiveVessel, ScheduleRow, TerminalSpace, WsfClient, WsfError};
use crate::services::capacity::{derive_capacity, CapacityStore, Side};
use crate::services::dock::DockTracker;
use crate::services::fuser::{fuse_lane, FusedLane};
use crate::services::lane_cache::LaneCache;
use crate::services::schedule::{resolve_lanes, schedule_date_text};

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Unknown route {0}")]
    UnknownRoute(i32),
}

/// Owns the upstream client and all process-wide assembly state.
pub struct Assembler {
    client: WsfClient,
    timezone: Tz,
    lane_cache: LaneCache,
    dock: DockTracker,
    capacity: CapacityStore,
}

impl Assembler {
    pub fn new(client: WsfClient, timezone: Tz) -> Self {
        Self {
            client,
            timezone,
            lane_cache: LaneCache::new(),
            dock: DockTracker::new(),
            capacity: CapacityStore::new(),
        }
    }

    /// Number of lanes currently held in the last-good cache.
    pub fn cached_lane_count(&self) -> usize {
        self.lane_cache.len()
    }

    /// Number of vessels with a learned sticky maximum.
    pub fn sticky_vessel_count(&self) -> usize {
        self.capacity.sticky_len()
    }

    /// Build the dot-state snapshot for a route.
    pub async fn build_snapshot(&self, route_id: i32) -> Result<Snapshot, AssembleError> {
        let route = catalog::get(route_id).ok_or(AssembleError::UnknownRoute(route_id))?;
        let ids = catalog::resolve(route);

        // One capture of the clock before any I/O so every derived
        // instant in the snapshot is consistent.
        let now = Utc::now();
        let date_text = schedule_date_text(now, self.timezone);

        let (vessels, spaces, schedule) = tokio::join!(
            self.client.fetch_vessels(),
            self.client.fetch_terminal_spaces(),
            self.client.fetch_schedule(route_id, &date_text),
        );

        Ok(self.assemble(route, ids, now, vessels, spaces, schedule))
    }

    /// Synchronous core: everything after the fetches. Split out so the
    /// fusion logic is exercisable without a network.
    pub(crate) fn assemble(
        &self,
        route: &Route,
        ids: TerminalIds,
        now: DateTime<Utc>,
        vessels: Result<Vec<LiveVessel>, WsfError>,
        spaces: Result<Vec<TerminalSpace>, WsfError>,
        schedule: Result<Vec<ScheduleRow>, WsfError>,
    ) -> Snapshot {
        let vessels_stale = vessels.is_err();
        let capacity_stale = spaces.is_err();
        let schedule_stale = schedule.is_err();
        for (feed, error) in [
            ("vessellocations", vessels.as_ref().err()),
            ("terminalsailingspace", spaces.as_ref().err()),
            ("schedule", schedule.as_ref().err()),
        ] {
            if let Some(error) = error {
                warn!(route_id = route.route_id, feed, error = %error, "Feed unavailable, degrading");
            }
        }
        let api_error = vessels_stale || capacity_stale || schedule_stale;

        let resolved = resolve_lanes(schedule.as_deref().ok(), ids.west);
        if resolved.schedule_error && resolved.upper.is_none() && resolved.lower.is_none() {
            return self.synthetic_snapshot(route, ids, now);
        }

        let vessels_by_id: HashMap<i32, LiveVessel> = vessels
            .unwrap_or_default()
            .into_iter()
            .map(|v| (v.vessel_id, v))
            .collect();

        let mut upper = fuse_lane(
            route,
            ids,
            LaneSlot::Upper,
            resolved.upper.as_ref(),
            &vessels_by_id,
            &self.lane_cache,
            now,
        );
        let mut lower = fuse_lane(
            route,
            ids,
            LaneSlot::Lower,
            resolved.lower.as_ref(),
            &vessels_by_id,
            &self.lane_cache,
            now,
        );

        for (slot, fused) in [
            (LaneSlot::Upper, &mut upper),
            (LaneSlot::Lower, &mut lower),
        ] {
            if !fused.stale_snapped {
                self.dock.annotate(route.route_id, slot, &mut fused.lane, now);
            }
        }

        let spaces = spaces.ok();
        let west_capacity = derive_capacity(
            &self.capacity,
            route.route_id,
            Side::West,
            ids.west,
            ids.east,
            spaces.as_deref(),
            side_vessel_hint(ids.west, &upper, &lower),
            now,
        );
        let east_capacity = derive_capacity(
            &self.capacity,
            route.route_id,
            Side::East,
            ids.east,
            ids.west,
            spaces.as_deref(),
            side_vessel_hint(ids.east, &upper, &lower),
            now,
        );
        let capacity = match (west_capacity, east_capacity) {
            (None, None) => None,
            (west, east) => Some(CapacityBySide { west, east }),
        };

        let sources = LaneSources {
            upper: upper.source,
            lower: lower.source,
        };
        let all_live =
            sources.upper == LaneSource::Live && sources.lower == LaneSource::Live && !api_error;
        let mode = if all_live {
            FallbackMode::Live
        } else {
            FallbackMode::Partial
        };

        Snapshot {
            route: route_echo(route, ids),
            lanes: Lanes {
                upper: upper.lane,
                lower: lower.lane,
            },
            capacity,
            meta: Meta {
                vessels_stale,
                capacity_stale,
                schedule_stale,
                reason: reason(&sources, api_error),
                lane_sources: sources,
                fallback: Fallback { mode },
            },
        }
    }

    /// Emitted only when the schedule is completely unusable: both
    /// lanes carry placeholder timing fabricated from `now` and the
    /// crossing duration, so the display always has something to draw.
    fn synthetic_snapshot(&self, route: &Route, ids: TerminalIds, now: DateTime<Utc>) -> Snapshot {
        warn!(route_id = route.route_id, "Schedule unusable, serving synthetic snapshot");
        let lane = |slot: LaneSlot| synthetic_lane(route, ids, slot, now);
        Snapshot {
            route: route_echo(route, ids),
            lanes: Lanes {
                upper: lane(LaneSlot::Upper),
                lower: lane(LaneSlot::Lower),
            },
            capacity: None,
            meta: Meta {
                vessels_stale: true,
                capacity_stale: true,
                schedule_stale: true,
                lane_sources: LaneSources {
                    upper: LaneSource::Missing,
                    lower: LaneSource::Missing,
                },
                fallback: Fallback {
                    mode: FallbackMode::Synthetic,
                },
                reason: "synthetic_no_live_data".to_string(),
            },
        }
    }
}

fn synthetic_lane(route: &Route, ids: TerminalIds, slot: LaneSlot, now: DateTime<Utc>) -> Lane {
    let direction = slot.nominal_direction();
    let (departing, arriving) = match slot {
        LaneSlot::Upper => (ids.west, ids.east),
        LaneSlot::Lower => (ids.east, ids.west),
    };
    Lane {
        slot: slot.number(),
        vessel_id: None,
        vessel_name: "Unknown".to_string(),
        at_dock: false,
        direction,
        departing_terminal_id: departing,
        arriving_terminal_id: arriving,
        scheduled_departure: None,
        left_dock: Some(now),
        eta: Some(now + Duration::minutes(route.crossing_minutes)),
        phase: Phase::Underway,
        dot_position: 0.0,
        current_arrival_time: None,
        dock_start_time: None,
        dock_start_is_synthetic: false,
        dock_arc_fraction: None,
        last_updated_vessels: now,
        is_stale: true,
    }
}

/// The schedule-chosen vessel for one side: the lane currently
/// departing that side's terminal.
fn side_vessel_hint(
    side_terminal: Option<i32>,
    upper: &FusedLane,
    lower: &FusedLane,
) -> Option<i32> {
    let terminal = side_terminal?;
    [upper, lower]
        .into_iter()
        .find(|f| f.lane.departing_terminal_id == Some(terminal))
        .and_then(|f| f.lane.vessel_id)
}

fn route_echo(route: &Route, ids: TerminalIds) -> RouteEcho {
    RouteEcho {
        route_id: route.route_id,
        description: route.description.to_string(),
        crossing_minutes: route.crossing_minutes,
        west_terminal_id: ids.west,
        east_terminal_id: ids.east,
        west_label: route.west_name.to_uppercase(),
        east_label: route.east_name.to_uppercase(),
    }
}

fn reason(sources: &LaneSources, api_error: bool) -> String {
    let lanes = [sources.upper, sources.lower];
    let mut causes = Vec::new();
    if lanes.contains(&LaneSource::Missing) {
        causes.push("missing_lane");
    }
    if lanes.contains(&LaneSource::Stale) {
        causes.push("stale_lane");
    }
    if api_error {
        causes.push("api_error");
    }
    if causes.is_empty() {
        "ok".to_string()
    } else {
        causes.join("+")
    }
}
