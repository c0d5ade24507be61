use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One of the two display slots a route's vessels occupy for the day.
///
/// Slot 1 ("upper") nominally runs west to east, slot 2 ("lower") the
/// reverse. The mapping comes from the daily schedule, not from live
/// telemetry, so it stays stable across direction reversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneSlot {
    Upper,
    Lower,
}

impl LaneSlot {
    pub fn number(self) -> u8 {
        match self {
            LaneSlot::Upper => 1,
            LaneSlot::Lower => 2,
        }
    }

    /// Direction assumed for the slot when live telemetry doesn't
    /// match the route's orientation.
    pub fn nominal_direction(self) -> Direction {
        match self {
            LaneSlot::Upper => Direction::WestToEast,
            LaneSlot::Lower => Direction::EastToWest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    WestToEast,
    EastToWest,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    AtDock,
    Underway,
    Unknown,
}

/// Where a lane's data came from on this assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LaneSource {
    Live,
    Stale,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    Live,
    Partial,
    Synthetic,
}

/// One lane of the dot display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    /// Slot number: 1 = upper, 2 = lower
    pub slot: u8,
    pub vessel_id: Option<i32>,
    pub vessel_name: String,
    pub at_dock: bool,
    pub direction: Direction,
    pub departing_terminal_id: Option<i32>,
    pub arriving_terminal_id: Option<i32>,
    pub scheduled_departure: Option<DateTime<Utc>>,
    /// When the vessel last left a dock; falls back to the scheduled
    /// departure when telemetry doesn't carry it.
    pub left_dock: Option<DateTime<Utc>>,
    /// Arrival estimate: upstream's prediction, or left-dock plus the
    /// route's crossing duration.
    pub eta: Option<DateTime<Utc>>,
    pub phase: Phase,
    /// Normalised position along the crossing, 0.0 at the departure
    /// dock and 1.0 at arrival.
    pub dot_position: f64,
    /// The upstream's own arrival prediction, echoed as reported.
    pub current_arrival_time: Option<DateTime<Utc>>,
    pub dock_start_time: Option<DateTime<Utc>>,
    pub dock_start_is_synthetic: bool,
    /// Time at dock as a fraction of one hour, saturating at 1.0.
    pub dock_arc_fraction: Option<f64>,
    pub last_updated_vessels: DateTime<Utc>,
    pub is_stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Lanes {
    pub upper: Lane,
    pub lower: Lane,
}

/// Drive-on vehicle space advertised for the next sailing from one side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub terminal_id: i32,
    pub vessel_id: i32,
    pub vessel_name: String,
    /// Sticky per-vessel maximum; never revised down once observed.
    pub max_auto: Option<i32>,
    pub avail_auto: Option<i32>,
    pub last_updated: DateTime<Utc>,
    pub is_stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CapacityBySide {
    pub west: Option<Capacity>,
    pub east: Option<Capacity>,
}

/// Echo of the requested route's static attributes, with resolved
/// terminal IDs and display labels.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteEcho {
    pub route_id: i32,
    pub description: String,
    pub crossing_minutes: i64,
    pub west_terminal_id: Option<i32>,
    pub east_terminal_id: Option<i32>,
    pub west_label: String,
    pub east_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LaneSources {
    pub upper: LaneSource,
    pub lower: LaneSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Fallback {
    pub mode: FallbackMode,
}

/// Freshness and degradation summary for a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub vessels_stale: bool,
    pub capacity_stale: bool,
    pub schedule_stale: bool,
    pub lane_sources: LaneSources,
    pub fallback: Fallback,
    /// What to distrust: "ok", or "+"-joined causes out of
    /// missing_lane, stale_lane, api_error; "synthetic_no_live_data"
    /// on the synthetic path.
    pub reason: String,
}

/// The full dot-state snapshot handed to the display layer. Every
/// 200-class response carries one of these, however degraded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub route: RouteEcho,
    pub lanes: Lanes,
    pub capacity: Option<CapacityBySide>,
    pub meta: Meta,
}
