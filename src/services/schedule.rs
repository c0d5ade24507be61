//! Schedule lane resolver.
//!
//! Lane identity comes from the daily schedule rather than from live
//! telemetry: rows departing the route's west-side terminal are scanned
//! for vessel position 1 (upper lane) and 2 (lower lane). Identity
//! derived this way is stable across the day and across direction
//! reversals, so the display never flickers when a vessel turns around.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::LaneSlot;
use crate::providers::wsf::ScheduleRow;

/// A lane's scheduled occupant for the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneIdentity {
    pub slot: LaneSlot,
    pub vessel_id: i32,
    pub vessel_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedLanes {
    pub upper: Option<LaneIdentity>,
    pub lower: Option<LaneIdentity>,
    /// True when the schedule fetch failed or produced no usable rows.
    pub schedule_error: bool,
}

/// The schedule endpoint is addressed by the service's local calendar
/// day; everything else in the system is epoch-based.
pub fn schedule_date_text(now: DateTime<Utc>, timezone: Tz) -> String {
    now.with_timezone(&timezone).format("%Y-%m-%d").to_string()
}

/// Determine which vessel occupies each lane slot from today's
/// schedule. `rows` is `None` when the fetch itself failed.
pub fn resolve_lanes(rows: Option<&[ScheduleRow]>, west_terminal_id: Option<i32>) -> ResolvedLanes {
    let (Some(rows), Some(west)) = (rows, west_terminal_id) else {
        return ResolvedLanes {
            schedule_error: true,
            ..Default::default()
        };
    };

    let identity = |slot: LaneSlot, position: i32| {
        rows.iter()
            .filter(|r| r.departing_terminal_id == west)
            .find(|r| r.vessel_position_num == position)
            .map(|r| LaneIdentity {
                slot,
                vessel_id: r.vessel_id,
                vessel_name: r.vessel_name.clone(),
            })
    };

    let upper = identity(LaneSlot::Upper, 1);
    let lower = identity(LaneSlot::Lower, 2);
    let schedule_error = upper.is_none() && lower.is_none();
    ResolvedLanes {
        upper,
        lower,
        schedule_error,
    }
}
