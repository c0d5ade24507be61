pub mod assembler;
pub mod capacity;
pub mod dock;
pub mod fuser;
pub mod lane_cache;
pub mod schedule;

/// Freshness window shared by the lane cache and last-good capacity.
pub const LAST_GOOD_TTL_SECONDS: i64 = 600;
