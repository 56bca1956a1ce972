//! Proximity engine: participant bookkeeping, stale eviction, the periodic tick and change
//! fan-out.
#![forbid(unsafe_code)]

mod engine;
mod handle;
mod tick_loop;

pub use engine::{DEFAULT_STALE_AFTER, EngineStats, ProximityEngine, VisibilityBatch};
pub use handle::EngineHandle;
pub use tick_loop::TickLoop;

pub use proxima_geom::{Position, Vec3};
pub use proxima_visibility::{VisibilityRecord, VisibilitySettings, VisibilityState};

#[cfg(test)]
mod tests;
