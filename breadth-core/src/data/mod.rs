//! Acquisition layer: upstream sources, pacing, scheduling, matrix assembly.

pub mod assemble;
pub mod breaker;
pub mod finmind;
pub mod provider;
pub mod scheduler;
pub mod snapshot;
pub mod synthetic;
pub mod universe;

pub use assemble::{assemble, WideMatrix};
pub use breaker::QuotaBreaker;
pub use finmind::FinMindSource;
pub use provider::{FetchError, FetchProgress, MarketDataSource, SilentProgress, StdoutProgress};
pub use scheduler::{acquire, AcquisitionReport, PlanStrategy, UnitOutcome};
pub use snapshot::{ObservationSnapshot, SnapshotMeta};
pub use synthetic::SyntheticSource;
pub use universe::Universe;
