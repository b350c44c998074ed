//! Subject performance normalization and aggregation.
//!
//! Rows flow forward through four pure stages: [`subjects`] discovery, [`row`]
//! normalization, [`metrics`] computation and [`series`] alignment. [`snapshot`] composes
//! them for one dashboard render; [`ipc`] exposes them to a sidecar host.

pub mod config;
pub mod ipc;
pub mod metrics;
pub mod row;
pub mod series;
pub mod snapshot;
pub mod subjects;

pub use config::EngineConfig;
pub use metrics::{compute_per_test_stat, PerTestStat, SubjectStat};
pub use row::{classify_row_shape, normalize_row, ResultRow, RowShape, SubjectBreakdown};
pub use series::{align_series, sort_test_labels, AlignedSeries, TrendPoint};
pub use snapshot::{build_snapshot, Snapshot, SnapshotOptions};
pub use subjects::discover_subjects;
