//! Resource-constrained scheduling engine for roadmap planning.
//!
//! Takes a bundle of tasks (durations, dependencies with lag, deadlines,
//! priorities, resource requirements), resources (with do-not-schedule
//! periods), and configuration, and produces a concrete schedule: every task
//! gets start/end dates and a concrete resource set.
//!
//! Three algorithms share the same machinery:
//! - [`AlgorithmKind::ParallelSgs`]: chronological greedy forward pass.
//! - [`AlgorithmKind::BoundedRollout`]: the forward pass plus a per-tick
//!   lookahead that simulates commit-now against wait-one-tick.
//! - [`AlgorithmKind::CriticalPath`]: target-driven scheduling that only
//!   touches tasks on a worthwhile target's critical path.
//!
//! The entry point is [`schedule`]; results are deterministic for a given
//! bundle.
//!
//! ```
//! use chronoplan::{schedule, Resource, ScheduleBundle, Task};
//! use chrono::NaiveDate;
//!
//! let tasks = vec![Task {
//!     id: "design".to_string(),
//!     duration_days: 5.0,
//!     resources: vec![("ann".to_string(), 1.0)],
//!     ..Task::default()
//! }];
//! let resources = vec![Resource::new("ann")];
//! let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
//!
//! let outcome = schedule(&ScheduleBundle::new(tasks, resources, start)).unwrap();
//! assert_eq!(outcome.get("design").unwrap().start_date, start);
//! ```

mod config;
mod critical_path;
mod engine;
mod error;
mod index;
pub mod logging;
mod models;
mod preprocess;
mod resources;
mod scheduler;
mod sorting;
mod timeframe;

pub use config::{
    AlgorithmKind, CriticalPathConfig, EngineConfig, RolloutConfig, SchedulingConfig, Strategy,
    WorkTransform,
};
pub use critical_path::{CpScheduler, Target, TargetCache, TaskTable, TaskTiming};
pub use engine::schedule;
pub use error::{ScheduleError, ScheduleWarning};
pub use models::{
    AlgorithmResult, Dependency, Resource, ResourceGroup, ScheduleBundle, ScheduleOutcome,
    ScheduledTask, Task,
};
pub use preprocess::{backward_pass, PreprocessResult};
pub use resources::{ResourceCatalog, ResourceSpec, UNASSIGNED_RESOURCE};
pub use scheduler::{ResourceCalendar, RolloutChoice, RolloutDecision, SgsScheduler};
pub use sorting::{sort_tasks, AtcParams, SortKey, TaskSortInfo};
pub use timeframe::parse_timeframe;
