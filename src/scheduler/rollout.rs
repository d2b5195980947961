//! Rollout decision records.

use chrono::NaiveDate;
use serde::Serialize;

/// The outcome of one rollout comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutChoice {
    /// Commit the task at this tick.
    Schedule,
    /// Leave the resource idle for the competing task.
    Skip,
}

/// Record of one rollout decision, kept for explainability: which task was
/// on the table, who it competed with, and how the two scenarios scored.
#[derive(Clone, Debug, Serialize)]
pub struct RolloutDecision {
    pub task_id: String,
    pub task_priority: i32,
    pub task_cr: f64,
    pub competing_task_id: String,
    pub competing_priority: i32,
    pub competing_cr: f64,
    /// When the competing task becomes eligible.
    pub competing_eligible_date: NaiveDate,
    /// Scenario A: commit now. Lower is better.
    pub schedule_score: f64,
    /// Scenario B: skip this tick. Lower is better.
    pub skip_score: f64,
    pub choice: RolloutChoice,
}
