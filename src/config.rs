//! Configuration types for the scheduling engine.
//!
//! All knobs flow through explicit config values; there is no global state.
//! Validation happens once, up front, and surfaces `BadConfig` before any
//! scheduling work starts.

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Which scheduling algorithm runs the forward pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Plain chronological greedy pass.
    #[default]
    ParallelSgs,
    /// Parallel SGS with per-tick lookahead simulation.
    BoundedRollout,
    /// Target-driven variant scheduling only critical-path tasks.
    CriticalPath,
}

/// Task prioritization strategy for the forward pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Blended score of critical ratio and priority.
    #[default]
    Weighted,
    /// Critical ratio dominates, priority breaks ties.
    CrFirst,
    /// Priority dominates, critical ratio breaks ties.
    PriorityFirst,
    /// Apparent Tardiness Cost with exponential urgency decay.
    Atc,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Weighted => "weighted",
            Self::CrFirst => "cr_first",
            Self::PriorityFirst => "priority_first",
            Self::Atc => "atc",
        };
        f.write_str(name)
    }
}

/// Knobs for the preprocessor and the sort-key evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub strategy: Strategy,
    /// Weight of CR in the weighted strategy.
    pub cr_weight: f64,
    /// Weight of priority in the weighted strategy.
    pub priority_weight: f64,
    /// Priority for tasks without an explicit one (0-100).
    pub default_priority: i32,
    /// Default CR for no-deadline tasks = max_cr * multiplier, floored.
    pub default_cr_multiplier: f64,
    pub default_cr_floor: f64,
    /// ATC lookahead parameter (1.5-3.0 typical).
    pub atc_k: f64,
    pub atc_default_urgency_multiplier: f64,
    pub atc_default_urgency_floor: f64,
    /// Narration level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Weighted,
            cr_weight: 10.0,
            priority_weight: 1.0,
            default_priority: 50,
            default_cr_multiplier: 2.0,
            default_cr_floor: 10.0,
            atc_k: 2.0,
            atc_default_urgency_multiplier: 1.0,
            atc_default_urgency_floor: 0.3,
            verbosity: 0,
        }
    }
}

impl SchedulingConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !(0..=100).contains(&self.default_priority) {
            return Err(ScheduleError::bad_config(
                "default_priority",
                format!("{} is outside 0..=100", self.default_priority),
            ));
        }
        if self.cr_weight < 0.0 || self.priority_weight < 0.0 {
            return Err(ScheduleError::bad_config(
                "cr_weight/priority_weight",
                "weights must be non-negative",
            ));
        }
        if self.default_cr_multiplier < 0.0 || self.default_cr_floor < 0.0 {
            return Err(ScheduleError::bad_config(
                "default_cr",
                "multiplier and floor must be non-negative",
            ));
        }
        if self.atc_k <= 0.0 {
            return Err(ScheduleError::bad_config("atc_k", "must be positive"));
        }
        if self.atc_default_urgency_floor <= 0.0 {
            return Err(ScheduleError::bad_config(
                "atc_default_urgency_floor",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Knobs for the bounded-rollout lookahead (spec of the trigger condition and
/// the simulation horizon).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Only tasks below this priority are candidates for skipping.
    pub priority_threshold: i32,
    /// Competing task must be at least this much higher-priority.
    pub min_priority_gap: i32,
    /// Only tasks with CR above this (relaxed) are candidates for skipping.
    pub cr_relaxed_threshold: f64,
    /// Competing task's CR must be at least this much lower (more urgent).
    pub min_cr_urgency_gap: f64,
    /// Cap on simulation depth in days.
    pub max_horizon_days: Option<i32>,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            priority_threshold: 70,
            min_priority_gap: 20,
            cr_relaxed_threshold: 5.0,
            min_cr_urgency_gap: 3.0,
            max_horizon_days: Some(30),
        }
    }
}

impl RolloutConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.min_priority_gap < 0 {
            return Err(ScheduleError::bad_config(
                "min_priority_gap",
                "must be non-negative",
            ));
        }
        if self.min_cr_urgency_gap < 0.0 {
            return Err(ScheduleError::bad_config(
                "min_cr_urgency_gap",
                "must be non-negative",
            ));
        }
        if let Some(days) = self.max_horizon_days {
            if days <= 0 {
                return Err(ScheduleError::bad_config(
                    "max_horizon_days",
                    "must be positive when set",
                ));
            }
        }
        Ok(())
    }
}

/// How the work term in the target score is transformed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkTransform {
    /// `work.powf(exponent)`; exponent 1.0 is linear, 0.0 drops the term.
    #[default]
    Power,
    /// Natural logarithm.
    Log,
    /// Base-10 logarithm.
    Log10,
}

/// Knobs for the critical-path scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CriticalPathConfig {
    /// Urgency decay parameter (higher = more tolerant of slack).
    pub k: f64,
    /// Urgency multiplier for targets without deadlines, relative to the
    /// least urgent deadline target.
    pub no_deadline_urgency_multiplier: f64,
    /// Minimum urgency for any target with positive slack.
    pub urgency_floor: f64,
    pub work_transform: WorkTransform,
    /// Exponent for [`WorkTransform::Power`].
    pub work_exponent: f64,
    /// Rollout-on-resource-choice gate.
    pub rollout_enabled: bool,
    /// A competing target must out-score the current one by this ratio.
    pub rollout_score_ratio_threshold: f64,
    pub rollout_max_horizon_days: Option<i32>,
    /// Narration level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for CriticalPathConfig {
    fn default() -> Self {
        Self {
            k: 2.0,
            no_deadline_urgency_multiplier: 0.5,
            urgency_floor: 0.1,
            work_transform: WorkTransform::Power,
            work_exponent: 1.0,
            rollout_enabled: true,
            rollout_score_ratio_threshold: 1.0,
            rollout_max_horizon_days: Some(30),
            verbosity: 0,
        }
    }
}

impl CriticalPathConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.k <= 0.0 {
            return Err(ScheduleError::bad_config("k", "must be positive"));
        }
        if self.urgency_floor <= 0.0 {
            return Err(ScheduleError::bad_config(
                "urgency_floor",
                "must be positive",
            ));
        }
        if self.no_deadline_urgency_multiplier < 0.0 {
            return Err(ScheduleError::bad_config(
                "no_deadline_urgency_multiplier",
                "must be non-negative",
            ));
        }
        if !self.work_exponent.is_finite() {
            return Err(ScheduleError::bad_config(
                "work_exponent",
                "must be finite",
            ));
        }
        if self.rollout_score_ratio_threshold < 0.0 {
            return Err(ScheduleError::bad_config(
                "rollout_score_ratio_threshold",
                "must be non-negative",
            ));
        }
        if let Some(days) = self.rollout_max_horizon_days {
            if days <= 0 {
                return Err(ScheduleError::bad_config(
                    "rollout_max_horizon_days",
                    "must be positive when set",
                ));
            }
        }
        Ok(())
    }
}

/// Top-level configuration: algorithm selection plus per-algorithm knobs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub algorithm: AlgorithmKind,
    pub scheduling: SchedulingConfig,
    pub rollout: RolloutConfig,
    pub critical_path: CriticalPathConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        self.scheduling.validate()?;
        self.rollout.validate()?;
        self.critical_path.validate()
    }
}
