//! Target and task scoring for the critical-path scheduler.

use chrono::NaiveDate;

use crate::config::{CriticalPathConfig, WorkTransform};

/// Transform the work divisor of the target score.
pub fn transform_work(work: f64, config: &CriticalPathConfig) -> f64 {
    let w = work.max(0.1);
    match config.work_transform {
        WorkTransform::Power => {
            if config.work_exponent == 0.0 {
                1.0
            } else if config.work_exponent == 1.0 {
                w
            } else {
                w.powf(config.work_exponent)
            }
        }
        WorkTransform::Log => w.ln().max(0.1),
        WorkTransform::Log10 => w.log10().max(0.1),
    }
}

/// Urgency of a deadline target: `exp(-slack / (K * avg_work))` where
/// `slack = deadline - now - critical_path_length`. Slipping deadlines push
/// urgency above 1.0; comfortable slack decays toward the floor.
pub fn deadline_urgency(
    deadline: NaiveDate,
    critical_path_length: f64,
    now: NaiveDate,
    config: &CriticalPathConfig,
    avg_work: f64,
) -> f64 {
    let days_until = (deadline - now).num_days() as f64;
    let slack = days_until - critical_path_length;

    let urgency = (-slack / (config.k * avg_work.max(1.0))).exp();
    if slack > 0.0 {
        urgency.max(config.urgency_floor)
    } else {
        urgency
    }
}

/// Urgency of a no-deadline target, pegged below the least urgent deadline
/// target so dated work is never starved by undated work. With no deadline
/// targets at all, everything is equally urgent.
pub fn no_deadline_urgency(
    min_deadline_urgency: Option<f64>,
    config: &CriticalPathConfig,
) -> f64 {
    match min_deadline_urgency {
        Some(min) => (min * config.no_deadline_urgency_multiplier).max(config.urgency_floor),
        None => 1.0,
    }
}

/// WSPT: priority per day of work. Higher is better.
pub fn wspt(priority: i32, duration: f64) -> f64 {
    priority as f64 / duration.max(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn tight_deadline_outscores_loose() {
        let config = CriticalPathConfig::default();
        let now = d(2025, 1, 1);

        let tight = deadline_urgency(d(2025, 1, 12), 10.0, now, &config, 10.0);
        let loose = deadline_urgency(d(2025, 2, 1), 10.0, now, &config, 10.0);

        assert!(tight > loose);
        assert!(tight <= 1.0);
        assert!(loose >= config.urgency_floor);
    }

    #[test]
    fn slipping_deadline_exceeds_one() {
        let config = CriticalPathConfig::default();
        // Deadline 5 days ago with 10 days of work left: slack = -15.
        let urgency = deadline_urgency(d(2025, 1, 10), 10.0, d(2025, 1, 15), &config, 10.0);
        let expected = (15.0_f64 / 20.0).exp();
        assert!(urgency > 1.0);
        assert!((urgency - expected).abs() < 1e-9);
    }

    #[test]
    fn far_deadline_hits_the_floor() {
        let config = CriticalPathConfig::default();
        let urgency = deadline_urgency(d(2026, 1, 1), 1.0, d(2025, 1, 1), &config, 1.0);
        assert!((urgency - config.urgency_floor).abs() < 1e-9);
    }

    #[test]
    fn no_deadline_tracks_min_deadline_urgency() {
        let config = CriticalPathConfig::default(); // multiplier 0.5, floor 0.1
        assert!((no_deadline_urgency(Some(0.8), &config) - 0.4).abs() < 1e-9);
        // Floored when the product would go below the floor.
        assert!((no_deadline_urgency(Some(0.05), &config) - 0.1).abs() < 1e-9);
        // No deadline targets anywhere: full urgency.
        assert!((no_deadline_urgency(None, &config) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn wspt_prefers_short_high_priority() {
        assert!(wspt(100, 1.0) > wspt(100, 10.0));
        assert!(wspt(100, 5.0) > wspt(50, 5.0));
        // Zero duration clamps instead of dividing by zero.
        assert!(wspt(50, 0.0).is_finite());
    }

    #[test]
    fn work_transforms() {
        let mut config = CriticalPathConfig::default();
        assert!((transform_work(10.0, &config) - 10.0).abs() < 1e-9);

        config.work_exponent = 0.5;
        assert!((transform_work(100.0, &config) - 10.0).abs() < 1e-9);

        config.work_exponent = 0.0;
        assert!((transform_work(100.0, &config) - 1.0).abs() < 1e-9);

        config.work_transform = WorkTransform::Log;
        config.work_exponent = 1.0;
        let e = std::f64::consts::E;
        assert!((transform_work(e, &config) - 1.0).abs() < 1e-9);

        config.work_transform = WorkTransform::Log10;
        assert!((transform_work(100.0, &config) - 2.0).abs() < 1e-9);
        // Tiny work is floored rather than going negative.
        assert!(transform_work(0.01, &config) >= 0.1);
    }
}
