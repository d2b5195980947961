//! End-to-end scheduling scenarios.

use chrono::NaiveDate;
use chronoplan::{
    schedule, AlgorithmKind, Dependency, Resource, ResourceGroup, RolloutChoice, ScheduleBundle,
    ScheduleError, ScheduleOutcome, ScheduleWarning, Strategy, Task,
};

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn on(resource: &str) -> Vec<(String, f64)> {
    vec![(resource.to_string(), 1.0)]
}

fn bundle(tasks: Vec<Task>, resources: Vec<Resource>) -> ScheduleBundle {
    ScheduleBundle::new(tasks, resources, d(2025, 1, 1))
}

/// Every dependency edge in the outcome satisfies `pred.end + lag < start`.
fn assert_dependencies_respected(tasks: &[Task], outcome: &ScheduleOutcome) {
    for task in tasks {
        let Some(entry) = outcome.get(&task.id) else {
            continue;
        };
        for dep in &task.dependencies {
            let Some(pred) = outcome.get(&dep.pred) else {
                continue;
            };
            let gap = (entry.start_date - pred.end_date).num_days() as f64;
            assert!(
                gap > dep.lag_days,
                "{} starts {} but {} ends {} (lag {})",
                task.id,
                entry.start_date,
                dep.pred,
                pred.end_date,
                dep.lag_days
            );
        }
    }
}

/// No resource runs two tasks at once.
fn assert_resource_exclusivity(outcome: &ScheduleOutcome) {
    use std::collections::HashMap;
    let mut by_resource: HashMap<&str, Vec<(NaiveDate, NaiveDate, &str)>> = HashMap::new();
    for entry in &outcome.result.scheduled_tasks {
        for resource in &entry.resources {
            by_resource.entry(resource).or_default().push((
                entry.start_date,
                entry.end_date,
                &entry.task_id,
            ));
        }
    }
    for (resource, mut spans) in by_resource {
        spans.sort();
        for pair in spans.windows(2) {
            let (_, prev_end, prev_id) = pair[0];
            let (next_start, _, next_id) = pair[1];
            assert!(
                next_start > prev_end,
                "{resource} double-booked: {prev_id} until {prev_end}, {next_id} from {next_start}"
            );
        }
    }
}

// S1: one resource, two deadline tasks, same deadline, different durations.
// The longer task is more urgent under the weighted strategy and goes first;
// the short one lands past the deadline and warns instead of failing.
#[test]
fn s1_weighted_orders_by_urgency_and_warns_on_misses() {
    let deadline = d(2025, 1, 25);
    let tasks = vec![
        Task {
            id: "a".to_string(),
            duration_days: 20.0,
            resources: on("alice"),
            end_before: Some(deadline),
            ..Task::default()
        },
        Task {
            id: "b".to_string(),
            duration_days: 5.0,
            resources: on("alice"),
            end_before: Some(deadline),
            ..Task::default()
        },
    ];
    let outcome = schedule(&bundle(tasks.clone(), vec![Resource::new("alice")])).unwrap();

    let a = outcome.get("a").unwrap();
    let b = outcome.get("b").unwrap();

    assert_eq!(a.start_date, d(2025, 1, 1));
    assert_eq!(a.end_date, d(2025, 1, 21));
    assert_eq!(b.start_date, d(2025, 1, 22));
    assert_eq!(b.end_date, d(2025, 1, 27));

    assert_eq!(
        outcome.warnings,
        vec![ScheduleWarning::DeadlineMissed {
            task_id: "b".to_string(),
            computed_end: d(2025, 1, 27),
            required_end: deadline,
        }]
    );
    assert_resource_exclusivity(&outcome);
    assert_dependencies_respected(&tasks, &outcome);
}

// S2: dependency with a one-week lag.
#[test]
fn s2_lag_delays_the_successor() {
    let tasks = vec![
        Task {
            id: "design".to_string(),
            duration_days: 3.0,
            resources: on("alice"),
            ..Task::default()
        },
        Task {
            id: "impl".to_string(),
            duration_days: 10.0,
            resources: on("alice"),
            dependencies: vec![Dependency::with_lag("design", 7.0)],
            ..Task::default()
        },
    ];
    let outcome = schedule(&bundle(tasks.clone(), vec![Resource::new("alice")])).unwrap();

    let design = outcome.get("design").unwrap();
    let implementation = outcome.get("impl").unwrap();

    assert_eq!(design.start_date, d(2025, 1, 1));
    assert_eq!(design.end_date, d(2025, 1, 4));
    // design end + 7 day lag + 1 day gap.
    assert_eq!(implementation.start_date, d(2025, 1, 12));
    assert_eq!(implementation.end_date, d(2025, 1, 22));
    assert_dependencies_respected(&tasks, &outcome);
}

// S3: a DNS period interrupts a task; work resumes afterwards and the span
// stretches by exactly the DNS days.
#[test]
fn s3_dns_interruption_stretches_the_span() {
    let tasks = vec![Task {
        id: "t".to_string(),
        duration_days: 10.0,
        resources: on("alice"),
        ..Task::default()
    }];
    let resources = vec![Resource {
        id: "alice".to_string(),
        dns_periods: vec![(d(2025, 1, 6), d(2025, 1, 10))],
    }];
    let outcome = schedule(&bundle(tasks, resources)).unwrap();

    let t = outcome.get("t").unwrap();
    assert_eq!(t.start_date, d(2025, 1, 1));
    // 5 working days, 5 DNS days, 5 working days.
    assert_eq!(t.end_date, d(2025, 1, 16));
    let span = (t.end_date - t.start_date).num_days();
    assert_eq!(span as f64, t.duration_days + 5.0);
}

// S4: auto-assignment picks the candidate that completes first, not the one
// listed first.
#[test]
fn s4_auto_assignment_picks_faster_completion() {
    let tasks = vec![Task {
        id: "t".to_string(),
        duration_days: 5.0,
        resource_spec: Some("a|b".to_string()),
        ..Task::default()
    }];
    let resources = vec![
        Resource {
            id: "a".to_string(),
            dns_periods: vec![(d(2025, 1, 1), d(2025, 1, 10))],
        },
        Resource::new("b"),
    ];
    let outcome = schedule(&bundle(tasks, resources)).unwrap();

    let t = outcome.get("t").unwrap();
    assert_eq!(t.resources, vec!["b"]);
    assert_eq!(t.start_date, d(2025, 1, 1));
    assert_eq!(t.end_date, d(2025, 1, 6));
}

// S5: bounded rollout holds a relaxed task back when a strictly more urgent
// task unlocks before it would finish.
#[test]
fn s5_rollout_prefers_to_wait() {
    let tasks = vec![
        Task {
            id: "blocker".to_string(),
            duration_days: 1.0,
            resources: on("bob"),
            priority: Some(50),
            ..Task::default()
        },
        Task {
            id: "low".to_string(),
            duration_days: 10.0,
            resources: on("alice"),
            priority: Some(30),
            ..Task::default()
        },
        Task {
            id: "high".to_string(),
            duration_days: 5.0,
            resources: on("alice"),
            priority: Some(90),
            end_before: Some(d(2025, 1, 22)),
            dependencies: vec![Dependency::new("blocker")],
            ..Task::default()
        },
    ];
    let mut b = bundle(
        tasks.clone(),
        vec![Resource::new("alice"), Resource::new("bob")],
    );
    b.config.algorithm = AlgorithmKind::BoundedRollout;

    let outcome = schedule(&b).unwrap();

    let high = outcome.get("high").unwrap();
    let low = outcome.get("low").unwrap();

    // high runs as soon as its dependency clears; low waits its turn.
    assert_eq!(high.start_date, d(2025, 1, 3));
    assert_eq!(high.end_date, d(2025, 1, 8));
    assert_eq!(low.start_date, d(2025, 1, 9));

    let skip = outcome
        .rollout_decisions
        .iter()
        .find(|r| r.choice == RolloutChoice::Skip)
        .expect("a skip decision is recorded");
    assert_eq!(skip.task_id, "low");
    assert_eq!(skip.competing_task_id, "high");
    assert_eq!(skip.competing_eligible_date, d(2025, 1, 3));
    assert!(skip.skip_score < skip.schedule_score);

    // Skipping never introduced a lateness: high meets its deadline.
    assert!(high.end_date <= d(2025, 1, 22));
    assert!(outcome
        .warnings
        .iter()
        .all(|w| !matches!(w, ScheduleWarning::DeadlineMissed { .. })));
    assert_dependencies_respected(&tasks, &outcome);
    assert_resource_exclusivity(&outcome);
}

// S6: dependency cycles are a hard error.
#[test]
fn s6_cycle_detection() {
    let tasks = vec![
        Task {
            id: "a".to_string(),
            duration_days: 1.0,
            resources: on("alice"),
            dependencies: vec![Dependency::new("b")],
            ..Task::default()
        },
        Task {
            id: "b".to_string(),
            duration_days: 1.0,
            resources: on("alice"),
            dependencies: vec![Dependency::new("a")],
            ..Task::default()
        },
    ];
    let err = schedule(&bundle(tasks, vec![Resource::new("alice")])).unwrap_err();
    assert!(matches!(err, ScheduleError::CycleDetected(_)));
}

#[test]
fn fixed_dates_are_reproduced_exactly() {
    let tasks = vec![Task {
        id: "pinned".to_string(),
        duration_days: 5.0,
        resources: on("alice"),
        start_on: Some(d(2025, 3, 3)),
        end_on: Some(d(2025, 3, 14)),
        ..Task::default()
    }];
    let outcome = schedule(&bundle(tasks, vec![Resource::new("alice")])).unwrap();

    let pinned = outcome.get("pinned").unwrap();
    assert_eq!(pinned.start_date, d(2025, 3, 3));
    assert_eq!(pinned.end_date, d(2025, 3, 14));
}

#[test]
fn floating_work_pauses_around_a_pinned_window() {
    let tasks = vec![
        Task {
            id: "pinned".to_string(),
            duration_days: 5.0,
            resources: on("alice"),
            start_on: Some(d(2025, 1, 3)),
            ..Task::default()
        },
        Task {
            id: "floating".to_string(),
            duration_days: 10.0,
            resources: on("alice"),
            ..Task::default()
        },
    ];
    let outcome = schedule(&bundle(tasks, vec![Resource::new("alice")])).unwrap();

    let pinned = outcome.get("pinned").unwrap();
    let floating = outcome.get("floating").unwrap();
    assert_eq!(pinned.start_date, d(2025, 1, 3));
    assert_eq!(pinned.end_date, d(2025, 1, 8));

    // The pinned window behaves like any busy interval: the floating task
    // starts in the gap before it, pauses, and resumes after, so its span
    // stretches by the six pinned days.
    assert_eq!(floating.start_date, d(2025, 1, 1));
    assert_eq!(floating.end_date, d(2025, 1, 17));
}

#[test]
fn groups_and_exclusions_expand_in_order() {
    let tasks = vec![Task {
        id: "t".to_string(),
        duration_days: 3.0,
        resource_spec: Some("platform|!cho".to_string()),
        ..Task::default()
    }];
    let mut b = bundle(
        tasks,
        vec![
            Resource::new("ann"),
            Resource::new("ben"),
            Resource::new("cho"),
        ],
    );
    b.groups = vec![ResourceGroup {
        name: "platform".to_string(),
        members: vec!["cho".to_string(), "ben".to_string()],
    }];
    let outcome = schedule(&b).unwrap();

    // cho is excluded, ben is the only candidate left.
    assert_eq!(outcome.get("t").unwrap().resources, vec!["ben"]);
}

#[test]
fn unknown_spec_name_fails_before_scheduling() {
    let tasks = vec![Task {
        id: "t".to_string(),
        duration_days: 3.0,
        resource_spec: Some("ann|zoe".to_string()),
        ..Task::default()
    }];
    let err = schedule(&bundle(tasks, vec![Resource::new("ann")])).unwrap_err();
    assert_eq!(err, ScheduleError::UnknownResource("zoe".to_string()));
}

#[test]
fn completed_tasks_unblock_their_dependents_immediately() {
    let tasks = vec![Task {
        id: "next".to_string(),
        duration_days: 2.0,
        resources: on("alice"),
        dependencies: vec![Dependency::new("shipped")],
        ..Task::default()
    }];
    let mut b = bundle(tasks, vec![Resource::new("alice")]);
    b.completed_task_ids = vec!["shipped".to_string()];

    let outcome = schedule(&b).unwrap();
    assert_eq!(outcome.get("next").unwrap().start_date, d(2025, 1, 1));
}

fn contended_bundle(algorithm: AlgorithmKind) -> (Vec<Task>, ScheduleBundle) {
    let tasks = vec![
        Task {
            id: "foundation".to_string(),
            duration_days: 4.0,
            resources: on("ann"),
            priority: Some(40),
            ..Task::default()
        },
        Task {
            id: "feature".to_string(),
            duration_days: 6.0,
            resource_spec: Some("*".to_string()),
            priority: Some(70),
            end_before: Some(d(2025, 2, 10)),
            dependencies: vec![Dependency::new("foundation")],
            ..Task::default()
        },
        Task {
            id: "polish".to_string(),
            duration_days: 3.0,
            resource_spec: Some("ann|ben".to_string()),
            priority: Some(20),
            dependencies: vec![Dependency::with_lag("feature", 2.0)],
            ..Task::default()
        },
        Task {
            id: "docs".to_string(),
            duration_days: 5.0,
            resources: on("ben"),
            priority: Some(30),
            timeframe: Some("2025q1".to_string()),
            ..Task::default()
        },
        Task {
            id: "release".to_string(),
            duration_days: 0.0,
            dependencies: vec![Dependency::new("feature")],
            ..Task::default()
        },
    ];
    let mut b = bundle(
        tasks.clone(),
        vec![Resource::new("ann"), Resource::new("ben")],
    );
    b.global_dns_periods = vec![(d(2025, 1, 15), d(2025, 1, 17))];
    b.config.algorithm = algorithm;
    (tasks, b)
}

#[test]
fn mixed_bundle_is_consistent_under_every_algorithm() {
    for algorithm in [
        AlgorithmKind::ParallelSgs,
        AlgorithmKind::BoundedRollout,
        AlgorithmKind::CriticalPath,
    ] {
        let (tasks, b) = contended_bundle(algorithm);
        let outcome = schedule(&b).unwrap();

        assert_eq!(outcome.result.scheduled_tasks.len(), tasks.len());
        assert_dependencies_respected(&tasks, &outcome);
        assert_resource_exclusivity(&outcome);

        // Nothing schedules before the baseline date.
        for entry in &outcome.result.scheduled_tasks {
            assert!(entry.start_date >= d(2025, 1, 1));
        }
    }
}

#[test]
fn identical_bundles_produce_identical_outcomes() {
    for algorithm in [
        AlgorithmKind::ParallelSgs,
        AlgorithmKind::BoundedRollout,
        AlgorithmKind::CriticalPath,
    ] {
        let (_, b) = contended_bundle(algorithm);
        let first = schedule(&b).unwrap();
        let second = schedule(&b).unwrap();

        assert_eq!(
            first.result.scheduled_tasks,
            second.result.scheduled_tasks
        );
        assert_eq!(
            first.result.algorithm_metadata,
            second.result.algorithm_metadata
        );
        assert_eq!(first.warnings, second.warnings);
        assert_eq!(first.computed_deadlines, second.computed_deadlines);
        assert_eq!(first.computed_priorities, second.computed_priorities);
        assert_eq!(
            format!("{:?}", first.rollout_decisions),
            format!("{:?}", second.rollout_decisions)
        );
    }
}

#[test]
fn deadline_propagation_reaches_upstream_tasks() {
    let tasks = vec![
        Task {
            id: "early".to_string(),
            duration_days: 5.0,
            resources: on("alice"),
            ..Task::default()
        },
        Task {
            id: "late".to_string(),
            duration_days: 3.0,
            resources: on("alice"),
            end_before: Some(d(2025, 1, 20)),
            dependencies: vec![Dependency::with_lag("early", 2.0)],
            ..Task::default()
        },
    ];
    let outcome = schedule(&bundle(tasks, vec![Resource::new("alice")])).unwrap();

    // late's deadline minus its duration minus the lag.
    assert_eq!(
        outcome.computed_deadlines.get("early"),
        Some(&d(2025, 1, 15))
    );
    // And the invariant: pred deadline <= succ deadline - duration - lag.
    let early = outcome.computed_deadlines["early"];
    let late = outcome.computed_deadlines["late"];
    assert!(early <= late - chrono::Duration::days(3 + 2));
}

#[test]
fn atc_strategy_schedules_end_to_end() {
    let (tasks, mut b) = contended_bundle(AlgorithmKind::ParallelSgs);
    b.config.scheduling.strategy = Strategy::Atc;
    let outcome = schedule(&b).unwrap();

    assert_eq!(outcome.result.scheduled_tasks.len(), tasks.len());
    assert_dependencies_respected(&tasks, &outcome);
    assert_resource_exclusivity(&outcome);
}

#[test]
fn critical_path_prefers_enabling_work_over_unrelated_tasks() {
    let tasks = vec![
        Task {
            id: "enabler".to_string(),
            duration_days: 2.0,
            resources: on("ann"),
            priority: Some(10),
            ..Task::default()
        },
        Task {
            id: "launch".to_string(),
            duration_days: 1.0,
            resources: on("ann"),
            priority: Some(95),
            dependencies: vec![Dependency::new("enabler")],
            ..Task::default()
        },
        Task {
            id: "sidequest".to_string(),
            duration_days: 2.0,
            resources: on("ann"),
            priority: Some(40),
            ..Task::default()
        },
    ];
    let mut b = bundle(tasks, vec![Resource::new("ann")]);
    b.config.algorithm = AlgorithmKind::CriticalPath;

    let outcome = schedule(&b).unwrap();
    let enabler = outcome.get("enabler").unwrap();
    let sidequest = outcome.get("sidequest").unwrap();
    assert!(enabler.start_date < sidequest.start_date);
}

#[test]
fn milestone_chains_resolve_at_the_right_instant() {
    let tasks = vec![
        Task {
            id: "work".to_string(),
            duration_days: 4.0,
            resources: on("ann"),
            ..Task::default()
        },
        Task {
            id: "done".to_string(),
            duration_days: 0.0,
            dependencies: vec![Dependency::new("work")],
            ..Task::default()
        },
    ];
    let outcome = schedule(&bundle(tasks.clone(), vec![Resource::new("ann")])).unwrap();

    let work = outcome.get("work").unwrap();
    let done = outcome.get("done").unwrap();
    assert_eq!(work.end_date, d(2025, 1, 5));
    assert_eq!(done.start_date, d(2025, 1, 6));
    assert_eq!(done.start_date, done.end_date);
    assert!(done.resources.is_empty());
    assert_dependencies_respected(&tasks, &outcome);
}
