use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::datetime::is_overdue;
use crate::task::{Status, Task};

/// Derived snapshot of the full (unfiltered) collection. Always
/// recomputed, never cached across mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub overdue: usize,
    /// Rounded percentage in [0, 100]; 0 for an empty collection.
    pub completion_rate: u32,
}

#[tracing::instrument(skip(tasks, now), fields(count = tasks.len()))]
pub fn compute_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let total = tasks.len();
    let mut completed = 0;
    let mut in_progress = 0;
    let mut overdue = 0;

    for task in tasks {
        match task.status {
            Status::Completed => completed += 1,
            Status::InProgress => in_progress += 1,
            Status::Todo | Status::Review => {}
        }
        if let Some(due) = task.due_date
            && is_overdue(due, task.status, now)
        {
            overdue += 1;
        }
    }

    let completion_rate = if total > 0 {
        (completed as f64 / total as f64 * 100.0).round() as u32
    } else {
        0
    };

    TaskStats {
        total,
        completed,
        in_progress,
        overdue,
        completion_rate,
    }
}
