use chrono::{DateTime, Duration, Utc};

use crate::task::{Priority, Status, Task, TaskDraft};

/// Starter collection shown the first time the tracker opens with
/// nothing in storage.
pub fn demo_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let mut plan = Task::new(
        TaskDraft {
            title: "Plan the week".to_string(),
            description: "Pick the three things that actually matter.".to_string(),
            priority: Some(Priority::High),
            due_date: Some(now + Duration::days(1)),
            tags: vec!["planning".to_string()],
            ..TaskDraft::default()
        },
        now,
    );
    plan.status = Status::InProgress;

    let review = Task::new(
        TaskDraft {
            title: "Review open pull requests".to_string(),
            description: String::new(),
            priority: Some(Priority::Medium),
            due_date: Some(now + Duration::days(3)),
            tags: vec!["work".to_string(), "review".to_string()],
            ..TaskDraft::default()
        },
        now,
    );

    let groceries = Task::new(
        TaskDraft {
            title: "Buy groceries".to_string(),
            description: "Milk, eggs, coffee.".to_string(),
            priority: Some(Priority::Low),
            tags: vec!["home".to_string()],
            ..TaskDraft::default()
        },
        now,
    );

    let mut shipped = Task::new(
        TaskDraft {
            title: "Ship the onboarding fix".to_string(),
            description: "Regression from last sprint.".to_string(),
            priority: Some(Priority::Urgent),
            due_date: Some(now - Duration::days(1)),
            tags: vec!["work".to_string()],
            ..TaskDraft::default()
        },
        now,
    );
    shipped.status = Status::Completed;
    shipped.completed_at = Some(now - Duration::hours(4));

    vec![plan, review, groceries, shipped]
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::demo_tasks;

    #[test]
    fn demo_tasks_have_unique_ids() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let tasks = demo_tasks(now);

        let mut ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), tasks.len());
    }
}
