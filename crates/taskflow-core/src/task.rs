use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Todo,
    InProgress,
    Review,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Review => "review",
            Status::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Fixed sort weight: urgent > high > medium > low.
    pub fn weight(&self) -> u8 {
        match self {
            Priority::Urgent => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status: Status,

    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

/// Fields supplied at creation; everything else the factory assigns.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub estimated_hours: Option<f64>,
}

/// Merge patch: `None` leaves a field alone. Clearable optionals use a
/// nested option so `Some(None)` means "unset".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub assignee: Option<Option<String>>,
    pub estimated_hours: Option<Option<f64>>,
}

impl Task {
    pub fn new(draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_task_id(now),
            title: draft.title,
            description: draft.description,
            status: draft.status.unwrap_or(Status::Todo),
            priority: draft.priority.unwrap_or(Priority::Medium),
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
            completed_at: None,
            tags: dedup_tags(draft.tags),
            assignee: draft.assignee,
            estimated_hours: draft.estimated_hours,
        }
    }

    /// Applies a merge patch. `updated_at` always bumps, even for an
    /// empty patch. Completion bookkeeping is the caller's concern.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = completed_at;
        }
        if let Some(tags) = patch.tags {
            self.tags = dedup_tags(tags);
        }
        if let Some(assignee) = patch.assignee {
            self.assignee = assignee;
        }
        if let Some(estimated_hours) = patch.estimated_hours {
            self.estimated_hours = estimated_hours;
        }
        self.updated_at = now;
    }
}

/// Stateless id generator: a random uuid fragment followed by the
/// millisecond timestamp. The random half leads so the first characters
/// of an id already make a unique display handle. No shared counter, so
/// multiple embedded sessions cannot collide on sequencing.
pub fn generate_task_id(now: DateTime<Utc>) -> String {
    let fragment = Uuid::new_v4().simple().to_string();
    format!("{}-{}", &fragment[..8], now.timestamp_millis())
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Priority, Status, Task, TaskDraft, TaskPatch, generate_task_id};

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn factory_assigns_defaults_and_timestamps() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let task = Task::new(draft("Write report"), now);

        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.created_at, now);
        assert_eq!(task.updated_at, now);
        assert!(task.completed_at.is_none());
        assert!(task.id.ends_with(&now.timestamp_millis().to_string()));
    }

    #[test]
    fn generated_ids_differ() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert_ne!(generate_task_id(now), generate_task_id(now));
    }

    #[test]
    fn same_millisecond_ids_differ_in_their_leading_characters() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let a = generate_task_id(now);
        let b = generate_task_id(now);
        assert_ne!(&a[..8], &b[..8]);
    }

    #[test]
    fn patch_merges_and_bumps_updated_at() {
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut task = Task::new(draft("Draft"), created);

        let later = created + Duration::hours(3);
        task.apply(
            TaskPatch {
                priority: Some(Priority::Urgent),
                due_date: Some(Some(later + Duration::days(2))),
                ..TaskPatch::default()
            },
            later,
        );

        assert_eq!(task.priority, Priority::Urgent);
        assert!(task.due_date.is_some());
        assert_eq!(task.title, "Draft");
        assert_eq!(task.created_at, created);
        assert_eq!(task.updated_at, later);
        assert!(task.updated_at >= task.created_at);
    }

    #[test]
    fn patch_can_clear_due_date() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut task = Task::new(
            TaskDraft {
                due_date: Some(now + Duration::days(1)),
                ..draft("Dated")
            },
            now,
        );

        task.apply(
            TaskPatch {
                due_date: Some(None),
                ..TaskPatch::default()
            },
            now,
        );
        assert!(task.due_date.is_none());
    }

    #[test]
    fn duplicate_tags_collapse_preserving_order() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let task = Task::new(
            TaskDraft {
                tags: vec![
                    "work".to_string(),
                    "urgent".to_string(),
                    "work".to_string(),
                ],
                ..draft("Tagged")
            },
            now,
        );
        assert_eq!(task.tags, vec!["work".to_string(), "urgent".to_string()]);
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&Status::InProgress).expect("serialize");
        assert_eq!(json, "\"in-progress\"");
    }
}
