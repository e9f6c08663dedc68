use chrono::{DateTime, Utc};
use clap::ValueEnum;
use tracing::trace;

use crate::datetime::{is_overdue, is_this_week, is_today};
use crate::task::{Priority, Status, Task};

/// Coarse temporal bucket for a task's due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Week,
    Overdue,
}

/// The active filter criteria. Empty selection sets accept
/// everything; a non-empty tag set requires at least one shared tag.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub search_query: String,
    pub selected_priorities: Vec<Priority>,
    pub selected_statuses: Vec<Status>,
    pub selected_tags: Vec<String>,
    pub date_filter: DateFilter,
}

impl FilterState {
    /// AND across the five categories, OR within each one.
    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        let ok = self.matches_search(task)
            && self.matches_priority(task)
            && self.matches_status(task)
            && self.matches_tags(task)
            && self.matches_date(task, now);
        trace!(id = %task.id, ok, "filter evaluation");
        ok
    }

    /// Order-preserving filtered copy of `tasks`.
    #[tracing::instrument(skip(self, tasks, now), fields(input = tasks.len()))]
    pub fn apply(&self, tasks: &[Task], now: DateTime<Utc>) -> Vec<Task> {
        tasks
            .iter()
            .filter(|task| self.matches(task, now))
            .cloned()
            .collect()
    }

    pub fn has_active_filters(&self) -> bool {
        !self.search_query.is_empty()
            || !self.selected_priorities.is_empty()
            || !self.selected_statuses.is_empty()
            || !self.selected_tags.is_empty()
            || self.date_filter != DateFilter::All
    }

    fn matches_search(&self, task: &Task) -> bool {
        if self.search_query.is_empty() {
            return true;
        }
        let query = self.search_query.to_lowercase();
        task.title.to_lowercase().contains(&query)
            || task.description.to_lowercase().contains(&query)
            || task
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&query))
    }

    fn matches_priority(&self, task: &Task) -> bool {
        self.selected_priorities.is_empty() || self.selected_priorities.contains(&task.priority)
    }

    fn matches_status(&self, task: &Task) -> bool {
        self.selected_statuses.is_empty() || self.selected_statuses.contains(&task.status)
    }

    fn matches_tags(&self, task: &Task) -> bool {
        self.selected_tags.is_empty()
            || self
                .selected_tags
                .iter()
                .any(|tag| task.tags.contains(tag))
    }

    fn matches_date(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if self.date_filter == DateFilter::All {
            return true;
        }
        let Some(due) = task.due_date else {
            return false;
        };
        match self.date_filter {
            DateFilter::All => true,
            DateFilter::Today => is_today(due, now),
            DateFilter::Week => is_this_week(due, now),
            DateFilter::Overdue => is_overdue(due, task.status, now),
        }
    }
}
