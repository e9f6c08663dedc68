use std::cmp::Ordering;

use clap::ValueEnum;

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    #[default]
    #[value(name = "due")]
    DueDate,
    Priority,
    Created,
}

/// Returns a new ordering of `tasks`; the input is untouched. The
/// underlying sort is stable, so tasks comparing equal keep their
/// relative input order.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn sort_tasks(tasks: &[Task], key: SortKey) -> Vec<Task> {
    let mut out = tasks.to_vec();
    out.sort_by(|a, b| compare_tasks(a, b, key));
    out
}

fn compare_tasks(a: &Task, b: &Task, key: SortKey) -> Ordering {
    match key {
        // Undated tasks sort after all dated ones; two undated tasks
        // compare equal.
        SortKey::DueDate => match (a.due_date, b.due_date) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a_due), Some(b_due)) => a_due.cmp(&b_due),
        },
        SortKey::Priority => b.priority.weight().cmp(&a.priority.weight()),
        SortKey::Created => b.created_at.cmp(&a.created_at),
    }
}
