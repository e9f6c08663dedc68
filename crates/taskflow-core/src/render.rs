use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::datetime::{format_due, format_project_date, is_overdue};
use crate::stats::TaskStats;
use crate::task::{Priority, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&self, tasks: &[Task], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Title", "Status", "Pri", "Due", "Tags"];
        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = self.paint(short_id(&task.id), "33");

            let due = format_due(task.due_date, now);
            let due = match task.due_date {
                Some(d) if is_overdue(d, task.status, now) => self.paint(&due, "31"),
                _ => due,
            };

            let priority = match task.priority {
                Priority::Urgent => self.paint(task.priority.as_str(), "31"),
                Priority::High => self.paint(task.priority.as_str(), "35"),
                _ => task.priority.as_str().to_string(),
            };

            let tags = task
                .tags
                .iter()
                .map(|tag| format!("+{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            rows.push(vec![
                id,
                task.title.clone(),
                task.status.as_str().to_string(),
                priority,
                due,
                tags,
            ]);
        }

        write_table(&mut out, &headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, now))]
    pub fn print_task_info(&self, task: &Task, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        if !task.description.is_empty() {
            writeln!(out, "description {}", task.description)?;
        }
        writeln!(out, "status      {}", task.status.as_str())?;
        writeln!(out, "priority    {}", task.priority.as_str())?;
        writeln!(out, "due         {}", format_due(task.due_date, now))?;
        if !task.tags.is_empty() {
            writeln!(out, "tags        {}", task.tags.join(", "))?;
        }
        if let Some(assignee) = &task.assignee {
            writeln!(out, "assignee    {assignee}")?;
        }
        if let Some(hours) = task.estimated_hours {
            writeln!(out, "estimate    {hours}h")?;
        }
        writeln!(out, "created     {}", format_project_date(task.created_at))?;
        writeln!(out, "updated     {}", format_project_date(task.updated_at))?;
        if let Some(completed_at) = task.completed_at {
            writeln!(out, "completed   {}", format_project_date(completed_at))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_stats(&self, stats: &TaskStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "total        {}", stats.total)?;
        writeln!(out, "completed    {}", stats.completed)?;
        writeln!(out, "in progress  {}", stats.in_progress)?;

        let overdue = stats.overdue.to_string();
        let overdue = if stats.overdue > 0 {
            self.paint(&overdue, "31")
        } else {
            overdue
        };
        writeln!(out, "overdue      {overdue}")?;
        writeln!(out, "completion   {}%", stats.completion_rate)?;
        Ok(())
    }

    fn paint(&self, text: impl AsRef<str>, code: &str) -> String {
        let text = text.as_ref();
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Display prefix of a generated task id. Ids lead with their random
/// fragment, so eight characters stay unique in practice, fit a table
/// column, and still resolve as an id prefix.
pub fn short_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(8)
        .map(|(idx, _)| idx)
        .unwrap_or(id.len());
    &id[..end]
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;
    for width in &widths {
        write!(writer, "{:-<w$} ", "", w = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            // Pad by visible width; ANSI escapes are zero-width.
            let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{short_id, strip_ansi};

    #[test]
    fn short_id_truncates_long_ids() {
        assert_eq!(short_id("a3f9c2d1-1716899054321"), "a3f9c2d1");
        assert_eq!(short_id("tiny"), "tiny");
    }

    #[test]
    fn ansi_sequences_are_zero_width() {
        assert_eq!(strip_ansi("\x1b[31moverdue\x1b[0m"), "overdue");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
