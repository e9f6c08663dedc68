use std::collections::BTreeSet;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::config::Config;
use crate::datetime::parse_due_expr;
use crate::filter::{DateFilter, FilterState};
use crate::render::{Renderer, short_id};
use crate::session::SessionStore;
use crate::sort::{SortKey, sort_tasks};
use crate::storage::{self, ViewMode};
use crate::task::{Priority, Status, TaskDraft, TaskPatch};
use crate::tracker::Tracker;

#[instrument(skip(tracker, cfg, renderer, command))]
pub fn dispatch<S: SessionStore>(
    tracker: &mut Tracker<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();
    debug!(?command, "dispatching command");

    match command {
        Command::Add {
            title,
            description,
            priority,
            status,
            due,
            tags,
            assignee,
            estimate,
        } => cmd_add(
            tracker,
            TaskDraftArgs {
                title,
                description,
                priority,
                status,
                due,
                tags,
                assignee,
                estimate,
            },
            now,
        ),
        Command::List {
            search,
            priorities,
            statuses,
            tags,
            due,
            sort,
        } => cmd_list(
            tracker, cfg, renderer, search, priorities, statuses, tags, due, sort, now,
        ),
        Command::Info { id } => cmd_info(tracker, renderer, &id, now),
        Command::Modify {
            id,
            title,
            description,
            priority,
            status,
            due,
            no_due,
            tags,
            no_tags,
            assignee,
            no_assignee,
            estimate,
            no_estimate,
        } => cmd_modify(
            tracker,
            &id,
            TaskPatchArgs {
                title,
                description,
                priority,
                status,
                due,
                no_due,
                tags,
                no_tags,
                assignee,
                no_assignee,
                estimate,
                no_estimate,
            },
            now,
        ),
        Command::Done { id } => cmd_done(tracker, &id, now),
        Command::Delete { id } => cmd_delete(tracker, &id, now),
        Command::Stats { json } => cmd_stats(tracker, renderer, json, now),
        Command::Tags => cmd_tags(tracker),
        Command::Export { output, stdout } => cmd_export(tracker, output, stdout, now),
        Command::Import { path } => cmd_import(tracker, &path, now),
        Command::Clear => cmd_clear(tracker),
        Command::View { mode } => cmd_view(tracker, mode),
    }
}

struct TaskDraftArgs {
    title: String,
    description: String,
    priority: Option<Priority>,
    status: Option<Status>,
    due: Option<String>,
    tags: Vec<String>,
    assignee: Option<String>,
    estimate: Option<f64>,
}

#[derive(Default)]
struct TaskPatchArgs {
    title: Option<String>,
    description: Option<String>,
    priority: Option<Priority>,
    status: Option<Status>,
    due: Option<String>,
    no_due: bool,
    tags: Vec<String>,
    no_tags: bool,
    assignee: Option<String>,
    no_assignee: bool,
    estimate: Option<f64>,
    no_estimate: bool,
}

#[instrument(skip(tracker, args, now))]
fn cmd_add<S: SessionStore>(
    tracker: &mut Tracker<S>,
    args: TaskDraftArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let due_date = args
        .due
        .as_deref()
        .map(|expr| parse_due_expr(expr, now))
        .transpose()
        .context("invalid --due expression")?;

    let task = tracker.add(
        TaskDraft {
            title: args.title,
            description: args.description,
            status: args.status,
            priority: args.priority,
            due_date,
            tags: args.tags,
            assignee: args.assignee,
            estimated_hours: args.estimate,
        },
        now,
    );

    println!("Created task {}.", short_id(&task.id));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip_all)]
fn cmd_list<S: SessionStore>(
    tracker: &Tracker<S>,
    cfg: &Config,
    renderer: &Renderer,
    search: Option<String>,
    priorities: Vec<Priority>,
    statuses: Vec<Status>,
    tags: Vec<String>,
    due: Option<DateFilter>,
    sort: Option<SortKey>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let filters = FilterState {
        search_query: search.unwrap_or_default(),
        selected_priorities: priorities,
        selected_statuses: statuses,
        selected_tags: tags,
        date_filter: due.unwrap_or_default(),
    };

    let sort_key = match sort {
        Some(key) => key,
        None => default_sort_key(cfg)?,
    };

    let rows = sort_tasks(&filters.apply(tracker.tasks(), now), sort_key);
    debug!(
        matched = rows.len(),
        total = tracker.tasks().len(),
        active = filters.has_active_filters(),
        "filtered and sorted"
    );
    renderer.print_task_table(&rows, now)?;
    Ok(())
}

#[instrument(skip(tracker, renderer, now))]
fn cmd_info<S: SessionStore>(
    tracker: &Tracker<S>,
    renderer: &Renderer,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command info");
    let task = resolve_task_id(tracker, id)?;
    let task = tracker
        .find(&task)
        .ok_or_else(|| anyhow!("task not found: {id}"))?
        .clone();
    renderer.print_task_info(&task, now)?;
    Ok(())
}

#[instrument(skip(tracker, args, now))]
fn cmd_modify<S: SessionStore>(
    tracker: &mut Tracker<S>,
    id: &str,
    args: TaskPatchArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let full_id = resolve_task_id(tracker, id)?;
    let previous_status = tracker
        .find(&full_id)
        .map(|task| task.status)
        .ok_or_else(|| anyhow!("task not found: {id}"))?;

    let due_date = if args.no_due {
        Some(None)
    } else {
        match args.due.as_deref() {
            Some(expr) => Some(Some(
                parse_due_expr(expr, now).context("invalid --due expression")?,
            )),
            None => None,
        }
    };

    // Completion bookkeeping lives here, not in the entity: entering
    // completed stamps completed_at, leaving it clears the stamp.
    let completed_at = match args.status {
        Some(Status::Completed) if previous_status != Status::Completed => Some(Some(now)),
        Some(status) if status != Status::Completed => Some(None),
        _ => None,
    };

    let patch = TaskPatch {
        title: args.title,
        description: args.description,
        status: args.status,
        priority: args.priority,
        due_date,
        completed_at,
        tags: if args.no_tags {
            Some(Vec::new())
        } else if args.tags.is_empty() {
            None
        } else {
            Some(args.tags)
        },
        assignee: if args.no_assignee {
            Some(None)
        } else {
            args.assignee.map(Some)
        },
        estimated_hours: if args.no_estimate {
            Some(None)
        } else {
            args.estimate.map(Some)
        },
    };

    if !tracker.update(&full_id, patch, now) {
        return Err(anyhow!("task not found: {id}"));
    }
    println!("Modified 1 task.");
    Ok(())
}

#[instrument(skip(tracker, now))]
fn cmd_done<S: SessionStore>(
    tracker: &mut Tracker<S>,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command done");

    let full_id = resolve_task_id(tracker, id)?;
    let patch = TaskPatch {
        status: Some(Status::Completed),
        completed_at: Some(Some(now)),
        ..TaskPatch::default()
    };
    if !tracker.update(&full_id, patch, now) {
        return Err(anyhow!("task not found: {id}"));
    }
    println!("Completed task {}.", short_id(&full_id));
    Ok(())
}

#[instrument(skip(tracker, now))]
fn cmd_delete<S: SessionStore>(
    tracker: &mut Tracker<S>,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command delete");

    let full_id = resolve_task_id(tracker, id)?;
    if !tracker.delete(&full_id, now) {
        return Err(anyhow!("task not found: {id}"));
    }
    println!("Deleted task {}.", short_id(&full_id));
    Ok(())
}

#[instrument(skip(tracker, renderer, now))]
fn cmd_stats<S: SessionStore>(
    tracker: &Tracker<S>,
    renderer: &Renderer,
    json: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command stats");

    let stats = tracker.stats(now);
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        renderer.print_stats(&stats)?;
    }
    Ok(())
}

#[instrument(skip(tracker))]
fn cmd_tags<S: SessionStore>(tracker: &Tracker<S>) -> anyhow::Result<()> {
    let mut set = BTreeSet::new();
    for task in tracker.tasks() {
        for tag in &task.tags {
            set.insert(tag.clone());
        }
    }

    for tag in set {
        println!("{tag}");
    }
    Ok(())
}

#[instrument(skip(tracker, now))]
fn cmd_export<S: SessionStore>(
    tracker: &Tracker<S>,
    output: Option<PathBuf>,
    stdout: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command export");

    let payload = tracker.export()?;
    if stdout {
        println!("{payload}");
        return Ok(());
    }

    let path = output.unwrap_or_else(|| PathBuf::from(storage::export_file_name(now)));
    std::fs::write(&path, &payload)
        .with_context(|| format!("failed writing {}", path.display()))?;
    println!(
        "Exported {} task(s) to {}.",
        tracker.tasks().len(),
        path.display()
    );
    Ok(())
}

#[instrument(skip(tracker, now))]
fn cmd_import<S: SessionStore>(
    tracker: &mut Tracker<S>,
    path: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command import");

    let payload = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed reading stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed reading {path}"))?
    };

    let count = tracker.import(&payload, now)?;
    println!("Imported {count} task(s).");
    Ok(())
}

#[instrument(skip(tracker))]
fn cmd_clear<S: SessionStore>(tracker: &mut Tracker<S>) -> anyhow::Result<()> {
    info!("command clear");
    let count = tracker.tasks().len();
    tracker.clear();
    println!("Cleared {count} task(s).");
    Ok(())
}

#[instrument(skip(tracker))]
fn cmd_view<S: SessionStore>(
    tracker: &mut Tracker<S>,
    mode: Option<ViewMode>,
) -> anyhow::Result<()> {
    match mode {
        Some(mode) => {
            storage::save_view_mode(tracker.store_mut(), mode)?;
            println!("View set: {}.", mode.as_str());
        }
        None => {
            let mode = storage::load_view_mode(tracker.store());
            println!("{}", mode.as_str());
        }
    }
    Ok(())
}

/// Resolves a user-supplied id or unique id prefix to a full task id.
fn resolve_task_id<S: SessionStore>(tracker: &Tracker<S>, input: &str) -> anyhow::Result<String> {
    if input.is_empty() {
        return Err(anyhow!("empty task id"));
    }

    if let Some(task) = tracker.find(input) {
        return Ok(task.id.clone());
    }

    let mut matches = tracker
        .tasks()
        .iter()
        .filter(|task| task.id.starts_with(input));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("task not found: {input}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous task id prefix: {input}"));
    }
    Ok(first.id.clone())
}

fn default_sort_key(cfg: &Config) -> anyhow::Result<SortKey> {
    let Some(raw) = cfg.default_sort.as_deref() else {
        return Ok(SortKey::default());
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "due" | "duedate" => Ok(SortKey::DueDate),
        "priority" => Ok(SortKey::Priority),
        "created" => Ok(SortKey::Created),
        other => Err(anyhow!("invalid default_sort setting: {other}")),
    }
}
