use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::SessionStore;
use crate::task::Task;

/// Key holding the versioned task envelope.
pub const TASKS_KEY: &str = "taskflow_tasks";
/// Key holding the last-selected view mode, independent of the envelope.
pub const VIEW_KEY: &str = "taskflow_view";
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum StorageError {
    /// Stored value present but not parsable, or wrong shape. Callers
    /// treat this as "no saved data".
    #[error("stored tasks unreadable: {0}")]
    Read(String),

    /// The substrate refused the write. The in-memory collection stays
    /// authoritative for the session.
    #[error("failed writing to session store: {0}")]
    Write(String),

    /// Import payload rejected; the existing collection is untouched.
    #[error("invalid import payload: {0}")]
    InvalidFormat(String),
}

/// On-disk wrapper for the task collection. Export/import use a bare
/// array instead; the envelope is a storage detail.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    version: String,
    tasks: Vec<Task>,
    last_updated: DateTime<Utc>,
}

/// Encodes the collection and writes it under [`TASKS_KEY`].
#[tracing::instrument(skip(store, tasks, now), fields(count = tasks.len()))]
pub fn save_tasks<S: SessionStore>(
    store: &mut S,
    tasks: &[Task],
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    let envelope = Envelope {
        version: SCHEMA_VERSION.to_string(),
        tasks: tasks.to_vec(),
        last_updated: now,
    };
    let payload =
        serde_json::to_string(&envelope).map_err(|err| StorageError::Write(err.to_string()))?;
    store
        .set(TASKS_KEY, &payload)
        .map_err(|err| StorageError::Write(err.to_string()))?;
    debug!(bytes = payload.len(), "saved task envelope");
    Ok(())
}

/// Reads the envelope back. Absent, unparsable, or misshapen data all
/// come back as an empty collection; the caller decides whether to
/// seed. Version tags other than the current one are accepted as long
/// as the task array still parses.
#[tracing::instrument(skip(store))]
pub fn load_tasks<S: SessionStore>(store: &S) -> Vec<Task> {
    let raw = match store.get(TASKS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no saved tasks");
            return Vec::new();
        }
        Err(err) => {
            warn!(error = %err, "session store read failed; starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Envelope>(&raw) {
        Ok(envelope) => {
            debug!(
                count = envelope.tasks.len(),
                version = %envelope.version,
                "loaded task envelope"
            );
            envelope.tasks
        }
        Err(err) => {
            let read_err = StorageError::Read(err.to_string());
            warn!(error = %read_err, "discarding unreadable stored tasks");
            Vec::new()
        }
    }
}

/// Pretty-printed bare array of tasks, without the envelope wrapper.
pub fn export_tasks(tasks: &[Task]) -> Result<String, StorageError> {
    serde_json::to_string_pretty(tasks).map_err(|err| StorageError::Write(err.to_string()))
}

/// Filename the exported payload is conventionally saved under.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!(
        "taskflow-export-{}.json",
        crate::datetime::to_project_date(now).format("%Y-%m-%d")
    )
}

/// Parses an import payload. The payload must be a JSON array; every
/// element is shape-checked through the typed task schema (dates
/// included) before anything is accepted.
#[tracing::instrument(skip(payload), fields(bytes = payload.len()))]
pub fn import_tasks(payload: &str) -> Result<Vec<Task>, StorageError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|err| StorageError::InvalidFormat(format!("not valid JSON: {err}")))?;

    let serde_json::Value::Array(items) = value else {
        return Err(StorageError::InvalidFormat(
            "expected an array of tasks".to_string(),
        ));
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let task: Task = serde_json::from_value(item)
            .map_err(|err| StorageError::InvalidFormat(format!("task {idx}: {err}")))?;
        out.push(task);
    }

    debug!(count = out.len(), "parsed import payload");
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ViewMode {
    #[default]
    List,
    Board,
    Calendar,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::List => "list",
            ViewMode::Board => "board",
            ViewMode::Calendar => "calendar",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "list" => Some(ViewMode::List),
            "board" => Some(ViewMode::Board),
            "calendar" => Some(ViewMode::Calendar),
            _ => None,
        }
    }
}

/// Stored as a plain string, not JSON.
pub fn save_view_mode<S: SessionStore>(store: &mut S, mode: ViewMode) -> Result<(), StorageError> {
    store
        .set(VIEW_KEY, mode.as_str())
        .map_err(|err| StorageError::Write(err.to_string()))
}

pub fn load_view_mode<S: SessionStore>(store: &S) -> ViewMode {
    match store.get(VIEW_KEY) {
        Ok(Some(raw)) => ViewMode::parse(&raw).unwrap_or_else(|| {
            warn!(raw, "unknown stored view mode; falling back to list");
            ViewMode::default()
        }),
        Ok(None) => ViewMode::default(),
        Err(err) => {
            warn!(error = %err, "view mode read failed; falling back to list");
            ViewMode::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{
        StorageError, TASKS_KEY, ViewMode, export_file_name, export_tasks, import_tasks,
        load_tasks, load_view_mode, save_tasks, save_view_mode,
    };
    use crate::session::{MemoryStore, SessionStore};
    use crate::task::{Status, Task, TaskDraft};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
    }

    fn sample_tasks() -> Vec<Task> {
        let mut dated = Task::new(
            TaskDraft {
                title: "Dated".to_string(),
                due_date: Some(now() + Duration::days(2)),
                tags: vec!["work".to_string()],
                ..TaskDraft::default()
            },
            now(),
        );
        dated.status = Status::InProgress;

        let undated = Task::new(
            TaskDraft {
                title: "Undated".to_string(),
                ..TaskDraft::default()
            },
            now(),
        );

        vec![dated, undated]
    }

    #[test]
    fn envelope_roundtrip_preserves_dates() {
        let mut store = MemoryStore::new();
        let tasks = sample_tasks();

        save_tasks(&mut store, &tasks, now()).expect("save");
        let loaded = load_tasks(&store);
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn envelope_uses_versioned_camel_case_shape() {
        let mut store = MemoryStore::new();
        save_tasks(&mut store, &sample_tasks(), now()).expect("save");

        let raw = store.get(TASKS_KEY).expect("get").expect("present");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");

        assert_eq!(value["version"], "1.0");
        assert!(value["lastUpdated"].is_string());
        assert!(value["tasks"][0]["dueDate"].is_string());
        assert!(value["tasks"][0]["createdAt"].is_string());
        // Undated task serializes an explicit null due date.
        assert!(value["tasks"][1]["dueDate"].is_null());
    }

    #[test]
    fn absent_or_garbage_storage_loads_empty() {
        let mut store = MemoryStore::new();
        assert!(load_tasks(&store).is_empty());

        store.set(TASKS_KEY, "not json at all").expect("set");
        assert!(load_tasks(&store).is_empty());

        store.set(TASKS_KEY, "{\"version\":\"1.0\"}").expect("set");
        assert!(load_tasks(&store).is_empty());
    }

    #[test]
    fn export_is_a_bare_pretty_array() {
        let tasks = sample_tasks();
        let payload = export_tasks(&tasks).expect("export");

        assert!(payload.starts_with('['));
        assert!(payload.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&payload).expect("json");
        assert_eq!(value.as_array().expect("array").len(), 2);
    }

    #[test]
    fn export_import_roundtrip() {
        let tasks = sample_tasks();
        let payload = export_tasks(&tasks).expect("export");
        let imported = import_tasks(&payload).expect("import");
        assert_eq!(imported, tasks);
    }

    #[test]
    fn import_rejects_non_array_payloads() {
        let err = import_tasks("{}").expect_err("object payload");
        assert!(matches!(err, StorageError::InvalidFormat(_)));

        let err = import_tasks("not json").expect_err("garbage payload");
        assert!(matches!(err, StorageError::InvalidFormat(_)));
    }

    #[test]
    fn import_rejects_misshapen_elements() {
        let err = import_tasks("[{\"id\": \"x\"}]").expect_err("missing fields");
        assert!(matches!(err, StorageError::InvalidFormat(_)));

        let payload = "[{\"id\":\"x\",\"title\":\"t\",\"status\":\"todo\",\
                        \"priority\":\"medium\",\"createdAt\":\"nonsense\",\
                        \"updatedAt\":\"2026-03-04T12:00:00Z\"}]";
        let err = import_tasks(payload).expect_err("bad date");
        assert!(matches!(err, StorageError::InvalidFormat(_)));
    }

    #[test]
    fn import_accepts_optional_dates_as_absent_or_null() {
        let payload = "[{\"id\":\"x\",\"title\":\"t\",\"status\":\"completed\",\
                        \"priority\":\"low\",\"dueDate\":null,\
                        \"createdAt\":\"2026-03-04T12:00:00.000Z\",\
                        \"updatedAt\":\"2026-03-04T12:00:00.000Z\"}]";
        let imported = import_tasks(payload).expect("import");
        assert_eq!(imported.len(), 1);
        assert!(imported[0].due_date.is_none());
        assert!(imported[0].completed_at.is_none());
    }

    #[test]
    fn write_failure_is_a_typed_error() {
        let mut store = MemoryStore::new();
        store.fail_writes = true;

        let err = save_tasks(&mut store, &sample_tasks(), now()).expect_err("write");
        assert!(matches!(err, StorageError::Write(_)));
    }

    #[test]
    fn view_mode_roundtrip_and_fallback() {
        let mut store = MemoryStore::new();
        assert_eq!(load_view_mode(&store), ViewMode::List);

        save_view_mode(&mut store, ViewMode::Board).expect("save");
        assert_eq!(load_view_mode(&store), ViewMode::Board);
        // Stored as a plain string, not JSON.
        assert_eq!(
            store.get(super::VIEW_KEY).expect("get").as_deref(),
            Some("board")
        );

        store.set(super::VIEW_KEY, "spreadsheet").expect("set");
        assert_eq!(load_view_mode(&store), ViewMode::List);
    }

    #[test]
    fn export_file_name_carries_the_date() {
        assert_eq!(export_file_name(now()), "taskflow-export-2026-03-04.json");
    }
}
