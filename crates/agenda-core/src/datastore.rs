use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::activity::{Activity, ActivityKind};
use crate::selection::Selection;

const ENVELOPE_KEYS: [&str; 3] = ["data", "items", "results"];

/// Exported backend collections plus the persisted calendar selection.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub meetings_path: PathBuf,
    pub calls_path: PathBuf,
    pub selection_path: PathBuf,
}

/// The three inputs of the calendar, already passed through the record
/// adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityCollections {
    pub tasks: Vec<Activity>,
    pub meetings: Vec<Activity>,
    pub calls: Vec<Activity>,
}

impl ActivityCollections {
    pub fn len(&self) -> usize {
        self.tasks.len() + self.meetings.len() + self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let store = Self {
            tasks_path: data_dir.join("tasks.json"),
            meetings_path: data_dir.join("meetings.json"),
            calls_path: data_dir.join("calls.json"),
            selection_path: data_dir.join("selection.data"),
            data_dir,
        };

        info!(
            data_dir = %store.data_dir.display(),
            tasks = %store.tasks_path.display(),
            meetings = %store.meetings_path.display(),
            calls = %store.calls_path.display(),
            "opened datastore"
        );

        Ok(store)
    }

    pub fn path_for(&self, kind: ActivityKind) -> &Path {
        match kind {
            ActivityKind::Task => &self.tasks_path,
            ActivityKind::Meeting => &self.meetings_path,
            ActivityKind::Call => &self.calls_path,
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn load_activities(&self, kind: ActivityKind) -> anyhow::Result<Vec<Activity>> {
        let path = self.path_for(kind);
        if !path.exists() {
            debug!(file = %path.display(), "no export file; treating as empty");
            return Ok(vec![]);
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let records = parse_collection(&text)
            .with_context(|| format!("failed parsing {}", path.display()))?;

        let mut out = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            match Activity::from_json(kind, record) {
                Some(activity) => out.push(activity),
                None => warn!(
                    file = %path.display(),
                    index = idx,
                    "ignoring non-object {} record",
                    kind
                ),
            }
        }

        debug!(kind = %kind, count = out.len(), "loaded activities");
        Ok(out)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_all(&self) -> anyhow::Result<ActivityCollections> {
        Ok(ActivityCollections {
            tasks: self.load_activities(ActivityKind::Task)?,
            meetings: self.load_activities(ActivityKind::Meeting)?,
            calls: self.load_activities(ActivityKind::Call)?,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_selection(&self) -> anyhow::Result<Option<Selection>> {
        if !self.selection_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.selection_path)
            .with_context(|| format!("failed reading {}", self.selection_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let selection: Selection = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {}", self.selection_path.display()))?;
        Ok(Some(selection.normalized()))
    }

    #[tracing::instrument(skip(self, selection))]
    pub fn save_selection(&self, selection: &Selection) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(selection)?;
        write_atomic(&self.selection_path, &serialized)
            .context("failed to save selection.data")
    }
}

/// Accepts a JSON array, a REST envelope such as `{"data": [...]}`, a single
/// object, or JSON Lines.
pub fn parse_collection(text: &str) -> anyhow::Result<Vec<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => {
                for key in ENVELOPE_KEYS {
                    if map.get(key).is_some_and(Value::is_array)
                        && let Some(Value::Array(items)) = map.remove(key)
                    {
                        debug!(envelope = key, count = items.len(), "unwrapped response envelope");
                        return Ok(items);
                    }
                }
                Ok(vec![Value::Object(map)])
            }
            other => Err(anyhow!("expected a JSON array or object, got {other}")),
        };
    }

    let mut out = Vec::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        out.push(value);
    }
    Ok(out)
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), "writing atomically");
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    writeln!(temp, "{contents}")?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}
