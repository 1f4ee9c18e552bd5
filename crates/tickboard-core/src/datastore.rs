use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::normalize::normalize;
use crate::task::{CardColor, Priority, Task, TaskId};
use crate::view::Tab;

pub const TASKS_KEY: &str = "todoTasks";
pub const TAB_KEY: &str = "activeTab";
pub const SCHEMA_VERSION: u64 = 1;

/// Key-value boundary the task list and tab selector are persisted through.
pub trait KeyValueStore {
    fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError>;
    fn save(&mut self, key: &str, value: &Value) -> Result<(), PersistenceError>;
}

/// One pretty-printed JSON file per key inside a data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> Result<Self, PersistenceError> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| PersistenceError::Write {
            key: "data directory".to_string(),
            path: data_dir.clone(),
            source,
        })?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no stored value");
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|source| PersistenceError::Read {
            key: key.to_string(),
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let value = serde_json::from_str(&raw).map_err(|source| PersistenceError::Decode {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    #[tracing::instrument(skip(self, value))]
    fn save(&mut self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        debug!(file = %path.display(), "saving value atomically");

        let write_err = |source: std::io::Error| PersistenceError::Write {
            key: key.to_string(),
            path: path.clone(),
            source,
        };
        let serialized =
            serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Encode {
                key: key.to_string(),
                source,
            })?;

        let mut temp = NamedTempFile::new_in(&self.data_dir).map_err(write_err)?;
        writeln!(temp, "{serialized}").map_err(write_err)?;
        temp.flush().map_err(write_err)?;
        temp.persist(&path).map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

/// In-process store, used by tests and embedders that bring their own storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail, as a full disk or quota would.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        if self.fail_writes {
            return Err(PersistenceError::Write {
                key: key.to_string(),
                path: PathBuf::from("memory"),
                source: std::io::Error::other("storage quota exceeded"),
            });
        }
        self.values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskDocument {
    pub version: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Typed view over a [`KeyValueStore`]: the task document and the tab selector.
#[derive(Debug)]
pub struct DataStore<S> {
    backend: S,
}

impl<S: KeyValueStore> DataStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        let Some(value) = self.backend.load(TASKS_KEY)? else {
            debug!("no task document yet");
            return Ok(vec![]);
        };
        let (tasks, migrated) = decode_task_value(TASKS_KEY, value)?;
        let tasks = drop_duplicate_titles(tasks);
        if migrated {
            warn!(
                count = tasks.len(),
                "migrated unversioned task list; it will be rewritten on next save"
            );
        }
        debug!(count = tasks.len(), "loaded tasks");
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&mut self, tasks: &[Task]) -> Result<(), PersistenceError> {
        debug!(count = tasks.len(), "saving tasks");
        let value = encode_task_document(tasks)?;
        self.backend.save(TASKS_KEY, &value)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tab(&self) -> Result<Tab, PersistenceError> {
        let tab = match self.backend.load(TAB_KEY)? {
            None => Tab::All,
            Some(Value::String(raw)) => raw.parse::<Tab>().unwrap_or_else(|_| {
                warn!(stored = %raw, "unknown stored tab; falling back to all");
                Tab::All
            }),
            Some(other) => {
                warn!(stored = %other, "stored tab is not a string; falling back to all");
                Tab::All
            }
        };
        Ok(tab)
    }

    #[tracing::instrument(skip(self))]
    pub fn save_tab(&mut self, tab: Tab) -> Result<(), PersistenceError> {
        self.backend
            .save(TAB_KEY, &Value::String(tab.as_str().to_string()))
    }
}

pub fn encode_task_document(tasks: &[Task]) -> Result<Value, PersistenceError> {
    let document = TaskDocument {
        version: SCHEMA_VERSION,
        tasks: tasks.to_vec(),
    };
    serde_json::to_value(&document).map_err(|source| PersistenceError::Encode {
        key: TASKS_KEY.to_string(),
        source,
    })
}

/// Decode either a versioned document or the unversioned array the browser
/// widget wrote. The flag is true when the legacy shape was migrated.
pub fn decode_task_value(key: &str, value: Value) -> Result<(Vec<Task>, bool), PersistenceError> {
    match value {
        Value::Array(_) => {
            let legacy: Vec<LegacyTask> =
                serde_json::from_value(value).map_err(|source| PersistenceError::Decode {
                    key: key.to_string(),
                    source,
                })?;
            let tasks = legacy.into_iter().filter_map(LegacyTask::into_task).collect();
            Ok((tasks, true))
        }
        Value::Object(ref map) => {
            let version = map.get("version").and_then(Value::as_u64).ok_or_else(|| {
                PersistenceError::Malformed {
                    key: key.to_string(),
                }
            })?;
            if version > SCHEMA_VERSION {
                return Err(PersistenceError::UnsupportedVersion {
                    found: version,
                    supported: SCHEMA_VERSION,
                });
            }
            let document: TaskDocument =
                serde_json::from_value(value).map_err(|source| PersistenceError::Decode {
                    key: key.to_string(),
                    source,
                })?;
            let tasks = document.tasks.into_iter().filter_map(trim_title).collect();
            Ok((tasks, false))
        }
        _ => Err(PersistenceError::Malformed {
            key: key.to_string(),
        }),
    }
}

/// Record shape of the unversioned list: camelCase, empty strings for unset
/// fields, no identifier.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTask {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    card_color: Option<String>,
    #[serde(default)]
    is_completed: bool,
}

impl LegacyTask {
    fn into_task(self) -> Option<Task> {
        let title = self.title.unwrap_or_default().trim().to_string();
        if title.is_empty() {
            warn!("skipping legacy task without a title");
            return None;
        }

        Some(Task {
            id: TaskId::new(),
            description: blank_to_none(self.description),
            category: blank_to_none(self.category),
            priority: blank_to_none(self.priority)
                .and_then(|p| p.parse::<Priority>().ok())
                .unwrap_or_default(),
            start_time: legacy_time(&title, self.start_time),
            end_time: legacy_time(&title, self.end_time),
            due_date: blank_to_none(self.due_date).and_then(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .inspect_err(|err| warn!(task = %title, %raw, error = %err, "dropping unparsable due date"))
                    .ok()
            }),
            card_color: blank_to_none(self.card_color)
                .and_then(|c| c.parse::<CardColor>().ok())
                .unwrap_or_default(),
            is_completed: self.is_completed,
            title,
        })
    }
}

fn trim_title(mut task: Task) -> Option<Task> {
    let trimmed = task.title.trim();
    if trimmed.is_empty() {
        warn!(id = %task.id.short(), "skipping stored task without a title");
        return None;
    }
    if trimmed.len() != task.title.len() {
        task.title = trimmed.to_string();
    }
    Some(task)
}

/// Keep the first task for each normalized title.
fn drop_duplicate_titles(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            let fresh = seen.insert(normalize(&task.title));
            if !fresh {
                warn!(title = %task.title, "skipping stored task with a duplicate title");
            }
            fresh
        })
        .collect()
}

fn legacy_time(title: &str, raw: Option<String>) -> Option<NaiveTime> {
    let raw = blank_to_none(raw)?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .inspect_err(|err| warn!(task = %title, %raw, error = %err, "dropping unparsable time"))
        .ok()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
