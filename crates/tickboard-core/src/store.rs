use std::collections::HashSet;

use chrono::NaiveTime;
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::datastore::{
  DataStore,
  KeyValueStore
};
use crate::error::StoreError;
use crate::normalize::normalize;
use crate::task::{
  Task,
  TaskDraft,
  TaskId,
  TaskPatch
};

/// Outcome of a bulk import.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub struct ImportSummary {
  pub imported:        usize,
  pub already_present: usize,
  pub duplicates:      usize
}

/// Ordered task list, mirrored to a
/// key-value backend after every mutation.
///
/// Mutations validate first, then persist a
/// staged copy and only swap it in once the
/// write succeeded, so memory never runs
/// ahead of storage.
#[derive(Debug)]
pub struct TaskStore<S> {
  tasks:     Vec<Task>,
  datastore: DataStore<S>
}

impl<S: KeyValueStore> TaskStore<S> {
  #[instrument(skip(datastore))]
  pub fn open(
    datastore: DataStore<S>
  ) -> Result<Self, StoreError> {
    let tasks = datastore.load_tasks()?;
    info!(
      count = tasks.len(),
      "task store opened"
    );
    Ok(Self {
      tasks,
      datastore
    })
  }

  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  pub fn datastore(&self) -> &DataStore<S> {
    &self.datastore
  }

  pub fn datastore_mut(
    &mut self
  ) -> &mut DataStore<S> {
    &mut self.datastore
  }

  pub fn get(
    &self,
    id: TaskId
  ) -> Option<&Task> {
    self
      .tasks
      .iter()
      .find(|task| task.id == id)
  }

  /// Canonical position of `id` in the
  /// list.
  pub fn index_of(
    &self,
    id: TaskId
  ) -> Option<usize> {
    self
      .tasks
      .iter()
      .position(|task| task.id == id)
  }

  /// Map a typed id (full UUID or any
  /// prefix of the short form) to a task.
  #[instrument(skip(self))]
  pub fn resolve(
    &self,
    prefix: &str
  ) -> Result<TaskId, StoreError> {
    let wanted = prefix
      .trim()
      .to_ascii_lowercase()
      .replace('-', "");
    if wanted.is_empty() {
      return Err(StoreError::NotFound(
        prefix.to_string()
      ));
    }

    let matches: Vec<TaskId> = self
      .tasks
      .iter()
      .filter(|task| {
        task
          .id
          .0
          .simple()
          .to_string()
          .starts_with(&wanted)
      })
      .map(|task| task.id)
      .collect();

    match matches.as_slice() {
      | [] => {
        Err(StoreError::NotFound(
          prefix.to_string()
        ))
      }
      | [id] => Ok(*id),
      | many => {
        Err(StoreError::AmbiguousId {
          prefix: prefix.to_string(),
          count:  many.len()
        })
      }
    }
  }

  /// Exact content match on title,
  /// description and start time. Only used
  /// to recognise records that were already
  /// imported; identity is [`TaskId`].
  pub fn find_by_content(
    &self,
    title: &str,
    description: Option<&str>,
    start_time: Option<NaiveTime>
  ) -> Option<usize> {
    self.tasks.iter().position(|task| {
      task.title == title
        && task.description.as_deref()
          == description
        && task.start_time == start_time
    })
  }

  /// Whether `title` collides with any task
  /// other than `except`.
  pub fn title_taken(
    &self,
    title: &str,
    except: Option<TaskId>
  ) -> bool {
    let wanted = normalize(title);
    self.tasks.iter().any(|task| {
      Some(task.id) != except
        && normalize(&task.title) == wanted
    })
  }

  #[instrument(skip(self, draft), fields(title = %draft.title))]
  pub fn create(
    &mut self,
    draft: TaskDraft
  ) -> Result<TaskId, StoreError> {
    let task = Task::from_draft(draft);
    self.insert(task)
  }

  /// Prepend an already-built record,
  /// applying the same title rules as
  /// `create`.
  #[instrument(skip(self, task), fields(title = %task.title))]
  pub fn insert(
    &mut self,
    task: Task
  ) -> Result<TaskId, StoreError> {
    if task.title.trim().is_empty() {
      return Err(StoreError::EmptyTitle);
    }
    if self.title_taken(&task.title, None)
    {
      debug!("rejecting duplicate title");
      return Err(
        StoreError::DuplicateTitle {
          title: task.title
        }
      );
    }

    let id = task.id;
    let mut staged =
      Vec::with_capacity(self.len() + 1);
    staged.push(task);
    staged.extend(self.tasks.iter().cloned());
    self.commit(staged)?;

    info!(id = %id.short(), "task created");
    Ok(id)
  }

  #[instrument(skip(self, patch), fields(id = %id.short()))]
  pub fn update(
    &mut self,
    id: TaskId,
    patch: TaskPatch
  ) -> Result<(), StoreError> {
    let idx =
      self.index_of(id).ok_or_else(|| {
        StoreError::NotFound(id.short())
      })?;

    if let Some(title) = patch.title.as_ref()
    {
      if title.trim().is_empty() {
        return Err(StoreError::EmptyTitle);
      }
      if self.title_taken(title, Some(id)) {
        debug!(
          "rejecting duplicate title on \
           edit"
        );
        return Err(
          StoreError::DuplicateTitle {
            title: title.trim().to_string()
          }
        );
      }
    }

    let mut staged = self.tasks.clone();
    staged[idx].apply_patch(patch);
    self.commit(staged)?;

    info!("task updated");
    Ok(())
  }

  #[instrument(skip(self), fields(id = %id.short()))]
  pub fn delete(
    &mut self,
    id: TaskId
  ) -> Result<Task, StoreError> {
    let idx =
      self.index_of(id).ok_or_else(|| {
        StoreError::NotFound(id.short())
      })?;

    let mut staged = self.tasks.clone();
    let removed = staged.remove(idx);
    self.commit(staged)?;

    info!(
      title = %removed.title,
      "task deleted"
    );
    Ok(removed)
  }

  #[instrument(skip(self), fields(id = %id.short()))]
  pub fn toggle_completed(
    &mut self,
    id: TaskId
  ) -> Result<bool, StoreError> {
    let idx =
      self.index_of(id).ok_or_else(|| {
        StoreError::NotFound(id.short())
      })?;

    let mut staged = self.tasks.clone();
    let now_completed =
      !staged[idx].is_completed;
    staged[idx].is_completed =
      now_completed;
    self.commit(staged)?;

    info!(
      completed = now_completed,
      "task toggled"
    );
    Ok(now_completed)
  }

  /// Prepend `incoming` as one block, in
  /// its own order, in a single write.
  /// Records already present (same title,
  /// description and start time) and
  /// records whose title collides are
  /// skipped.
  #[instrument(skip(self, incoming), fields(incoming = incoming.len()))]
  pub fn import(
    &mut self,
    incoming: Vec<Task>
  ) -> Result<ImportSummary, StoreError> {
    let mut summary =
      ImportSummary::default();
    let mut titles: HashSet<String> = self
      .tasks
      .iter()
      .map(|task| normalize(&task.title))
      .collect();
    let mut ids: HashSet<TaskId> = self
      .tasks
      .iter()
      .map(|task| task.id)
      .collect();
    let mut block = Vec::new();

    for mut task in incoming {
      if self
        .find_by_content(
          &task.title,
          task.description.as_deref(),
          task.start_time
        )
        .is_some()
      {
        summary.already_present += 1;
        continue;
      }
      let title = normalize(&task.title);
      if title.is_empty() {
        return Err(StoreError::EmptyTitle);
      }
      if !titles.insert(title) {
        debug!(
          title = %task.title,
          "skipping duplicate title on import"
        );
        summary.duplicates += 1;
        continue;
      }
      if !ids.insert(task.id) {
        task.id = TaskId::new();
        ids.insert(task.id);
      }
      block.push(task);
    }

    summary.imported = block.len();
    if summary.imported > 0 {
      block.extend(
        self.tasks.iter().cloned()
      );
      self.commit(block)?;
    }

    info!(
      imported = summary.imported,
      already_present =
        summary.already_present,
      duplicates = summary.duplicates,
      "import finished"
    );
    Ok(summary)
  }

  fn commit(
    &mut self,
    staged: Vec<Task>
  ) -> Result<(), StoreError> {
    if let Err(err) =
      self.datastore.save_tasks(&staged)
    {
      warn!(
        error = %err,
        "persisting tasks failed; keeping previous list"
      );
      return Err(err.into());
    }
    self.tasks = staged;
    Ok(())
  }
}
