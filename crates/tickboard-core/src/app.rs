use tracing::{
  debug,
  info,
  instrument
};

use crate::datastore::{
  DataStore,
  KeyValueStore
};
use crate::error::StoreError;
use crate::store::TaskStore;
use crate::task::{
  Task,
  TaskDraft,
  TaskId,
  TaskPatch
};
use crate::view::{
  Tab,
  View,
  project
};

/// Everything a user can do to the board.
#[derive(Debug, Clone)]
pub enum Action {
  Create(TaskDraft),
  Update {
    id:    TaskId,
    patch: TaskPatch
  },
  Delete(TaskId),
  ToggleCompleted(TaskId),
  Import(Vec<Task>),
  SelectTab(Tab),
  Search(String),
  ClearSearch
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum NoticeKind {
  Success,
  Info,
  Danger
}

/// Transient, non-blocking message shown
/// after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub kind: NoticeKind,
  pub text: String
}

impl Notice {
  pub fn success(
    text: impl Into<String>
  ) -> Self {
    Self {
      kind: NoticeKind::Success,
      text: text.into()
    }
  }

  pub fn info(
    text: impl Into<String>
  ) -> Self {
    Self {
      kind: NoticeKind::Info,
      text: text.into()
    }
  }

  pub fn danger(
    text: impl Into<String>
  ) -> Self {
    Self {
      kind: NoticeKind::Danger,
      text: text.into()
    }
  }

  pub fn from_error(
    err: &StoreError
  ) -> Self {
    match err {
      | StoreError::DuplicateTitle {
        ..
      } => {
        Self::danger(
          "Task title already exists!"
        )
      }
      | StoreError::EmptyTitle => {
        Self::danger(
          "Task title cannot be empty!"
        )
      }
      | StoreError::PersistenceFailure(
        inner
      ) => {
        Self::danger(format!(
          "Could not save tasks: {inner}"
        ))
      }
      | other => {
        Self::danger(other.to_string())
      }
    }
  }
}

/// Session state: the task store, the
/// persisted tab and the transient search
/// keyword.
#[derive(Debug)]
pub struct App<S> {
  store:  TaskStore<S>,
  tab:    Tab,
  search: Option<String>
}

impl<S: KeyValueStore> App<S> {
  #[instrument(skip(datastore))]
  pub fn open(
    datastore: DataStore<S>
  ) -> Result<Self, StoreError> {
    let tab = datastore.load_tab()?;
    let store = TaskStore::open(datastore)?;
    debug!(%tab, "restored active tab");
    Ok(Self {
      store,
      tab,
      search: None
    })
  }

  pub fn store(&self) -> &TaskStore<S> {
    &self.store
  }

  pub fn store_mut(
    &mut self
  ) -> &mut TaskStore<S> {
    &mut self.store
  }

  /// The persisted tab, regardless of any
  /// active search.
  pub fn tab(&self) -> Tab {
    self.tab
  }

  pub fn search(&self) -> Option<&str> {
    self.search.as_deref()
  }

  pub fn view(&self) -> View<'_> {
    project(
      self.store.tasks(),
      self.tab,
      self.search.as_deref()
    )
  }

  #[instrument(skip(self))]
  pub fn dispatch(
    &mut self,
    action: Action
  ) -> Result<Option<Notice>, StoreError>
  {
    match action {
      | Action::Create(draft) => {
        self.store.create(draft)?;
        Ok(Some(Notice::success(
          "Task created successfully!"
        )))
      }
      | Action::Update {
        id,
        patch
      } => {
        self.store.update(id, patch)?;
        Ok(Some(Notice::info(
          "Task updated successfully!"
        )))
      }
      | Action::Delete(id) => {
        self.store.delete(id)?;
        Ok(Some(Notice::danger(
          "Task deleted successfully!"
        )))
      }
      | Action::ToggleCompleted(id) => {
        let done =
          self.store.toggle_completed(id)?;
        let text = if done {
          "Task completed!"
        } else {
          "Task marked as active!"
        };
        Ok(Some(Notice::success(text)))
      }
      | Action::Import(tasks) => {
        let summary =
          self.store.import(tasks)?;
        let skipped = summary
          .already_present
          + summary.duplicates;
        Ok(Some(Notice::success(format!(
          "Imported {} tasks ({skipped} \
           skipped)",
          summary.imported
        ))))
      }
      | Action::SelectTab(tab) => {
        self
          .store
          .datastore_mut()
          .save_tab(tab)?;
        info!(%tab, "tab selected");
        self.tab = tab;
        self.search = None;
        Ok(None)
      }
      | Action::Search(keyword) => {
        let trimmed = keyword.trim();
        self.search = if trimmed.is_empty()
        {
          None
        } else {
          Some(trimmed.to_string())
        };
        debug!(
          keyword = ?self.search,
          "search updated"
        );
        Ok(None)
      }
      | Action::ClearSearch => {
        self.search = None;
        Ok(None)
      }
    }
  }
}
