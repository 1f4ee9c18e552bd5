use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::normalize::normalize;
use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum Tab {
  #[default]
  All,
  Active,
  Completed
}

impl Tab {
  pub const ALL: [Tab; 3] = [
    Tab::All,
    Tab::Active,
    Tab::Completed
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      | Tab::All => "all",
      | Tab::Active => "active",
      | Tab::Completed => "completed"
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      | Tab::All => "All",
      | Tab::Active => "Active",
      | Tab::Completed => "Completed"
    }
  }
}

impl fmt::Display for Tab {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Tab {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let wanted =
      s.trim().to_ascii_lowercase();
    Tab::ALL
      .into_iter()
      .find(|tab| tab.as_str() == wanted)
      .ok_or_else(|| {
        anyhow!(
          "unknown tab: {wanted} \
           (expected all, active or \
           completed)"
        )
      })
  }
}

/// Why a projected view has nothing in it.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum EmptyReason {
  NoTasks,
  NoMatches
}

impl EmptyReason {
  pub fn message(&self) -> &'static str {
    match self {
      | EmptyReason::NoTasks => {
        "No tasks available"
      }
      | EmptyReason::NoMatches => {
        "No tasks found"
      }
    }
  }
}

/// The displayed set for one tab/search
/// state.
#[derive(Debug, Clone)]
pub struct View<'a> {
  pub tasks:       Vec<&'a Task>,
  pub display_tab: Tab,
  pub keyword:     Option<String>
}

impl View<'_> {
  pub fn empty_reason(
    &self
  ) -> Option<EmptyReason> {
    if !self.tasks.is_empty() {
      return None;
    }
    if self.keyword.is_some() {
      Some(EmptyReason::NoMatches)
    } else {
      Some(EmptyReason::NoTasks)
    }
  }
}

pub fn select_for_tab<'a>(
  tasks: &[&'a Task],
  tab: Tab
) -> Vec<&'a Task> {
  tasks
    .iter()
    .copied()
    .filter(|task| match tab {
      | Tab::All => true,
      | Tab::Active => !task.is_completed,
      | Tab::Completed => task.is_completed
    })
    .collect()
}

/// Keep tasks whose normalized title or
/// description contains the normalized
/// keyword. A blank keyword returns the
/// input unchanged.
pub fn search_filter<'a>(
  tasks: &[&'a Task],
  keyword: &str
) -> Vec<&'a Task> {
  let needle = normalize(keyword);
  if needle.is_empty() {
    return tasks.to_vec();
  }

  tasks
    .iter()
    .copied()
    .filter(|task| {
      normalize(&task.title)
        .contains(&needle)
        || task
          .description
          .as_deref()
          .map(|d| {
            normalize(d).contains(&needle)
          })
          .unwrap_or(false)
    })
    .collect()
}

/// Derive the displayed set. A non-blank
/// keyword searches the whole list under the
/// `All` tab; otherwise the persisted tab
/// decides.
#[tracing::instrument(skip(tasks))]
pub fn project<'a>(
  tasks: &'a [Task],
  tab: Tab,
  keyword: Option<&str>
) -> View<'a> {
  let all: Vec<&Task> =
    tasks.iter().collect();
  let keyword = keyword
    .filter(|k| !normalize(k).is_empty());

  let view = match keyword {
    | Some(keyword) => {
      View {
        tasks:       search_filter(
          &all, keyword
        ),
        display_tab: Tab::All,
        keyword:     Some(
          keyword.to_string()
        )
      }
    }
    | None => {
      View {
        tasks:       select_for_tab(
          &all, tab
        ),
        display_tab: tab,
        keyword:     None
      }
    }
  };
  trace!(
    shown = view.tasks.len(),
    total = tasks.len(),
    display_tab = %view.display_tab,
    "projected view"
  );
  view
}
