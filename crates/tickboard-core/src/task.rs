use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::hhmm_serde;

/// Stable identity assigned when a task is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex digits, the form users type.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Priority::Low),
            "m" | "med" | "medium" => Ok(Priority::Medium),
            "h" | "high" => Ok(Priority::High),
            other => Err(anyhow!("invalid priority: {other} (expected low, medium or high)")),
        }
    }
}

/// Card tint. Display-only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    #[default]
    Blue,
    Purple,
    Yellow,
    Pink,
    Green,
}

impl CardColor {
    pub const ALL: [CardColor; 5] = [
        CardColor::Blue,
        CardColor::Purple,
        CardColor::Yellow,
        CardColor::Pink,
        CardColor::Green,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardColor::Blue => "blue",
            CardColor::Purple => "purple",
            CardColor::Yellow => "yellow",
            CardColor::Pink => "pink",
            CardColor::Green => "green",
        }
    }

    /// SGR foreground code used by the terminal renderer.
    pub fn ansi_code(&self) -> &'static str {
        match self {
            CardColor::Blue => "34",
            CardColor::Purple => "35",
            CardColor::Yellow => "33",
            CardColor::Pink => "95",
            CardColor::Green => "32",
        }
    }
}

impl FromStr for CardColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CardColor::ALL
            .into_iter()
            .find(|color| color.as_str() == wanted)
            .ok_or_else(|| {
                let palette: Vec<&str> = CardColor::ALL.iter().map(|c| c.as_str()).collect();
                anyhow!("invalid color: {wanted} (expected one of {})", palette.join(", "))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, with = "hhmm_serde::option", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,

    #[serde(default, with = "hhmm_serde::option", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub card_color: CardColor,

    #[serde(default)]
    pub is_completed: bool,
}

impl Task {
    pub fn from_draft(draft: TaskDraft) -> Self {
        Self {
            id: TaskId::new(),
            title: draft.title.trim().to_string(),
            description: non_blank(draft.description),
            category: non_blank(draft.category),
            priority: draft.priority.unwrap_or_default(),
            start_time: draft.start_time,
            end_time: draft.end_time,
            due_date: draft.due_date,
            card_color: draft.card_color.unwrap_or_default(),
            is_completed: false,
        }
    }

    /// Merge the supplied fields of `patch`; everything absent keeps its value.
    pub fn apply_patch(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = non_blank(description);
        }
        if let Some(category) = patch.category {
            self.category = non_blank(category);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(start_time) = patch.start_time {
            self.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            self.end_time = end_time;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(card_color) = patch.card_color {
            self.card_color = card_color;
        }
    }
}

/// Input for a new task, as submitted by the add form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub due_date: Option<NaiveDate>,
    pub card_color: Option<CardColor>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves a field alone; for optional fields
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub start_time: Option<Option<NaiveTime>>,
    pub end_time: Option<Option<NaiveTime>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub card_color: Option<CardColor>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.due_date.is_none()
            && self.card_color.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::{CardColor, Priority, Task, TaskDraft, TaskPatch};

    #[test]
    fn draft_defaults_match_the_add_form() {
        let task = Task::from_draft(TaskDraft {
            title: "  Buy milk ".to_string(),
            description: Some("   ".to_string()),
            ..TaskDraft::default()
        });
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description, None);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.card_color, CardColor::Blue);
        assert!(!task.is_completed);
    }

    #[test]
    fn patch_keeps_absent_fields_and_clears_explicit_none() {
        let start = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
        let mut task = Task::from_draft(TaskDraft {
            title: "Pay bills".to_string(),
            description: Some("electricity".to_string()),
            category: Some("home".to_string()),
            start_time: Some(start),
            ..TaskDraft::default()
        });
        task.is_completed = true;

        task.apply_patch(TaskPatch {
            priority: Some(Priority::High),
            category: Some(None),
            ..TaskPatch::default()
        });

        assert_eq!(task.title, "Pay bills");
        assert_eq!(task.description.as_deref(), Some("electricity"));
        assert_eq!(task.category, None);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.start_time, Some(start));
        assert!(task.is_completed);
    }

    #[test]
    fn parses_priority_and_palette_names() {
        assert_eq!("HIGH".parse::<Priority>().expect("priority"), Priority::High);
        assert_eq!("m".parse::<Priority>().expect("priority"), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!("Pink".parse::<CardColor>().expect("color"), CardColor::Pink);
        assert!("teal".parse::<CardColor>().is_err());
    }

    #[test]
    fn short_id_is_eight_hex_digits() {
        let task = Task::from_draft(TaskDraft::titled("x"));
        let short = task.id.short();
        assert_eq!(short.len(), 8);
        assert!(task.id.to_string().replace('-', "").starts_with(&short));
    }
}
