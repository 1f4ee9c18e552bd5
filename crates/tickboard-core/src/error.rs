use std::path::PathBuf;

use thiserror::Error;

/// Failures of the key-value persistence
/// layer. Always recoverable: the caller
/// keeps its in-memory state and reports.
#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error(
    "failed to read {key} from {path}: \
     {source}"
  )]
  Read {
    key:    String,
    path:   PathBuf,
    source: std::io::Error
  },
  #[error(
    "failed to write {key} to {path}: \
     {source}"
  )]
  Write {
    key:    String,
    path:   PathBuf,
    source: std::io::Error
  },
  #[error("failed to decode {key}: {source}")]
  Decode {
    key:    String,
    source: serde_json::Error
  },
  #[error("failed to encode {key}: {source}")]
  Encode {
    key:    String,
    source: serde_json::Error
  },
  #[error(
    "unsupported task document version \
     {found} (newest supported is \
     {supported})"
  )]
  UnsupportedVersion {
    found:     u64,
    supported: u64
  },
  #[error(
    "unrecognized task document under \
     {key}"
  )]
  Malformed {
    key: String
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("task title cannot be empty")]
  EmptyTitle,
  #[error("task title already exists: {title}")]
  DuplicateTitle {
    title: String
  },
  #[error("task not found: {0}")]
  NotFound(String),
  #[error(
    "task id {prefix} is ambiguous: \
     matches {count} tasks"
  )]
  AmbiguousId {
    prefix: String,
    count:  usize
  },
  #[error(transparent)]
  PersistenceFailure(
    #[from] PersistenceError
  )
}

impl StoreError {
  pub fn is_persistence(&self) -> bool {
    matches!(
      self,
      StoreError::PersistenceFailure(_)
    )
  }
}
