//! Mapping of provider task statuses onto the three canonical task states.
//!
//! The provider is inconsistent: the creation endpoint and the task-status
//! endpoint encode the same concept differently (numeric codes on one,
//! strings on the other, and numbers-as-strings from older deployments).
//! Everything funnels through [`map_status`].

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A status value exactly as the provider sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
  Code(i64),
  Text(String),
}

impl From<i64> for RawStatus {
  fn from(code: i64) -> Self { Self::Code(code) }
}

impl From<&str> for RawStatus {
  fn from(text: &str) -> Self { Self::Text(text.to_owned()) }
}

impl std::fmt::Display for RawStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Code(c) => write!(f, "{c}"),
      Self::Text(t) => f.write_str(t),
    }
  }
}

/// Canonical state of a provider task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
  Completed,
  Progress,
  Failed,
}

/// Translate a provider status into a [`TaskState`].
///
/// Unknown values fail open to [`TaskState::Progress`] so that a record is
/// polled again rather than finalised on a guess.
pub fn map_status(raw: &RawStatus) -> TaskState {
  match raw {
    RawStatus::Code(code) => map_code(*code),
    RawStatus::Text(text) => {
      let text = text.trim();
      if let Ok(code) = text.parse::<i64>() {
        return map_code(code);
      }
      match text.to_ascii_lowercase().as_str() {
        "completed" | "success" | "done" => TaskState::Completed,
        "progress" | "in_progress" | "pending" | "running" => {
          TaskState::Progress
        }
        "failed" | "error" | "failure" => TaskState::Failed,
        other => {
          warn!(status = other, "unrecognised provider status, treating as progress");
          TaskState::Progress
        }
      }
    }
  }
}

fn map_code(code: i64) -> TaskState {
  match code {
    0 => TaskState::Completed,
    1 => TaskState::Progress,
    2 => TaskState::Failed,
    other => {
      warn!(code = other, "unrecognised provider status code, treating as progress");
      TaskState::Progress
    }
  }
}
