//! Endpoint paths for the two provider API generations.
//!
//! Both generations expose the same operations under different paths. The
//! client picks one set from configuration; callers never see the difference.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
  /// The legacy API.
  V1,
  #[default]
  V2,
}

impl ApiVersion {
  pub(crate) fn create_site(self) -> Vec<&'static str> {
    match self {
      Self::V1 => vec!["api", "v1", "sites"],
      Self::V2 => vec!["api", "v2", "sites", "template"],
    }
  }

  pub(crate) fn task_status(self, task_id: &str) -> Vec<&str> {
    match self {
      Self::V1 => vec!["api", "v1", "task", task_id],
      Self::V2 => vec!["api", "v2", "tasks", task_id, "status"],
    }
  }

  pub(crate) fn site_details(self, resource_id: &str) -> Vec<&str> {
    match self {
      Self::V1 => vec!["api", "v1", "site", resource_id],
      Self::V2 => vec!["api", "v2", "sites", resource_id, "details"],
    }
  }

  pub(crate) fn templates(self) -> Vec<&'static str> {
    match self {
      Self::V1 => vec!["api", "v1", "templates"],
      Self::V2 => vec!["api", "v2", "templates"],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn versions_use_sibling_paths() {
    assert_eq!(ApiVersion::V2.task_status("t1").join("/"), "api/v2/tasks/t1/status");
    assert_eq!(ApiVersion::V1.task_status("t1").join("/"), "api/v1/task/t1");
    assert_eq!(ApiVersion::V2.site_details("42").join("/"), "api/v2/sites/42/details");
    assert_eq!(ApiVersion::V1.site_details("42").join("/"), "api/v1/site/42");
  }

  #[test]
  fn version_deserialises_lowercase() {
    let v: ApiVersion = serde_json::from_str("\"v1\"").unwrap();
    assert_eq!(v, ApiVersion::V1);
    assert_eq!(ApiVersion::default(), ApiVersion::V2);
  }
}
