use std::time::Duration;

use crate::ids;

/// Tuning for the orchestrator, the reconciler and the sweeps.
#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
  /// Outer bound on every provider call.
  pub call_timeout:         Duration,
  pub max_concurrent_polls: usize,
  /// How long a tick may hold the reconciler lease before another process
  /// is allowed to take over.
  pub lease_ttl:            Duration,
  /// Age after which a record still `creating` is considered abandoned.
  pub stale_after:          Duration,
  /// Identity written into the lease row.
  pub holder:               String,
}

impl Default for ProvisioningConfig {
  fn default() -> Self {
    Self {
      call_timeout:         Duration::from_secs(30),
      max_concurrent_polls: 4,
      lease_ttl:            Duration::from_secs(300),
      stale_after:          Duration::from_secs(1800),
      holder:               ids::instance_id(),
    }
  }
}
