//! The owner notification sink.
//!
//! Whoever requested a site (an order, a user) learns about later outcomes
//! through notes appended by this sink. Delivery is fire-and-forget: callers
//! log failures and carry on.

use std::{convert::Infallible, future::Future};

use tracing::info;

use crate::site::OwnerRef;

pub trait OwnerNotifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Attach a human-readable note to the owner. `visible_to_customer`
  /// distinguishes customer-facing notes from internal ones.
  fn append_note<'a>(
    &'a self,
    owner: &'a OwnerRef,
    text: &'a str,
    visible_to_customer: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Writes notes to the `tracing` log. Used when no richer sink is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl OwnerNotifier for TracingNotifier {
  type Error = Infallible;

  async fn append_note(
    &self,
    owner: &OwnerRef,
    text: &str,
    visible_to_customer: bool,
  ) -> Result<(), Infallible> {
    info!(
      order_id = owner.order_id.as_deref(),
      user_id = owner.user_id.as_deref(),
      source = owner.source.as_deref(),
      visible_to_customer,
      "{text}"
    );
    Ok(())
  }
}
