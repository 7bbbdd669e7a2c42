//! The provisioning engine.
//!
//! [`Orchestrator`] turns a site request into a stored record and a provider
//! call; [`Reconciler`] advances records whose provider task is still running;
//! the [`sweep`] functions retire expired and abandoned records.
//! [`SiteService`] bundles all of them behind one facade for the HTTP layer
//! and the scheduler.

mod calls;
pub mod config;
pub mod error;
pub mod ids;
pub mod orchestrator;
pub mod reconciler;
pub mod service;
pub mod sweep;

pub use config::ProvisioningConfig;
pub use error::{ProvisionError, ReconcileError};
pub use orchestrator::Orchestrator;
pub use reconciler::{Reconciler, TickReport};
pub use service::SiteService;
pub use sweep::SweepReport;
