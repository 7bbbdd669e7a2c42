//! Core types and trait definitions for siteforge.
//!
//! No HTTP or database code lives here. The provider client, the SQLite
//! store and the provisioning engine all build on these types.

// Trait methods spell out `impl Future + Send`; impls use native `async fn`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod history;
pub mod notify;
pub mod provider;
pub mod site;
pub mod status;
pub mod store;

pub use error::{Error, Result};
