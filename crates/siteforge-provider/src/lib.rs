//! HTTP client for the remote site provider.
//!
//! [`ProviderClient`] implements [`siteforge_core::provider::Provider`] over
//! `reqwest`, normalising the provider's envelope and field drift into the
//! core response types. [`TemplateCatalog`] caches the slowly-changing
//! template list in front of any provider.

pub mod catalog;
pub mod client;
pub mod credentials;
pub mod endpoints;
mod wire;

pub use catalog::TemplateCatalog;
pub use client::{ProviderClient, ProviderConfig};
pub use credentials::{CredentialSource, StaticCredentials};
pub use endpoints::ApiVersion;
