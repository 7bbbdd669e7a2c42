//! Locally generated identifiers.

use rand_core::{OsRng, RngCore};
use siteforge_core::site::PLACEHOLDER_PREFIX;

fn random_hex<const N: usize>() -> String {
  let mut bytes = [0u8; N];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// A fresh placeholder key: `pending-` followed by 32 hex characters from the
/// OS RNG. Never collides with a provider id.
pub fn placeholder_id() -> String {
  format!("{PLACEHOLDER_PREFIX}{}", random_hex::<16>())
}

/// Identity of this process for lease ownership.
pub fn instance_id() -> String { format!("siteforge-{}", random_hex::<8>()) }
