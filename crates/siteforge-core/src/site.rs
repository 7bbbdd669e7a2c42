//! Site records: the aggregate root of the provisioning lifecycle.
//!
//! A record is created the instant a site is requested, before the provider
//! has answered, and is then walked through its lifecycle by the orchestrator
//! and the reconciler. The store is the single source of truth for where a
//! site currently stands.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix of the locally generated key a record carries until the provider
/// assigns a real identifier. Provider ids are numeric or slug-like and never
/// start with this.
pub const PLACEHOLDER_PREFIX: &str = "pending-";

/// Whether `site_id` is a locally generated placeholder key.
pub fn is_placeholder_id(site_id: &str) -> bool {
  site_id.starts_with(PLACEHOLDER_PREFIX)
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of a [`SiteRecord`].
///
/// Valid transitions:
/// `creating → {progress → completed | failed} | completed | failed`,
/// `completed → expired` (ephemeral sites only).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SiteStatus {
  /// Requested; the provider's creation response has not been parsed yet.
  Creating,
  /// A provider task is outstanding.
  Progress,
  Completed,
  Failed,
  /// An ephemeral site whose lifetime ran out.
  Expired,
}

impl SiteStatus {
  /// Parse the lowercase form stored in the database.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownSiteStatus(s.to_owned()))
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed | Self::Expired)
  }

  /// States the reconciler may still move forward.
  pub fn is_pending(self) -> bool {
    matches!(self, Self::Creating | Self::Progress)
  }
}

// ─── Access ──────────────────────────────────────────────────────────────────

/// Where the site lives and how to log into it. Every field stays empty
/// until the site has completed; nothing here is filled in speculatively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteAccess {
  pub site_url:       Option<String>,
  pub admin_username: Option<String>,
  pub admin_password: Option<String>,
  pub admin_url:      Option<String>,
  pub session_hash:   Option<String>,
}

impl SiteAccess {
  pub fn is_empty(&self) -> bool {
    self.site_url.is_none()
      && self.admin_username.is_none()
      && self.admin_password.is_none()
      && self.admin_url.is_none()
      && self.session_hash.is_none()
  }

  /// True when the site can actually be used: a URL and a login name.
  pub fn is_usable(&self) -> bool {
    self.site_url.is_some() && self.admin_username.is_some()
  }

  /// Fill fields missing from `self` with values from `other`.
  pub fn or(self, other: SiteAccess) -> SiteAccess {
    SiteAccess {
      site_url:       self.site_url.or(other.site_url),
      admin_username: self.admin_username.or(other.admin_username),
      admin_password: self.admin_password.or(other.admin_password),
      admin_url:      self.admin_url.or(other.admin_url),
      session_hash:   self.session_hash.or(other.session_hash),
    }
  }
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// Opaque link to whatever asked for the site. Used for notes and
/// attribution only; lifecycle logic never looks at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
  pub order_id: Option<String>,
  pub user_id:  Option<String>,
  /// Channel the request came through, e.g. `"checkout"` or `"admin"`.
  pub source:   Option<String>,
}

// ─── SiteRecord ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
  pub site_id:       String,
  pub status:        SiteStatus,
  /// Present only while `status` is [`SiteStatus::Progress`].
  pub task_id:       Option<String>,
  pub access:        SiteAccess,
  /// `Some(true)`: drawn from the provider's warm pool. `None`: the provider
  /// had not decided when it answered.
  pub is_pool:       Option<bool>,
  pub is_reserved:   bool,
  pub is_shared:     bool,
  pub expiry_hours:  Option<u32>,
  /// `created_at + expiry_hours`, set only for ephemeral sites.
  pub expires_at:    Option<DateTime<Utc>>,
  pub template_slug: String,
  pub plan_id:       Option<u64>,
  pub owner:         OwnerRef,
  /// Last raw provider payload, kept for diagnostics.
  pub raw_response:  Option<serde_json::Value>,
  pub error_message: Option<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl SiteRecord {
  /// Ephemeral sites carry an expiry and are not reserved.
  pub fn is_ephemeral(&self) -> bool {
    self.expiry_hours.is_some() && !self.is_reserved
  }

  /// Whether the reconciler has a task to poll for this record.
  pub fn needs_polling(&self) -> bool {
    self.status.is_pending() && self.task_id.is_some()
  }
}

// ─── NewSite ─────────────────────────────────────────────────────────────────

/// Input to a site creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSite {
  pub template_slug: String,
  #[serde(default)]
  pub plan_id:       Option<u64>,
  #[serde(default)]
  pub is_reserved:   bool,
  #[serde(default)]
  pub expiry_hours:  Option<u32>,
  #[serde(default)]
  pub is_shared:     Option<bool>,
  #[serde(default)]
  pub owner:         OwnerRef,
}

impl NewSite {
  /// Convenience constructor: a permanent site with no plan or owner.
  pub fn new(template_slug: impl Into<String>) -> Self {
    Self {
      template_slug: template_slug.into(),
      plan_id:       None,
      is_reserved:   true,
      expiry_hours:  None,
      is_shared:     None,
      owner:         OwnerRef::default(),
    }
  }

  /// Expiry instant for a site of this shape created at `created_at`.
  pub fn expires_at(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if self.is_reserved {
      return None;
    }
    self
      .expiry_hours
      .map(|h| created_at + chrono::Duration::hours(i64::from(h)))
  }
}
