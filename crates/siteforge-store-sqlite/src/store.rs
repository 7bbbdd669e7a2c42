//! [`SqliteStore`]: the SQLite implementation of [`SiteStore`].

use std::path::Path;

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use siteforge_core::{
  history::{HistoryEntry, NewHistoryEntry},
  site::{NewSite, SiteRecord, SiteStatus},
  store::{OwnerQuery, SiteChange, SiteStore},
};

use crate::{
  encode::{
    ChangeColumns, RawHistoryEntry, RawSite, SITE_COLUMNS, encode_dt,
    encode_json, encode_status, status_list,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Timestamps are stored with microsecond precision; truncate up front so
/// that records built in memory compare equal to what is read back.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn read_site(
  conn: &rusqlite::Connection,
  site_id: &str,
) -> rusqlite::Result<Option<RawSite>> {
  conn
    .query_row(
      &format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_id = ?1"),
      rusqlite::params![site_id],
      RawSite::from_row,
    )
    .optional()
}

fn query_sites<P: rusqlite::Params>(
  conn: &rusqlite::Connection,
  filter: &str,
  params: P,
) -> rusqlite::Result<Vec<RawSite>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {SITE_COLUMNS} FROM sites {filter}"))?;
  stmt
    .query_map(params, RawSite::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()
}

/// Write `cols` to `site_id` if its status is in `from_list`. Returns the
/// number of rows changed (0 or 1).
fn apply_change(
  conn: &rusqlite::Connection,
  site_id: &str,
  from_list: &str,
  cols: &ChangeColumns,
  raw_response: Option<&str>,
  updated_at: &str,
) -> rusqlite::Result<usize> {
  conn.execute(
    &format!(
      "UPDATE sites SET
         status         = ?1,
         task_id        = ?2,
         site_url       = ?3,
         admin_username = ?4,
         admin_password = ?5,
         admin_url      = ?6,
         session_hash   = ?7,
         is_pool        = COALESCE(?8, is_pool),
         error_message  = ?9,
         raw_response   = COALESCE(?10, raw_response),
         updated_at     = ?11
       WHERE site_id = ?12 AND status IN ({from_list})"
    ),
    rusqlite::params![
      cols.status,
      cols.task_id,
      cols.access.site_url,
      cols.access.admin_username,
      cols.access.admin_password,
      cols.access.admin_url,
      cols.access.session_hash,
      cols.is_pool,
      cols.error_message,
      raw_response,
      updated_at,
      site_id,
    ],
  )
}

fn into_records(raws: Vec<RawSite>) -> Result<Vec<SiteRecord>> {
  raws.into_iter().map(RawSite::into_record).collect()
}

enum RekeyOutcome {
  Done(Option<RawSite>),
  Missing,
  NotCreating(String),
  Taken,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A siteforge record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_where(
    &self,
    filter: &'static str,
    param: Option<String>,
  ) -> Result<Vec<SiteRecord>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(match param {
          Some(p) => query_sites(conn, filter, rusqlite::params![p])?,
          None => query_sites(conn, filter, [])?,
        })
      })
      .await?;
    into_records(raws)
  }
}

// ─── SiteStore impl ──────────────────────────────────────────────────────────

impl SiteStore for SqliteStore {
  type Error = Error;

  // ── Records ───────────────────────────────────────────────────────────────

  async fn insert_site(&self, site_id: String, input: NewSite) -> Result<SiteRecord> {
    let created_at = now();
    let record = SiteRecord {
      site_id,
      status:        SiteStatus::Creating,
      task_id:       None,
      access:        Default::default(),
      is_pool:       None,
      is_reserved:   input.is_reserved,
      is_shared:     input.is_shared.unwrap_or(false),
      expiry_hours:  input.expiry_hours,
      expires_at:    input.expires_at(created_at),
      template_slug: input.template_slug,
      plan_id:       input.plan_id,
      owner:         input.owner,
      raw_response:  None,
      error_message: None,
      created_at,
      updated_at:    created_at,
    };

    let site_id       = record.site_id.clone();
    let status        = encode_status(record.status);
    let is_reserved   = record.is_reserved;
    let is_shared     = record.is_shared;
    let expiry_hours  = record.expiry_hours;
    let expires_at    = record.expires_at.map(encode_dt);
    let template_slug = record.template_slug.clone();
    let plan_id       = record.plan_id.map(|p| p as i64);
    let owner         = record.owner.clone();
    let at_str        = encode_dt(created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sites (
             site_id, status, is_reserved, is_shared, expiry_hours, expires_at,
             template_slug, plan_id, order_id, user_id, source,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
          rusqlite::params![
            site_id,
            status,
            is_reserved,
            is_shared,
            expiry_hours,
            expires_at,
            template_slug,
            plan_id,
            owner.order_id,
            owner.user_id,
            owner.source,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn get_site(&self, site_id: &str) -> Result<Option<SiteRecord>> {
    let id = site_id.to_owned();
    let raw = self.conn.call(move |conn| Ok(read_site(conn, &id)?)).await?;
    raw.map(RawSite::into_record).transpose()
  }

  async fn list_pending(&self) -> Result<Vec<SiteRecord>> {
    self
      .list_where(
        "WHERE status IN ('creating', 'progress') AND task_id IS NOT NULL
         ORDER BY created_at, rowid",
        None,
      )
      .await
  }

  async fn list_by_owner(&self, query: &OwnerQuery) -> Result<Vec<SiteRecord>> {
    let query = query.clone();
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_sites(
          conn,
          "WHERE (?1 IS NULL OR order_id = ?1)
             AND (?2 IS NULL OR user_id  = ?2)
             AND (?3 IS NULL OR source   = ?3)
           ORDER BY created_at, rowid",
          rusqlite::params![query.order_id, query.user_id, query.source],
        )?)
      })
      .await?;
    into_records(raws)
  }

  async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<SiteRecord>> {
    self
      .list_where(
        "WHERE status = 'completed'
           AND is_reserved = 0
           AND expires_at IS NOT NULL
           AND expires_at <= ?1
         ORDER BY expires_at, rowid",
        Some(encode_dt(now)),
      )
      .await
  }

  async fn list_stale_creating(&self, before: DateTime<Utc>) -> Result<Vec<SiteRecord>> {
    self
      .list_where(
        "WHERE status = 'creating' AND created_at < ?1
         ORDER BY created_at, rowid",
        Some(encode_dt(before)),
      )
      .await
  }

  async fn rekey(
    &self,
    old_id:       &str,
    new_id:       &str,
    change:       SiteChange,
    raw_response: Option<serde_json::Value>,
  ) -> Result<SiteRecord> {
    let old   = old_id.to_owned();
    let new   = new_id.to_owned();
    let cols  = ChangeColumns::from(change);
    let raw   = raw_response.as_ref().map(encode_json);
    let at    = encode_dt(now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<String> = tx
          .query_row(
            "SELECT status FROM sites WHERE site_id = ?1",
            rusqlite::params![old],
            |r| r.get(0),
          )
          .optional()?;
        let Some(status) = current else {
          return Ok(RekeyOutcome::Missing);
        };
        if status != "creating" {
          return Ok(RekeyOutcome::NotCreating(status));
        }

        if new != old {
          let taken = tx
            .query_row(
              "SELECT 1 FROM sites WHERE site_id = ?1",
              rusqlite::params![new],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if taken {
            return Ok(RekeyOutcome::Taken);
          }
          // History rows follow via ON UPDATE CASCADE.
          tx.execute(
            "UPDATE sites SET site_id = ?2 WHERE site_id = ?1",
            rusqlite::params![old, new],
          )?;
        }

        apply_change(&tx, &new, "'creating'", &cols, raw.as_deref(), &at)?;
        let row = read_site(&tx, &new)?;
        tx.commit()?;
        Ok(RekeyOutcome::Done(row))
      })
      .await?;

    match outcome {
      RekeyOutcome::Done(Some(raw)) => {
        debug!(old_id, new_id, "re-keyed site record");
        raw.into_record()
      }
      RekeyOutcome::Done(None) | RekeyOutcome::Missing => {
        Err(Error::SiteNotFound(old_id.to_owned()))
      }
      RekeyOutcome::NotCreating(status) => Err(Error::NotCreating {
        site_id: old_id.to_owned(),
        status:  SiteStatus::parse(&status)?,
      }),
      RekeyOutcome::Taken => Err(Error::SiteIdTaken(new_id.to_owned())),
    }
  }

  async fn transition(
    &self,
    site_id:      &str,
    from:         &[SiteStatus],
    change:       SiteChange,
    raw_response: Option<serde_json::Value>,
  ) -> Result<Option<SiteRecord>> {
    if from.is_empty() {
      return Ok(None);
    }

    let id        = site_id.to_owned();
    let from_list = status_list(from);
    let cols      = ChangeColumns::from(change);
    let raw       = raw_response.as_ref().map(encode_json);
    let at        = encode_dt(now());

    let raw_site = self
      .conn
      .call(move |conn| {
        let changed =
          apply_change(conn, &id, &from_list, &cols, raw.as_deref(), &at)?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(read_site(conn, &id)?)
      })
      .await?;

    raw_site.map(RawSite::into_record).transpose()
  }

  async fn set_plan(&self, site_id: &str, plan_id: Option<u64>) -> Result<Option<SiteRecord>> {
    let id   = site_id.to_owned();
    let plan = plan_id.map(|p| p as i64);
    let at   = encode_dt(now());

    let raw_site = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE sites SET plan_id = ?2, updated_at = ?3 WHERE site_id = ?1",
          rusqlite::params![id, plan, at],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(read_site(conn, &id)?)
      })
      .await?;

    raw_site.map(RawSite::into_record).transpose()
  }

  async fn delete_site(&self, site_id: &str) -> Result<bool> {
    let id = site_id.to_owned();
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM sites WHERE site_id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
    let entry = HistoryEntry {
      entry_id:    Uuid::new_v4(),
      site_id:     entry.site_id,
      event:       entry.event,
      payload:     entry.payload,
      recorded_at: now(),
    };

    let id_str      = entry.entry_id.hyphenated().to_string();
    let site_id     = entry.site_id.clone();
    let event_str   = entry.event.to_string();
    let payload_str = encode_json(&entry.payload);
    let at_str      = encode_dt(entry.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO site_history (entry_id, site_id, event, payload, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, site_id, event_str, payload_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn history(&self, site_id: &str) -> Result<Vec<HistoryEntry>> {
    let id = site_id.to_owned();

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entry_id, site_id, event, payload, recorded_at
           FROM site_history
           WHERE site_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawHistoryEntry {
              entry_id:    row.get(0)?,
              site_id:     row.get(1)?,
              event:       row.get(2)?,
              payload:     row.get(3)?,
              recorded_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }

  // ── Leases ────────────────────────────────────────────────────────────────

  async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
    let name       = name.to_owned();
    let holder     = holder.to_owned();
    let at         = now();
    let now_str    = encode_dt(at);
    let expires    = encode_dt(at + ttl);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(name) DO UPDATE SET
             holder     = excluded.holder,
             expires_at = excluded.expires_at
           WHERE leases.expires_at <= ?4 OR leases.holder = excluded.holder",
          rusqlite::params![name, holder, expires, now_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
    let name   = name.to_owned();
    let holder = holder.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM leases WHERE name = ?1 AND holder = ?2",
          rusqlite::params![name, holder],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
