//! Provider response shapes as they arrive on the wire, and their conversion
//! into the normalised core types.
//!
//! Every field is optional and decoded leniently: deployments disagree on
//! whether ids are strings or numbers, whether `is_pool` is a bool, an int or
//! a string, and whether empty values are `null` or `""`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use siteforge_core::{
  provider::{CreatedSite, SiteDetails, TaskStatus, Template},
  site::SiteAccess,
  status::RawStatus,
};

// ─── Envelope ────────────────────────────────────────────────────────────────

/// Strip the `{ "data": ... }` envelope when present.
pub fn unwrap_envelope(body: Value) -> Value {
  match body {
    Value::Object(mut map) if map.contains_key("data") => {
      map.remove("data").unwrap_or(Value::Null)
    }
    other => other,
  }
}

/// Some deployments report failures as a 2xx body of
/// `{ "status": false, "message": "..." }`.
pub fn is_soft_failure(body: &Value) -> bool {
  body.get("status") == Some(&Value::Bool(false)) && body.get("data").is_none()
}

/// The provider's `message` (or `error`) field, if any.
pub fn error_message(body: &Value) -> Option<String> {
  ["message", "error"].into_iter().find_map(|key| match body.get(key)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
    Value::Object(inner) => inner
      .get("message")
      .and_then(Value::as_str)
      .map(str::to_owned),
    _ => None,
  })
}

// ─── Lenient field decoders ──────────────────────────────────────────────────

fn id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
  Ok(non_empty(Option::<Value>::deserialize(d)?.as_ref()))
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::Bool(b)) => Some(b),
    Some(Value::Number(n)) => n.as_i64().map(|n| n != 0),
    Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
      "true" | "1" => Some(true),
      "false" | "0" => Some(false),
      _ => None,
    },
    _ => None,
  })
}

fn status<'de, D: Deserializer<'de>>(
  d: D,
) -> Result<Option<RawStatus>, D::Error> {
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::Number(n)) => n.as_i64().map(RawStatus::Code),
    Some(Value::String(s)) => Some(RawStatus::Text(s)),
    _ => None,
  })
}

fn non_empty(value: Option<&Value>) -> Option<String> {
  match value? {
    Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
    _ => None,
  }
}

// ─── Creation ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreatedSiteWire {
  #[serde(default, deserialize_with = "id")]
  id:          Option<String>,
  #[serde(default, deserialize_with = "text")]
  wp_url:      Option<String>,
  #[serde(default, deserialize_with = "text")]
  wp_username: Option<String>,
  #[serde(default, deserialize_with = "text")]
  wp_password: Option<String>,
  #[serde(default, deserialize_with = "text")]
  s_hash:      Option<String>,
  #[serde(default, deserialize_with = "id")]
  task_id:     Option<String>,
  #[serde(default, deserialize_with = "status")]
  status:      Option<RawStatus>,
  #[serde(default, deserialize_with = "flag")]
  is_pool:     Option<bool>,
}

impl CreatedSiteWire {
  pub fn into_created(self, raw: Value) -> CreatedSite {
    CreatedSite {
      id: self.id,
      access: SiteAccess {
        site_url:       self.wp_url,
        admin_username: self.wp_username,
        admin_password: self.wp_password,
        admin_url:      None,
        session_hash:   self.s_hash,
      },
      task_id: self.task_id,
      status: self.status,
      is_pool: self.is_pool,
      raw,
    }
  }
}

// ─── Task status ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TaskStatusWire {
  #[serde(default, deserialize_with = "status")]
  status:      Option<RawStatus>,
  #[serde(default, deserialize_with = "id")]
  resource_id: Option<String>,
  #[serde(default, deserialize_with = "text")]
  message:     Option<String>,
}

impl TaskStatusWire {
  pub fn into_status(self, raw: Value) -> TaskStatus {
    TaskStatus {
      status: self.status,
      resource_id: self.resource_id,
      message: self.message,
      raw,
    }
  }
}

// ─── Site details ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SiteDetailsWire {
  #[serde(default, alias = "wp_url", deserialize_with = "text")]
  url:          Option<String>,
  /// An object normally; older deployments send `[]` when empty.
  #[serde(default)]
  site_meta:    Option<Value>,
  #[serde(default, deserialize_with = "text")]
  s_hash:       Option<String>,
  #[serde(default, deserialize_with = "text")]
  wp_admin_url: Option<String>,
}

impl SiteDetailsWire {
  pub fn into_details(self, raw: Value) -> SiteDetails {
    let meta = self.site_meta.as_ref().filter(|m| m.is_object());
    let field = |key: &str| non_empty(meta.and_then(|m| m.get(key)));
    SiteDetails {
      access: SiteAccess {
        site_url:       self.url,
        admin_username: field("wp_username"),
        admin_password: field("wp_password"),
        admin_url:      self.wp_admin_url,
        session_hash:   self.s_hash,
      },
      raw,
    }
  }
}

// ─── Templates ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TemplateWire {
  #[serde(default, alias = "template_slug", deserialize_with = "id")]
  slug: Option<String>,
  #[serde(default, deserialize_with = "text")]
  name: Option<String>,
}

impl TemplateWire {
  /// Entries without a slug cannot be used to create anything and are
  /// dropped.
  pub fn into_template(self) -> Option<Template> {
    let slug = self.slug?;
    Some(Template { name: self.name.unwrap_or_else(|| slug.clone()), slug })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn envelope_is_optional() {
    assert_eq!(unwrap_envelope(json!({"data": {"id": 1}})), json!({"id": 1}));
    assert_eq!(unwrap_envelope(json!({"id": 1})), json!({"id": 1}));
  }

  #[test]
  fn ids_accept_strings_and_numbers() {
    let a: CreatedSiteWire =
      serde_json::from_value(json!({"id": 42, "task_id": "t-1"})).unwrap();
    let b: CreatedSiteWire =
      serde_json::from_value(json!({"id": "42", "task_id": 7})).unwrap();
    assert_eq!(a.id.as_deref(), Some("42"));
    assert_eq!(a.task_id.as_deref(), Some("t-1"));
    assert_eq!(b.id.as_deref(), Some("42"));
    assert_eq!(b.task_id.as_deref(), Some("7"));
  }

  #[test]
  fn is_pool_shapes() {
    for (value, expected) in [
      (json!(true), Some(true)),
      (json!(0), Some(false)),
      (json!(1), Some(true)),
      (json!("false"), Some(false)),
      (json!("TRUE"), Some(true)),
      (json!(null), None),
      (json!("maybe"), None),
    ] {
      let wire: CreatedSiteWire =
        serde_json::from_value(json!({ "is_pool": value })).unwrap();
      assert_eq!(wire.is_pool, expected, "{value}");
    }
  }

  #[test]
  fn empty_strings_are_absent() {
    let wire: CreatedSiteWire =
      serde_json::from_value(json!({"wp_url": "", "task_id": ""})).unwrap();
    let created = wire.into_created(Value::Null);
    assert!(created.access.site_url.is_none());
    assert!(created.task_id.is_none());
  }

  #[test]
  fn details_tolerate_empty_meta_array() {
    let wire: SiteDetailsWire = serde_json::from_value(
      json!({"url": "https://a.example", "site_meta": []}),
    )
    .unwrap();
    let details = wire.into_details(Value::Null);
    assert_eq!(details.access.site_url.as_deref(), Some("https://a.example"));
    assert!(details.access.admin_username.is_none());
  }

  #[test]
  fn error_message_prefers_message_then_error() {
    assert_eq!(
      error_message(&json!({"message": "nope", "error": "x"})).as_deref(),
      Some("nope")
    );
    assert_eq!(
      error_message(&json!({"error": {"message": "deep"}})).as_deref(),
      Some("deep")
    );
    assert_eq!(error_message(&json!({"code": 3})), None);
  }

  #[test]
  fn templates_without_slug_are_dropped() {
    let t: TemplateWire = serde_json::from_value(json!({"name": "x"})).unwrap();
    assert!(t.into_template().is_none());
    let t: TemplateWire =
      serde_json::from_value(json!({"slug": "shop"})).unwrap();
    assert_eq!(t.into_template().unwrap().name, "shop");
  }
}
