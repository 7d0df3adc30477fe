// src/services/forms.rs

use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use regex::Regex;

use crate::{
    db::FormBackend,
    error::AppError,
    models::form::{FieldValue, FormFields, FormSlot, Identity, SaveSummary},
    utils::html::strip_tags,
};

static GUEST_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{12,64}$").expect("valid regex"));
static TRAILING_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[:*]\s*$").expect("valid regex"));
static ANGLE_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<|>$").expect("valid regex"));

/// Whether a client-supplied session token can be used as a guest identity.
pub fn is_valid_guest_token(token: &str) -> bool {
    GUEST_TOKEN.is_match(token)
}

/// A fresh guest session token (32 alphanumeric characters).
pub fn new_guest_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Canonical form of a field label: plain text, trimmed, without the
/// surrounding angle brackets or a trailing `:`/`*` marker.
pub fn norm_key(raw: &str) -> String {
    let key = strip_tags(raw);
    let key = TRAILING_MARK.replace(key.trim(), "");
    let key = ANGLE_BRACKETS.replace_all(key.trim(), "");
    TRAILING_MARK.replace(key.trim(), "").trim().to_string()
}

/// Plain single-line text: tags stripped, whitespace runs collapsed.
fn sanitize_text(raw: &str) -> String {
    strip_tags(raw).split_whitespace().collect::<Vec<_>>().join(" ")
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(sanitize_text(s)),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(true) => Some("1".to_string()),
        serde_json::Value::Bool(false) | serde_json::Value::Null => Some(String::new()),
        _ => None,
    }
}

fn sanitize_value(value: &serde_json::Value) -> FieldValue {
    let items: Vec<&serde_json::Value> = match value {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Object(map) => map.values().collect(),
        scalar => return FieldValue::Text(scalar_text(scalar).unwrap_or_default()),
    };
    FieldValue::List(
        items
            .into_iter()
            .filter_map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Normalizes submitted labels and sanitizes their values. Labels that
/// normalize to nothing are dropped; later duplicates win.
pub fn normalize_fields(fields: &serde_json::Map<String, serde_json::Value>) -> FormFields {
    let mut out = FormFields::new();
    for (label, value) in fields {
        let key = norm_key(label);
        if key.is_empty() {
            continue;
        }
        out.insert(key, sanitize_value(value));
    }
    out
}

/// Captured form fields per identity, with a per-page and a cross-page view.
#[derive(Clone)]
pub struct FormStore {
    backend: Arc<dyn FormBackend>,
    guest_latest_ttl: Duration,
}

impl FormStore {
    pub fn new(backend: Arc<dyn FormBackend>, guest_latest_ttl: Duration) -> Self {
        Self {
            backend,
            guest_latest_ttl,
        }
    }

    /// Merges a capture event into both views, last write wins per field.
    ///
    /// Guest per-page records are kept indefinitely; only the guest latest
    /// view expires.
    pub async fn save(
        &self,
        identity: &Identity,
        page_id: i64,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<SaveSummary, AppError> {
        let incoming = normalize_fields(fields);

        let page_slot = FormSlot::Page {
            identity: identity.clone(),
            page_id,
        };
        let page = self.merge_into(&page_slot, incoming.clone(), None).await?;

        let latest_ttl = match identity {
            Identity::User(_) => None,
            Identity::Guest(_) => Some(self.guest_latest_ttl),
        };
        let latest_slot = FormSlot::Latest {
            identity: identity.clone(),
        };
        let latest = self.merge_into(&latest_slot, incoming, latest_ttl).await?;

        let summary = match identity {
            Identity::User(_) => SaveSummary {
                mode: "user",
                page_id,
                count: page.len(),
            },
            Identity::Guest(_) => SaveSummary {
                mode: "guest",
                page_id,
                count: latest.len(),
            },
        };
        tracing::debug!(mode = summary.mode, page_id, count = summary.count, "form fields saved");
        Ok(summary)
    }

    async fn merge_into(
        &self,
        slot: &FormSlot,
        incoming: FormFields,
        ttl: Option<Duration>,
    ) -> Result<FormFields, AppError> {
        let mut merged = self.backend.load_fields(slot).await?.unwrap_or_default();
        merged.merge(incoming);
        self.backend.store_fields(slot, &merged, ttl).await?;
        Ok(merged)
    }

    pub async fn read_page(
        &self,
        identity: &Identity,
        page_id: i64,
    ) -> Result<FormFields, AppError> {
        let slot = FormSlot::Page {
            identity: identity.clone(),
            page_id,
        };
        Ok(self.backend.load_fields(&slot).await?.unwrap_or_default())
    }

    pub async fn read_latest(&self, identity: &Identity) -> Result<FormFields, AppError> {
        let slot = FormSlot::Latest {
            identity: identity.clone(),
        };
        Ok(self.backend.load_fields(&slot).await?.unwrap_or_default())
    }
}

/// Display value of a field, looked up by its normalized label.
pub fn field_display(fields: &FormFields, label: &str) -> Option<String> {
    let key = norm_key(label);
    if key.is_empty() {
        return None;
    }
    fields
        .get(&key)
        .map(FieldValue::display)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::memory::MemoryStore;

    fn map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn store() -> FormStore {
        FormStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600))
    }

    #[test]
    fn keys_normalize_to_the_same_label() {
        assert_eq!(norm_key("Email:"), "Email");
        assert_eq!(norm_key("Email"), "Email");
        assert_eq!(norm_key(" Email * "), "Email");
        assert_eq!(norm_key("&lt;Email&gt;:"), "Email");
        assert_eq!(norm_key("<b>Name</b>:"), "Name");
        assert_eq!(norm_key(" : "), "");
    }

    #[test]
    fn values_are_sanitized() {
        let fields = normalize_fields(&map(json!({
            "Bio": "  <i>likes</i>\n  tea  ",
            "Colors": ["red", " ", "<b></b>", "blue"],
            "Age": 42,
            "": "dropped",
        })));
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("Bio"), Some(&FieldValue::Text("likes tea".into())));
        assert_eq!(
            fields.get("Colors"),
            Some(&FieldValue::List(vec!["red".into(), "blue".into()]))
        );
        assert_eq!(fields.get("Age"), Some(&FieldValue::Text("42".into())));
    }

    #[test]
    fn guest_tokens() {
        assert!(is_valid_guest_token(&new_guest_token()));
        assert!(is_valid_guest_token("abcDEF123456"));
        assert!(!is_valid_guest_token("short"));
        assert!(!is_valid_guest_token("has-dash-in-it-12"));
    }

    #[tokio::test]
    async fn last_write_wins_per_key() {
        let forms = store();
        let user = Identity::User(5);

        forms.save(&user, 1, &map(json!({"Name": "A"}))).await.unwrap();
        forms.save(&user, 1, &map(json!({"Name": "B"}))).await.unwrap();
        let page = forms.read_page(&user, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.get("Name"), Some(&FieldValue::Text("B".into())));

        let summary = forms.save(&user, 1, &map(json!({"Email:": "x@y"}))).await.unwrap();
        assert_eq!(summary.mode, "user");
        assert_eq!(summary.count, 2);
        let page = forms.read_page(&user, 1).await.unwrap();
        assert_eq!(field_display(&page, "Email"), Some("x@y".into()));
        assert_eq!(field_display(&page, "Name"), Some("B".into()));
    }

    #[tokio::test]
    async fn latest_view_spans_pages() {
        let forms = store();
        let guest = Identity::Guest("abcdefghijkl".into());

        forms.save(&guest, 1, &map(json!({"Name": "A"}))).await.unwrap();
        let summary = forms.save(&guest, 2, &map(json!({"City": "Oslo"}))).await.unwrap();
        assert_eq!(summary.mode, "guest");
        assert_eq!(summary.count, 2);

        assert_eq!(forms.read_page(&guest, 2).await.unwrap().len(), 1);
        assert_eq!(forms.read_latest(&guest).await.unwrap().len(), 2);
        assert!(forms.read_latest(&Identity::User(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn guest_latest_view_expires() {
        let forms = FormStore::new(Arc::new(MemoryStore::new()), Duration::ZERO);
        let guest = Identity::Guest("abcdefghijkl".into());

        forms.save(&guest, 1, &map(json!({"Name": "A"}))).await.unwrap();
        assert!(forms.read_latest(&guest).await.unwrap().is_empty());
        assert_eq!(forms.read_page(&guest, 1).await.unwrap().len(), 1);
    }
}
