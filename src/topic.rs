//! The typed topic record.
//!
//! Raw store documents are loosely shaped: any field may be missing and a
//! field may hold an unexpected type. [`Topic::from_document`] types the
//! fields the site actually reads and keeps everything else verbatim, so the
//! JSON payload embedded in each topic page is still the full record.
//!
//! ## Field Typing
//!
//! | Stored field | Typed as | When it does not fit |
//! |--------------|----------|----------------------|
//! | `title`, `description` | `Option<String>` | kept raw in `extra` |
//! | `media` | `Vec<MediaItem>` (array of maps) | kept raw in `extra` |
//! | `perspectives` | `BTreeMap<String, Perspective>` (map of maps) | kept raw in `extra` |
//! | `likes` | `Option<i64>` | kept raw in `extra` |
//! | `timestamp`, `pollClosesAt` | `Option<DateTime<Utc>>` | kept raw in `extra` |
//!
//! Temporal fields are resolved once, here, through [`Temporal`]: either a
//! store timestamp or an ISO-8601 string. Nothing downstream sees the store's
//! native timestamp representation.
//!
//! The document id and the traversal's category/subcategory are
//! authoritative; stored fields with those names are dropped.

use crate::store::{Document, Timestamp, Value, iso8601};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

const RESERVED: &[&str] = &["id", "category", "subcategory"];

/// One entry of a topic's `media` array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaItem {
    /// The `type` tag, e.g. `"image"`.
    pub kind: Option<String>,
    pub url: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl MediaItem {
    pub fn image(url: &str) -> Self {
        Self {
            kind: Some("image".to_string()),
            url: Some(url.to_string()),
            extra: BTreeMap::new(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind.as_deref() == Some("image")
    }

    fn from_fields(mut fields: BTreeMap<String, Value>) -> Self {
        Self {
            kind: take(&mut fields, "type", |v| v.as_str().map(str::to_string)),
            url: take(&mut fields, "url", |v| v.as_str().map(str::to_string)),
            extra: fields,
        }
    }
}

/// A named viewpoint on a topic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Perspective {
    pub votes: Option<i64>,
    pub extra: BTreeMap<String, Value>,
}

impl Perspective {
    pub fn with_votes(votes: i64) -> Self {
        Self {
            votes: Some(votes),
            extra: BTreeMap::new(),
        }
    }

    fn from_fields(mut fields: BTreeMap<String, Value>) -> Self {
        Self {
            votes: take(&mut fields, "votes", Value::as_i64),
            extra: fields,
        }
    }
}

/// A temporal field as it may appear in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Temporal {
    RawTimestamp(Timestamp),
    IsoString(String),
}

impl Temporal {
    pub fn from_value(value: &Value) -> Option<Temporal> {
        match value {
            Value::Timestamp(ts) => Some(Temporal::RawTimestamp(*ts)),
            Value::String(s) => Some(Temporal::IsoString(s.clone())),
            _ => None,
        }
    }

    /// Normalize to a UTC instant. `None` for unparseable strings or
    /// out-of-range timestamps.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Temporal::RawTimestamp(ts) => ts.to_datetime(),
            Temporal::IsoString(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|instant| instant.with_timezone(&Utc)),
        }
    }
}

/// A topic, flattened out of the hierarchy and tagged with its origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topic {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub media: Option<Vec<MediaItem>>,
    pub perspectives: Option<BTreeMap<String, Perspective>>,
    pub likes: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub poll_closes_at: Option<DateTime<Utc>>,
    /// Stored fields not typed above, verbatim.
    pub extra: BTreeMap<String, Value>,
    pub category: String,
    pub subcategory: String,
}

impl Topic {
    /// Type a raw document found under `category/subcategory`.
    pub fn from_document(document: Document, category: &str, subcategory: &str) -> Topic {
        let Document { id, mut fields } = document;
        for key in RESERVED {
            if fields.remove(*key).is_some() {
                tracing::debug!(topic = %id, field = *key, "Dropping stored field shadowed by traversal value");
            }
        }

        Topic {
            title: take(&mut fields, "title", |v| v.as_str().map(str::to_string)),
            description: take(&mut fields, "description", |v| v.as_str().map(str::to_string)),
            media: take(&mut fields, "media", media_from_value),
            perspectives: take(&mut fields, "perspectives", perspectives_from_value),
            likes: take(&mut fields, "likes", Value::as_i64),
            created_at: take(&mut fields, "timestamp", resolve_temporal),
            poll_closes_at: take(&mut fields, "pollClosesAt", resolve_temporal),
            extra: fields,
            id,
            category: category.to_string(),
            subcategory: subcategory.to_string(),
        }
    }

    /// Like count, `0` when absent.
    pub fn likes(&self) -> i64 {
        self.likes.unwrap_or(0)
    }

    /// Sum of votes across all perspectives, saturating at the `i64`
    /// bounds. `0` without perspectives.
    pub fn total_votes(&self) -> i64 {
        self.perspectives
            .iter()
            .flat_map(|p| p.values())
            .map(|p| p.votes.unwrap_or(0))
            .fold(0i64, i64::saturating_add)
    }

    /// URL of the first image-type media item.
    pub fn preview_image(&self) -> Option<&str> {
        self.media
            .iter()
            .flatten()
            .find(|item| item.is_image())
            .and_then(|item| item.url.as_deref())
    }

    /// Sort key for recency: creation instant, missing sorts as the epoch.
    pub fn recency(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Remove `key` from `fields` if `extract` can type it; otherwise leave the
/// raw value in place.
fn take<T>(
    fields: &mut BTreeMap<String, Value>,
    key: &str,
    extract: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let typed = extract(fields.get(key)?)?;
    fields.remove(key);
    Some(typed)
}

fn resolve_temporal(value: &Value) -> Option<DateTime<Utc>> {
    Temporal::from_value(value)?.resolve()
}

fn media_from_value(value: &Value) -> Option<Vec<MediaItem>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_map().cloned().map(MediaItem::from_fields))
        .collect()
}

fn perspectives_from_value(value: &Value) -> Option<BTreeMap<String, Perspective>> {
    value
        .as_map()?
        .iter()
        .map(|(name, p)| {
            p.as_map()
                .cloned()
                .map(|fields| (name.clone(), Perspective::from_fields(fields)))
        })
        .collect()
}

// ============================================================================
// Payload serialization
// ============================================================================

struct Iso<'a>(&'a DateTime<Utc>);

impl Serialize for Iso<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&iso8601(self.0))
    }
}

impl Serialize for MediaItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(kind) = &self.kind {
            map.serialize_entry("type", kind)?;
        }
        if let Some(url) = &self.url {
            map.serialize_entry("url", url)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for Perspective {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(votes) = self.votes {
            map.serialize_entry("votes", &votes)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for Topic {
    /// The page payload. Key order is fixed: `id`, typed fields, extra fields
    /// by key, then `category` and `subcategory`. Absent fields are omitted.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        if let Some(title) = &self.title {
            map.serialize_entry("title", title)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(media) = &self.media {
            map.serialize_entry("media", media)?;
        }
        if let Some(perspectives) = &self.perspectives {
            map.serialize_entry("perspectives", perspectives)?;
        }
        if let Some(likes) = self.likes {
            map.serialize_entry("likes", &likes)?;
        }
        if let Some(created_at) = &self.created_at {
            map.serialize_entry("timestamp", &Iso(created_at))?;
        }
        if let Some(poll_closes_at) = &self.poll_closes_at {
            map.serialize_entry("pollClosesAt", &Iso(poll_closes_at))?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("category", &self.category)?;
        map.serialize_entry("subcategory", &self.subcategory)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn typed_fields_are_extracted() {
        let doc = Document::new("t1")
            .with("title", "Four-day week?")
            .with("description", "Should we?")
            .with("likes", Value::Integer(7))
            .with(
                "media",
                Value::Array(vec![map(&[
                    ("type", Value::from("image")),
                    ("url", Value::from("https://img/1.png")),
                ])]),
            );
        let topic = Topic::from_document(doc, "work", "policy");

        assert_eq!(topic.id, "t1");
        assert_eq!(topic.title.as_deref(), Some("Four-day week?"));
        assert_eq!(topic.description.as_deref(), Some("Should we?"));
        assert_eq!(topic.likes(), 7);
        assert_eq!(topic.preview_image(), Some("https://img/1.png"));
        assert_eq!(topic.category, "work");
        assert_eq!(topic.subcategory, "policy");
        assert!(topic.extra.is_empty());
    }

    #[test]
    fn wrong_typed_fields_stay_raw() {
        let doc = Document::new("t1")
            .with("title", Value::Integer(123))
            .with("likes", "many");
        let topic = Topic::from_document(doc, "c", "s");

        assert_eq!(topic.title, None);
        assert_eq!(topic.likes(), 0);
        assert_eq!(topic.extra["title"], Value::Integer(123));
        assert_eq!(topic.extra["likes"], Value::from("many"));
    }

    #[test]
    fn total_votes_sums_perspectives() {
        let doc = Document::new("t").with(
            "perspectives",
            map(&[
                ("A", map(&[("votes", Value::Integer(3))])),
                ("B", map(&[("votes", Value::Integer(5))])),
            ]),
        );
        assert_eq!(Topic::from_document(doc, "c", "s").total_votes(), 8);
    }

    #[test]
    fn total_votes_saturates_instead_of_overflowing() {
        let mut topic = Topic::default();
        topic.perspectives = Some(BTreeMap::from([
            ("A".to_string(), Perspective::with_votes(i64::MAX)),
            ("B".to_string(), Perspective::with_votes(1)),
        ]));
        assert_eq!(topic.total_votes(), i64::MAX);

        topic.perspectives = Some(BTreeMap::from([
            ("A".to_string(), Perspective::with_votes(i64::MIN)),
            ("B".to_string(), Perspective::with_votes(-1)),
        ]));
        assert_eq!(topic.total_votes(), i64::MIN);
    }

    #[test]
    fn total_votes_without_perspectives_is_zero() {
        let topic = Topic::from_document(Document::new("t"), "c", "s");
        assert_eq!(topic.total_votes(), 0);
    }

    #[test]
    fn perspective_without_votes_counts_zero() {
        let doc = Document::new("t").with(
            "perspectives",
            map(&[
                ("A", map(&[("label", Value::from("yes"))])),
                ("B", map(&[("votes", Value::Integer(2))])),
            ]),
        );
        assert_eq!(Topic::from_document(doc, "c", "s").total_votes(), 2);
    }

    #[test]
    fn preview_image_skips_non_images() {
        let topic = Topic {
            media: Some(vec![
                MediaItem {
                    kind: Some("video".into()),
                    url: Some("https://v/1.mp4".into()),
                    extra: BTreeMap::new(),
                },
                MediaItem::image("https://img/2.png"),
            ]),
            ..Topic::default()
        };
        assert_eq!(topic.preview_image(), Some("https://img/2.png"));
    }

    #[test]
    fn temporal_fields_resolve_from_both_shapes() {
        let doc = Document::new("t")
            .with(
                "timestamp",
                Value::Timestamp(Timestamp {
                    seconds: 1_714_564_800,
                    nanos: 0,
                }),
            )
            .with("pollClosesAt", "2024-06-01T00:00:00+02:00");
        let topic = Topic::from_document(doc, "c", "s");

        assert_eq!(
            topic.created_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            topic.poll_closes_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 31, 22, 0, 0).unwrap())
        );
    }

    #[test]
    fn unparseable_temporal_string_stays_raw() {
        let doc = Document::new("t").with("timestamp", "last tuesday");
        let topic = Topic::from_document(doc, "c", "s");
        assert_eq!(topic.created_at, None);
        assert_eq!(topic.extra["timestamp"], Value::from("last tuesday"));
        assert_eq!(topic.recency(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn reserved_fields_are_dropped() {
        let doc = Document::new("real")
            .with("id", "fake")
            .with("category", "fake-cat");
        let topic = Topic::from_document(doc, "cat", "sub");
        assert_eq!(topic.id, "real");
        assert_eq!(topic.category, "cat");
        assert!(topic.extra.is_empty());
    }

    #[test]
    fn payload_key_order_and_iso_instants() {
        let doc = Document::new("t1")
            .with("title", "Hello")
            .with("zeta", Value::Bool(true))
            .with("alpha", Value::Integer(1))
            .with(
                "timestamp",
                Value::Timestamp(Timestamp {
                    seconds: 1_714_564_800,
                    nanos: 0,
                }),
            );
        let topic = Topic::from_document(doc, "c", "s");
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(
            json,
            r#"{"id":"t1","title":"Hello","timestamp":"2024-05-01T12:00:00.000Z","alpha":1,"zeta":true,"category":"c","subcategory":"s"}"#
        );
    }

    #[test]
    fn payload_with_non_finite_extra_fails() {
        let doc = Document::new("t1").with("score", Value::Double(f64::INFINITY));
        let topic = Topic::from_document(doc, "c", "s");
        assert!(serde_json::to_string(&topic).is_err());
    }
}
