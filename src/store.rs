//! Document-store access.
//!
//! The topic data lives in a hierarchical document store with three nested
//! collections:
//!
//! ```text
//! categories/{category}
//! └── subcategories/{subcategory}
//!     └── topics/{topic}        ← leaf documents
//! ```
//!
//! The pipeline only ever lists these collections, through the
//! [`DataSource`] capability. The store handle is passed in explicitly so the
//! flattener can run against a [`MemoryStore`] in tests and an [`FsStore`]
//! export tree in production.
//!
//! ## Export Layout
//!
//! [`FsStore`] reads a store export with one JSON file per topic document:
//!
//! ```text
//! export/
//! └── categories/
//!     ├── politics/
//!     │   └── subcategories/
//!     │       └── elections/
//!     │           └── topics/
//!     │               ├── a1B2c3.json
//!     │               └── x9Y8z7.json
//!     └── science/
//!         └── ...
//! ```
//!
//! Each level is enumerated in name order, matching the store's native id
//! ordering. A JSON object of exactly the shape
//! `{"_seconds": N, "_nanoseconds": M}` decodes to a [`Value::Timestamp`];
//! this is the only place that shape is recognized.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store root not found: {0}")]
    MissingRoot(PathBuf),
    #[error("Failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode document {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Document {0} is not a JSON object")]
    NotAnObject(PathBuf),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A store-native instant: seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Convert to a UTC instant. `None` when out of chrono's range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

/// Render an instant the way browsers' `Date.toISOString` does.
pub fn iso8601(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A field value as held by the document store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Integer(n)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => match exported_timestamp(&map) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
            },
        }
    }
}

fn exported_timestamp(map: &serde_json::Map<String, serde_json::Value>) -> Option<Timestamp> {
    if map.len() != 2 {
        return None;
    }
    let seconds = map.get("_seconds")?.as_i64()?;
    let nanos = map.get("_nanoseconds")?.as_u64()?;
    Some(Timestamp {
        seconds,
        nanos: u32::try_from(nanos).ok()?,
    })
}

impl Serialize for Value {
    /// Store values serialize to plain JSON. Timestamps become ISO-8601
    /// strings; non-finite doubles have no JSON form and fail.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Double(d) if d.is_finite() => serializer.serialize_f64(*d),
            Value::Double(d) => Err(S::Error::custom(format!(
                "non-finite number {d} cannot be represented in JSON"
            ))),
            Value::String(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => match ts.to_datetime() {
                Some(instant) => serializer.serialize_str(&iso8601(&instant)),
                None => Err(S::Error::custom(format!(
                    "timestamp {}s out of range",
                    ts.seconds
                ))),
            },
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

/// A leaf document: its store-assigned id and its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Read-only listing access to the three collection levels.
pub trait DataSource {
    /// Category ids, in store order.
    fn categories(&self) -> Result<Vec<String>, StoreError>;

    /// Subcategory ids under a category, in store order.
    fn subcategories(&self, category: &str) -> Result<Vec<String>, StoreError>;

    /// Topic documents under a subcategory, in store order.
    fn topics(&self, category: &str, subcategory: &str) -> Result<Vec<Document>, StoreError>;
}

// ============================================================================
// Filesystem export
// ============================================================================

/// A store export on disk. See the module docs for the layout.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn categories_dir(&self) -> PathBuf {
        self.root.join("categories")
    }

    fn subcategories_dir(&self, category: &str) -> PathBuf {
        self.categories_dir().join(category).join("subcategories")
    }

    fn topics_dir(&self, category: &str, subcategory: &str) -> PathBuf {
        self.subcategories_dir(category)
            .join(subcategory)
            .join("topics")
    }
}

impl DataSource for FsStore {
    fn categories(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::MissingRoot(self.root.clone()));
        }
        list_dirs(&self.categories_dir())
    }

    fn subcategories(&self, category: &str) -> Result<Vec<String>, StoreError> {
        list_dirs(&self.subcategories_dir(category))
    }

    fn topics(&self, category: &str, subcategory: &str) -> Result<Vec<Document>, StoreError> {
        let dir = self.topics_dir(category, subcategory);
        let mut files: Vec<PathBuf> = read_entries(&dir)?
            .into_iter()
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|e| e.eq_ignore_ascii_case("json"))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();

        files.iter().map(|path| read_document(path)).collect()
    }
}

/// Entries of a collection directory. A missing directory is an empty
/// collection.
fn read_entries(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StoreError::Io {
                path: dir.to_owned(),
                source: e,
            });
        }
    };
    entries
        .map(|entry| {
            entry.map(|e| e.path()).map_err(|e| StoreError::Io {
                path: dir.to_owned(),
                source: e,
            })
        })
        .collect()
}

fn list_dirs(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut names: Vec<String> = read_entries(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    names.sort();
    Ok(names)
}

fn read_document(path: &Path) -> Result<Document, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::Io {
        path: path.to_owned(),
        source: e,
    })?;
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| StoreError::Json {
        path: path.to_owned(),
        source: e,
    })?;
    let serde_json::Value::Object(map) = json else {
        return Err(StoreError::NotAnObject(path.to_owned()));
    };
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(Document {
        id,
        fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
    })
}

// ============================================================================
// In-memory store
// ============================================================================

/// An in-memory hierarchy. Categories and subcategories enumerate in id
/// order; topics in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tree: BTreeMap<String, BTreeMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic document under `category/subcategory`, creating both
    /// levels as needed.
    pub fn insert(&mut self, category: &str, subcategory: &str, document: Document) {
        self.tree
            .entry(category.to_string())
            .or_default()
            .entry(subcategory.to_string())
            .or_default()
            .push(document);
    }

    /// Add an empty subcategory.
    pub fn insert_subcategory(&mut self, category: &str, subcategory: &str) {
        self.tree
            .entry(category.to_string())
            .or_default()
            .entry(subcategory.to_string())
            .or_default();
    }
}

impl DataSource for MemoryStore {
    fn categories(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.tree.keys().cloned().collect())
    }

    fn subcategories(&self, category: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .tree
            .get(category)
            .map(|subs| subs.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn topics(&self, category: &str, subcategory: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .tree
            .get(category)
            .and_then(|subs| subs.get(subcategory))
            .cloned()
            .unwrap_or_default())
    }
}
