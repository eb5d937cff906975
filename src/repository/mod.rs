// 🗄️ Record Repository - contract of the headless content store
//
// The store holds typed records addressed by numeric id, filterable, with no
// transactions across records. Single-record writes are atomic; nothing else is.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::BffResult;

pub use http::HttpRepository;
pub use memory::{FailureRule, MemoryRepository, RepoCall, RepoOp};

// ============================================================================
// IDENTIFIERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        RecordId(value)
    }
}

impl RecordId {
    /// Accepts a bare number, a numeric string, or a `{ "id": .. }` object
    pub fn from_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::Number(n) => n.as_u64().map(RecordId),
            Value::String(s) => s.trim().parse::<u64>().ok().map(RecordId),
            Value::Object(obj) => obj.get("id").and_then(RecordId::from_value),
            _ => None,
        }
    }
}

// ============================================================================
// COLLECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Items,
    Users,
    Comments,
    TagVotes,
    Manufacturers,
    Characters,
    Series,
    Categories,
    Tags,
}

impl Collection {
    /// REST path segment used by the remote store
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Items => "items",
            Collection::Users => "users",
            Collection::Comments => "comments",
            Collection::TagVotes => "user-tag-votes",
            Collection::Manufacturers => "manufacturers",
            Collection::Characters => "characters",
            Collection::Series => "serieses",
            Collection::Categories => "categories",
            Collection::Tags => "itags",
        }
    }

    /// The user collection is served bare, without the `{ data: .. }` envelope
    pub fn is_enveloped(&self) -> bool {
        !matches!(self, Collection::Users)
    }

    /// Relation field naming the owning user, for kinds that define ownership
    pub fn owner_field(&self) -> Option<&'static str> {
        match self {
            Collection::Items | Collection::Comments | Collection::TagVotes => Some("user"),
            _ => None,
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One stored record: numeric id plus its attribute map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId, fields: Map<String, Value>) -> Self {
        Record { id, fields }
    }

    /// Decode a record from the store's JSON, unwrapping a v4 `attributes` block
    pub fn from_json(value: Value) -> Option<Record> {
        let Value::Object(mut obj) = value else {
            return None;
        };
        let id = obj.remove("id").as_ref().and_then(RecordId::from_value)?;

        if let Some(Value::Object(attributes)) = obj.remove("attributes") {
            obj.extend(attributes);
        }

        Some(Record { id, fields: obj })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn i64_field(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s == "true"),
            _ => None,
        })
    }

    /// Single relation: bare id, `{id}`, or `{ data: {id} }`
    pub fn relation_id(&self, field: &str) -> Option<RecordId> {
        let value = self.get(field)?;
        match value {
            Value::Object(obj) if obj.contains_key("data") => {
                obj.get("data").and_then(RecordId::from_value)
            }
            other => RecordId::from_value(other),
        }
    }

    /// To-many relation: array of ids/objects, or a `{ data: [..] }` envelope
    pub fn relation_ids(&self, field: &str) -> Vec<RecordId> {
        let items = match self.get(field) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Object(obj)) => match obj.get("data") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        items.iter().filter_map(RecordId::from_value).collect()
    }

    /// Populated relation objects, unwrapped into records
    pub fn relation_records(&self, field: &str) -> Vec<Record> {
        let items = match self.get(field) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(obj)) => match obj.get("data") {
                Some(Value::Array(items)) => items.clone(),
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        items.into_iter().filter_map(Record::from_json).collect()
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Closed filter language; anything the store understands is built from these
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// `name` equals the value, compared case-insensitively
    NameEqualsIgnoreCase(String),
    /// Relation `field` points at `id`
    RelationIs { field: &'static str, id: RecordId },
    And(Vec<Filter>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<(&'static str, SortOrder)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Query {
            filter,
            sort: Vec::new(),
            limit: None,
        }
    }

    pub fn all() -> Self {
        Query::new(Filter::All)
    }

    pub fn sort_by(mut self, field: &'static str, order: SortOrder) -> Self {
        self.sort.push((field, order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ============================================================================
// REPOSITORY CONTRACT
// ============================================================================

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn find(&self, collection: Collection, query: &Query) -> BffResult<Vec<Record>>;

    /// `Ok(None)` when the record does not exist
    async fn get(&self, collection: Collection, id: RecordId) -> BffResult<Option<Record>>;

    async fn create(&self, collection: Collection, fields: Map<String, Value>) -> BffResult<Record>;

    async fn update(
        &self,
        collection: Collection,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> BffResult<Record>;

    async fn delete(&self, collection: Collection, id: RecordId) -> BffResult<()>;
}

// ============================================================================
// TESTS
// ============================================================================
