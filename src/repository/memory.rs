// 🧪 In-memory Record Repository
//
// Same contract as the remote store: per-record atomic writes, no cross-record
// transactions, case-insensitive name filters. Records every call and can be
// told to fail specific operations, which is what the orchestration tests use.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Collection, Filter, Query, Record, RecordId, RecordRepository, SortOrder};
use crate::error::{BffError, BffResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoOp {
    Find,
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for RepoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepoOp::Find => "find",
            RepoOp::Get => "get",
            RepoOp::Create => "create",
            RepoOp::Update => "update",
            RepoOp::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

impl RepoOp {
    pub fn is_mutation(&self) -> bool {
        matches!(self, RepoOp::Create | RepoOp::Update | RepoOp::Delete)
    }
}

/// One observed repository call, in issue order
#[derive(Debug, Clone, PartialEq)]
pub struct RepoCall {
    pub op: RepoOp,
    pub collection: Collection,
    pub id: Option<RecordId>,
}

/// Makes matching calls fail with an upstream 503
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRule {
    pub op: RepoOp,
    pub collection: Collection,
    /// Only calls touching this name (create payload or name filter)
    pub name: Option<String>,
}

impl FailureRule {
    pub fn on(op: RepoOp, collection: Collection) -> Self {
        FailureRule {
            op,
            collection,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn matches(&self, op: RepoOp, collection: Collection, name: Option<&str>) -> bool {
        if self.op != op || self.collection != collection {
            return false;
        }
        match (&self.name, name) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual.trim()),
            (Some(_), None) => false,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<Collection, BTreeMap<RecordId, Map<String, Value>>>,
    next_id: u64,
    calls: Vec<RepoCall>,
    failures: Vec<FailureRule>,
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BffResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| BffError::upstream("memory repository", None, "state lock poisoned"))
    }

    /// Insert a record directly, bypassing call recording
    pub fn seed(&self, collection: Collection, fields: Value) -> RecordId {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.next_id += 1;
        let id = RecordId(state.next_id);
        state.tables.entry(collection).or_default().insert(id, fields);
        id
    }

    pub fn inject_failure(&self, rule: FailureRule) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.push(rule);
        }
    }

    pub fn calls(&self) -> Vec<RepoCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    /// Snapshot of every record in a collection, ordered by id
    pub fn records(&self, collection: Collection) -> Vec<Record> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .tables
            .get(&collection)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, fields)| Record::new(*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.records(collection).len()
    }

    fn enter(
        state: &mut MemoryState,
        op: RepoOp,
        collection: Collection,
        id: Option<RecordId>,
        name: Option<&str>,
    ) -> BffResult<()> {
        state.calls.push(RepoCall { op, collection, id });

        if state
            .failures
            .iter()
            .any(|rule| rule.matches(op, collection, name))
        {
            return Err(BffError::upstream(
                format!("{} {}", op, collection.path()),
                Some(503),
                "injected failure",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// FILTER + SORT EVALUATION
// ============================================================================

fn filter_matches(filter: &Filter, record: &Record) -> bool {
    match filter {
        Filter::All => true,
        Filter::NameEqualsIgnoreCase(name) => record
            .str_field("name")
            .map(|candidate| candidate.trim().to_lowercase() == name.trim().to_lowercase())
            .unwrap_or(false),
        Filter::RelationIs { field, id } => record.relation_id(field) == Some(*id),
        Filter::And(parts) => parts.iter().all(|part| filter_matches(part, record)),
    }
}

fn filter_name(filter: &Filter) -> Option<&str> {
    match filter {
        Filter::NameEqualsIgnoreCase(name) => Some(name.as_str()),
        Filter::And(parts) => parts.iter().find_map(filter_name),
        _ => None,
    }
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => {
            let x = a.i64_field(field).unwrap_or(0);
            let y = b.i64_field(field).unwrap_or(0);
            x.cmp(&y)
        }
    }
}

// ============================================================================
// REPOSITORY IMPLEMENTATION
// ============================================================================

#[async_trait]
impl RecordRepository for MemoryRepository {
    async fn find(&self, collection: Collection, query: &Query) -> BffResult<Vec<Record>> {
        let mut state = self.lock()?;
        Self::enter(
            &mut state,
            RepoOp::Find,
            collection,
            None,
            filter_name(&query.filter),
        )?;

        let mut found: Vec<Record> = state
            .tables
            .get(&collection)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, fields)| Record::new(*id, fields.clone()))
                    .filter(|record| filter_matches(&query.filter, record))
                    .collect()
            })
            .unwrap_or_default();

        if !query.sort.is_empty() {
            found.sort_by(|a, b| {
                query
                    .sort
                    .iter()
                    .map(|(field, order)| {
                        let ord = compare_field(a, b, field);
                        match order {
                            SortOrder::Asc => ord,
                            SortOrder::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(limit) = query.limit {
            found.truncate(limit);
        }

        Ok(found)
    }

    async fn get(&self, collection: Collection, id: RecordId) -> BffResult<Option<Record>> {
        let mut state = self.lock()?;
        Self::enter(&mut state, RepoOp::Get, collection, Some(id), None)?;

        Ok(state
            .tables
            .get(&collection)
            .and_then(|table| table.get(&id))
            .map(|fields| Record::new(id, fields.clone())))
    }

    async fn create(&self, collection: Collection, mut fields: Map<String, Value>) -> BffResult<Record> {
        let mut state = self.lock()?;
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self::enter(&mut state, RepoOp::Create, collection, None, name.as_deref())?;

        let now = Value::String(Utc::now().to_rfc3339());
        fields.insert("createdAt".to_string(), now.clone());
        fields.insert("updatedAt".to_string(), now);

        state.next_id += 1;
        let id = RecordId(state.next_id);
        state
            .tables
            .entry(collection)
            .or_default()
            .insert(id, fields.clone());

        Ok(Record::new(id, fields))
    }

    async fn update(
        &self,
        collection: Collection,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> BffResult<Record> {
        let mut state = self.lock()?;
        Self::enter(&mut state, RepoOp::Update, collection, Some(id), None)?;

        let existing = state
            .tables
            .get_mut(&collection)
            .and_then(|table| table.get_mut(&id))
            .ok_or_else(|| BffError::not_found(format!("{} {}", collection.path(), id)))?;

        existing.extend(fields);
        existing.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        Ok(Record::new(id, existing.clone()))
    }

    async fn delete(&self, collection: Collection, id: RecordId) -> BffResult<()> {
        let mut state = self.lock()?;
        Self::enter(&mut state, RepoOp::Delete, collection, Some(id), None)?;

        state
            .tables
            .get_mut(&collection)
            .and_then(|table| table.remove(&id))
            .map(|_| ())
            .ok_or_else(|| BffError::not_found(format!("{} {}", collection.path(), id)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn test_create_then_find_case_insensitive() {
        let repo = MemoryRepository::new();
        let created = repo
            .create(Collection::Manufacturers, fields(json!({"name": "Bandai"})))
            .await
            .unwrap();

        let found = repo
            .find(
                Collection::Manufacturers,
                &Query::new(Filter::NameEqualsIgnoreCase("bandai".into())),
            )
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, created.id);
        assert!(found[0].str_field("createdAt").is_some());
    }

    #[tokio::test]
    async fn test_relation_filter_and_conjunction() {
        let repo = MemoryRepository::new();
        repo.seed(Collection::TagVotes, json!({"user": 1, "itag": 10, "voteType": "upvote"}));
        repo.seed(Collection::TagVotes, json!({"user": 2, "itag": 10, "voteType": "downvote"}));

        let query = Query::new(Filter::And(vec![
            Filter::RelationIs { field: "user", id: RecordId(2) },
            Filter::RelationIs { field: "itag", id: RecordId(10) },
        ]));
        let found = repo.find(Collection::TagVotes, &query).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].str_field("voteType"), Some("downvote"));
    }

    #[tokio::test]
    async fn test_sort_and_limit() {
        let repo = MemoryRepository::new();
        repo.seed(Collection::Tags, json!({"name": "b", "voteCount": 3}));
        repo.seed(Collection::Tags, json!({"name": "a", "voteCount": 3}));
        repo.seed(Collection::Tags, json!({"name": "c"}));
        repo.seed(Collection::Tags, json!({"name": "d", "voteCount": 9}));

        let query = Query::all()
            .sort_by("voteCount", SortOrder::Desc)
            .sort_by("name", SortOrder::Asc)
            .limit(3);
        let names: Vec<String> = repo
            .find(Collection::Tags, &query)
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.str_field("name").map(str::to_string))
            .collect();

        assert_eq!(names, vec!["d", "a", "b"]);
    }

    #[tokio::test]
    async fn test_update_merges_and_missing_is_not_found() {
        let repo = MemoryRepository::new();
        let id = repo.seed(Collection::Items, json!({"name": "Zaku", "isPrivate": false}));

        let updated = repo
            .update(Collection::Items, id, fields(json!({"isPrivate": true})))
            .await
            .unwrap();
        assert_eq!(updated.str_field("name"), Some("Zaku"));
        assert_eq!(updated.bool_field("isPrivate"), Some(true));

        let missing = repo
            .update(Collection::Items, RecordId(999), Map::new())
            .await;
        assert!(matches!(missing, Err(BffError::NotFound(_))));

        let missing_delete = repo.delete(Collection::Items, RecordId(999)).await;
        assert!(matches!(missing_delete, Err(BffError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_injected_failure_targets_one_name() {
        let repo = MemoryRepository::new();
        repo.inject_failure(FailureRule::on(RepoOp::Create, Collection::Categories).named("Mecha"));

        let ok = repo
            .create(Collection::Categories, fields(json!({"name": "Figure"})))
            .await;
        assert!(ok.is_ok());

        let err = repo
            .create(Collection::Categories, fields(json!({"name": "mecha"})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert_eq!(repo.count(Collection::Categories), 1);
    }

    #[tokio::test]
    async fn test_calls_recorded_in_order() {
        let repo = MemoryRepository::new();
        let id = repo.seed(Collection::Items, json!({"name": "x"}));

        repo.get(Collection::Items, id).await.unwrap();
        repo.delete(Collection::Items, id).await.unwrap();

        let calls = repo.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].op, RepoOp::Get);
        assert_eq!(calls[1].op, RepoOp::Delete);
        assert!(calls[1].op.is_mutation());
        assert_eq!(calls[1].id, Some(id));
    }
}
