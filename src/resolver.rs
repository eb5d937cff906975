// 🔎 Entity Resolver - free-text name -> reference entity id
//
// Lookup is case-insensitive; a miss creates the entity with the trimmed name.
//
// Creation is NOT exclusive: two orchestrations resolving the same new name at
// the same time can both miss and both create, leaving duplicate entities.
// The store enforces no uniqueness, so this stays an accepted eventual gap.
// When duplicates exist, the lowest id wins so every reader converges on one.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entities::{ReferenceEntity, ReferenceKind};
use crate::error::{BffError, BffResult};
use crate::repository::{Filter, Query, RecordId, RecordRepository};

pub struct EntityResolver {
    repo: Arc<dyn RecordRepository>,
    /// Max lookups in flight for one name list
    concurrency: usize,
}

impl EntityResolver {
    pub fn new(repo: Arc<dyn RecordRepository>, concurrency: usize) -> Self {
        EntityResolver {
            repo,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve one name. Empty or whitespace-only names resolve to `None`.
    pub async fn resolve(&self, kind: ReferenceKind, name: &str) -> BffResult<Option<RecordId>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        self.find_or_create(kind, name)
            .await
            .map(Some)
            .map_err(|source| BffError::ResolutionFailed {
                kind: kind.as_str().to_string(),
                name: name.to_string(),
                source: Box::new(source),
            })
    }

    /// Resolve an optional single-valued field
    pub async fn resolve_opt(
        &self,
        kind: ReferenceKind,
        name: Option<&str>,
    ) -> BffResult<Option<RecordId>> {
        match name {
            Some(name) => self.resolve(kind, name).await,
            None => Ok(None),
        }
    }

    /// Resolve a list of names concurrently (bounded), preserving input order.
    /// Any single failure aborts the whole batch.
    pub async fn resolve_many(
        &self,
        kind: ReferenceKind,
        names: &[String],
    ) -> BffResult<Vec<RecordId>> {
        let names = normalize_names(names);
        if names.is_empty() {
            return Ok(Vec::new());
        }
        debug!(kind = %kind, count = names.len(), "resolving name batch");

        let resolved: Vec<Option<RecordId>> = stream::iter(names)
            .map(|name| async move { self.resolve(kind, &name).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(resolved.into_iter().flatten().collect())
    }

    async fn find_or_create(&self, kind: ReferenceKind, name: &str) -> BffResult<RecordId> {
        let collection = kind.collection();
        let query = Query::new(Filter::NameEqualsIgnoreCase(name.to_string()));

        // the store's filter is only a prefilter; names are compared here too
        let mut existing: Vec<RecordId> = self
            .repo
            .find(collection, &query)
            .await?
            .iter()
            .filter_map(ReferenceEntity::from_record)
            .filter(|entity| entity.matches_name(name))
            .map(|entity| entity.id)
            .collect();
        existing.sort();

        if let Some(first) = existing.first() {
            if existing.len() > 1 {
                warn!(kind = %kind, name, duplicates = existing.len(), "duplicate reference entities");
            }
            return Ok(*first);
        }

        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.to_string()));
        let created = self.repo.create(collection, fields).await?;
        info!(kind = %kind, name, id = %created.id, "created reference entity");

        Ok(created.id)
    }
}

/// Trim, drop empties, and collapse case-insensitive repeats (first spelling wins)
pub fn normalize_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Split a comma-separated form field into names
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

/// JSON value for a single relation write (`null` clears it)
pub(crate) fn relation_value(id: Option<RecordId>) -> Value {
    match id {
        Some(id) => json!(id.0),
        None => Value::Null,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Collection, FailureRule, MemoryRepository, Record, RepoOp};
    use async_trait::async_trait;

    /// Store whose name filter matches everything
    struct LooseRepository(MemoryRepository);

    #[async_trait]
    impl RecordRepository for LooseRepository {
        async fn find(&self, collection: Collection, _query: &Query) -> BffResult<Vec<Record>> {
            self.0.find(collection, &Query::all()).await
        }

        async fn get(&self, collection: Collection, id: RecordId) -> BffResult<Option<Record>> {
            self.0.get(collection, id).await
        }

        async fn create(&self, collection: Collection, fields: Map<String, Value>) -> BffResult<Record> {
            self.0.create(collection, fields).await
        }

        async fn update(
            &self,
            collection: Collection,
            id: RecordId,
            fields: Map<String, Value>,
        ) -> BffResult<Record> {
            self.0.update(collection, id, fields).await
        }

        async fn delete(&self, collection: Collection, id: RecordId) -> BffResult<()> {
            self.0.delete(collection, id).await
        }
    }

    fn resolver(repo: &MemoryRepository) -> EntityResolver {
        EntityResolver::new(Arc::new(repo.clone()), 4)
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let repo = MemoryRepository::new();
        let resolver = resolver(&repo);

        let first = resolver.resolve(ReferenceKind::Manufacturer, "Bandai").await.unwrap();
        let second = resolver.resolve(ReferenceKind::Manufacturer, "Bandai").await.unwrap();

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(repo.count(Collection::Manufacturers), 1);
    }

    #[tokio::test]
    async fn test_resolve_matches_case_insensitively() {
        let repo = MemoryRepository::new();
        let resolver = resolver(&repo);

        let lower = resolver.resolve(ReferenceKind::Manufacturer, "bandai").await.unwrap();
        let upper = resolver.resolve(ReferenceKind::Manufacturer, "Bandai").await.unwrap();

        assert_eq!(lower, upper);
        assert_eq!(repo.count(Collection::Manufacturers), 1);
    }

    #[tokio::test]
    async fn test_blank_name_resolves_to_none_without_calls() {
        let repo = MemoryRepository::new();
        let resolver = resolver(&repo);

        assert_eq!(resolver.resolve(ReferenceKind::Series, "   ").await.unwrap(), None);
        assert_eq!(resolver.resolve_opt(ReferenceKind::Series, None).await.unwrap(), None);
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_created_name_is_trimmed() {
        let repo = MemoryRepository::new();
        let resolver = resolver(&repo);

        resolver.resolve(ReferenceKind::Character, "  Char Aznable ").await.unwrap();

        let records = repo.records(Collection::Characters);
        assert_eq!(records[0].str_field("name"), Some("Char Aznable"));
    }

    #[tokio::test]
    async fn test_duplicates_resolve_to_lowest_id() {
        let repo = MemoryRepository::new();
        let first = repo.seed(Collection::Tags, serde_json::json!({"name": "mecha"}));
        repo.seed(Collection::Tags, serde_json::json!({"name": "Mecha"}));

        let resolved = resolver(&repo).resolve(ReferenceKind::Tag, "MECHA").await.unwrap();
        assert_eq!(resolved, Some(first));
    }

    #[tokio::test]
    async fn test_loose_store_filter_does_not_leak_other_names() {
        let repo = MemoryRepository::new();
        let other = repo.seed(Collection::Manufacturers, serde_json::json!({"name": "Kotobukiya"}));
        let resolver = EntityResolver::new(Arc::new(LooseRepository(repo.clone())), 2);

        let bandai = resolver.resolve(ReferenceKind::Manufacturer, "Bandai").await.unwrap();
        assert_ne!(bandai, Some(other));
        assert_eq!(repo.count(Collection::Manufacturers), 2);

        let again = resolver.resolve(ReferenceKind::Manufacturer, "BANDAI").await.unwrap();
        assert_eq!(again, bandai);
    }

    #[tokio::test]
    async fn test_resolve_many_preserves_order_and_dedupes() {
        let repo = MemoryRepository::new();
        let existing = repo.seed(Collection::Categories, serde_json::json!({"name": "Figure"}));
        let resolver = resolver(&repo);

        let names: Vec<String> = ["Gunpla", "figure", "", "Statue", "GUNPLA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let ids = resolver.resolve_many(ReferenceKind::Category, &names).await.unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], existing);
        assert_eq!(repo.count(Collection::Categories), 3);
    }

    #[tokio::test]
    async fn test_failure_is_labelled_with_kind_and_name() {
        let repo = MemoryRepository::new();
        repo.inject_failure(FailureRule::on(RepoOp::Find, Collection::Categories).named("Mecha"));
        let resolver = resolver(&repo);

        let names = vec!["Figure".to_string(), "Mecha".to_string()];
        let err = resolver
            .resolve_many(ReferenceKind::Category, &names)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "resolution failed for category:Mecha");
    }

    #[test]
    fn test_split_names() {
        assert_eq!(split_names("a, b,,c ,"), vec!["a", "b", "c"]);
        assert!(split_names("").is_empty());
    }

    #[test]
    fn test_normalize_names() {
        let names: Vec<String> = vec![" Zaku ".into(), "zaku".into(), " ".into(), "Gouf".into()];
        assert_eq!(normalize_names(&names), vec!["Zaku", "Gouf"]);
    }
}
