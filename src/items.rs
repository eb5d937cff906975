// 📦 Item Orchestrators - create / update / delete / comment
//
// create:  validate -> resolve references (concurrently) -> upload -> create
// update:  validate -> ownership guard -> resolve -> one update
// delete:  ownership guard -> delete
//
// Every reference is resolved before the item write is issued; a failed
// resolution aborts the operation with no item written. Reference entities
// created on the way stay behind (no compensation).

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::entities::item::fields;
use crate::entities::{Comment, Item, ReferenceKind};
use crate::error::{BffError, BffResult};
use crate::ownership::OwnershipGuard;
use crate::repository::{Collection, Record, RecordId, RecordRepository};
use crate::resolver::{relation_value, split_names, EntityResolver};
use crate::uploads::{FileStore, UploadFile};

// ============================================================================
// REQUEST
// ============================================================================

/// A comma-separated string or an array of names
fn names_field<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Names {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Option::<Names>::deserialize(deserializer)? {
        Some(Names::Joined(raw)) => split_names(&raw),
        Some(Names::List(list)) => list,
        None => Vec::new(),
    })
}

/// Item payload shared by create and update; decoded once at the boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub name: String,
    #[serde(default)]
    pub item_status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default, deserialize_with = "names_field")]
    pub categories: Vec<String>,
    #[serde(default, alias = "itags", deserialize_with = "names_field")]
    pub tags: Vec<String>,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ItemRequest {
    pub fn named(name: impl Into<String>) -> Self {
        ItemRequest {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build from multipart text fields (everything arrives as a string)
    pub fn from_form(form: &HashMap<String, String>) -> BffResult<Self> {
        let purchase_price = match non_blank(form.get("purchasePrice")) {
            Some(raw) => Some(raw.parse::<f64>().map_err(|_| {
                BffError::invalid_argument(format!("purchasePrice {raw:?} is not a number"))
            })?),
            None => None,
        };
        let purchase_date = match non_blank(form.get("purchaseDate")) {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                BffError::invalid_argument(format!("purchaseDate {raw:?} is not YYYY-MM-DD"))
            })?),
            None => None,
        };

        Ok(ItemRequest {
            name: form.get("name").cloned().unwrap_or_default(),
            item_status: non_blank(form.get("itemStatus")),
            description: form.get("description").cloned(),
            is_private: form.get("isPrivate").map(|v| v == "true").unwrap_or(false),
            purchase_price,
            purchase_date,
            manufacturer: non_blank(form.get("manufacturer")),
            character: non_blank(form.get("character")),
            series: non_blank(form.get("series")),
            categories: form.get("categories").map(|v| split_names(v)).unwrap_or_default(),
            tags: form
                .get("tags")
                .or_else(|| form.get("itags"))
                .map(|v| split_names(v))
                .unwrap_or_default(),
        })
    }

    pub fn validate(&self) -> BffResult<()> {
        if self.name.trim().is_empty() {
            return Err(BffError::invalid_argument("item name is required"));
        }
        if let Some(price) = self.purchase_price {
            if !price.is_finite() || price < 0.0 {
                return Err(BffError::invalid_argument("purchasePrice must be a non-negative number"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedReferences {
    pub manufacturer: Option<RecordId>,
    pub character: Option<RecordId>,
    pub series: Option<RecordId>,
    pub categories: Vec<RecordId>,
    pub tags: Vec<RecordId>,
}

fn id_list(ids: &[RecordId]) -> Value {
    Value::Array(ids.iter().map(|id| json!(id.0)).collect())
}

/// Attribute map for an item write; never carries the owner
fn item_fields(request: &ItemRequest, refs: &ResolvedReferences) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert(fields::NAME.into(), json!(request.name.trim()));
    out.insert(fields::STATUS.into(), json!(request.item_status));
    out.insert(fields::DESCRIPTION.into(), json!(request.description));
    out.insert(fields::IS_PRIVATE.into(), json!(request.is_private));
    out.insert(fields::PRICE.into(), json!(request.purchase_price));
    out.insert(
        fields::PURCHASE_DATE.into(),
        json!(request.purchase_date.map(|d| d.format("%Y-%m-%d").to_string())),
    );
    out.insert(fields::MANUFACTURER.into(), relation_value(refs.manufacturer));
    out.insert(fields::CHARACTER.into(), relation_value(refs.character));
    out.insert(fields::SERIES.into(), relation_value(refs.series));
    out.insert(fields::CATEGORIES.into(), id_list(&refs.categories));
    out.insert(fields::TAGS.into(), id_list(&refs.tags));
    out
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct ItemService {
    repo: Arc<dyn RecordRepository>,
    resolver: Arc<EntityResolver>,
    guard: OwnershipGuard,
    files: Arc<dyn FileStore>,
}

impl ItemService {
    pub fn new(
        repo: Arc<dyn RecordRepository>,
        resolver: Arc<EntityResolver>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        ItemService {
            guard: OwnershipGuard::new(repo.clone()),
            repo,
            resolver,
            files,
        }
    }

    /// Resolve every reference field; order across fields is irrelevant
    pub async fn resolve_references(&self, request: &ItemRequest) -> BffResult<ResolvedReferences> {
        let (manufacturer, character, series, categories, tags) = tokio::try_join!(
            self.resolver
                .resolve_opt(ReferenceKind::Manufacturer, request.manufacturer.as_deref()),
            self.resolver
                .resolve_opt(ReferenceKind::Character, request.character.as_deref()),
            self.resolver
                .resolve_opt(ReferenceKind::Series, request.series.as_deref()),
            self.resolver
                .resolve_many(ReferenceKind::Category, &request.categories),
            self.resolver.resolve_many(ReferenceKind::Tag, &request.tags),
        )?;

        Ok(ResolvedReferences {
            manufacturer,
            character,
            series,
            categories,
            tags,
        })
    }

    pub async fn create_item(
        &self,
        caller: RecordId,
        request: &ItemRequest,
        files: Vec<UploadFile>,
    ) -> BffResult<Item> {
        request.validate()?;

        let refs = self.resolve_references(request).await?;
        let images = self
            .files
            .upload(files)
            .await
            .map_err(|e| e.during("create item"))?;
        debug!(user_id = %caller, images = images.len(), "item references ready");

        let mut payload = item_fields(request, &refs);
        payload.insert(fields::OWNER.into(), json!(caller.0));
        payload.insert(
            fields::IMAGES.into(),
            Value::Array(images.iter().map(|image| json!(image.id.0)).collect()),
        );

        let record = self
            .repo
            .create(Collection::Items, payload)
            .await
            .map_err(|e| e.during("create item"))?;
        info!(user_id = %caller, item_id = %record.id, "item created");

        item_with_owner(record, caller)
    }

    pub async fn update_item(
        &self,
        caller: RecordId,
        item_id: RecordId,
        request: &ItemRequest,
    ) -> BffResult<Item> {
        request.validate()?;

        let existing = self.guard.assert_owner(Collection::Items, item_id, caller).await?;
        let refs = self.resolve_references(request).await?;

        let record = self
            .repo
            .update(Collection::Items, item_id, item_fields(request, &refs))
            .await
            .map_err(|e| e.during("update item"))?;
        info!(user_id = %caller, item_id = %item_id, "item updated");

        let owner = existing.relation_id(fields::OWNER).unwrap_or(caller);
        item_with_owner(record, owner)
    }

    pub async fn delete_item(&self, caller: RecordId, item_id: RecordId) -> BffResult<()> {
        self.guard.assert_owner(Collection::Items, item_id, caller).await?;
        self.repo
            .delete(Collection::Items, item_id)
            .await
            .map_err(|e| e.during("delete item"))?;
        info!(user_id = %caller, item_id = %item_id, "item deleted");
        Ok(())
    }

    pub async fn post_comment(
        &self,
        caller: RecordId,
        item_id: RecordId,
        content: &str,
    ) -> BffResult<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BffError::invalid_argument("comment content is required"));
        }

        self.repo
            .get(Collection::Items, item_id)
            .await
            .map_err(|e| e.during("post comment"))?
            .ok_or_else(|| BffError::not_found(format!("items {}", item_id)))?;

        let mut payload = Map::new();
        payload.insert("content".into(), json!(content));
        payload.insert("item".into(), json!(item_id.0));
        payload.insert("user".into(), json!(caller.0));

        let mut record = self
            .repo
            .create(Collection::Comments, payload)
            .await
            .map_err(|e| e.during("post comment"))?;
        // the store may answer without relations populated
        record.fields.entry("item").or_insert(json!(item_id.0));
        record.fields.entry("user").or_insert(json!(caller.0));

        Comment::from_record(&record)
    }
}

/// The store may answer a write without relations populated
fn item_with_owner(mut record: Record, owner: RecordId) -> BffResult<Item> {
    if record.relation_id(fields::OWNER).is_none() {
        record.fields.insert(fields::OWNER.into(), json!(owner.0));
    }
    Item::from_record(&record)
}

// ============================================================================
// TESTS
// ============================================================================
