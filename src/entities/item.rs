// 📦 Item Entity - one collectible on a user's shelf
//
// The owner reference is set at creation and never rewritten; it is the sole
// key for authorizing mutation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::reference::ReferenceEntity;
use crate::error::{BffError, BffResult};
use crate::repository::{Record, RecordId};

/// Store field names for the item collection
pub mod fields {
    pub const OWNER: &str = "user";
    pub const NAME: &str = "name";
    pub const STATUS: &str = "itemStatus";
    pub const DESCRIPTION: &str = "description";
    pub const IS_PRIVATE: &str = "isPrivate";
    pub const PRICE: &str = "purchasePrice";
    pub const PURCHASE_DATE: &str = "purchaseDate";
    pub const IMAGES: &str = "userImages";
    pub const MANUFACTURER: &str = "manufacturer";
    pub const CHARACTER: &str = "character";
    pub const SERIES: &str = "series";
    pub const CATEGORIES: &str = "categories";
    pub const TAGS: &str = "itags";
    pub const LIKED_BY: &str = "likedBy";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: RecordId,
    pub owner_id: RecordId,
    pub name: String,
    pub status: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
    pub price: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub images: Vec<ImageRef>,
    pub manufacturer: Option<ReferenceEntity>,
    pub character: Option<ReferenceEntity>,
    pub series: Option<ReferenceEntity>,
    pub categories: Vec<ReferenceEntity>,
    pub tags: Vec<ReferenceEntity>,
    pub liked_by: Vec<RecordId>,
}

/// Populated relation keeps its name; a bare id decodes with an empty one
fn single_reference(record: &Record, field: &str) -> Option<ReferenceEntity> {
    let id = record.relation_id(field)?;
    let name = record
        .get(field)
        .and_then(|v| v.get("name").or_else(|| v.pointer("/data/name")))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Some(ReferenceEntity { id, name })
}

fn reference_list(record: &Record, field: &str) -> Vec<ReferenceEntity> {
    let populated = record.relation_records(field);
    if !populated.is_empty() {
        return populated
            .iter()
            .map(|r| ReferenceEntity {
                id: r.id,
                name: r.str_field("name").unwrap_or_default().to_string(),
            })
            .collect();
    }
    record
        .relation_ids(field)
        .into_iter()
        .map(|id| ReferenceEntity {
            id,
            name: String::new(),
        })
        .collect()
}

impl Item {
    pub fn from_record(record: &Record) -> BffResult<Item> {
        let owner_id = record.relation_id(fields::OWNER).ok_or_else(|| {
            BffError::invalid_state(format!("item {} has no owner reference", record.id))
        })?;

        let images = record
            .relation_records(fields::IMAGES)
            .iter()
            .map(|r| ImageRef {
                id: r.id,
                url: r.str_field("url").map(str::to_string),
            })
            .collect::<Vec<_>>();
        let images = if images.is_empty() {
            record
                .relation_ids(fields::IMAGES)
                .into_iter()
                .map(|id| ImageRef { id, url: None })
                .collect()
        } else {
            images
        };

        Ok(Item {
            id: record.id,
            owner_id,
            name: record.str_field(fields::NAME).unwrap_or_default().to_string(),
            status: record.str_field(fields::STATUS).map(str::to_string),
            description: record.str_field(fields::DESCRIPTION).map(str::to_string),
            is_private: record.bool_field(fields::IS_PRIVATE).unwrap_or(false),
            price: record.get(fields::PRICE).and_then(|v| v.as_f64()),
            purchase_date: record
                .str_field(fields::PURCHASE_DATE)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
            images,
            manufacturer: single_reference(record, fields::MANUFACTURER),
            character: single_reference(record, fields::CHARACTER),
            series: single_reference(record, fields::SERIES),
            categories: reference_list(record, fields::CATEGORIES),
            tags: reference_list(record, fields::TAGS),
            liked_by: record.relation_ids(fields::LIKED_BY),
        })
    }

    pub fn is_owned_by(&self, user_id: RecordId) -> bool {
        self.owner_id == user_id
    }
}

// ============================================================================
// COMMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: RecordId,
    pub item_id: RecordId,
    pub author_id: RecordId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Comment {
    pub fn from_record(record: &Record) -> BffResult<Comment> {
        let missing = |what: &str| {
            BffError::invalid_state(format!("comment {} has no {} reference", record.id, what))
        };
        Ok(Comment {
            id: record.id,
            item_id: record.relation_id("item").ok_or_else(|| missing("item"))?,
            author_id: record.relation_id("user").ok_or_else(|| missing("user"))?,
            content: record.str_field("content").unwrap_or_default().to_string(),
            created_at: record.str_field("createdAt").map(str::to_string),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_from_populated_record() {
        let record = Record::from_json(json!({
            "id": 11,
            "name": "RX-78-2",
            "itemStatus": "owned",
            "isPrivate": false,
            "purchasePrice": 45.5,
            "purchaseDate": "2024-03-01",
            "user": { "id": 3, "username": "amuro" },
            "manufacturer": { "id": 7, "name": "Bandai" },
            "categories": [ { "id": 1, "name": "Gunpla" } ],
            "itags": { "data": [ { "id": 5, "attributes": { "name": "mecha" } } ] },
            "userImages": [ { "id": 90, "url": "/uploads/a.jpg" } ],
            "likedBy": [ { "id": 4 }, { "id": 6 } ]
        }))
        .unwrap();

        let item = Item::from_record(&record).unwrap();

        assert_eq!(item.owner_id, RecordId(3));
        assert_eq!(item.manufacturer.as_ref().unwrap().name, "Bandai");
        assert_eq!(item.tags[0].name, "mecha");
        assert_eq!(item.categories[0].id, RecordId(1));
        assert_eq!(item.images[0].url.as_deref(), Some("/uploads/a.jpg"));
        assert_eq!(item.liked_by, vec![RecordId(4), RecordId(6)]);
        assert_eq!(item.price, Some(45.5));
        assert_eq!(item.purchase_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(item.is_owned_by(RecordId(3)));
        assert!(!item.is_owned_by(RecordId(4)));
    }

    #[test]
    fn test_item_from_bare_ids() {
        let record = Record::from_json(json!({
            "id": 12,
            "name": "Zaku",
            "user": 3,
            "series": 8,
            "categories": [1, 2],
            "userImages": [40]
        }))
        .unwrap();

        let item = Item::from_record(&record).unwrap();

        assert_eq!(item.series.unwrap().id, RecordId(8));
        assert_eq!(item.categories.len(), 2);
        assert_eq!(item.images, vec![ImageRef { id: RecordId(40), url: None }]);
        assert!(item.manufacturer.is_none());
    }

    #[test]
    fn test_item_without_owner_is_invalid_state() {
        let record = Record::from_json(json!({ "id": 13, "name": "orphan" })).unwrap();
        let err = Item::from_record(&record).unwrap_err();

        assert!(matches!(err, BffError::InvalidState(_)));
    }

    #[test]
    fn test_comment_from_record() {
        let record = Record::from_json(json!({
            "id": 2, "item": 11, "user": { "id": 3 }, "content": "nice paint job"
        }))
        .unwrap();

        let comment = Comment::from_record(&record).unwrap();
        assert_eq!(comment.item_id, RecordId(11));
        assert_eq!(comment.author_id, RecordId(3));
        assert_eq!(comment.content, "nice paint job");
    }
}
