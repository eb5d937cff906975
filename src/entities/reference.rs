// 🏷️ Reference Entities - free-text names promoted to shared records
//
// "Bandai" typed on one item and "bandai" typed on another are the SAME
// manufacturer. Identity is the record id; the name is only a lookup key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::repository::{Collection, Record, RecordId};

// ============================================================================
// REFERENCE KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Manufacturer,
    Character,
    Series,
    Category,
    Tag,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Manufacturer => "manufacturer",
            ReferenceKind::Character => "character",
            ReferenceKind::Series => "series",
            ReferenceKind::Category => "category",
            ReferenceKind::Tag => "tag",
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            ReferenceKind::Manufacturer => Collection::Manufacturers,
            ReferenceKind::Character => Collection::Characters,
            ReferenceKind::Series => Collection::Series,
            ReferenceKind::Category => Collection::Categories,
            ReferenceKind::Tag => Collection::Tags,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// REFERENCE ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    pub id: RecordId,
    pub name: String,
}

impl ReferenceEntity {
    pub fn from_record(record: &Record) -> Option<Self> {
        Some(ReferenceEntity {
            id: record.id,
            name: record.str_field("name")?.to_string(),
        })
    }

    /// Case-insensitive name comparison, the only equality names get
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

// ============================================================================
// TAG (reference entity with an aggregate vote counter)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: RecordId,
    pub name: String,
    pub vote_count: i64,
}

impl Tag {
    /// A missing counter reads as zero
    pub fn from_record(record: &Record) -> Self {
        Tag {
            id: record.id,
            name: record.str_field("name").unwrap_or_default().to_string(),
            vote_count: record.i64_field("voteCount").unwrap_or(0),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
