// 🔐 Ownership Guard - precondition check before any mutation
//
// Must complete, and pass, before the first mutating call is issued. Fails
// closed: a record with no readable owner is never treated as owned.

use std::sync::Arc;
use tracing::warn;

use crate::error::{BffError, BffResult};
use crate::repository::{Collection, Record, RecordId, RecordRepository};

/// Pure check over an already-read owner reference
pub fn verify_owner(owner: Option<RecordId>, caller: RecordId) -> BffResult<()> {
    match owner {
        Some(owner) if owner == caller => Ok(()),
        _ => Err(BffError::forbidden("you do not own this record")),
    }
}

pub struct OwnershipGuard {
    repo: Arc<dyn RecordRepository>,
}

impl OwnershipGuard {
    pub fn new(repo: Arc<dyn RecordRepository>) -> Self {
        OwnershipGuard { repo }
    }

    /// Fetch the record, compare its owner with the caller, and hand the record
    /// back so the caller does not need a second read.
    pub async fn assert_owner(
        &self,
        collection: Collection,
        id: RecordId,
        caller: RecordId,
    ) -> BffResult<Record> {
        let owner_field = collection.owner_field().ok_or_else(|| {
            BffError::invalid_argument(format!("{} records carry no owner", collection.path()))
        })?;

        let record = self
            .repo
            .get(collection, id)
            .await
            .map_err(|e| e.during("ownership check"))?
            .ok_or_else(|| BffError::not_found(format!("{} {}", collection.path(), id)))?;

        if let Err(e) = verify_owner(record.relation_id(owner_field), caller) {
            warn!(
                collection = collection.path(),
                record_id = %id,
                caller = %caller,
                "ownership check rejected caller"
            );
            return Err(e);
        }

        Ok(record)
    }
}

// ============================================================================
// TESTS
// ============================================================================
