// 🗳️ Vote State Machine - (user, tag) vote plus the tag's aggregate counter
//
//   1. read the caller's existing vote for the tag
//   2. compute (next state, delta) from the transition table
//   3. delete / create / update the vote record
//   4. read the tag's current voteCount
//   5. write voteCount + delta
//
// Nothing makes steps 1-5 atomic. Concurrent votes on one tag by different
// users can interleave between the count read (4) and write (5), losing a
// delta. The store has no atomic increment, so this is the known boundary;
// `reconcile_vote_count` recomputes the counter from the live votes when a
// repair is wanted.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entities::{Tag, TagVote, VoteState, VoteType};
use crate::error::{BffError, BffResult};
use crate::repository::{Collection, Filter, Query, RecordId, RecordRepository, SortOrder};

pub const DEFAULT_TOP_TAGS: usize = 50;

/// Vote payload as decoded at the boundary, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub tag_id: Option<RecordId>,
    pub vote_type: Option<String>,
}

impl VoteRequest {
    pub fn new(tag_id: RecordId, vote_type: VoteType) -> Self {
        VoteRequest {
            tag_id: Some(tag_id),
            vote_type: Some(vote_type.as_str().to_string()),
        }
    }

    pub fn validate(&self) -> BffResult<(RecordId, VoteType)> {
        let tag_id = self
            .tag_id
            .ok_or_else(|| BffError::invalid_argument("tagId is required"))?;
        let vote_type = self
            .vote_type
            .as_deref()
            .ok_or_else(|| BffError::invalid_argument("voteType is required"))?
            .parse::<VoteType>()?;
        Ok((tag_id, vote_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub tag_id: RecordId,
    pub new_vote_count: i64,
    /// `None` when the vote was toggled off
    pub user_vote_status: Option<VoteType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountReconciliation {
    pub tag_id: RecordId,
    pub stored: i64,
    pub computed: i64,
    pub corrected: bool,
}

impl CountReconciliation {
    pub fn drift(&self) -> i64 {
        self.stored - self.computed
    }
}

pub struct VoteStateMachine {
    repo: Arc<dyn RecordRepository>,
}

fn vote_query(user: RecordId, tag_id: RecordId) -> Query {
    Query::new(Filter::And(vec![
        Filter::RelationIs {
            field: TagVote::USER_FIELD,
            id: user,
        },
        Filter::RelationIs {
            field: TagVote::TAG_FIELD,
            id: tag_id,
        },
    ]))
}

impl VoteStateMachine {
    pub fn new(repo: Arc<dyn RecordRepository>) -> Self {
        VoteStateMachine { repo }
    }

    pub async fn vote(&self, user: RecordId, request: &VoteRequest) -> BffResult<VoteOutcome> {
        let (tag_id, input) = request.validate()?;

        // 1. existing vote
        let existing = self
            .existing_vote(user, tag_id)
            .await
            .map_err(|e| e.during("read existing vote"))?;
        let current = VoteState::from_vote(existing.as_ref().map(|v| v.vote_type));

        // 2. transition
        let (next, delta) = current.apply(input);
        debug!(user = %user, tag_id = %tag_id, ?current, ?next, delta, "vote transition");

        // 3. vote record mutation
        match (&existing, next.vote_type()) {
            (Some(vote), None) => {
                self.repo
                    .delete(Collection::TagVotes, vote.id)
                    .await
                    .map_err(|e| e.during("remove vote"))?;
            }
            (None, Some(vote_type)) => {
                let mut fields = Map::new();
                fields.insert(TagVote::USER_FIELD.to_string(), json!(user.0));
                fields.insert(TagVote::TAG_FIELD.to_string(), json!(tag_id.0));
                fields.insert(TagVote::TYPE_FIELD.to_string(), json!(vote_type.as_str()));
                self.repo
                    .create(Collection::TagVotes, fields)
                    .await
                    .map_err(|e| e.during("record vote"))?;
            }
            (Some(vote), Some(vote_type)) => {
                let mut fields = Map::new();
                fields.insert(TagVote::TYPE_FIELD.to_string(), json!(vote_type.as_str()));
                self.repo
                    .update(Collection::TagVotes, vote.id, fields)
                    .await
                    .map_err(|e| e.during("change vote"))?;
            }
            // NONE never transitions to NONE
            (None, None) => {}
        }

        // 4. current count
        let tag = self
            .repo
            .get(Collection::Tags, tag_id)
            .await
            .map_err(|e| e.during("read tag"))?
            .map(|record| Tag::from_record(&record))
            .ok_or_else(|| BffError::not_found(format!("tag {}", tag_id)))?;

        // 5. write count + delta
        let new_vote_count = tag.vote_count + delta;
        self.write_count(tag_id, new_vote_count).await?;

        info!(
            user = %user,
            tag_id = %tag_id,
            vote = input.as_str(),
            new_vote_count,
            "vote applied"
        );

        Ok(VoteOutcome {
            tag_id,
            new_vote_count,
            user_vote_status: next.vote_type(),
        })
    }

    /// Advisory read: any upstream failure degrades to "no vote"
    pub async fn vote_status(&self, user: RecordId, tag_id: RecordId) -> Option<VoteType> {
        match self.existing_vote(user, tag_id).await {
            Ok(vote) => vote.map(|v| v.vote_type),
            Err(e) => {
                warn!(user = %user, tag_id = %tag_id, error = %e, "vote status lookup failed");
                None
            }
        }
    }

    /// Tags ranked by voteCount (desc), ties broken by name (asc)
    pub async fn top_tags(&self, limit: usize) -> BffResult<Vec<Tag>> {
        let query = Query::all()
            .sort_by("voteCount", SortOrder::Desc)
            .sort_by("name", SortOrder::Asc)
            .limit(limit);

        let records = self
            .repo
            .find(Collection::Tags, &query)
            .await
            .map_err(|e| e.during("list sorted tags"))?;

        let mut tags: Vec<Tag> = records.iter().map(Tag::from_record).collect();
        // the store may not know a missing counter is zero
        tags.sort_by(|a, b| b.vote_count.cmp(&a.vote_count).then_with(|| a.name.cmp(&b.name)));
        Ok(tags)
    }

    /// Recompute voteCount from the live votes and rewrite it if it drifted
    pub async fn reconcile_vote_count(&self, tag_id: RecordId) -> BffResult<CountReconciliation> {
        let tag = self
            .repo
            .get(Collection::Tags, tag_id)
            .await
            .map_err(|e| e.during("read tag"))?
            .map(|record| Tag::from_record(&record))
            .ok_or_else(|| BffError::not_found(format!("tag {}", tag_id)))?;

        let votes = self
            .repo
            .find(
                Collection::TagVotes,
                &Query::new(Filter::RelationIs {
                    field: TagVote::TAG_FIELD,
                    id: tag_id,
                }),
            )
            .await
            .map_err(|e| e.during("list tag votes"))?;

        let computed: i64 = votes
            .iter()
            .filter_map(TagVote::from_record)
            .map(|vote| vote.vote_type.weight())
            .sum();

        let corrected = computed != tag.vote_count;
        if corrected {
            warn!(
                tag_id = %tag_id,
                stored = tag.vote_count,
                computed,
                "vote count drifted, rewriting"
            );
            self.write_count(tag_id, computed).await?;
        }

        Ok(CountReconciliation {
            tag_id,
            stored: tag.vote_count,
            computed,
            corrected,
        })
    }

    async fn existing_vote(&self, user: RecordId, tag_id: RecordId) -> BffResult<Option<TagVote>> {
        let mut votes: Vec<TagVote> = self
            .repo
            .find(Collection::TagVotes, &vote_query(user, tag_id))
            .await?
            .iter()
            .filter_map(TagVote::from_record)
            .collect();

        if votes.len() > 1 {
            warn!(user = %user, tag_id = %tag_id, count = votes.len(), "multiple votes for one pair");
        }
        votes.sort_by_key(|v| v.id);
        Ok(votes.into_iter().next())
    }

    async fn write_count(&self, tag_id: RecordId, count: i64) -> BffResult<()> {
        let mut fields = Map::new();
        fields.insert("voteCount".to_string(), Value::from(count));
        self.repo
            .update(Collection::Tags, tag_id, fields)
            .await
            .map_err(|e| e.during("write vote count"))?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
