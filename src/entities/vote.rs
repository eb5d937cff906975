// 🗳️ Tag Votes - one vote per (user, tag), folded into the tag's counter
//
//   current     input      next        delta
//   NONE        upvote     UPVOTED     +1
//   NONE        downvote   DOWNVOTED   -1
//   UPVOTED     upvote     NONE        -1   (toggle off)
//   UPVOTED     downvote   DOWNVOTED   -2
//   DOWNVOTED   downvote   NONE        +1   (toggle off)
//   DOWNVOTED   upvote     UPVOTED     +2

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BffError;
use crate::repository::{Record, RecordId};

// ============================================================================
// VOTE TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }

    /// Contribution of one live vote to the tag's counter
    pub fn weight(&self) -> i64 {
        match self {
            VoteType::Upvote => 1,
            VoteType::Downvote => -1,
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = BffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(VoteType::Upvote),
            "downvote" => Ok(VoteType::Downvote),
            other => Err(BffError::invalid_argument(format!(
                "voteType must be upvote or downvote, got {other:?}"
            ))),
        }
    }
}

// ============================================================================
// VOTE STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteState {
    None,
    Upvoted,
    Downvoted,
}

impl VoteState {
    pub fn from_vote(vote: Option<VoteType>) -> Self {
        match vote {
            None => VoteState::None,
            Some(VoteType::Upvote) => VoteState::Upvoted,
            Some(VoteType::Downvote) => VoteState::Downvoted,
        }
    }

    /// The vote a user holds in this state (`None` for NONE)
    pub fn vote_type(&self) -> Option<VoteType> {
        match self {
            VoteState::None => None,
            VoteState::Upvoted => Some(VoteType::Upvote),
            VoteState::Downvoted => Some(VoteType::Downvote),
        }
    }

    /// Next state and counter delta for a requested vote
    pub fn apply(self, input: VoteType) -> (VoteState, i64) {
        let next = match (self.vote_type(), input) {
            (Some(current), requested) if current == requested => VoteState::None,
            (_, requested) => VoteState::from_vote(Some(requested)),
        };
        let delta = next.weight() - self.weight();
        (next, delta)
    }

    fn weight(&self) -> i64 {
        self.vote_type().map(|v| v.weight()).unwrap_or(0)
    }
}

// ============================================================================
// TAG VOTE RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagVote {
    pub id: RecordId,
    pub user_id: RecordId,
    pub tag_id: RecordId,
    pub vote_type: VoteType,
}

impl TagVote {
    pub const USER_FIELD: &'static str = "user";
    pub const TAG_FIELD: &'static str = "itag";
    pub const TYPE_FIELD: &'static str = "voteType";

    /// `None` when the record lacks a recognizable vote type or relation
    pub fn from_record(record: &Record) -> Option<TagVote> {
        Some(TagVote {
            id: record.id,
            user_id: record.relation_id(Self::USER_FIELD)?,
            tag_id: record.relation_id(Self::TAG_FIELD)?,
            vote_type: record.str_field(Self::TYPE_FIELD)?.parse().ok()?,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
