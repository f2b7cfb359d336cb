//! Casting and moving a voter's single vote.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    clock::Clock,
    model::Vote,
    repo::EntryRepository,
    schedule::{Phase, Window},
    store::StoreError,
};

/// Why a vote was refused before anything was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteRejection {
    #[error("NOT_OPEN")]
    NotOpen,
    #[error("CLOSED")]
    Closed,
    #[error("SELF_VOTE")]
    SelfVote,
    #[error("NO_SUCH_ENTRY")]
    NoSuchEntry,
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("vote rejected: {0}")]
    Rejected(VoteRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VoteError {
    pub fn user_message(&self) -> &'static str {
        match self {
            VoteError::Rejected(VoteRejection::NotOpen) => "Voting hasn't opened yet. Hold your broomsticks!",
            VoteError::Rejected(VoteRejection::Closed) => "Voting has closed. Stay tuned for the results!",
            VoteError::Rejected(VoteRejection::SelfVote) => "You cannot vote for yourself! 🎃",
            VoteError::Rejected(VoteRejection::NoSuchEntry) => "That costume has vanished.",
            VoteError::Store(_) => "Failed to cast vote. Please try again.",
        }
    }
}

impl From<VoteRejection> for VoteError {
    fn from(reason: VoteRejection) -> Self {
        VoteError::Rejected(reason)
    }
}

/// What a successful call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    pub vote: Vote,
    /// Set when the vote was moved away from another entry.
    pub moved_from: Option<String>,
    /// `false` for a repeat vote on the same entry.
    pub counted: bool,
}

#[derive(Clone)]
pub struct VotingWorkflow {
    repo: EntryRepository,
    clock: Arc<dyn Clock>,
    window: Window,
}

impl VotingWorkflow {
    pub fn new(repo: EntryRepository, clock: Arc<dyn Clock>, window: Window) -> Self {
        Self { repo, clock, window }
    }

    pub fn check_window(&self) -> Result<(), VoteRejection> {
        match self.window.phase(self.clock.now()) {
            Phase::Upcoming => Err(VoteRejection::NotOpen),
            Phase::Closed => Err(VoteRejection::Closed),
            Phase::Open => Ok(()),
        }
    }

    /// Points `voter_id`'s vote at `target_owner_id`, keeping both entries'
    /// counters in step.
    ///
    /// The steps are separate writes: decrement the previous target, record
    /// the vote, increment the new target. Two sessions voting at once can
    /// leave a counter out of step with the vote records.
    pub async fn cast_vote(&self, voter_id: &str, target_owner_id: &str) -> Result<VoteReceipt, VoteError> {
        self.check_window()?;
        if voter_id == target_owner_id {
            return Err(VoteRejection::SelfVote.into());
        }
        if self.repo.get_entry(target_owner_id).await?.is_none() {
            return Err(VoteRejection::NoSuchEntry.into());
        }

        let previous = self.repo.get_vote(voter_id).await?;

        let moved_from = match &previous {
            Some(prev) if prev.target_owner_id != target_owner_id => {
                match self.repo.adjust_vote_count(&prev.target_owner_id, -1).await {
                    // the old entry was deleted and took its count with it
                    Ok(()) | Err(StoreError::NotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                Some(prev.target_owner_id.clone())
            }
            _ => None,
        };

        let vote = Vote {
            voter_id: voter_id.to_owned(),
            target_owner_id: target_owner_id.to_owned(),
            cast_at: self.clock.now(),
        };
        self.repo.put_vote(&vote).await?;

        let counted = previous
            .as_ref()
            .is_none_or(|prev| prev.target_owner_id != target_owner_id);
        if counted {
            self.repo.adjust_vote_count(target_owner_id, 1).await?;
        }

        info!(voter = voter_id, target = target_owner_id, counted, "vote cast");
        Ok(VoteReceipt { vote, moved_from, counted })
    }
}
