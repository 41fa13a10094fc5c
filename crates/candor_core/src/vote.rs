//! Idempotent upvote recording.
//!
//! The guard runs an optimistic pre-check, then a guarded insert, then a
//! store-native counter increment. The authoritative race-breaker is the
//! store's uniqueness constraint, not application-level locking: two
//! concurrent votes from one identity can both pass the pre-check, and the
//! loser's constraint conflict is collapsed into the same "already voted"
//! outcome the pre-check produces. Cross-request locking on the vote target
//! would serialize unrelated voters on popular items, which is exactly the
//! high-contention case.

use crate::identity::VoteIdentity;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Store-level failure reported by a [`VoteStore`].
#[derive(Debug, Error)]
pub enum VoteStoreError {
    /// The insert hit one of the composite uniqueness constraints.
    #[error("vote already recorded for this identity")]
    Duplicate,
    /// Any other persistence failure.
    #[error("vote store error: {0}")]
    Backend(String),
}

/// Terminal outcome of recording a vote. Both cases are success to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// A new vote row was written and the counter incremented.
    Recorded,
    /// This identity had already voted on the target.
    AlreadyVoted,
}

/// Failure surfaced by [`UpvoteGuard::record`].
///
/// Uniqueness conflicts never show up here; they resolve to
/// [`VoteOutcome::AlreadyVoted`].
#[derive(Debug, Error)]
pub enum VoteError {
    /// The identity carried no signal at all; such a vote could never be
    /// deduplicated, so it is refused outright.
    #[error("no identity signal present")]
    MissingIdentity,
    #[error("vote persistence failed: {0}")]
    Store(String),
}

/// Persistence collaborator for vote records.
///
/// Implementations own the two composite uniqueness invariants: at most one
/// record per `(target, ip_hash)` and per `(target, client_hash)`.
pub trait VoteStore: Send + Sync {
    /// True if any non-empty signal of `identity` already voted on the
    /// target.
    fn has_vote(&self, target_id: i64, identity: &VoteIdentity) -> Result<bool, VoteStoreError>;

    /// Insert one vote record. A conflict on either uniqueness constraint
    /// must surface as [`VoteStoreError::Duplicate`], distinct from other
    /// write failures.
    fn insert_vote(&self, target_id: i64, identity: &VoteIdentity) -> Result<(), VoteStoreError>;

    /// Store-native atomic `counter = counter + 1` on the target, never a
    /// read-modify-write in the application.
    fn increment_vote_count(&self, target_id: i64) -> Result<(), VoteStoreError>;
}

impl<S: VoteStore + ?Sized> VoteStore for Arc<S> {
    fn has_vote(&self, target_id: i64, identity: &VoteIdentity) -> Result<bool, VoteStoreError> {
        (**self).has_vote(target_id, identity)
    }

    fn insert_vote(&self, target_id: i64, identity: &VoteIdentity) -> Result<(), VoteStoreError> {
        (**self).insert_vote(target_id, identity)
    }

    fn increment_vote_count(&self, target_id: i64) -> Result<(), VoteStoreError> {
        (**self).increment_vote_count(target_id)
    }
}

/// Coordinates the dedup-and-record sequence for one vote attempt.
///
/// The guard never touches rate-limiter tokens; gating happens in the
/// handler before it is invoked.
pub struct UpvoteGuard<S> {
    store: S,
}

impl<S: VoteStore> UpvoteGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn record(
        &self,
        target_id: i64,
        identity: &VoteIdentity,
    ) -> Result<VoteOutcome, VoteError> {
        // A signal-less identity matches nothing and conflicts with
        // nothing; letting it through would count every call.
        if identity.is_anonymous() {
            return Err(VoteError::MissingIdentity);
        }

        match self.store.has_vote(target_id, identity) {
            Ok(true) => return Ok(VoteOutcome::AlreadyVoted),
            Ok(false) => {}
            Err(err) => return Err(VoteError::Store(err.to_string())),
        }

        match self.store.insert_vote(target_id, identity) {
            Ok(()) => {}
            // Lost the race against a concurrent identical vote.
            Err(VoteStoreError::Duplicate) => return Ok(VoteOutcome::AlreadyVoted),
            Err(err) => return Err(VoteError::Store(err.to_string())),
        }

        if let Err(err) = self.store.increment_vote_count(target_id) {
            // The vote row is committed; losing the increment only
            // under-counts. Never roll the insert back, a retried vote from
            // this identity will resolve to AlreadyVoted via the pre-check.
            warn!(
                target_id,
                error = %err,
                "vote recorded but counter increment failed; counter may under-count"
            );
            return Err(VoteError::Store(err.to_string()));
        }

        Ok(VoteOutcome::Recorded)
    }
}
