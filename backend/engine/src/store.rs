//! # Vote Store
//!
//! Everything the engine needs from persistence, and nothing more.
//!
//! ## Contract
//!
//! - `insert_vote` is atomic and all-or-nothing. A second insert for the same (voter, subject)
//!   pair **must** fail with [`StoreError::Duplicate`], and that check has to happen inside the store
//!   (unique index, `HSETNX`, a single write lock), never as a read-then-write in the caller.
//! - Vote rows are append-only. Nothing here updates or deletes a vote.
//! - `list_profiles` yields profiles in roster order: the order they were first stored. Edits keep
//!   a profile's position.
//! - `upsert_profile` validates before writing, so the roster never holds a profile
//!   [`Profile::new`] would reject.
//! - Reads may observe a slightly stale snapshot while inserts are in flight.
use async_trait::async_trait;

use crate::{
    error::StoreError,
    models::{Profile, ProfileId, Vote, VoterId},
};

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Record `voter`'s decision on `subject`. Returns the stored row.
    async fn insert_vote(
        &self,
        voter: &VoterId,
        subject: &ProfileId,
        approve: bool,
    ) -> Result<Vote, StoreError>;
    /// Every vote row, in no particular order.
    async fn list_votes(&self) -> Result<Vec<Vote>, StoreError>;
    async fn list_votes_for_subject(&self, subject: &ProfileId) -> Result<Vec<Vote>, StoreError>;
    /// Subjects this voter has already judged.
    async fn list_subjects_by_voter(&self, voter: &VoterId) -> Result<Vec<ProfileId>, StoreError>;
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError>;
    /// Create or replace a profile. Returns true if the profile was new. The stored row is the
    /// sanitized profile; anything that fails validation is [`StoreError::Invalid`] and not written.
    async fn upsert_profile(&self, profile: &Profile) -> Result<bool, StoreError>;
}
