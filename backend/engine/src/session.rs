//! # Session
//!
//! Per-client context: who is voting and what they have already judged. Never shared between
//! clients and never persisted. Each concurrent client owns its own [`Session`].
//!
//! ## Identity
//!
//! - A new session starts anonymous with one minted id, reused for every vote in the session
//! - `sign_in` swaps to the account's id and reseeds the judged set from that account's stored votes
//! - `sign_out` starts over: new anonymous id, empty judged set
use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
    error::{StoreError, VoteError},
    feed::next_profile,
    models::{Profile, ProfileId, Vote, VoterIdentity},
    recorder::VoteRecorder,
    store::VoteStore,
};

#[derive(Debug)]
pub struct Session {
    identity: VoterIdentity,
    judged: HashSet<ProfileId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            identity: VoterIdentity::anonymous(),
            judged: HashSet::new(),
        }
    }

    pub fn identity(&self) -> &VoterIdentity {
        &self.identity
    }

    pub fn judged(&self) -> &HashSet<ProfileId> {
        &self.judged
    }

    pub fn is_judged(&self, subject: &ProfileId) -> bool {
        self.judged.contains(subject)
    }

    /// Pass on a profile without voting.
    pub fn skip(&mut self, subject: &ProfileId) {
        self.judged.insert(subject.clone());
    }

    pub async fn sign_in(
        &mut self,
        profile: ProfileId,
        store: &dyn VoteStore,
    ) -> Result<(), StoreError> {
        let identity = VoterIdentity::Authenticated(profile);
        let history = store.list_subjects_by_voter(&identity.voter_id()).await?;

        info!(
            "Signed in {}, {} subjects already judged",
            identity.voter_id(),
            history.len()
        );

        self.identity = identity;
        self.judged = history.into_iter().collect();

        Ok(())
    }

    pub fn sign_out(&mut self) {
        *self = Self::new();
    }

    /// Next profile for this session from a freshly read roster.
    pub async fn next(&self, store: &dyn VoteStore) -> Result<Option<Profile>, StoreError> {
        let roster = store.list_profiles().await?;

        Ok(next_profile(&roster, Some(&self.identity), &self.judged).cloned())
    }

    /// Vote on `subject` and advance. A duplicate still counts as judged, otherwise the feed
    /// would keep offering a profile the store will never accept a vote for.
    pub async fn swipe(
        &mut self,
        recorder: &VoteRecorder,
        subject: &ProfileId,
        approve: bool,
    ) -> Result<Vote, VoteError> {
        let result = recorder.record(Some(&self.identity), subject, approve).await;

        match &result {
            Ok(_) | Err(VoteError::DuplicateVote) | Err(VoteError::SelfVoteRejected) => {
                self.judged.insert(subject.clone());
            }
            Err(err) => debug!("Leaving {subject} in the feed after {err}"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{memory::MemoryStore, recorder::RetryPolicy};

    fn profile(id: &str) -> Profile {
        Profile::new(
            ProfileId::new(id),
            id,
            vec![format!("https://img.test/{id}.png")],
            None,
        )
        .unwrap()
    }

    async fn setup(ids: &[&str]) -> (Arc<MemoryStore>, VoteRecorder) {
        let store = Arc::new(
            MemoryStore::with_profiles(ids.iter().map(|id| profile(id)))
                .await
                .unwrap(),
        );
        let recorder = VoteRecorder::new(
            store.clone(),
            RetryPolicy {
                timeout: Duration::from_millis(100),
                retries: 0,
                backoff: Duration::from_millis(1),
            },
        );

        (store, recorder)
    }

    #[tokio::test]
    async fn test_feed_exhausts_after_every_profile() {
        let (store, recorder) = setup(&["A", "B", "C"]).await;
        let mut session = Session::new();
        let mut seen = Vec::new();

        while let Some(next) = session.next(&*store).await.unwrap() {
            seen.push(next.id.clone());
            session.swipe(&recorder, &next.id, true).await.unwrap();
        }

        assert_eq!(seen, [ProfileId::new("A"), ProfileId::new("B"), ProfileId::new("C")]);
        assert_eq!(store.vote_count().await, 3);
    }

    #[tokio::test]
    async fn test_skip_advances_without_vote() {
        let (store, _) = setup(&["A", "B"]).await;
        let mut session = Session::new();

        session.skip(&ProfileId::new("A"));

        let next = session.next(&*store).await.unwrap().unwrap();
        assert_eq!(next.id.as_str(), "B");
        assert_eq!(store.vote_count().await, 0);
    }

    #[tokio::test]
    async fn test_anonymous_id_is_stable_within_session() {
        let (store, recorder) = setup(&["A", "B"]).await;
        let mut session = Session::new();

        let first = session.swipe(&recorder, &ProfileId::new("A"), true).await.unwrap();
        let second = session.swipe(&recorder, &ProfileId::new("B"), false).await.unwrap();

        assert!(!session.identity().is_authenticated());
        assert_eq!(first.voter_id, second.voter_id);
        assert!(session.next(&*store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_still_advances() {
        let (store, recorder) = setup(&["A", "B"]).await;
        let mut session = Session::new();
        session.sign_in(ProfileId::new("B"), &*store).await.unwrap();

        recorder
            .record(Some(session.identity()), &ProfileId::new("A"), true)
            .await
            .unwrap();

        let result = session.swipe(&recorder, &ProfileId::new("A"), false).await;
        assert_eq!(result, Err(VoteError::DuplicateVote));
        assert!(session.is_judged(&ProfileId::new("A")));
        assert!(session.next(&*store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_seeds_history() {
        let (store, recorder) = setup(&["A", "B", "C"]).await;

        let mut earlier = Session::new();
        earlier.sign_in(ProfileId::new("C"), &*store).await.unwrap();
        earlier.swipe(&recorder, &ProfileId::new("A"), true).await.unwrap();

        let mut session = Session::new();
        session.skip(&ProfileId::new("B"));
        session.sign_in(ProfileId::new("C"), &*store).await.unwrap();

        assert!(session.identity().is_authenticated());
        assert!(session.is_judged(&ProfileId::new("A")));
        assert!(!session.is_judged(&ProfileId::new("B")));

        let next = session.next(&*store).await.unwrap().unwrap();
        assert_eq!(next.id.as_str(), "B");
    }

    #[tokio::test]
    async fn test_sign_out_starts_fresh() {
        let (_, recorder) = setup(&["A"]).await;
        let mut session = Session::new();
        session.swipe(&recorder, &ProfileId::new("A"), true).await.unwrap();
        let before = session.identity().voter_id();

        session.sign_out();

        assert!(session.judged().is_empty());
        assert_ne!(session.identity().voter_id(), before);
    }
}
