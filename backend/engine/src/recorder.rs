//! # Vote Recorder
//!
//! The only side-effecting path in the engine.
//!
//! ## Flow
//!
//! 1. Resolve the voter. No identity at all means a fresh anonymous id for this one call; callers
//!    that want one id per session pass the [`Session`](crate::session::Session) identity instead.
//! 2. Reject self-votes before touching the store.
//! 3. Insert through the store under a per-attempt timeout. The store owns uniqueness, there is no
//!    pre-check here.
//! 4. Transient failures are retried with doubling backoff until the retry budget runs out.
//!    Duplicates are final.
//! 5. Publish the stored row to subscribers, if any.
use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    error::VoteError,
    events::VoteEvents,
    models::{ProfileId, Vote, VoterId, VoterIdentity},
    store::VoteStore,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            retries: 2,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.pow(attempt.min(10))
    }
}

pub struct VoteRecorder {
    store: Arc<dyn VoteStore>,
    policy: RetryPolicy,
    events: Option<VoteEvents>,
}

impl VoteRecorder {
    pub fn new(store: Arc<dyn VoteStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            events: None,
        }
    }

    pub fn with_events(mut self, events: VoteEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn record(
        &self,
        identity: Option<&VoterIdentity>,
        subject: &ProfileId,
        approve: bool,
    ) -> Result<Vote, VoteError> {
        let voter = match identity {
            Some(identity) => identity.voter_id(),
            None => VoterId::mint(),
        };

        if voter.is(subject) {
            warn!("Rejected self-vote by {voter}");
            return Err(VoteError::SelfVoteRejected);
        }

        let mut attempt = 0;
        loop {
            match self.attempt(&voter, subject, approve).await {
                Ok(vote) => {
                    info!("Recorded vote {voter} -> {subject} ({approve})");

                    if let Some(events) = &self.events {
                        events.publish(&vote);
                    }

                    return Ok(vote);
                }
                Err(VoteError::TransientStoreError(reason)) if attempt < self.policy.retries => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        "Vote {voter} -> {subject} failed ({reason}), retry {} in {delay:?}",
                        attempt + 1
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
                Err(VoteError::DuplicateVote) => {
                    debug!("Duplicate vote {voter} -> {subject}");
                    return Err(VoteError::DuplicateVote);
                }
                Err(err) => {
                    warn!("Vote {voter} -> {subject} failed: {err}");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        voter: &VoterId,
        subject: &ProfileId,
        approve: bool,
    ) -> Result<Vote, VoteError> {
        match timeout(
            self.policy.timeout,
            self.store.insert_vote(voter, subject, approve),
        )
        .await
        {
            Ok(result) => result.map_err(VoteError::from),
            Err(_) => Err(VoteError::TransientStoreError(format!(
                "insert timed out after {:?}",
                self.policy.timeout
            ))),
        }
    }
}
