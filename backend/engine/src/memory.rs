use std::collections::{HashMap, hash_map::Entry};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    models::{Profile, ProfileId, Vote, VoterId},
    store::VoteStore,
    utils::validated,
};

#[derive(Default)]
struct Tables {
    votes: HashMap<(VoterId, ProfileId), Vote>,
    profiles: HashMap<ProfileId, Profile>,
    roster: Vec<ProfileId>,
}

/// In-process store. The uniqueness check and the insert happen under one write lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_profiles(
        profiles: impl IntoIterator<Item = Profile>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        {
            let mut tables = store.tables.write().await;
            for profile in profiles {
                upsert(&mut tables, validated(&profile)?);
            }
        }

        Ok(store)
    }

    pub async fn vote_count(&self) -> usize {
        self.tables.read().await.votes.len()
    }
}

fn upsert(tables: &mut Tables, profile: Profile) -> bool {
    match tables.profiles.entry(profile.id.clone()) {
        Entry::Vacant(entry) => {
            tables.roster.push(profile.id.clone());
            entry.insert(profile);
            true
        }
        Entry::Occupied(mut entry) => {
            entry.insert(profile);
            false
        }
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn insert_vote(
        &self,
        voter: &VoterId,
        subject: &ProfileId,
        approve: bool,
    ) -> Result<Vote, StoreError> {
        let mut tables = self.tables.write().await;

        match tables.votes.entry((voter.clone(), subject.clone())) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(entry) => {
                let vote = Vote::new(voter.clone(), subject.clone(), approve);
                entry.insert(vote.clone());
                Ok(vote)
            }
        }
    }

    async fn list_votes(&self) -> Result<Vec<Vote>, StoreError> {
        Ok(self.tables.read().await.votes.values().cloned().collect())
    }

    async fn list_votes_for_subject(&self, subject: &ProfileId) -> Result<Vec<Vote>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .votes
            .values()
            .filter(|vote| &vote.subject_id == subject)
            .cloned()
            .collect())
    }

    async fn list_subjects_by_voter(&self, voter: &VoterId) -> Result<Vec<ProfileId>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .votes
            .keys()
            .filter(|(id, _)| id == voter)
            .map(|(_, subject)| subject.clone())
            .collect())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let tables = self.tables.read().await;

        Ok(tables
            .roster
            .iter()
            .filter_map(|id| tables.profiles.get(id).cloned())
            .collect())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<bool, StoreError> {
        let profile = validated(profile)?;

        Ok(upsert(&mut *self.tables.write().await, profile))
    }
}
