//! # Ranking
//!
//! Leaderboard from raw vote rows.
//!
//! ## Ordering
//!
//! 1. Approval percentage, descending
//! 2. Total votes, descending, so the better-attested subject wins a percentage tie
//! 3. Subject id, ascending, only to make exact ties deterministic
//!
//! Ranks are sort positions starting at 1. Exact ties do **not** share a rank.
//!
//! Percentages are computed once per subject from exact counts and rounded half up.
//! Subjects without votes never appear.
use std::{
    cmp::{Ordering, Reverse},
    collections::HashMap,
    sync::Arc,
};

use tracing::debug;

use crate::{
    error::StoreError,
    models::{LeaderboardEntry, Profile, ProfileId, RankedEntry, SubjectStats, Vote},
    store::VoteStore,
    utils::approval_percentage,
};

#[derive(Default, Clone, Copy)]
struct Tally {
    approvals: u64,
    total: u64,
}

impl Tally {
    fn add(&mut self, vote: &Vote) {
        self.total += 1;
        if vote.approve {
            self.approvals += 1;
        }
    }
}

fn compare(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    (Reverse(a.approval_percentage), Reverse(a.total_votes), &a.subject_id).cmp(&(
        Reverse(b.approval_percentage),
        Reverse(b.total_votes),
        &b.subject_id,
    ))
}

pub fn rank(votes: &[Vote]) -> Vec<RankedEntry> {
    let mut tallies: HashMap<&ProfileId, Tally> = HashMap::new();
    for vote in votes {
        tallies.entry(&vote.subject_id).or_default().add(vote);
    }

    let mut entries: Vec<RankedEntry> = tallies
        .into_iter()
        .filter_map(|(subject, tally)| {
            approval_percentage(tally.approvals, tally.total).map(|percentage| RankedEntry {
                subject_id: subject.clone(),
                approval_percentage: percentage,
                total_votes: tally.total,
                rank: 0,
            })
        })
        .collect();

    entries.sort_by(compare);
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank = position + 1;
    }

    entries
}

pub fn stats(votes: &[Vote]) -> SubjectStats {
    let mut tally = Tally::default();
    for vote in votes {
        tally.add(vote);
    }

    SubjectStats {
        approvals: tally.approvals,
        total_votes: tally.total,
        approval_percentage: approval_percentage(tally.approvals, tally.total),
    }
}

/// Attaches roster fields to ranked entries. Subjects missing from the roster keep their place.
pub fn join_profiles(ranked: Vec<RankedEntry>, roster: &[Profile]) -> Vec<LeaderboardEntry> {
    let profiles: HashMap<&ProfileId, &Profile> =
        roster.iter().map(|profile| (&profile.id, profile)).collect();

    ranked
        .into_iter()
        .map(|entry| {
            let profile = profiles.get(&entry.subject_id);

            LeaderboardEntry {
                display_name: profile.map(|p| p.display_name.clone()),
                image: profile.and_then(|p| p.cover_image()).map(str::to_string),
                bio: profile.and_then(|p| p.bio.clone()),
                ranked: entry,
            }
        })
        .collect()
}

/// Pull-based view over a store. Every call reads fresh rows, nothing is cached.
#[derive(Clone)]
pub struct RankingEngine {
    store: Arc<dyn VoteStore>,
}

impl RankingEngine {
    pub fn new(store: Arc<dyn VoteStore>) -> Self {
        Self { store }
    }

    pub async fn ranking(&self) -> Result<Vec<RankedEntry>, StoreError> {
        let votes = self.store.list_votes().await?;
        let ranked = rank(&votes);

        debug!("Ranked {} subjects from {} votes", ranked.len(), votes.len());

        Ok(ranked)
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let (ranked, roster) = tokio::try_join!(self.ranking(), self.store.list_profiles())?;

        Ok(join_profiles(ranked, &roster))
    }

    pub async fn stats_for(&self, subject: &ProfileId) -> Result<SubjectStats, StoreError> {
        let votes = self.store.list_votes_for_subject(subject).await?;

        Ok(stats(&votes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStore, models::VoterId};

    fn vote(voter: &str, subject: &str, approve: bool) -> Vote {
        Vote::new(VoterId::new(voter), ProfileId::new(subject), approve)
    }

    fn summary(entries: &[RankedEntry]) -> Vec<(&str, u8, u64, usize)> {
        entries
            .iter()
            .map(|e| {
                (
                    e.subject_id.as_str(),
                    e.approval_percentage,
                    e.total_votes,
                    e.rank,
                )
            })
            .collect()
    }

    #[test]
    fn test_basic() {
        let votes = [
            vote("v1", "A", true),
            vote("v2", "A", true),
            vote("v3", "A", false),
            vote("v1", "B", true),
            vote("v2", "B", false),
        ];

        assert_eq!(
            summary(&rank(&votes)),
            [("A", 67, 3, 1), ("B", 50, 2, 2)]
        );
    }

    #[test]
    fn test_tie_break_on_total_votes() {
        let votes = [
            vote("v1", "A", true),
            vote("v2", "A", false),
            vote("v1", "B", true),
            vote("v2", "B", true),
            vote("v3", "B", false),
            vote("v4", "B", false),
        ];

        assert_eq!(
            summary(&rank(&votes)),
            [("B", 50, 4, 1), ("A", 50, 2, 2)]
        );
    }

    #[test]
    fn test_exact_ties_get_distinct_ranks() {
        let votes = [
            vote("v1", "C", true),
            vote("v1", "A", true),
            vote("v1", "B", true),
        ];

        assert_eq!(
            summary(&rank(&votes)),
            [("A", 100, 1, 1), ("B", 100, 1, 2), ("C", 100, 1, 3)]
        );
    }

    #[test]
    fn test_ranks_are_positions() {
        let votes: Vec<Vote> = (0..300)
            .map(|i| vote("v1", &format!("s{i:03}"), i % 2 == 0))
            .collect();
        let ranked = rank(&votes);

        assert_eq!(ranked.len(), 300);
        for (position, entry) in ranked.iter().enumerate() {
            assert_eq!(entry.rank, position + 1);
        }
        assert_eq!(ranked[149].approval_percentage, 100);
        assert_eq!(ranked[150].approval_percentage, 0);
    }

    #[test]
    fn test_empty_votes() {
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn test_order_independent() {
        let mut votes = vec![
            vote("v1", "A", true),
            vote("v2", "A", false),
            vote("v3", "A", false),
            vote("v1", "B", false),
            vote("v2", "C", true),
            vote("v3", "C", true),
            vote("v4", "C", false),
        ];
        let forward = rank(&votes);

        votes.reverse();
        assert_eq!(rank(&votes), forward);
        assert_eq!(rank(&votes), rank(&votes));
    }

    #[test]
    fn test_stats() {
        let votes = [vote("v1", "A", true), vote("v2", "A", false), vote("v3", "A", true)];

        assert_eq!(
            stats(&votes),
            SubjectStats {
                approvals: 2,
                total_votes: 3,
                approval_percentage: Some(67),
            }
        );
        assert_eq!(stats(&[]), SubjectStats::default());
    }

    #[tokio::test]
    async fn test_leaderboard_joins_roster() {
        let ann = Profile::new(
            ProfileId::new("A"),
            "Ann",
            vec!["https://img.test/a1.png".to_string(), "https://img.test/a2.png".to_string()],
            Some("lifts".to_string()),
        )
        .unwrap();
        let store = Arc::new(MemoryStore::with_profiles([ann]).await.unwrap());

        store
            .insert_vote(&VoterId::new("v1"), &ProfileId::new("A"), true)
            .await
            .unwrap();
        store
            .insert_vote(&VoterId::new("v1"), &ProfileId::new("gone"), false)
            .await
            .unwrap();

        let engine = RankingEngine::new(store);
        let board = engine.leaderboard().await.unwrap();

        assert_eq!(board.len(), 2);
        assert_eq!(board[0].ranked.subject_id.as_str(), "A");
        assert_eq!(board[0].display_name.as_deref(), Some("Ann"));
        assert_eq!(board[0].image.as_deref(), Some("https://img.test/a1.png"));
        assert_eq!(board[0].bio.as_deref(), Some("lifts"));
        assert_eq!(board[1].ranked.rank, 2);
        assert_eq!(board[1].display_name, None);
    }

    #[tokio::test]
    async fn test_zero_vote_subjects_absent() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_vote(&VoterId::new("v1"), &ProfileId::new("A"), false)
            .await
            .unwrap();

        let engine = RankingEngine::new(store);
        let ranked = engine.ranking().await.unwrap();

        assert_eq!(summary(&ranked), [("A", 0, 1, 1)]);
        assert_eq!(
            engine.stats_for(&ProfileId::new("B")).await.unwrap(),
            SubjectStats::default()
        );
    }
}
