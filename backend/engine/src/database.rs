//! # Redis
//!
//! RAM database backing the vote store.
//!
//! Core purpose is to hold the roster and the append-only vote rows, and to enforce one vote per
//! (voter, subject) pair atomically.
//!
//! ## Requirements
//!
//! - Uniqueness checked server side, no read-then-write race between concurrent voters
//! - Cheap per-subject reads for profile stats
//! - Whole-table reads for the leaderboard, eventual consistency is fine there
//!
//! ## Implementation
//!
//! - `{prefix}:votes:{subject}`: hash, voter id -> JSON vote row
//! - `{prefix}:subjects`: set of subjects holding at least one vote
//! - `{prefix}:voter:{voter}`: set of subjects that voter has judged
//! - `{prefix}:profiles`: hash, profile id -> JSON profile
//! - `{prefix}:roster`: list of profile ids in first-insert order
//!
//! Inserting a vote is one Lua script: `HSETNX` on the subject hash decides the outcome and the two
//! index sets are only touched when it succeeds. Redis runs scripts atomically, so the write is all
//! or nothing.
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::{debug, info};

use crate::{
    error::StoreError,
    models::{Profile, ProfileId, Vote, VoterId},
    store::VoteStore,
    utils::validated,
};

const INSERT_VOTE: &str = r"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then
    return 0
end
redis.call('SADD', KEYS[2], ARGV[3])
redis.call('SADD', KEYS[3], ARGV[3])
return 1
";

const UPSERT_PROFILE: &str = r"
local created = redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
if created == 1 then
    redis.call('RPUSH', KEYS[2], ARGV[1])
end
return created
";

pub async fn init_redis(
    redis_url: &str,
    retries: usize,
    timeout: Duration,
) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(retries)
        .set_connection_timeout(timeout)
        .set_response_timeout(timeout);

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    info!("Connected to Redis");

    Ok(connection_manager)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keys {
    prefix: String,
}

impl Keys {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches(':').to_string(),
        }
    }

    pub fn votes(&self, subject: &ProfileId) -> String {
        format!("{}:votes:{subject}", self.prefix)
    }

    pub fn subjects(&self) -> String {
        format!("{}:subjects", self.prefix)
    }

    pub fn voter(&self, voter: &VoterId) -> String {
        format!("{}:voter:{voter}", self.prefix)
    }

    pub fn profiles(&self) -> String {
        format!("{}:profiles", self.prefix)
    }

    pub fn roster(&self) -> String {
        format!("{}:roster", self.prefix)
    }
}

pub struct RedisStore {
    connection: ConnectionManager,
    keys: Keys,
    insert_vote: Script,
    upsert_profile: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager, prefix: &str) -> Self {
        Self {
            connection,
            keys: Keys::new(prefix),
            insert_vote: Script::new(INSERT_VOTE),
            upsert_profile: Script::new(UPSERT_PROFILE),
        }
    }

    pub async fn connect(
        redis_url: &str,
        prefix: &str,
        retries: usize,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let connection = init_redis(redis_url, retries, timeout).await?;

        Ok(Self::new(connection, prefix))
    }
}

fn decode_votes(rows: Vec<String>) -> Result<Vec<Vote>, StoreError> {
    rows.iter()
        .map(|row| serde_json::from_str(row).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl VoteStore for RedisStore {
    async fn insert_vote(
        &self,
        voter: &VoterId,
        subject: &ProfileId,
        approve: bool,
    ) -> Result<Vote, StoreError> {
        let vote = Vote::new(voter.clone(), subject.clone(), approve);
        let row = serde_json::to_string(&vote)?;
        let mut connection = self.connection.clone();

        let created: i64 = self
            .insert_vote
            .key(self.keys.votes(subject))
            .key(self.keys.subjects())
            .key(self.keys.voter(voter))
            .arg(voter.as_str())
            .arg(row)
            .arg(subject.as_str())
            .invoke_async(&mut connection)
            .await?;

        #[cfg(feature = "verbose")]
        debug!("HSETNX {} {voter} -> {created}", self.keys.votes(subject));

        match created {
            1 => Ok(vote),
            _ => Err(StoreError::Duplicate),
        }
    }

    async fn list_votes(&self) -> Result<Vec<Vote>, StoreError> {
        let mut connection = self.connection.clone();

        let subjects: Vec<String> = connection.smembers(self.keys.subjects()).await?;
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for subject in &subjects {
            pipe.hvals(self.keys.votes(&ProfileId::new(subject.as_str())));
        }

        let rows: Vec<Vec<String>> = pipe.query_async(&mut connection).await?;
        debug!("Read votes for {} subjects", subjects.len());

        decode_votes(rows.into_iter().flatten().collect())
    }

    async fn list_votes_for_subject(&self, subject: &ProfileId) -> Result<Vec<Vote>, StoreError> {
        let mut connection = self.connection.clone();
        let rows: Vec<String> = connection.hvals(self.keys.votes(subject)).await?;

        decode_votes(rows)
    }

    async fn list_subjects_by_voter(&self, voter: &VoterId) -> Result<Vec<ProfileId>, StoreError> {
        let mut connection = self.connection.clone();
        let subjects: Vec<String> = connection.smembers(self.keys.voter(voter)).await?;

        Ok(subjects.into_iter().map(ProfileId::new).collect())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let mut connection = self.connection.clone();

        let ids: Vec<String> = connection.lrange(self.keys.roster(), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(self.keys.profiles())
            .arg(&ids)
            .query_async(&mut connection)
            .await?;

        // a roster id without a row is a profile deleted out from under us, skip it
        rows.into_iter()
            .flatten()
            .map(|row| serde_json::from_str(&row).map_err(StoreError::from))
            .collect()
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<bool, StoreError> {
        let profile = validated(profile)?;
        let row = serde_json::to_string(&profile)?;
        let mut connection = self.connection.clone();

        let created: i64 = self
            .upsert_profile
            .key(self.keys.profiles())
            .key(self.keys.roster())
            .arg(profile.id.as_str())
            .arg(row)
            .invoke_async(&mut connection)
            .await?;

        Ok(created == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_layout() {
        let keys = Keys::new("swipes:");

        assert_eq!(keys.votes(&ProfileId::new("a")), "swipes:votes:a");
        assert_eq!(keys.subjects(), "swipes:subjects");
        assert_eq!(keys.voter(&VoterId::new("v1")), "swipes:voter:v1");
        assert_eq!(keys.profiles(), "swipes:profiles");
        assert_eq!(keys.roster(), "swipes:roster");
    }

    fn statements(script: &str) -> Vec<&str> {
        script
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    #[test]
    fn test_insert_script_guards_on_hsetnx() {
        let lines = statements(INSERT_VOTE);

        // the early return is the only way out before the index writes, and nothing follows them
        assert_eq!(
            lines,
            [
                "if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then",
                "return 0",
                "end",
                "redis.call('SADD', KEYS[2], ARGV[3])",
                "redis.call('SADD', KEYS[3], ARGV[3])",
                "return 1",
            ]
        );
    }

    #[test]
    fn test_upsert_script_appends_roster_only_on_create() {
        let lines = statements(UPSERT_PROFILE);

        assert_eq!(
            lines,
            [
                "local created = redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])",
                "if created == 1 then",
                "redis.call('RPUSH', KEYS[2], ARGV[1])",
                "end",
                "return created",
            ]
        );
    }

    #[test]
    fn test_decode_votes_rejects_garbage() {
        let vote = Vote::new(VoterId::new("v1"), ProfileId::new("a"), false);
        let row = serde_json::to_string(&vote).unwrap();

        assert_eq!(decode_votes(vec![row]).unwrap(), vec![vote]);
        assert!(matches!(
            decode_votes(vec!["{not json".to_string()]),
            Err(StoreError::Corrupt(_))
        ));
    }
}
