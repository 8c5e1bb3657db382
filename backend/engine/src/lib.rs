//! Vote feed and ranking engine for a community swipe-rating platform.
//!
//! Members judge each other's profiles with a binary approve/reject decision. This crate picks the
//! next profile a voter has not judged yet, records each vote exactly once per (voter, subject), and
//! computes the leaderboard from whatever votes the store holds.
//!
//!
//!
//! # General Infrastructure
//! - Presentation layer (web client, CLI) owns a [`Session`] per client
//! - Identity provider hands us a profile id on sign in, we never see credentials
//! - One shared [`VoteStore`], either [`MemoryStore`] or [`RedisStore`]
//! - Leaderboard is pulled on demand through [`RankingEngine`], with [`VoteEvents`] for anyone who
//!   wants to hear about new votes instead of polling
//!
//!
//!
//! # Invariants
//!
//! - **No self-votes**: the feed never offers a voter their own profile, and the recorder rejects
//!   it again before the store is touched
//! - **No double votes**: enforced by the store atomically, the recorder never pre-checks
//! - **Deterministic ranking**: same votes in, same leaderboard out, in any row order
//! - **Monotonic feed**: once judged, a profile never comes back in the same session
//!
//!
//!
//! # Notes
//!
//! ## Anonymous voters
//! A session mints one anonymous id when it starts and reuses it for every vote, so the store's
//! uniqueness rule holds for anonymous voters too within one session. Calling
//! [`VoteRecorder::record`] with no identity at all mints a throwaway id for that single vote.
//!
//! ## Consistency
//! Votes are append-only, so the only race that matters is two inserts for the same pair, and the
//! store settles that. The leaderboard may trail in-flight writes, that is acceptable.
//!
//!
//!
//! # Environment
//!
//! | Variable | Default | |
//! |---|---|---|
//! | `SWIPES_STORE` | `memory` | `memory` or `redis` |
//! | `REDIS_URL` | `redis://127.0.0.1:6379` | password read from `/run/secrets/REDIS_PASSWORD` if mounted |
//! | `SWIPES_KEY_PREFIX` | `swipes` | Redis key namespace |
//! | `VOTE_TIMEOUT_MS` | `2000` | per insert attempt |
//! | `VOTE_RETRIES` | `2` | extra attempts after a transient failure |
//! | `RETRY_BACKOFF_MS` | `50` | doubled per retry |
//! | `EVENT_CAPACITY` | `256` | vote event buffer |
//!
//! Logging goes through `tracing`, filtered by `RUST_LOG`.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run against a local Redis.
//! ```sh
//! SWIPES_STORE=redis RUST_LOG=info cargo run --bin swipes -- leaderboard
//! ```
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod feed;
pub mod memory;
pub mod models;
pub mod ranking;
pub mod recorder;
pub mod session;
pub mod state;
pub mod store;
pub mod utils;

pub use database::RedisStore;
pub use error::{AppError, ProfileError, StoreError, VoteError};
pub use events::VoteEvents;
pub use memory::MemoryStore;
pub use models::{
    LeaderboardEntry, Profile, ProfileId, RankedEntry, SubjectStats, Vote, VoterId,
    VoterIdentity,
};
pub use ranking::RankingEngine;
pub use recorder::{RetryPolicy, VoteRecorder};
pub use session::Session;
pub use state::State;
pub use store::VoteStore;
