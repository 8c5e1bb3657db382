use std::sync::Arc;

use tracing::info;

use super::{
    config::{Config, StoreKind},
    database::RedisStore,
    error::AppError,
    events::VoteEvents,
    memory::MemoryStore,
    ranking::RankingEngine,
    recorder::VoteRecorder,
    store::VoteStore,
};

/// Process-wide wiring. Holds no per-voter state; that lives in each [`Session`](crate::session::Session).
pub struct State {
    pub config: Config,
    pub store: Arc<dyn VoteStore>,
    pub recorder: VoteRecorder,
    pub ranking: RankingEngine,
    pub events: VoteEvents,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let store: Arc<dyn VoteStore> = match config.store {
            StoreKind::Memory => {
                info!("Using in-memory vote store");
                Arc::new(MemoryStore::new())
            }
            StoreKind::Redis => {
                info!("Using Redis vote store");
                Arc::new(
                    RedisStore::connect(
                        &config.redis_url,
                        &config.key_prefix,
                        config.vote_retries as usize,
                        config.vote_timeout,
                    )
                    .await?,
                )
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn VoteStore>) -> Arc<Self> {
        let events = VoteEvents::new(config.event_capacity);
        let recorder =
            VoteRecorder::new(store.clone(), config.retry_policy()).with_events(events.clone());
        let ranking = RankingEngine::new(store.clone());

        Arc::new(Self {
            config,
            store,
            recorder,
            ranking,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        models::{Profile, ProfileId},
        session::Session,
    };

    fn config() -> Config {
        Config {
            store: StoreKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "test".to_string(),
            vote_timeout: Duration::from_millis(100),
            vote_retries: 0,
            retry_backoff: Duration::from_millis(1),
            event_capacity: 16,
        }
    }

    #[tokio::test]
    async fn test_memory_state_end_to_end() {
        let state = State::new(config()).await.unwrap();
        for id in ["A", "B", "C"] {
            let profile = Profile::new(
                ProfileId::new(id),
                id,
                vec![format!("https://img.test/{id}.png")],
                None,
            )
            .unwrap();
            state.store.upsert_profile(&profile).await.unwrap();
        }
        let mut events = state.events.subscribe();

        let mut session = Session::new();
        session.sign_in(ProfileId::new("B"), &*state.store).await.unwrap();

        let mut approve = true;
        while let Some(next) = session.next(&*state.store).await.unwrap() {
            session.swipe(&state.recorder, &next.id, approve).await.unwrap();
            approve = !approve;
        }

        assert_eq!(events.recv().await.unwrap().subject_id.as_str(), "A");
        assert_eq!(events.recv().await.unwrap().subject_id.as_str(), "C");

        let board = state.ranking.leaderboard().await.unwrap();
        let order: Vec<(&str, u8)> = board
            .iter()
            .map(|e| (e.ranked.subject_id.as_str(), e.ranked.approval_percentage))
            .collect();
        assert_eq!(order, [("A", 100), ("C", 0)]);
    }
}
