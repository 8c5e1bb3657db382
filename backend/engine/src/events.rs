use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::trace;

use crate::models::Vote;

/// Fan-out of successfully recorded votes, for collaborators that want live leaderboard updates
/// instead of polling. Voting never waits on subscribers.
#[derive(Clone)]
pub struct VoteEvents {
    sender: Sender<Vote>,
}

impl VoteEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<Vote> {
        self.sender.subscribe()
    }

    pub fn publish(&self, vote: &Vote) {
        // no receivers is the common case
        if let Ok(receivers) = self.sender.send(vote.clone()) {
            trace!("Vote event delivered to {receivers} subscribers");
        }
    }
}
