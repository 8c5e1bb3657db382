use thiserror::Error;

/// What a [`VoteStore`](crate::store::VoteStore) reports back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Vote already recorded for this voter and subject")]
    Duplicate,

    #[error("Store unavailable: {0}")]
    Transient(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Rejected profile: {0}")]
    Invalid(#[from] ProfileError),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::TypeError => StoreError::Corrupt(err.to_string()),
            _ => StoreError::Transient(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("Voters cannot rate their own profile")]
    SelfVoteRejected,

    #[error("You have already rated this profile")]
    DuplicateVote,

    #[error("Failed to record your vote: {0}")]
    TransientStoreError(String),

    #[error(transparent)]
    Store(StoreError),
}

impl VoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, VoteError::TransientStoreError(_))
    }
}

impl From<StoreError> for VoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => VoteError::DuplicateVote,
            StoreError::Transient(reason) => VoteError::TransientStoreError(reason),
            other => VoteError::Store(other),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Display name is empty")]
    EmptyDisplayName,

    #[error("Profiles need between 1 and {max} images, got {count}")]
    ImageCount { count: usize, max: usize },

    #[error("Image is not an http(s) URI: {0}")]
    InvalidImage(String),

    #[error("Bio is longer than {max} characters")]
    BioTooLong { max: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to read secret {name}: {source}")]
    Secret {
        name: String,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vote(#[from] VoteError),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification() {
        assert_eq!(VoteError::from(StoreError::Duplicate), VoteError::DuplicateVote);
        assert!(VoteError::from(StoreError::Transient("down".into())).is_retryable());
        assert!(!VoteError::from(StoreError::Corrupt("bad".into())).is_retryable());
        assert!(!VoteError::SelfVoteRejected.is_retryable());
        assert!(!VoteError::DuplicateVote.is_retryable());
        assert!(
            !VoteError::from(StoreError::Invalid(ProfileError::EmptyDisplayName)).is_retryable()
        );
    }
}
