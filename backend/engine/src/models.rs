use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ProfileError, utils::validate_profile};

const ANONYMOUS_PREFIX: &str = "anon-";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whoever cast a vote. For signed-in voters this is their own profile id, so the
/// self-vote check is a plain string comparison.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh anonymous id, not linkable to anything else.
    pub fn mint() -> Self {
        Self(format!("{ANONYMOUS_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, subject: &ProfileId) -> bool {
        self.0 == subject.0
    }
}

impl From<ProfileId> for VoterId {
    fn from(id: ProfileId) -> Self {
        Self(id.0)
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoterIdentity {
    Authenticated(ProfileId),
    Anonymous(VoterId),
}

impl VoterIdentity {
    pub fn anonymous() -> Self {
        Self::Anonymous(VoterId::mint())
    }

    pub fn voter_id(&self) -> VoterId {
        match self {
            Self::Authenticated(id) => VoterId::from(id.clone()),
            Self::Anonymous(id) => id.clone(),
        }
    }

    pub fn profile_id(&self) -> Option<&ProfileId> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Anonymous(_) => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Profiles only deserialize through [`Profile::new`], so a roster file or stored row can't carry
/// an invalid profile past the type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawProfile")]
pub struct Profile {
    pub id: ProfileId,
    pub display_name: String,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl Profile {
    /// Builds a profile with a sanitized display name, rejecting anything the roster must not hold.
    pub fn new(
        id: ProfileId,
        display_name: &str,
        images: Vec<String>,
        bio: Option<String>,
    ) -> Result<Self, ProfileError> {
        let mut profile = Self {
            id,
            display_name: display_name.to_string(),
            images,
            bio,
        };

        validate_profile(&mut profile)?;

        Ok(profile)
    }

    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    id: ProfileId,
    display_name: String,
    images: Vec<String>,
    #[serde(default)]
    bio: Option<String>,
}

impl TryFrom<RawProfile> for Profile {
    type Error = ProfileError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        Profile::new(raw.id, &raw.display_name, raw.images, raw.bio)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub voter_id: VoterId,
    pub subject_id: ProfileId,
    pub approve: bool,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(voter_id: VoterId, subject_id: ProfileId, approve: bool) -> Self {
        Self {
            voter_id,
            subject_id,
            approve,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub subject_id: ProfileId,
    pub approval_percentage: u8,
    pub total_votes: u64,
    pub rank: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(flatten)]
    pub ranked: RankedEntry,
    pub display_name: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub approvals: u64,
    pub total_votes: u64,
    pub approval_percentage: Option<u8>,
}
