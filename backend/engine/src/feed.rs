//! # Feed
//!
//! Picks the next profile a voter should judge.
//!
//! Policy is first-unseen-in-roster-order: no shuffling, no weighting. The roster is whatever the
//! store returned on this call, so profiles created mid-session show up on their own.
use std::collections::HashSet;

use crate::models::{Profile, ProfileId, VoterIdentity};

/// `None` means the feed is exhausted for this voter. That is a terminal state, not an error.
pub fn next_profile<'a>(
    roster: &'a [Profile],
    identity: Option<&VoterIdentity>,
    judged: &HashSet<ProfileId>,
) -> Option<&'a Profile> {
    let own = identity.and_then(VoterIdentity::profile_id);

    roster
        .iter()
        .find(|profile| Some(&profile.id) != own && !judged.contains(&profile.id))
}
