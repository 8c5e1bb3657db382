use std::sync::LazyLock;

use regex::Regex;

use crate::{error::ProfileError, models::Profile};

pub const MAX_IMAGES: usize = 6;
pub const MAX_BIO_CHARS: usize = 500;

static CONTROL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{Cc}\p{Cf}]").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HTTP_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/?#]+[^\s]*$").unwrap());

/// Strips control characters and collapses whitespace runs. Case is kept, these are names.
pub fn sanitize_display_name(input: &str) -> String {
    let s = SPACES.replace_all(input.trim(), " ");

    CONTROL.replace_all(&s, "").trim().to_string()
}

pub fn validate_profile(profile: &mut Profile) -> Result<(), ProfileError> {
    profile.display_name = sanitize_display_name(&profile.display_name);
    if profile.display_name.is_empty() {
        return Err(ProfileError::EmptyDisplayName);
    }

    let count = profile.images.len();
    if count == 0 || count > MAX_IMAGES {
        return Err(ProfileError::ImageCount {
            count,
            max: MAX_IMAGES,
        });
    }

    if let Some(bad) = profile.images.iter().find(|uri| !HTTP_URI.is_match(uri)) {
        return Err(ProfileError::InvalidImage(bad.clone()));
    }

    // an empty bio is the same as no bio
    profile.bio = profile
        .bio
        .take()
        .map(|bio| bio.trim().to_string())
        .filter(|bio| !bio.is_empty());

    if let Some(bio) = &profile.bio {
        if bio.chars().count() > MAX_BIO_CHARS {
            return Err(ProfileError::BioTooLong { max: MAX_BIO_CHARS });
        }
    }

    Ok(())
}

/// Checked copy of `profile`. Stores persist this, never the caller's value.
pub fn validated(profile: &Profile) -> Result<Profile, ProfileError> {
    let mut profile = profile.clone();
    validate_profile(&mut profile)?;

    Ok(profile)
}

/// Integer percentage, rounded half up, from exact counts.
pub fn approval_percentage(approvals: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }

    let rounded = (200 * approvals + total) / (2 * total);

    Some(rounded.min(100) as u8)
}
