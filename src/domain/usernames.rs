//! Username derivation, validation and profile-change cooldowns.
//!
//! Usernames are derived from display names with `slug::slugify`, reduced to
//! lowercase ASCII alphanumerics, padded to a minimum length with random
//! digits and retried with a short random suffix on collision. The uniqueness
//! check is supplied by the caller so derivation stays pure.

use std::future::Future;

use slug::slugify;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

const MIN_DERIVED_LEN: usize = 6;
const RETRY_BASE_LEN: usize = 10;
const RETRY_SUFFIX_DIGITS: usize = 2;
const MAX_ATTEMPTS: usize = 10;
const MIN_EXPLICIT_LEN: usize = 3;
const MAX_EXPLICIT_LEN: usize = 30;

/// Name and username can each change at most once per window.
pub const NAME_CHANGE_COOLDOWN: Duration = Duration::days(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username source text is empty")]
    EmptyInput,
    #[error("username must be 3-30 characters of a-z, 0-9, `_` or `.`")]
    Invalid,
    #[error("exhausted attempts to find a free username for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum UsernameAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Username(#[from] UsernameError),
    #[error(transparent)]
    Predicate(E),
}

/// Reduce a display name to lowercase alphanumerics.
pub fn derive_base(input: &str) -> Result<String, UsernameError> {
    if input.trim().is_empty() {
        return Err(UsernameError::EmptyInput);
    }

    let base: String = slugify(input)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();

    Ok(base)
}

/// Validate a username chosen explicitly by the user.
pub fn validate_username(candidate: &str) -> Result<String, UsernameError> {
    let normalized = candidate.trim().to_ascii_lowercase();
    let len = normalized.chars().count();
    let allowed = normalized
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '.');

    if !(MIN_EXPLICIT_LEN..=MAX_EXPLICIT_LEN).contains(&len) || !allowed {
        return Err(UsernameError::Invalid);
    }

    Ok(normalized)
}

/// Derive a username from `name`, asking `is_available` before accepting a candidate.
///
/// `digits(n)` must return `n` decimal digits; production callers pass
/// [`random_digits`].
pub async fn generate_username_async<D, F, Fut, E>(
    name: &str,
    mut digits: D,
    mut is_available: F,
) -> Result<String, UsernameAsyncError<E>>
where
    D: FnMut(usize) -> String,
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut base = derive_base(name)?;

    if base.len() < MIN_DERIVED_LEN {
        base.push_str(&digits(MIN_DERIVED_LEN));
        base.truncate(MIN_DERIVED_LEN);
    }

    if is_available(&base)
        .await
        .map_err(UsernameAsyncError::Predicate)?
    {
        return Ok(base);
    }

    let stem: String = base.chars().take(RETRY_BASE_LEN).collect();
    for _ in 0..MAX_ATTEMPTS {
        let candidate = format!("{stem}{}", digits(RETRY_SUFFIX_DIGITS));
        if is_available(&candidate)
            .await
            .map_err(UsernameAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(UsernameAsyncError::Username(UsernameError::Exhausted {
        base,
    }))
}

/// `count` pseudo-random decimal digits drawn from v4 UUID entropy.
pub fn random_digits(count: usize) -> String {
    let mut out = String::with_capacity(count);
    while out.len() < count {
        for byte in Uuid::new_v4().as_bytes() {
            if out.len() == count {
                break;
            }
            // 250 is the largest multiple of 10 below 256.
            if *byte < 250 {
                out.push(char::from(b'0' + byte % 10));
            }
        }
    }
    out
}

/// A rename refused because the previous one is too recent.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{field} can be changed again after {until}")]
pub struct CooldownError {
    pub field: &'static str,
    pub until: OffsetDateTime,
}

/// Returns the moment a change becomes allowed again, or `None` if it is allowed now.
pub fn cooldown_remaining(
    last_change: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Option<OffsetDateTime> {
    let last = last_change?;
    let next = last + NAME_CHANGE_COOLDOWN;
    (now < next).then_some(next)
}

/// Default avatar for users who registered without a profile image.
pub fn default_avatar_url(name: &str) -> String {
    const PALETTE: [&str; 8] = [
        "0d8abc", "7e57c2", "26a69a", "ef6c00", "c2185b", "5d4037", "546e7a", "2e7d32",
    ];

    let initial = name
        .trim()
        .chars()
        .next()
        .map(|ch| ch.to_uppercase().collect::<String>())
        .unwrap_or_else(|| "U".to_string());
    let index = Uuid::new_v4().as_bytes()[0] as usize % PALETTE.len();

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("name", &initial)
        .append_pair("background", PALETTE[index])
        .append_pair("color", "ffffff")
        .append_pair("size", "128")
        .finish();
    format!("https://ui-avatars.com/api/?{query}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::convert::Infallible;

    use time::macros::datetime;

    use super::*;

    fn fixed_digits(seq: &'static str) -> impl FnMut(usize) -> String {
        let mut pos = 0;
        move |n| {
            let out: String = seq.chars().cycle().skip(pos).take(n).collect();
            pos += n;
            out
        }
    }

    #[test]
    fn derive_base_strips_non_alphanumerics() {
        assert_eq!(derive_base("Ada Lovelace!").unwrap(), "adalovelace");
        assert_eq!(derive_base("  ").unwrap_err(), UsernameError::EmptyInput);
    }

    #[tokio::test]
    async fn short_names_are_padded_to_six() {
        let name = generate_username_async("Al", fixed_digits("123456"), |_| async {
            Ok::<_, Infallible>(true)
        })
        .await
        .expect("username");

        assert_eq!(name, "al1234");
    }

    #[tokio::test]
    async fn collisions_retry_with_two_digit_suffix() {
        let taken: HashSet<&str> = ["adalovelace", "adalovelac12"].into_iter().collect();
        let name = generate_username_async("Ada Lovelace", fixed_digits("1234"), |candidate| {
            let free = !taken.contains(candidate);
            async move { Ok::<_, Infallible>(free) }
        })
        .await
        .expect("username");

        assert_eq!(name, "adalovelac34");
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let err = generate_username_async("Grace Hopper", fixed_digits("0"), |_| async {
            Ok::<_, Infallible>(false)
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            UsernameAsyncError::Username(UsernameError::Exhausted { .. })
        ));
    }

    #[test]
    fn explicit_usernames_are_validated() {
        assert_eq!(validate_username(" Ada.L_99 ").unwrap(), "ada.l_99");
        assert_eq!(validate_username("ab").unwrap_err(), UsernameError::Invalid);
        assert_eq!(
            validate_username("has space").unwrap_err(),
            UsernameError::Invalid
        );
    }

    #[test]
    fn random_digits_have_requested_length() {
        let digits = random_digits(40);
        assert_eq!(digits.len(), 40);
        assert!(digits.chars().all(|ch| ch.is_ascii_digit()));
    }

    #[test]
    fn cooldown_blocks_changes_within_ten_days() {
        let last = datetime!(2024-01-01 00:00 UTC);
        assert_eq!(
            cooldown_remaining(Some(last), datetime!(2024-01-05 00:00 UTC)),
            Some(datetime!(2024-01-11 00:00 UTC))
        );
        assert_eq!(
            cooldown_remaining(Some(last), datetime!(2024-01-11 00:00 UTC)),
            None
        );
        assert_eq!(cooldown_remaining(None, last), None);
    }

    #[test]
    fn default_avatar_uses_initial() {
        let url = default_avatar_url("ada");
        assert!(url.starts_with("https://ui-avatars.com/api/?name=A&background="));
    }
}
