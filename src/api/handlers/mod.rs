pub mod health;
pub use self::health::health;

pub mod auth;
pub mod collections;

// common functions for the handlers
use regex::Regex;

/// Usernames are short identifiers, not free text. Uniqueness is
/// case-sensitive, so `Admin` and `admin` are distinct accounts.
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,63}$").map_or(false, |re| re.is_match(username))
}
