//! Argon2id password hashing.
//!
//! Hashes carry their own salt and parameters in PHC string format, so the
//! work factor can be raised later without invalidating stored records.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

/// Hash a plaintext password into a PHC string.
///
/// # Errors
///
/// Fails only when the hashing primitive itself fails, which callers treat
/// as an internal error rather than bad input.
pub fn hash(plaintext: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);

    Ok(Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)?
        .to_string())
}

/// Verify a plaintext password against a stored PHC string.
///
/// An unparseable stored hash verifies as `false`; the comparison itself is
/// delegated to the argon2 primitive.
#[must_use]
pub fn verify(plaintext: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    })
}
