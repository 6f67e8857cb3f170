//! Bearer token codec.
//!
//! Compact JWS-shaped tokens signed with HMAC-SHA256 under a process-wide
//! secret: `base64url(header).base64url(claims).base64url(mac)`. The secret
//! is constructor state, never ambient, so multiple codecs with different
//! secrets can coexist in one process.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Signed claims. `sub` carries the username; `exp` is only present when the
/// codec was built with a TTL, and verification ignores expiry when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone)]
pub struct TokenCodec {
    secret: SecretString,
    ttl_seconds: Option<u64>,
}

impl TokenCodec {
    /// Build a codec from the signing secret. `ttl_seconds` of zero disables
    /// expiry, matching tokens that predate the TTL knob.
    #[must_use]
    pub fn new(secret: SecretString, ttl_seconds: u64) -> Self {
        Self {
            secret,
            ttl_seconds: (ttl_seconds > 0).then_some(ttl_seconds),
        }
    }

    /// Sign a fresh token bound to `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if claim serialization or MAC setup fails.
    pub fn sign(&self, username: &str) -> Result<String, TokenError> {
        self.sign_at(username, unix_now())
    }

    /// Sign with an explicit issue time, kept separate so tests can pin the
    /// clock.
    ///
    /// # Errors
    ///
    /// Returns an error if claim serialization or MAC setup fails.
    pub fn sign_at(&self, username: &str, now_unix_seconds: i64) -> Result<String, TokenError> {
        let claims = Claims {
            sub: username.to_string(),
            iat: now_unix_seconds,
            exp: self
                .ttl_seconds
                .map(|ttl| now_unix_seconds.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX))),
        };

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token and return its decoded claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is structurally malformed, carries an
    /// unsupported algorithm, fails the signature check, or has expired.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify against an explicit clock.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::verify`].
    pub fn verify_at(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        if parts.next().is_some() {
            return Err(TokenError::TokenFormat);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        // Mac::verify_slice is constant-time over the tag comparison.
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if let Some(exp) = claims.exp {
            if exp <= now_unix_seconds {
                return Err(TokenError::Expired);
            }
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Key)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn codec(secret: &str, ttl: u64) -> TokenCodec {
        TokenCodec::new(SecretString::from(secret.to_string()), ttl)
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), TokenError> {
        let codec = codec("keyboard cat", 0);
        let token = codec.sign_at("admin", NOW)?;

        let claims = codec.verify_at(&token, NOW)?;
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, None);
        Ok(())
    }

    #[test]
    fn no_ttl_token_never_expires() -> Result<(), TokenError> {
        let codec = codec("keyboard cat", 0);
        let token = codec.sign_at("admin", NOW)?;

        // Ten years later, still fine.
        let claims = codec.verify_at(&token, NOW + 10 * 365 * 24 * 3600)?;
        assert_eq!(claims.sub, "admin");
        Ok(())
    }

    #[test]
    fn ttl_token_expires() -> Result<(), TokenError> {
        let codec = codec("keyboard cat", 60);
        let token = codec.sign_at("admin", NOW)?;

        assert!(codec.verify_at(&token, NOW + 30).is_ok());
        assert!(matches!(
            codec.verify_at(&token, NOW + 61),
            Err(TokenError::Expired)
        ));
        Ok(())
    }

    #[test]
    fn rejects_tampered_token() -> Result<(), TokenError> {
        let codec = codec("keyboard cat", 0);
        let token = codec.sign_at("admin", NOW)?;

        // Flip one character in the middle of the signature.
        let mut bytes = token.into_bytes();
        let index = bytes.len() - 10;
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).map_err(|_| TokenError::Base64)?;

        assert!(matches!(
            codec.verify_at(&tampered, NOW),
            Err(TokenError::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn rejects_foreign_secret() -> Result<(), TokenError> {
        let token = codec("keyboard cat", 0).sign_at("admin", NOW)?;

        assert!(matches!(
            codec("another secret", 0).verify_at(&token, NOW),
            Err(TokenError::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        let codec = codec("keyboard cat", 0);

        assert!(matches!(
            codec.verify_at("", NOW),
            Err(TokenError::TokenFormat)
        ));
        assert!(matches!(
            codec.verify_at("only.two", NOW),
            Err(TokenError::TokenFormat)
        ));
        assert!(matches!(
            codec.verify_at("a.b.c.d", NOW),
            Err(TokenError::TokenFormat)
        ));
        assert!(codec.verify_at("!!!.???.###", NOW).is_err());
    }

    #[test]
    fn rejects_unsupported_algorithm() -> Result<(), TokenError> {
        let codec = codec("keyboard cat", 0);
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = Base64UrlUnpadded::encode_string(br#"{"sub":"admin","iat":0}"#);
        let token = format!("{header}.{claims}.");

        assert!(matches!(
            codec.verify_at(&token, NOW),
            Err(TokenError::UnsupportedAlg(alg)) if alg == "none"
        ));
        Ok(())
    }
}
