//! # Portiere (Authenticated Resource Server)
//!
//! `portiere` is a small resource server: clients sign up, exchange
//! credentials for a bearer token, and then perform CRUD operations on named
//! record collections. Every resource operation is mediated by a
//! role-to-capability access-control layer.
//!
//! ## Authentication
//!
//! Two strategies, both resolving to the same [`api::handlers::auth::Principal`]:
//!
//! - **Basic**: username and password, verified against an Argon2id hash.
//! - **Bearer**: an HS256-signed token minted at signup/signin time.
//!
//! Unknown users and wrong passwords collapse into one failure kind so the
//! error surface cannot be used to enumerate accounts.
//!
//! ## Authorization
//!
//! Roles (`user`, `editor`, `admin`) map to a static capability table
//! (`read`, `create`, `update`, `delete`). Every gated route names the
//! capability it requires; the handler body never runs for a principal whose
//! role lacks it.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
