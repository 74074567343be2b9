//! Session models

pub mod access_token;

// Re-export for convenience
pub use access_token::{AccessToken, AccessTokenKey, LoginMetadata};
