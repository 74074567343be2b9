//! Access-token record and its storage key

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{SessionError, SessionResult};

/// Separator between the components of a key's string form
pub const KEY_SEPARATOR: char = ':';

/// Identifies one access-token record in both the store and the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessTokenKey {
    kind: String,
    project_id: String,
    user_name: String,
}

impl AccessTokenKey {
    pub fn new(
        kind: impl Into<String>,
        project_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            project_id: project_id.into(),
            user_name: user_name.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// The cache key, `kind:project_id:user_name`
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AccessTokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.kind,
            self.project_id,
            self.user_name,
            sep = KEY_SEPARATOR
        )
    }
}

/// Metadata captured when a user logs in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginMetadata {
    pub device_id: String,
    pub ip: String,
    pub user_agent: String,
    pub kind: String,
    pub info: String,
}

/// One login episode of a user within a project.
///
/// An empty `login_id` means the session was logged out; the record is kept
/// until it is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub project_id: String,
    pub user_name: String,
    pub login_time: DateTime<Utc>,
    pub login_id: String,
    pub device_id: String,
    pub ip: String,
    /// Client type reported at login (`Type` in the cache format)
    pub kind: String,
    pub user_agent: String,
    pub info: String,
}

impl AccessToken {
    /// Build a record for a fresh login
    pub fn new(
        project_id: impl Into<String>,
        user_name: impl Into<String>,
        login_id: impl Into<String>,
        login_time: DateTime<Utc>,
        metadata: LoginMetadata,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_name: user_name.into(),
            login_time,
            login_id: login_id.into(),
            device_id: metadata.device_id,
            ip: metadata.ip,
            kind: metadata.kind,
            user_agent: metadata.user_agent,
            info: metadata.info,
        }
    }

    /// Key of this record for the given entity kind
    pub fn key(&self, kind: &str) -> AccessTokenKey {
        AccessTokenKey::new(kind, self.project_id.clone(), self.user_name.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        !self.login_id.is_empty()
    }

    /// Mark the session as logged out
    pub fn clear_login_id(&mut self) {
        self.login_id.clear();
    }

    /// Login time as nanoseconds since the Unix epoch
    pub fn login_time_nanos(&self) -> SessionResult<i64> {
        self.login_time.timestamp_nanos_opt().ok_or_else(|| {
            SessionError::Invalid(format!(
                "login time {} is outside the nanosecond range",
                self.login_time
            ))
        })
    }

    /// Reject records that cannot be keyed or encoded.
    pub fn validate(&self) -> SessionResult<()> {
        for (field, value) in [("project_id", &self.project_id), ("user_name", &self.user_name)] {
            if value.is_empty() {
                return Err(SessionError::Invalid(format!("{field} must not be empty")));
            }
            if value.contains(KEY_SEPARATOR) {
                return Err(SessionError::Invalid(format!(
                    "{field} must not contain '{KEY_SEPARATOR}'"
                )));
            }
        }
        self.login_time_nanos()?;
        Ok(())
    }
}
