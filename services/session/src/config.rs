//! Session manager configuration

use std::time::Duration;

use crate::error::{SessionError, SessionResult};

/// Default entity kind used as the first key component
pub const DEFAULT_ITEM_KIND: &str = "AccessToken";

/// Default lifetime of a cached record
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_secs(3600);

/// Default upper bound for a single cache call
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(200);

/// Configuration for a [`SessionManager`](crate::SessionManager)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Project (tenant) whose sessions this manager owns
    pub project_id: String,
    /// Entity kind, first component of every key
    pub item_kind: String,
    /// Expiration applied to cache entries; `None` keeps them until evicted
    pub cache_expiration: Option<Duration>,
    /// Upper bound for each cache call, independent of the request deadline
    pub cache_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration for `project_id` with default values
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            item_kind: DEFAULT_ITEM_KIND.to_string(),
            cache_expiration: Some(DEFAULT_CACHE_EXPIRATION),
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
        }
    }

    /// Create a new SessionConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_PROJECT_ID`: Project owning the sessions (required)
    /// - `SESSION_ITEM_KIND`: Entity kind (default: "AccessToken")
    /// - `SESSION_CACHE_EXPIRATION`: Cache TTL in seconds, 0 for none (default: 3600)
    /// - `SESSION_CACHE_TIMEOUT_MS`: Cache call timeout in milliseconds (default: 200)
    pub fn from_env() -> SessionResult<Self> {
        let project_id = std::env::var("SESSION_PROJECT_ID").unwrap_or_default();

        let item_kind = std::env::var("SESSION_ITEM_KIND")
            .ok()
            .filter(|kind| !kind.is_empty())
            .unwrap_or_else(|| DEFAULT_ITEM_KIND.to_string());

        let cache_expiration = std::env::var("SESSION_CACHE_EXPIRATION")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| (secs > 0).then(|| Duration::from_secs(secs)))
            .unwrap_or(Some(DEFAULT_CACHE_EXPIRATION));

        let cache_timeout = std::env::var("SESSION_CACHE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CACHE_TIMEOUT);

        let config = SessionConfig {
            project_id,
            item_kind,
            cache_expiration,
            cache_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_item_kind(mut self, kind: impl Into<String>) -> Self {
        self.item_kind = kind.into();
        self
    }

    /// Cache entries expire after `expiration`; zero means they never do.
    pub fn with_cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache_expiration = (!expiration.is_zero()).then_some(expiration);
        self
    }

    /// Cache entries never expire on their own
    pub fn without_cache_expiration(mut self) -> Self {
        self.cache_expiration = None;
        self
    }

    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Check that keys can be built from this configuration.
    pub fn validate(&self) -> SessionResult<()> {
        for (name, value) in [("project_id", &self.project_id), ("item_kind", &self.item_kind)] {
            if value.is_empty() {
                return Err(SessionError::Invalid(format!("{name} must not be empty")));
            }
            if value.contains(crate::models::access_token::KEY_SEPARATOR) {
                return Err(SessionError::Invalid(format!(
                    "{name} must not contain the key separator"
                )));
            }
        }
        if self.cache_expiration.is_some_and(|ttl| ttl.is_zero()) {
            return Err(SessionError::Invalid(
                "cache_expiration must be positive, use None for no expiry".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            std::env::remove_var("SESSION_PROJECT_ID");
            std::env::remove_var("SESSION_ITEM_KIND");
            std::env::remove_var("SESSION_CACHE_EXPIRATION");
            std::env::remove_var("SESSION_CACHE_TIMEOUT_MS");
        }
    }

    #[test]
    #[serial]
    fn test_session_config_from_env_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("SESSION_PROJECT_ID", "shop");
        }

        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.project_id, "shop");
        assert_eq!(config.item_kind, DEFAULT_ITEM_KIND);
        assert_eq!(config.cache_expiration, Some(DEFAULT_CACHE_EXPIRATION));
        assert_eq!(config.cache_timeout, DEFAULT_CACHE_TIMEOUT);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_session_config_from_env_with_custom_values() {
        clear_env();
        unsafe {
            std::env::set_var("SESSION_PROJECT_ID", "shop");
            std::env::set_var("SESSION_ITEM_KIND", "LoginToken");
            std::env::set_var("SESSION_CACHE_EXPIRATION", "0");
            std::env::set_var("SESSION_CACHE_TIMEOUT_MS", "50");
        }

        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.item_kind, "LoginToken");
        assert_eq!(config.cache_expiration, None);
        assert_eq!(config.cache_timeout, Duration::from_millis(50));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_session_config_requires_project() {
        clear_env();
        assert!(matches!(
            SessionConfig::from_env(),
            Err(SessionError::Invalid(_))
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let config = SessionConfig::new("shop")
            .with_cache_expiration(Duration::from_secs(5))
            .with_cache_timeout(Duration::from_millis(10));
        assert_eq!(config.cache_expiration, Some(Duration::from_secs(5)));
        assert_eq!(config.without_cache_expiration().cache_expiration, None);
        assert!(SessionConfig::new("a:b").validate().is_err());
    }

    #[test]
    fn test_zero_cache_expiration_means_no_expiry() {
        let config = SessionConfig::new("shop").with_cache_expiration(Duration::ZERO);
        assert_eq!(config.cache_expiration, None);
        assert!(config.validate().is_ok());

        let config = SessionConfig {
            cache_expiration: Some(Duration::ZERO),
            ..SessionConfig::new("shop")
        };
        assert!(matches!(config.validate(), Err(SessionError::Invalid(_))));
    }
}
