use anyhow::Result;

// ============================================================================
// Configuration Constants
// ============================================================================

// Default bind values
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

// Unread counters are a pure cache over the message store; a short TTL keeps
// staleness bounded while a miss always falls back to an authoritative scan.
const DEFAULT_UNREAD_CACHE_TTL_SECS: u64 = 60;

// Pagination defaults for the activity-cursor message feed
const DEFAULT_PAGE_LIMIT: usize = 100;
const DEFAULT_MAX_PAGE_LIMIT: usize = 500;

// Message body length limit (characters)
const DEFAULT_MAX_MESSAGE_LEN: usize = 200;

/// Maximum length of a group display name; auto-generated names longer than
/// this are truncated to `MAX_GROUP_NAME_LEN - 3` characters plus `...`.
pub const MAX_GROUP_NAME_LEN: usize = 20;

// ============================================================================
// Configuration Structure
// ============================================================================

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Time-to-live for cached unread counters (seconds)
    pub unread_cache_ttl_secs: u64,
    /// Default number of messages returned by a list call
    pub default_page_limit: usize,
    /// Hard cap on the number of messages returned by a list call
    pub max_page_limit: usize,
    /// Maximum message body length in characters
    pub max_message_len: usize,
    /// Avatar assigned to freshly created group conversations
    pub default_group_avatar_url: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            unread_cache_ttl_secs: std::env::var("UNREAD_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_UNREAD_CACHE_TTL_SECS),
            default_page_limit: std::env::var("DEFAULT_PAGE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PAGE_LIMIT),
            max_page_limit: std::env::var("MAX_PAGE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_PAGE_LIMIT),
            max_message_len: std::env::var("MAX_MESSAGE_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_MESSAGE_LEN),
            default_group_avatar_url: std::env::var("DEFAULT_GROUP_AVATAR_URL")
                .unwrap_or_default(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            unread_cache_ttl_secs: DEFAULT_UNREAD_CACHE_TTL_SECS,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            default_group_avatar_url: String::new(),
            rust_log: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.default_page_limit <= config.max_page_limit);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }
}
