use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use huddle_chat::{ChatConfig, GroupDeletePolicy};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me", "secret"];

pub const UPLOAD_URL_PREFIX: &str = "/uploads/chat";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub chat: ChatConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("HUDDLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HUDDLE_JWT_SECRET is unset or still a placeholder; it must match the identity provider's signing secret");
        }

        let host = var("HUDDLE_HOST", "0.0.0.0");
        let port: u16 = var("HUDDLE_PORT", "5000")
            .parse()
            .context("HUDDLE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let max_upload_bytes = var("HUDDLE_MAX_UPLOAD_BYTES", "52428800")
            .parse()
            .context("HUDDLE_MAX_UPLOAD_BYTES must be a byte count")?;

        let group_delete_policy: GroupDeletePolicy = var("HUDDLE_GROUP_DELETE_POLICY", "creator-only")
            .parse()
            .map_err(anyhow::Error::msg)?;

        let typing_ttl_secs: u64 = var("HUDDLE_TYPING_TTL_SECS", "8")
            .parse()
            .context("HUDDLE_TYPING_TTL_SECS must be a number of seconds")?;

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(var("HUDDLE_DB_PATH", "huddle.db")),
            addr,
            upload_dir: PathBuf::from(var("HUDDLE_UPLOAD_DIR", "./uploads/chat")),
            max_upload_bytes,
            chat: ChatConfig {
                group_delete_policy,
                typing_ttl: Duration::from_secs(typing_ttl_secs.max(1)),
                ..ChatConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::from_lookup(lookup(&[("HUDDLE_JWT_SECRET", "a-real-secret")])).unwrap();
        assert_eq!(config.addr.port(), 5000);
        assert_eq!(config.db_path, PathBuf::from("huddle.db"));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.chat.group_delete_policy, GroupDeletePolicy::CreatorOnly);
        assert_eq!(config.chat.typing_ttl, Duration::from_secs(8));
    }

    #[test]
    fn refuses_placeholder_secrets() {
        assert!(ServerConfig::from_lookup(lookup(&[])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("HUDDLE_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HUDDLE_JWT_SECRET", "a-real-secret"),
            ("HUDDLE_PORT", "7000"),
            ("HUDDLE_GROUP_DELETE_POLICY", "any-member"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 7000);
        assert_eq!(config.chat.group_delete_policy, GroupDeletePolicy::AnyMember);

        let bad = ServerConfig::from_lookup(lookup(&[("HUDDLE_JWT_SECRET", "x1"), ("HUDDLE_PORT", "nope")]));
        assert!(bad.is_err());
    }
}
