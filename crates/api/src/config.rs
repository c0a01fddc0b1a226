use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use staybook_auth::DEFAULT_TTL_SECS;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub cache_ttl: Duration,
    /// Period of the expired-entry sweep; `None` disables it.
    pub cache_sweep: Option<std::time::Duration>,
    /// Unset means an empty in-memory grant store.
    pub database_url: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = match get("BIND_ADDR") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: v,
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let cache_ttl = match get("AUTHZ_CACHE_TTL_SECS") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|s| *s > 0)
                .and_then(Duration::try_seconds)
                .ok_or(ConfigError::Invalid {
                    name: "AUTHZ_CACHE_TTL_SECS",
                    value: v,
                })?,
            None => Duration::seconds(DEFAULT_TTL_SECS),
        };

        let cache_sweep = match get("AUTHZ_CACHE_SWEEP_SECS") {
            Some(v) => Some(
                v.parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .map(std::time::Duration::from_secs)
                    .ok_or(ConfigError::Invalid {
                        name: "AUTHZ_CACHE_SWEEP_SECS",
                        value: v,
                    })?,
            ),
            None => None,
        };

        let database_url = get("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; grants live in memory and start empty");
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            cache_ttl,
            cache_sweep,
            database_url,
        })
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            cache_ttl: Duration::seconds(DEFAULT_TTL_SECS),
            cache_sweep: None,
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.cache_ttl, Duration::seconds(120));
        assert!(cfg.cache_sweep.is_none());
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = ApiConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("AUTHZ_CACHE_TTL_SECS", "30"),
            ("AUTHZ_CACHE_SWEEP_SECS", "60"),
            ("DATABASE_URL", "postgres://localhost/staybook"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.cache_ttl, Duration::seconds(30));
        assert_eq!(cfg.cache_sweep, Some(std::time::Duration::from_secs(60)));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/staybook"));
    }

    #[test]
    fn rejects_zero_ttl() {
        let err = ApiConfig::from_lookup(lookup(&[("AUTHZ_CACHE_TTL_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("AUTHZ_CACHE_TTL_SECS"));
    }

    #[test]
    fn rejects_ttl_beyond_duration_range() {
        for value in ["9223372036854775807", "9223372036854776"] {
            let err = ApiConfig::from_lookup(lookup(&[("AUTHZ_CACHE_TTL_SECS", value)])).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid { name: "AUTHZ_CACHE_TTL_SECS", .. }
            ));
        }
    }
}
