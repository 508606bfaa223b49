use anyhow::Context;
use match_engine::EngineConfig;
use matchmaking::QueueConfig;
use settlement::SettlementConfig;
use std::net::SocketAddr;

/// Gateway settings; everything else uses the service defaults
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    /// Outbound messages buffered per socket
    pub session_buffer: usize,
    pub queue: QueueConfig,
    pub engine: EngineConfig,
    pub settlement: SettlementConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: "dev-secret".to_string(),
            session_buffer: 128,
            queue: QueueConfig::default(),
            engine: EngineConfig::default(),
            settlement: SettlementConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by `ARENA_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(bind) = lookup("ARENA_BIND") {
            config.bind = bind.parse().with_context(|| format!("ARENA_BIND={}", bind))?;
        }
        if let Some(secret) = lookup("ARENA_JWT_SECRET") {
            anyhow::ensure!(!secret.is_empty(), "ARENA_JWT_SECRET is empty");
            config.jwt_secret = secret;
        }
        if let Some(buffer) = lookup("ARENA_SESSION_BUFFER") {
            config.session_buffer = buffer.parse().with_context(|| format!("ARENA_SESSION_BUFFER={}", buffer))?;
        }
        if let Some(seed) = lookup("ARENA_BOT_SEED") {
            config.queue.bot_seed = Some(seed.parse().with_context(|| format!("ARENA_BOT_SEED={}", seed))?);
        }
        if let Some(window) = lookup("ARENA_RESUME_WINDOW_MS") {
            config.engine.resume_window_ms =
                window.parse().with_context(|| format!("ARENA_RESUME_WINDOW_MS={}", window))?;
        }
        if let Some(retention) = lookup("ARENA_ENDED_RETENTION_MS") {
            config.engine.ended_retention_ms =
                retention.parse().with_context(|| format!("ARENA_ENDED_RETENTION_MS={}", retention))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("ARENA_BIND", "127.0.0.1:9000"),
            ("ARENA_JWT_SECRET", "s3cret"),
            ("ARENA_BOT_SEED", "7"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.queue.bot_seed, Some(7));
        assert_eq!(config.engine.resume_window_ms, 120_000);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(GatewayConfig::from_lookup(lookup(&[("ARENA_BIND", "nowhere")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[("ARENA_JWT_SECRET", "")])).is_err());
    }
}
