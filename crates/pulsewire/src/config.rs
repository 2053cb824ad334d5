//! Server configuration, loaded from defaults or environment variables.

use std::time::Duration;

use pulsewire_session::SessionPolicy;

use crate::PulsewireError;

/// Address to listen on (`host:port`).
pub const ENV_BIND: &str = "PULSEWIRE_BIND";
/// Seconds without inbound traffic before a connection is dropped.
pub const ENV_IDLE_TIMEOUT_SECS: &str = "PULSEWIRE_IDLE_TIMEOUT_SECS";
/// `multi` or `single`.
pub const ENV_SESSION_POLICY: &str = "PULSEWIRE_SESSION_POLICY";

/// Runtime settings for a [`PulsewireServer`](crate::PulsewireServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the websocket listener binds to.
    pub bind_addr: String,
    /// How long a connection may stay silent before it is torn down.
    /// Clients keep it alive with `ping`.
    pub idle_timeout: Duration,
    /// What happens when an identity connects a second time.
    pub session_policy: SessionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(60),
            session_policy: SessionPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `PULSEWIRE_*` environment variables.
    /// Unset variables keep their default.
    ///
    /// # Errors
    /// [`PulsewireError::Config`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self, PulsewireError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable
    /// source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, PulsewireError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND) {
            let addr = addr.trim();
            if addr.is_empty() {
                return Err(PulsewireError::Config(format!("{ENV_BIND} is empty")));
            }
            config.bind_addr = addr.to_string();
        }

        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                PulsewireError::Config(format!(
                    "{ENV_IDLE_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            if secs == 0 {
                return Err(PulsewireError::Config(format!(
                    "{ENV_IDLE_TIMEOUT_SECS} must be greater than zero"
                )));
            }
            config.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_SESSION_POLICY) {
            config.session_policy = raw
                .parse()
                .map_err(|e| PulsewireError::Config(format!("{ENV_SESSION_POLICY}: {e}")))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_nothing_set_returns_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.session_policy, SessionPolicy::MultiConnection);
    }

    #[test]
    fn test_from_lookup_all_set_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_IDLE_TIMEOUT_SECS, "15"),
            (ENV_SESSION_POLICY, "single"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.session_policy, SessionPolicy::SingleConnection);
    }

    #[test]
    fn test_from_lookup_bad_timeout_returns_config_error() {
        for bad in ["soon", "-5", "0"] {
            let err =
                ServerConfig::from_lookup(lookup(&[(ENV_IDLE_TIMEOUT_SECS, bad)]))
                    .unwrap_err();
            assert!(matches!(err, PulsewireError::Config(_)), "{bad}");
        }
    }

    #[test]
    fn test_from_lookup_unknown_policy_returns_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[(ENV_SESSION_POLICY, "many")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_SESSION_POLICY));
    }
}
