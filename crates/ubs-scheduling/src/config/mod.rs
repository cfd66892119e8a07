use chrono::FixedOffset;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

const ENV_KEY: &str = "APP_ENV";
const HOST_KEY: &str = "APP_HOST";
const PORT_KEY: &str = "APP_PORT";
const LOG_LEVEL_KEY: &str = "APP_LOG_LEVEL";
const UTC_OFFSET_KEY: &str = "APP_UTC_OFFSET_HOURS";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
/// Brasília time, where the clinic network runs.
const DEFAULT_UTC_OFFSET_HOURS: &str = "-3";

/// Deployment stage; drives log formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl FromStr for AppEnvironment {
    type Err = std::convert::Infallible;

    /// Unknown stages fall back to development.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        })
    }
}

/// Everything the scheduling service reads from its environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    /// Reads `.env` when present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = lookup(ENV_KEY)
            .map(|raw| raw.parse().unwrap_or(AppEnvironment::Development))
            .unwrap_or(AppEnvironment::Development);

        let port = match lookup(PORT_KEY) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let offset = lookup(UTC_OFFSET_KEY).unwrap_or_else(|| DEFAULT_UTC_OFFSET_HOURS.to_string());

        Ok(Self {
            environment,
            server: ServerConfig {
                host: lookup(HOST_KEY).unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            },
            telemetry: TelemetryConfig {
                log_level: lookup(LOG_LEVEL_KEY).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            },
            scheduling: SchedulingConfig::from_offset_hours(&offset)?,
        })
    }
}

fn lookup(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Listener address for the HTTP API.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost {
                    host: self.host.clone(),
                    source,
                })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Calendar settings for the clinic network.
///
/// Appointments are stored in UTC; "today", "tomorrow" and patient ages are
/// computed on the clinic's local calendar, which is this fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingConfig {
    pub utc_offset: FixedOffset,
}

impl SchedulingConfig {
    pub fn from_offset_hours(raw: &str) -> Result<Self, ConfigError> {
        raw.trim()
            .parse::<i32>()
            .ok()
            .and_then(|hours| hours.checked_mul(3600))
            .and_then(FixedOffset::east_opt)
            .map(|utc_offset| Self { utc_offset })
            .ok_or_else(|| ConfigError::InvalidUtcOffset(raw.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a port number (got '{0}')")]
    InvalidPort(String),
    #[error("APP_HOST must be `localhost` or an IP address (got '{host}')")]
    InvalidHost {
        host: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("APP_UTC_OFFSET_HOURS must be whole hours between -23 and 23 (got '{0}')")]
    InvalidUtcOffset(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let guard = LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env mutex poisoned");
        for key in [ENV_KEY, HOST_KEY, PORT_KEY, LOG_LEVEL_KEY, UTC_OFFSET_KEY] {
            env::remove_var(key);
        }
        guard
    }

    #[test]
    fn defaults_target_a_local_brasilia_deployment() {
        let _env = env_lock();
        let config = AppConfig::load().expect("defaults load");

        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(
            config.server.socket_addr().expect("default address"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000)
        );
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.scheduling.utc_offset.local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn localhost_binds_the_loopback_address() {
        let _env = env_lock();
        env::set_var(HOST_KEY, "LocalHost");
        env::set_var(PORT_KEY, "8081");
        let config = AppConfig::load().expect("config loads");

        assert_eq!(
            config.server.socket_addr().expect("localhost resolves"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8081)
        );
    }

    #[test]
    fn bad_values_are_reported_with_the_raw_input() {
        let _env = env_lock();
        env::set_var(UTC_OFFSET_KEY, "30");
        match AppConfig::load() {
            Err(ConfigError::InvalidUtcOffset(value)) => assert_eq!(value, "30"),
            other => panic!("expected offset error, got {other:?}"),
        }

        env::remove_var(UTC_OFFSET_KEY);
        env::set_var(PORT_KEY, "70000");
        let error = AppConfig::load().expect_err("port out of range");
        assert!(error.to_string().contains("70000"));
        env::remove_var(PORT_KEY);
    }

    #[test]
    fn stage_names_are_case_insensitive() {
        assert_eq!("PROD".parse::<AppEnvironment>(), Ok(AppEnvironment::Production));
        assert_eq!(" ci ".parse::<AppEnvironment>(), Ok(AppEnvironment::Test));
        assert_eq!("staging".parse::<AppEnvironment>(), Ok(AppEnvironment::Development));
    }
}
