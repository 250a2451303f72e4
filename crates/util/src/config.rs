use std::{env, fmt, net::SocketAddr, path::PathBuf, time::Duration};

use super::server_bind_address;

const DEFAULT_CHANNEL_CONFIG_PATH: &str = "config.json";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Twitch application identity used by the OAuth endpoints.
///
/// All three values must be present for the `/auth` flow to operate; a
/// partial set degrades the endpoint rather than producing broken
/// authorize URLs.
#[derive(Debug, Clone)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    /// Shared secret registered with the EventSub subscription; signatures
    /// on inbound webhooks are computed against it.
    pub eventsub_secret: String,
    /// Path of the JSON file holding the channel routing list.
    pub channel_config_path: PathBuf,
    /// Timeout applied to all outbound HTTP calls (Discord, Twitch).
    pub http_timeout: Duration,
    pub twitch: Option<TwitchCredentials>,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    ///
    /// Fails closed when `EVENTSUB_SECRET` is absent: without it no inbound
    /// notification could ever be authenticated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let eventsub_secret =
            env::var("EVENTSUB_SECRET").map_err(|_| ConfigError::MissingEventsubSecret)?;
        if eventsub_secret.is_empty() {
            return Err(ConfigError::MissingEventsubSecret);
        }

        let channel_config_path = env::var("CHANNEL_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CHANNEL_CONFIG_PATH));

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidHttpTimeout(raw.clone()))?;
                if secs == 0 {
                    return Err(ConfigError::InvalidHttpTimeout(raw));
                }
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let twitch = match (
            env::var("TWITCH_CLIENT_ID"),
            env::var("TWITCH_CLIENT_SECRET"),
            env::var("TWITCH_REDIRECT_URI"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(redirect_uri))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(TwitchCredentials {
                    client_id,
                    client_secret,
                    redirect_uri,
                })
            }
            _ => None,
        };

        Ok(Self {
            bind_addr,
            environment,
            eventsub_secret,
            channel_config_path,
            http_timeout,
            twitch,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingEventsubSecret,
    InvalidHttpTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingEventsubSecret => {
                write!(f, "EVENTSUB_SECRET must be set to a non-empty value")
            }
            Self::InvalidHttpTimeout(value) => write!(
                f,
                "HTTP_TIMEOUT_SECS must be a positive number of seconds (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
