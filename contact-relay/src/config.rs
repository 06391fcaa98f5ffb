use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Environment variable holding the bot token
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the comma separated chat identifiers
pub const CHAT_IDS_ENV: &str = "TELEGRAM_CHAT_IDS";

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_MS: u64 = 8000;
const DEFAULT_ENDPOINT_PATH: &str = "/contact";
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Endpoint path must start with '/': {0:?}")]
    InvalidEndpointPath(String),

    #[error("Upstream timeout cannot be 0")]
    ZeroTimeout,

    #[error("Maximum body size cannot be 0")]
    ZeroBodyLimit,
}

/// Relay configuration
///
/// Built once at startup and shared read-only with every request. Missing
/// Telegram credentials are not a validation error: the relay still starts,
/// reports not-ready on the admin listener and answers contact requests with
/// a server-misconfigured error.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for contact form submissions
    #[serde(default)]
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    #[serde(default = "Listener::default_admin")]
    pub admin_listener: Listener,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Validates the relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.endpoint.validate()?;
        self.telegram.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    fn default_admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8081,
        }
    }

    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Where the contact endpoint is mounted and how much body it accepts
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub path: String,
    pub max_body_bytes: usize,
}

impl EndpointConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidEndpointPath(self.path.clone()));
        }
        if self.max_body_bytes == 0 {
            return Err(ValidationError::ZeroBodyLimit);
        }
        Ok(())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_ENDPOINT_PATH.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Telegram Bot API settings
///
/// `bot_token` and `chat_ids` are usually supplied through the environment
/// rather than the config file; see `contactd` for the overrides.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    /// Base URL of the Bot API
    pub api_url: Url,
    /// Per-recipient bound on a single `sendMessage` call
    pub timeout_ms: u64,
    pub bot_token: Option<String>,
    /// Comma separated list of chat identifiers
    pub chat_ids: Option<String>,
}

impl TelegramConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        Ok(())
    }

    /// The bot token, if one is configured and not blank.
    pub fn bot_token(&self) -> Option<&str> {
        self.bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Recipient chat identifiers in configuration order.
    ///
    /// Entries are trimmed and blank entries dropped, so `"111, 222,"`
    /// yields two recipients.
    pub fn recipients(&self) -> Vec<String> {
        self.chat_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }

    /// Whether both a credential and at least one recipient are present.
    pub fn is_configured(&self) -> bool {
        self.bot_token().is_some() && !self.recipients().is_empty()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            bot_token: None,
            chat_ids: None,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_url", &self.api_url.as_str())
            .field("timeout_ms", &self.timeout_ms)
            .field("bot_token", &self.bot_token().map(|_| "***REDACTED***"))
            .field("chat_ids", &self.chat_ids)
            .finish()
    }
}
