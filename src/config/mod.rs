//! Configuration management for saved-feed.
//!
//! Configuration is read from `~/.config/saved-feed/config.toml` unless a
//! path is given explicitly. If the default file doesn't exist, a commented
//! template is written there so the credentials can be filled in.

use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";
pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_SITE_ORIGIN: &str = "https://reddit.com";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reddit: RedditConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

/// Application and account credentials for the Reddit API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub app_id: String,
    pub app_secret: String,
    pub api_url: String,
    pub token_url: String,
    /// Prefix for the site-relative permalinks of posts.
    pub site_origin: String,
    pub timeout_secs: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            user_agent: String::new(),
            app_id: String::new(),
            app_secret: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            site_origin: DEFAULT_SITE_ORIGIN.to_string(),
            timeout_secs: 10,
        }
    }
}

impl RedditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Interval between synchronization cycles, e.g. "15m", "1h".
    pub update_interval: String,
    /// Database file; defaults to the platform data directory.
    pub database: Option<PathBuf>,
    /// When set, the rendered feed is written here after every cycle.
    pub export_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            update_interval: "15m".to_string(),
            database: None,
            export_path: None,
        }
    }
}

impl CacheConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_interval(&self.update_interval)
            .map(Duration::from_secs)
            .map_err(ConfigError::Invalid)
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match self.database {
            Some(ref path) => Ok(path.clone()),
            None => {
                let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
                Ok(data_dir.join("saved-feed").join("posts.db"))
            }
        }
    }
}

/// HTTP endpoint serving the feed. Disabled unless `listen` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. "127.0.0.1:8080".
    pub listen: Option<String>,
    /// Secret path segment: the feed is served at `/rss/reddit/<key>`.
    pub rss_access_key: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: None,
            rss_access_key: String::new(),
            request_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.listen
            .as_deref()
            .map(|listen| {
                listen
                    .parse::<SocketAddr>()
                    .map_err(|e| ConfigError::Invalid(format!("server.listen `{}`: {}", listen, e)))
            })
            .transpose()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// If the default config file doesn't exist, a template is created and
    /// validation then reports the missing account name. Missing fields use
    /// default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::default_config_path()?;
                if !default_path.exists() {
                    Self::create_default_config(&default_path)?;
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config = Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;
        config.validate()?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get the default config file path: `~/.config/saved-feed/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("saved-feed").join("config.toml"))
    }

    /// Checks what every command needs: the account name and a usable
    /// interval. Credentials are checked separately by
    /// [`Config::validate_credentials`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.username.trim().is_empty() {
            return Err(ConfigError::Missing("reddit.username"));
        }
        self.cache.interval()?;
        if self.server.listen_addr()?.is_some() {
            let key = self.server.rss_access_key.trim();
            if key.is_empty() {
                return Err(ConfigError::Missing("server.rss_access_key"));
            }
            if key.contains('/') {
                return Err(ConfigError::Invalid(
                    "server.rss_access_key must not contain '/'".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Checks that everything needed to talk to the API is present.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        let required = [
            ("reddit.username", &self.reddit.username),
            ("reddit.password", &self.reddit.password),
            ("reddit.user_agent", &self.reddit.user_agent),
            ("reddit.app_id", &self.reddit.app_id),
            ("reddit.app_secret", &self.reddit.app_secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }
        Ok(())
    }

    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# saved-feed configuration
#
# Create a "script" application at https://www.reddit.com/prefs/apps and
# fill in its id and secret along with the account credentials.

[reddit]
username = ""
password = ""
user_agent = "saved-feed/0.1 (by /u/your-username)"
app_id = ""
app_secret = ""

# api_url = "https://oauth.reddit.com"
# token_url = "https://www.reddit.com/api/v1/access_token"
# site_origin = "https://reddit.com"
# timeout_secs = 10

[cache]
# How often to pull new saved items ("90s", "15m", "1h", "1d")
update_interval = "15m"

# database = "/var/lib/saved-feed/posts.db"
# export_path = "/var/www/feeds/saved.xml"

[server]
# Serve the feed over HTTP at /rss/reddit/<rss_access_key> while the daemon runs
# listen = "127.0.0.1:8080"
# rss_access_key = "change-me"
# request_timeout_secs = 60
"##
    }
}

/// Parse interval string like "1h", "30m", "6h", "1d"
pub fn parse_interval(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();

    let parsed = if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map_err(|_| format!("Invalid hours: {}", hours))
            .and_then(|h| scale(h, 3600))
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map_err(|_| format!("Invalid minutes: {}", minutes))
            .and_then(|m| scale(m, 60))
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map_err(|_| format!("Invalid days: {}", days))
            .and_then(|d| scale(d, 86400))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '15m', '1h', '1d'", s))
    };

    match parsed {
        Ok(0) => Err("Interval must be greater than zero".to_string()),
        other => other,
    }
}

fn scale(value: u64, unit_secs: u64) -> Result<u64, String> {
    value
        .checked_mul(unit_secs)
        .ok_or_else(|| "Interval too large".to_string())
}

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing required setting `{0}`")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}
