//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskview_api::client::{DEFAULT_BASE_URL, SERVER_ENV_VAR};
use taskview_core::SubscriptionConfig;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV_VAR: &str = "TASKVIEW_CONFIG_PATH";

/// Configuration for taskview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the task service
    pub server: Option<String>,
    /// Dark theme; light when false
    pub dark_mode: Option<bool>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Stream timing overrides
    pub subscription: SubscriptionSettings,
}

/// Optional overrides of the subscription timing, in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    pub max_retries: Option<u32>,
    pub retry_delay_secs: Option<f64>,
    pub poll_interval_secs: Option<f64>,
    pub heartbeat_interval_secs: Option<f64>,
}

/// Longest accepted timing override, in seconds
const MAX_SECS: f64 = 86_400.0;

fn secs(value: Option<f64>, default: Duration) -> Duration {
    value
        .filter(|s| *s > 0.0 && *s <= MAX_SECS)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .unwrap_or(default)
}

impl SubscriptionSettings {
    pub fn to_config(&self) -> SubscriptionConfig {
        let defaults = SubscriptionConfig::default();
        SubscriptionConfig {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: secs(self.retry_delay_secs, defaults.retry_delay),
            poll_interval: secs(self.poll_interval_secs, defaults.poll_interval),
            heartbeat_interval: secs(self.heartbeat_interval_secs, defaults.heartbeat_interval),
        }
    }
}

/// Pick the server URL: command line, then environment, then config file
pub fn resolve_server(cli: Option<String>, env: Option<String>, config: Option<String>) -> String {
    let set = |value: Option<String>| value.filter(|s| !s.trim().is_empty());
    set(cli)
        .or_else(|| set(env))
        .or_else(|| set(config))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskview")
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV_VAR) {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file; a missing or broken file yields defaults
    pub fn load() -> Self {
        match Self::load_from(&Self::config_path()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}", e);
                Self::default()
            }
        }
    }

    /// Read the file at `path`. A missing file is the default config; an
    /// unreadable or unparsable one is an error.
    pub fn load_from(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            io::Error::new(e.kind(), format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            server: Some(DEFAULT_BASE_URL.to_string()),
            dark_mode: Some(true),
            tui: Some(true),
            subscription: SubscriptionSettings::default(),
        };
        default_config.save()?;
        Ok(path)
    }

    pub fn server_url(&self, cli: Option<String>) -> String {
        resolve_server(cli, std::env::var(SERVER_ENV_VAR).ok(), self.server.clone())
    }

    pub fn is_dark(&self) -> bool {
        self.dark_mode.unwrap_or(true)
    }

    /// Persist the theme choice, keeping everything else in the file
    pub fn persist_dark_mode(dark: bool) -> io::Result<()> {
        Self::persist_dark_mode_at(&Self::config_path(), dark)
    }

    /// A file that doesn't parse is left untouched
    pub fn persist_dark_mode_at(path: &Path, dark: bool) -> io::Result<()> {
        let mut config = Self::load_from(path)?;
        config.dark_mode = Some(dark);
        config.save_to(path)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# taskview configuration file
# Place at ~/.config/taskview/config.toml (Linux/Mac) or %APPDATA%\taskview\config.toml (Windows)
# or point TASKVIEW_CONFIG_PATH at another file.

# Task service base URL (TASKVIEW_SERVER and --server take precedence)
server = "http://localhost:8000"

# Dark theme; set to false for the light theme (also --dark / --light)
dark_mode = true

# Whether to use TUI mode by default
tui = true

# Event stream timing (optional)
[subscription]
# max_retries = 3
# retry_delay_secs = 2
# poll_interval_secs = 10
# heartbeat_interval_secs = 5
"#
}
