//! Configuration management for pixelbadge.
//!
//! Loads configuration from ${PIXELBADGE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Environment variable that overrides `base_url` at load time.
pub const BASE_URL_ENV: &str = "PIXELBADGE_BASE_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments/sections from the template are always present,
/// while the user's customized values are preserved.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for pixelbadge configuration and data files.
    //!
    //! PIXELBADGE_HOME resolution order:
    //! 1. PIXELBADGE_HOME environment variable (if set)
    //! 2. ~/.config/pixelbadge (default)

    use std::path::PathBuf;

    pub const HOME_ENV: &str = "PIXELBADGE_HOME";

    pub const CONFIG_FILE: &str = "config.toml";
    pub const AUTH_FILE: &str = "auth_token.json";
    pub const FAVORITES_FILE: &str = "favorite_animations.json";
    pub const LOGS_DIR: &str = "logs";

    /// Returns the pixelbadge home directory.
    pub fn home() -> PathBuf {
        if let Ok(home) = std::env::var(HOME_ENV) {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".pixelbadge"),
            |h| h.join(".config").join("pixelbadge"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        home().join(CONFIG_FILE)
    }

    /// Returns the path to the persisted credential file.
    pub fn auth_path() -> PathBuf {
        home().join(AUTH_FILE)
    }

    /// Returns the path to the local favorites list.
    pub fn favorites_path() -> PathBuf {
        home().join(FAVORITES_FILE)
    }

    /// Returns the directory for log files.
    pub fn logs_dir() -> PathBuf {
        home().join(LOGS_DIR)
    }
}

/// Retry budgets per operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub gallery_attempts: u32,
    pub thumbnail_attempts: u32,
    pub frame_attempts: u32,
    pub login_code_attempts: u32,
    pub favorite_attempts: u32,
    /// Sleep between failed attempts.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            gallery_attempts: 30,
            thumbnail_attempts: 15,
            frame_attempts: 30,
            login_code_attempts: 10,
            favorite_attempts: 15,
            backoff_ms: 1000,
        }
    }
}

impl RetryConfig {
    fn policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    pub fn gallery(&self) -> RetryPolicy {
        self.policy(self.gallery_attempts)
    }

    pub fn thumbnail(&self) -> RetryPolicy {
        self.policy(self.thumbnail_attempts)
    }

    pub fn frame(&self) -> RetryPolicy {
        self.policy(self.frame_attempts)
    }

    pub fn login_code(&self) -> RetryPolicy {
        self.policy(self.login_code_attempts)
    }

    pub fn favorite(&self) -> RetryPolicy {
        self.policy(self.favorite_attempts)
    }
}

/// Scheduler-facing intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub connectivity_poll_ms: u64,
    pub chain_yield_ms: u64,
    pub login_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connectivity_poll_ms: 200,
            chain_yield_ms: 200,
            login_poll_ms: 5000,
        }
    }
}

impl TimingConfig {
    pub fn connectivity_poll(&self) -> Duration {
        Duration::from_millis(self.connectivity_poll_ms)
    }

    pub fn chain_yield(&self) -> Duration {
        Duration::from_millis(self.chain_yield_ms)
    }

    pub fn login_poll(&self) -> Duration {
        Duration::from_millis(self.login_poll_ms)
    }
}

/// Held-button repeat timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub repeat_delay_ms: u64,
    pub repeat_interval_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            repeat_delay_ms: 500,
            repeat_interval_ms: 200,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gallery API server
    pub base_url: String,

    /// Website shown on the website screen
    pub website_url: String,

    /// Request images in the raw packed RGB format
    pub image_fallback: bool,

    /// Download all frames of a sequence in one request
    pub fastload: bool,

    /// Frame time for sequences that do not declare one
    pub default_frame_time_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub input: InputConfig,
}

impl Config {
    const DEFAULT_BASE_URL: &str = "https://badge.pixelbadge.xyz";
    const DEFAULT_WEBSITE_URL: &str = "https://pixelbadge.xyz";
    const DEFAULT_FRAME_TIME_MS: u64 = 200;

    /// Loads configuration from the default config path, then applies
    /// environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `PIXELBADGE_BASE_URL` if it is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            let trimmed = base_url.trim();
            if !trimmed.is_empty() {
                self.base_url = trimmed.to_string();
            }
        }
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the base_url field to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or written.
    pub fn save_base_url_to(path: &Path, base_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["base_url"] = value(base_url);

        Self::write_config(path, &doc.to_string())
    }

    /// Frame time used when a sequence does not declare a positive one.
    pub fn default_frame_time(&self) -> Duration {
        Duration::from_millis(self.default_frame_time_ms)
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            website_url: Self::DEFAULT_WEBSITE_URL.to_string(),
            image_fallback: true,
            fastload: true,
            default_frame_time_ms: Self::DEFAULT_FRAME_TIME_MS,
            retry: RetryConfig::default(),
            timing: TimingConfig::default(),
            input: InputConfig::default(),
        }
    }
}
