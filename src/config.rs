use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub groups_file: String,
    pub urls_file: String,
    pub lock_timeout_ms: u64,
    pub stale_lock_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub request_timeout: u64,
    pub user_agent: String,
    pub max_concurrent_checks: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub min_confidence: f32,
    pub use_browser: bool,
    #[serde(default)]
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            groups_file: "groups.json".to_string(),
            urls_file: "urls.json".to_string(),
            lock_timeout_ms: 10_000,
            stale_lock_secs: 600,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent_checks: 4,
            retry_attempts: 1,
            retry_delay_ms: 500,
            min_confidence: 0.5,
            use_browser: true,
            chrome_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: Some(PathBuf::from("update_prices.log")),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            scraper: ScraperConfig::default(),
            notifications: NotificationsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn groups_path(&self) -> PathBuf {
        self.data_dir.join(&self.groups_file)
    }

    pub fn urls_path(&self) -> PathBuf {
        self.data_dir.join(&self.urls_file)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(".prisbevakaren.lock")
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Longest a single fetch may legitimately take: every HTTP attempt
    /// timing out plus the delays between them. Doubled for render requests,
    /// which run a browser render before the HTTP fallback.
    pub fn fetch_budget(&self, render: bool) -> Duration {
        let budget =
            self.request_timeout() * (self.retry_attempts + 1) + self.retry_delay() * self.retry_attempts;
        if render && self.use_browser {
            budget * 2
        } else {
            budget
        }
    }
}

impl AppConfig {
    /// Loads configuration from `config_dir` (`default`, `{RUN_MODE}` and
    /// `local` files, all optional) and `PRISBEVAKAREN__*` environment
    /// variables on top of the built-in defaults.
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let defaults = AppConfig::default();

        let s = Config::builder()
            .set_default("store.data_dir", defaults.store.data_dir.to_string_lossy().to_string())?
            .set_default("store.groups_file", defaults.store.groups_file)?
            .set_default("store.urls_file", defaults.store.urls_file)?
            .set_default("store.lock_timeout_ms", defaults.store.lock_timeout_ms as i64)?
            .set_default("store.stale_lock_secs", defaults.store.stale_lock_secs as i64)?
            .set_default("scraper.request_timeout", defaults.scraper.request_timeout as i64)?
            .set_default("scraper.user_agent", defaults.scraper.user_agent)?
            .set_default("scraper.max_concurrent_checks", defaults.scraper.max_concurrent_checks as i64)?
            .set_default("scraper.retry_attempts", defaults.scraper.retry_attempts as i64)?
            .set_default("scraper.retry_delay_ms", defaults.scraper.retry_delay_ms as i64)?
            .set_default("scraper.min_confidence", defaults.scraper.min_confidence as f64)?
            .set_default("scraper.use_browser", defaults.scraper.use_browser)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.log_file", "update_prices.log")?
            // Add default, environment-specific and local config files
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables with prefix "PRISBEVAKAREN_"
            .add_source(
                Environment::with_prefix("PRISBEVAKAREN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_fallbacks(&mut self) {
        if self.scraper.chrome_path.is_none() {
            self.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        if self.notifications.webhook_url.is_none() {
            self.notifications.webhook_url = env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|value| !value.trim().is_empty());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.groups_file.trim().is_empty() || self.store.urls_file.trim().is_empty() {
            return Err(ConfigError::Message("Store file names cannot be empty".into()));
        }

        if self.store.groups_file == self.store.urls_file {
            return Err(ConfigError::Message("Store groups_file and urls_file must differ".into()));
        }

        if self.store.lock_timeout_ms == 0 {
            return Err(ConfigError::Message("Store lock_timeout_ms must be greater than 0".into()));
        }

        if self.store.stale_lock_secs == 0 {
            return Err(ConfigError::Message("Store stale_lock_secs must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.max_concurrent_checks == 0 {
            return Err(ConfigError::Message("Scraper max_concurrent_checks must be greater than 0".into()));
        }

        if !(self.scraper.min_confidence > 0.0 && self.scraper.min_confidence <= 1.0) {
            return Err(ConfigError::Message("Scraper min_confidence must be in (0, 1]".into()));
        }

        if let Some(webhook_url) = &self.notifications.webhook_url {
            match Url::parse(webhook_url) {
                Ok(url) if url.scheme() == "https" || url.scheme() == "http" => {}
                _ => return Err(ConfigError::Message("Invalid notification webhook URL".into())),
            }
        }

        Ok(())
    }
}
