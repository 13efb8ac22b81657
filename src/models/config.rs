// src/models/config.rs

//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TitleId;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Polling loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// HTTP and scraping behavior settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Where releases and subscriptions are persisted
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tracked titles and their sources
    #[serde(default = "defaults::default_titles")]
    pub titles: Vec<TitleConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.interval_minutes == 0 {
            return Err(AppError::validation(
                "orchestrator.interval_minutes must be > 0",
            ));
        }
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::validation("scraper.timeout_secs must be > 0"));
        }
        if self.scraper.max_concurrent == 0 {
            return Err(AppError::validation("scraper.max_concurrent must be > 0"));
        }
        if self.notifier.max_concurrent_deliveries == 0 {
            return Err(AppError::validation(
                "notifier.max_concurrent_deliveries must be > 0",
            ));
        }
        if self.notifier.kind == NotifierKind::Discord
            && self
                .notifier
                .discord_token
                .as_deref()
                .is_none_or(|t| t.trim().is_empty())
        {
            return Err(AppError::validation(
                "notifier.discord_token is required for the discord notifier",
            ));
        }
        if self.titles.is_empty() {
            return Err(AppError::validation("No titles defined"));
        }

        let mut seen = HashSet::new();
        for title in &self.titles {
            let id = TitleId::new(&title.name);
            if id.as_str().is_empty() {
                return Err(AppError::validation("title name is empty"));
            }
            if !seen.insert(id.clone()) {
                return Err(AppError::validation(format!("Duplicate title '{id}'")));
            }
            title.validate()?;
        }
        Ok(())
    }

    /// Storage directory resolved against a base path.
    pub fn storage_path(&self, base_path: &Path) -> PathBuf {
        base_path.join(&self.storage.dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            scraper: ScraperConfig::default(),
            storage: StorageConfig::default(),
            notifier: NotifierConfig::default(),
            logging: LoggingConfig::default(),
            titles: defaults::default_titles(),
        }
    }
}

/// Polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Minutes to sleep between cycles
    #[serde(default = "defaults::interval_minutes")]
    pub interval_minutes: u64,

    /// Fan out releases left unnotified by a previous run before the first cycle
    #[serde(default = "defaults::notify_pending_on_startup")]
    pub notify_pending_on_startup: bool,
}

impl OrchestratorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::interval_minutes(),
            notify_pending_on_startup: defaults::notify_pending_on_startup(),
        }
    }
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum titles scraped concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay after each finished scrape in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::storage_dir")]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
        }
    }
}

/// Which notification backend delivers messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Discord,
    #[default]
    Log,
}

/// Notification delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub kind: NotifierKind,

    /// Bot token; `${VAR}` is resolved from the environment
    #[serde(default)]
    pub discord_token: Option<String>,

    /// Category channel that groups the per-title channels
    #[serde(default = "defaults::category_name")]
    pub category_name: String,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Maximum deliveries in flight for one release
    #[serde(default = "defaults::max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::default(),
            discord_token: None,
            category_name: defaults::category_name(),
            api_base: defaults::api_base(),
            max_concurrent_deliveries: defaults::max_concurrent_deliveries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// A tracked title and where to scrape its newest chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConfig {
    /// Canonical name (case-insensitive)
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Page listing the title's chapters
    pub source_url: String,

    /// CSS selector for the newest chapter link
    #[serde(default = "defaults::chapter_selector")]
    pub selector: String,

    /// Attribute holding the chapter URL
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Regex with the release number in group 1 and the sub-number in group 2
    #[serde(default = "defaults::chapter_pattern")]
    pub chapter_pattern: String,
}

impl TitleConfig {
    /// Create a title entry with the default selector and pattern.
    pub fn new(name: &str, description: &str, source_url: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            source_url: source_url.to_string(),
            selector: defaults::chapter_selector(),
            link_attr: defaults::link_attr(),
            chapter_pattern: defaults::chapter_pattern(),
        }
    }

    pub fn id(&self) -> TitleId {
        TitleId::new(&self.name)
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source_url)?;
        scraper::Selector::parse(&self.selector)
            .map_err(|e| AppError::selector(&self.selector, e))?;
        let pattern = regex::Regex::new(&self.chapter_pattern)?;
        if pattern.captures_len() < 2 {
            return Err(AppError::validation(format!(
                "chapter_pattern for '{}' needs a capture group for the release number",
                self.name
            )));
        }
        Ok(())
    }
}

mod defaults {
    use super::TitleConfig;

    // Orchestrator defaults
    pub fn interval_minutes() -> u64 {
        15
    }
    pub fn notify_pending_on_startup() -> bool {
        true
    }

    // Scraper defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; vrn/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        5
    }

    pub fn storage_dir() -> String {
        "storage".into()
    }

    // Notifier defaults
    pub fn category_name() -> String {
        "Notifications".into()
    }
    pub fn api_base() -> String {
        "https://discord.com/api/v10".into()
    }
    pub fn max_concurrent_deliveries() -> usize {
        8
    }

    pub fn log_level() -> String {
        "info".into()
    }

    // Title source defaults (Manganelo chapter list)
    pub fn chapter_selector() -> String {
        "div.panel-story-chapter-list ul.row-content-chapter > li.a-h > a".into()
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn chapter_pattern() -> String {
        r"chapter-(\d{1,4})\.*(\d{0,4})".into()
    }

    pub fn default_titles() -> Vec<TitleConfig> {
        vec![
            TitleConfig::new(
                "sololeveling",
                "Solo Leveling",
                "https://manganelo.com/manga/pn918005",
            ),
            TitleConfig::new(
                "talesofdemonsandgods",
                "Tales of Demons and Gods",
                "https://manganelo.com/manga/hyer5231574354229",
            ),
            TitleConfig::new(
                "martialpeak",
                "Martial Peak",
                "https://manganelo.com/manga/martial_peak",
            ),
            TitleConfig::new(
                "jujutsukaisen",
                "Jujutsu Kaisen",
                "https://manganelo.com/manga/jujutsu_kaisen",
            ),
            TitleConfig::new(
                "skeletonsoldier",
                "Skeleton Soldier Couldn't Protect the Dungeon",
                "https://manganelo.com/manga/upzw279201556843676",
            ),
            TitleConfig::new("drstone", "Dr. Stone", "https://manganelo.com/manga/dr_stone"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.scraper.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.scraper.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_titles() {
        let mut config = Config::default();
        config.titles.push(TitleConfig::new(
            "DrStone",
            "again",
            "https://manganelo.com/manga/dr_stone",
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.titles[0].selector = "div[".to_string();
        assert!(matches!(
            config.validate(),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn validate_requires_discord_token() {
        let mut config = Config::default();
        config.notifier.kind = NotifierKind::Discord;
        assert!(config.validate().is_err());
        config.notifier.discord_token = Some("${DISCORD_TOKEN}".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [orchestrator]
            interval_minutes = 5

            [notifier]
            kind = "discord"
            discord_token = "abc"

            [[titles]]
            name = "SoloLeveling"
            source_url = "https://manganelo.com/manga/pn918005"
            "#,
        )
        .unwrap();

        assert_eq!(config.orchestrator.interval(), Duration::from_secs(300));
        assert!(config.orchestrator.notify_pending_on_startup);
        assert_eq!(config.notifier.kind, NotifierKind::Discord);
        assert_eq!(config.titles.len(), 1);
        assert_eq!(config.titles[0].id().as_str(), "sololeveling");
        assert_eq!(config.titles[0].link_attr, "href");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_file_and_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[storage]\ndir = \"data\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.dir, "data");
        assert_eq!(config.titles.len(), 6);
        assert_eq!(
            config.storage_path(Path::new("/srv")),
            PathBuf::from("/srv/data")
        );

        let fallback = Config::load_or_default(tmp.path().join("missing.toml"));
        assert_eq!(fallback.storage.dir, "storage");
    }
}
