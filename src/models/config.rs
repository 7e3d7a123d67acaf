//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::locale::Lang;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client behavior settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Film cache settings for the interactive bot
    #[serde(default)]
    pub cache: CacheConfig,

    /// Notification batching and truncation limits
    #[serde(default)]
    pub notify: NotifyLimits,

    /// Bot behavior settings
    #[serde(default)]
    pub bot: BotConfig,

    /// Cinema source definitions
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SourceConfig>,
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
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.notify.max_new_films == 0 || self.notify.max_updated_films == 0 {
            return Err(AppError::validation("notify film limits must be > 0"));
        }
        if self.notify.showtimes_per_film == 0 || self.notify.showtimes_in_details == 0 {
            return Err(AppError::validation("notify showtime limits must be > 0"));
        }
        if Lang::try_from_code(&self.bot.default_language).is_none() {
            return Err(AppError::validation(format!(
                "bot.default_language '{}' is not a supported locale",
                self.bot.default_language
            )));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.id.trim().is_empty() {
                return Err(AppError::validation(format!("sources[{i}].id is empty")));
            }
            if self.sources[..i].iter().any(|s| s.id == source.id) {
                return Err(AppError::validation(format!(
                    "Duplicate source id '{}'",
                    source.id
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            notify: NotifyLimits::default(),
            bot: BotConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

/// HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between source fetches in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Film cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched program stays fresh, in seconds
    #[serde(default = "defaults::cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::cache_ttl(),
        }
    }
}

/// Notification batching and truncation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyLimits {
    /// Maximum per-film messages for newly added films
    #[serde(default = "defaults::max_films")]
    pub max_new_films: usize,

    /// Maximum per-film messages for updated films
    #[serde(default = "defaults::max_films")]
    pub max_updated_films: usize,

    /// Showtimes displayed per film in change notifications
    #[serde(default = "defaults::showtimes_per_film")]
    pub showtimes_per_film: usize,

    /// Showtimes displayed in the interactive film details view
    #[serde(default = "defaults::showtimes_in_details")]
    pub showtimes_in_details: usize,
}

impl Default for NotifyLimits {
    fn default() -> Self {
        Self {
            max_new_films: defaults::max_films(),
            max_updated_films: defaults::max_films(),
            showtimes_per_film: defaults::showtimes_per_film(),
            showtimes_in_details: defaults::showtimes_in_details(),
        }
    }
}

/// Interactive bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Locale code used when a user has not chosen a language
    #[serde(default = "defaults::default_language")]
    pub default_language: String,

    /// Chat IDs allowed to use /broadcast
    #[serde(default)]
    pub admin_chat_ids: Vec<i64>,

    /// Banner image attached to the welcome message
    #[serde(default = "defaults::welcome_image_url")]
    pub welcome_image_url: Option<String>,
}

impl BotConfig {
    /// Resolved default language.
    pub fn default_lang(&self) -> Lang {
        Lang::from_code(&self.default_language)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            default_language: defaults::default_language(),
            admin_chat_ids: Vec::new(),
            welcome_image_url: defaults::welcome_image_url(),
        }
    }
}

/// Which parser handles a source's program page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScraperKind {
    Meisengeige,
    Filmhaus,
}

/// A cinema program source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable source identifier (e.g. "meisengeige")
    pub id: String,

    /// Human-readable display name
    pub name: String,

    /// URL of the program page
    pub url: String,

    /// Venue name shown when a source reports no room
    pub venue: String,

    /// Parser used for this source's page layout
    pub scraper: ScraperKind,
}

mod defaults {
    use super::{ScraperKind, SourceConfig};

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; kinowatch/1.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        100
    }

    // Cache defaults
    pub fn cache_ttl() -> u64 {
        300
    }

    // Notification defaults
    pub fn max_films() -> usize {
        10
    }
    pub fn showtimes_per_film() -> usize {
        5
    }
    pub fn showtimes_in_details() -> usize {
        10
    }

    // Bot defaults
    pub fn default_language() -> String {
        "ru".into()
    }
    pub fn welcome_image_url() -> Option<String> {
        Some(
            "https://www.cinecitta.de/fileadmin/Seitenbanner/Seitenbanner_Meisengeige.jpg"
                .to_string(),
        )
    }

    // Source defaults
    pub fn default_sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig {
                id: "meisengeige".to_string(),
                name: "Meisengeige".to_string(),
                url: "https://www.cinecitta.de/programm/meisengeige/".to_string(),
                venue: "Cinecitta Nürnberg".to_string(),
                scraper: ScraperKind::Meisengeige,
            },
            SourceConfig {
                id: "kinderkino".to_string(),
                name: "Kinderkino (Filmhaus)".to_string(),
                url: "https://www.kunstkulturquartier.de/filmhaus/programm/kinderkino".to_string(),
                venue: "Filmhaus Nürnberg".to_string(),
                scraper: ScraperKind::Filmhaus,
            },
        ]
    }
}
