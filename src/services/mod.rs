// src/services/mod.rs

//! Cinema program sources and their scrapers.

pub mod cache;
pub mod filmhaus;
pub mod meisengeige;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Config, Film, HttpConfig, ScraperKind, SourceConfig};

// Re-export for convenience
pub use cache::{Clock, FilmCache, SystemClock};
pub use filmhaus::FilmhausScraper;
pub use meisengeige::MeisengeigeScraper;

/// A program scraper for one cinema source.
///
/// Scrapers are black-box producers of film listings; everything behind
/// `scrape` (selectors, page quirks) stays inside the implementation.
#[async_trait]
pub trait ProgramScraper: Send + Sync {
    fn source_id(&self) -> &str;

    /// Fetch and parse the current program.
    async fn scrape(&self) -> Result<Vec<Film>>;
}

/// Registry of configured cinema sources.
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
    http: HttpConfig,
}

impl SourceRegistry {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sources: config.sources.clone(),
            http: config.http.clone(),
        }
    }

    /// All registered sources, in configuration order.
    pub fn list(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == source_id)
    }

    pub fn has_source(&self, source_id: &str) -> bool {
        self.get(source_id).is_some()
    }

    /// Construct the scraper for a source.
    pub fn scraper(&self, source_id: &str) -> Result<Box<dyn ProgramScraper>> {
        let source = self
            .get(source_id)
            .ok_or_else(|| AppError::UnknownSource(source_id.to_string()))?;

        Ok(match source.scraper {
            ScraperKind::Meisengeige => {
                Box::new(MeisengeigeScraper::new(source.clone(), &self.http)?)
            }
            ScraperKind::Filmhaus => Box::new(FilmhausScraper::new(source.clone(), &self.http)?),
        })
    }
}
