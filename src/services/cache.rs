// src/services/cache.rs

//! Program cache for the interactive bot.
//!
//! Owns `(source_id) -> (films, fetched_at)` with an explicit TTL and an
//! injectable clock. A failed fetch falls back to stale data when any
//! exists, so a flaky source page degrades to slightly old listings instead
//! of an error message.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::Film;
use crate::services::ProgramScraper;

/// Time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    films: Vec<Film>,
    fetched_at: Instant,
}

/// TTL cache over scraped film listings.
pub struct FilmCache {
    ttl: Duration,
    clock: Box<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FilmCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Box::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return cached films while fresh; otherwise fetch through the scraper.
    pub async fn get_or_fetch(&self, scraper: &dyn ProgramScraper) -> Result<Vec<Film>> {
        let source_id = scraper.source_id().to_string();
        let now = self.clock.now();

        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&source_id) {
                let age = now.duration_since(entry.fetched_at);
                if age < self.ttl {
                    log::debug!("Using cached films for {source_id} (age {}s)", age.as_secs());
                    return Ok(entry.films.clone());
                }
            }
        }

        match scraper.scrape().await {
            Ok(films) => {
                let mut entries = self.entries.lock().await;
                entries.insert(
                    source_id,
                    CacheEntry {
                        films: films.clone(),
                        fetched_at: now,
                    },
                );
                Ok(films)
            }
            Err(error) => {
                let entries = self.entries.lock().await;
                if let Some(entry) = entries.get(&source_id) {
                    log::warn!("Fetch for {source_id} failed ({error}); serving stale data");
                    return Ok(entry.films.clone());
                }
                Err(error)
            }
        }
    }
}
