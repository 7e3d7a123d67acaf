// src/services/filmhaus.rs

//! Scraper for the Filmhaus Kinderkino program page.
//!
//! Events render as `vkList` cards with one screening each. The date line
//! ("Mo / 22.12.2025 / 15:00 Uhr") is reformatted to the "Mo.22.12" label
//! shape the Meisengeige page uses, so showtimes from both sources read the
//! same way. The two labels are still not normalized against each other in
//! any deeper sense.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Film, HttpConfig, Showtime, SourceConfig};
use crate::services::ProgramScraper;
use crate::utils::{http, resolve_url};

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

struct Selectors {
    card: Selector,
    title: Selector,
    poster: Selector,
    description: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: parse_selector("div.vkList")?,
            title: parse_selector("a.detailLink")?,
            poster: parse_selector("img")?,
            description: parse_selector("p")?,
        })
    }
}

/// Scraper for the Kinderkino page layout.
pub struct FilmhausScraper {
    source: SourceConfig,
    client: reqwest::Client,
    base_url: Url,
    selectors: Selectors,
    has_date_re: Regex,
    date_re: Regex,
}

impl FilmhausScraper {
    pub fn new(source: SourceConfig, http: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&source.url)?;
        Ok(Self {
            client: http::create_client(http)?,
            base_url,
            selectors: Selectors::new()?,
            has_date_re: Regex::new(r"\d{2}\.\d{2}\.\d{4}")
                .map_err(|e| AppError::validation(format!("invalid date regex: {e}")))?,
            date_re: Regex::new(r"(\w+)\s*/\s*(\d{2})\.(\d{2})(?:\.\d+)?\s*/\s*(\d{2}:\d{2})")
                .map_err(|e| AppError::validation(format!("invalid date regex: {e}")))?,
            source,
        })
    }

    /// Parse all events from page HTML.
    pub fn parse_films(&self, html: &str) -> Vec<Film> {
        let document = Html::parse_document(html);
        document
            .select(&self.selectors.card)
            .filter_map(|card| self.parse_single_event(&card))
            .collect()
    }

    fn parse_single_event(&self, card: &ElementRef<'_>) -> Option<Film> {
        let title: String = card
            .select(&self.selectors.title)
            .next()?
            .text()
            .collect::<String>()
            .trim()
            .to_string();
        if title.is_empty() {
            return None;
        }

        let poster_url = card
            .select(&self.selectors.poster)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| resolve_url(&self.base_url, src));

        let description = card
            .select(&self.selectors.description)
            .next()
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|d| !d.is_empty());

        // The card text holds a single "day / date / time" line somewhere.
        let showtimes = card
            .text()
            .map(str::trim)
            .find(|text| self.has_date_re.is_match(text))
            .and_then(|text| self.parse_datetime(text))
            .into_iter()
            .collect();

        Some(Film {
            title,
            genres: vec!["Kinderkino".to_string()],
            fsk_rating: None,
            duration: None,
            description,
            poster_url,
            film_id: None,
            showtimes,
        })
    }

    /// Parse "Mo / 22.12.2025 / 15:00 Uhr" into a showtime labeled
    /// "Mo.22.12", dropping the year.
    fn parse_datetime(&self, text: &str) -> Option<Showtime> {
        let caps = self.date_re.captures(text)?;
        let day = caps.get(1)?.as_str();
        let dd = caps.get(2)?.as_str();
        let mm = caps.get(3)?.as_str();
        let time = caps.get(4)?.as_str();

        Some(Showtime {
            date: format!("{day}.{dd}.{mm}"),
            time: time.to_string(),
            room: self.source.venue.clone(),
            language: None,
        })
    }
}

#[async_trait]
impl ProgramScraper for FilmhausScraper {
    fn source_id(&self) -> &str {
        &self.source.id
    }

    async fn scrape(&self) -> Result<Vec<Film>> {
        let response = self
            .client
            .get(&self.source.url)
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;
        Ok(self.parse_films(&html))
    }
}
