// src/services/meisengeige.rs

//! Scraper for the Cinecitta Meisengeige program page.
//!
//! The page renders one `<li>` container per film, with showtimes in a table
//! whose header row carries the dates and whose body rows carry one room
//! each. A film that fails to parse is skipped, never the whole page.

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

/// Text content of the first match, trimmed; `None` when missing or empty.
fn select_text(scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text: String = scope.select(selector).next()?.text().collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

struct Selectors {
    container: Selector,
    title: Selector,
    genre: Selector,
    fsk: Selector,
    clock: Selector,
    description: Selector,
    poster: Selector,
    showtime_section: Selector,
    table: Selector,
    header_cell: Selector,
    row: Selector,
    room_header: Selector,
    room_name: Selector,
    release_type: Selector,
    time_text: Selector,
    cell: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            container: parse_selector("li.filmapi-container__list--li")?,
            title: parse_selector("h3.text-white")?,
            genre: parse_selector("span.px-2.bg-petrol-50")?,
            fsk: parse_selector(r#"span[class*="age-rating--"]"#)?,
            clock: parse_selector("i.icon-clock")?,
            description: parse_selector("p.leading-tight")?,
            poster: parse_selector("img")?,
            showtime_section: parse_selector("div.show_playing_times__content--inner")?,
            table: parse_selector("table.film-list-table")?,
            header_cell: parse_selector("thead th")?,
            row: parse_selector("tbody tr")?,
            room_header: parse_selector("th")?,
            room_name: parse_selector("div.font-semibold")?,
            release_type: parse_selector("div.release-types span")?,
            time_text: parse_selector("a.performance-link span.link-text")?,
            cell: parse_selector("td")?,
        })
    }
}

/// Scraper for the Meisengeige page layout.
pub struct MeisengeigeScraper {
    source: SourceConfig,
    client: reqwest::Client,
    base_url: Url,
    selectors: Selectors,
    duration_re: Regex,
    time_re: Regex,
}

impl MeisengeigeScraper {
    pub fn new(source: SourceConfig, http: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&source.url)?;
        Ok(Self {
            client: http::create_client(http)?,
            base_url,
            selectors: Selectors::new()?,
            duration_re: Regex::new(r"(\d+)\s*min")
                .map_err(|e| AppError::validation(format!("invalid duration regex: {e}")))?,
            time_re: Regex::new(r"^\d{1,2}:\d{2}")
                .map_err(|e| AppError::validation(format!("invalid time regex: {e}")))?,
            source,
        })
    }

    /// Parse all films from page HTML.
    pub fn parse_films(&self, html: &str) -> Vec<Film> {
        let document = Html::parse_document(html);
        document
            .select(&self.selectors.container)
            .filter_map(|container| self.parse_single_film(&container))
            .collect()
    }

    fn parse_single_film(&self, container: &ElementRef<'_>) -> Option<Film> {
        // A film without a title is unusable; skip the container.
        let title = select_text(container, &self.selectors.title)?;

        let film_id = container
            .value()
            .attr("id")
            .map(|id| id.trim_start_matches("film-").to_string())
            .filter(|id| !id.is_empty());

        let genres: Vec<String> = container
            .select(&self.selectors.genre)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();

        let fsk_rating = select_text(container, &self.selectors.fsk);
        let duration = self.parse_duration(container);
        let description = select_text(container, &self.selectors.description);

        let poster_url = container
            .select(&self.selectors.poster)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| resolve_url(&self.base_url, src));

        Some(Film {
            title,
            genres,
            fsk_rating,
            duration,
            description,
            poster_url,
            film_id,
            showtimes: self.parse_showtimes(container),
        })
    }

    /// Running time is the number next to the clock icon, e.g. "87 min".
    fn parse_duration(&self, container: &ElementRef<'_>) -> Option<u32> {
        let icon = container.select(&self.selectors.clock).next()?;
        let parent = icon.parent().and_then(ElementRef::wrap)?;
        let text: String = parent.text().collect();
        self.duration_re
            .captures(&text)?
            .get(1)?
            .as_str()
            .parse()
            .ok()
    }

    fn parse_showtimes(&self, container: &ElementRef<'_>) -> Vec<Showtime> {
        let mut showtimes = Vec::new();

        let Some(section) = container.select(&self.selectors.showtime_section).next() else {
            return showtimes;
        };
        let Some(table) = section.select(&self.selectors.table).next() else {
            return showtimes;
        };

        // Header row: first cell is the room column, the rest are dates.
        let dates: Vec<String> = table
            .select(&self.selectors.header_cell)
            .skip(1)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if dates.is_empty() {
            return showtimes;
        }

        for row in table.select(&self.selectors.row) {
            let Some(room_header) = row.select(&self.selectors.room_header).next() else {
                continue;
            };
            let room = select_text(&room_header, &self.selectors.room_name)
                .unwrap_or_else(|| "Unknown".to_string());
            let language = select_text(&room_header, &self.selectors.release_type);

            for (idx, cell) in row.select(&self.selectors.cell).enumerate() {
                if idx >= dates.len() {
                    break;
                }
                let Some(time) = select_text(&cell, &self.selectors.time_text) else {
                    continue;
                };
                if self.time_re.is_match(&time) {
                    showtimes.push(Showtime {
                        date: dates[idx].clone(),
                        time,
                        room: room.clone(),
                        language: language.clone(),
                    });
                }
            }
        }

        showtimes
    }
}

#[async_trait]
impl ProgramScraper for MeisengeigeScraper {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScraperKind;

    fn test_scraper() -> MeisengeigeScraper {
        let source = SourceConfig {
            id: "meisengeige".into(),
            name: "Meisengeige".into(),
            url: "https://www.cinecitta.de/programm/meisengeige/".into(),
            venue: "Cinecitta Nürnberg".into(),
            scraper: ScraperKind::Meisengeige,
        };
        MeisengeigeScraper::new(source, &HttpConfig::default()).unwrap()
    }

    const SAMPLE: &str = r#"
        <ul>
          <li class="filmapi-container__list--li" id="film-2887">
            <img src="/fileadmin/poster.jpg" />
            <h3 class="text-white">Das Kanu des Manitu</h3>
            <span class="px-2 bg-petrol-50">Komödie</span>
            <span class="age-rating--12">FSK 12</span>
            <div><i class="icon-clock"></i> 87 min</div>
            <p class="leading-tight">Abahachi muss das Kanu finden.</p>
            <div class="show_playing_times__content--inner">
              <table class="film-list-table">
                <thead>
                  <tr><th>Saal</th><th>Mo.15.12</th><th>Di.16.12</th></tr>
                </thead>
                <tbody>
                  <tr>
                    <th>
                      <div class="font-semibold">Kino 2</div>
                      <div class="release-types"><span>OmU</span></div>
                    </th>
                    <td><a class="performance-link"><span class="link-text">20:30</span></a></td>
                    <td><a class="performance-link"><span class="link-text">18:00</span></a></td>
                  </tr>
                  <tr>
                    <th><div class="font-semibold">Kino 1</div></th>
                    <td></td>
                    <td><a class="performance-link"><span class="link-text">21:15</span></a></td>
                  </tr>
                </tbody>
              </table>
            </div>
          </li>
          <li class="filmapi-container__list--li">
            <p class="leading-tight">Container without a title is skipped.</p>
          </li>
        </ul>
    "#;

    #[test]
    fn parses_film_fields() {
        let films = test_scraper().parse_films(SAMPLE);
        assert_eq!(films.len(), 1);

        let film = &films[0];
        assert_eq!(film.title, "Das Kanu des Manitu");
        assert_eq!(film.film_id.as_deref(), Some("2887"));
        assert_eq!(film.genres, vec!["Komödie"]);
        assert_eq!(film.fsk_rating.as_deref(), Some("FSK 12"));
        assert_eq!(film.duration, Some(87));
        assert_eq!(
            film.description.as_deref(),
            Some("Abahachi muss das Kanu finden.")
        );
        assert_eq!(
            film.poster_url.as_deref(),
            Some("https://www.cinecitta.de/fileadmin/poster.jpg")
        );
    }

    #[test]
    fn parses_showtime_grid() {
        let films = test_scraper().parse_films(SAMPLE);
        let showtimes = &films[0].showtimes;

        assert_eq!(showtimes.len(), 3);
        assert!(showtimes.contains(&Showtime {
            date: "Mo.15.12".into(),
            time: "20:30".into(),
            room: "Kino 2".into(),
            language: Some("OmU".into()),
        }));
        assert!(showtimes.contains(&Showtime {
            date: "Di.16.12".into(),
            time: "18:00".into(),
            room: "Kino 2".into(),
            language: Some("OmU".into()),
        }));
        // The second room carries no release type.
        assert!(showtimes.contains(&Showtime {
            date: "Di.16.12".into(),
            time: "21:15".into(),
            room: "Kino 1".into(),
            language: None,
        }));
    }

    #[test]
    fn film_without_showtime_table_parses_empty() {
        let html = r#"
            <li class="filmapi-container__list--li">
              <h3 class="text-white">Preview</h3>
            </li>
        "#;
        let films = test_scraper().parse_films(html);
        assert_eq!(films.len(), 1);
        assert!(films[0].showtimes.is_empty());
        assert!(films[0].film_id.is_none());
    }
}
