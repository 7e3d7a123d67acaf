//! Film and program snapshot data structures.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single film showtime.
///
/// The `date` field is the display label exactly as scraped (e.g. "Mo.15.12")
/// and is never parsed as a calendar date. Two calendar dates that render the
/// same label compare equal; this is a known limitation of the sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Showtime {
    pub date: String,

    /// "HH:MM"
    pub time: String,

    /// e.g. "Kino 2"
    pub room: String,

    /// e.g. "OV", "OmU"
    #[serde(default)]
    pub language: Option<String>,
}

impl fmt::Display for Showtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} - {}", self.date, self.time, self.room)?;
        if let Some(language) = &self.language {
            write!(f, " ({language})")?;
        }
        Ok(())
    }
}

/// A film with all its scraped information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Film {
    /// Natural identity key within a single source and snapshot.
    pub title: String,

    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub fsk_rating: Option<String>,

    /// Running time in minutes
    #[serde(default)]
    pub duration: Option<u32>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub poster_url: Option<String>,

    /// Opaque identifier from the source page. Used for display routing when
    /// present, never as the diff key.
    #[serde(default)]
    pub film_id: Option<String>,

    #[serde(default)]
    pub showtimes: Vec<Showtime>,
}

impl Film {
    /// Showtimes viewed as a set; display order carries no meaning.
    pub fn showtime_set(&self) -> HashSet<&Showtime> {
        self.showtimes.iter().collect()
    }
}

/// Full film listing for one source captured at one point in time.
///
/// The timestamp is informational only and never enters comparison logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub films: Vec<Film>,
}

impl ProgramSnapshot {
    pub fn new(source_id: impl Into<String>, films: Vec<Film>) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp: Utc::now(),
            films,
        }
    }
}
