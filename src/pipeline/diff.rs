//! Diff calculation between program snapshots.
//!
//! Computes which films are new, removed, or updated between the previously
//! persisted snapshot and the freshly scraped listing, for notification
//! dispatch. Pure computation, no I/O.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{Film, ProgramSnapshot, Showtime};

/// Result of comparing two program listings for one source.
///
/// `new_films` and `updated_films` carry the current version of each record;
/// `removed_films` carries the previous version, since the current one no
/// longer exists. Output order is unspecified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDiff {
    pub new_films: Vec<Film>,
    pub removed_films: Vec<Film>,
    pub updated_films: Vec<Film>,
}

impl ProgramDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.new_films.is_empty() || !self.removed_films.is_empty() || !self.updated_films.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.new_films.len() + self.removed_films.len() + self.updated_films.len()
    }
}

/// Calculate the diff between the previous snapshot and the current listing.
///
/// With no previous snapshot (first run for a source) every current film is
/// reported as new. Films are matched by `title` only; a title rename is
/// indistinguishable from a removal plus an addition. Duplicate titles
/// within one listing collapse last-write-wins during map construction.
pub fn diff_program(previous: Option<&ProgramSnapshot>, current: &[Film]) -> ProgramDiff {
    let Some(previous) = previous else {
        return ProgramDiff {
            new_films: current.to_vec(),
            ..ProgramDiff::default()
        };
    };

    let prev_map: HashMap<&str, &Film> = previous
        .films
        .iter()
        .map(|f| (f.title.as_str(), f))
        .collect();
    let curr_map: HashMap<&str, &Film> = current.iter().map(|f| (f.title.as_str(), f)).collect();

    let mut diff = ProgramDiff::default();

    for (title, film) in &curr_map {
        match prev_map.get(title) {
            None => diff.new_films.push((*film).clone()),
            Some(prev) if film_changed(prev, film) => diff.updated_films.push((*film).clone()),
            Some(_) => {}
        }
    }

    for (title, film) in &prev_map {
        if !curr_map.contains_key(title) {
            diff.removed_films.push((*film).clone());
        }
    }

    diff
}

/// Change predicate for a film present in both listings.
///
/// A film counts as updated iff its description differs or its showtime set
/// differs. Genres, FSK rating, duration, poster and film ID are carried
/// along for display but never trigger an update.
pub fn film_changed(old: &Film, new: &Film) -> bool {
    if old.description != new.description {
        return true;
    }

    let old_showtimes: HashSet<&Showtime> = old.showtimes.iter().collect();
    let new_showtimes: HashSet<&Showtime> = new.showtimes.iter().collect();
    old_showtimes != new_showtimes
}
