//! Notification dispatch for program diffs.
//!
//! Planning is pure: [`build_plan`] turns a diff into the per-recipient
//! message sequence. Sending is isolated per recipient; one blocked chat
//! never aborts delivery to the rest.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use crate::error::Result;
use crate::locale::{self, Lang};
use crate::models::{Film, NotifyLimits, SourceConfig};
use crate::pipeline::ProgramDiff;
use crate::storage::SubscriberStore;

/// Per-source delivery counters.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Build the message sequence for one recipient: a summary header, up to
/// `max_new_films` per-film messages for additions, up to
/// `max_updated_films` for updates (showtimes truncated per film), and one
/// combined untruncated listing for removals.
pub fn build_plan(
    source: &SourceConfig,
    diff: &ProgramDiff,
    lang: Lang,
    limits: &NotifyLimits,
) -> Vec<String> {
    if !diff.has_changes() {
        return Vec::new();
    }

    let mut messages = Vec::new();

    let mut header = locale::text_with(lang, "notify_header", &[("source", &source.name)]);
    header.push('\n');
    if !diff.new_films.is_empty() {
        header.push('\n');
        header.push_str(&locale::text_with(
            lang,
            "notify_new_films",
            &[("count", &diff.new_films.len().to_string())],
        ));
    }
    if !diff.updated_films.is_empty() {
        header.push('\n');
        header.push_str(&locale::text_with(
            lang,
            "notify_updated_films",
            &[("count", &diff.updated_films.len().to_string())],
        ));
    }
    if !diff.removed_films.is_empty() {
        header.push('\n');
        header.push_str(&locale::text_with(
            lang,
            "notify_removed_line",
            &[("count", &diff.removed_films.len().to_string())],
        ));
    }
    header.push_str("\n\n🔗 ");
    header.push_str(&source.url);
    messages.push(header);

    for film in diff.new_films.iter().take(limits.max_new_films) {
        let mut message = locale::text(lang, "notify_new_film");
        message.push('\n');
        message.push_str(&format_film(film, lang, limits.showtimes_per_film));
        messages.push(message);
    }

    for film in diff.updated_films.iter().take(limits.max_updated_films) {
        let mut message = locale::text(lang, "notify_updated_film");
        message.push('\n');
        message.push_str(&format_film(film, lang, limits.showtimes_per_film));
        messages.push(message);
    }

    if !diff.removed_films.is_empty() {
        let mut message = locale::text_with(
            lang,
            "notify_removed_films",
            &[("count", &diff.removed_films.len().to_string())],
        );
        for film in &diff.removed_films {
            message.push_str("\n• ");
            message.push_str(&film.title);
        }
        messages.push(message);
    }

    messages
}

/// Format a single film for a change notification.
pub fn format_film(film: &Film, lang: Lang, showtime_limit: usize) -> String {
    let mut lines = vec![format!("<b>{}</b>", film.title)];

    let mut info = Vec::new();
    if !film.genres.is_empty() {
        info.push(film.genres.join(", "));
    }
    if let Some(duration) = film.duration {
        info.push(format!("{duration}min"));
    }
    if let Some(fsk) = &film.fsk_rating {
        info.push(fsk.clone());
    }
    if !info.is_empty() {
        lines.push(format!("  ({})", info.join(", ")));
    }

    for showtime in film.showtimes.iter().take(showtime_limit) {
        lines.push(format!("  📅 {showtime}"));
    }
    if film.showtimes.len() > showtime_limit {
        lines.push(format!(
            "  {}",
            locale::text_with(
                lang,
                "more_showtimes",
                &[("count", &(film.showtimes.len() - showtime_limit).to_string())],
            )
        ));
    }

    lines.join("\n")
}

/// Sends diff notifications to every subscriber of a source.
pub struct NotificationDispatcher {
    bot: Bot,
    limits: NotifyLimits,
}

impl NotificationDispatcher {
    pub fn new(bot: Bot, limits: NotifyLimits) -> Self {
        Self { bot, limits }
    }

    /// Notify all subscribers of the source about the diff.
    ///
    /// An empty subscriber set ends the cycle with no network calls. A send
    /// failure for one recipient is counted and logged, never raised.
    pub async fn dispatch(
        &self,
        source: &SourceConfig,
        diff: &ProgramDiff,
        store: &dyn SubscriberStore,
    ) -> Result<DispatchStats> {
        if !diff.has_changes() {
            return Ok(DispatchStats::default());
        }

        let recipients = store.subscribers_for_source(&source.id).await?;
        if recipients.is_empty() {
            log::info!("No subscribers for {}; skipping notification", source.id);
            return Ok(DispatchStats::default());
        }

        if diff.new_films.len() > self.limits.max_new_films
            || diff.updated_films.len() > self.limits.max_updated_films
        {
            log::debug!(
                "Diff for {} exceeds per-film message limits; film lists will be capped",
                source.id
            );
        }

        let mut stats = DispatchStats {
            recipients: recipients.len(),
            ..DispatchStats::default()
        };

        for chat_id in recipients {
            let lang = store.language(chat_id).await.unwrap_or(Lang::Ru);
            let messages = build_plan(source, diff, lang, &self.limits);

            match self.send_all(chat_id, &messages).await {
                Ok(()) => stats.sent += 1,
                Err(e) => {
                    stats.failed += 1;
                    log::warn!("Failed to notify {chat_id} about {}: {e}", source.id);
                }
            }
        }

        log::info!(
            "Dispatched {} update to {} recipient(s): {} sent, {} failed",
            source.id,
            stats.recipients,
            stats.sent,
            stats.failed
        );
        Ok(stats)
    }

    async fn send_all(&self, chat_id: i64, messages: &[String]) -> Result<()> {
        for message in messages {
            self.bot
                .send_message(ChatId(chat_id), message)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScraperKind, Showtime};
    use crate::pipeline::ProgramDiff;

    fn source() -> SourceConfig {
        SourceConfig {
            id: "meisengeige".into(),
            name: "Meisengeige".into(),
            url: "https://www.cinecitta.de/programm/meisengeige/".into(),
            venue: "Cinecitta Nürnberg".into(),
            scraper: ScraperKind::Meisengeige,
        }
    }

    fn make_film(title: &str, showtime_count: usize) -> Film {
        Film {
            title: title.to_string(),
            genres: vec!["Drama".into()],
            fsk_rating: None,
            duration: Some(104),
            description: None,
            poster_url: None,
            film_id: None,
            showtimes: (0..showtime_count)
                .map(|i| Showtime {
                    date: "Mo.15.12".into(),
                    time: format!("{:02}:00", 10 + i),
                    room: "Kino 2".into(),
                    language: None,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_diff_plans_nothing() {
        let plan = build_plan(
            &source(),
            &ProgramDiff::default(),
            Lang::En,
            &NotifyLimits::default(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn header_summarizes_counts_and_links_the_program() {
        let diff = ProgramDiff {
            new_films: vec![make_film("A", 1)],
            removed_films: vec![make_film("B", 0)],
            updated_films: vec![make_film("C", 1)],
        };
        let plan = build_plan(&source(), &diff, Lang::En, &NotifyLimits::default());

        let header = &plan[0];
        assert!(header.contains("Meisengeige Program Update"));
        assert!(header.contains("New films: 1"));
        assert!(header.contains("Updated films: 1"));
        assert!(header.contains("Removed films: 1"));
        assert!(header.contains("https://www.cinecitta.de/programm/meisengeige/"));
    }

    #[test]
    fn new_film_messages_are_capped() {
        let diff = ProgramDiff {
            new_films: (0..12).map(|i| make_film(&format!("F{i}"), 1)).collect(),
            ..ProgramDiff::default()
        };
        let plan = build_plan(&source(), &diff, Lang::En, &NotifyLimits::default());

        // Header plus at most ten per-film messages.
        assert_eq!(plan.len(), 11);
        assert!(plan[1].contains("New film"));
    }

    #[test]
    fn showtimes_truncate_with_suffix() {
        let diff = ProgramDiff {
            updated_films: vec![make_film("X", 7)],
            ..ProgramDiff::default()
        };
        let plan = build_plan(&source(), &diff, Lang::En, &NotifyLimits::default());

        let message = &plan[1];
        assert_eq!(message.matches("📅").count(), 5);
        assert!(message.contains("and 2 more showtimes"));
    }

    #[test]
    fn removed_listing_is_combined_and_untruncated() {
        let diff = ProgramDiff {
            removed_films: (0..15).map(|i| make_film(&format!("R{i}"), 0)).collect(),
            ..ProgramDiff::default()
        };
        let plan = build_plan(&source(), &diff, Lang::En, &NotifyLimits::default());

        assert_eq!(plan.len(), 2);
        let removed = &plan[1];
        assert!(removed.contains("Removed from the program (15)"));
        for i in 0..15 {
            assert!(removed.contains(&format!("• R{i}")));
        }
    }

    #[test]
    fn plan_is_localized() {
        let diff = ProgramDiff {
            new_films: vec![make_film("A", 0)],
            ..ProgramDiff::default()
        };
        let plan = build_plan(&source(), &diff, Lang::De, &NotifyLimits::default());
        assert!(plan[0].contains("Programmupdate"));
        assert!(plan[1].contains("Neuer Film"));
    }

    #[test]
    fn format_film_includes_info_line() {
        let text = format_film(&make_film("X", 1), Lang::En, 5);
        assert!(text.starts_with("<b>X</b>"));
        assert!(text.contains("(Drama, 104min)"));
        assert!(text.contains("📅 Mo.15.12 10:00 - Kino 2"));
    }
}
