// src/bot/commands.rs

//! Chat commands and reply builders.
//!
//! Every command maps onto subscription store operations; the builders here
//! are side-effect free so the command surface can be tested without a
//! network connection.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

use crate::error::Result;
use crate::locale::{self, Lang};
use crate::models::Film;
use crate::services::SourceRegistry;
use crate::storage::SubscriberStore;

/// Slash commands understood by the bot.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "✨ Subscribe to notifications")]
    Start,
    #[command(description = "❌ Unsubscribe from notifications")]
    Stop,
    #[command(description = "📊 Check subscription status")]
    Status,
    #[command(description = "🎬 Manage sources")]
    Sources,
    #[command(description = "🎥 Show current program")]
    Films,
    #[command(description = "🌍 Change language")]
    Language,
    #[command(description = "📢 Message all subscribers (admin)")]
    Broadcast(String),
}

// Callback data markers for inline keyboards.
pub const CB_LANG_PREFIX: &str = "lang_";
pub const CB_CHANGE_LANG_PREFIX: &str = "changelang_";
pub const CB_FILM_PREFIX: &str = "film_";
pub const CB_BACK_TO_LIST: &str = "back_to_list";
pub const CB_SUBSCRIBE_PREFIX: &str = "sub:";
pub const CB_UNSUBSCRIBE_PREFIX: &str = "unsub:";

/// Language selection keyboard; the prefix decides whether picking a
/// language also subscribes (first contact) or only switches it.
pub fn language_keyboard(prefix: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🇷🇺 Русский",
            format!("{prefix}ru"),
        )],
        vec![InlineKeyboardButton::callback(
            "🇩🇪 Deutsch",
            format!("{prefix}de"),
        )],
        vec![InlineKeyboardButton::callback(
            "🇬🇧 English",
            format!("{prefix}en"),
        )],
    ])
}

/// Caption for the welcome message.
pub fn welcome_caption(lang: Lang, name: &str) -> String {
    [
        locale::text_with(lang, "welcome_title", &[("name", name)]),
        String::new(),
        locale::text(lang, "welcome_desc"),
        String::new(),
        locale::text(lang, "capabilities"),
        locale::text(lang, "capability_view"),
        locale::text(lang, "capability_new"),
        locale::text(lang, "capability_updates"),
        locale::text(lang, "capability_removed"),
        String::new(),
        locale::text(lang, "use_menu"),
    ]
    .join("\n")
}

/// Subscription status with per-source subscriber counts.
pub async fn status_message(
    store: &dyn SubscriberStore,
    registry: &SourceRegistry,
    chat_id: i64,
) -> Result<String> {
    let lang = store.language(chat_id).await?;
    let user_sources = store.user_sources(chat_id).await?;

    if user_sources.is_empty() {
        return Ok(locale::text(lang, "status_inactive"));
    }

    let mut lines = vec![locale::text(lang, "status_active_multi"), String::new()];
    for source_id in &user_sources {
        if let Some(source) = registry.get(source_id) {
            let count = store.subscriber_count(Some(source_id)).await?;
            lines.push(locale::text_with(
                lang,
                "subscriber_count_line",
                &[("source_name", &source.name), ("count", &count.to_string())],
            ));
        }
    }
    lines.push(String::new());
    lines.push(locale::text(lang, "use_sources_cmd"));
    Ok(lines.join("\n"))
}

/// Source management view: one toggle button per source.
pub fn sources_message(
    registry: &SourceRegistry,
    user_sources: &[String],
    lang: Lang,
) -> (String, InlineKeyboardMarkup) {
    let text = locale::text(lang, "sources_header");

    let rows: Vec<Vec<InlineKeyboardButton>> = registry
        .list()
        .iter()
        .map(|source| {
            let subscribed = user_sources.iter().any(|s| *s == source.id);
            let (marker, prefix) = if subscribed {
                ("✅", CB_UNSUBSCRIBE_PREFIX)
            } else {
                ("➕", CB_SUBSCRIBE_PREFIX)
            };
            vec![InlineKeyboardButton::callback(
                format!("{marker} {}", source.name),
                format!("{prefix}{}", source.id),
            )]
        })
        .collect();

    (text, InlineKeyboardMarkup::new(rows))
}

/// Film list view: header plus one button per film.
pub fn films_message(
    source_name: &str,
    films: &[Film],
    lang: Lang,
) -> (String, InlineKeyboardMarkup) {
    let text = locale::text_with(
        lang,
        "films_title",
        &[("source", source_name), ("count", &films.len().to_string())],
    );

    let rows: Vec<Vec<InlineKeyboardButton>> = films
        .iter()
        .enumerate()
        .map(|(idx, film)| {
            // Prefer the page's film ID; fall back to the list index.
            let key = film
                .film_id
                .clone()
                .unwrap_or_else(|| idx.to_string());
            vec![InlineKeyboardButton::callback(
                format!("🎥 {}", film.title),
                format!("{CB_FILM_PREFIX}{key}"),
            )]
        })
        .collect();

    (text, InlineKeyboardMarkup::new(rows))
}

/// Look up a film by its callback key (film ID or list index).
pub fn find_film<'a>(films: &'a [Film], key: &str) -> Option<&'a Film> {
    films
        .iter()
        .enumerate()
        .find(|(idx, film)| film.film_id.as_deref() == Some(key) || idx.to_string() == key)
        .map(|(_, film)| film)
}

/// Detail caption for one film, showtimes capped with a "+N more" suffix.
pub fn film_details(film: &Film, lang: Lang, showtime_limit: usize) -> String {
    let mut caption = format!("🎬 <b>{}</b>\n\n", film.title);

    if !film.genres.is_empty() {
        caption.push_str(&format!("🎭 {}\n", film.genres.join(", ")));
    }
    if let Some(fsk) = &film.fsk_rating {
        caption.push_str(&format!("👤 {fsk}\n"));
    }
    if let Some(duration) = film.duration {
        caption.push_str(&format!("⏱ {duration} min\n"));
    }
    caption.push('\n');

    if let Some(description) = &film.description {
        caption.push_str(description);
        caption.push_str("\n\n");
    }

    if !film.showtimes.is_empty() {
        caption.push_str(&locale::text(lang, "showtimes"));
        caption.push('\n');
        for showtime in film.showtimes.iter().take(showtime_limit) {
            caption.push_str(&format!("• {showtime}\n"));
        }
        if film.showtimes.len() > showtime_limit {
            caption.push('\n');
            caption.push_str(&locale::text_with(
                lang,
                "more_showtimes",
                &[(
                    "count",
                    &(film.showtimes.len() - showtime_limit).to_string(),
                )],
            ));
        }
    }

    caption
}

/// Back-navigation keyboard under a film detail view.
pub fn back_keyboard(lang: Lang) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        locale::text(lang, "back_to_list"),
        CB_BACK_TO_LIST,
    )]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, Showtime};

    fn make_film(title: &str, film_id: Option<&str>, showtime_count: usize) -> Film {
        Film {
            title: title.to_string(),
            genres: vec!["Drama".into()],
            fsk_rating: Some("FSK 12".into()),
            duration: Some(104),
            description: Some("About it.".into()),
            poster_url: None,
            film_id: film_id.map(str::to_string),
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
    fn command_parsing() {
        assert_eq!(Command::parse("/start", "kinowatch").unwrap(), Command::Start);
        assert_eq!(
            Command::parse("/broadcast hello there", "kinowatch").unwrap(),
            Command::Broadcast("hello there".to_string())
        );
        assert!(Command::parse("hello", "kinowatch").is_err());
    }

    #[test]
    fn language_keyboard_carries_prefix() {
        let markup = language_keyboard(CB_CHANGE_LANG_PREFIX);
        assert_eq!(markup.inline_keyboard.len(), 3);
    }

    #[test]
    fn welcome_caption_mentions_user() {
        let caption = welcome_caption(Lang::En, "Anna");
        assert!(caption.contains("Welcome, Anna!"));
        assert!(caption.contains("Meisengeige"));
    }

    #[test]
    fn sources_message_toggles_buttons() {
        let registry = SourceRegistry::from_config(&Config::default());
        let (text, markup) =
            sources_message(&registry, &["meisengeige".to_string()], Lang::En);

        assert!(text.contains("Cinema Program Sources"));
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert!(markup.inline_keyboard[0][0].text.starts_with("✅"));
        assert!(markup.inline_keyboard[1][0].text.starts_with("➕"));
    }

    #[test]
    fn films_message_lists_every_film() {
        let films = vec![make_film("A", Some("101"), 0), make_film("B", None, 0)];
        let (text, markup) = films_message("Meisengeige", &films, Lang::En);

        assert!(text.contains("Total films: 2"));
        assert_eq!(markup.inline_keyboard.len(), 2);
    }

    #[test]
    fn find_film_by_id_and_index() {
        let films = vec![make_film("A", Some("101"), 0), make_film("B", None, 0)];

        assert_eq!(find_film(&films, "101").unwrap().title, "A");
        assert_eq!(find_film(&films, "1").unwrap().title, "B");
        assert!(find_film(&films, "404").is_none());
    }

    #[test]
    fn film_details_truncates_showtimes() {
        let film = make_film("X", None, 12);
        let caption = film_details(&film, Lang::En, 10);

        assert!(caption.contains("🎬 <b>X</b>"));
        assert!(caption.contains("🎭 Drama"));
        assert!(caption.contains("⏱ 104 min"));
        assert_eq!(caption.matches("• Mo.15.12").count(), 10);
        assert!(caption.contains("and 2 more showtimes"));
    }

    #[test]
    fn film_details_short_listing_has_no_suffix() {
        let film = make_film("X", None, 3);
        let caption = film_details(&film, Lang::En, 10);
        assert!(!caption.contains("more showtimes"));
    }
}
