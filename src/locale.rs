// src/locale.rs

//! User-facing message translations.
//!
//! Every entry carries all three renditions, so the key set is complete
//! across locales by construction. Templates use `{placeholder}` markers
//! filled in by [`text_with`].

/// Supported user languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Ru,
    De,
    En,
}

impl Lang {
    pub const ALL: [Lang; 3] = [Lang::Ru, Lang::De, Lang::En];

    /// Locale code as persisted and used in callback data.
    pub fn code(self) -> &'static str {
        match self {
            Lang::Ru => "ru",
            Lang::De => "de",
            Lang::En => "en",
        }
    }

    /// Strict parse; `None` for codes outside the closed set.
    pub fn try_from_code(code: &str) -> Option<Lang> {
        match code {
            "ru" => Some(Lang::Ru),
            "de" => Some(Lang::De),
            "en" => Some(Lang::En),
            _ => None,
        }
    }

    /// Lenient parse falling back to Russian, the historical default.
    pub fn from_code(code: &str) -> Lang {
        Self::try_from_code(code).unwrap_or(Lang::Ru)
    }
}

struct Entry {
    key: &'static str,
    ru: &'static str,
    de: &'static str,
    en: &'static str,
}

impl Entry {
    fn get(&self, lang: Lang) -> &'static str {
        match lang {
            Lang::Ru => self.ru,
            Lang::De => self.de,
            Lang::En => self.en,
        }
    }
}

/// Trilingual prompt shown before any language is chosen.
pub const CHOOSE_LANGUAGE: &str = "🌍 Выберите язык / Choose language / Sprache wählen";

static ENTRIES: &[Entry] = &[
    Entry {
        key: "language_set",
        ru: "✅ Язык установлен: Русский",
        de: "✅ Sprache eingestellt: Deutsch",
        en: "✅ Language set: English",
    },
    Entry {
        key: "welcome_title",
        ru: "🎬 <b>Добро пожаловать, {name}!</b>",
        de: "🎬 <b>Willkommen, {name}!</b>",
        en: "🎬 <b>Welcome, {name}!</b>",
    },
    Entry {
        key: "welcome_desc",
        ru: "Этот бот следит за программами кинотеатров Нюрнберга:\n• <b>Meisengeige</b> (Cinecitta)\n• <b>Kinderkino</b> (Filmhaus)",
        de: "Dieser Bot überwacht die Programme der Kinos in Nürnberg:\n• <b>Meisengeige</b> (Cinecitta)\n• <b>Kinderkino</b> (Filmhaus)",
        en: "This bot monitors cinema programs in Nuremberg:\n• <b>Meisengeige</b> (Cinecitta)\n• <b>Kinderkino</b> (Filmhaus)",
    },
    Entry {
        key: "capabilities",
        ru: "<b>Возможности:</b>",
        de: "<b>Funktionen:</b>",
        en: "<b>Features:</b>",
    },
    Entry {
        key: "capability_view",
        ru: "🎥 Просмотр текущих программ",
        de: "🎥 Aktuelle Programme anzeigen",
        en: "🎥 View current programs",
    },
    Entry {
        key: "capability_new",
        ru: "✨ Уведомления о новых фильмах",
        de: "✨ Benachrichtigungen über neue Filme",
        en: "✨ Notifications about new films",
    },
    Entry {
        key: "capability_updates",
        ru: "🔄 Уведомления об изменениях сеансов",
        de: "🔄 Benachrichtigungen über Vorstellungsänderungen",
        en: "🔄 Notifications about showtime changes",
    },
    Entry {
        key: "capability_removed",
        ru: "❌ Уведомления об удалении фильмов",
        de: "❌ Benachrichtigungen über entfernte Filme",
        en: "❌ Notifications about removed films",
    },
    Entry {
        key: "use_menu",
        ru: "Используйте /sources для выбора источников уведомлений.",
        de: "Verwenden Sie /sources zur Auswahl der Benachrichtigungsquellen.",
        en: "Use /sources to select notification sources.",
    },
    Entry {
        key: "already_subscribed",
        ru: "👋 Привет, {name}!\n\nВы уже подписаны на уведомления.\n\nИспользуйте меню команд (☰) для управления подпиской.",
        de: "👋 Hallo {name}!\n\nSie sind bereits für Benachrichtigungen angemeldet.\n\nVerwenden Sie das Befehlsmenü (☰) zur Verwaltung.",
        en: "👋 Hi {name}!\n\nYou are already subscribed to notifications.\n\nUse the command menu (☰) to manage your subscription.",
    },
    Entry {
        key: "unsubscribed",
        ru: "👋 Вы отписались от уведомлений.\n\nВы можете подписаться снова в любое время используя команду /start.",
        de: "👋 Sie haben sich von Benachrichtigungen abgemeldet.\n\nSie können sich jederzeit mit /start wieder anmelden.",
        en: "👋 You have unsubscribed from notifications.\n\nYou can subscribe again anytime using /start.",
    },
    Entry {
        key: "not_subscribed",
        ru: "Вы не подписаны на уведомления.\n\nИспользуйте команду /start для подписки.",
        de: "Sie sind nicht für Benachrichtigungen angemeldet.\n\nVerwenden Sie /start zum Abonnieren.",
        en: "You are not subscribed to notifications.\n\nUse /start to subscribe.",
    },
    Entry {
        key: "status_inactive",
        ru: "❌ <b>Не подписаны</b>\n\nВы не получаете уведомления.\n\nИспользуйте команду /start для подписки.",
        de: "❌ <b>Nicht abonniert</b>\n\nSie erhalten keine Benachrichtigungen.\n\nVerwenden Sie /start zum Abonnieren.",
        en: "❌ <b>Not Subscribed</b>\n\nYou are not receiving notifications.\n\nUse /start to subscribe.",
    },
    Entry {
        key: "status_active_multi",
        ru: "✅ <b>Активные подписки</b>",
        de: "✅ <b>Aktive Abonnements</b>",
        en: "✅ <b>Active Subscriptions</b>",
    },
    Entry {
        key: "use_sources_cmd",
        ru: "Используйте /sources для управления подписками",
        de: "Verwenden Sie /sources zur Verwaltung der Abonnements",
        en: "Use /sources to manage subscriptions",
    },
    Entry {
        key: "sources_header",
        ru: "🎬 <b>Источники программ кинотеатров</b>",
        de: "🎬 <b>Kinoprogramm-Quellen</b>",
        en: "🎬 <b>Cinema Program Sources</b>",
    },
    Entry {
        key: "films_title",
        ru: "🎬 <b>Текущая программа {source}</b>\n\nВсего фильмов: {count}\n\nНажмите на фильм чтобы увидеть детали:",
        de: "🎬 <b>Aktuelles {source}-Programm</b>\n\nFilme insgesamt: {count}\n\nKlicken Sie auf einen Film für Details:",
        en: "🎬 <b>Current {source} Program</b>\n\nTotal films: {count}\n\nClick on a film to see details:",
    },
    Entry {
        key: "films_error",
        ru: "❌ Не удалось загрузить список фильмов. Попробуйте позже.",
        de: "❌ Filmliste konnte nicht geladen werden. Bitte später versuchen.",
        en: "❌ Failed to load film list. Please try later.",
    },
    Entry {
        key: "film_not_found",
        ru: "❌ Фильм не найден.",
        de: "❌ Film nicht gefunden.",
        en: "❌ Film not found.",
    },
    Entry {
        key: "showtimes",
        ru: "<b>Сеансы:</b>",
        de: "<b>Vorstellungen:</b>",
        en: "<b>Showtimes:</b>",
    },
    Entry {
        key: "back_to_list",
        ru: "◀️ Вернуться к списку",
        de: "◀️ Zurück zur Liste",
        en: "◀️ Back to list",
    },
    Entry {
        key: "unknown_command",
        ru: "Неизвестная команда.\n\nИспользуйте меню команд (☰) для управления подпиской.",
        de: "Unbekannter Befehl.\n\nVerwenden Sie das Befehlsmenü (☰) zur Verwaltung.",
        en: "Unknown command.\n\nUse the command menu (☰) to manage your subscription.",
    },
    Entry {
        key: "broadcast_no_permission",
        ru: "❌ У вас нет прав для отправки рассылок.",
        de: "❌ Sie haben keine Berechtigung zum Senden von Broadcasts.",
        en: "❌ You don't have permission to send broadcasts.",
    },
    Entry {
        key: "broadcast_usage",
        ru: "📢 Использование: /broadcast <сообщение>\n\nОтправит сообщение всем подписчикам.",
        de: "📢 Verwendung: /broadcast <Nachricht>\n\nSendet Nachricht an alle Abonnenten.",
        en: "📢 Usage: /broadcast <message>\n\nWill send message to all subscribers.",
    },
    Entry {
        key: "broadcast_sending",
        ru: "📤 Отправка сообщения {count} подписчикам...",
        de: "📤 Sende Nachricht an {count} Abonnenten...",
        en: "📤 Sending message to {count} subscribers...",
    },
    Entry {
        key: "broadcast_success",
        ru: "✅ Сообщение успешно отправлено {success} из {total} подписчиков.",
        de: "✅ Nachricht erfolgreich an {success} von {total} Abonnenten gesendet.",
        en: "✅ Message successfully sent to {success} out of {total} subscribers.",
    },
    Entry {
        key: "broadcast_empty",
        ru: "📭 Нет подписчиков для рассылки.",
        de: "📭 Keine Abonnenten für die Nachricht.",
        en: "📭 No subscribers to send message to.",
    },
    Entry {
        key: "subscribed_to_source",
        ru: "✅ Вы подписались на {source_name}!\n\nВы будете получать обновления программы этого кинотеатра.",
        de: "✅ Sie haben {source_name} abonniert!\n\nSie erhalten Updates zum Programm dieses Kinos.",
        en: "✅ You subscribed to {source_name}!\n\nYou will receive updates for this cinema's program.",
    },
    Entry {
        key: "already_subscribed_source",
        ru: "ℹ️ Вы уже подписаны на {source_name}",
        de: "ℹ️ Sie haben {source_name} bereits abonniert",
        en: "ℹ️ You are already subscribed to {source_name}",
    },
    Entry {
        key: "unsubscribed_from_source",
        ru: "✅ Вы отписались от {source_name}",
        de: "✅ Sie haben {source_name} abbestellt",
        en: "✅ You unsubscribed from {source_name}",
    },
    Entry {
        key: "not_subscribed_source",
        ru: "ℹ️ Вы не подписаны на {source_name}",
        de: "ℹ️ Sie haben {source_name} nicht abonniert",
        en: "ℹ️ You are not subscribed to {source_name}",
    },
    Entry {
        key: "unknown_source",
        ru: "❌ Неизвестный источник",
        de: "❌ Unbekannte Quelle",
        en: "❌ Unknown source",
    },
    Entry {
        key: "subscriber_count_line",
        ru: "• {source_name} ({count} подписчиков)",
        de: "• {source_name} ({count} Abonnenten)",
        en: "• {source_name} ({count} subscribers)",
    },
    Entry {
        key: "notify_header",
        ru: "🎬 <b>Обновление программы {source}</b>",
        de: "🎬 <b>{source}-Programmupdate</b>",
        en: "🎬 <b>{source} Program Update</b>",
    },
    Entry {
        key: "notify_new_films",
        ru: "✨ Новых фильмов: {count}",
        de: "✨ Neue Filme: {count}",
        en: "✨ New films: {count}",
    },
    Entry {
        key: "notify_updated_films",
        ru: "🔄 Обновлённых фильмов: {count}",
        de: "🔄 Aktualisierte Filme: {count}",
        en: "🔄 Updated films: {count}",
    },
    Entry {
        key: "notify_removed_line",
        ru: "❌ Удалённых фильмов: {count}",
        de: "❌ Entfernte Filme: {count}",
        en: "❌ Removed films: {count}",
    },
    Entry {
        key: "notify_removed_films",
        ru: "❌ <b>Удалено из программы ({count}):</b>",
        de: "❌ <b>Aus dem Programm entfernt ({count}):</b>",
        en: "❌ <b>Removed from the program ({count}):</b>",
    },
    Entry {
        key: "notify_new_film",
        ru: "✨ <b>Новый фильм</b>",
        de: "✨ <b>Neuer Film</b>",
        en: "✨ <b>New film</b>",
    },
    Entry {
        key: "notify_updated_film",
        ru: "🔄 <b>Изменения сеансов</b>",
        de: "🔄 <b>Geänderte Vorstellungen</b>",
        en: "🔄 <b>Showtime changes</b>",
    },
    Entry {
        key: "more_showtimes",
        ru: "... и еще {count} сеансов",
        de: "... und {count} weitere Vorstellungen",
        en: "... and {count} more showtimes",
    },
];

fn lookup(key: &str) -> Option<&'static Entry> {
    ENTRIES.iter().find(|e| e.key == key)
}

/// Translated text for a key; the key itself is returned when unknown,
/// so a missing entry degrades visibly instead of panicking.
pub fn text(lang: Lang, key: &str) -> String {
    match lookup(key) {
        Some(entry) => entry.get(lang).to_string(),
        None => key.to_string(),
    }
}

/// Translated text with `{placeholder}` substitution.
pub fn text_with(lang: Lang, key: &str, params: &[(&str, &str)]) -> String {
    let mut result = text(lang, key);
    for (name, value) in params {
        result = result.replace(&format!("{{{name}}}"), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let mut seen = HashSet::new();
        for entry in ENTRIES {
            assert!(seen.insert(entry.key), "duplicate key {}", entry.key);
        }
    }

    #[test]
    fn no_rendition_is_empty() {
        for entry in ENTRIES {
            for lang in Lang::ALL {
                assert!(!entry.get(lang).is_empty(), "empty {} for {:?}", entry.key, lang);
            }
        }
    }

    #[test]
    fn placeholders_match_across_locales() {
        let re = regex::Regex::new(r"\{[a-z_]+\}").unwrap();
        for entry in ENTRIES {
            let extract = |s: &'static str| {
                let mut found: Vec<&str> = re.find_iter(s).map(|m| m.as_str()).collect();
                found.sort_unstable();
                found
            };
            let ru = extract(entry.ru);
            assert_eq!(ru, extract(entry.de), "placeholder mismatch in {}", entry.key);
            assert_eq!(ru, extract(entry.en), "placeholder mismatch in {}", entry.key);
        }
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        assert_eq!(text(Lang::En, "no_such_key"), "no_such_key");
    }

    #[test]
    fn substitution_fills_placeholders() {
        let msg = text_with(Lang::En, "welcome_title", &[("name", "Anna")]);
        assert_eq!(msg, "🎬 <b>Welcome, Anna!</b>");
    }

    #[test]
    fn lang_code_roundtrip() {
        for lang in Lang::ALL {
            assert_eq!(Lang::try_from_code(lang.code()), Some(lang));
        }
        assert_eq!(Lang::try_from_code("fr"), None);
        assert_eq!(Lang::from_code("fr"), Lang::Ru);
    }
}
