// src/bot/version.rs

//! Product version notices pushed once per user.
//!
//! A subscribed user whose stored version is older than [`BOT_VERSION`]
//! receives the matching notice exactly once; the stored version advances
//! only after the notice was actually delivered.

use crate::locale::Lang;

/// Version surfaced to users in update notices.
pub const BOT_VERSION: &str = "1.1.0";

/// Update notice text for a released version, if that release shipped one.
pub fn update_notice(version: &str, lang: Lang) -> Option<&'static str> {
    match version {
        "1.1.0" => Some(match lang {
            Lang::Ru => NOTICE_1_1_0_RU,
            Lang::De => NOTICE_1_1_0_DE,
            Lang::En => NOTICE_1_1_0_EN,
        }),
        _ => None,
    }
}

const NOTICE_1_1_0_RU: &str = "🎉 <b>Обновление бота v1.1.0</b>\n\n\
<b>Что нового:</b>\n\
• 🌍 Поддержка трёх языков (Русский, Deutsch, English)\n\
• 💾 Постоянное хранение подписок\n\
• 🔄 Подписки больше не теряются при обновлениях\n\
• 🌐 Меню команд на вашем языке\n\n\
<b>Новые команды:</b>\n\
• /language - Изменить язык в любое время\n\n\
Просто продолжайте пользоваться ботом! 🎬";

const NOTICE_1_1_0_DE: &str = "🎉 <b>Bot-Update v1.1.0</b>\n\n\
<b>Was ist neu:</b>\n\
• 🌍 Unterstützung für drei Sprachen (Russisch, Deutsch, Englisch)\n\
• 💾 Dauerhafte Speicherung von Abonnements\n\
• 🔄 Abonnements gehen bei Updates nicht mehr verloren\n\
• 🌐 Befehlsmenü in Ihrer Sprache\n\n\
<b>Neue Befehle:</b>\n\
• /language - Sprache jederzeit ändern\n\n\
Nutzen Sie den Bot einfach weiter! 🎬";

const NOTICE_1_1_0_EN: &str = "🎉 <b>Bot Update v1.1.0</b>\n\n\
<b>What's new:</b>\n\
• 🌍 Support for three languages (Russian, Deutsch, English)\n\
• 💾 Persistent subscription storage\n\
• 🔄 Subscriptions no longer lost on updates\n\
• 🌐 Command menu in your language\n\n\
<b>New commands:</b>\n\
• /language - Change language anytime\n\n\
Just keep using the bot! 🎬";
