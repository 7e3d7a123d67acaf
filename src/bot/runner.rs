// src/bot/runner.rs

//! Long-polling bot runner.
//!
//! Wires inbound messages and callback queries to the subscription store
//! and the film cache. Store failures inside a handler are logged and
//! answered with a generic error; they never take the dispatcher down.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatId, InputFile, ParseMode};
use teloxide::utils::command::BotCommands as _;
use url::Url;

use crate::bot::commands::{self, Command};
use crate::bot::version;
use crate::locale::{self, CHOOSE_LANGUAGE, Lang};
use crate::models::Config;
use crate::services::{FilmCache, SourceRegistry};
use crate::storage::SubscriberStore;

/// Shared state for all handlers.
pub struct BotContext {
    pub registry: SourceRegistry,
    pub cache: FilmCache,
    pub store: Arc<dyn SubscriberStore>,
    pub config: Config,
}

impl BotContext {
    async fn lang(&self, chat_id: i64) -> Lang {
        self.store
            .language(chat_id)
            .await
            .unwrap_or(self.config.bot.default_lang())
    }
}

/// Run the bot with long polling until interrupted.
pub async fn run_bot(bot: Bot, ctx: Arc<BotContext>) -> crate::error::Result<()> {
    setup_bot_commands(&bot).await;
    log::info!("Bot started, waiting for updates");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn menu_commands(lang: Lang) -> Vec<BotCommand> {
    let entries: [(&str, &str); 6] = match lang {
        Lang::Ru => [
            ("films", "🎥 Показать текущую программу"),
            ("sources", "🎬 Управление источниками"),
            ("start", "✨ Подписаться на уведомления"),
            ("status", "📊 Проверить статус подписки"),
            ("language", "🌍 Выбрать язык"),
            ("stop", "❌ Отписаться от уведомлений"),
        ],
        Lang::De => [
            ("films", "🎥 Aktuelles Programm anzeigen"),
            ("sources", "🎬 Quellen verwalten"),
            ("start", "✨ Benachrichtigungen abonnieren"),
            ("status", "📊 Abonnementstatus prüfen"),
            ("language", "🌍 Sprache wählen"),
            ("stop", "❌ Benachrichtigungen abbestellen"),
        ],
        Lang::En => [
            ("films", "🎥 Show current program"),
            ("sources", "🎬 Manage sources"),
            ("start", "✨ Subscribe to notifications"),
            ("status", "📊 Check subscription status"),
            ("language", "🌍 Change language"),
            ("stop", "❌ Unsubscribe from notifications"),
        ],
    };
    entries
        .into_iter()
        .map(|(cmd, desc)| BotCommand::new(cmd, desc))
        .collect()
}

/// Publish the command menu per language, with English as the fallback.
async fn setup_bot_commands(bot: &Bot) {
    for lang in Lang::ALL {
        if let Err(e) = bot
            .set_my_commands(menu_commands(lang))
            .language_code(lang.code())
            .await
        {
            log::warn!("Failed to set bot commands for {}: {e}", lang.code());
        }
    }
    if let Err(e) = bot.set_my_commands(menu_commands(Lang::En)).await {
        log::warn!("Failed to set default bot commands: {e}");
    }
}

async fn handle_message(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let first_name = msg
        .from()
        .map(|user| user.first_name.clone())
        .unwrap_or_else(|| "there".to_string());

    log::debug!("Processing '{text}' from chat {chat_id}");
    check_version_notice(&bot, &ctx, chat_id).await;

    match Command::parse(text, "kinowatch") {
        Ok(Command::Start) => handle_start(&bot, &ctx, chat_id, &first_name).await?,
        Ok(Command::Stop) => handle_stop(&bot, &ctx, chat_id).await?,
        Ok(Command::Status) => handle_status(&bot, &ctx, chat_id).await?,
        Ok(Command::Sources) => handle_sources(&bot, &ctx, chat_id).await?,
        Ok(Command::Films) => handle_films(&bot, &ctx, chat_id).await?,
        Ok(Command::Language) => {
            bot.send_message(ChatId(chat_id), CHOOSE_LANGUAGE)
                .reply_markup(commands::language_keyboard(commands::CB_CHANGE_LANG_PREFIX))
                .await?;
        }
        Ok(Command::Broadcast(payload)) => {
            handle_broadcast(&bot, &ctx, chat_id, payload.trim()).await?;
        }
        Err(_) => {
            let lang = ctx.lang(chat_id).await;
            bot.send_message(ChatId(chat_id), locale::text(lang, "unknown_command"))
                .await?;
        }
    }
    Ok(())
}

async fn handle_start(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: i64,
    first_name: &str,
) -> ResponseResult<()> {
    let store = ctx.store.as_ref();
    let has_language = store.has_language_set(chat_id).await.unwrap_or(false);
    let subscribed = store.is_subscribed(chat_id, None).await.unwrap_or(false);

    // A truly first contact picks a language before anything else.
    if !has_language && !subscribed {
        bot.send_message(ChatId(chat_id), CHOOSE_LANGUAGE)
            .reply_markup(commands::language_keyboard(commands::CB_LANG_PREFIX))
            .await?;
        return Ok(());
    }

    match store.add_subscriber(chat_id).await {
        Ok(true) => send_welcome(bot, ctx, chat_id, first_name).await?,
        Ok(false) => {
            let lang = ctx.lang(chat_id).await;
            bot.send_message(
                ChatId(chat_id),
                locale::text_with(lang, "already_subscribed", &[("name", first_name)]),
            )
            .await?;
        }
        Err(e) => log::error!("Subscribe failed for {chat_id}: {e}"),
    }
    Ok(())
}

async fn send_welcome(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: i64,
    first_name: &str,
) -> ResponseResult<()> {
    let lang = ctx.lang(chat_id).await;
    let caption = commands::welcome_caption(lang, first_name);

    let photo_url = ctx
        .config
        .bot
        .welcome_image_url
        .as_deref()
        .and_then(|url| Url::parse(url).ok());

    if let Some(photo_url) = photo_url {
        let sent = bot
            .send_photo(ChatId(chat_id), InputFile::url(photo_url))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html)
            .await;
        match sent {
            Ok(_) => return Ok(()),
            Err(e) => log::warn!("Welcome photo for {chat_id} failed: {e}. Sending text."),
        }
    }

    bot.send_message(ChatId(chat_id), caption)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn handle_stop(bot: &Bot, ctx: &BotContext, chat_id: i64) -> ResponseResult<()> {
    let lang = ctx.lang(chat_id).await;
    let removed = ctx.store.remove_subscriber(chat_id).await.unwrap_or(false);
    let key = if removed { "unsubscribed" } else { "not_subscribed" };
    bot.send_message(ChatId(chat_id), locale::text(lang, key))
        .await?;
    Ok(())
}

async fn handle_status(bot: &Bot, ctx: &BotContext, chat_id: i64) -> ResponseResult<()> {
    match commands::status_message(ctx.store.as_ref(), &ctx.registry, chat_id).await {
        Ok(message) => {
            bot.send_message(ChatId(chat_id), message)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            log::error!("Status lookup failed for {chat_id}: {e}");
            let lang = ctx.lang(chat_id).await;
            bot.send_message(ChatId(chat_id), locale::text(lang, "unknown_command"))
                .await?;
        }
    }
    Ok(())
}

async fn handle_sources(bot: &Bot, ctx: &BotContext, chat_id: i64) -> ResponseResult<()> {
    let lang = ctx.lang(chat_id).await;
    let user_sources = ctx.store.user_sources(chat_id).await.unwrap_or_default();
    let (text, markup) = commands::sources_message(&ctx.registry, &user_sources, lang);

    bot.send_message(ChatId(chat_id), text)
        .parse_mode(ParseMode::Html)
        .reply_markup(markup)
        .await?;
    Ok(())
}

/// The interactive film list browses the first configured source.
async fn handle_films(bot: &Bot, ctx: &BotContext, chat_id: i64) -> ResponseResult<()> {
    let lang = ctx.lang(chat_id).await;

    let films = match browse_films(ctx).await {
        Some(films) if !films.is_empty() => films,
        _ => {
            bot.send_message(ChatId(chat_id), locale::text(lang, "films_error"))
                .await?;
            return Ok(());
        }
    };

    let source_name = ctx
        .registry
        .list()
        .first()
        .map(|s| s.name.clone())
        .unwrap_or_default();
    let (text, markup) = commands::films_message(&source_name, &films, lang);

    bot.send_message(ChatId(chat_id), text)
        .parse_mode(ParseMode::Html)
        .reply_markup(markup)
        .await?;
    Ok(())
}

async fn browse_films(ctx: &BotContext) -> Option<Vec<crate::models::Film>> {
    let source = ctx.registry.list().first()?;
    let scraper = match ctx.registry.scraper(&source.id) {
        Ok(scraper) => scraper,
        Err(e) => {
            log::error!("Scraper for {} unavailable: {e}", source.id);
            return None;
        }
    };
    match ctx.cache.get_or_fetch(scraper.as_ref()).await {
        Ok(films) => Some(films),
        Err(e) => {
            log::error!("Film fetch for {} failed: {e}", source.id);
            None
        }
    }
}

async fn handle_broadcast(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: i64,
    payload: &str,
) -> ResponseResult<()> {
    let lang = ctx.lang(chat_id).await;

    if !ctx.config.bot.admin_chat_ids.contains(&chat_id) {
        bot.send_message(ChatId(chat_id), locale::text(lang, "broadcast_no_permission"))
            .await?;
        return Ok(());
    }
    if payload.is_empty() {
        bot.send_message(ChatId(chat_id), locale::text(lang, "broadcast_usage"))
            .await?;
        return Ok(());
    }

    let recipients = ctx.store.all_subscribers().await.unwrap_or_default();
    if recipients.is_empty() {
        bot.send_message(ChatId(chat_id), locale::text(lang, "broadcast_empty"))
            .await?;
        return Ok(());
    }

    let total = recipients.len();
    bot.send_message(
        ChatId(chat_id),
        locale::text_with(lang, "broadcast_sending", &[("count", &total.to_string())]),
    )
    .await?;

    let mut success = 0usize;
    for recipient in recipients {
        match bot
            .send_message(ChatId(recipient), payload)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => success += 1,
            Err(e) => log::warn!("Broadcast to {recipient} failed: {e}"),
        }
    }

    bot.send_message(
        ChatId(chat_id),
        locale::text_with(
            lang,
            "broadcast_success",
            &[
                ("success", &success.to_string()),
                ("total", &total.to_string()),
            ],
        ),
    )
    .await?;
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> ResponseResult<()> {
    // Acknowledge first so the button stops spinning.
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(chat_id) = q.message.as_ref().map(|m| m.chat.id.0) else {
        return Ok(());
    };
    log::debug!("Processing callback '{data}' from chat {chat_id}");

    if let Some(code) = data.strip_prefix(commands::CB_LANG_PREFIX) {
        // First-contact language choice doubles as the subscription step.
        let lang = Lang::from_code(code);
        if let Err(e) = ctx.store.set_language(chat_id, lang).await {
            log::error!("Language save failed for {chat_id}: {e}");
        }
        bot.send_message(ChatId(chat_id), locale::text(lang, "language_set"))
            .await?;

        if let Err(e) = ctx.store.add_subscriber(chat_id).await {
            log::error!("Subscribe failed for {chat_id}: {e}");
        }
        let first_name = q.from.first_name.clone();
        send_welcome(&bot, &ctx, chat_id, &first_name).await?;
    } else if let Some(code) = data.strip_prefix(commands::CB_CHANGE_LANG_PREFIX) {
        let lang = Lang::from_code(code);
        if let Err(e) = ctx.store.set_language(chat_id, lang).await {
            log::error!("Language save failed for {chat_id}: {e}");
        }
        bot.send_message(ChatId(chat_id), locale::text(lang, "language_set"))
            .await?;
    } else if let Some(key) = data.strip_prefix(commands::CB_FILM_PREFIX) {
        handle_film_details(&bot, &ctx, chat_id, key).await?;
    } else if data == commands::CB_BACK_TO_LIST {
        handle_films(&bot, &ctx, chat_id).await?;
    } else if let Some(source_id) = data.strip_prefix(commands::CB_SUBSCRIBE_PREFIX) {
        handle_subscribe_toggle(&bot, &ctx, chat_id, source_id, true).await?;
    } else if let Some(source_id) = data.strip_prefix(commands::CB_UNSUBSCRIBE_PREFIX) {
        handle_subscribe_toggle(&bot, &ctx, chat_id, source_id, false).await?;
    }

    Ok(())
}

async fn handle_subscribe_toggle(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: i64,
    source_id: &str,
    subscribe: bool,
) -> ResponseResult<()> {
    let lang = ctx.lang(chat_id).await;

    let Some(source) = ctx.registry.get(source_id) else {
        bot.send_message(ChatId(chat_id), locale::text(lang, "unknown_source"))
            .await?;
        return Ok(());
    };

    let result = if subscribe {
        ctx.store.add_subscription(chat_id, source_id).await
    } else {
        ctx.store.remove_subscription(chat_id, source_id).await
    };

    let key = match (subscribe, result) {
        (true, Ok(true)) => "subscribed_to_source",
        (true, Ok(false)) => "already_subscribed_source",
        (false, Ok(true)) => "unsubscribed_from_source",
        (false, Ok(false)) => "not_subscribed_source",
        (_, Err(e)) => {
            log::error!("Subscription toggle failed for {chat_id}: {e}");
            return Ok(());
        }
    };

    bot.send_message(
        ChatId(chat_id),
        locale::text_with(lang, key, &[("source_name", &source.name)]),
    )
    .await?;
    Ok(())
}

async fn handle_film_details(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: i64,
    key: &str,
) -> ResponseResult<()> {
    let lang = ctx.lang(chat_id).await;

    let films = browse_films(ctx).await.unwrap_or_default();
    let Some(film) = commands::find_film(&films, key) else {
        bot.send_message(ChatId(chat_id), locale::text(lang, "film_not_found"))
            .await?;
        return Ok(());
    };

    let caption = commands::film_details(film, lang, ctx.config.notify.showtimes_in_details);
    let markup = commands::back_keyboard(lang);

    let poster = film
        .poster_url
        .as_deref()
        .and_then(|url| Url::parse(url).ok());
    if let Some(poster) = poster {
        let sent = bot
            .send_photo(ChatId(chat_id), InputFile::url(poster))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(markup.clone())
            .await;
        match sent {
            Ok(_) => return Ok(()),
            Err(e) => log::warn!("Poster for '{}' failed: {e}. Sending text.", film.title),
        }
    }

    bot.send_message(ChatId(chat_id), caption)
        .parse_mode(ParseMode::Html)
        .reply_markup(markup)
        .await?;
    Ok(())
}

/// Push the current version notice once to a subscribed user still on an
/// older version. The stored version only advances after delivery.
async fn check_version_notice(bot: &Bot, ctx: &BotContext, chat_id: i64) {
    let store = ctx.store.as_ref();

    if !store.is_subscribed(chat_id, None).await.unwrap_or(false) {
        return;
    }
    let seen = match store.version(chat_id).await {
        Ok(seen) => seen,
        Err(e) => {
            log::warn!("Version lookup failed for {chat_id}: {e}");
            return;
        }
    };
    if seen == version::BOT_VERSION {
        return;
    }

    let lang = ctx.lang(chat_id).await;
    let Some(notice) = version::update_notice(version::BOT_VERSION, lang) else {
        return;
    };

    match bot
        .send_message(ChatId(chat_id), notice)
        .parse_mode(ParseMode::Html)
        .await
    {
        Ok(_) => {
            if let Err(e) = store.set_version(chat_id, version::BOT_VERSION).await {
                log::warn!("Version save failed for {chat_id}: {e}");
            }
        }
        Err(e) => log::warn!("Version notice to {chat_id} failed: {e}"),
    }
}
