//! Telegram side of the bot: update routing, message conversion and reply delivery.

use std::sync::Arc;

use anyhow::Context;
use teloxide::dispatching::UpdateHandler;
use teloxide::{prelude::*, types::*, utils::command::BotCommands};

use crate::config::Config;
use crate::dispatch::{self, AppContext, Command, Content, Incoming, Reply};
use crate::error::{BotError, Result};
use crate::store::Store;

pub type SharedContext = Arc<AppContext>;
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Connects the store, registers commands and polls for updates until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("opening video store at {}", config.database_url))?;
    log::info!("Video store ready with {} videos", store.count().await?);

    let bot = Bot::new(&config.tg_token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Could not register bot commands: {:?}", e);
    }

    let ctx: SharedContext = Arc::new(AppContext::new(config.admin_id(), store.clone()));

    Dispatcher::builder(bot, handler_tree())
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    store.close().await;
    log::info!("Bot stopped");
    Ok(())
}

pub fn handler_tree() -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(Update::filter_message().filter_command::<Command>().endpoint(handle_command))
        .branch(Update::filter_message().endpoint(handle_message))
}

/// Handler for `/start` and `/help`.
async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: SharedContext,
) -> HandlerResult {
    let incoming = Incoming {
        sender: sender_of(&msg),
        content: Content::Command(cmd),
    };
    respond(&bot, msg.chat.id, &ctx, incoming).await
}

/// Handler for everything else: uploads and caption lookups.
async fn handle_message(bot: Bot, msg: Message, ctx: SharedContext) -> HandlerResult {
    let incoming = Incoming {
        sender: sender_of(&msg),
        content: content_of(&msg),
    };
    respond(&bot, msg.chat.id, &ctx, incoming).await
}

fn sender_of(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|user| user.id)
}

pub fn content_of(msg: &Message) -> Content {
    if let Some(video) = msg.video() {
        Content::Video {
            file_id: video.file.id.to_string(),
            caption: msg.caption().map(str::to_string),
        }
    } else if let Some(text) = msg.text() {
        Content::Text(text.to_string())
    } else {
        Content::Other
    }
}

/// Delivers the handler's replies. Failures are logged and reported to the
/// user; none reach the dispatcher.
async fn respond(bot: &Bot, chat_id: ChatId, ctx: &AppContext, incoming: Incoming) -> HandlerResult {
    for reply in dispatch::handle(ctx, incoming).await {
        let is_video = matches!(reply, Reply::Video { .. });
        if let Err(e) = deliver(bot, chat_id, reply).await {
            log::error!("Failed to deliver reply: {}", e);
            if let Err(e) = bot.send_message(chat_id, failure_notice(&e, is_video)).await {
                log::error!("Failed to deliver failure notice: {}", e);
            }
        }
    }
    Ok(())
}

/// Message shown to the user when delivering a reply fails.
pub fn failure_notice(error: &BotError, is_video: bool) -> &'static str {
    match error {
        BotError::Transport(_) if is_video => dispatch::SEND_FAILED,
        _ => dispatch::GENERIC_ERROR,
    }
}

async fn deliver(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    match reply {
        Reply::Text { text, keyboard } => {
            let request = bot.send_message(chat_id, text);
            match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await?,
                None => request.await?,
            };
        }
        Reply::Video { file_id, caption } => {
            bot.send_video(chat_id, InputFile::file_id(file_id))
                .caption(caption.clone())
                .await?;
            log::info!("Sent video: {}", caption);
        }
    }
    Ok(())
}
