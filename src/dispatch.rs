//! Routing of inbound messages and the handlers behind each route.
//!
//! Handlers never talk to Telegram directly. They return [`Reply`] values that
//! the transport layer in [`crate::bot`] delivers, which keeps every rule here
//! testable against an in-memory [`Store`].

use teloxide::types::{KeyboardMarkup, UserId};
use teloxide::utils::command::BotCommands;

use crate::error::{BotError, Result};
use crate::keyboard::{videos_keyboard, ELLIPSIS};
use crate::store::{validate_caption, Store, Video};

pub const DEFAULT_CAPTION: &str = "Untitled";

pub const WELCOME: &str = "🎬 Welcome! Pick a video from the menu below:";
pub const NO_VIDEOS: &str = "📝 No videos yet. The administrator can add some.";
pub const CAPTION_TOO_LONG: &str = "❌ Caption is too long (max 100 characters)";
pub const VIDEO_SAVED: &str = "✅ Video saved!";
pub const VIDEO_UPDATED: &str = "✅ Video updated!";
pub const NOT_FOUND_PICK: &str = "❌ Video not found. Please pick one from the menu:";
pub const NOT_FOUND: &str = "❌ Video not found.";
pub const NO_PERMISSION: &str =
    "❌ You are not allowed to upload videos. Please contact the administrator.";
pub const SEND_FAILED: &str = "❌ Failed to send the video";
pub const GENERIC_ERROR: &str = "❌ Something went wrong";

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Show the video menu.")]
    Start,
    #[command(description = "Display this help message.")]
    Help,
}

/// What an inbound message carries, independent of the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    Command(Command),
    Video { file_id: String, caption: Option<String> },
    Text(String),
    Other,
}

#[derive(Clone, Debug)]
pub struct Incoming {
    pub sender: Option<UserId>,
    pub content: Content,
}

/// An outbound action for the transport to perform.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Text { text: String, keyboard: Option<KeyboardMarkup> },
    Video { file_id: String, caption: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text { text: text.into(), keyboard: None }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Option<KeyboardMarkup>) -> Self {
        Reply::Text { text: text.into(), keyboard }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Start,
    Help,
    AdminUpload { file_id: String, caption: String },
    RejectUpload,
    CaptionLookup(String),
    Ignore,
}

/// Everything a handler needs, built once at startup.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub admin_id: UserId,
    pub store: Store,
}

impl AppContext {
    pub fn new(admin_id: UserId, store: Store) -> Self {
        Self { admin_id, store }
    }

    fn is_admin(&self, sender: Option<UserId>) -> bool {
        sender == Some(self.admin_id)
    }
}

pub fn classify(ctx: &AppContext, incoming: Incoming) -> Route {
    match incoming.content {
        Content::Command(Command::Start) => Route::Start,
        Content::Command(Command::Help) => Route::Help,
        Content::Video { file_id, caption } if ctx.is_admin(incoming.sender) => {
            let caption = caption
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_CAPTION)
                .to_string();
            Route::AdminUpload { file_id, caption }
        }
        Content::Video { .. } => Route::RejectUpload,
        Content::Text(text) => Route::CaptionLookup(text),
        Content::Other => Route::Ignore,
    }
}

/// Runs the handler for `incoming`. Store failures are logged and turned into
/// a generic reply here; nothing escapes to the message loop.
pub async fn handle(ctx: &AppContext, incoming: Incoming) -> Vec<Reply> {
    let route = classify(ctx, incoming);
    log::debug!("Routing message to {:?}", route);

    let result = match route {
        Route::Start => start(ctx).await,
        Route::Help => Ok(vec![help()]),
        Route::AdminUpload { file_id, caption } => admin_upload(ctx, &file_id, &caption).await,
        Route::RejectUpload => Ok(vec![Reply::text(NO_PERMISSION)]),
        Route::CaptionLookup(text) => caption_lookup(ctx, &text).await,
        Route::Ignore => Ok(Vec::new()),
    };

    result.unwrap_or_else(|e| {
        log::error!("Handler failed: {}", e);
        vec![Reply::text(GENERIC_ERROR)]
    })
}

async fn start(ctx: &AppContext) -> Result<Vec<Reply>> {
    let videos = ctx.store.list_all().await?;
    let reply = match videos_keyboard(&videos) {
        Some(keyboard) => Reply::with_keyboard(WELCOME, Some(keyboard)),
        None => Reply::text(NO_VIDEOS),
    };
    Ok(vec![reply])
}

pub fn help() -> Reply {
    Reply::text(format!(
        "{}\n\n\
        For the administrator:\n\
        - Send a video with a caption to add it to the menu.\n\
        - Send the same video again with a new caption to rename it.\n\n\
        For everyone:\n\
        - Pick a video from the menu, or type the beginning of its caption.",
        Command::descriptions()
    ))
}

async fn admin_upload(ctx: &AppContext, file_id: &str, caption: &str) -> Result<Vec<Reply>> {
    if let Err(e) = validate_caption(caption) {
        log::info!("Rejected upload: {}", e);
        return Ok(vec![Reply::text(CAPTION_TOO_LONG)]);
    }

    let (video, created) = ctx.store.upsert_by_file_id(file_id, caption).await?;
    log::info!(
        "Video {}: {}",
        if created { "created" } else { "updated" },
        video.caption
    );

    let keyboard = videos_keyboard(&ctx.store.list_all().await?);
    let text = if created { VIDEO_SAVED } else { VIDEO_UPDATED };
    Ok(vec![Reply::with_keyboard(text, keyboard)])
}

/// Exact caption first, then the oldest caption starting with `text`.
///
/// A tapped menu button sends its truncated label, so a trailing ellipsis is
/// dropped for one more prefix attempt.
pub async fn resolve_caption(store: &Store, text: &str) -> Result<Video> {
    if let Some(video) = store.find_by_exact_caption(text).await? {
        return Ok(video);
    }
    if let Some(video) = store.find_by_caption_prefix(text).await? {
        return Ok(video);
    }
    match text.strip_suffix(ELLIPSIS) {
        Some(label) if !label.is_empty() => store
            .find_by_caption_prefix(label)
            .await?
            .ok_or(BotError::NotFound),
        _ => Err(BotError::NotFound),
    }
}

async fn caption_lookup(ctx: &AppContext, text: &str) -> Result<Vec<Reply>> {
    match resolve_caption(&ctx.store, text).await {
        Ok(video) => Ok(vec![Reply::Video {
            file_id: video.file_id,
            caption: video.caption,
        }]),
        Err(BotError::NotFound) => {
            let reply = match videos_keyboard(&ctx.store.list_all().await?) {
                Some(keyboard) => Reply::with_keyboard(NOT_FOUND_PICK, Some(keyboard)),
                None => Reply::text(NOT_FOUND),
            };
            Ok(vec![reply])
        }
        Err(e) => Err(e),
    }
}
