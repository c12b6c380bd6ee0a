use thiserror::Error;

use crate::store::MAX_CAPTION_LEN;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("caption is {len} characters long, the limit is {max}", max = MAX_CAPTION_LEN)]
    Validation { len: usize },
    #[error("no video matches the requested caption")]
    NotFound,
    #[error("telegram request failed: {0}")]
    Transport(#[from] teloxide::RequestError),
    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;
