use teloxide::types::{KeyboardButton, KeyboardMarkup};

use crate::store::Video;

/// Button labels longer than this are cut and suffixed with [`ELLIPSIS`].
pub const MAX_LABEL_LEN: usize = 30;
pub const ELLIPSIS: &str = "...";
pub const BUTTONS_PER_ROW: usize = 3;

pub fn button_label(caption: &str) -> String {
    match caption.char_indices().nth(MAX_LABEL_LEN) {
        Some((cut, _)) => format!("{}{}", &caption[..cut], ELLIPSIS),
        None => caption.to_string(),
    }
}

/// Reply keyboard with one button per video, or `None` when there is nothing to choose.
pub fn videos_keyboard(videos: &[Video]) -> Option<KeyboardMarkup> {
    if videos.is_empty() {
        return None;
    }

    let rows: Vec<Vec<KeyboardButton>> = videos
        .chunks(BUTTONS_PER_ROW)
        .map(|row| {
            row.iter()
                .map(|video| KeyboardButton::new(button_label(&video.caption)))
                .collect()
        })
        .collect();

    Some(KeyboardMarkup::new(rows).resize_keyboard())
}
