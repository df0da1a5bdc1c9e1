use serde::{Deserialize, Serialize};

use super::JokeId;

/// Text shown when a rated joke is no longer in the catalog
pub const MISSING_JOKE_TEXT: &str = "N/A";

/// A joke from the static catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Joke {
    pub joke_id: JokeId,
    pub joke_text: String,
}

impl Joke {
    pub fn new(joke_id: JokeId, joke_text: impl Into<String>) -> Self {
        Self {
            joke_id,
            joke_text: joke_text.into(),
        }
    }

    /// Joke text cut down to `max_chars` characters, with a trailing ellipsis
    /// when anything was removed
    pub fn preview(&self, max_chars: usize) -> String {
        truncate_text(&self.joke_text, max_chars)
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
