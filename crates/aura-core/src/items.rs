//! Items held in a session's live context buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which input channel an item came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Transcribed teacher speech.
    Speech,
    /// Text recognized from a whiteboard snapshot.
    Visual,
}

/// One speech or visual text chunk in arrival order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BufferItem {
    /// Input channel.
    pub kind: ItemKind,
    /// Text content (transcript or recognized whiteboard text).
    pub text: String,
    /// When the content was captured.
    pub timestamp: DateTime<Utc>,
}

impl BufferItem {
    /// A speech item.
    #[must_use]
    pub fn speech(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: ItemKind::Speech,
            text: text.into(),
            timestamp,
        }
    }

    /// A visual item.
    #[must_use]
    pub fn visual(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: ItemKind::Visual,
            text: text.into(),
            timestamp,
        }
    }

    /// Render the item the way it appears inside assembled command context.
    #[must_use]
    pub fn render(&self) -> String {
        match self.kind {
            ItemKind::Speech => self.text.clone(),
            ItemKind::Visual => format!("[Drawing: {}]", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_renders_plain() {
        let item = BufferItem::speech("cells divide", Utc::now());
        assert_eq!(item.render(), "cells divide");
    }

    #[test]
    fn visual_renders_as_drawing() {
        let item = BufferItem::visual("E = mc^2", Utc::now());
        assert_eq!(item.render(), "[Drawing: E = mc^2]");
    }
}
