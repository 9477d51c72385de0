//! Shared types used across lexpilot modules

use serde::{Deserialize, Serialize};

/// Identifier of a managed tab. Allocated monotonically, never reused.
pub type TabId = u64;

/// Identifier of a browsing context, assigned by its factory
pub type ContextId = u64;

/// Bounds of an attached context inside the host window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl LayoutRect {
    /// Create a new rect
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The area left after reserving `rail` pixels on the left edge
    pub fn without_left_rail(&self, rail: u32) -> Self {
        let rail = rail.min(self.width);
        Self {
            x: self.x + rail as i32,
            y: self.y,
            width: self.width - rail,
            height: self.height,
        }
    }
}

/// One search hit, as returned by the crawler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchResult {
    /// Create a new search result
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// Small sample of the current page for lightweight polling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
