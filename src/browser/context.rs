//! Browsing context abstraction
//!
//! A browsing context is an isolated, script-capable document sandbox with
//! its own history and network identity. Backends implement
//! [`BrowsingContext`] and [`ContextFactory`]; the window that shows them
//! implements [`HostWindow`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::{ContextId, LayoutRect, Result, TabId};

/// Raw lifecycle notification pushed by a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    LoadingStarted,
    LoadingStopped,
    /// A top-level navigation committed
    Navigated { url: String },
    /// Fragment or history-API navigation inside the same document
    NavigatedInPage { url: String },
    TitleUpdated { title: String },
    Destroyed,
}

/// Answer to a page's request to open a new window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOpenAction {
    Allow,
    Deny,
}

/// Called with the requested URL whenever the page tries to open a window
pub type WindowOpenHandler = Arc<dyn Fn(&str) -> WindowOpenAction + Send + Sync>;

/// Options fixed when a context is created
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Human-readable label used in logs and session names
    pub label: String,
    /// Render without ever being shown
    pub offscreen: bool,
    /// User agent applied once, at creation
    pub user_agent: Option<String>,
}

impl ContextOptions {
    /// Options for a visible context
    pub fn visible(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Options for a hidden offscreen context
    pub fn offscreen(label: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            offscreen: true,
            user_agent: Some(user_agent.into()),
        }
    }
}

/// An isolated document sandbox
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// Identifier assigned by the factory
    fn id(&self) -> ContextId;

    /// Start loading `url` and wait until it commits
    async fn load_url(&self, url: &str) -> Result<()>;

    /// Evaluate a script in the page and return its JSON-serializable result
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value>;

    /// Add a stylesheet to the current document
    async fn insert_css(&self, css: &str) -> Result<()>;

    /// URL of the committed document
    async fn current_url(&self) -> Result<String>;

    /// Title of the current document
    async fn title(&self) -> Result<String>;

    /// Capture the visible area; returns the saved path or base64 data
    async fn capture_screenshot(&self, path: Option<&Path>) -> Result<String>;

    /// Attach a local file to the file input matching `selector`
    async fn upload_file(&self, selector: &str, path: &Path) -> Result<()>;

    /// Release all resources; in-flight operations fail with `ContextDestroyed`
    async fn destroy(&self) -> Result<()>;

    fn is_destroyed(&self) -> bool;

    /// Subscribe to lifecycle events
    fn events(&self) -> broadcast::Receiver<ContextEvent>;

    /// Replace the handler consulted before the page opens a new window
    fn set_window_open_handler(&self, handler: WindowOpenHandler);
}

/// Creates browsing contexts
#[async_trait]
pub trait ContextFactory: Send + Sync {
    async fn create(&self, options: ContextOptions) -> Result<Arc<dyn BrowsingContext>>;
}

/// The window that displays attached contexts
pub trait HostWindow: Send + Sync {
    /// Make the context visible in the window
    fn attach(&self, context: ContextId);

    /// Remove the context from the window without destroying it
    fn detach(&self, context: ContextId);

    fn set_bounds(&self, context: ContextId, bounds: LayoutRect);

    /// Let the context's bounds follow host resizes
    fn set_auto_resize(&self, context: ContextId, enabled: bool);

    /// Current content area of the window
    fn content_bounds(&self) -> LayoutRect;
}

/// Lifecycle update of a single view, derived from [`ContextEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ViewEvent {
    #[serde(rename = "update-loading")]
    Loading { loading: bool },
    #[serde(rename = "update-url")]
    Url { url: String },
    #[serde(rename = "update-title")]
    Title { title: String },
}

impl ViewEvent {
    /// Map a raw context event; `Destroyed` has no view-level counterpart
    pub fn from_context(event: &ContextEvent) -> Option<Self> {
        match event {
            ContextEvent::LoadingStarted => Some(Self::Loading { loading: true }),
            ContextEvent::LoadingStopped => Some(Self::Loading { loading: false }),
            ContextEvent::Navigated { url } | ContextEvent::NavigatedInPage { url } => {
                Some(Self::Url { url: url.clone() })
            }
            ContextEvent::TitleUpdated { title } => Some(Self::Title {
                title: title.clone(),
            }),
            ContextEvent::Destroyed => None,
        }
    }
}

/// Tab lifecycle event published by the view registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum TabEvent {
    #[serde(rename = "tab-created")]
    Created { tab_id: TabId, url: String },
    #[serde(rename = "tab-active")]
    Active { tab_id: TabId },
    #[serde(rename = "tab-closed")]
    Closed { tab_id: TabId },
    #[serde(rename = "update-loading")]
    Loading { tab_id: TabId, loading: bool },
    #[serde(rename = "update-url")]
    Url { tab_id: TabId, url: String },
    #[serde(rename = "update-title")]
    Title { tab_id: TabId, title: String },
}

impl TabEvent {
    /// Tag a view event with its tab
    pub fn for_tab(tab_id: TabId, event: ViewEvent) -> Self {
        match event {
            ViewEvent::Loading { loading } => Self::Loading { tab_id, loading },
            ViewEvent::Url { url } => Self::Url { tab_id, url },
            ViewEvent::Title { title } => Self::Title { tab_id, title },
        }
    }
}
