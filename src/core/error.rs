//! Custom error types for lexpilot
//!
//! One error enum covers the whole crate. Item-scoped failures (a single
//! deep-fetch target, a single injected file) are caught at their scope and
//! never surface here as a returned error; everything else propagates.

use thiserror::Error;

/// Main error type for lexpilot operations
#[derive(Error, Debug)]
pub enum PilotError {
    /// The navigation was aborted or replaced by a redirect before committing
    #[error("Navigation to {0} was aborted")]
    NavigationAborted(String),

    /// The navigation failed outright
    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// Content could not be extracted from a page
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// A CSS or JS file could not be injected
    #[error("Injection of {file} failed: {reason}")]
    InjectionFailed { file: String, reason: String },

    /// A success criterion or selector wait ran out of time
    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    StepTimeout { what: String, timeout_ms: u64 },

    /// A step could not find the element it targets
    #[error("No element matches selector '{0}'")]
    ElementNotFound(String),

    /// Operation attempted before a context was created
    #[error("{0} is not initialized")]
    UninitializedContext(String),

    /// The context was destroyed while the operation was in flight
    #[error("Browsing context {0} was destroyed")]
    ContextDestroyed(u64),

    /// A plan stopped at a failing step; later steps were not attempted
    #[error("Plan aborted at step {step} ({description}): {source}")]
    PlanAborted {
        step: usize,
        description: String,
        #[source]
        source: Box<PilotError>,
    },

    /// The operator declined to run a plan
    #[error("Plan execution was cancelled by the operator")]
    PlanCancelled,

    /// Planner service errors
    #[error("Planner error: {0}")]
    Planner(String),

    /// Browser backend errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for lexpilot operations
pub type Result<T> = std::result::Result<T, PilotError>;

impl PilotError {
    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a planner error
    pub fn planner(msg: impl Into<String>) -> Self {
        Self::Planner(msg.into())
    }

    /// Create a navigation failure
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NavigationFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an uninitialized-context error naming the component
    pub fn uninitialized(component: impl Into<String>) -> Self {
        Self::UninitializedContext(component.into())
    }

    /// Outside the crawler's search step an aborted navigation counts as a failure
    pub fn into_hard_navigation_error(self) -> Self {
        match self {
            Self::NavigationAborted(url) => Self::NavigationFailed {
                url,
                reason: "navigation aborted".to_string(),
            },
            other => other,
        }
    }

    /// Index of the failing step, when this error aborted a plan
    pub fn failed_step(&self) -> Option<usize> {
        match self {
            Self::PlanAborted { step, .. } => Some(*step),
            _ => None,
        }
    }
}
