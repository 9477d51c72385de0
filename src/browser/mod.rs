//! Browser module - contexts, the tab registry and the portal view
//!
//! Contexts are driven through the agent-browser CLI; the registry and the
//! single-context manager decide which one the host window shows.

mod agent_browser;
pub mod context;
mod host;
mod registry;
mod single;

pub use agent_browser::{AgentBrowserContext, AgentBrowserFactory};
pub use context::{
    BrowsingContext, ContextEvent, ContextFactory, ContextOptions, HostWindow, TabEvent,
    ViewEvent, WindowOpenAction, WindowOpenHandler,
};
pub use host::HeadlessHost;
pub use registry::{TabInfo, ViewRegistry};
pub use single::SingleContextManager;
