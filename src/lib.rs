//! lexpilot - browser automation for a legal case-management portal
//!
//! Manages isolated browsing contexts, injects content scripts into matching
//! pages, executes plans produced by an external planner, and runs a headless
//! search pipeline over official legal sources.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **Browser**: Context backends, the tab registry and the portal view
//! - **Inject**: Content-script manifest matching and injection
//! - **Plan**: Plan model and the sequential executor
//! - **Crawler**: Search → filter → deep-fetch pipeline
//! - **Planner**: HTTP client for the external planning service
//! - **CLI**: Subcommands and the terminal approval prompt
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lexpilot::browser::AgentBrowserFactory;
//! use lexpilot::crawler::CrawlerService;
//! use lexpilot::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load();
//!     let factory = Arc::new(AgentBrowserFactory::new(config.browser.clone()));
//!     let crawler = CrawlerService::new(factory, config.crawler.clone());
//!
//!     for hit in crawler.search_jurisprudence("dano moral bancário").await.unwrap() {
//!         println!("{} - {}", hit.title, hit.url);
//!     }
//! }
//! ```

pub mod browser;
pub mod cli;
pub mod core;
pub mod crawler;
pub mod inject;
pub mod plan;
pub mod planner;

// Re-export commonly used items
pub use core::{Config, PilotError, Result};
