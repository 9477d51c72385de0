//! Crawler module - headless search over official legal sources

pub mod extract;
pub mod filter;
mod service;

pub use service::CrawlerService;
