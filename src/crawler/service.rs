//! Headless jurisprudence crawler
//!
//! Owns one hidden offscreen context, created on first use and recreated if
//! it has been destroyed. A search runs search → filter → deep fetch; each
//! deep-fetch target fails on its own without affecting the others.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::browser::{BrowsingContext, ContextFactory, ContextOptions};
use crate::core::config::CrawlerConfig;
use crate::core::{PilotError, Result, SearchResult};
use crate::crawler::extract::{
    content_script, degraded_snippet, enriched_snippet, page_excerpt, parse_results,
    search_results_script,
};
use crate::crawler::filter::{filter_official, no_official_result, search_url};

/// Search service backed by a hidden context
pub struct CrawlerService {
    factory: Arc<dyn ContextFactory>,
    config: CrawlerConfig,
    context: Mutex<Option<Arc<dyn BrowsingContext>>>,
    /// Held for a whole search so runs never interleave on the shared context
    run_lock: Mutex<()>,
}

impl CrawlerService {
    pub fn new(factory: Arc<dyn ContextFactory>, config: CrawlerConfig) -> Self {
        Self {
            factory,
            config,
            context: Mutex::new(None),
            run_lock: Mutex::new(()),
        }
    }

    /// The hidden context, created if missing or destroyed
    pub async fn get_or_create(&self) -> Result<Arc<dyn BrowsingContext>> {
        let mut slot = self.context.lock().await;
        if let Some(context) = slot.as_ref() {
            if !context.is_destroyed() {
                return Ok(context.clone());
            }
            tracing::debug!("crawler context was destroyed, recreating");
        }

        let context = self
            .factory
            .create(ContextOptions::offscreen("crawler", &self.config.user_agent))
            .await?;
        tracing::info!(context = context.id(), "crawler context created");
        *slot = Some(context.clone());
        Ok(context)
    }

    /// Release the hidden context; the next search creates a new one
    pub async fn destroy(&self) -> Result<()> {
        let taken = self.context.lock().await.take();
        match taken {
            Some(context) => context.destroy().await,
            None => Ok(()),
        }
    }

    /// Search official sources for `query` and enrich up to the configured
    /// number of hits with their full page text
    pub async fn search_jurisprudence(&self, query: &str) -> Result<Vec<SearchResult>> {
        let _run = self.run_lock.lock().await;

        let url = search_url(
            &self.config.search_endpoint,
            query,
            &self.config.domain_qualifier,
        )?;
        let context = self.get_or_create().await?;

        tracing::info!(query, "searching jurisprudence");
        match context.load_url(&url).await {
            Ok(()) => {}
            Err(PilotError::NavigationAborted(_)) => {
                tracing::debug!("search navigation aborted or redirected, continuing");
            }
            Err(e) => return Err(e),
        }

        sleep(Duration::from_millis(self.config.settle_ms)).await;

        let raw = parse_results(context.execute_script(&search_results_script()).await?)?;
        let found = raw.len();
        let mut results = filter_official(raw, self.config.max_results);
        tracing::debug!(found, kept = results.len(), "search results filtered");

        if results.is_empty() {
            return Ok(vec![no_official_result(&url)]);
        }

        for result in results.iter_mut() {
            self.deep_fetch(context.as_ref(), result).await;
        }

        Ok(results)
    }

    /// Replace the snippet with page text, or annotate it on failure
    async fn deep_fetch(&self, context: &dyn BrowsingContext, result: &mut SearchResult) {
        match self.fetch_excerpt(context, &result.url).await {
            Ok(excerpt) => result.snippet = enriched_snippet(&excerpt),
            Err(e) => {
                tracing::warn!(url = %result.url, "deep fetch failed: {}", e);
                result.snippet = degraded_snippet(&result.snippet, &e);
            }
        }
    }

    async fn fetch_excerpt(&self, context: &dyn BrowsingContext, url: &str) -> Result<String> {
        context
            .load_url(url)
            .await
            .map_err(|e| e.into_hard_navigation_error())?;
        sleep(self.jittered_settle()).await;

        let text = context.execute_script(&content_script()).await?;
        page_excerpt(&text, self.config.snippet_chars)
    }

    fn jittered_settle(&self) -> Duration {
        let low = self.config.deep_settle_min_ms;
        let high = self.config.deep_settle_max_ms.max(low);
        let ms = if high > low {
            rand::rng().random_range(low..=high)
        } else {
            low
        };
        Duration::from_millis(ms)
    }
}
