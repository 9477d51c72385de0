//! Single-context manager for the portal view
//!
//! Owns one fixed-purpose context laid out beside a navigation rail in the
//! host window. Hiding detaches the context without destroying it, so
//! history, scroll position and form input survive.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};

use crate::browser::context::{
    BrowsingContext, ContextEvent, ContextFactory, ContextOptions, HostWindow, ViewEvent,
};
use crate::core::{truncate_chars, Config, LayoutRect, PageData, PilotError, Result};
use crate::inject::ScriptInjector;
use crate::plan::PlanTarget;

const EVENT_CAPACITY: usize = 64;
const COMPONENT: &str = "SingleContextManager";

const PAGE_DATA_SCRIPT: &str = r#"(() => ({
  url: location.href,
  title: document.title,
  text: (document.body ? document.body.innerText : '').slice(0, 4000)
}))()"#;

#[derive(Deserialize, Default)]
struct RawPageData {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
}

/// Manager for one long-lived context with a reserved side rail
pub struct SingleContextManager {
    factory: Arc<dyn ContextFactory>,
    host: Arc<dyn HostWindow>,
    injector: Option<Arc<ScriptInjector>>,
    label: String,
    side_rail_width: u32,
    page_sample_chars: usize,
    context: Mutex<Option<Arc<dyn BrowsingContext>>>,
    events: broadcast::Sender<ViewEvent>,
}

impl SingleContextManager {
    pub fn new(
        factory: Arc<dyn ContextFactory>,
        host: Arc<dyn HostWindow>,
        side_rail_width: u32,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            factory,
            host,
            injector: None,
            label: "portal".to_string(),
            side_rail_width,
            page_sample_chars: 2000,
            context: Mutex::new(None),
            events,
        }
    }

    /// Build from configuration
    pub fn from_config(
        config: &Config,
        factory: Arc<dyn ContextFactory>,
        host: Arc<dyn HostWindow>,
    ) -> Self {
        let mut manager = Self::new(factory, host, config.layout.side_rail_width);
        manager.page_sample_chars = config.executor.page_sample_chars;
        manager
    }

    /// Run content-script injection on every committed navigation
    pub fn with_injector(mut self, injector: Arc<ScriptInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Subscribe to lifecycle events of the managed context
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn layout(&self) -> LayoutRect {
        self.host
            .content_bounds()
            .without_left_rail(self.side_rail_width)
    }

    /// Create and attach the context; later calls return `true` without side effects
    pub async fn initialize(&self) -> Result<bool> {
        let mut slot = self.context.lock().await;
        if slot.is_some() {
            return Ok(true);
        }

        let context = self
            .factory
            .create(ContextOptions::visible(self.label.clone()))
            .await?;
        let context_id = context.id();

        self.host.attach(context_id);
        self.host.set_bounds(context_id, self.layout());
        self.host.set_auto_resize(context_id, true);

        tokio::spawn(relay_events(
            self.events.clone(),
            self.injector.clone(),
            Arc::downgrade(&context),
            context.events(),
        ));

        *slot = Some(context);
        tracing::info!(context = context_id, "portal view initialized");
        Ok(true)
    }

    async fn handle(&self) -> Option<Arc<dyn BrowsingContext>> {
        self.context.lock().await.clone()
    }

    async fn require(&self) -> Result<Arc<dyn BrowsingContext>> {
        self.handle()
            .await
            .ok_or_else(|| PilotError::uninitialized(COMPONENT))
    }

    /// Re-apply the rail layout from the host's current size
    pub async fn update_bounds(&self) {
        if let Some(context) = self.handle().await {
            self.host.set_bounds(context.id(), self.layout());
        }
    }

    /// Navigate, creating the context first if needed
    pub async fn navigate_to(&self, url: &str) -> Result<()> {
        self.initialize().await?;
        let context = self.require().await?;
        tracing::debug!(url, "portal navigation");
        context
            .load_url(url)
            .await
            .map_err(|e| e.into_hard_navigation_error())
    }

    /// Evaluate a script in the managed context
    pub async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        self.require().await?.execute_script(script).await
    }

    /// Re-attach the context with its state intact
    pub async fn show(&self) {
        if let Some(context) = self.handle().await {
            let context_id = context.id();
            self.host.attach(context_id);
            self.host.set_bounds(context_id, self.layout());
            self.host.set_auto_resize(context_id, true);
        }
    }

    /// Detach the context without destroying it
    pub async fn hide(&self) {
        if let Some(context) = self.handle().await {
            self.host.detach(context.id());
        }
    }

    /// URL, title and a bounded slice of visible text
    pub async fn get_page_data(&self) -> Result<PageData> {
        let value = self.execute_script(PAGE_DATA_SCRIPT).await?;
        let raw: RawPageData = serde_json::from_value(value).unwrap_or_default();
        Ok(PageData {
            url: raw.url,
            title: raw.title,
            text: truncate_chars(raw.text.trim(), self.page_sample_chars).to_string(),
        })
    }

    /// Detach and destroy the context; the next navigation creates a fresh one
    pub async fn shutdown(&self) -> Result<()> {
        let Some(context) = self.context.lock().await.take() else {
            return Ok(());
        };
        self.host.detach(context.id());
        context.destroy().await
    }
}

#[async_trait]
impl PlanTarget for SingleContextManager {
    async fn active_context(&self) -> Option<Arc<dyn BrowsingContext>> {
        self.handle().await
    }
}

async fn relay_events(
    sender: broadcast::Sender<ViewEvent>,
    injector: Option<Arc<ScriptInjector>>,
    context: Weak<dyn BrowsingContext>,
    mut events: broadcast::Receiver<ContextEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(ContextEvent::Destroyed) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "portal event relay lagged");
                continue;
            }
        };

        if let Some(update) = ViewEvent::from_context(&event) {
            let _ = sender.send(update);
        }

        if let (ContextEvent::Navigated { url }, Some(injector)) = (&event, &injector) {
            if let Some(context) = context.upgrade() {
                injector.inject(context.as_ref(), url).await;
            }
        }
    }
}
