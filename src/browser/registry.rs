//! View registry - owns the managed tabs
//!
//! Tabs are independently navigable contexts. At most one is attached to the
//! host window at a time. Lifecycle changes are published as [`TabEvent`]s on
//! a broadcast channel; pages asking for a new window get a managed tab instead.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::browser::context::{
    BrowsingContext, ContextEvent, ContextFactory, ContextOptions, HostWindow, TabEvent,
    ViewEvent, WindowOpenAction,
};
use crate::core::{LayoutRect, Result, TabId};
use crate::inject::ScriptInjector;
use crate::plan::PlanTarget;

const EVENT_CAPACITY: usize = 256;

/// Public view of a managed tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub title: String,
    pub url: String,
}

struct Tab {
    context: Arc<dyn BrowsingContext>,
    title: String,
    url: String,
}

struct RegistryState {
    tabs: BTreeMap<TabId, Tab>,
    active: Option<TabId>,
    bounds: Option<LayoutRect>,
    next_id: TabId,
}

struct RegistryInner {
    factory: Arc<dyn ContextFactory>,
    host: Arc<dyn HostWindow>,
    injector: Option<Arc<ScriptInjector>>,
    state: Mutex<RegistryState>,
    events: broadcast::Sender<TabEvent>,
    popups: mpsc::UnboundedSender<String>,
}

/// Registry of managed tabs
///
/// Cloning is cheap and yields a handle to the same registry. Must be
/// constructed inside a Tokio runtime: a background task turns popup
/// requests into new tabs.
#[derive(Clone)]
pub struct ViewRegistry {
    inner: Arc<RegistryInner>,
}

impl ViewRegistry {
    /// Create an empty registry
    pub fn new(factory: Arc<dyn ContextFactory>, host: Arc<dyn HostWindow>) -> Self {
        Self::build(factory, host, None)
    }

    /// Create a registry that runs content-script injection on every navigation
    pub fn with_injector(
        factory: Arc<dyn ContextFactory>,
        host: Arc<dyn HostWindow>,
        injector: Arc<ScriptInjector>,
    ) -> Self {
        Self::build(factory, host, Some(injector))
    }

    fn build(
        factory: Arc<dyn ContextFactory>,
        host: Arc<dyn HostWindow>,
        injector: Option<Arc<ScriptInjector>>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (popups, popup_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(RegistryInner {
            factory,
            host,
            injector,
            state: Mutex::new(RegistryState {
                tabs: BTreeMap::new(),
                active: None,
                bounds: None,
                next_id: 1,
            }),
            events,
            popups,
        });
        tokio::spawn(popup_worker(Arc::downgrade(&inner), popup_rx));
        Self { inner }
    }

    /// Subscribe to tab lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<TabEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: TabEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Create a tab, start loading `url`, and optionally make it active
    pub async fn create_tab(&self, url: &str, set_active: bool) -> Result<TabId> {
        let tab_id = {
            let mut state = self.inner.state.lock().await;
            let id = state.next_id;
            state.next_id += 1;
            id
        };

        let context = self
            .inner
            .factory
            .create(ContextOptions::visible(format!("tab{}", tab_id)))
            .await?;

        let popups = self.inner.popups.clone();
        context.set_window_open_handler(Arc::new(move |requested: &str| {
            let _ = popups.send(requested.to_string());
            WindowOpenAction::Deny
        }));

        let events = context.events();
        {
            let mut state = self.inner.state.lock().await;
            state.tabs.insert(
                tab_id,
                Tab {
                    context: context.clone(),
                    title: String::new(),
                    url: url.to_string(),
                },
            );
        }
        self.emit(TabEvent::Created {
            tab_id,
            url: url.to_string(),
        });
        tracing::info!(tab_id, url, "tab created");

        tokio::spawn(pump_events(
            Arc::downgrade(&self.inner),
            tab_id,
            Arc::downgrade(&context),
            events,
        ));

        let loading = context.clone();
        let target = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = loading.load_url(&target).await {
                tracing::warn!(tab_id, url = %target, "initial load failed: {}", e);
            }
        });

        if set_active {
            self.set_active_tab(tab_id).await;
        }

        Ok(tab_id)
    }

    /// Attach `tab_id` exclusively; unknown ids are ignored
    pub async fn set_active_tab(&self, tab_id: TabId) {
        let mut state = self.inner.state.lock().await;
        self.activate_locked(&mut state, tab_id);
    }

    fn activate_locked(&self, state: &mut RegistryState, tab_id: TabId) {
        let Some(context_id) = state.tabs.get(&tab_id).map(|t| t.context.id()) else {
            tracing::debug!(tab_id, "set_active_tab ignored: unknown tab");
            return;
        };

        let host = &self.inner.host;
        if let Some(previous) = state.active.and_then(|id| state.tabs.get(&id)) {
            let previous_id = previous.context.id();
            if previous_id != context_id {
                host.detach(previous_id);
            }
        }

        host.attach(context_id);
        let bounds = state.bounds.unwrap_or_else(|| host.content_bounds());
        host.set_bounds(context_id, bounds);
        host.set_auto_resize(context_id, true);
        state.active = Some(tab_id);

        self.emit(TabEvent::Active { tab_id });
    }

    /// Close a tab and release its context; unknown ids are ignored
    ///
    /// Closing the active tab activates the most recently created remaining tab.
    pub async fn close_tab(&self, tab_id: TabId) {
        let context = {
            let mut state = self.inner.state.lock().await;
            let Some(tab) = state.tabs.remove(&tab_id) else {
                tracing::debug!(tab_id, "close_tab ignored: unknown tab");
                return;
            };

            self.emit(TabEvent::Closed { tab_id });

            if state.active == Some(tab_id) {
                self.inner.host.detach(tab.context.id());
                state.active = None;
                if let Some(next) = state.tabs.keys().next_back().copied() {
                    self.activate_locked(&mut state, next);
                }
            }
            tab.context
        };

        if let Err(e) = context.destroy().await {
            tracing::warn!(tab_id, "failed to release context: {}", e);
        }
        tracing::info!(tab_id, "tab closed");
    }

    /// Store `rect` and apply it to the active tab
    pub async fn update_bounds(&self, rect: LayoutRect) {
        let mut state = self.inner.state.lock().await;
        state.bounds = Some(rect);
        if let Some(tab) = state.active.and_then(|id| state.tabs.get(&id)) {
            let context_id = tab.context.id();
            self.inner.host.set_bounds(context_id, rect);
            self.inner.host.set_auto_resize(context_id, true);
        }
    }

    /// Evaluate a script in the active tab; `None` when no tab is active
    pub async fn execute_script(&self, script: &str) -> Result<Option<serde_json::Value>> {
        match self.active_context_handle().await {
            Some(context) => context.execute_script(script).await.map(Some),
            None => Ok(None),
        }
    }

    /// Navigate the active tab, or open a new active tab when there is none
    pub async fn navigate_to(&self, url: &str) -> Result<()> {
        match self.active_context_handle().await {
            Some(context) => context
                .load_url(url)
                .await
                .map_err(|e| e.into_hard_navigation_error()),
            None => self.create_tab(url, true).await.map(|_| ()),
        }
    }

    async fn active_context_handle(&self) -> Option<Arc<dyn BrowsingContext>> {
        let state = self.inner.state.lock().await;
        state
            .active
            .and_then(|id| state.tabs.get(&id))
            .map(|t| t.context.clone())
    }

    /// Id of the attached tab
    pub async fn active_tab_id(&self) -> Option<TabId> {
        self.inner.state.lock().await.active
    }

    /// Snapshot of one tab
    pub async fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
        let state = self.inner.state.lock().await;
        state.tabs.get(&tab_id).map(|t| TabInfo {
            id: tab_id,
            title: t.title.clone(),
            url: t.url.clone(),
        })
    }

    /// Snapshot of all tabs in creation order
    pub async fn tabs(&self) -> Vec<TabInfo> {
        let state = self.inner.state.lock().await;
        state
            .tabs
            .iter()
            .map(|(id, t)| TabInfo {
                id: *id,
                title: t.title.clone(),
                url: t.url.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl PlanTarget for ViewRegistry {
    async fn active_context(&self) -> Option<Arc<dyn BrowsingContext>> {
        self.active_context_handle().await
    }
}

/// Relay one tab's context events until the context goes away
async fn pump_events(
    registry: Weak<RegistryInner>,
    tab_id: TabId,
    context: Weak<dyn BrowsingContext>,
    mut events: broadcast::Receiver<ContextEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(ContextEvent::Destroyed) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(tab_id, skipped, "tab event relay lagged");
                continue;
            }
        };

        let Some(inner) = registry.upgrade() else {
            break;
        };

        if let Some(update) = ViewEvent::from_context(&event) {
            {
                let mut state = inner.state.lock().await;
                let Some(tab) = state.tabs.get_mut(&tab_id) else {
                    break;
                };
                match &update {
                    ViewEvent::Url { url } => tab.url = url.clone(),
                    ViewEvent::Title { title } => tab.title = title.clone(),
                    ViewEvent::Loading { .. } => {}
                }
            }
            let _ = inner.events.send(TabEvent::for_tab(tab_id, update));
        }

        if let (ContextEvent::Navigated { url }, Some(injector)) = (&event, &inner.injector) {
            if let Some(context) = context.upgrade() {
                injector.inject(context.as_ref(), url).await;
            }
        }
    }
    tracing::trace!(tab_id, "tab event relay finished");
}

/// Open each intercepted popup URL as a new active tab
async fn popup_worker(registry: Weak<RegistryInner>, mut requests: mpsc::UnboundedReceiver<String>) {
    while let Some(url) = requests.recv().await {
        let Some(inner) = registry.upgrade() else {
            break;
        };
        tracing::debug!(url = %url, "redirecting popup into a managed tab");
        let registry = ViewRegistry { inner };
        if let Err(e) = registry.create_tab(&url, true).await {
            tracing::warn!(url = %url, "failed to open popup as tab: {}", e);
        }
    }
}
