//! In-memory contexts, factories and hosts for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lexpilot::browser::{
    BrowsingContext, ContextEvent, ContextFactory, ContextOptions, HostWindow, WindowOpenAction,
    WindowOpenHandler,
};
use lexpilot::core::{ContextId, LayoutRect};
use lexpilot::{PilotError, Result};
use serde_json::Value;
use tokio::sync::broadcast;

/// Answers a script given (current url, script)
pub type Responder = Arc<dyn Fn(&str, &str) -> Result<Value> + Send + Sync>;

/// Decides whether a load of `url` succeeds
pub type LoadHook = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct Behavior {
    pub responder: Responder,
    pub on_load: LoadHook,
    /// How long each script evaluation takes
    pub script_delay: Duration,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            responder: Arc::new(|_, _| Ok(Value::Bool(true))),
            on_load: Arc::new(|_| Ok(())),
            script_delay: Duration::ZERO,
        }
    }
}

impl Behavior {
    pub fn responding(responder: impl Fn(&str, &str) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            ..Default::default()
        }
    }

    pub fn with_load_hook(mut self, hook: impl Fn(&str) -> Result<()> + Send + Sync + 'static) -> Self {
        self.on_load = Arc::new(hook);
        self
    }

    pub fn with_script_delay(mut self, delay: Duration) -> Self {
        self.script_delay = delay;
        self
    }
}

pub struct FakeContext {
    id: ContextId,
    pub options: ContextOptions,
    behavior: Behavior,
    url: Mutex<String>,
    pub loads: Mutex<Vec<String>>,
    pub scripts: Mutex<Vec<String>>,
    pub css: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, String)>>,
    destroyed: AtomicBool,
    pub native_windows: AtomicUsize,
    events: broadcast::Sender<ContextEvent>,
    handler: Mutex<Option<WindowOpenHandler>>,
}

impl FakeContext {
    fn new(id: ContextId, options: ContextOptions, behavior: Behavior) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            id,
            options,
            behavior,
            url: Mutex::new("about:blank".to_string()),
            loads: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            css: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            native_windows: AtomicUsize::new(0),
            events,
            handler: Mutex::new(None),
        }
    }

    fn check_alive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            Err(PilotError::ContextDestroyed(self.id))
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: ContextEvent) {
        let _ = self.events.send(event);
    }

    /// The page asks to open `url` in a new window
    pub fn simulate_popup(&self, url: &str) {
        let handler = self.handler.lock().unwrap().clone();
        let action = handler.map(|h| h(url)).unwrap_or(WindowOpenAction::Allow);
        if action == WindowOpenAction::Allow {
            self.native_windows.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Fragment navigation inside the current document
    pub fn simulate_in_page_navigation(&self, url: &str) {
        *self.url.lock().unwrap() = url.to_string();
        self.emit(ContextEvent::NavigatedInPage {
            url: url.to_string(),
        });
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn css(&self) -> Vec<String> {
        self.css.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowsingContext for FakeContext {
    fn id(&self) -> ContextId {
        self.id
    }

    async fn load_url(&self, url: &str) -> Result<()> {
        self.check_alive()?;
        self.emit(ContextEvent::LoadingStarted);
        if let Err(e) = (self.behavior.on_load)(url) {
            self.emit(ContextEvent::LoadingStopped);
            return Err(e);
        }
        *self.url.lock().unwrap() = url.to_string();
        self.loads.lock().unwrap().push(url.to_string());
        self.emit(ContextEvent::Navigated {
            url: url.to_string(),
        });
        self.emit(ContextEvent::TitleUpdated {
            title: format!("Title of {}", url),
        });
        self.emit(ContextEvent::LoadingStopped);
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        self.check_alive()?;
        self.scripts.lock().unwrap().push(script.to_string());
        if !self.behavior.script_delay.is_zero() {
            tokio::time::sleep(self.behavior.script_delay).await;
            self.check_alive()?;
        }
        let url = self.url.lock().unwrap().clone();
        (self.behavior.responder)(&url, script)
    }

    async fn insert_css(&self, css: &str) -> Result<()> {
        self.check_alive()?;
        self.css.lock().unwrap().push(css.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.check_alive()?;
        Ok(self.url.lock().unwrap().clone())
    }

    async fn title(&self) -> Result<String> {
        self.check_alive()?;
        Ok(format!("Title of {}", self.url.lock().unwrap()))
    }

    async fn capture_screenshot(&self, path: Option<&Path>) -> Result<String> {
        self.check_alive()?;
        Ok(path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "iVBORw0KGgo=".to_string()))
    }

    async fn upload_file(&self, selector: &str, path: &Path) -> Result<()> {
        self.check_alive()?;
        self.uploads
            .lock()
            .unwrap()
            .push((selector.to_string(), path.display().to_string()));
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.emit(ContextEvent::Destroyed);
        }
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn events(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    fn set_window_open_handler(&self, handler: WindowOpenHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }
}

pub struct FakeFactory {
    behavior: Behavior,
    next_id: AtomicU64,
    contexts: Mutex<Vec<Arc<FakeContext>>>,
}

impl FakeFactory {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            next_id: AtomicU64::new(100),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn context(&self, index: usize) -> Arc<FakeContext> {
        self.contexts.lock().unwrap()[index].clone()
    }

    pub fn by_id(&self, id: ContextId) -> Option<Arc<FakeContext>> {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }
}

#[async_trait]
impl ContextFactory for FakeFactory {
    async fn create(&self, options: ContextOptions) -> Result<Arc<dyn BrowsingContext>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let context = Arc::new(FakeContext::new(id, options, self.behavior.clone()));
        self.contexts.lock().unwrap().push(context.clone());
        Ok(context)
    }
}

/// Host that remembers the most contexts ever attached at once
pub struct FakeHost {
    content: Mutex<LayoutRect>,
    attached: Mutex<Vec<ContextId>>,
    max_attached: AtomicUsize,
    bounds: Mutex<HashMap<ContextId, LayoutRect>>,
    auto_resize: Mutex<HashMap<ContextId, bool>>,
}

impl FakeHost {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            content: Mutex::new(LayoutRect::new(0, 0, width, height)),
            attached: Mutex::new(Vec::new()),
            max_attached: AtomicUsize::new(0),
            bounds: Mutex::new(HashMap::new()),
            auto_resize: Mutex::new(HashMap::new()),
        })
    }

    pub fn attached(&self) -> Vec<ContextId> {
        self.attached.lock().unwrap().clone()
    }

    pub fn max_attached(&self) -> usize {
        self.max_attached.load(Ordering::SeqCst)
    }

    pub fn bounds_of(&self, context: ContextId) -> Option<LayoutRect> {
        self.bounds.lock().unwrap().get(&context).copied()
    }

    pub fn auto_resize_of(&self, context: ContextId) -> bool {
        self.auto_resize
            .lock()
            .unwrap()
            .get(&context)
            .copied()
            .unwrap_or(false)
    }

    pub fn resize(&self, width: u32, height: u32) {
        *self.content.lock().unwrap() = LayoutRect::new(0, 0, width, height);
    }
}

impl HostWindow for FakeHost {
    fn attach(&self, context: ContextId) {
        let mut attached = self.attached.lock().unwrap();
        if !attached.contains(&context) {
            attached.push(context);
        }
        self.max_attached.fetch_max(attached.len(), Ordering::SeqCst);
    }

    fn detach(&self, context: ContextId) {
        self.attached.lock().unwrap().retain(|c| *c != context);
    }

    fn set_bounds(&self, context: ContextId, bounds: LayoutRect) {
        self.bounds.lock().unwrap().insert(context, bounds);
    }

    fn set_auto_resize(&self, context: ContextId, enabled: bool) {
        self.auto_resize.lock().unwrap().insert(context, enabled);
    }

    fn content_bounds(&self) -> LayoutRect {
        *self.content.lock().unwrap()
    }
}

/// Wait for the first event matching `pred`
pub async fn wait_for<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    pred: impl Fn(&T) -> bool,
) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Poll `cond` until it holds or two seconds pass
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
