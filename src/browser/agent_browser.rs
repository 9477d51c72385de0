//! agent-browser backed contexts
//!
//! Each context is one isolated agent-browser session. The CLI cannot push
//! events, so lifecycle events are synthesized around every navigation and
//! popups are captured in-page and drained after each script evaluation.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::browser::context::{
    BrowsingContext, ContextEvent, ContextFactory, ContextOptions, WindowOpenAction,
    WindowOpenHandler,
};
use crate::core::config::BrowserConfig;
use crate::core::{ContextId, PilotError, Result};

const EVENT_CAPACITY: usize = 64;

/// Grace period for the `close` command issued by `destroy`
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Captures window.open and target=_blank clicks instead of letting them open windows
const POPUP_SHIM: &str = r#"(() => {
  if (window.__lexpilotPopupShim) return true;
  window.__lexpilotPopupShim = true;
  window.__lexpilotPopups = [];
  const record = (u) => window.__lexpilotPopups.push(new URL(u, location.href).href);
  window.open = (u) => { if (u) record(u); return null; };
  document.addEventListener('click', (e) => {
    const a = e.target && e.target.closest ? e.target.closest('a[target="_blank"]') : null;
    if (a && a.href) { e.preventDefault(); record(a.href); }
  }, true);
  return true;
})()"#;

const DRAIN_POPUPS: &str = r#"(() => {
  const q = window.__lexpilotPopups || [];
  window.__lexpilotPopups = [];
  return q;
})()"#;

/// Creates one agent-browser session per context
pub struct AgentBrowserFactory {
    config: BrowserConfig,
    next_id: AtomicU64,
}

impl AgentBrowserFactory {
    /// Create a factory from browser configuration
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Check if agent-browser is installed
    pub async fn is_available(binary: &str) -> bool {
        Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ContextFactory for AgentBrowserFactory {
    async fn create(&self, options: ContextOptions) -> Result<Arc<dyn BrowsingContext>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let context = AgentBrowserContext::new(id, &self.config, options);
        tracing::debug!(
            context = id,
            session = %context.session_name,
            "created agent-browser context"
        );
        Ok(Arc::new(context))
    }
}

/// A browsing context driven through the agent-browser CLI
pub struct AgentBrowserContext {
    id: ContextId,
    binary: String,
    session_name: String,
    headed: bool,
    user_agent: Option<String>,
    command_timeout: Duration,
    cancel: CancellationToken,
    events: broadcast::Sender<ContextEvent>,
    window_open: Mutex<Option<WindowOpenHandler>>,
}

impl AgentBrowserContext {
    fn new(id: ContextId, config: &BrowserConfig, options: ContextOptions) -> Self {
        let label = if options.label.is_empty() {
            "ctx".to_string()
        } else {
            options.label
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            binary: config.binary.clone(),
            session_name: format!("{}-{}-{}", config.session_prefix, label, id),
            headed: config.headed && !options.offscreen,
            user_agent: options.user_agent,
            command_timeout: Duration::from_millis(config.timeout_ms),
            cancel: CancellationToken::new(),
            events,
            window_open: Mutex::new(None),
        }
    }

    fn build_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--session", &self.session_name]);

        if self.headed {
            cmd.arg("--headed");
        }

        if let Some(ref ua) = self.user_agent {
            cmd.args(["--user-agent", ua]);
        }

        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn output(&self, mut cmd: Command, limit: Duration) -> Result<String> {
        let output = match timeout(limit, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PilotError::AgentBrowserNotFound
                } else {
                    PilotError::browser(format!("Failed to run agent-browser: {}", e))
                }
            })?,
            Err(_) => {
                return Err(PilotError::browser(format!(
                    "agent-browser command timed out after {}ms",
                    limit.as_millis()
                )))
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PilotError::browser(format!(
                "agent-browser command failed: {}",
                stderr.trim()
            )))
        }
    }

    /// Run an agent-browser command; fails fast once the context is destroyed
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        if self.cancel.is_cancelled() {
            return Err(PilotError::ContextDestroyed(self.id));
        }

        let cmd = self.build_command(args);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(PilotError::ContextDestroyed(self.id)),
            result = self.output(cmd, self.command_timeout) => result,
        }
    }

    async fn eval_raw(&self, script: &str) -> Result<Value> {
        let output = self.run_command(&["eval", script, "--json"]).await?;
        Ok(parse_eval_output(&output))
    }

    /// Hand captured popup requests to the window-open handler
    async fn drain_popups(&self) {
        let requested = match self.eval_raw(DRAIN_POPUPS).await {
            Ok(Value::Array(urls)) => urls,
            Ok(_) => return,
            Err(e) => {
                tracing::trace!(context = self.id, "popup drain skipped: {}", e);
                return;
            }
        };

        let handler = match self.window_open.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        for url in requested.iter().filter_map(|u| u.as_str()) {
            let action = handler
                .as_ref()
                .map(|h| h(url))
                .unwrap_or(WindowOpenAction::Allow);
            if action == WindowOpenAction::Allow {
                // No native windows in the CLI backend; an allowed popup replaces the page.
                if let Err(e) = self.load_url(url).await {
                    tracing::warn!(context = self.id, url, "allowed popup failed to load: {}", e);
                }
            } else {
                tracing::debug!(context = self.id, url, "denied native popup");
            }
        }
    }

    fn emit(&self, event: ContextEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.run_command(&["open", url])
            .await
            .map_err(|e| classify_navigation_error(url, e))?;

        let _ = self.run_command(&["wait", "--load", "networkidle"]).await;

        let committed = self.current_url().await.unwrap_or_else(|_| url.to_string());
        self.emit(ContextEvent::Navigated { url: committed });

        if let Ok(title) = self.title().await {
            self.emit(ContextEvent::TitleUpdated { title });
        }

        if let Err(e) = self.eval_raw(POPUP_SHIM).await {
            tracing::debug!(context = self.id, "popup shim not installed: {}", e);
        }
        Ok(())
    }
}

#[async_trait]
impl BrowsingContext for AgentBrowserContext {
    fn id(&self) -> ContextId {
        self.id
    }

    async fn load_url(&self, url: &str) -> Result<()> {
        self.emit(ContextEvent::LoadingStarted);
        let result = self.navigate(url).await;
        self.emit(ContextEvent::LoadingStopped);
        result
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        let value = self.eval_raw(script).await?;
        self.drain_popups().await;
        Ok(value)
    }

    async fn insert_css(&self, css: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const s = document.createElement('style'); s.textContent = {}; \
             (document.head || document.documentElement).appendChild(s); return true; }})()",
            serde_json::to_string(css)?
        );
        self.eval_raw(&script).await.map(|_| ())
    }

    async fn current_url(&self) -> Result<String> {
        self.run_command(&["get", "url"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn title(&self) -> Result<String> {
        self.run_command(&["get", "title"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn capture_screenshot(&self, path: Option<&Path>) -> Result<String> {
        match path {
            Some(p) => {
                let p = p.to_string_lossy();
                self.run_command(&["screenshot", &p]).await?;
                Ok(p.into_owned())
            }
            None => self
                .run_command(&["screenshot"])
                .await
                .map(|s| s.trim().to_string()),
        }
    }

    async fn upload_file(&self, selector: &str, path: &Path) -> Result<()> {
        let p = path.to_string_lossy();
        self.run_command(&["upload", selector, &p]).await.map(|_| ())
    }

    async fn destroy(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.cancel.cancel();
        self.emit(ContextEvent::Destroyed);

        let cmd = self.build_command(&["close"]);
        if let Err(e) = self.output(cmd, CLOSE_TIMEOUT).await {
            tracing::warn!(context = self.id, "agent-browser close failed: {}", e);
        }
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn events(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    fn set_window_open_handler(&self, handler: WindowOpenHandler) {
        match self.window_open.lock() {
            Ok(mut guard) => *guard = Some(handler),
            Err(poisoned) => *poisoned.into_inner() = Some(handler),
        }
    }
}

/// Aborted/redirected loads are reported separately so callers can tolerate them
fn classify_navigation_error(url: &str, error: PilotError) -> PilotError {
    match error {
        PilotError::Browser(msg) if msg.contains("ERR_ABORTED") => {
            PilotError::NavigationAborted(url.to_string())
        }
        PilotError::Browser(msg) => PilotError::navigation(url, msg),
        other => other,
    }
}

/// Pull the evaluated value out of agent-browser's `--json` envelope
fn parse_eval_output(output: &str) -> Value {
    let trimmed = output.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(mut envelope)) if envelope.contains_key("data") => {
            match envelope.remove("data") {
                Some(Value::Object(mut data)) if data.contains_key("result") => {
                    data.remove("result").unwrap_or(Value::Null)
                }
                Some(data) => data,
                None => Value::Null,
            }
        }
        Ok(value) => value,
        Err(_) => Value::String(trimmed.to_string()),
    }
}
