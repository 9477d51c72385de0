//! Plan executor
//!
//! Drives the attached context through a plan's steps strictly one at a
//! time. A step counts as done once its action has been applied and its
//! success criterion (if any) observed; the first failing step aborts the
//! rest of the plan.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

use crate::browser::BrowsingContext;
use crate::core::config::ExecutorConfig;
use crate::core::{PilotError, Result};
use crate::plan::scripts;
use crate::plan::types::{ActionStep, CriterionCheck, Plan, StepAction, SuccessCriterion};

const DEFAULT_SCROLL_PIXELS: i64 = 500;

/// Something that can hand out the currently attached context
#[async_trait]
pub trait PlanTarget: Send + Sync {
    async fn active_context(&self) -> Option<Arc<dyn BrowsingContext>>;
}

/// Operator's answer to an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Resume,
    Cancel,
}

/// Asks the operator whether a plan may run
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_approval(&self, plan: &Plan) -> ApprovalDecision;
}

/// Approves every plan; for unattended runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn request_approval(&self, _plan: &Plan) -> ApprovalDecision {
        ApprovalDecision::Resume
    }
}

/// Progress notification pushed after each step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// 0-based position in execution order
    pub index: usize,
    pub total: usize,
    pub message: String,
}

/// Receives progress notifications
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);
}

impl ProgressObserver for mpsc::UnboundedSender<ProgressUpdate> {
    fn on_progress(&self, update: ProgressUpdate) {
        let _ = self.send(update);
    }
}

/// Writes progress to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, update: ProgressUpdate) {
        tracing::info!(
            step = update.index + 1,
            total = update.total,
            "{}",
            update.message
        );
    }
}

/// Value captured by a `read` or `screenshot` step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutput {
    pub index: usize,
    pub kind: &'static str,
    pub value: String,
}

/// Summary of a fully executed plan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub completed: usize,
    pub total: usize,
    pub outputs: Vec<StepOutput>,
}

/// Sequential executor for planner output
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    poll_interval: Duration,
    criterion_timeout_ms: u64,
    selector_timeout_ms: u64,
}

impl PlanExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            criterion_timeout_ms: config.criterion_timeout_ms,
            selector_timeout_ms: config.selector_timeout_ms,
        }
    }

    /// Run `plan` against whatever context `target` has attached
    ///
    /// Plans that need approval wait on `approval` before the first step.
    pub async fn execute(
        &self,
        plan: &Plan,
        target: &dyn PlanTarget,
        approval: &dyn ApprovalGate,
        observer: &dyn ProgressObserver,
    ) -> Result<ExecutionReport> {
        if plan.needs_approval {
            tracing::info!(action = %plan.intent.action, "waiting for operator approval");
            if approval.request_approval(plan).await == ApprovalDecision::Cancel {
                return Err(PilotError::PlanCancelled);
            }
        }

        let steps = plan.ordered_steps();
        let total = steps.len();
        let mut report = ExecutionReport {
            total,
            ..Default::default()
        };

        for (index, step) in steps.into_iter().enumerate() {
            tracing::debug!(index, order = step.order, kind = step.action.kind(), "running step");

            match self.run_step(step, target).await {
                Ok(output) => {
                    if let Some(value) = output {
                        report.outputs.push(StepOutput {
                            index,
                            kind: step.action.kind(),
                            value,
                        });
                    }
                    report.completed += 1;
                    observer.on_progress(ProgressUpdate {
                        index,
                        total,
                        message: format!("Done: {}", label(step)),
                    });
                }
                Err(e) => {
                    tracing::warn!(index, "step failed: {}", e);
                    observer.on_progress(ProgressUpdate {
                        index,
                        total,
                        message: format!("Failed: {} ({})", label(step), e),
                    });
                    return Err(PilotError::PlanAborted {
                        step: index,
                        description: label(step),
                        source: Box::new(e),
                    });
                }
            }
        }

        tracing::info!(completed = report.completed, "plan finished");
        Ok(report)
    }

    async fn run_step(&self, step: &ActionStep, target: &dyn PlanTarget) -> Result<Option<String>> {
        let context = target
            .active_context()
            .await
            .ok_or_else(|| PilotError::uninitialized("plan target"))?;

        let output = self.apply(&step.action, context.as_ref()).await?;

        if let Some(ref criterion) = step.success_criterion {
            self.await_criterion(criterion, context.as_ref()).await?;
        }
        Ok(output)
    }

    async fn apply(&self, action: &StepAction, context: &dyn BrowsingContext) -> Result<Option<String>> {
        match action {
            StepAction::Navigate { url } => {
                context
                    .load_url(url)
                    .await
                    .map_err(|e| e.into_hard_navigation_error())?;
                Ok(None)
            }
            StepAction::Click { selector } => {
                let found = context.execute_script(&scripts::click(selector)).await?;
                expect_element(found, selector).map(|_| None)
            }
            StepAction::Fill { selector, value } => {
                let found = context
                    .execute_script(&scripts::fill(selector, value))
                    .await?;
                expect_element(found, selector).map(|_| None)
            }
            StepAction::Select { selector, value } => {
                let found = context
                    .execute_script(&scripts::select(selector, value))
                    .await?;
                expect_element(found, selector).map(|_| None)
            }
            StepAction::Upload { selector, path } => {
                context.upload_file(selector, Path::new(path)).await?;
                Ok(None)
            }
            StepAction::Screenshot { path } => context
                .capture_screenshot(path.as_deref().map(Path::new))
                .await
                .map(Some),
            StepAction::WaitForSelector { selector, timeout } => {
                let script = scripts::element_present(selector);
                self.poll(
                    timeout.unwrap_or(self.selector_timeout_ms),
                    format!("selector '{}'", selector),
                    || is_true(context, &script),
                )
                .await
                .map(|_| None)
            }
            StepAction::Wait { duration } => {
                sleep(Duration::from_millis(*duration)).await;
                Ok(None)
            }
            StepAction::Scroll { selector, value } => {
                let pixels = value
                    .as_ref()
                    .and_then(parse_pixels)
                    .unwrap_or(DEFAULT_SCROLL_PIXELS);
                let found = context
                    .execute_script(&scripts::scroll(selector.as_deref(), pixels))
                    .await?;
                match selector {
                    Some(sel) => expect_element(found, sel).map(|_| None),
                    None => Ok(None),
                }
            }
            StepAction::Read { selector } => {
                let value = context
                    .execute_script(&scripts::read_text(selector.as_deref()))
                    .await?;
                match value {
                    Value::String(text) => Ok(Some(text)),
                    Value::Null => Err(PilotError::ElementNotFound(
                        selector.clone().unwrap_or_else(|| "body".to_string()),
                    )),
                    other => Ok(Some(other.to_string())),
                }
            }
        }
    }

    async fn await_criterion(
        &self,
        criterion: &SuccessCriterion,
        context: &dyn BrowsingContext,
    ) -> Result<()> {
        let timeout_ms = criterion.timeout.unwrap_or(self.criterion_timeout_ms);
        self.poll(timeout_ms, describe(&criterion.check), || {
            criterion_holds(context, &criterion.check)
        })
        .await
    }

    /// Re-check until true or until `timeout_ms` elapses
    ///
    /// Script errors while a page is (re)loading count as "not yet"; a
    /// destroyed context fails immediately. Each check is cut off at the
    /// deadline, so a hung evaluation cannot stretch the wait.
    async fn poll<F, Fut>(&self, timeout_ms: u64, what: String, check: F) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, check()).await {
                Ok(Ok(true)) => return Ok(()),
                Ok(Ok(false)) => {}
                Ok(Err(e @ PilotError::ContextDestroyed(_))) => return Err(e),
                Ok(Err(e)) => tracing::trace!("check for {} errored: {}", what, e),
                Err(_) => tracing::trace!("check for {} still running at deadline", what),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PilotError::StepTimeout { what, timeout_ms });
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

async fn is_true(context: &dyn BrowsingContext, script: &str) -> Result<bool> {
    Ok(context.execute_script(script).await? == Value::Bool(true))
}

async fn criterion_holds(context: &dyn BrowsingContext, check: &CriterionCheck) -> Result<bool> {
    match check {
        CriterionCheck::ElementVisible { selector } => {
            is_true(context, &scripts::element_visible(selector)).await
        }
        CriterionCheck::ElementState {
            selector,
            property,
            condition,
            expected,
        } => {
            let actual = context
                .execute_script(&scripts::element_property(selector, property))
                .await?;
            Ok(!actual.is_null() && condition.holds(&actual, expected))
        }
        CriterionCheck::TextPresent { text } => {
            is_true(context, &scripts::text_present(text)).await
        }
        CriterionCheck::UrlChange { url_contains } => {
            Ok(context.current_url().await?.contains(url_contains.as_str()))
        }
    }
}

fn describe(check: &CriterionCheck) -> String {
    match check {
        CriterionCheck::ElementVisible { selector } => format!("'{}' to be visible", selector),
        CriterionCheck::ElementState {
            selector,
            property,
            condition,
            expected,
        } => format!("'{}'.{} {:?} {}", selector, property, condition, expected),
        CriterionCheck::TextPresent { text } => format!("text '{}'", text),
        CriterionCheck::UrlChange { url_contains } => format!("URL containing '{}'", url_contains),
    }
}

fn label(step: &ActionStep) -> String {
    if step.description.is_empty() {
        step.action.kind().to_string()
    } else {
        step.description.clone()
    }
}

fn expect_element(found: Value, selector: &str) -> Result<()> {
    if found == Value::Bool(true) {
        Ok(())
    } else {
        Err(PilotError::ElementNotFound(selector.to_string()))
    }
}

fn parse_pixels(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().trim_end_matches("px").parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pixels() {
        assert_eq!(parse_pixels(&json!(300)), Some(300));
        assert_eq!(parse_pixels(&json!("-200px")), Some(-200));
        assert_eq!(parse_pixels(&json!("down")), None);
    }

    #[test]
    fn test_expect_element() {
        assert!(expect_element(json!(true), "#a").is_ok());
        assert!(matches!(
            expect_element(json!(false), "#a"),
            Err(PilotError::ElementNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let executor = PlanExecutor::new(&ExecutorConfig {
            poll_interval_ms: 5,
            ..Default::default()
        });
        let err = executor
            .poll(20, "never".to_string(), || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::StepTimeout { timeout_ms: 20, .. }));
    }

    #[tokio::test]
    async fn test_hung_check_is_cut_off_at_deadline() {
        let executor = PlanExecutor::new(&ExecutorConfig {
            poll_interval_ms: 5,
            ..Default::default()
        });
        let started = Instant::now();
        let err = executor
            .poll(100, "hung".to_string(), || async {
                sleep(Duration::from_secs(2)).await;
                Ok(false)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::StepTimeout { timeout_ms: 100, .. }));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }
}
