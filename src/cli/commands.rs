//! CLI commands
//!
//! Each subcommand wires the components together against the agent-browser
//! backend and a headless host.

use std::path::Path;
use std::sync::Arc;

use crate::browser::{AgentBrowserFactory, ContextFactory, HeadlessHost, SingleContextManager};
use crate::cli::prompt::{format_plan, PrintProgress, StdinApproval};
use crate::core::{Config, PilotError, Result};
use crate::crawler::CrawlerService;
use crate::inject::ScriptInjector;
use crate::plan::{ApprovalGate, AutoApprove, ExecutionReport, Plan, PlanExecutor};
use crate::planner::PlannerClient;

async fn backend(config: &Config) -> Result<Arc<dyn ContextFactory>> {
    if !AgentBrowserFactory::is_available(&config.browser.binary).await {
        return Err(PilotError::AgentBrowserNotFound);
    }
    Ok(Arc::new(AgentBrowserFactory::new(config.browser.clone())))
}

fn portal(config: &Config, factory: Arc<dyn ContextFactory>) -> SingleContextManager {
    let host = Arc::new(HeadlessHost::new(
        config.layout.window_width,
        config.layout.window_height,
    ));
    let manager = SingleContextManager::from_config(config, factory, host);
    if config.injector.enabled {
        manager.with_injector(Arc::new(ScriptInjector::from_config(&config.injector)))
    } else {
        manager
    }
}

/// `search <query>`: run the crawler and print enriched results
pub async fn search(config: &Config, query: &str) -> Result<()> {
    let crawler = CrawlerService::new(backend(config).await?, config.crawler.clone());
    let outcome = crawler.search_jurisprudence(query).await;
    if let Err(e) = crawler.destroy().await {
        tracing::warn!("failed to close crawler context: {}", e);
    }

    for (i, result) in outcome?.iter().enumerate() {
        println!("{}. {}\n   {}\n   {}\n", i + 1, result.title, result.url, result.snippet);
    }
    Ok(())
}

/// `run <plan.json>`: execute a saved plan in the portal view
pub async fn run_plan(config: &Config, path: &Path, assume_yes: bool) -> Result<()> {
    let content = tokio::fs::read_to_string(path).await?;
    let plan: Plan = serde_json::from_str(&content)?;

    let portal = portal(config, backend(config).await?);
    portal.initialize().await?;

    let outcome = execute(config, &plan, &portal, assume_yes).await;
    finish(&portal, outcome).await
}

/// `ask <command>`: plan against the current page, then execute
pub async fn ask(
    config: &Config,
    command: &str,
    start_url: Option<&str>,
    assume_yes: bool,
) -> Result<()> {
    let planner = PlannerClient::from_config(&config.planner)?;
    let portal = portal(config, backend(config).await?);

    let outcome = async {
        portal
            .navigate_to(start_url.unwrap_or(&config.browser.portal_url))
            .await?;
        let page = portal.get_page_data().await?;
        let plan = planner.request_plan(command, &page, None).await?;
        if assume_yes || !plan.needs_approval {
            println!("{}", format_plan(&plan));
        }
        execute(config, &plan, &portal, assume_yes).await
    }
    .await;

    finish(&portal, outcome).await
}

async fn execute(
    config: &Config,
    plan: &Plan,
    portal: &SingleContextManager,
    assume_yes: bool,
) -> Result<ExecutionReport> {
    let approval: &dyn ApprovalGate = if assume_yes {
        &AutoApprove
    } else {
        &StdinApproval
    };
    PlanExecutor::new(&config.executor)
        .execute(plan, portal, approval, &PrintProgress)
        .await
}

async fn finish(portal: &SingleContextManager, outcome: Result<ExecutionReport>) -> Result<()> {
    if let Err(e) = portal.shutdown().await {
        tracing::warn!("failed to close portal context: {}", e);
    }

    let report = outcome?;
    println!(
        "\nCompleted {}/{} steps.",
        report.completed, report.total
    );
    for output in &report.outputs {
        println!("\n[step {} {}]\n{}", output.index + 1, output.kind, output.value);
    }
    Ok(())
}
