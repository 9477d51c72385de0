//! Planner module - client for the external planning service
//!
//! The planner turns an operator command plus page context into a [`Plan`].

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::config::PlannerConfig;
use crate::core::{PageData, PilotError, Result};
use crate::plan::Plan;

/// Request body sent to the planner
#[derive(Debug, Serialize)]
struct PlanRequest<'a> {
    command: &'a str,
    context: &'a PageData,
    #[serde(skip_serializing_if = "Option::is_none")]
    screenshot: Option<&'a str>,
}

/// Planner response
#[derive(Debug, Deserialize)]
struct PlanResponse {
    plan: Plan,
}

/// HTTP client for the planning service
#[derive(Clone)]
pub struct PlannerClient {
    client: Client,
    url: String,
}

impl PlannerClient {
    /// Create a planner client from configuration
    pub fn from_config(config: &PlannerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Ask the planner for a plan for `command` on the given page
    pub async fn request_plan(
        &self,
        command: &str,
        context: &PageData,
        screenshot: Option<&str>,
    ) -> Result<Plan> {
        let request = PlanRequest {
            command,
            context,
            screenshot,
        };

        tracing::debug!(url = %self.url, command, "requesting plan");
        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PilotError::planner(format!(
                "Planner returned {}: {}",
                status, text
            )));
        }

        let body = response.text().await?;
        parse_plan_response(&body)
    }
}

fn parse_plan_response(body: &str) -> Result<Plan> {
    serde_json::from_str::<PlanResponse>(body)
        .map(|r| r.plan)
        .map_err(|e| PilotError::planner(format!("Invalid plan: {}", e)))
}
