//! Terminal approval prompt and progress printer

use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use crate::plan::{ApprovalDecision, ApprovalGate, Plan, ProgressObserver, ProgressUpdate};

/// Asks the operator on stdin before a plan runs
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinApproval;

#[async_trait]
impl ApprovalGate for StdinApproval {
    async fn request_approval(&self, plan: &Plan) -> ApprovalDecision {
        println!("{}", format_plan(plan));
        print!("Run this plan? [y/N] ");
        let _ = io::stdout().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) if matches!(line.trim().to_lowercase().as_str(), "y" | "yes" | "s" | "sim") => {
                ApprovalDecision::Resume
            }
            _ => ApprovalDecision::Cancel,
        }
    }
}

/// Prints each progress update on its own line
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintProgress;

impl ProgressObserver for PrintProgress {
    fn on_progress(&self, update: ProgressUpdate) {
        println!("  [{}/{}] {}", update.index + 1, update.total, update.message);
    }
}

/// Human-readable plan summary
pub fn format_plan(plan: &Plan) -> String {
    let mut output = format!(
        "\nPlan: {}\n{}\n\nSteps:\n",
        plan.intent.action, plan.intent.description
    );

    for step in plan.ordered_steps() {
        output.push_str(&format!(
            "  {}. [{}] {}\n",
            step.order,
            step.action.kind(),
            step.description
        ));
    }

    if !plan.risks.is_empty() {
        output.push_str("\nRisks:\n");
        for risk in &plan.risks {
            output.push_str(&format!("  - {:?}: {}", risk.level, risk.description));
            if !risk.mitigation.is_empty() {
                output.push_str(&format!(" (mitigation: {})", risk.mitigation));
            }
            output.push('\n');
        }
    }

    output.push_str(&format!("\nEstimated time: {}s", plan.estimated_time));
    output
}
