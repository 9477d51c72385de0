//! Plan module - planner output and its sequential executor

mod executor;
pub mod scripts;
mod types;

pub use executor::{
    ApprovalDecision, ApprovalGate, AutoApprove, ExecutionReport, LogProgress, PlanExecutor,
    PlanTarget, ProgressObserver, ProgressUpdate, StepOutput,
};
pub use types::{
    ActionStep, CriterionCheck, Intent, Plan, Risk, RiskLevel, StateCondition, StepAction,
    SuccessCriterion,
};
