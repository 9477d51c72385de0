//! Plan data model, as produced by the external planner
//!
//! Steps and success criteria are tagged unions keyed by `type`, so an
//! unknown type is a parse error rather than a silently skipped step.

use serde::{Deserialize, Serialize};

/// A declarative sequence of UI actions plus risk metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub intent: Intent,
    pub steps: Vec<ActionStep>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub needs_approval: bool,
    /// Estimated duration in seconds
    #[serde(default)]
    pub estimated_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub level: RiskLevel,
    pub description: String,
    #[serde(default)]
    pub mitigation: String,
}

/// One step of a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub order: i64,
    #[serde(flatten)]
    pub action: StepAction,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criterion: Option<SuccessCriterion>,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepAction {
    Navigate {
        url: String,
    },
    Click {
        selector: String,
    },
    Fill {
        selector: String,
        value: String,
    },
    Select {
        selector: String,
        value: String,
    },
    Upload {
        selector: String,
        path: String,
    },
    Screenshot {
        #[serde(default)]
        path: Option<String>,
    },
    WaitForSelector {
        selector: String,
        /// Milliseconds
        #[serde(default)]
        timeout: Option<u64>,
    },
    Wait {
        /// Milliseconds
        duration: u64,
    },
    Scroll {
        #[serde(default)]
        selector: Option<String>,
        /// Pixels, when no selector is given
        #[serde(default)]
        value: Option<serde_json::Value>,
    },
    Read {
        #[serde(default)]
        selector: Option<String>,
    },
}

impl StepAction {
    /// Short name used in progress messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Select { .. } => "select",
            Self::Upload { .. } => "upload",
            Self::Screenshot { .. } => "screenshot",
            Self::WaitForSelector { .. } => "waitForSelector",
            Self::Wait { .. } => "wait",
            Self::Scroll { .. } => "scroll",
            Self::Read { .. } => "read",
        }
    }
}

/// Post-condition a step must satisfy before the next one runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessCriterion {
    #[serde(flatten)]
    pub check: CriterionCheck,
    /// Milliseconds; the executor default applies when absent
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CriterionCheck {
    ElementVisible {
        selector: String,
    },
    ElementState {
        selector: String,
        #[serde(default = "default_property")]
        property: String,
        #[serde(default)]
        condition: StateCondition,
        expected: serde_json::Value,
    },
    TextPresent {
        text: String,
    },
    UrlChange {
        #[serde(rename = "urlContains")]
        url_contains: String,
    },
}

fn default_property() -> String {
    "value".to_string()
}

/// Comparison applied by `element_state`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCondition {
    #[default]
    Equals,
    NotEquals,
    Contains,
}

impl StateCondition {
    /// Compare an observed property value against the expected one
    pub fn holds(&self, actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
        match self {
            Self::Equals => loosely_equal(actual, expected),
            Self::NotEquals => !loosely_equal(actual, expected),
            Self::Contains => as_text(actual).contains(&as_text(expected)),
        }
    }
}

fn as_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON equality, falling back to string form so `"true"` equals `true`
fn loosely_equal(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    actual == expected || as_text(actual) == as_text(expected)
}

impl Plan {
    /// Steps in ascending `order`; ties keep plan order
    pub fn ordered_steps(&self) -> Vec<&ActionStep> {
        let mut steps: Vec<&ActionStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    /// Highest risk level declared
    pub fn max_risk(&self) -> Option<RiskLevel> {
        self.risks.iter().map(|r| r.level).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAN: &str = r##"{
        "intent": {"action": "file_petition", "description": "Attach a petition"},
        "steps": [
            {"order": 2, "type": "click", "selector": "#submit", "description": "Submit", "reasoning": "",
             "successCriterion": {"type": "text_present", "text": "Protocolado", "timeout": 8000}},
            {"order": 1, "type": "upload", "selector": "input[type=file]", "path": "/tmp/p.pdf",
             "description": "Attach", "reasoning": "The form needs the document"},
            {"order": 3, "type": "waitForSelector", "selector": ".ok", "description": "Wait", "reasoning": ""}
        ],
        "risks": [{"level": "medium", "description": "Filing is final", "mitigation": "Review first"}],
        "needsApproval": true,
        "estimatedTime": 30
    }"##;

    #[test]
    fn test_parse_plan() {
        let plan: Plan = serde_json::from_str(PLAN).unwrap();
        assert!(plan.needs_approval);
        assert_eq!(plan.estimated_time, 30);
        assert_eq!(plan.max_risk(), Some(RiskLevel::Medium));

        let ordered = plan.ordered_steps();
        assert_eq!(ordered[0].action.kind(), "upload");
        assert_eq!(ordered[1].action.kind(), "click");
        assert_eq!(
            ordered[1].success_criterion,
            Some(SuccessCriterion {
                check: CriterionCheck::TextPresent {
                    text: "Protocolado".into()
                },
                timeout: Some(8000),
            })
        );
        assert_eq!(
            ordered[2].action,
            StepAction::WaitForSelector {
                selector: ".ok".into(),
                timeout: None
            }
        );
    }

    #[test]
    fn test_unknown_step_type_is_rejected() {
        let raw = r#"{"intent": {"action": "x"}, "steps": [
            {"order": 1, "type": "teleport", "description": "", "reasoning": ""}
        ]}"#;
        assert!(serde_json::from_str::<Plan>(raw).is_err());
    }

    #[test]
    fn test_element_state_defaults() {
        let criterion: SuccessCriterion = serde_json::from_value(json!({
            "type": "element_state", "selector": "#agree", "expected": true
        }))
        .unwrap();
        match criterion.check {
            CriterionCheck::ElementState {
                property,
                condition,
                ..
            } => {
                assert_eq!(property, "value");
                assert_eq!(condition, StateCondition::Equals);
            }
            other => panic!("unexpected check: {other:?}"),
        }
        assert_eq!(criterion.timeout, None);
    }

    #[test]
    fn test_state_conditions() {
        assert!(StateCondition::Equals.holds(&json!(true), &json!(true)));
        assert!(StateCondition::Equals.holds(&json!("true"), &json!(true)));
        assert!(StateCondition::NotEquals.holds(&json!("a"), &json!("b")));
        assert!(StateCondition::Contains.holds(&json!("0001234-55.2024"), &json!("1234")));
    }

    #[test]
    fn test_url_change_field_name() {
        let criterion: SuccessCriterion = serde_json::from_value(json!({
            "type": "url_change", "urlContains": "/painel", "timeout": 3000
        }))
        .unwrap();
        assert_eq!(
            criterion.check,
            CriterionCheck::UrlChange {
                url_contains: "/painel".into()
            }
        );
    }
}
