//! Approval rule definitions and validation.
//!
//! A rule is company-scoped configuration: which approvers must sign off
//! on a new expense, in what step order, and whether the submitter's
//! manager goes first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::approval::error::WorkflowError;

/// The shape of an approval rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Plain chain of steps.
    Sequential,
    /// A share of approvers must approve.
    Percentage {
        /// Required approval share, 1..=100.
        #[serde(rename = "percentage_required")]
        threshold: u8,
    },
    /// One named approver must approve.
    SpecificApprover {
        /// The mandatory approver.
        #[serde(rename = "specific_approver_id")]
        approver_id: Uuid,
    },
    /// Percentage threshold or the specific approver.
    Hybrid {
        /// Required approval share, 1..=100.
        #[serde(rename = "percentage_required")]
        threshold: u8,
        /// The mandatory approver.
        #[serde(rename = "specific_approver_id")]
        approver_id: Uuid,
    },
}

/// How an expense's completion is decided from its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionPolicy {
    /// An approval completes the expense once no step with a higher
    /// step number is still pending. Lower steps are ignored.
    #[default]
    HighestPendingStepClears,
}

impl RuleKind {
    /// Builds a rule kind from its stored columns.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` for an unknown type, a missing
    /// parameter or a percentage outside 1..=100.
    pub fn from_parts(
        rule_type: &str,
        percentage_required: Option<i32>,
        specific_approver_id: Option<Uuid>,
    ) -> Result<Self, WorkflowError> {
        let threshold = || -> Result<u8, WorkflowError> {
            let value = percentage_required.ok_or_else(|| {
                WorkflowError::Validation(format!(
                    "percentage_required is required for {rule_type} rules"
                ))
            })?;
            u8::try_from(value)
                .ok()
                .filter(|v| (1..=100).contains(v))
                .ok_or_else(|| {
                    WorkflowError::Validation(format!(
                        "percentage_required must be between 1 and 100, got {value}"
                    ))
                })
        };
        let approver = || {
            specific_approver_id.ok_or_else(|| {
                WorkflowError::Validation(format!(
                    "specific_approver_id is required for {rule_type} rules"
                ))
            })
        };

        match rule_type {
            "sequential" => Ok(Self::Sequential),
            "percentage" => Ok(Self::Percentage {
                threshold: threshold()?,
            }),
            "specific_approver" => Ok(Self::SpecificApprover {
                approver_id: approver()?,
            }),
            "hybrid" => Ok(Self::Hybrid {
                threshold: threshold()?,
                approver_id: approver()?,
            }),
            other => Err(WorkflowError::Validation(format!(
                "unknown rule type: {other}"
            ))),
        }
    }

    /// Returns the stored type name.
    #[must_use]
    pub fn rule_type(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Percentage { .. } => "percentage",
            Self::SpecificApprover { .. } => "specific_approver",
            Self::Hybrid { .. } => "hybrid",
        }
    }

    /// Returns the percentage threshold, if this kind has one.
    #[must_use]
    pub fn percentage_required(&self) -> Option<u8> {
        match self {
            Self::Percentage { threshold } | Self::Hybrid { threshold, .. } => Some(*threshold),
            Self::Sequential | Self::SpecificApprover { .. } => None,
        }
    }

    /// Returns the mandatory approver, if this kind has one.
    #[must_use]
    pub fn specific_approver_id(&self) -> Option<Uuid> {
        match self {
            Self::SpecificApprover { approver_id } | Self::Hybrid { approver_id, .. } => {
                Some(*approver_id)
            }
            Self::Sequential | Self::Percentage { .. } => None,
        }
    }

    /// The completion policy the resolver applies for this kind.
    ///
    /// Thresholds and mandatory approvers are stored and reported but not
    /// enforced; every kind resolves the same way. No production caller
    /// consults this yet: `ExpenseService::decide` applies
    /// `CompletionPolicy::default()`, which every kind maps to. A kind with its
    /// own policy needs the governing kind recorded on the expense first.
    #[must_use]
    pub fn completion_policy(&self) -> CompletionPolicy {
        match self {
            Self::Sequential
            | Self::Percentage { .. }
            | Self::SpecificApprover { .. }
            | Self::Hybrid { .. } => CompletionPolicy::HighestPendingStepClears,
        }
    }
}

/// A rule-defined approver slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStep {
    /// Step ID.
    pub id: Uuid,
    /// Who approves at this step.
    pub approver_id: Uuid,
    /// Position in the rule; unique within the rule, 1 or greater.
    pub step_number: i32,
    /// Stored for reporting only.
    pub is_required: bool,
}

/// A company-wide approval rule with its steps.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRule {
    /// Rule ID.
    pub id: Uuid,
    /// Owning company.
    pub company_id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Rule shape and its parameters.
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Whether the submitter's manager approves first (step 0).
    pub is_manager_approver: bool,
    /// Higher wins during selection.
    pub priority: i32,
    /// Inactive rules are invisible to selection.
    pub is_active: bool,
    /// Steps ordered by step number.
    pub steps: Vec<WorkflowStep>,
    /// Created at timestamp.
    pub created_at: DateTime<Utc>,
    /// Updated at timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for one step of a new or replaced step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDraft {
    /// Who approves at this step.
    pub approver_id: Uuid,
    /// Position in the rule.
    pub step_number: i32,
    /// Defaults to true.
    pub is_required: bool,
}

/// Input for creating a rule.
#[derive(Debug, Clone)]
pub struct RuleDraft {
    /// Rule name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// One of `sequential`, `percentage`, `specific_approver`, `hybrid`.
    pub rule_type: String,
    /// Percentage threshold for `percentage` and `hybrid`.
    pub percentage_required: Option<i32>,
    /// Mandatory approver for `specific_approver` and `hybrid`.
    pub specific_approver_id: Option<Uuid>,
    /// Defaults to true.
    pub is_manager_approver: Option<bool>,
    /// Defaults to 0.
    pub priority: Option<i32>,
    /// Step list.
    pub steps: Vec<StepDraft>,
}

/// Partial update of a rule. A present `steps` replaces the whole list.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
    /// New priority.
    pub priority: Option<i32>,
    /// New manager-first flag.
    pub is_manager_approver: Option<bool>,
    /// Replacement step list.
    pub steps: Option<Vec<StepDraft>>,
}

impl RuleDraft {
    /// Validates the draft and builds an active rule for `company_id`.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` if the name is blank, the type
    /// parameters are missing or out of range, or the steps are invalid.
    pub fn into_rule(self, company_id: Uuid) -> Result<ApprovalRule, WorkflowError> {
        let name = validate_name(&self.name)?;
        let kind = RuleKind::from_parts(
            &self.rule_type,
            self.percentage_required,
            self.specific_approver_id,
        )?;
        let steps = build_steps(self.steps)?;
        let now = Utc::now();

        Ok(ApprovalRule {
            id: Uuid::new_v4(),
            company_id,
            name,
            description: self.description,
            kind,
            is_manager_approver: self.is_manager_approver.unwrap_or(true),
            priority: self.priority.unwrap_or(0),
            is_active: true,
            steps,
            created_at: now,
            updated_at: now,
        })
    }
}

impl RuleUpdate {
    /// Applies the update to `rule` in place.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` if the new name or steps are
    /// invalid; `rule` is left untouched in that case.
    pub fn apply(self, rule: &mut ApprovalRule) -> Result<(), WorkflowError> {
        let name = self.name.as_deref().map(validate_name).transpose()?;
        let steps = self.steps.map(build_steps).transpose()?;

        if let Some(name) = name {
            rule.name = name;
        }
        if let Some(description) = self.description {
            rule.description = Some(description);
        }
        if let Some(is_active) = self.is_active {
            rule.is_active = is_active;
        }
        if let Some(priority) = self.priority {
            rule.priority = priority;
        }
        if let Some(flag) = self.is_manager_approver {
            rule.is_manager_approver = flag;
        }
        if let Some(steps) = steps {
            rule.steps = steps;
        }
        rule.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, WorkflowError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Validation("rule name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Validates a step list and assigns step IDs, ordered by step number.
///
/// Step 0 is reserved for the manager-first step.
fn build_steps(drafts: Vec<StepDraft>) -> Result<Vec<WorkflowStep>, WorkflowError> {
    let mut seen = HashSet::new();
    for draft in &drafts {
        if draft.step_number < 1 {
            return Err(WorkflowError::Validation(format!(
                "step_number must be 1 or greater, got {}",
                draft.step_number
            )));
        }
        if !seen.insert(draft.step_number) {
            return Err(WorkflowError::Validation(format!(
                "duplicate step_number {}",
                draft.step_number
            )));
        }
    }

    let mut steps: Vec<WorkflowStep> = drafts
        .into_iter()
        .map(|d| WorkflowStep {
            id: Uuid::new_v4(),
            approver_id: d.approver_id,
            step_number: d.step_number,
            is_required: d.is_required,
        })
        .collect();
    steps.sort_by_key(|s| s.step_number);
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn step(n: i32) -> StepDraft {
        StepDraft {
            approver_id: Uuid::new_v4(),
            step_number: n,
            is_required: true,
        }
    }

    fn draft(rule_type: &str) -> RuleDraft {
        RuleDraft {
            name: "Default".to_string(),
            description: None,
            rule_type: rule_type.to_string(),
            percentage_required: None,
            specific_approver_id: None,
            is_manager_approver: None,
            priority: None,
            steps: vec![step(2), step(1)],
        }
    }

    #[test]
    fn test_draft_applies_defaults_and_orders_steps() {
        let company = Uuid::new_v4();
        let rule = draft("sequential").into_rule(company).unwrap();

        assert_eq!(rule.company_id, company);
        assert!(rule.is_manager_approver);
        assert_eq!(rule.priority, 0);
        assert!(rule.is_active);
        assert_eq!(
            rule.steps.iter().map(|s| s.step_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[rstest]
    #[case("percentage", Some(60), None, true)]
    #[case("percentage", None, None, false)]
    #[case("percentage", Some(0), None, false)]
    #[case("percentage", Some(101), None, false)]
    #[case("specific_approver", None, Some(Uuid::nil()), true)]
    #[case("specific_approver", None, None, false)]
    #[case("hybrid", Some(50), Some(Uuid::nil()), true)]
    #[case("hybrid", Some(50), None, false)]
    #[case("sequential", Some(50), None, true)]
    #[case("round_robin", None, None, false)]
    fn test_kind_parameters(
        #[case] rule_type: &str,
        #[case] percentage: Option<i32>,
        #[case] approver: Option<Uuid>,
        #[case] ok: bool,
    ) {
        assert_eq!(RuleKind::from_parts(rule_type, percentage, approver).is_ok(), ok);
    }

    #[test]
    fn test_kind_accessors() {
        let approver = Uuid::new_v4();
        let kind = RuleKind::from_parts("hybrid", Some(75), Some(approver)).unwrap();

        assert_eq!(kind.rule_type(), "hybrid");
        assert_eq!(kind.percentage_required(), Some(75));
        assert_eq!(kind.specific_approver_id(), Some(approver));
        assert_eq!(RuleKind::Sequential.percentage_required(), None);
    }

    #[test]
    fn test_every_kind_clears_on_highest_pending_step() {
        let id = Uuid::new_v4();
        for kind in [
            RuleKind::Sequential,
            RuleKind::Percentage { threshold: 100 },
            RuleKind::SpecificApprover { approver_id: id },
            RuleKind::Hybrid {
                threshold: 1,
                approver_id: id,
            },
        ] {
            assert_eq!(
                kind.completion_policy(),
                CompletionPolicy::HighestPendingStepClears
            );
            // Decisions resolve with the default policy.
            assert_eq!(kind.completion_policy(), CompletionPolicy::default());
        }
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut d = draft("sequential");
        d.name = "   ".to_string();
        assert!(matches!(
            d.into_rule(Uuid::new_v4()),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_step_zero_reserved_for_manager() {
        let mut d = draft("sequential");
        d.steps = vec![step(0)];
        assert!(d.into_rule(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_duplicate_step_numbers_rejected() {
        let mut d = draft("sequential");
        d.steps = vec![step(1), step(3), step(1)];
        let err = d.into_rule(Uuid::new_v4()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_update_replaces_steps() {
        let mut rule = draft("sequential").into_rule(Uuid::new_v4()).unwrap();
        let update = RuleUpdate {
            is_active: Some(false),
            priority: Some(7),
            steps: Some(vec![step(5)]),
            ..RuleUpdate::default()
        };

        update.apply(&mut rule).unwrap();

        assert!(!rule.is_active);
        assert_eq!(rule.priority, 7);
        assert_eq!(rule.steps.len(), 1);
        assert_eq!(rule.steps[0].step_number, 5);
    }

    #[test]
    fn test_invalid_update_leaves_rule_untouched() {
        let mut rule = draft("sequential").into_rule(Uuid::new_v4()).unwrap();
        let update = RuleUpdate {
            priority: Some(9),
            steps: Some(vec![step(2), step(2)]),
            ..RuleUpdate::default()
        };

        assert!(update.apply(&mut rule).is_err());
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.steps.len(), 2);
    }

    #[test]
    fn test_rule_serializes_flat_kind() {
        let mut d = draft("percentage");
        d.percentage_required = Some(60);
        let rule = d.into_rule(Uuid::new_v4()).unwrap();
        let value = serde_json::to_value(&rule).unwrap();

        assert_eq!(value["rule_type"], "percentage");
        assert_eq!(value["percentage_required"], 60);
    }
}
