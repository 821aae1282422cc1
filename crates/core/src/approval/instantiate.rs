//! Workflow instantiation: turning a selected rule into concrete steps.

use outlay_shared::WorkflowSettings;
use serde::Serialize;
use uuid::Uuid;

use crate::approval::error::WorkflowError;
use crate::approval::rule::ApprovalRule;
use crate::approval::types::ExpenseStatus;

/// Step number of the synthetic manager-first step.
pub const MANAGER_STEP_NUMBER: i32 = 0;

/// Step number used when a single approver is derived without a rule.
pub const SOLE_STEP_NUMBER: i32 = 1;

/// What happens to an expense for which no approver can be derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadEndPolicy {
    /// Leave the expense `pending` and report it as stalled.
    #[default]
    Hold,
    /// Approve the expense immediately.
    AutoApprove,
    /// Route the expense to a fixed approver.
    FallbackApprover(Uuid),
}

impl DeadEndPolicy {
    /// Builds the policy from configuration.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` for an unknown policy name or a
    /// `fallback_approver` policy without an approver.
    pub fn from_settings(settings: &WorkflowSettings) -> Result<Self, WorkflowError> {
        match settings.dead_end_policy.as_str() {
            "hold" => Ok(Self::Hold),
            "auto_approve" => Ok(Self::AutoApprove),
            "fallback_approver" => settings
                .fallback_approver_id
                .map(Self::FallbackApprover)
                .ok_or_else(|| {
                    WorkflowError::Validation(
                        "fallback_approver policy requires fallback_approver_id".to_string(),
                    )
                }),
            other => Err(WorkflowError::Validation(format!(
                "unknown dead-end policy: {other}"
            ))),
        }
    }
}

/// Where a planned step came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOrigin {
    /// The submitter's manager.
    Manager,
    /// A workflow step of the selected rule.
    Rule,
    /// The configured fallback approver.
    Fallback,
}

/// A step to be created for a new expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStep {
    /// Who approves.
    pub approver_id: Uuid,
    /// Step number.
    pub step_number: i32,
    /// Where the step came from.
    pub origin: StepOrigin,
}

/// How the submission concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowOutcome {
    /// Steps were created; the expense is `in_review`.
    Review,
    /// No approver; the expense is held `pending`.
    Stalled,
    /// No approver; the expense was approved outright.
    AutoApproved,
}

/// The materialized workflow for a new expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPlan {
    /// The rule that governed the plan, if any.
    pub rule_id: Option<Uuid>,
    /// Steps to create, all `pending`.
    pub steps: Vec<PlannedStep>,
    /// Status the expense is created with.
    pub status: ExpenseStatus,
    /// Initial advisory step pointer.
    pub current_approver_step: i32,
    /// How the submission concluded.
    pub outcome: WorkflowOutcome,
}

/// Stateless instantiator for approval workflows.
pub struct WorkflowInstantiator;

impl WorkflowInstantiator {
    /// Plans the approval steps for a new expense.
    ///
    /// # Arguments
    /// * `rule` - The selected rule, if any
    /// * `manager_id` - The submitter's manager, if any
    /// * `policy` - Applied when no step could be derived
    ///
    /// Without a rule the manager becomes step 1. With a manager-first rule
    /// the manager becomes step 0, ahead of the rule's own steps. All steps
    /// are created pending at once, so every approver can act immediately.
    #[must_use]
    pub fn plan(
        rule: Option<&ApprovalRule>,
        manager_id: Option<Uuid>,
        policy: &DeadEndPolicy,
    ) -> WorkflowPlan {
        let mut steps = Vec::new();
        let mut current_approver_step = 0;

        match rule {
            None => {
                if let Some(manager) = manager_id {
                    steps.push(PlannedStep {
                        approver_id: manager,
                        step_number: SOLE_STEP_NUMBER,
                        origin: StepOrigin::Manager,
                    });
                    current_approver_step = SOLE_STEP_NUMBER;
                }
            }
            Some(rule) => {
                if rule.is_manager_approver
                    && let Some(manager) = manager_id
                {
                    steps.push(PlannedStep {
                        approver_id: manager,
                        step_number: MANAGER_STEP_NUMBER,
                        origin: StepOrigin::Manager,
                    });
                    current_approver_step = MANAGER_STEP_NUMBER;
                }

                let mut rule_steps: Vec<_> = rule.steps.iter().collect();
                rule_steps.sort_by_key(|s| s.step_number);
                steps.extend(rule_steps.into_iter().map(|s| PlannedStep {
                    approver_id: s.approver_id,
                    step_number: s.step_number,
                    origin: StepOrigin::Rule,
                }));
            }
        }

        let rule_id = rule.map(|r| r.id);

        if !steps.is_empty() {
            return WorkflowPlan {
                rule_id,
                steps,
                status: ExpenseStatus::InReview,
                current_approver_step,
                outcome: WorkflowOutcome::Review,
            };
        }

        match policy {
            DeadEndPolicy::Hold => WorkflowPlan {
                rule_id,
                steps,
                status: ExpenseStatus::Pending,
                current_approver_step,
                outcome: WorkflowOutcome::Stalled,
            },
            DeadEndPolicy::AutoApprove => WorkflowPlan {
                rule_id,
                steps,
                status: ExpenseStatus::Approved,
                current_approver_step,
                outcome: WorkflowOutcome::AutoApproved,
            },
            DeadEndPolicy::FallbackApprover(approver_id) => WorkflowPlan {
                rule_id,
                steps: vec![PlannedStep {
                    approver_id: *approver_id,
                    step_number: SOLE_STEP_NUMBER,
                    origin: StepOrigin::Fallback,
                }],
                status: ExpenseStatus::InReview,
                current_approver_step: SOLE_STEP_NUMBER,
                outcome: WorkflowOutcome::Review,
            },
        }
    }
}
