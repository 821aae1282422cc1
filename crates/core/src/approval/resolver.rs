//! Approval resolution: folding one decision into the expense state.
//!
//! The resolver only looks at the expense's materialized steps. It never
//! consults the rule that produced them.

use uuid::Uuid;

use crate::approval::rule::CompletionPolicy;
use crate::approval::types::{ApprovalStep, Decision, ExpenseStatus};

/// The effect of a decision on its expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The expense becomes `rejected`.
    Rejected,
    /// The expense becomes `approved`.
    Approved,
    /// The expense stays `in_review`; the advisory pointer moves on.
    Advance {
        /// The next pending step number.
        next_step: i32,
    },
}

impl Resolution {
    /// The terminal status this resolution writes, if any.
    #[must_use]
    pub fn terminal_status(&self) -> Option<ExpenseStatus> {
        match self {
            Self::Rejected => Some(ExpenseStatus::Rejected),
            Self::Approved => Some(ExpenseStatus::Approved),
            Self::Advance { .. } => None,
        }
    }
}

/// Stateless resolver for approval decisions.
pub struct ApprovalResolver;

impl ApprovalResolver {
    /// Resolves a decision on `decided_step` against the expense's steps.
    ///
    /// # Arguments
    /// * `decided_step_id` - The step that was just decided
    /// * `decided_step_number` - Its step number
    /// * `decision` - The recorded decision
    /// * `steps` - All steps of the expense, as currently stored
    /// * `policy` - Completion policy of the governing rule
    ///
    /// A rejection rejects the expense. An approval completes it when no
    /// other step with a higher step number is still pending; lower steps
    /// do not matter. Otherwise the lowest such higher step becomes the
    /// advisory current step.
    #[must_use]
    pub fn resolve(
        decided_step_id: Uuid,
        decided_step_number: i32,
        decision: Decision,
        steps: &[ApprovalStep],
        policy: CompletionPolicy,
    ) -> Resolution {
        if decision == Decision::Rejected {
            return Resolution::Rejected;
        }

        match policy {
            CompletionPolicy::HighestPendingStepClears => steps
                .iter()
                .filter(|s| s.id != decided_step_id)
                .filter(|s| s.status.is_pending() && s.step_number > decided_step_number)
                .map(|s| s.step_number)
                .min()
                .map_or(Resolution::Approved, |next_step| Resolution::Advance {
                    next_step,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::types::StepStatus;
    use chrono::Utc;

    fn step(step_number: i32, status: StepStatus) -> ApprovalStep {
        ApprovalStep {
            id: Uuid::new_v4(),
            expense_id: Uuid::nil(),
            approver_id: Uuid::new_v4(),
            step_number,
            status,
            comments: None,
            decided_at: None,
            created_at: Utc::now(),
        }
    }

    fn resolve(decided: &ApprovalStep, decision: Decision, steps: &[ApprovalStep]) -> Resolution {
        ApprovalResolver::resolve(
            decided.id,
            decided.step_number,
            decision,
            steps,
            CompletionPolicy::HighestPendingStepClears,
        )
    }

    #[test]
    fn test_single_step_approval_completes() {
        let only = step(1, StepStatus::Approved);
        let steps = vec![only.clone()];
        assert_eq!(resolve(&only, Decision::Approved, &steps), Resolution::Approved);
    }

    #[test]
    fn test_highest_step_first_completes_with_lower_pending() {
        let steps = vec![
            step(1, StepStatus::Pending),
            step(2, StepStatus::Pending),
            step(3, StepStatus::Approved),
        ];
        assert_eq!(
            resolve(&steps[2], Decision::Approved, &steps),
            Resolution::Approved
        );
    }

    #[test]
    fn test_lower_step_advances_to_next_pending() {
        let steps = vec![
            step(0, StepStatus::Approved),
            step(2, StepStatus::Pending),
            step(5, StepStatus::Pending),
        ];
        assert_eq!(
            resolve(&steps[0], Decision::Approved, &steps),
            Resolution::Advance { next_step: 2 }
        );
    }

    #[test]
    fn test_decided_higher_steps_do_not_block() {
        let steps = vec![
            step(1, StepStatus::Approved),
            step(2, StepStatus::Approved),
            step(3, StepStatus::Rejected),
        ];
        assert_eq!(
            resolve(&steps[0], Decision::Approved, &steps),
            Resolution::Approved
        );
    }

    #[test]
    fn test_rejection_is_immediate() {
        let steps = vec![
            step(1, StepStatus::Rejected),
            step(2, StepStatus::Pending),
        ];
        let resolution = resolve(&steps[0], Decision::Rejected, &steps);
        assert_eq!(resolution, Resolution::Rejected);
        assert_eq!(resolution.terminal_status(), Some(ExpenseStatus::Rejected));
    }

    #[test]
    fn test_decided_step_excluded_even_if_still_pending_in_snapshot() {
        let decided = step(2, StepStatus::Pending);
        let steps = vec![step(1, StepStatus::Pending), decided.clone()];
        assert_eq!(
            resolve(&decided, Decision::Approved, &steps),
            Resolution::Approved
        );
    }

    #[test]
    fn test_advance_has_no_terminal_status() {
        assert_eq!(Resolution::Advance { next_step: 1 }.terminal_status(), None);
        assert_eq!(
            Resolution::Approved.terminal_status(),
            Some(ExpenseStatus::Approved)
        );
    }
}
