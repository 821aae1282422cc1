//! Property-based tests for rule selection, instantiation and resolution.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::approval::instantiate::{DeadEndPolicy, WorkflowInstantiator};
use crate::approval::resolver::{ApprovalResolver, Resolution};
use crate::approval::rule::{ApprovalRule, RuleKind, WorkflowStep};
use crate::approval::selector::RuleSelector;
use crate::approval::types::{ApprovalStep, Decision, ExpenseStatus, StepStatus};

/// Strategy for a set of distinct rule step numbers (1..50).
fn arb_step_numbers() -> impl Strategy<Value = BTreeSet<i32>> {
    prop::collection::btree_set(1i32..50, 1..8)
}

/// Strategy for any rule kind.
fn arb_kind() -> impl Strategy<Value = RuleKind> {
    prop_oneof![
        Just(RuleKind::Sequential),
        (1u8..=100).prop_map(|threshold| RuleKind::Percentage { threshold }),
        Just(RuleKind::SpecificApprover {
            approver_id: Uuid::nil()
        }),
        (1u8..=100).prop_map(|threshold| RuleKind::Hybrid {
            threshold,
            approver_id: Uuid::nil()
        }),
    ]
}

fn rule(priority: i32, age_minutes: i64, is_active: bool, numbers: &BTreeSet<i32>) -> ApprovalRule {
    let created_at = Utc::now() - Duration::minutes(age_minutes);
    ApprovalRule {
        id: Uuid::new_v4(),
        company_id: Uuid::nil(),
        name: format!("p{priority}"),
        description: None,
        kind: RuleKind::Sequential,
        is_manager_approver: false,
        priority,
        is_active,
        steps: numbers
            .iter()
            .map(|n| WorkflowStep {
                id: Uuid::new_v4(),
                approver_id: Uuid::new_v4(),
                step_number: *n,
                is_required: true,
            })
            .collect(),
        created_at,
        updated_at: created_at,
    }
}

fn pending_steps(numbers: &BTreeSet<i32>) -> Vec<ApprovalStep> {
    numbers
        .iter()
        .map(|n| ApprovalStep {
            id: Uuid::new_v4(),
            expense_id: Uuid::nil(),
            approver_id: Uuid::new_v4(),
            step_number: *n,
            status: StepStatus::Pending,
            comments: None,
            decided_at: None,
            created_at: Utc::now(),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Selection
    // =========================================================================

    /// The selected rule is active and no active rule outranks it.
    #[test]
    fn prop_selected_rule_is_maximal(
        specs in prop::collection::vec((-5i32..5, 0i64..1000, any::<bool>()), 0..10)
    ) {
        let empty = BTreeSet::new();
        let rules: Vec<_> = specs
            .iter()
            .map(|(p, age, active)| rule(*p, *age, *active, &empty))
            .collect();

        match RuleSelector::select(&rules) {
            None => prop_assert!(rules.iter().all(|r| !r.is_active)),
            Some(selected) => {
                prop_assert!(selected.is_active);
                for other in rules.iter().filter(|r| r.is_active) {
                    prop_assert!(
                        (selected.priority, selected.created_at)
                            >= (other.priority, other.created_at)
                    );
                }
            }
        }
    }

    // =========================================================================
    // Instantiation
    // =========================================================================

    /// Every rule step is materialized with its own number, plus step 0 for
    /// a manager-first rule when the submitter has a manager.
    #[test]
    fn prop_instantiation_copies_rule_steps(
        numbers in arb_step_numbers(),
        manager_first in any::<bool>(),
        has_manager in any::<bool>(),
    ) {
        let mut r = rule(0, 0, true, &numbers);
        r.is_manager_approver = manager_first;
        let manager = has_manager.then(Uuid::new_v4);

        let plan = WorkflowInstantiator::plan(Some(&r), manager, &DeadEndPolicy::Hold);

        let mut expected: Vec<i32> = numbers.iter().copied().collect();
        if manager_first && has_manager {
            expected.insert(0, 0);
        }
        let actual: Vec<i32> = plan.steps.iter().map(|s| s.step_number).collect();
        prop_assert_eq!(actual, expected);
        prop_assert_eq!(plan.status, ExpenseStatus::InReview);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Approving the highest step completes the expense no matter how many
    /// lower steps are still pending.
    #[test]
    fn prop_highest_step_clears(numbers in arb_step_numbers(), kind in arb_kind()) {
        let steps = pending_steps(&numbers);
        let top = steps.last().unwrap();

        let resolution = ApprovalResolver::resolve(
            top.id,
            top.step_number,
            Decision::Approved,
            &steps,
            kind.completion_policy(),
        );

        prop_assert_eq!(resolution, Resolution::Approved);
    }

    /// Approving any other step advances to the next higher pending number.
    #[test]
    fn prop_lower_step_advances(numbers in arb_step_numbers(), pick in any::<prop::sample::Index>()) {
        let steps = pending_steps(&numbers);
        let decided = &steps[pick.index(steps.len())];

        let resolution = ApprovalResolver::resolve(
            decided.id,
            decided.step_number,
            Decision::Approved,
            &steps,
            RuleKind::Sequential.completion_policy(),
        );

        match numbers.range((decided.step_number + 1)..).next() {
            Some(next) => prop_assert_eq!(resolution, Resolution::Advance { next_step: *next }),
            None => prop_assert_eq!(resolution, Resolution::Approved),
        }
    }

    /// A rejection is terminal regardless of the remaining steps or kind.
    #[test]
    fn prop_rejection_always_rejects(
        numbers in arb_step_numbers(),
        pick in any::<prop::sample::Index>(),
        kind in arb_kind(),
    ) {
        let steps = pending_steps(&numbers);
        let decided = &steps[pick.index(steps.len())];

        let resolution = ApprovalResolver::resolve(
            decided.id,
            decided.step_number,
            Decision::Rejected,
            &steps,
            kind.completion_policy(),
        );

        prop_assert_eq!(resolution, Resolution::Rejected);
    }
}
