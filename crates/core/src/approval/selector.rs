//! Rule selection for new expenses.

use crate::approval::rule::ApprovalRule;

/// Stateless selector for the rule that governs a new expense.
pub struct RuleSelector;

impl RuleSelector {
    /// Picks the governing rule from a company's rules.
    ///
    /// Inactive rules are ignored. Among active rules the highest
    /// `priority` wins, then the most recently created. When two rules tie
    /// on both, the one earlier in `rules` wins.
    ///
    /// # Returns
    /// The selected rule, or `None` if no rule is active.
    #[must_use]
    pub fn select(rules: &[ApprovalRule]) -> Option<&ApprovalRule> {
        rules.iter().filter(|r| r.is_active).min_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
        })
    }
}
