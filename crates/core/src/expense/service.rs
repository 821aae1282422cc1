//! Expense service: submission, decisions, read models and rule management.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::approval::error::WorkflowError;
use crate::approval::instantiate::{
    DeadEndPolicy, SOLE_STEP_NUMBER, WorkflowInstantiator, WorkflowOutcome,
};
use crate::approval::resolver::ApprovalResolver;
use crate::approval::rule::{ApprovalRule, CompletionPolicy, RuleDraft, RuleUpdate};
use crate::approval::selector::RuleSelector;
use crate::approval::types::{ApprovalStep, Decision, ExpenseStatus, StepStatus};
use crate::currency::{CurrencyConverter, convert_or_original};
use crate::expense::lifecycle::ExpenseLifecycle;
use crate::expense::types::{
    Caller, Company, DecisionOutcome, Expense, ExpenseSource, ExpenseWithSteps, NewExpense,
    PendingApproval, SubmittedExpense,
};
use crate::extraction::{Document, DocumentExtractor, ExtractionError};
use crate::store::{
    DecisionRecord, DirectoryStore, ExpenseStore, RuleStore, StepDecision, Submission,
};

/// Expense workflow service.
///
/// Holds the storage and collaborator handles; every operation is a single
/// request with no in-process workflow state.
#[derive(Clone)]
pub struct ExpenseService {
    rules: Arc<dyn RuleStore>,
    expenses: Arc<dyn ExpenseStore>,
    directory: Arc<dyn DirectoryStore>,
    converter: Arc<dyn CurrencyConverter>,
    extractor: Option<Arc<dyn DocumentExtractor>>,
    dead_end_policy: DeadEndPolicy,
}

impl ExpenseService {
    /// Creates a service without document extraction and with the `Hold`
    /// dead-end policy.
    #[must_use]
    pub fn new(
        rules: Arc<dyn RuleStore>,
        expenses: Arc<dyn ExpenseStore>,
        directory: Arc<dyn DirectoryStore>,
        converter: Arc<dyn CurrencyConverter>,
    ) -> Self {
        Self {
            rules,
            expenses,
            directory,
            converter,
            extractor: None,
            dead_end_policy: DeadEndPolicy::default(),
        }
    }

    /// Enables document uploads.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Sets the dead-end policy.
    #[must_use]
    pub fn with_dead_end_policy(mut self, policy: DeadEndPolicy) -> Self {
        self.dead_end_policy = policy;
        self
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submits a manually entered expense.
    ///
    /// The amount is converted into the company currency (the original is
    /// kept if conversion fails), the governing rule is selected and the
    /// approval steps are created together with the expense.
    pub async fn submit_expense(
        &self,
        caller: &Caller,
        input: NewExpense,
    ) -> Result<SubmittedExpense, WorkflowError> {
        let input = input.validate()?;
        let company = self.company_of(caller).await?;
        let rules = self.rules.active_rules(caller.company_id).await?;
        let rule = RuleSelector::select(&rules);

        let (submission, outcome) = self
            .prepare(caller, &company, rule, input, ExpenseSource::Manual, None)
            .await?;
        self.expenses
            .create_submissions(std::slice::from_ref(&submission))
            .await?;

        Ok(Self::submitted(submission, outcome))
    }

    /// Submits every expense found in an uploaded document.
    ///
    /// Records are extracted first; if extraction fails nothing is created.
    /// The batch is stored all or nothing.
    pub async fn submit_document(
        &self,
        caller: &Caller,
        document: Document,
    ) -> Result<Vec<SubmittedExpense>, WorkflowError> {
        let extractor = self
            .extractor
            .as_ref()
            .ok_or(ExtractionError::NotConfigured)?;
        let records = extractor.extract(&document).await?;

        let company = self.company_of(caller).await?;
        let rules = self.rules.active_rules(caller.company_id).await?;
        let rule = RuleSelector::select(&rules);
        let today = Utc::now().date_naive();

        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            let input = record.into_new_expense(today).validate()?;
            prepared.push(
                self.prepare(
                    caller,
                    &company,
                    rule,
                    input,
                    ExpenseSource::Ai,
                    Some(document.filename().to_string()),
                )
                .await?,
            );
        }

        let batch: Vec<Submission> = prepared.iter().map(|(s, _)| s.clone()).collect();
        self.expenses.create_submissions(&batch).await?;

        info!(
            employee_id = %caller.id,
            filename = document.filename(),
            count = prepared.len(),
            "Expenses created from document"
        );

        Ok(prepared
            .into_iter()
            .map(|(submission, outcome)| Self::submitted(submission, outcome))
            .collect())
    }

    async fn company_of(&self, caller: &Caller) -> Result<Company, WorkflowError> {
        self.directory
            .find_company(caller.company_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::Validation(format!("company {} not found", caller.company_id))
            })
    }

    async fn prepare(
        &self,
        caller: &Caller,
        company: &Company,
        rule: Option<&ApprovalRule>,
        input: NewExpense,
        source: ExpenseSource,
        receipt_filename: Option<String>,
    ) -> Result<(Submission, WorkflowOutcome), WorkflowError> {
        let converted_amount = convert_or_original(
            self.converter.as_ref(),
            input.amount,
            &input.currency,
            &company.currency,
        )
        .await;

        let plan = WorkflowInstantiator::plan(rule, caller.manager_id, &self.dead_end_policy);
        let status = match plan.status {
            ExpenseStatus::Pending => ExpenseStatus::Pending,
            target => ExpenseLifecycle::transition(ExpenseStatus::Pending, target)?,
        };

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4(),
            employee_id: caller.id,
            company_id: caller.company_id,
            rule_id: plan.rule_id,
            amount: input.amount,
            currency: input.currency,
            converted_amount,
            category: input.category,
            description: input.description,
            expense_date: input.expense_date.unwrap_or_else(|| now.date_naive()),
            merchant_name: input.merchant_name,
            expense_type: input.expense_type,
            receipt_filename,
            source,
            status,
            current_approver_step: plan.current_approver_step,
            created_at: now,
            updated_at: now,
        };

        let steps = plan
            .steps
            .iter()
            .map(|planned| ApprovalStep {
                id: Uuid::new_v4(),
                expense_id: expense.id,
                approver_id: planned.approver_id,
                step_number: planned.step_number,
                status: StepStatus::Pending,
                comments: None,
                decided_at: None,
                created_at: now,
            })
            .collect();

        match plan.outcome {
            WorkflowOutcome::Stalled => warn!(
                expense_id = %expense.id,
                employee_id = %caller.id,
                "No approver for expense, holding as stalled"
            ),
            WorkflowOutcome::AutoApproved => info!(
                expense_id = %expense.id,
                employee_id = %caller.id,
                "No approver for expense, auto-approved"
            ),
            WorkflowOutcome::Review => info!(
                expense_id = %expense.id,
                employee_id = %caller.id,
                rule_id = ?plan.rule_id,
                steps = plan.steps.len(),
                "Expense submitted for review"
            ),
        }

        Ok((Submission { expense, steps }, plan.outcome))
    }

    fn submitted(submission: Submission, outcome: WorkflowOutcome) -> SubmittedExpense {
        SubmittedExpense {
            expense: submission.expense,
            steps: submission.steps,
            outcome,
        }
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    /// Records an approver's decision and resolves the expense.
    ///
    /// # Errors
    ///
    /// * `StepNotFound` if the step does not exist or belongs to another
    ///   approver
    /// * `AlreadyDecided` if the step already left `pending`
    pub async fn decide(
        &self,
        caller: &Caller,
        step_id: Uuid,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<DecisionOutcome, WorkflowError> {
        // Every rule kind maps to the default policy, so the governing rule is
        // not looked up (see `RuleKind::completion_policy`).
        let policy = CompletionPolicy::default();
        let resolve = move |step: &ApprovalStep, steps: &[ApprovalStep]| {
            ApprovalResolver::resolve(step.id, step.step_number, decision, steps, policy)
        };

        let record = self
            .expenses
            .record_decision(
                &StepDecision {
                    step_id,
                    approver_id: caller.id,
                    status: decision.step_status(),
                    comments: comments
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty()),
                    decided_at: Utc::now(),
                },
                &resolve,
            )
            .await?;

        match record {
            DecisionRecord::Recorded {
                step,
                expense,
                resolution,
                transitioned,
            } => {
                if transitioned {
                    info!(
                        expense_id = %expense.id,
                        step_id = %step.id,
                        approver_id = %caller.id,
                        status = %expense.status,
                        "Expense finalized"
                    );
                } else {
                    info!(
                        expense_id = %expense.id,
                        step_id = %step.id,
                        approver_id = %caller.id,
                        decision = %step.status,
                        resolution = ?resolution,
                        "Approval step decided"
                    );
                }
                Ok(DecisionOutcome {
                    step,
                    expense,
                    transitioned,
                })
            }
            DecisionRecord::StepNotFound => Err(WorkflowError::StepNotFound(step_id)),
            DecisionRecord::AlreadyDecided => Err(WorkflowError::AlreadyDecided { step_id }),
        }
    }

    // ========================================================================
    // Read models
    // ========================================================================

    /// Steps awaiting the caller, oldest first.
    pub async fn pending_approvals(
        &self,
        caller: &Caller,
    ) -> Result<Vec<PendingApproval>, WorkflowError> {
        Ok(self.expenses.pending_for_approver(caller.id).await?)
    }

    /// The caller's own expenses, newest first.
    pub async fn my_expenses(&self, caller: &Caller) -> Result<Vec<ExpenseWithSteps>, WorkflowError> {
        Ok(self.expenses.expenses_for_employee(caller.id).await?)
    }

    /// Every expense of a company, newest first.
    pub async fn company_expenses(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<ExpenseWithSteps>, WorkflowError> {
        Ok(self.expenses.expenses_for_company(company_id).await?)
    }

    /// Expenses held because no approver could be derived.
    pub async fn stalled_expenses(&self, company_id: Uuid) -> Result<Vec<Expense>, WorkflowError> {
        Ok(self.expenses.stalled_expenses(company_id).await?)
    }

    /// Routes a stalled expense to `approver_id` as its single step.
    ///
    /// # Errors
    ///
    /// * `ExpenseNotFound` if the expense does not exist in the company
    /// * `Validation` if the approver is not a member of the company
    /// * `NotStalled` if the expense is not `pending`
    pub async fn escalate_stalled(
        &self,
        company_id: Uuid,
        expense_id: Uuid,
        approver_id: Uuid,
    ) -> Result<ExpenseWithSteps, WorkflowError> {
        let expense = self
            .expenses
            .find_expense(expense_id)
            .await?
            .filter(|e| e.company_id == company_id)
            .ok_or(WorkflowError::ExpenseNotFound(expense_id))?;
        if expense.status != ExpenseStatus::Pending {
            return Err(WorkflowError::NotStalled(expense_id));
        }
        ExpenseLifecycle::transition(expense.status, ExpenseStatus::InReview)?;
        self.ensure_member(company_id, approver_id).await?;

        let step = ApprovalStep {
            id: Uuid::new_v4(),
            expense_id,
            approver_id,
            step_number: SOLE_STEP_NUMBER,
            status: StepStatus::Pending,
            comments: None,
            decided_at: None,
            created_at: Utc::now(),
        };
        if !self.expenses.escalate(&step).await? {
            return Err(WorkflowError::NotStalled(expense_id));
        }

        info!(%expense_id, %approver_id, "Stalled expense escalated");

        let expense = self
            .expenses
            .find_expense(expense_id)
            .await?
            .ok_or(WorkflowError::ExpenseNotFound(expense_id))?;
        let steps = self.expenses.steps_for_expense(expense_id).await?;
        Ok(ExpenseWithSteps { expense, steps })
    }

    async fn ensure_member(&self, company_id: Uuid, user_id: Uuid) -> Result<(), WorkflowError> {
        match self.directory.find_caller(user_id).await? {
            Some(user) if user.company_id == company_id => Ok(()),
            _ => Err(WorkflowError::Validation(format!(
                "approver {user_id} is not a member of this company"
            ))),
        }
    }

    // ========================================================================
    // Rule management
    // ========================================================================

    /// All rules of a company, priority descending then newest first.
    pub async fn list_rules(&self, company_id: Uuid) -> Result<Vec<ApprovalRule>, WorkflowError> {
        Ok(self.rules.list_rules(company_id).await?)
    }

    /// A rule of the company.
    pub async fn get_rule(
        &self,
        company_id: Uuid,
        rule_id: Uuid,
    ) -> Result<ApprovalRule, WorkflowError> {
        self.rules
            .find_rule(company_id, rule_id)
            .await?
            .ok_or(WorkflowError::RuleNotFound(rule_id))
    }

    /// Creates a rule after validating it and its approvers.
    pub async fn create_rule(
        &self,
        company_id: Uuid,
        draft: RuleDraft,
    ) -> Result<ApprovalRule, WorkflowError> {
        let rule = draft.into_rule(company_id)?;
        self.ensure_approvers(&rule).await?;
        self.rules.insert_rule(&rule).await?;

        info!(
            rule_id = %rule.id,
            %company_id,
            rule_type = rule.kind.rule_type(),
            steps = rule.steps.len(),
            "Approval rule created"
        );
        Ok(rule)
    }

    /// Applies a partial update; a present step list replaces the old one.
    pub async fn update_rule(
        &self,
        company_id: Uuid,
        rule_id: Uuid,
        update: RuleUpdate,
    ) -> Result<ApprovalRule, WorkflowError> {
        let mut rule = self.get_rule(company_id, rule_id).await?;
        let replaces_steps = update.steps.is_some();
        update.apply(&mut rule)?;
        if replaces_steps {
            self.ensure_approvers(&rule).await?;
        }
        self.rules.update_rule(&rule).await?;

        info!(%rule_id, %company_id, is_active = rule.is_active, "Approval rule updated");
        Ok(rule)
    }

    /// Deletes a rule and its steps.
    pub async fn delete_rule(&self, company_id: Uuid, rule_id: Uuid) -> Result<(), WorkflowError> {
        if !self.rules.delete_rule(company_id, rule_id).await? {
            return Err(WorkflowError::RuleNotFound(rule_id));
        }
        info!(%rule_id, %company_id, "Approval rule deleted");
        Ok(())
    }

    async fn ensure_approvers(&self, rule: &ApprovalRule) -> Result<(), WorkflowError> {
        let approvers = rule
            .steps
            .iter()
            .map(|s| s.approver_id)
            .chain(rule.kind.specific_approver_id());
        for approver in approvers {
            self.ensure_member(rule.company_id, approver).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::rule::StepDraft;
    use crate::currency::FixedRateConverter;
    use crate::expense::types::{ExpenseSource, Role};
    use crate::extraction::{ExtractedExpense, FixedExtractor};
    use crate::store::InMemoryStore;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: ExpenseService,
        company_id: Uuid,
        admin: Caller,
        manager: Caller,
        employee: Caller,
        loner: Caller,
        approvers: Vec<Caller>,
    }

    fn user(company_id: Uuid, role: Role, manager_id: Option<Uuid>) -> Caller {
        Caller {
            id: Uuid::new_v4(),
            company_id,
            role,
            manager_id,
        }
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let company_id = Uuid::new_v4();
        store
            .insert_company(Company {
                id: company_id,
                name: "Acme".to_string(),
                currency: "USD".to_string(),
            })
            .await;

        let admin = user(company_id, Role::Admin, None);
        let manager = user(company_id, Role::Manager, None);
        let employee = user(company_id, Role::Employee, Some(manager.id));
        let loner = user(company_id, Role::Employee, None);
        let approvers: Vec<_> = (0..3)
            .map(|_| user(company_id, Role::Manager, None))
            .collect();
        for caller in [&admin, &manager, &employee, &loner]
            .into_iter()
            .chain(approvers.iter())
        {
            store.insert_caller(caller.clone()).await;
        }

        let converter = FixedRateConverter::new().with_rate("EUR", "USD", dec!(1.10));
        let service = ExpenseService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(converter),
        );

        Fixture {
            store,
            service,
            company_id,
            admin,
            manager,
            employee,
            loner,
            approvers,
        }
    }

    fn lunch(amount: rust_decimal::Decimal, currency: &str) -> NewExpense {
        NewExpense {
            amount,
            currency: currency.to_string(),
            category: "Meals".to_string(),
            description: "Team lunch".to_string(),
            expense_date: None,
            merchant_name: Some("Cafe".to_string()),
            expense_type: None,
        }
    }

    fn sequential(approvers: &[Caller], manager_first: bool, priority: i32) -> RuleDraft {
        RuleDraft {
            name: "Default".to_string(),
            description: None,
            rule_type: "sequential".to_string(),
            percentage_required: None,
            specific_approver_id: None,
            is_manager_approver: Some(manager_first),
            priority: Some(priority),
            steps: approvers
                .iter()
                .enumerate()
                .map(|(i, a)| StepDraft {
                    approver_id: a.id,
                    step_number: i32::try_from(i).unwrap() + 1,
                    is_required: true,
                })
                .collect(),
        }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    #[tokio::test]
    async fn test_submit_without_rule_routes_to_manager() {
        let f = fixture().await;

        let submitted = f
            .service
            .submit_expense(&f.employee, lunch(dec!(42.00), "usd"))
            .await
            .unwrap();

        assert_eq!(submitted.outcome, WorkflowOutcome::Review);
        assert_eq!(submitted.expense.status, ExpenseStatus::InReview);
        assert_eq!(submitted.expense.currency, "USD");
        assert_eq!(submitted.expense.rule_id, None);
        assert_eq!(submitted.expense.current_approver_step, SOLE_STEP_NUMBER);
        assert_eq!(submitted.steps.len(), 1);
        assert_eq!(submitted.steps[0].approver_id, f.manager.id);
        assert_eq!(submitted.steps[0].step_number, SOLE_STEP_NUMBER);

        let pending = f.service.pending_approvals(&f.manager).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].expense.id, submitted.expense.id);
    }

    #[tokio::test]
    async fn test_submit_converts_into_company_currency() {
        let f = fixture().await;

        let converted = f
            .service
            .submit_expense(&f.employee, lunch(dec!(100.00), "EUR"))
            .await
            .unwrap();
        assert_eq!(converted.expense.amount, dec!(100.00));
        assert_eq!(converted.expense.converted_amount, dec!(110.00));

        // No rate for GBP: the original amount is kept.
        let kept = f
            .service
            .submit_expense(&f.employee, lunch(dec!(25.50), "GBP"))
            .await
            .unwrap();
        assert_eq!(kept.expense.converted_amount, dec!(25.50));
    }

    #[tokio::test]
    async fn test_out_of_range_conversion_keeps_original() {
        let f = fixture().await;

        let submitted = f
            .service
            .submit_expense(&f.employee, lunch(dec!(999999999999999.9999), "EUR"))
            .await
            .unwrap();
        assert_eq!(submitted.expense.converted_amount, dec!(999999999999999.9999));

        let err = f
            .service
            .submit_expense(&f.employee, lunch(rust_decimal::Decimal::MAX, "EUR"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_input() {
        let f = fixture().await;

        let err = f
            .service
            .submit_expense(&f.employee, lunch(dec!(-1), "USD"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let mut blank = lunch(dec!(1), "USD");
        blank.description = "   ".to_string();
        let err = f.service.submit_expense(&f.employee, blank).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        assert!(f.service.my_expenses(&f.employee).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_with_manager_first_rule() {
        let f = fixture().await;
        let rule = f
            .service
            .create_rule(f.company_id, sequential(&f.approvers[..2], true, 0))
            .await
            .unwrap();

        let submitted = f
            .service
            .submit_expense(&f.employee, lunch(dec!(10), "USD"))
            .await
            .unwrap();

        assert_eq!(submitted.expense.rule_id, Some(rule.id));
        assert_eq!(submitted.expense.current_approver_step, 0);
        let numbers: Vec<_> = submitted.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert_eq!(submitted.steps[0].approver_id, f.manager.id);

        // Every approver sees the expense at once.
        for approver in [&f.manager, &f.approvers[0], &f.approvers[1]] {
            assert_eq!(f.service.pending_approvals(approver).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_submit_selects_highest_priority_rule() {
        let f = fixture().await;
        f.service
            .create_rule(f.company_id, sequential(&f.approvers[..1], false, 1))
            .await
            .unwrap();
        let winner = f
            .service
            .create_rule(f.company_id, sequential(&f.approvers[1..2], false, 5))
            .await
            .unwrap();

        let submitted = f
            .service
            .submit_expense(&f.employee, lunch(dec!(10), "USD"))
            .await
            .unwrap();
        assert_eq!(submitted.expense.rule_id, Some(winner.id));
        assert_eq!(submitted.steps[0].approver_id, f.approvers[1].id);
    }

    #[tokio::test]
    async fn test_dead_end_holds_by_default() {
        let f = fixture().await;

        let submitted = f
            .service
            .submit_expense(&f.loner, lunch(dec!(10), "USD"))
            .await
            .unwrap();

        assert_eq!(submitted.outcome, WorkflowOutcome::Stalled);
        assert_eq!(submitted.expense.status, ExpenseStatus::Pending);
        assert!(submitted.steps.is_empty());

        let stalled = f.service.stalled_expenses(f.company_id).await.unwrap();
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].id, submitted.expense.id);
    }

    #[tokio::test]
    async fn test_dead_end_auto_approve_policy() {
        let f = fixture().await;
        let service = f
            .service
            .clone()
            .with_dead_end_policy(DeadEndPolicy::AutoApprove);

        let submitted = service
            .submit_expense(&f.loner, lunch(dec!(10), "USD"))
            .await
            .unwrap();

        assert_eq!(submitted.outcome, WorkflowOutcome::AutoApproved);
        assert_eq!(submitted.expense.status, ExpenseStatus::Approved);
        assert!(service.stalled_expenses(f.company_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_end_fallback_approver_policy() {
        let f = fixture().await;
        let service = f
            .service
            .clone()
            .with_dead_end_policy(DeadEndPolicy::FallbackApprover(f.admin.id));

        let submitted = service
            .submit_expense(&f.loner, lunch(dec!(10), "USD"))
            .await
            .unwrap();

        assert_eq!(submitted.expense.status, ExpenseStatus::InReview);
        assert_eq!(submitted.steps.len(), 1);
        assert_eq!(submitted.steps[0].approver_id, f.admin.id);
    }

    #[tokio::test]
    async fn test_submit_document_requires_extractor() {
        let f = fixture().await;
        let document = Document::new("receipt.pdf", vec![1, 2, 3]).unwrap();

        let err = f
            .service
            .submit_document(&f.employee, document)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "EXTRACTION_UNAVAILABLE");
        assert!(f.service.my_expenses(&f.employee).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_document_creates_every_record() {
        let f = fixture().await;
        let extractor = FixedExtractor::new(vec![
            ExtractedExpense {
                merchant_name: Some("Hotel".to_string()),
                amount: Some(dec!(200)),
                currency: Some("EUR".to_string()),
                ..ExtractedExpense::default()
            },
            ExtractedExpense::default(),
        ]);
        let service = f.service.clone().with_extractor(Arc::new(extractor));
        let document = Document::new("statement.pdf", vec![1, 2, 3]).unwrap();

        let submitted = service.submit_document(&f.employee, document).await.unwrap();

        assert_eq!(submitted.len(), 2);
        assert!(submitted.iter().all(|s| s.expense.source == ExpenseSource::Ai));
        assert!(
            submitted
                .iter()
                .all(|s| s.expense.receipt_filename.as_deref() == Some("statement.pdf"))
        );
        assert_eq!(submitted[0].expense.converted_amount, dec!(220.00));
        assert_eq!(submitted[1].expense.category, "General");
        assert_eq!(submitted[1].expense.amount, dec!(0));
        assert_eq!(service.my_expenses(&f.employee).await.unwrap().len(), 2);
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    async fn three_step_expense(f: &Fixture) -> SubmittedExpense {
        f.service
            .create_rule(f.company_id, sequential(&f.approvers, false, 0))
            .await
            .unwrap();
        f.service
            .submit_expense(&f.employee, lunch(dec!(10), "USD"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_highest_step_approval_completes_expense() {
        let f = fixture().await;
        let submitted = three_step_expense(&f).await;
        let last = &submitted.steps[2];

        let outcome = f
            .service
            .decide(&f.approvers[2], last.id, Decision::Approved, None)
            .await
            .unwrap();

        assert_eq!(outcome.expense.status, ExpenseStatus::Approved);
        assert_eq!(outcome.step.status, StepStatus::Approved);
        // Lower steps stay pending but drop out of the inbox.
        assert!(f.service.pending_approvals(&f.approvers[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lower_step_approval_advances_pointer() {
        let f = fixture().await;
        let submitted = three_step_expense(&f).await;

        let outcome = f
            .service
            .decide(
                &f.approvers[0],
                submitted.steps[0].id,
                Decision::Approved,
                Some("  fine  ".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(outcome.expense.status, ExpenseStatus::InReview);
        assert_eq!(outcome.expense.current_approver_step, 2);
        assert_eq!(outcome.step.comments.as_deref(), Some("fine"));
    }

    #[tokio::test]
    async fn test_any_rejection_rejects_expense() {
        let f = fixture().await;
        let submitted = three_step_expense(&f).await;

        let outcome = f
            .service
            .decide(&f.approvers[1], submitted.steps[1].id, Decision::Rejected, None)
            .await
            .unwrap();
        assert_eq!(outcome.expense.status, ExpenseStatus::Rejected);

        // A remaining step may still be decided; the expense stays rejected.
        let late = f
            .service
            .decide(&f.approvers[2], submitted.steps[2].id, Decision::Approved, None)
            .await
            .unwrap();
        assert_eq!(late.step.status, StepStatus::Approved);
        assert_eq!(late.expense.status, ExpenseStatus::Rejected);
    }

    #[tokio::test]
    async fn test_decide_rejects_wrong_approver_and_repeats() {
        let f = fixture().await;
        let submitted = three_step_expense(&f).await;
        let step = &submitted.steps[0];

        let err = f
            .service
            .decide(&f.approvers[1], step.id, Decision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::StepNotFound(id) if id == step.id));

        f.service
            .decide(&f.approvers[0], step.id, Decision::Approved, None)
            .await
            .unwrap();
        let err = f
            .service
            .decide(&f.approvers[0], step.id, Decision::Rejected, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyDecided { step_id } if step_id == step.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decisions_on_one_step() {
        let f = fixture().await;
        let submitted = three_step_expense(&f).await;
        let step_id = submitted.steps[2].id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = f.service.clone();
                let approver = f.approvers[2].clone();
                let decision = if i % 2 == 0 {
                    Decision::Approved
                } else {
                    Decision::Rejected
                };
                tokio::spawn(async move { service.decide(&approver, step_id, decision, None).await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(WorkflowError::AlreadyDecided { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);

        let expense = f
            .store
            .find_expense(submitted.expense.id)
            .await
            .unwrap()
            .unwrap();
        assert!(expense.status.is_terminal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sibling_approvals() {
        let f = fixture().await;
        let submitted = three_step_expense(&f).await;

        let handles: Vec<_> = submitted
            .steps
            .iter()
            .zip(f.approvers.iter())
            .map(|(step, approver)| {
                let service = f.service.clone();
                let approver = approver.clone();
                let step_id = step.id;
                tokio::spawn(async move {
                    service
                        .decide(&approver, step_id, Decision::Approved, None)
                        .await
                })
            })
            .collect();

        let mut transitions = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.step.status, StepStatus::Approved);
            if outcome.transitioned {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);

        let expense = f
            .store
            .find_expense(submitted.expense.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expense.status, ExpenseStatus::Approved);
    }

    // ========================================================================
    // Escalation
    // ========================================================================

    #[tokio::test]
    async fn test_escalate_stalled_expense() {
        let f = fixture().await;
        let stalled = f
            .service
            .submit_expense(&f.loner, lunch(dec!(10), "USD"))
            .await
            .unwrap();

        let escalated = f
            .service
            .escalate_stalled(f.company_id, stalled.expense.id, f.manager.id)
            .await
            .unwrap();
        assert_eq!(escalated.expense.status, ExpenseStatus::InReview);
        assert_eq!(escalated.steps.len(), 1);
        assert_eq!(escalated.steps[0].approver_id, f.manager.id);

        let err = f
            .service
            .escalate_stalled(f.company_id, stalled.expense.id, f.manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotStalled(_)));

        let outcome = f
            .service
            .decide(&f.manager, escalated.steps[0].id, Decision::Approved, None)
            .await
            .unwrap();
        assert_eq!(outcome.expense.status, ExpenseStatus::Approved);
    }

    #[tokio::test]
    async fn test_escalate_checks_company_and_approver() {
        let f = fixture().await;
        let stalled = f
            .service
            .submit_expense(&f.loner, lunch(dec!(10), "USD"))
            .await
            .unwrap();

        let err = f
            .service
            .escalate_stalled(Uuid::new_v4(), stalled.expense.id, f.manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ExpenseNotFound(_)));

        let err = f
            .service
            .escalate_stalled(f.company_id, stalled.expense.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    // ========================================================================
    // Rules
    // ========================================================================

    #[tokio::test]
    async fn test_rule_lifecycle() {
        let f = fixture().await;
        let rule = f
            .service
            .create_rule(f.company_id, sequential(&f.approvers[..1], false, 0))
            .await
            .unwrap();

        let updated = f
            .service
            .update_rule(
                f.company_id,
                rule.id,
                RuleUpdate {
                    is_active: Some(false),
                    ..RuleUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);

        // Inactive rules are skipped, so the manager fallback applies.
        let submitted = f
            .service
            .submit_expense(&f.employee, lunch(dec!(10), "USD"))
            .await
            .unwrap();
        assert_eq!(submitted.expense.rule_id, None);

        f.service.delete_rule(f.company_id, rule.id).await.unwrap();
        let err = f.service.get_rule(f.company_id, rule.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RuleNotFound(_)));
        let err = f.service.delete_rule(f.company_id, rule.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_rule_approvers_must_be_members() {
        let f = fixture().await;
        let outsider = user(Uuid::new_v4(), Role::Manager, None);

        let err = f
            .service
            .create_rule(f.company_id, sequential(&[outsider], false, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(f.service.list_rules(f.company_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rules_are_company_scoped() {
        let f = fixture().await;
        let rule = f
            .service
            .create_rule(f.company_id, sequential(&f.approvers[..1], false, 0))
            .await
            .unwrap();

        let err = f.service.get_rule(Uuid::new_v4(), rule.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RuleNotFound(_)));
        assert_eq!(f.service.list_rules(f.company_id).await.unwrap().len(), 1);
    }
}
