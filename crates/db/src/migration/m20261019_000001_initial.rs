//! Initial database migration.
//!
//! Creates the enums, tables, indexes and status guards for companies,
//! users, approval rules and expenses.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: DIRECTORY
        // ============================================================
        db.execute_unprepared(COMPANIES_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;

        // ============================================================
        // PART 3: APPROVAL RULES
        // ============================================================
        db.execute_unprepared(APPROVAL_RULES_SQL).await?;
        db.execute_unprepared(WORKFLOW_STEPS_SQL).await?;

        // ============================================================
        // PART 4: EXPENSES & APPROVAL STEPS
        // ============================================================
        db.execute_unprepared(EXPENSES_SQL).await?;
        db.execute_unprepared(APPROVAL_STEPS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE user_role AS ENUM ('admin', 'manager', 'employee');

CREATE TYPE rule_type AS ENUM (
    'sequential',
    'percentage',
    'specific_approver',
    'hybrid'
);

CREATE TYPE expense_status AS ENUM (
    'pending',
    'in_review',
    'approved',
    'rejected'
);

CREATE TYPE step_status AS ENUM ('pending', 'approved', 'rejected');

CREATE TYPE expense_source AS ENUM ('manual', 'ai');
";

const COMPANIES_SQL: &str = r"
CREATE TABLE companies (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    currency VARCHAR(3) NOT NULL DEFAULT 'USD',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    email VARCHAR(255) NOT NULL UNIQUE,
    full_name VARCHAR(255) NOT NULL,
    role user_role NOT NULL DEFAULT 'employee',
    manager_id UUID REFERENCES users(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_not_own_manager CHECK (manager_id IS NULL OR manager_id <> id)
);

CREATE INDEX idx_users_company ON users(company_id);
";

const APPROVAL_RULES_SQL: &str = r"
CREATE TABLE approval_rules (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    rule_type rule_type NOT NULL,
    percentage_required INTEGER,
    specific_approver_id UUID REFERENCES users(id) ON DELETE SET NULL,
    is_manager_approver BOOLEAN NOT NULL DEFAULT true,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_percentage_range CHECK (
        percentage_required IS NULL OR percentage_required BETWEEN 1 AND 100
    )
);

CREATE INDEX idx_approval_rules_selection
    ON approval_rules(company_id, priority DESC, created_at DESC)
    WHERE is_active = true;
";

const WORKFLOW_STEPS_SQL: &str = r"
CREATE TABLE workflow_steps (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    rule_id UUID NOT NULL REFERENCES approval_rules(id) ON DELETE CASCADE,
    approver_id UUID NOT NULL REFERENCES users(id),
    step_number INTEGER NOT NULL,
    is_required BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_workflow_step_number UNIQUE (rule_id, step_number),
    CONSTRAINT chk_rule_step_number CHECK (step_number >= 1)
);
";

const EXPENSES_SQL: &str = r"
CREATE TABLE expenses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    employee_id UUID NOT NULL REFERENCES users(id),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    rule_id UUID REFERENCES approval_rules(id) ON DELETE SET NULL,
    amount NUMERIC(19, 4) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    converted_amount NUMERIC(19, 4) NOT NULL,
    category VARCHAR(255) NOT NULL,
    description TEXT NOT NULL,
    expense_date DATE NOT NULL DEFAULT CURRENT_DATE,
    merchant_name VARCHAR(255),
    expense_type VARCHAR(255),
    receipt_filename VARCHAR(512),
    source expense_source NOT NULL DEFAULT 'manual',
    status expense_status NOT NULL DEFAULT 'pending',
    current_approver_step INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_non_negative CHECK (amount >= 0)
);

CREATE INDEX idx_expenses_employee ON expenses(employee_id, created_at DESC);
CREATE INDEX idx_expenses_company ON expenses(company_id, created_at DESC);
CREATE INDEX idx_expenses_stalled ON expenses(company_id, created_at)
    WHERE status = 'pending';
";

const APPROVAL_STEPS_SQL: &str = r"
CREATE TABLE approval_steps (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    approver_id UUID NOT NULL REFERENCES users(id),
    step_number INTEGER NOT NULL,
    status step_status NOT NULL DEFAULT 'pending',
    comments TEXT,
    decided_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_decided_at CHECK ((status = 'pending') = (decided_at IS NULL))
);

CREATE INDEX idx_approval_steps_expense ON approval_steps(expense_id, step_number);
CREATE INDEX idx_approval_steps_inbox ON approval_steps(approver_id, created_at)
    WHERE status = 'pending';
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_step_redecision
-- A step leaves 'pending' at most once
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_step_redecision()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status <> 'pending' AND NEW.status IS DISTINCT FROM OLD.status THEN
        RAISE EXCEPTION 'Approval step % has already been decided', OLD.id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_approval_steps_immutable
    BEFORE UPDATE ON approval_steps
    FOR EACH ROW EXECUTE FUNCTION prevent_step_redecision();

-- ============================================================
-- FUNCTION: prevent_terminal_expense_change
-- approved and rejected are sticky
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_terminal_expense_change()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status IN ('approved', 'rejected') AND NEW.status IS DISTINCT FROM OLD.status THEN
        RAISE EXCEPTION 'Expense % is already %', OLD.id, OLD.status;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_expenses_terminal
    BEFORE UPDATE ON expenses
    FOR EACH ROW EXECUTE FUNCTION prevent_terminal_expense_change();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_expenses_terminal ON expenses;
DROP TRIGGER IF EXISTS trg_approval_steps_immutable ON approval_steps;
DROP FUNCTION IF EXISTS prevent_terminal_expense_change();
DROP FUNCTION IF EXISTS prevent_step_redecision();

DROP TABLE IF EXISTS approval_steps;
DROP TABLE IF EXISTS expenses;
DROP TABLE IF EXISTS workflow_steps;
DROP TABLE IF EXISTS approval_rules;
DROP TABLE IF EXISTS users;
DROP TABLE IF EXISTS companies;

DROP TYPE IF EXISTS expense_source;
DROP TYPE IF EXISTS step_status;
DROP TYPE IF EXISTS expense_status;
DROP TYPE IF EXISTS rule_type;
DROP TYPE IF EXISTS user_role;
";
