//! Database seeder for Outlay development and testing.
//!
//! Seeds a demo company with an admin, a manager, two employees and a
//! finance sign-off rule, then prints an access token per user.
//!
//! Usage: cargo run --bin seeder

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use outlay_db::entities::{
    approval_rules, companies,
    sea_orm_active_enums::{RuleType, UserRole},
    users, workflow_steps,
};
use outlay_shared::{AppConfig, JwtConfig, JwtService};

/// Demo company ID (consistent for all seeds)
const DEMO_COMPANY_ID: &str = "00000000-0000-0000-0000-000000000001";
const ADMIN_ID: &str = "00000000-0000-0000-0000-000000000002";
const MANAGER_ID: &str = "00000000-0000-0000-0000-000000000003";
const EMPLOYEE_ID: &str = "00000000-0000-0000-0000-000000000004";
/// Employee without a manager; their expenses exercise the dead-end policy.
const LONER_ID: &str = "00000000-0000-0000-0000-000000000005";
const FINANCE_RULE_ID: &str = "00000000-0000-0000-0000-000000000010";

struct SeedUser {
    id: &'static str,
    email: &'static str,
    full_name: &'static str,
    role: UserRole,
    manager_id: Option<&'static str>,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        id: ADMIN_ID,
        email: "admin@outlay.dev",
        full_name: "Ada Admin",
        role: UserRole::Admin,
        manager_id: None,
    },
    SeedUser {
        id: MANAGER_ID,
        email: "manager@outlay.dev",
        full_name: "Max Manager",
        role: UserRole::Manager,
        manager_id: None,
    },
    SeedUser {
        id: EMPLOYEE_ID,
        email: "employee@outlay.dev",
        full_name: "Eve Employee",
        role: UserRole::Employee,
        manager_id: Some(MANAGER_ID),
    },
    SeedUser {
        id: LONER_ID,
        email: "loner@outlay.dev",
        full_name: "Lou Loner",
        role: UserRole::Employee,
        manager_id: None,
    },
];

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().expect("Failed to load configuration");

    println!("Connecting to database...");
    let db = outlay_db::connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    println!("Seeding demo company...");
    seed_company(&db).await;

    println!("Seeding users...");
    seed_users(&db).await;

    println!("Seeding approval rules...");
    seed_finance_rule(&db).await;

    println!("Seeding complete!");
    print_tokens(&config);
}

fn id(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap()
}

/// Seeds the demo company.
async fn seed_company(db: &DatabaseConnection) {
    if companies::Entity::find_by_id(id(DEMO_COMPANY_ID))
        .one(db)
        .await
        .ok()
        .flatten()
        .is_some()
    {
        println!("  Demo company already exists, skipping...");
        return;
    }

    let company = companies::ActiveModel {
        id: Set(id(DEMO_COMPANY_ID)),
        name: Set("Demo Company".to_string()),
        currency: Set("USD".to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    };

    company
        .insert(db)
        .await
        .expect("Failed to create demo company");
    println!("  Created demo company (USD)");
}

/// Seeds the demo users; managers before their reports.
async fn seed_users(db: &DatabaseConnection) {
    for seed in USERS {
        if users::Entity::find_by_id(id(seed.id))
            .one(db)
            .await
            .ok()
            .flatten()
            .is_some()
        {
            println!("  {} already exists, skipping...", seed.email);
            continue;
        }

        let user = users::ActiveModel {
            id: Set(id(seed.id)),
            company_id: Set(id(DEMO_COMPANY_ID)),
            email: Set(seed.email.to_string()),
            full_name: Set(seed.full_name.to_string()),
            role: Set(seed.role),
            manager_id: Set(seed.manager_id.map(id)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        user.insert(db).await.expect("Failed to create user");
        println!("  Created {} ({:?})", seed.email, seed.role);
    }
}

/// Seeds a manager-first rule with the admin as the finance step.
async fn seed_finance_rule(db: &DatabaseConnection) {
    if approval_rules::Entity::find_by_id(id(FINANCE_RULE_ID))
        .one(db)
        .await
        .ok()
        .flatten()
        .is_some()
    {
        println!("  Finance rule already exists, skipping...");
        return;
    }

    let rule = approval_rules::ActiveModel {
        id: Set(id(FINANCE_RULE_ID)),
        company_id: Set(id(DEMO_COMPANY_ID)),
        name: Set("Finance sign-off".to_string()),
        description: Set(Some("Manager first, then finance".to_string())),
        rule_type: Set(RuleType::Sequential),
        percentage_required: Set(None),
        specific_approver_id: Set(None),
        is_manager_approver: Set(true),
        priority: Set(10),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    };
    rule.insert(db).await.expect("Failed to create finance rule");

    let step = workflow_steps::ActiveModel {
        id: Set(Uuid::new_v4()),
        rule_id: Set(id(FINANCE_RULE_ID)),
        approver_id: Set(id(ADMIN_ID)),
        step_number: Set(1),
        is_required: Set(true),
        created_at: Set(Utc::now().into()),
    };
    step.insert(db).await.expect("Failed to create workflow step");

    println!("  Created finance rule (manager, then admin)");
}

/// Prints an access token per seeded user for manual API testing.
fn print_tokens(config: &AppConfig) {
    let jwt = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: 24 * 60,
    });

    println!();
    println!("Access tokens (valid for 24 hours):");
    for seed in USERS {
        let role = match seed.role {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Employee => "employee",
        };
        let token = jwt
            .generate_access_token(id(seed.id), id(DEMO_COMPANY_ID), role)
            .expect("Failed to generate token");
        println!("  {:<22} {token}", seed.email);
    }
}
