use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::{BudgetType, Contract, Dimension, Id, OrganizationBilling, Plan, UsageBudget, VolumeDiscountTier};
use sqlx::PgPool;
use std::collections::HashMap;

const ORG_NAME_PREFIXES: &[&str] = &[
    "Acme", "Globex", "Initech", "Umbrella", "Hooli", "Stark", "Wayne", "Wonka", "Soylent",
    "Vandelay", "Cyberdyne", "Aperture", "Massive Dynamic", "Gringotts", "Oscorp",
];

const ORG_NAME_SUFFIXES: &[&str] = &["Analytics", "Observability", "Labs", "AI", "Systems", "Cloud"];

const ACCOUNT_OWNERS: &[&str] = &["ae-dana@example.com", "ae-miguel@example.com", "ae-priya@example.com"];
const SALES_REPS: &[&str] = &["sales-jordan@example.com", "sales-alex@example.com"];

/// Inserts the default free/pro/enterprise plan set, idempotently keyed by name.
pub async fn create_plans(pool: &PgPool) -> Result<HashMap<String, Plan>> {
    let defs: [(&str, bool, i64, Option<Decimal>, Decimal, Option<Decimal>, i64, Option<Decimal>); 3] = [
        ("free", true, 100_000, None, dec!(1), None, 1_000, None),
        ("pro", false, 1_000_000, Some(dec!(0.50)), dec!(10), Some(dec!(2.00)), 100_000, Some(dec!(0.10))),
        (
            "enterprise",
            false,
            10_000_000,
            Some(dec!(0.35)),
            dec!(100),
            Some(dec!(1.50)),
            1_000_000,
            Some(dec!(0.08)),
        ),
    ];

    let mut plans = HashMap::new();
    for (name, is_default, free_spans, price_spans, free_gb, price_gb, free_scores, price_scores) in defs {
        let plan: Plan = sqlx::query_as(
            "INSERT INTO plans (
                id, name, is_active, is_default, free_spans, price_per_100k_spans,
                free_gb, price_per_gb, free_scores, price_per_1k_scores
            ) VALUES ($1, $2, TRUE, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO UPDATE SET
                free_spans = EXCLUDED.free_spans,
                price_per_100k_spans = EXCLUDED.price_per_100k_spans,
                free_gb = EXCLUDED.free_gb,
                price_per_gb = EXCLUDED.price_per_gb,
                free_scores = EXCLUDED.free_scores,
                price_per_1k_scores = EXCLUDED.price_per_1k_scores,
                updated_at = NOW()
            RETURNING *",
        )
        .bind(Id::new())
        .bind(name)
        .bind(is_default)
        .bind(free_spans)
        .bind(price_spans)
        .bind(free_gb)
        .bind(price_gb)
        .bind(free_scores)
        .bind(price_scores)
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to seed plan {name}"))?;

        plans.insert(name.to_string(), plan);
    }

    Ok(plans)
}

fn org_name(rng: &mut StdRng, i: usize) -> String {
    let prefix = ORG_NAME_PREFIXES[i % ORG_NAME_PREFIXES.len()];
    let suffix = ORG_NAME_SUFFIXES[rng.gen_range(0..ORG_NAME_SUFFIXES.len())];
    format!("{prefix} {suffix}")
}

fn slugify(name: &str, i: usize) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("org_{slug}_{i}")
}

/// Creates `count` demo organizations, each provisioned with an
/// `organization_billing` row on a plan drawn from `plans` (weighted toward
/// free/pro, with enterprise reserved for orgs that also get a contract).
pub async fn create_organizations(
    pool: &PgPool,
    count: usize,
    plans: &HashMap<String, Plan>,
    rng: &mut StdRng,
) -> Result<Vec<OrganizationBilling>> {
    let free = plans.get("free").context("free plan missing")?;
    let pro = plans.get("pro").context("pro plan missing")?;
    let enterprise = plans.get("enterprise").context("enterprise plan missing")?;

    let mut billings = Vec::new();
    for i in 0..count {
        let name = org_name(rng, i);
        let org_id = slugify(&name, i);

        let plan = match i % 10 {
            0 => enterprise,
            1 | 2 | 3 => pro,
            _ => free,
        };

        let anchor_day = rng.gen_range(1..=28);
        let now = Utc::now();

        let billing: OrganizationBilling = sqlx::query_as(
            "INSERT INTO organization_billing (
                org_id, plan_id, billing_cycle_start, billing_cycle_anchor_day,
                current_period_spans, current_period_bytes, current_period_scores,
                current_period_cost, free_spans_remaining, free_bytes_remaining,
                free_scores_remaining, last_synced_at
            ) VALUES ($1, $2, $3, $4, 0, 0, 0, 0, $5, $6, $7, $3)
            ON CONFLICT (org_id) DO UPDATE SET plan_id = EXCLUDED.plan_id
            RETURNING *",
        )
        .bind(&org_id)
        .bind(plan.id)
        .bind(now)
        .bind(anchor_day)
        .bind(plan.free_spans)
        .bind(plan.free_gb * Decimal::from(Dimension::Bytes.unit_size()))
        .bind(plan.free_scores)
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to provision billing for {org_id}"))?;

        billings.push(billing);
    }

    Ok(billings)
}

/// Activates an enterprise contract (with volume discount tiers) for roughly
/// one in ten demo organizations — the ones provisioned on the enterprise plan.
pub async fn create_contracts(
    pool: &PgPool,
    billings: &[OrganizationBilling],
    enterprise_plan_id: Id,
    rng: &mut StdRng,
) -> Result<Vec<Contract>> {
    let mut contracts = Vec::new();

    for (i, billing) in billings.iter().enumerate().filter(|(_, b)| b.plan_id == enterprise_plan_id) {
        let start_date = Utc::now() - chrono::Duration::days(30);
        let contract: Contract = sqlx::query_as(
            "INSERT INTO contracts (
                id, org_id, contract_name, contract_number, start_date, end_date, currency,
                minimum_commit_amount, account_owner, sales_rep_email, status,
                custom_free_spans, custom_price_per_100k_spans, custom_free_gb, custom_price_per_gb,
                custom_free_scores, custom_price_per_1k_scores, created_by
            ) VALUES (
                $1, $2, $3, $4, $5, $6, 'USD', $7, $8, $9, 'active',
                $10, $11, $12, $13, $14, $15, $16
            )
            RETURNING *",
        )
        .bind(Id::new())
        .bind(&billing.org_id)
        .bind(format!("{} enterprise agreement", billing.org_id))
        .bind(format!("C-{:05}", i + 1))
        .bind(start_date)
        .bind(Option::<chrono::DateTime<Utc>>::None)
        .bind(dec!(5000))
        .bind(ACCOUNT_OWNERS[i % ACCOUNT_OWNERS.len()])
        .bind(SALES_REPS[i % SALES_REPS.len()])
        .bind(15_000_000i64)
        .bind(dec!(0.30))
        .bind(dec!(150))
        .bind(dec!(1.25))
        .bind(1_500_000i64)
        .bind(dec!(0.06))
        .bind("seed-script")
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to seed contract for {}", billing.org_id))?;

        seed_volume_tiers(pool, contract.id).await?;
        contracts.push(contract);
    }

    Ok(contracts)
}

async fn seed_volume_tiers(pool: &PgPool, contract_id: Id) -> Result<()> {
    let tiers = [
        (0i64, Some(50_000_000i64), dec!(0.30), 0i32),
        (50_000_000, Some(200_000_000), dec!(0.20), 1),
        (200_000_000, None, dec!(0.12), 2),
    ];

    for (tier_min, tier_max, price_per_unit, priority) in tiers {
        let tier = VolumeDiscountTier {
            id: Id::new(),
            contract_id,
            dimension: Dimension::Spans,
            tier_min,
            tier_max,
            price_per_unit,
            priority,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO volume_discount_tiers (id, contract_id, dimension, tier_min, tier_max, price_per_unit, priority)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(tier.id)
        .bind(tier.contract_id)
        .bind(tier.dimension)
        .bind(tier.tier_min)
        .bind(tier.tier_max)
        .bind(tier.price_per_unit)
        .bind(tier.priority)
        .execute(pool)
        .await
        .context("Failed to seed volume discount tier")?;
    }

    Ok(())
}

/// Attaches one monthly cost budget to every third organization, with alert
/// thresholds at 50/80/100 percent.
pub async fn create_budgets(pool: &PgPool, billings: &[OrganizationBilling]) -> Result<Vec<UsageBudget>> {
    let mut budgets = Vec::new();

    for billing in billings.iter().step_by(3) {
        let budget: UsageBudget = sqlx::query_as(
            "INSERT INTO usage_budgets (
                id, org_id, project_id, name, budget_type, cost_limit,
                current_spans, current_bytes, current_scores, current_cost, alert_thresholds
            ) VALUES ($1, $2, NULL, $3, 'monthly', $4, 0, 0, 0, 0, $5)
            RETURNING *",
        )
        .bind(Id::new())
        .bind(&billing.org_id)
        .bind(format!("{} monthly cost guardrail", billing.org_id))
        .bind(dec!(1000))
        .bind(&[50i64, 80, 100][..])
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to seed budget for {}", billing.org_id))?;

        budgets.push(budget);
    }

    Ok(budgets)
}

/// Overlays names from a `--data-file` JSON document onto the generated org
/// names, when provided (keyed by `"org_names"`, a JSON array of strings).
pub fn org_name_overrides(custom_data: Option<&HashMap<String, serde_json::Value>>, i: usize, fallback: String) -> String {
    custom_data
        .and_then(|data| data.get("org_names"))
        .and_then(|v| v.as_array())
        .and_then(|names| names.get(i % names.len()))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or(fallback)
}
