mod data;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::fs;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "seeder")]
#[command(about = "Database seeding utility for the usage billing core")]
struct Args {
    #[arg(long, default_value = "50")]
    count: usize,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    data_file: Option<String>,

    #[arg(long, default_value = "postgresql://localhost/billing")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!("{}", "=".repeat(80).cyan());
    println!("{}", "Usage Billing Core Database Seeder".bold().cyan());
    println!("{}", "=".repeat(80).cyan());
    println!();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("../../database/migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let mut rng: rand::rngs::StdRng = if let Some(seed) = args.seed {
        println!("{} Using seed: {}", "ℹ".blue(), seed);
        rand::SeedableRng::seed_from_u64(seed)
    } else {
        rand::SeedableRng::from_entropy()
    };

    let start_time = Instant::now();

    let _custom_data = if let Some(ref file_path) = args.data_file {
        println!("{} Loading custom data from: {}", "ℹ".blue(), file_path);
        Some(load_custom_data(file_path)?)
    } else {
        None
    };

    let plans = data::create_plans(&pool).await?;
    println!("{} Seeded {} plans", "✓".green(), plans.len());

    let billings = data::create_organizations(&pool, args.count, &plans, &mut rng).await?;
    println!("{} Provisioned {} organizations", "✓".green(), billings.len());

    let enterprise_plan_id = plans
        .get("enterprise")
        .context("enterprise plan missing after seeding")?
        .id;
    let contracts = data::create_contracts(&pool, &billings, enterprise_plan_id, &mut rng).await?;
    println!("{} Activated {} enterprise contracts", "✓".green(), contracts.len());

    let budgets = data::create_budgets(&pool, &billings).await?;
    println!("{} Attached {} cost budgets", "✓".green(), budgets.len());

    let elapsed = start_time.elapsed();
    println!();
    println!("{}", "=".repeat(80).cyan());
    println!(
        "{} Seeding completed in {:.2}s",
        "✓".green().bold(),
        elapsed.as_secs_f64()
    );
    println!("{}", "=".repeat(80).cyan());

    Ok(())
}

fn load_custom_data(file_path: &str) -> Result<HashMap<String, serde_json::Value>> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read data file: {}", file_path))?;
    let data: HashMap<String, serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON: {}", file_path))?;
    Ok(data)
}
