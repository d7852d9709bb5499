//! One-shot commands: `reconcile`, `check` and `init-archive`.
//!
//! `reconcile` is meant for an external cron caller; it exits non-zero when
//! any booking could not be archived.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;

use feelme::config::Config;
use feelme::reconcile::ReconcileJob;

async fn load(config_path: &str) -> Result<Config> {
    Config::load(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))
}

async fn job(config: &Config) -> Result<ReconcileJob> {
    let policy = config.reconcile.policy()?;
    let (bookings, archive) = super::open_stores(config).await?;
    Ok(ReconcileJob::new(bookings, archive, policy))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one reconciliation pass and print its report.
pub async fn run(config_path: &str) -> Result<()> {
    let config = load(config_path).await?;
    let report = job(&config)
        .await?
        .run(Utc::now())
        .await
        .context("Reconciliation pass failed")?;
    print_json(&report)?;

    if !report.is_clean() {
        bail!(
            "{} booking(s) could not be archived; they will be retried on the next pass",
            report.failures.len()
        );
    }
    Ok(())
}

/// List expired bookings without changing anything.
pub async fn check(config_path: &str) -> Result<()> {
    let config = load(config_path).await?;
    let scan = job(&config)
        .await?
        .scan(Utc::now())
        .await
        .context("Expiry scan failed")?;
    print_json(&scan)
}

/// Create the archive tables.
pub async fn init_archive(config_path: &str) -> Result<()> {
    let config = load(config_path).await?;
    let (_, archive) = super::open_stores(&config).await?;
    archive
        .ensure_schema()
        .await
        .context("Failed to create archive tables")?;
    println!("Archive tables are ready");
    Ok(())
}
