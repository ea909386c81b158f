use anyhow::{Context, Result};
use chrono::Utc;
use pantry_reconcile::cli::{parse_args, Command};
use pantry_reconcile::config::{validate_threshold, ReconcileConfig};
use pantry_reconcile::models::{CompleteRequest, RevertRequest};
use pantry_reconcile::service::PantryReconciler;
use pantry_reconcile::store::{load_pantry_csv, JsonFileStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::fs;
use tracing::warn;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = ReconcileConfig::from_env()?;
    let cli_args = parse_args();

    if let Some(path) = cli_args.state_file {
        config.state_file = path;
    }
    if let Some(threshold) = cli_args.threshold {
        config.match_threshold = validate_threshold(threshold)?;
    }
    config.logging.init()?;

    let registry = Arc::new(config.build_registry()?);
    let store = JsonFileStore::open(&config.state_file)
        .await
        .with_context(|| format!("Failed to open pantry state file {:?}", config.state_file))?;
    let reconciler = PantryReconciler::new(store, registry, config.match_threshold, config.revert_window_minutes);

    match cli_args.command {
        Command::Import { user, csv } => {
            let items = load_pantry_csv(&csv, Utc::now())?;
            let count = reconciler.import_pantry(&user, items).await?;
            print_json(&serde_json::json!({ "message": format!("Imported {} pantry item(s)", count) }))?;
        }
        Command::Pantry { user } => {
            print_json(&reconciler.pantry(&user).await?)?;
        }
        Command::Complete { request } => {
            let body = fs::read_to_string(&request)
                .await
                .with_context(|| format!("Failed to read request file {:?}", request))?;
            let request: CompleteRequest =
                serde_json::from_str(&body).context("Request file is not a valid completion request")?;
            print_json(&reconciler.complete(request).await?)?;
        }
        Command::Revert { user, recipe, minutes_ago, transaction_id } => {
            let request = RevertRequest { user_id: user, recipe_name: recipe, minutes_ago, transaction_id };
            match reconciler.revert(request).await {
                Ok(report) => print_json(&report)?,
                Err(e) if e.is_not_found() => {
                    warn!("{}", e);
                    print_json(&serde_json::json!({ "message": e.to_string(), "reverted_items": [] }))?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
