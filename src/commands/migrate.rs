//! Migrate command - storefront schema management.

use crate::cli::args::{MigrateAction, MigrateArgs};
use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::Database;

/// Execute the migrate command
pub async fn execute(args: MigrateArgs, config: Config) -> AppResult<()> {
    // Open without auto-migrating so `status` and `down` see the schema as-is
    let db = Database::open(&config).await?;

    match args.action {
        MigrateAction::Up => {
            db.apply_pending().await?;
            tracing::info!("schema is up to date");
        }
        MigrateAction::Down => {
            db.rollback_last().await?;
            tracing::info!("rolled back one migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            let applied = status.iter().filter(|(_, applied)| *applied).count();
            for (name, applied) in &status {
                let marker = if *applied { "applied" } else { "pending" };
                println!("{marker:>8}  {name}");
            }
            println!("{applied}/{} applied", status.len());
        }
        MigrateAction::Fresh => {
            tracing::warn!("dropping and rebuilding the storefront schema");
            db.rebuild().await?;
            tracing::info!("schema rebuilt");
        }
    }

    Ok(())
}
