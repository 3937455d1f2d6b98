//! Database migration command.
//!
//! The bridge never runs migrations on startup; this command is the only
//! place the schema is applied.

use super::CliError;

/// Run bridge database migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = super::connect().await?;

    tracing::info!("Running bridge migrations...");
    sqlx::migrate!("../bridge/migrations").run(&pool).await?;

    tracing::info!("Bridge migrations complete");
    Ok(())
}
