use makan_match::database::connect_and_migrate;
use makan_match::db::clean_expired_sessions;
use makan_match::env::{load_environment, Settings};
use makan_match::init_rocket;
use makan_match::telemetry::init_tracing;
use tracing::{error, info};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }
    init_tracing();

    let settings = Settings::from_env()?;

    info!("Running database migrations...");
    let pool = connect_and_migrate(&settings.database_url).await?;

    match clean_expired_sessions(&pool).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired sessions", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean expired sessions: {}", e),
    }

    let _rocket = init_rocket(pool, settings).launch().await?;

    Ok(())
}
