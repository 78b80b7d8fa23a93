//! Clears the database and loads the demo programs and donations.

use tms_portal_app::telemetry;
use tms_portal_app::seeding::run_seed;
use tms_portal_storage::Database;
use tms_portal_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;
    telemetry::init_tracing(config.environment)?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;

    run_seed(&database, &mut std::io::stdout()).await?;
    Ok(())
}
