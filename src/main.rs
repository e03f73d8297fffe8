//! MentorLink service runner
//!
//! Main application entry point: loads configuration, connects PostgreSQL
//! and Redis, runs migrations, starts the session sweeper and waits for
//! shutdown. The stores and chat sessions are consumed in-process by the
//! embedding application.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use mentorlink::config::Settings;
use mentorlink::database::{connection::create_pool, connection::run_migrations, PoolOptions, Storage};
use mentorlink::services::ServiceFactory;
use mentorlink::session::{SessionStorage, SessionSweeper};
use mentorlink::utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", mentorlink::info());

    // Initialize database connection
    info!("Connecting to database...");
    let pool_options = PoolOptions {
        url: settings.database.url.clone(),
        max_connections: settings.database.max_connections,
        min_connections: settings.database.min_connections,
        ..PoolOptions::default()
    };
    let pool = create_pool(&pool_options).await?;

    // Run database migrations
    run_migrations(&pool).await?;

    // Initialize Redis-backed session storage
    info!("Connecting to Redis...");
    let session_storage = match SessionStorage::new(settings.redis.clone()).await {
        Ok(storage) => Some(Arc::new(storage)),
        Err(e) => {
            warn!(error = %e, "Session storage unavailable, sessions will not resume");
            None
        }
    };

    // Initialize services
    info!("Initializing services...");
    let storage = Storage::postgres(pool);
    let _services = ServiceFactory::new(storage, settings.clone(), session_storage.clone())?;

    // Start the session cleanup task
    let mut sweeper = session_storage.map(|storage| {
        let mut sweeper = SessionSweeper::new(
            storage.as_ref().clone(),
            Duration::from_secs(settings.redis.ttl_seconds.max(60)),
        );
        sweeper.start();
        sweeper
    });

    info!("MentorLink core is running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    if let Some(sweeper) = sweeper.as_mut() {
        sweeper.stop();
    }
    info!("Shutting down");

    Ok(())
}
