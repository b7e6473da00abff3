use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use videoforge::config::settings::AppConfig;
use videoforge::infrastructure::db::pool::connect_to_db;
use videoforge::infrastructure::queue::memory::MemoryJobQueue;
use videoforge::infrastructure::queue::rabbitmq::RabbitMqJobQueue;
use videoforge::infrastructure::queue::JobQueue;
use videoforge::modules::jobs::repository::PgJobStore;
use videoforge::modules::jobs::store::{JobStore, MemoryJobStore};
use videoforge::state::AppState;
use videoforge::workers::dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = Arc::new(AppConfig::new()?);

    let store: Arc<dyn JobStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgJobStore::new(connect_to_db(url).await?)),
        None => {
            warn!("DATABASE_URL not set, using in-memory job store; jobs will not survive restart");
            Arc::new(MemoryJobStore::new())
        }
    };

    let queue: Arc<dyn JobQueue> = match config.amqp_url.as_deref() {
        Some(url) => Arc::new(RabbitMqJobQueue::new(url).await?),
        None => {
            warn!("AMQP_URL not set, using in-memory job queue; queued jobs will not survive restart");
            Arc::new(MemoryJobQueue::new())
        }
    };

    let port = config.server_port;
    let state = AppState::new(config, store, queue)?;

    dispatcher::spawn(state.clone());

    let app = videoforge::app::create_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on http://0.0.0.0:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
