use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use gatekeeper_server::config::Config;
use gatekeeper_server::routes::create_routes;
use gatekeeper_server::state::AppState;
use gatekeeper_server::store::{PgTicketStore, TicketStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Successfully connected to database");

    sqlx::migrate!().run(&pool).await?;

    tracing::info!("Migrations run successfully");

    let store: Arc<dyn TicketStore> = Arc::new(PgTicketStore::new(pool));
    let state = AppState::new(
        store,
        &config.signing,
        config.detection.clone(),
        config.admission,
    )?;
    tracing::info!(
        signature_version = config.signing.current_version,
        admission = ?config.admission,
        "Ticket integrity services ready"
    );

    let app = create_routes(state, &config.http);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
