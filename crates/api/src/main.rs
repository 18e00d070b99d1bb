use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docql_api::app::build_router;
use docql_api::config::{load_entities, AppConfig};
use docql_api::gql::build_schema;
use docql_api::AppState;
use docql_infra::PgDocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    let state = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(3))
                .idle_timeout(Some(Duration::from_secs(600))) // 10 minutes
                .max_lifetime(Some(Duration::from_secs(1800))) // 30 minutes
                .connect(url)
                .await?;
            tracing::info!(
                "Connected to Postgres with max {} connections",
                config.max_connections
            );

            if config.skip_migrations {
                tracing::info!("Skipping database migrations (SKIP_MIGRATIONS=true)");
            } else {
                tracing::info!("Running database migrations...");
                PgDocumentStore::new(pool.clone()).migrate().await?;
                tracing::info!("Database migrations completed successfully");
            }

            AppState::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; documents are kept in memory");
            AppState::memory()
        }
    };

    let entities = load_entities(&config.entities_path)?;
    let schema = build_schema(&state, entities, config.schema.clone())?;

    let app = build_router(state, schema, &config.allowed_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
