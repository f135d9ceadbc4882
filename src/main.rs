use axum::serve;
use dotenvy::dotenv;
use read_receipt::config::Settings;
use read_receipt::registry::Registry;
use read_receipt::routes::{create_router, AppState};
use read_receipt::{dao, utils};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACING_LEVEL: &str = "read_receipt=debug";
const DATABASE_MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() {
    _ = dotenv();
    configure_tracing();
    let settings = Settings::from_env().expect("Reading configuration failed");
    let db_connection_pool = create_db_connection_pool(&settings.database_url).await;
    dao::create_schema(&db_connection_pool)
        .await
        .expect("Creating database schema failed");
    tracing::info!(policy = ?settings.policy, "Link registry ready");
    let state = AppState {
        registry: Registry::new(db_connection_pool, settings.policy),
        public_url: settings.public_url,
        pixel: utils::pixel().expect("Decoding tracking pixel failed"),
        uniform_verification_response: settings.uniform_verification_response,
    };
    let listener = create_listener(&settings.server_address).await;
    serve(listener, create_router(state))
        .await
        .expect("Server failed to start");
}

fn configure_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or(DEFAULT_TRACING_LEVEL.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn create_db_connection_pool(database_url: &str) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(database_url)
        .expect("Parsing DATABASE_URL failed")
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(DATABASE_MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .expect("Creating database connection pool failed")
}

async fn create_listener(server_address: &str) -> TcpListener {
    let listener = TcpListener::bind(&server_address)
        .await
        .expect("Creating tcp listener failed");
    tracing::info!("Listening on address: {}", server_address);
    listener
}
