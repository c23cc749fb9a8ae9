use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::RenewalService;
use crate::clock::SystemClock;
use crate::configuration::{DatabaseSettings, Settings, StoreBackend};
use crate::error::StoreError;
use crate::logger::LoggerMiddleware;
use crate::routes::{health_check, refresh};
use crate::store::{InMemoryTokenStore, PgTokenStore, TokenStore};

/// Connect to Postgres and bring the schema up to date
pub async fn connect_postgres(config: &DatabaseSettings) -> Result<PgTokenStore, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::QueryExecution(format!("Migration failed: {}", e)))?;

    Ok(PgTokenStore::new(pool))
}

/// Wire the configured store and the system clock into a renewal service
pub async fn build_service(settings: &Settings) -> Result<RenewalService, StoreError> {
    let store: Arc<dyn TokenStore> = match settings.store.backend {
        StoreBackend::Postgres => Arc::new(connect_postgres(&settings.database).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory token store; refresh tokens are lost on restart");
            Arc::new(InMemoryTokenStore::new())
        }
    };

    Ok(RenewalService::new(
        store,
        Arc::new(SystemClock),
        settings.jwt.clone(),
    ))
}

pub fn run(listener: TcpListener, service: RenewalService) -> Result<Server, std::io::Error> {
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(service.clone())
            .route("/health_check", web::get().to(health_check))
            .route("/auth/refresh", web::post().to(refresh))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
