use std::net::TcpListener;
use refresh_rotation::configuration::get_configuration;
use refresh_rotation::startup::{build_service, run};
use refresh_rotation::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let service = build_service(&configuration).await.map_err(|e| {
        tracing::error!("Failed to initialise token store: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Token store error")
    })?;
    tracing::info!(backend = ?configuration.store.backend, "Token store ready");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, service)?;
    server.await
}
