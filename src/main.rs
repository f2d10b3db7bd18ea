use bitacora::{create_db_pool, create_router, init_tracing, AppState, Config};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    init_tracing(&config);

    info!(
        service = "bitacora",
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting server"
    );

    let issues = config.validate_for_production();
    for issue in &issues {
        warn!(issue = %issue, "Configuration warning");
    }

    info!(
        database_url = %config.database.url.split('@').next_back().unwrap_or("***"),
        max_connections = config.database.max_connections,
        "Connecting to database"
    );

    let db_pool = create_db_pool(&config);

    info!("Database connection pool created");

    if config.mail.is_none() {
        warn!("SMTP not configured; the forgot-password endpoint will return 500");
    }

    let state = AppState::new(db_pool, &config);
    let app = create_router(state, &config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, address = %addr, "Failed to bind HTTP server");
            std::process::exit(1);
        });

    info!(address = %addr, "HTTP server ready");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Shutdown signal received");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
    {
        error!(error = %e, "HTTP server error");
    }

    info!("Server shutdown complete");
}
