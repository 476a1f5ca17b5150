use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use sessionauth_server::{build_cors, configure_app, AppError, AppState, Settings};
use std::net::TcpListener;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SESSION_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> sessionauth_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new()?;
    info!("Configuration loaded for {} environment", config.environment);

    let state = AppState::new(config.clone()).await?;
    info!(
        "Authentication: {}",
        state.authenticator.as_ref().map(|a| a.name()).unwrap_or("none")
    );
    let cleanup = state.spawn_session_cleanup(SESSION_CLEANUP_PERIOD);

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Listening on {}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    let app_state = state.clone();
    let cors_config = config.cors.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(data.clone())
            .configure(|cfg| configure_app(cfg, &app_state))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    if let Some(cleanup) = cleanup {
        cleanup.abort();
    }
    state.shutdown().await
}
