use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use daraja_gateway::config::MpesaConfig;
use daraja_gateway::services::daraja_service::DarajaService;
use daraja_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let app_state = initialize_app_state().await;
    let app = daraja_gateway::app(app_state);
    start_server(app).await
}

async fn initialize_app_state() -> AppState {
    tracing::info!("🔧 Initializing M-Pesa gateway service...");

    let app_state = AppState::new();

    let config = match MpesaConfig::from_env() {
        Ok(config) => {
            tracing::info!("✅ Gateway config loaded: {}", config.summary());
            config
        }
        Err(e) => {
            tracing::error!("❌ Failed to load gateway config: {}", e);
            tracing::warn!("M-Pesa gateway service will be disabled");
            return app_state;
        }
    };

    let daraja = match DarajaService::new(config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("❌ Failed to build gateway service: {}", e);
            tracing::warn!("M-Pesa gateway service will be disabled");
            return app_state;
        }
    };

    // credential probe; a service that cannot authenticate stays disabled
    match daraja.get_access_token().await {
        Ok(_) => {
            tracing::info!("✅ M-Pesa access token obtained, gateway service ready");
            app_state.with_daraja(daraja)
        }
        Err(e) => {
            tracing::error!("❌ Failed to get M-Pesa access token: {}", e);
            tracing::warn!("M-Pesa gateway service will be disabled");
            app_state
        }
    }
}

async fn start_server(app: Router) -> anyhow::Result<()> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "10000".to_string());
    let addr = SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(10000)));

    tracing::info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
