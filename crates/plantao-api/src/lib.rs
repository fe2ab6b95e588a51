//! Servidor HTTP del sistema de plantões.
//!
//! Expone la API JSON que consume el SPA de la farmacia: autenticación,
//! usuarios, escala, medicamentos controlados, registros de passagem con su
//! auditoría, trocas, ausências, timeline y notificaciones por WhatsApp.
//!
//! Las reglas de negocio viven en `plantao-domain`; este crate sólo traduce
//! HTTP a llamadas de servicio y errores de dominio a códigos de estado.

use std::{net::SocketAddr, sync::Arc};

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{Duration, Utc};
use plantao_domain::{services::AuthService, DomainRepository};
use plantao_notify::{CallMeBotClient, KeyVault, WhatsAppNotifier};
use serde_json::json;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use state::{AppState, SharedState};

pub fn router(state: SharedState) -> Router {
    let uploads = ServeDir::new(&state.uploads_dir);

    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_router())
        .nest_service("/uploads", uploads)
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Rota não encontrada" })))
}

/// `RUST_LOG` controla el filtro; por defecto `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // ignora un subscriber ya instalado (tests)
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Estado de la aplicación a partir de la configuración y un repositorio ya
/// inicializado. Crea el administrador inicial si corresponde.
pub fn build_state(config: &Config, repo: Arc<dyn DomainRepository>) -> Result<SharedState, Box<dyn std::error::Error>> {
    let policy = config.policy()?;

    if let Some(admin) = &config.admin {
        let auth = AuthService::new(Arc::clone(&repo), policy.clone());
        if auth.ensure_admin(&admin.email, &admin.name, &admin.password, Utc::now())? {
            info!("Admin user {} created", admin.email);
        }
    }

    let vault = match config.callmebot_master_key.as_deref() {
        Some(master) => Some(KeyVault::new(master)?),
        None => None,
    };
    let sender = Arc::new(CallMeBotClient::new(config.callmebot_api_url.clone()));
    let notifier = WhatsAppNotifier::new(vault, sender);
    let jwt = auth::JwtKeys::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours));

    Ok(AppState::new(
        repo,
        policy,
        jwt,
        notifier,
        config.uploads_dir.clone(),
        config.trust_proxy,
    ))
}

pub async fn start_server(config: Config, repo: Arc<dyn DomainRepository>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Initializing state...");
    let state = build_state(&config, repo)?;
    let app = router(state);

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
