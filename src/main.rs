use std::error::Error;
use std::sync::Arc;

use plantao_api::{start_server, Config};
use plantao_domain::DomainRepository;
use tracing::info;

/// Arranca la API: lee `.env`, abre la base (aplicando migraciones) y sirve
/// hasta recibir Ctrl+C o SIGTERM.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    plantao_api::init_tracing();

    let config = Config::from_env()?;
    let repo = tokio::task::spawn_blocking(plantao_persistence::new_from_env).await??;
    info!("Database ready");

    let repo: Arc<dyn DomainRepository> = Arc::new(repo);
    start_server(config, repo).await
}
