pub mod api;
pub mod routes;

use std::sync::Arc;

use crate::collaborators::memory::load_catalog;
use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::session::CombatService;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Catalog(#[from] crate::collaborators::memory::CatalogError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server stopped: {0}")]
    Serve(#[source] std::io::Error),
}

/// Service wired to the in-memory collaborators around the configured catalog.
pub fn build_service(config: EngineConfig) -> Result<Arc<CombatService>, ServerError> {
    let catalog = load_catalog(&config.catalog_path)?;
    tracing::info!(
        catalog = %config.catalog_path,
        pathogens = catalog.pathogens.len(),
        antibodies = catalog.antibodies.len(),
        bases = catalog.bases.len(),
        "catalog loaded"
    );
    Ok(Arc::new(CombatService::new(
        Collaborators::in_memory(catalog),
        config,
    )))
}

pub fn run_server(bind_addr: &str, config: EngineConfig) -> Result<(), ServerError> {
    let service = build_service(config)?;
    let runtime = tokio::runtime::Runtime::new().map_err(ServerError::Serve)?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;
        tracing::info!(bind_addr, "bioclash server listening on http://{bind_addr}");
        axum::serve(listener, routes::router(service))
            .await
            .map_err(ServerError::Serve)
    })
}
