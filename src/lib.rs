// ImpactViz - Impact Visualization & Orchestration Core
// Library entry point: blast-radius rings, view-state sync, request orchestration

pub mod api_client;
pub mod config;
pub mod error;
pub mod geodesic;
pub mod map_adapter;
pub mod models;
pub mod orchestrator;
pub mod overlay;
pub mod state_manager;
pub mod telemetry;
pub mod view_state;

pub use api_client::{
    CandidateCatalog, CatalogClient, HttpCatalog, HttpSimulationBackend, NeoWsCatalog,
    SimulationBackend,
};
pub use config::AppConfig;
pub use error::{
    ApiErrorBody, ConfigError, GeometryError, ModelError, RemoteCallError, WidgetError,
};
pub use geodesic::{ring, Ring};
pub use map_adapter::{HeadlessMap, InteractiveMap, MapWidget};
pub use models::{
    CandidateQuery, Composition, EntryPoint, HazardCandidate, ImpactForm, SimulationParams,
    SimulationResult, ViewPatch, ViewState,
};
pub use orchestrator::{Orchestrator, RequestStatus, Settlement};
pub use overlay::{OverlayFrame, OverlayRenderer, Threshold};
pub use state_manager::{AppState, FrontendState};
pub use view_state::ViewStateStore;

/// Build the configured backends and application state.
pub fn build_app(
    config: &AppConfig,
) -> Result<AppState<HttpSimulationBackend, CatalogClient>, RemoteCallError> {
    let simulator = HttpSimulationBackend::new(&config.simulation_url, config.request_timeout)?;
    let catalog = match &config.nasa_api_key {
        Some(key) => {
            tracing::info!("candidate search via NASA NeoWs");
            CatalogClient::NeoWs(NeoWsCatalog::new(key.clone(), config.request_timeout)?)
        }
        None => CatalogClient::Http(HttpCatalog::new(&config.catalog_url, config.request_timeout)?),
    };
    Ok(AppState::new(config, simulator, catalog))
}
