// State Manager - Application state shared with the UI shell
// Wires the view-state store, request orchestrator and overlay renderer together

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::api_client::{CandidateCatalog, SimulationBackend};
use crate::config::AppConfig;
use crate::error::ModelError;
use crate::models::{
    CandidateQuery, EntryPoint, HazardCandidate, ImpactForm, SimulationParams, SimulationResult,
    ViewState,
};
use crate::orchestrator::{Orchestrator, RequestStatus, Settlement};
use crate::overlay::{OverlayFrame, OverlayRenderer};
use crate::view_state::{SubscriptionId, ViewStateStore};

// =============================================================================
// APP STATE
// =============================================================================

pub struct AppState<S, C> {
    pub store: Arc<ViewStateStore>,
    pub orchestrator: Orchestrator<S, C>,
    renderer: Arc<Mutex<OverlayRenderer>>,
    form: RwLock<ImpactForm>,
    subscription: SubscriptionId,
}

impl<S: SimulationBackend, C: CandidateCatalog> AppState<S, C> {
    pub fn new(config: &AppConfig, simulator: S, catalog: C) -> Self {
        let store = Arc::new(ViewStateStore::with_ease(
            config.initial_view(),
            config.initial_entry,
            config.ease_duration,
        ));
        let renderer = Arc::new(Mutex::new(OverlayRenderer::new(config.ring_settings())));
        renderer.lock().update(store.view(), None);

        // Camera changes re-derive the overlay viewport; geometry is reused.
        let subscription = {
            let renderer = renderer.clone();
            store.subscribe(move |view| {
                renderer.lock().update_view(*view);
            })
        };

        Self {
            store,
            orchestrator: Orchestrator::new(simulator, catalog),
            renderer,
            form: RwLock::new(ImpactForm::default()),
            subscription,
        }
    }

    pub fn set_form(&self, form: ImpactForm) {
        *self.form.write() = form;
    }

    pub fn form(&self) -> ImpactForm {
        self.form.read().clone()
    }

    /// Validate the current form against the current entry point and start a
    /// simulation. Invalid input is rejected before the pipeline is touched.
    pub fn run_simulation(
        &self,
    ) -> Result<impl Future<Output = Settlement> + Send + '_, ModelError> {
        let params = SimulationParams::from_form(&self.form.read(), self.store.entry_point())?;
        let pending = self.orchestrator.run_simulation(params);
        Ok(async move {
            let settlement = pending.await;
            self.refresh_overlay();
            settlement
        })
    }

    pub fn refresh_candidates(
        &self,
        query: CandidateQuery,
    ) -> impl Future<Output = Settlement> + Send + '_ {
        self.orchestrator.refresh_candidates(query)
    }

    /// Advance the eased re-centre; returns true while it is still running.
    pub fn frame(&self, now: Instant) -> bool {
        let running = self.store.tick(now);
        self.refresh_overlay();
        running
    }

    /// Re-derive the overlay if the view or the result changed.
    pub fn refresh_overlay(&self) -> bool {
        let view = self.store.view();
        let result = self.orchestrator.simulation_result();
        self.renderer.lock().update(view, result)
    }

    pub fn overlay(&self) -> Option<OverlayFrame> {
        self.renderer.lock().frame().cloned()
    }

    pub fn overlay_render_count(&self) -> u64 {
        self.renderer.lock().render_count()
    }

    pub fn to_frontend(&self) -> FrontendState {
        let overlay = self
            .overlay()
            .map(|frame| frame.to_geojson())
            .unwrap_or(serde_json::Value::Null);

        FrontendState {
            view: self.store.view(),
            entry_point: self.store.entry_point(),
            simulation_status: self.orchestrator.simulation_status(),
            simulation: self.orchestrator.simulation_result().map(|r| (*r).clone()),
            simulation_updated_at: self.orchestrator.simulation_updated_at(),
            candidates_status: self.orchestrator.candidates_status(),
            candidates: (*self.orchestrator.candidates()).clone(),
            overlay,
            simulate_enabled: !self.orchestrator.simulation_busy(),
            refresh_enabled: !self.orchestrator.candidates_busy(),
        }
    }
}

impl<S, C> Drop for AppState<S, C> {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}

// =============================================================================
// SERIALIZABLE STATE FOR FRONTEND
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FrontendState {
    pub view: ViewState,
    pub entry_point: EntryPoint,
    pub simulation_status: RequestStatus,
    pub simulation: Option<SimulationResult>,
    pub simulation_updated_at: Option<DateTime<Utc>>,
    pub candidates_status: RequestStatus,
    pub candidates: Vec<HazardCandidate>,
    /// GeoJSON FeatureCollection of blast rings, or null before the first frame.
    pub overlay: serde_json::Value,
    pub simulate_enabled: bool,
    pub refresh_enabled: bool,
}
