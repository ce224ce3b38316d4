// Request Orchestrator
// Two independent, token-gated request pipelines: simulate and candidate search.
//
// Idle -> Loading -> Idle (data replaced) | Error(message)
// Only the most recently issued token of a pipeline may settle it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::api_client::{CandidateCatalog, SimulationBackend};
use crate::error::RemoteCallError;
use crate::models::{CandidateQuery, HazardCandidate, SimulationParams, SimulationResult};

pub const SIMULATION_FALLBACK_MESSAGE: &str = "Simulation failed";
pub const CANDIDATES_FALLBACK_MESSAGE: &str = "Failed to fetch candidates";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum RequestStatus {
    Idle,
    Loading,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(pub u64);

/// What happened to a response once it came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Applied,
    Failed(String),
    /// A newer request was issued meanwhile; the response was dropped.
    Stale,
}

// =============================================================================
// PIPELINE
// =============================================================================

pub struct Pipeline<T> {
    name: &'static str,
    fallback: &'static str,
    status: RequestStatus,
    data: Option<Arc<T>>,
    issued: u64,
    stale_discarded: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl<T> Pipeline<T> {
    pub fn new(name: &'static str, fallback: &'static str) -> Self {
        Self {
            name,
            fallback,
            status: RequestStatus::Idle,
            data: None,
            issued: 0,
            stale_discarded: 0,
            updated_at: None,
        }
    }

    /// Enter Loading and issue a token that supersedes every earlier one.
    pub fn begin(&mut self) -> RequestToken {
        if self.status == RequestStatus::Loading {
            tracing::debug!(pipeline = self.name, "re-entered while loading, superseding");
        }
        self.issued += 1;
        self.status = RequestStatus::Loading;
        RequestToken(self.issued)
    }

    /// Apply a response. All-or-nothing: either the data is replaced whole,
    /// or only the status changes, or (stale) nothing changes.
    pub fn settle(
        &mut self,
        token: RequestToken,
        outcome: Result<T, RemoteCallError>,
    ) -> Settlement {
        if token.0 != self.issued {
            self.stale_discarded += 1;
            tracing::debug!(
                pipeline = self.name,
                token = token.0,
                latest = self.issued,
                "discarding stale response"
            );
            return Settlement::Stale;
        }

        match outcome {
            Ok(value) => {
                self.data = Some(Arc::new(value));
                self.status = RequestStatus::Idle;
                self.updated_at = Some(Utc::now());
                tracing::info!(pipeline = self.name, token = token.0, "request applied");
                Settlement::Applied
            }
            Err(err) => {
                let message = err.detail().unwrap_or_else(|| self.fallback.to_string());
                tracing::warn!(pipeline = self.name, token = token.0, %message, "request failed");
                self.status = RequestStatus::Error(message.clone());
                Settlement::Failed(message)
            }
        }
    }

    /// Abandon `token` without a response. Only the latest token leaves Loading;
    /// the data is kept and the pipeline returns to Idle.
    pub fn cancel(&mut self, token: RequestToken) -> bool {
        if token.0 != self.issued || self.status != RequestStatus::Loading {
            return false;
        }
        self.status = RequestStatus::Idle;
        tracing::debug!(
            pipeline = self.name,
            token = token.0,
            "request cancelled before settling"
        );
        true
    }

    pub fn status(&self) -> &RequestStatus {
        &self.status
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.data.clone()
    }

    /// Soft guard for UI controls; does not prevent re-entry.
    pub fn is_busy(&self) -> bool {
        self.status == RequestStatus::Loading
    }

    pub fn latest_token(&self) -> RequestToken {
        RequestToken(self.issued)
    }

    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// Owns an issued token until it is settled. Dropping it unsettled (the caller
/// gave up on the future) cancels the request.
struct InFlight<'a, T> {
    pipeline: &'a Mutex<Pipeline<T>>,
    token: Option<RequestToken>,
}

impl<'a, T> InFlight<'a, T> {
    fn begin(pipeline: &'a Mutex<Pipeline<T>>) -> Self {
        let token = pipeline.lock().begin();
        Self {
            pipeline,
            token: Some(token),
        }
    }

    fn token(&self) -> u64 {
        self.token.map(|t| t.0).unwrap_or_default()
    }

    fn settle(mut self, outcome: Result<T, RemoteCallError>) -> Settlement {
        match self.token.take() {
            Some(token) => self.pipeline.lock().settle(token, outcome),
            None => Settlement::Stale,
        }
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.pipeline.lock().cancel(token);
        }
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

pub struct Orchestrator<S, C> {
    simulator: S,
    catalog: C,
    simulation: Mutex<Pipeline<SimulationResult>>,
    candidates: Mutex<Pipeline<Vec<HazardCandidate>>>,
}

impl<S: SimulationBackend, C: CandidateCatalog> Orchestrator<S, C> {
    pub fn new(simulator: S, catalog: C) -> Self {
        Self {
            simulator,
            catalog,
            simulation: Mutex::new(Pipeline::new("simulation", SIMULATION_FALLBACK_MESSAGE)),
            candidates: Mutex::new(Pipeline::new("candidates", CANDIDATES_FALLBACK_MESSAGE)),
        }
    }

    /// Enters Loading before returning; the returned future performs the call.
    /// Dropping the future before it completes cancels the request.
    pub fn run_simulation(
        &self,
        params: SimulationParams,
    ) -> impl Future<Output = Settlement> + Send + '_ {
        let in_flight = InFlight::begin(&self.simulation);
        tracing::info!(
            token = in_flight.token(),
            lat = params.lat,
            lon = params.lon,
            composition = %params.composition,
            "simulation requested"
        );
        async move {
            let outcome = self.simulator.simulate(params).await;
            in_flight.settle(outcome)
        }
    }

    /// Enters Loading before returning; the returned future performs the call.
    /// Dropping the future before it completes cancels the request.
    pub fn refresh_candidates(
        &self,
        query: CandidateQuery,
    ) -> impl Future<Output = Settlement> + Send + '_ {
        let in_flight = InFlight::begin(&self.candidates);
        tracing::info!(
            token = in_flight.token(),
            pha_only = query.pha_only,
            limit = query.limit,
            "candidate search requested"
        );
        async move {
            let outcome = self.catalog.search(query).await;
            in_flight.settle(outcome)
        }
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn simulation_status(&self) -> RequestStatus {
        self.simulation.lock().status().clone()
    }

    pub fn simulation_result(&self) -> Option<Arc<SimulationResult>> {
        self.simulation.lock().data()
    }

    pub fn simulation_busy(&self) -> bool {
        self.simulation.lock().is_busy()
    }

    pub fn simulation_updated_at(&self) -> Option<DateTime<Utc>> {
        self.simulation.lock().updated_at()
    }

    pub fn candidates_status(&self) -> RequestStatus {
        self.candidates.lock().status().clone()
    }

    pub fn candidates(&self) -> Arc<Vec<HazardCandidate>> {
        self.candidates.lock().data().unwrap_or_default()
    }

    pub fn candidates_busy(&self) -> bool {
        self.candidates.lock().is_busy()
    }

    /// Stale responses dropped across both pipelines.
    pub fn stale_discarded(&self) -> u64 {
        self.simulation.lock().stale_discarded() + self.candidates.lock().stale_discarded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorBody;
    use crate::models::{EntryPoint, GeoPoint, ImpactForm};
    use std::collections::BTreeMap;

    struct FixedSimulator {
        fail: bool,
    }

    impl SimulationBackend for FixedSimulator {
        async fn simulate(
            &self,
            params: SimulationParams,
        ) -> Result<SimulationResult, RemoteCallError> {
            if self.fail {
                return Err(RemoteCallError::Status {
                    status: 500,
                    body: Some(ApiErrorBody {
                        code: "internal".into(),
                        message: String::new(),
                    }),
                });
            }
            Ok(SimulationResult {
                regime: "airburst".into(),
                energy_kt: 100.0,
                center: GeoPoint {
                    lat: params.lat,
                    lon: params.lon,
                },
                overpressure_radii_m: BTreeMap::from([
                    ("1psi".to_string(), 2000.0),
                    ("5psi".to_string(), 800.0),
                ]),
            })
        }
    }

    struct EmptyCatalog;

    impl CandidateCatalog for EmptyCatalog {
        async fn search(
            &self,
            _query: CandidateQuery,
        ) -> Result<Vec<HazardCandidate>, RemoteCallError> {
            Err(RemoteCallError::Network("connection refused".into()))
        }
    }

    fn params() -> SimulationParams {
        let entry = EntryPoint::new(77.5946, 12.9716).unwrap();
        SimulationParams::from_form(&ImpactForm::default(), entry).unwrap()
    }

    #[test]
    fn test_pipeline_stale_token_is_discarded() {
        let mut pipeline: Pipeline<u32> = Pipeline::new("test", "fallback");
        let first = pipeline.begin();
        let second = pipeline.begin();

        assert_eq!(pipeline.settle(second, Ok(2)), Settlement::Applied);
        assert_eq!(pipeline.settle(first, Ok(1)), Settlement::Stale);
        assert_eq!(*pipeline.data().unwrap(), 2);
        assert_eq!(pipeline.stale_discarded(), 1);
        assert_eq!(pipeline.status(), &RequestStatus::Idle);
    }

    #[test]
    fn test_pipeline_stale_failure_keeps_loading() {
        let mut pipeline: Pipeline<u32> = Pipeline::new("test", "fallback");
        let first = pipeline.begin();
        let _second = pipeline.begin();

        let outcome = pipeline.settle(first, Err(RemoteCallError::Network("reset".into())));
        assert_eq!(outcome, Settlement::Stale);
        assert_eq!(pipeline.status(), &RequestStatus::Loading);
    }

    #[test]
    fn test_pipeline_failure_keeps_previous_data() {
        let mut pipeline: Pipeline<u32> = Pipeline::new("test", "fallback");
        let token = pipeline.begin();
        pipeline.settle(token, Ok(7));
        let stamp = pipeline.updated_at();

        let token = pipeline.begin();
        let outcome = pipeline.settle(token, Err(RemoteCallError::Network("timeout".into())));
        assert_eq!(outcome, Settlement::Failed("Request failed: timeout".into()));
        assert_eq!(*pipeline.data().unwrap(), 7);
        assert_eq!(pipeline.updated_at(), stamp);
        assert!(matches!(pipeline.status(), RequestStatus::Error(_)));
    }

    #[tokio::test]
    async fn test_simulation_enters_loading_synchronously() {
        let orchestrator = Orchestrator::new(FixedSimulator { fail: false }, EmptyCatalog);
        assert_eq!(orchestrator.simulation_status(), RequestStatus::Idle);

        let pending = orchestrator.run_simulation(params());
        assert_eq!(orchestrator.simulation_status(), RequestStatus::Loading);
        assert!(orchestrator.simulation_busy());

        assert_eq!(pending.await, Settlement::Applied);
        assert_eq!(orchestrator.simulation_status(), RequestStatus::Idle);
        let result = orchestrator.simulation_result().unwrap();
        assert_eq!(result.center.lon, 77.5946);
        assert!(orchestrator.simulation_updated_at().is_some());
    }

    #[test]
    fn test_pipeline_empty_error_uses_fallback() {
        let mut pipeline: Pipeline<u32> = Pipeline::new("test", "fallback");
        let token = pipeline.begin();
        let outcome = pipeline.settle(token, Err(RemoteCallError::Network(String::new())));
        assert_eq!(outcome, Settlement::Failed("fallback".into()));
        assert_eq!(pipeline.status(), &RequestStatus::Error("fallback".into()));
    }

    #[tokio::test]
    async fn test_error_body_without_message_reports_status() {
        let orchestrator = Orchestrator::new(FixedSimulator { fail: true }, EmptyCatalog);
        let outcome = orchestrator.run_simulation(params()).await;
        assert_eq!(outcome, Settlement::Failed("API returned status: 500".into()));
        assert!(orchestrator.simulation_result().is_none());
    }

    #[tokio::test]
    async fn test_candidate_failure_is_pipeline_scoped() {
        let orchestrator = Orchestrator::new(FixedSimulator { fail: false }, EmptyCatalog);
        orchestrator.refresh_candidates(CandidateQuery::default()).await;
        assert_eq!(
            orchestrator.candidates_status(),
            RequestStatus::Error("Request failed: connection refused".into())
        );
        assert!(orchestrator.candidates().is_empty());
        assert_eq!(orchestrator.simulation_status(), RequestStatus::Idle);
    }

    #[test]
    fn test_pipeline_cancel_only_latest_token() {
        let mut pipeline: Pipeline<u32> = Pipeline::new("test", "fallback");
        let token = pipeline.begin();
        pipeline.settle(token, Ok(3));

        let first = pipeline.begin();
        let second = pipeline.begin();
        assert!(!pipeline.cancel(first));
        assert_eq!(pipeline.status(), &RequestStatus::Loading);

        assert!(pipeline.cancel(second));
        assert_eq!(pipeline.status(), &RequestStatus::Idle);
        assert_eq!(*pipeline.data().unwrap(), 3);
        assert!(!pipeline.cancel(second));
    }

    #[tokio::test]
    async fn test_dropped_request_leaves_loading() {
        let orchestrator = Orchestrator::new(FixedSimulator { fail: false }, EmptyCatalog);
        let pending = orchestrator.run_simulation(params());
        assert!(orchestrator.simulation_busy());

        drop(pending);
        assert_eq!(orchestrator.simulation_status(), RequestStatus::Idle);
        assert!(!orchestrator.simulation_busy());

        let pending = orchestrator.refresh_candidates(CandidateQuery::default());
        drop(pending);
        assert!(!orchestrator.candidates_busy());
    }

    #[test]
    fn test_status_wire_shape() {
        let json = serde_json::to_value(RequestStatus::Error("boom".into())).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "boom");
        let json = serde_json::to_value(RequestStatus::Idle).unwrap();
        assert_eq!(json["state"], "idle");
    }
}
