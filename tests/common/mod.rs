// Shared test doubles for the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::oneshot;

use impactviz::api_client::{select_candidates, NeoObject};
use impactviz::models::GeoPoint;
use impactviz::{
    CandidateCatalog, CandidateQuery, EntryPoint, HazardCandidate, ImpactForm, RemoteCallError,
    SimulationBackend, SimulationParams, SimulationResult,
};

pub const BENGALURU: (f64, f64) = (77.5946, 12.9716);
pub const TOKYO: (f64, f64) = (139.6917, 35.6895);

pub fn params_at((lon, lat): (f64, f64)) -> SimulationParams {
    let entry = EntryPoint::new(lon, lat).unwrap();
    SimulationParams::from_form(&ImpactForm::default(), entry).unwrap()
}

pub fn blast_at(lat: f64, lon: f64) -> SimulationResult {
    SimulationResult {
        regime: "airburst".into(),
        energy_kt: 2400.0,
        center: GeoPoint { lat, lon },
        overpressure_radii_m: BTreeMap::from([
            ("1psi".to_string(), 2000.0),
            ("5psi".to_string(), 800.0),
        ]),
    }
}

// =============================================================================
// GATED SIMULATOR
// =============================================================================

/// Simulator whose responses are held until the test opens the gate for the
/// requested longitude. A dropped gate surfaces as a network error.
#[derive(Default)]
pub struct GatedSimulator {
    gates: Mutex<HashMap<u64, oneshot::Receiver<()>>>,
}

impl GatedSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the response for a request centred on `lon` until the sender fires.
    pub fn gate(&self, lon: f64) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(lon.to_bits(), rx);
        tx
    }
}

impl SimulationBackend for GatedSimulator {
    async fn simulate(
        &self,
        params: SimulationParams,
    ) -> Result<SimulationResult, RemoteCallError> {
        let gate = self.gates.lock().remove(&params.lon.to_bits());
        if let Some(gate) = gate {
            gate.await
                .map_err(|_| RemoteCallError::Network("gate dropped".into()))?;
        }
        Ok(blast_at(params.lat, params.lon))
    }
}

// =============================================================================
// FIXTURE CATALOG
// =============================================================================

/// Catalog backed by an in-memory NeoWs page.
pub struct FixtureCatalog {
    objects: Vec<NeoObject>,
}

impl FixtureCatalog {
    /// `count` objects; every third one is potentially hazardous.
    pub fn with_objects(count: usize) -> Self {
        let objects = (0..count)
            .map(|i| {
                serde_json::from_value(serde_json::json!({
                    "id": format!("{}", 3_000_000 + i),
                    "name": format!("({} XY{})", 2000 + i, i),
                    "designation": format!("{} XY{}", 2000 + i, i),
                    "estimated_diameter": {
                        "kilometers": {
                            "estimated_diameter_min": 0.1 * (i + 1) as f64,
                            "estimated_diameter_max": 0.3 * (i + 1) as f64
                        }
                    },
                    "is_potentially_hazardous_asteroid": i % 3 == 0
                }))
                .unwrap()
            })
            .collect();
        Self { objects }
    }
}

impl CandidateCatalog for FixtureCatalog {
    async fn search(&self, query: CandidateQuery) -> Result<Vec<HazardCandidate>, RemoteCallError> {
        let mut out = Vec::new();
        select_candidates(&self.objects, query, &mut out);
        Ok(out)
    }
}

/// Catalog that is always down.
pub struct DownCatalog;

impl CandidateCatalog for DownCatalog {
    async fn search(
        &self,
        _query: CandidateQuery,
    ) -> Result<Vec<HazardCandidate>, RemoteCallError> {
        Err(RemoteCallError::Network("connection refused".into()))
    }
}
