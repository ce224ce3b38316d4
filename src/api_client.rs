// Backend API Clients
// Simulation model and hazardous-object catalog, reached over HTTP

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{ApiErrorBody, RemoteCallError};
use crate::models::{CandidateQuery, HazardCandidate, SimulationParams, SimulationResult, PHA_YES};

pub const NEOWS_BASE_URL: &str = "https://api.nasa.gov/neo/rest/v1";

/// NeoWs caps browse pages at 20 objects.
const NEOWS_MAX_PAGE_SIZE: u32 = 20;
const NEOWS_MAX_PAGES: u32 = 5;

// =============================================================================
// BACKEND CONTRACTS
// =============================================================================

pub trait SimulationBackend: Send + Sync {
    fn simulate(
        &self,
        params: SimulationParams,
    ) -> impl Future<Output = Result<SimulationResult, RemoteCallError>> + Send;
}

pub trait CandidateCatalog: Send + Sync {
    /// Candidates in backend relevance order, at most `query.limit` of them.
    fn search(
        &self,
        query: CandidateQuery,
    ) -> impl Future<Output = Result<Vec<HazardCandidate>, RemoteCallError>> + Send;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteCallError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RemoteCallError::Network(format!("client setup: {}", e)))
}

/// Map a status + body pair to either the decoded payload or a RemoteCallError.
pub fn parse_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, RemoteCallError> {
    if !status.is_success() {
        let body = serde_json::from_str::<ApiErrorBody>(body).ok();
        return Err(RemoteCallError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(body).map_err(|e| RemoteCallError::Malformed(e.to_string()))
}

async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RemoteCallError> {
    let status = response.status();
    let body = response.text().await?;
    parse_response(status, &body)
}

// =============================================================================
// SIMULATION BACKEND
// =============================================================================

pub struct HttpSimulationBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSimulationBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteCallError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/simulate", self.base_url)
    }
}

impl SimulationBackend for HttpSimulationBackend {
    async fn simulate(
        &self,
        params: SimulationParams,
    ) -> Result<SimulationResult, RemoteCallError> {
        tracing::debug!(url = %self.endpoint(), ?params, "POST simulate");
        let response = self.client.post(self.endpoint()).json(&params).send().await?;
        read_response(response).await
    }
}

// =============================================================================
// CANDIDATE CATALOG
// =============================================================================

pub struct HttpCatalog {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteCallError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/candidates", self.base_url)
    }
}

impl CandidateCatalog for HttpCatalog {
    async fn search(&self, query: CandidateQuery) -> Result<Vec<HazardCandidate>, RemoteCallError> {
        tracing::debug!(url = %self.endpoint(), ?query, "GET candidates");
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("pha_only", query.pha_only.to_string()),
                ("limit", query.limit.to_string()),
            ])
            .send()
            .await?;
        let mut candidates: Vec<HazardCandidate> = read_response(response).await?;
        if candidates.len() > query.limit as usize {
            tracing::warn!(
                returned = candidates.len(),
                limit = query.limit,
                "catalog ignored limit, truncating"
            );
            candidates.truncate(query.limit as usize);
        }
        Ok(candidates)
    }
}

// =============================================================================
// NASA NeoWs CATALOG
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseResponse {
    pub page: Option<PageInfo>,
    pub near_earth_objects: Vec<NeoObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub size: i32,
    pub total_elements: i32,
    pub total_pages: i32,
    pub number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeoObject {
    pub id: String,
    pub name: String,
    pub designation: Option<String>,
    pub name_limited: Option<String>,
    pub estimated_diameter: Option<EstimatedDiameter>,
    pub is_potentially_hazardous_asteroid: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedDiameter {
    pub kilometers: Option<DiameterRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiameterRange {
    pub estimated_diameter_min: f64,
    pub estimated_diameter_max: f64,
}

impl NeoObject {
    /// Convert a NeoWs object to a catalog candidate
    pub fn to_candidate(&self) -> HazardCandidate {
        let diameter_km = self
            .estimated_diameter
            .as_ref()
            .and_then(|d| d.kilometers.as_ref())
            .map(|k| (k.estimated_diameter_min + k.estimated_diameter_max) / 2.0);
        let hazardous = self.is_potentially_hazardous_asteroid.unwrap_or(false);

        HazardCandidate {
            designation: self
                .designation
                .clone()
                .unwrap_or_else(|| self.name.clone()),
            name: self.name_limited.clone(),
            id: self.id.clone(),
            diameter_km,
            // NeoWs does not publish albedo
            albedo: None,
            pha: if hazardous { PHA_YES } else { "N" }.to_string(),
        }
    }
}

/// Catalog backed directly by NASA's NeoWs browse endpoint.
pub struct NeoWsCatalog {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl NeoWsCatalog {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, RemoteCallError> {
        Self::with_base_url(api_key, NEOWS_BASE_URL, timeout)
    }

    pub fn with_base_url(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteCallError> {
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }

    async fn browse(&self, page: u32, size: u32) -> Result<BrowseResponse, RemoteCallError> {
        let url = format!("{}/neo/browse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("page", page.to_string()),
                ("size", size.to_string()),
                ("api_key", self.api_key.clone()),
            ])
            .send()
            .await?;
        read_response(response).await
    }
}

/// Keep catalog order, drop non-hazardous objects when asked, stop at `limit`.
pub fn select_candidates(
    objects: &[NeoObject],
    query: CandidateQuery,
    out: &mut Vec<HazardCandidate>,
) {
    for neo in objects {
        if out.len() >= query.limit as usize {
            break;
        }
        let candidate = neo.to_candidate();
        if query.pha_only && !candidate.is_hazardous() {
            continue;
        }
        out.push(candidate);
    }
}

impl CandidateCatalog for NeoWsCatalog {
    async fn search(&self, query: CandidateQuery) -> Result<Vec<HazardCandidate>, RemoteCallError> {
        let size = query.limit.clamp(1, NEOWS_MAX_PAGE_SIZE);
        let mut candidates = Vec::new();
        let mut page = 0;

        while candidates.len() < query.limit as usize && page < NEOWS_MAX_PAGES {
            let data = self.browse(page, size).await?;
            select_candidates(&data.near_earth_objects, query, &mut candidates);

            let total_pages = data.page.map(|p| p.total_pages).unwrap_or(1);
            page += 1;
            if data.near_earth_objects.is_empty() || (page as i32) >= total_pages {
                break;
            }
        }

        tracing::debug!(count = candidates.len(), pages = page, "NeoWs candidates");
        Ok(candidates)
    }
}

/// Catalog chosen at startup from configuration.
pub enum CatalogClient {
    Http(HttpCatalog),
    NeoWs(NeoWsCatalog),
}

impl CandidateCatalog for CatalogClient {
    async fn search(&self, query: CandidateQuery) -> Result<Vec<HazardCandidate>, RemoteCallError> {
        match self {
            CatalogClient::Http(catalog) => catalog.search(query).await,
            CatalogClient::NeoWs(catalog) => catalog.search(query).await,
        }
    }
}
