// Data Model
// Wire types shared with the simulation and catalog backends

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

// =============================================================================
// LOCATION & CAMERA
// =============================================================================

/// Chosen impact location. Always finite and inside the lon/lat domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl EntryPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ModelError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ModelError::OutOfRange {
                field: "longitude",
                value: longitude,
            });
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ModelError::OutOfRange {
                field: "latitude",
                value: latitude,
            });
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }
}

/// Camera pose of the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

impl ViewState {
    pub fn centered_on(entry: EntryPoint, zoom: f64) -> Self {
        Self {
            longitude: entry.longitude,
            latitude: entry.latitude,
            zoom,
            bearing: 0.0,
            pitch: 0.0,
        }
    }

    pub fn apply(&mut self, patch: &ViewPatch) {
        if let Some(v) = patch.longitude {
            self.longitude = v;
        }
        if let Some(v) = patch.latitude {
            self.latitude = v;
        }
        if let Some(v) = patch.zoom {
            self.zoom = v;
        }
        if let Some(v) = patch.bearing {
            self.bearing = v;
        }
        if let Some(v) = patch.pitch {
            self.pitch = v;
        }
    }
}

/// Partial view update; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewPatch {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub zoom: Option<f64>,
    pub bearing: Option<f64>,
    pub pitch: Option<f64>,
}

impl ViewPatch {
    pub fn zoom(zoom: f64) -> Self {
        Self {
            zoom: Some(zoom),
            ..Self::default()
        }
    }
}

/// Full camera pose as reported by the map widget during a move.
pub type CameraPose = ViewState;

// =============================================================================
// SIMULATION REQUEST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Composition {
    Stony,
    Iron,
    Cometary,
}

impl Composition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Composition::Stony => "stony",
            Composition::Iron => "iron",
            Composition::Cometary => "cometary",
        }
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Composition {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stony" => Ok(Composition::Stony),
            "iron" => Ok(Composition::Iron),
            "cometary" => Ok(Composition::Cometary),
            _ => Err(ModelError::UnknownComposition(s.to_string())),
        }
    }
}

/// Raw form values, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactForm {
    pub diameter_m: f64,
    pub density_kg_m3: f64,
    pub velocity_kms: f64,
    pub angle_deg: f64,
    pub composition: String,
}

impl Default for ImpactForm {
    fn default() -> Self {
        Self {
            diameter_m: 50.0,
            density_kg_m3: 3000.0,
            velocity_kms: 20.0,
            angle_deg: 45.0,
            composition: "stony".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub diameter_m: f64,
    pub density_kg_m3: f64,
    pub velocity_kms: f64,
    pub angle_deg: f64,
    pub composition: Composition,
    pub lat: f64,
    pub lon: f64,
}

fn positive(field: &'static str, value: f64) -> Result<f64, ModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ModelError::OutOfRange { field, value })
    }
}

impl SimulationParams {
    /// Validate the form and bind it to the current entry point.
    pub fn from_form(form: &ImpactForm, entry: EntryPoint) -> Result<Self, ModelError> {
        let diameter_m = positive("diameter_m", form.diameter_m)?;
        let density_kg_m3 = positive("density_kg_m3", form.density_kg_m3)?;
        let velocity_kms = positive("velocity_kms", form.velocity_kms)?;
        let angle_deg = form.angle_deg;
        if !(angle_deg.is_finite() && angle_deg > 0.0 && angle_deg < 90.0) {
            return Err(ModelError::OutOfRange {
                field: "angle_deg",
                value: angle_deg,
            });
        }
        let composition = form.composition.parse::<Composition>()?;

        Ok(Self {
            diameter_m,
            density_kg_m3,
            velocity_kms,
            angle_deg,
            composition,
            lat: entry.latitude,
            lon: entry.longitude,
        })
    }

    pub fn entry_point(&self) -> EntryPoint {
        EntryPoint {
            longitude: self.lon,
            latitude: self.lat,
        }
    }
}

// =============================================================================
// SIMULATION RESULT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub regime: String,
    pub energy_kt: f64,
    pub center: GeoPoint,
    /// Threshold label ("1psi", "5psi", ...) to radius in meters.
    pub overpressure_radii_m: BTreeMap<String, f64>,
}

impl SimulationResult {
    pub fn radius_for(&self, label: &str) -> Option<f64> {
        self.overpressure_radii_m.get(label).copied()
    }
}

// =============================================================================
// HAZARD CATALOG
// =============================================================================

/// Catalog value of `pha` for potentially hazardous objects.
pub const PHA_YES: &str = "Y";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardCandidate {
    pub designation: String,
    #[serde(default)]
    pub name: Option<String>,
    pub id: String,
    #[serde(default)]
    pub diameter_km: Option<f64>,
    #[serde(default)]
    pub albedo: Option<f64>,
    pub pha: String,
}

impl HazardCandidate {
    pub fn is_hazardous(&self) -> bool {
        self.pha.eq_ignore_ascii_case(PHA_YES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuery {
    pub pha_only: bool,
    pub limit: u32,
}

impl Default for CandidateQuery {
    fn default() -> Self {
        Self {
            pha_only: true,
            limit: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bangalore() -> EntryPoint {
        EntryPoint::new(77.5946, 12.9716).unwrap()
    }

    #[test]
    fn test_entry_point_rejects_out_of_range() {
        assert!(EntryPoint::new(181.0, 0.0).is_err());
        assert!(EntryPoint::new(0.0, -90.5).is_err());
        assert!(EntryPoint::new(f64::NAN, 0.0).is_err());
        assert!(EntryPoint::new(-180.0, 90.0).is_ok());
    }

    #[test]
    fn test_params_from_form_binds_entry_point() {
        let params = SimulationParams::from_form(&ImpactForm::default(), bangalore()).unwrap();
        assert_eq!(params.composition, Composition::Stony);
        assert_eq!(params.lat, 12.9716);
        assert_eq!(params.lon, 77.5946);
    }

    #[test]
    fn test_params_reject_bad_angle_and_composition() {
        let mut form = ImpactForm::default();
        form.angle_deg = 90.0;
        assert!(matches!(
            SimulationParams::from_form(&form, bangalore()),
            Err(ModelError::OutOfRange {
                field: "angle_deg",
                ..
            })
        ));

        let mut form = ImpactForm::default();
        form.composition = "chondrite".into();
        assert!(matches!(
            SimulationParams::from_form(&form, bangalore()),
            Err(ModelError::UnknownComposition(_))
        ));

        let mut form = ImpactForm::default();
        form.diameter_m = 0.0;
        assert!(SimulationParams::from_form(&form, bangalore()).is_err());
    }

    #[test]
    fn test_params_wire_shape() {
        let params = SimulationParams::from_form(&ImpactForm::default(), bangalore()).unwrap();
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["composition"], "stony");
        assert_eq!(json["density_kg_m3"], 3000.0);
        assert_eq!(json["lon"], 77.5946);
    }

    #[test]
    fn test_result_keeps_threshold_labels() {
        let raw = r#"{
            "regime": "airburst",
            "energy_kt": 1200.5,
            "center": {"lat": 12.9716, "lon": 77.5946},
            "overpressure_radii_m": {"1psi": 2000.0, "5psi": 800.0}
        }"#;
        let result: SimulationResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.radius_for("1psi"), Some(2000.0));
        assert_eq!(result.radius_for("5psi"), Some(800.0));
        assert_eq!(result.radius_for("20psi"), None);
    }

    #[test]
    fn test_candidate_optional_fields() {
        let raw = r#"{"designation": "99942", "id": "2099942", "pha": "Y"}"#;
        let candidate: HazardCandidate = serde_json::from_str(raw).unwrap();
        assert!(candidate.is_hazardous());
        assert!(candidate.name.is_none());
        assert!(candidate.diameter_km.is_none());
    }
}
