// Overlay Renderer
// Derives blast-radius polygon layers from the latest simulation result.
// Read-only: its viewport mirrors the store and never accepts gestures.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::geodesic::{ring_with_limit, Ring, DEFAULT_POLAR_LIMIT_DEG, DEFAULT_STEPS};
use crate::models::{SimulationResult, ViewState};

/// Overpressure thresholds drawn on the map, keyed by their wire labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Threshold {
    OnePsi,
    FivePsi,
}

impl Threshold {
    /// Draw order: farthest (least severe) first so nearer rings sit on top.
    pub const ALL: [Threshold; 2] = [Threshold::OnePsi, Threshold::FivePsi];

    pub fn label(&self) -> &'static str {
        match self {
            Threshold::OnePsi => "1psi",
            Threshold::FivePsi => "5psi",
        }
    }

    pub fn style(&self) -> LayerStyle {
        match self {
            Threshold::OnePsi => LayerStyle::new([1.0, 0.65, 0.0], 0.18, [1.0, 0.55, 0.0], 1.5),
            Threshold::FivePsi => LayerStyle::new([0.86, 0.08, 0.08], 0.35, [0.7, 0.0, 0.0], 2.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerStyle {
    pub fill: [f32; 3],
    pub fill_opacity: f32,
    pub stroke: [f32; 3],
    pub stroke_width: f32,
}

impl LayerStyle {
    pub const fn new(
        fill: [f32; 3],
        fill_opacity: f32,
        stroke: [f32; 3],
        stroke_width: f32,
    ) -> Self {
        Self {
            fill,
            fill_opacity,
            stroke,
            stroke_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    pub threshold: Threshold,
    pub radius_m: f64,
    pub ring: Ring,
    pub style: LayerStyle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingSettings {
    pub steps: usize,
    pub polar_limit_deg: f64,
}

impl Default for RingSettings {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            polar_limit_deg: DEFAULT_POLAR_LIMIT_DEG,
        }
    }
}

/// Layers for `result`; empty when there is nothing to show.
pub fn render_layers(
    result: Option<&SimulationResult>,
    settings: RingSettings,
) -> Vec<OverlayLayer> {
    let Some(result) = result else {
        return Vec::new();
    };
    let center = (result.center.lon, result.center.lat);

    Threshold::ALL
        .iter()
        .filter_map(|&threshold| {
            let Some(radius_m) = result.radius_for(threshold.label()) else {
                tracing::debug!(label = threshold.label(), "threshold missing from result");
                return None;
            };
            match ring_with_limit(center, radius_m, settings.steps, settings.polar_limit_deg) {
                Ok(ring) => Some(OverlayLayer {
                    threshold,
                    radius_m,
                    ring,
                    style: threshold.style(),
                }),
                Err(err) => {
                    tracing::warn!(label = threshold.label(), %err, "dropping overlay layer");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub view: ViewState,
    pub layers: Vec<OverlayLayer>,
    /// Always false: the interactive map is the only gesture authority.
    pub gestures_enabled: bool,
}

impl OverlayFrame {
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .layers
            .iter()
            .map(|layer| {
                json!({
                    "type": "Feature",
                    "geometry": layer.ring.to_geojson(),
                    "properties": {
                        "threshold": layer.threshold.label(),
                        "radius_m": layer.radius_m,
                        "fill": layer.style.fill,
                        "fill_opacity": layer.style.fill_opacity,
                        "stroke": layer.style.stroke,
                        "stroke_width": layer.style.stroke_width,
                    },
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

/// Memoised renderer: re-derives layers only when the view changes by value
/// or the result is a different allocation.
pub struct OverlayRenderer {
    settings: RingSettings,
    last_view: Option<ViewState>,
    last_result: Option<Arc<SimulationResult>>,
    frame: Option<OverlayFrame>,
    renders: u64,
}

impl OverlayRenderer {
    pub fn new(settings: RingSettings) -> Self {
        Self {
            settings,
            last_view: None,
            last_result: None,
            frame: None,
            renders: 0,
        }
    }

    /// Returns true when a new frame was produced.
    pub fn update(&mut self, view: ViewState, result: Option<Arc<SimulationResult>>) -> bool {
        let same_view = self.last_view == Some(view);
        let same_result = match (&self.last_result, &result) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if self.frame.is_some() && same_view && same_result {
            return false;
        }

        // The view alone does not change the geometry.
        let layers = match (&self.frame, same_result) {
            (Some(frame), true) => frame.layers.clone(),
            _ => render_layers(result.as_deref(), self.settings),
        };
        self.frame = Some(OverlayFrame {
            view,
            layers,
            gestures_enabled: false,
        });
        self.last_view = Some(view);
        self.last_result = result;
        self.renders += 1;
        true
    }

    /// Camera moved; keep the last result.
    pub fn update_view(&mut self, view: ViewState) -> bool {
        let result = self.last_result.clone();
        self.update(view, result)
    }

    pub fn frame(&self) -> Option<&OverlayFrame> {
        self.frame.as_ref()
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(RingSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesic::flat_distance_m;
    use crate::models::{EntryPoint, GeoPoint};
    use std::collections::BTreeMap;

    fn result(radii: &[(&str, f64)]) -> SimulationResult {
        SimulationResult {
            regime: "airburst".into(),
            energy_kt: 950.0,
            center: GeoPoint {
                lat: 12.9716,
                lon: 77.5946,
            },
            overpressure_radii_m: radii
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn view() -> ViewState {
        ViewState::centered_on(EntryPoint::new(77.5946, 12.9716).unwrap(), 10.0)
    }

    #[test]
    fn test_no_result_no_layers() {
        assert!(render_layers(None, RingSettings::default()).is_empty());
    }

    #[test]
    fn test_two_rings_outer_encloses_inner() {
        let result = result(&[("1psi", 2000.0), ("5psi", 800.0)]);
        let layers = render_layers(Some(&result), RingSettings::default());
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].threshold, Threshold::OnePsi);
        assert_eq!(layers[1].threshold, Threshold::FivePsi);

        let center = (77.5946, 12.9716);
        let outer_min = layers[0]
            .ring
            .points()
            .iter()
            .map(|&p| flat_distance_m(center, p))
            .fold(f64::INFINITY, f64::min);
        let inner_max = layers[1]
            .ring
            .points()
            .iter()
            .map(|&p| flat_distance_m(center, p))
            .fold(0.0, f64::max);
        assert!(outer_min > inner_max);
    }

    #[test]
    fn test_near_threshold_is_warmer_and_more_opaque() {
        let near = Threshold::FivePsi.style();
        let far = Threshold::OnePsi.style();
        assert!(near.fill_opacity > far.fill_opacity);
        assert!(near.fill[1] < far.fill[1]);
    }

    #[test]
    fn test_missing_and_invalid_thresholds_are_skipped() {
        let only_far = result(&[("1psi", 2000.0), ("20psi", 100.0)]);
        let layers = render_layers(Some(&only_far), RingSettings::default());
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].threshold, Threshold::OnePsi);

        let bad = result(&[("1psi", -5.0), ("5psi", 800.0)]);
        let layers = render_layers(Some(&bad), RingSettings::default());
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].threshold, Threshold::FivePsi);
    }

    #[test]
    fn test_renderer_skips_unchanged_inputs() {
        let mut renderer = OverlayRenderer::default();
        let shared = Arc::new(result(&[("1psi", 2000.0), ("5psi", 800.0)]));

        assert!(renderer.update(view(), Some(shared.clone())));
        assert!(!renderer.update(view(), Some(shared.clone())));
        assert_eq!(renderer.render_count(), 1);

        let mut moved = view();
        moved.zoom = 12.0;
        assert!(renderer.update(moved, Some(shared.clone())));
        assert_eq!(renderer.frame().unwrap().layers.len(), 2);

        // Equal content in a new allocation counts as a new result.
        let replaced = Arc::new((*shared).clone());
        assert!(renderer.update(moved, Some(replaced)));
        assert!(renderer.update(moved, None));
        assert!(renderer.frame().unwrap().layers.is_empty());
        assert_eq!(renderer.render_count(), 4);
    }

    #[test]
    fn test_view_only_update_reuses_geometry() {
        let mut renderer = OverlayRenderer::default();
        renderer.update(view(), Some(Arc::new(result(&[("1psi", 2000.0), ("5psi", 800.0)]))));
        let before = renderer.frame().unwrap().layers.clone();

        let mut panned = view();
        panned.bearing = 30.0;
        assert!(renderer.update_view(panned));
        assert!(!renderer.update_view(panned));
        let frame = renderer.frame().unwrap();
        assert_eq!(frame.view, panned);
        assert_eq!(frame.layers, before);
    }

    #[test]
    fn test_frame_never_accepts_gestures() {
        let mut renderer = OverlayRenderer::default();
        renderer.update(view(), None);
        assert!(!renderer.frame().unwrap().gestures_enabled);
    }

    #[test]
    fn test_frame_geojson_feature_collection() {
        let mut renderer = OverlayRenderer::default();
        renderer.update(view(), Some(Arc::new(result(&[("1psi", 2000.0), ("5psi", 800.0)]))));
        let geo = renderer.frame().unwrap().to_geojson();
        assert_eq!(geo["type"], "FeatureCollection");
        assert_eq!(geo["features"][0]["properties"]["threshold"], "1psi");
        assert_eq!(geo["features"][1]["properties"]["threshold"], "5psi");
    }
}
