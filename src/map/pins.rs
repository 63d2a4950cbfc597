use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::models::Vibe;

/// Zoom used when the camera centers on a single pin.
pub const CLOSE_ZOOM: u8 = 15;
/// Padding (pixels) applied when framing multiple pins.
pub const FIT_PADDING: u32 = 50;
/// Marker glyph sizes; an active pin renders ~1.3x the inactive size.
pub const PIN_SIZE: u32 = 34;
pub const ACTIVE_PIN_SIZE: u32 = 44;

/// One fixed color per vibe.
pub fn vibe_color(vibe: Vibe) -> &'static str {
    match vibe {
        Vibe::Cozy => "#E86B8B",
        Vibe::Curious => "#E8A817",
        Vibe::Fun => "#F5C842",
        Vibe::Chill => "#7D7269",
        Vibe::Spontaneous => "#D94F5E",
    }
}

/// A geotagged marker candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub vibe: Vibe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl Pin {
    fn has_valid_coords(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// How a marker should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    pub color: &'static str,
    pub size: u32,
}

impl MarkerStyle {
    pub fn for_pin(pin: &Pin) -> Self {
        MarkerStyle {
            color: vibe_color(pin.vibe),
            size: if pin.active { ACTIVE_PIN_SIZE } else { PIN_SIZE },
        }
    }
}

/// Minimal lat/lng box containing a set of pins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn containing(pins: &[Pin]) -> Option<Bounds> {
        let first = pins.first()?;
        let mut bounds = Bounds {
            min_lat: first.lat,
            min_lng: first.lng,
            max_lat: first.lat,
            max_lng: first.lng,
        };
        for pin in &pins[1..] {
            bounds.min_lat = bounds.min_lat.min(pin.lat);
            bounds.min_lng = bounds.min_lng.min(pin.lng);
            bounds.max_lat = bounds.max_lat.max(pin.lat);
            bounds.max_lng = bounds.max_lng.max(pin.lng);
        }
        Some(bounds)
    }
}

/// A single marker mutation against the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerOp {
    Create(Pin),
    Remove(String),
    Restyle(String, MarkerStyle),
}

/// Camera framing decided for one `set_pins` pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraOp {
    /// No valid pins: leave the camera where it is.
    Keep,
    CenterZoom { lat: f64, lng: f64, zoom: u8 },
    FitBounds { bounds: Bounds, padding: u32 },
}

/// The diff produced by one `set_pins` pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PinUpdate {
    pub markers: Vec<MarkerOp>,
    pub camera: CameraOp,
}

impl PinUpdate {
    pub fn is_noop(&self) -> bool {
        self.markers.is_empty() && self.camera == CameraOp::Keep
    }
}

/// Reconciles a desired pin list against the currently rendered marker set.
///
/// Markers are keyed by pin id. Position is immutable for a given id (an
/// event's coordinates do not change after creation), so a surviving id is
/// left in place; only its visual state is refreshed when the active flag
/// flips.
#[derive(Debug, Default)]
pub struct PinReconciler {
    rendered: HashMap<String, Pin>,
    single_pin: bool,
}

impl PinReconciler {
    pub fn new(single_pin: bool) -> Self {
        PinReconciler {
            rendered: HashMap::new(),
            single_pin,
        }
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    /// Compute the marker and camera operations needed to show `pins`.
    pub fn set_pins(&mut self, pins: Vec<Pin>) -> PinUpdate {
        let valid = dedupe_by_id(
            pins.into_iter()
                .filter(Pin::has_valid_coords)
                .collect::<Vec<_>>(),
        );

        let mut markers = Vec::new();

        // Removals first, in stable order
        let mut removed: Vec<String> = self
            .rendered
            .keys()
            .filter(|id| !valid.iter().any(|p| &&p.id == id))
            .cloned()
            .collect();
        removed.sort();
        for id in removed {
            self.rendered.remove(&id);
            markers.push(MarkerOp::Remove(id));
        }

        // Creates and restyles in input order
        for pin in &valid {
            match self.rendered.get(&pin.id) {
                None => {
                    markers.push(MarkerOp::Create(pin.clone()));
                }
                Some(existing) if existing.active != pin.active => {
                    markers.push(MarkerOp::Restyle(pin.id.clone(), MarkerStyle::for_pin(pin)));
                }
                Some(_) => {}
            }
            self.rendered.insert(pin.id.clone(), pin.clone());
        }

        let camera = if valid.is_empty() {
            CameraOp::Keep
        } else if valid.len() == 1 || self.single_pin {
            CameraOp::CenterZoom {
                lat: valid[0].lat,
                lng: valid[0].lng,
                zoom: CLOSE_ZOOM,
            }
        } else {
            CameraOp::FitBounds {
                bounds: Bounds::containing(&valid).unwrap_or(Bounds {
                    min_lat: 0.0,
                    min_lng: 0.0,
                    max_lat: 0.0,
                    max_lng: 0.0,
                }),
                padding: FIT_PADDING,
            }
        };

        PinUpdate { markers, camera }
    }
}

/// Keep the last occurrence of each id, in first-occurrence order.
fn dedupe_by_id(pins: Vec<Pin>) -> Vec<Pin> {
    let mut out: Vec<Pin> = Vec::with_capacity(pins.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for pin in pins {
        match index.get(&pin.id) {
            Some(&i) => out[i] = pin,
            None => {
                index.insert(pin.id.clone(), out.len());
                out.push(pin);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(id: &str, lat: f64, lng: f64) -> Pin {
        Pin {
            id: id.to_string(),
            lat,
            lng,
            title: format!("Pin {id}"),
            vibe: Vibe::Fun,
            subtitle: None,
            active: false,
        }
    }

    fn creates(update: &PinUpdate) -> Vec<&str> {
        update
            .markers
            .iter()
            .filter_map(|op| match op {
                MarkerOp::Create(p) => Some(p.id.as_str()),
                _ => None,
            })
            .collect()
    }

    fn removes(update: &PinUpdate) -> Vec<&str> {
        update
            .markers
            .iter()
            .filter_map(|op| match op {
                MarkerOp::Remove(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_pass_creates_all_pins() {
        let mut r = PinReconciler::new(false);
        let update = r.set_pins(vec![pin("a", 1.0, 2.0), pin("b", 3.0, 4.0)]);
        assert_eq!(creates(&update), vec!["a", "b"]);
        assert!(removes(&update).is_empty());
    }

    #[test]
    fn identical_pin_list_is_marker_noop() {
        let mut r = PinReconciler::new(false);
        let pins = vec![pin("a", 1.0, 2.0), pin("b", 3.0, 4.0)];
        r.set_pins(pins.clone());
        let second = r.set_pins(pins);
        assert!(second.markers.is_empty());
    }

    #[test]
    fn diff_removes_vanished_creates_new_keeps_surviving() {
        let mut r = PinReconciler::new(false);
        r.set_pins(vec![pin("a", 1.0, 1.0), pin("b", 2.0, 2.0)]);
        let update = r.set_pins(vec![pin("b", 2.0, 2.0), pin("c", 3.0, 3.0)]);
        assert_eq!(removes(&update), vec!["a"]);
        assert_eq!(creates(&update), vec!["c"]);
        // No op may touch b
        assert!(update.markers.iter().all(|op| match op {
            MarkerOp::Create(p) => p.id != "b",
            MarkerOp::Remove(id) | MarkerOp::Restyle(id, _) => id != "b",
        }));
    }

    #[test]
    fn active_flag_flip_restyles_in_place() {
        let mut r = PinReconciler::new(false);
        r.set_pins(vec![pin("a", 1.0, 1.0)]);
        let mut activated = pin("a", 1.0, 1.0);
        activated.active = true;
        let update = r.set_pins(vec![activated]);
        assert_eq!(
            update.markers,
            vec![MarkerOp::Restyle(
                "a".to_string(),
                MarkerStyle {
                    color: vibe_color(Vibe::Fun),
                    size: ACTIVE_PIN_SIZE,
                }
            )]
        );
    }

    #[test]
    fn non_finite_coordinates_are_filtered() {
        let mut r = PinReconciler::new(false);
        let update = r.set_pins(vec![
            pin("a", f64::NAN, 2.0),
            pin("b", 1.0, f64::INFINITY),
            pin("c", 1.0, 2.0),
        ]);
        assert_eq!(creates(&update), vec!["c"]);
    }

    #[test]
    fn single_pin_centers_at_close_zoom() {
        let mut r = PinReconciler::new(false);
        let update = r.set_pins(vec![pin("a", 40.7128, -74.006)]);
        assert_eq!(
            update.camera,
            CameraOp::CenterZoom {
                lat: 40.7128,
                lng: -74.006,
                zoom: CLOSE_ZOOM,
            }
        );
    }

    #[test]
    fn single_pin_mode_centers_even_with_many_pins() {
        let mut r = PinReconciler::new(true);
        let update = r.set_pins(vec![pin("a", 1.0, 1.0), pin("b", 5.0, 5.0)]);
        assert!(matches!(update.camera, CameraOp::CenterZoom { lat, lng, .. }
            if lat == 1.0 && lng == 1.0));
    }

    #[test]
    fn multiple_pins_frame_minimal_bounds_with_padding() {
        let mut r = PinReconciler::new(false);
        let update = r.set_pins(vec![
            pin("a", 1.0, -3.0),
            pin("b", 5.0, 2.0),
            pin("c", 3.0, 0.0),
        ]);
        assert_eq!(
            update.camera,
            CameraOp::FitBounds {
                bounds: Bounds {
                    min_lat: 1.0,
                    min_lng: -3.0,
                    max_lat: 5.0,
                    max_lng: 2.0,
                },
                padding: FIT_PADDING,
            }
        );
    }

    #[test]
    fn zero_valid_pins_leaves_camera_alone() {
        let mut r = PinReconciler::new(false);
        let update = r.set_pins(vec![pin("a", f64::NAN, f64::NAN)]);
        assert_eq!(update.camera, CameraOp::Keep);
        assert!(update.markers.is_empty());
    }

    #[test]
    fn emptying_the_list_removes_markers_but_keeps_camera() {
        let mut r = PinReconciler::new(false);
        r.set_pins(vec![pin("a", 1.0, 1.0)]);
        let update = r.set_pins(vec![]);
        assert_eq!(removes(&update), vec!["a"]);
        assert_eq!(update.camera, CameraOp::Keep);
    }

    #[test]
    fn duplicate_ids_last_occurrence_wins() {
        let mut r = PinReconciler::new(false);
        let mut dup = pin("a", 1.0, 1.0);
        dup.active = true;
        let update = r.set_pins(vec![pin("a", 1.0, 1.0), dup]);
        assert_eq!(update.markers.len(), 1);
        match &update.markers[0] {
            MarkerOp::Create(p) => assert!(p.active),
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn each_vibe_has_a_distinct_color() {
        let colors: std::collections::HashSet<&str> = crate::db::models::VIBES
            .iter()
            .map(|v| vibe_color(*v))
            .collect();
        assert_eq!(colors.len(), 5);
    }
}
