//! Lifecycle of one rendering surface and its camera.
//!
//! Surface acquisition is a single-shot async operation in the consumer; here
//! it is modeled as `begin_init` / `finish_init` so the state machine is
//! explicit: Uninitialized -> Initializing -> Ready -> TornDown. `set_pins`
//! calls that arrive while acquisition is in flight are queued and applied in
//! order once the surface is up. Teardown at any point cancels: a late
//! `finish_init` against a torn-down canvas releases the surface without
//! touching it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::pins::{Bounds, CameraOp, MarkerOp, MarkerStyle, Pin, PinReconciler, PinUpdate};

/// Marker and camera operations the canvas issues against the provider.
pub trait MarkerSurface {
    fn create_marker(&mut self, pin: &Pin, style: MarkerStyle);
    fn remove_marker(&mut self, id: &str);
    fn restyle_marker(&mut self, id: &str, style: MarkerStyle);
    fn set_view(&mut self, lat: f64, lng: f64, zoom: u8);
    fn fit_bounds(&mut self, bounds: Bounds, padding: u32);
}

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface target already attached")]
    AlreadyAttached,
    #[error("surface acquisition failed: {0}")]
    Acquire(String),
}

/// Identity handle for a physical rendering target. At most one canvas may be
/// attached at a time; attaching twice without a teardown in between corrupts
/// the underlying surface, so the flag is checked-and-set atomically.
#[derive(Debug, Clone, Default)]
pub struct SurfaceTarget {
    attached: Arc<AtomicBool>,
}

impl SurfaceTarget {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_attach(&self) -> bool {
        self.attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

type PinClickHandler = Box<dyn Fn(&str) + Send>;

enum CanvasState<S> {
    Uninitialized,
    Initializing { queued: Vec<Vec<Pin>> },
    Ready { surface: S },
    TornDown,
}

/// Stateful wrapper around one rendering surface and one camera.
pub struct MapCanvas<S: MarkerSurface> {
    state: CanvasState<S>,
    target: Option<SurfaceTarget>,
    reconciler: PinReconciler,
    on_pin_click: Option<PinClickHandler>,
}

impl<S: MarkerSurface> MapCanvas<S> {
    pub fn new(single_pin: bool) -> Self {
        MapCanvas {
            state: CanvasState::Uninitialized,
            target: None,
            reconciler: PinReconciler::new(single_pin),
            on_pin_click: None,
        }
    }

    /// Register the callback invoked with a pin id when the user activates a
    /// marker. The canvas never decides navigation itself.
    pub fn on_pin_click(mut self, handler: impl Fn(&str) + Send + 'static) -> Self {
        self.on_pin_click = Some(Box::new(handler));
        self
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, CanvasState::Ready { .. })
    }

    pub fn is_torn_down(&self) -> bool {
        matches!(self.state, CanvasState::TornDown)
    }

    /// Claim the target and enter Initializing. A target that is already
    /// attached is the double-init race from the underlying library; it is
    /// harmless to ignore, so it is logged and the canvas stays Uninitialized.
    pub fn begin_init(&mut self, target: &SurfaceTarget) {
        match self.state {
            CanvasState::Uninitialized => {
                if !target.try_attach() {
                    tracing::warn!("map target already initialized, ignoring");
                    return;
                }
                self.target = Some(target.clone());
                self.state = CanvasState::Initializing { queued: Vec::new() };
            }
            CanvasState::Initializing { .. } | CanvasState::Ready { .. } => {
                tracing::warn!("begin_init on an already-initialized canvas, ignoring");
            }
            CanvasState::TornDown => {}
        }
    }

    /// Complete surface acquisition. Acquisition failure is the caller's to
    /// handle: the canvas returns to Uninitialized and reports the error. A
    /// canvas torn down while acquisition was in flight swallows the result
    /// so no mutation reaches a removed surface.
    pub fn finish_init(&mut self, result: Result<S, SurfaceError>) -> Result<(), SurfaceError> {
        match std::mem::replace(&mut self.state, CanvasState::TornDown) {
            CanvasState::Initializing { queued } => match result {
                Ok(mut surface) => {
                    for pins in queued {
                        let update = self.reconciler.set_pins(pins);
                        apply_update(&mut surface, update);
                    }
                    self.state = CanvasState::Ready { surface };
                    Ok(())
                }
                Err(e) => {
                    if let Some(target) = self.target.take() {
                        target.detach();
                    }
                    self.state = CanvasState::Uninitialized;
                    Err(e)
                }
            },
            CanvasState::TornDown => {
                // Cancelled mid-flight; drop the surface untouched.
                Ok(())
            }
            other => {
                tracing::warn!("finish_init outside of initialization, ignoring");
                self.state = other;
                Ok(())
            }
        }
    }

    /// Show exactly `pins`. Ready applies synchronously; Initializing queues;
    /// anything else drops the call.
    pub fn set_pins(&mut self, pins: Vec<Pin>) {
        match &mut self.state {
            CanvasState::Ready { surface } => {
                let update = self.reconciler.set_pins(pins);
                apply_update(surface, update);
            }
            CanvasState::Initializing { queued } => {
                queued.push(pins);
            }
            CanvasState::Uninitialized | CanvasState::TornDown => {
                tracing::debug!("set_pins on inactive canvas, dropping");
            }
        }
    }

    /// Invoked by the surface provider when a marker is clicked.
    pub fn pin_clicked(&self, id: &str) {
        if !self.is_ready() {
            return;
        }
        if let Some(handler) = &self.on_pin_click {
            handler(id);
        }
    }

    /// Release the surface. Idempotent; afterwards the target may be attached
    /// by a fresh canvas.
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.state, CanvasState::TornDown) {
            CanvasState::Ready { surface } => {
                drop(surface);
                if let Some(target) = self.target.take() {
                    target.detach();
                }
            }
            CanvasState::Initializing { .. } => {
                // Cancels in-flight acquisition; finish_init becomes a no-op.
                if let Some(target) = self.target.take() {
                    target.detach();
                }
            }
            CanvasState::Uninitialized | CanvasState::TornDown => {}
        }
    }
}

fn apply_update<S: MarkerSurface>(surface: &mut S, update: PinUpdate) {
    for op in update.markers {
        match op {
            MarkerOp::Create(pin) => {
                let style = MarkerStyle::for_pin(&pin);
                surface.create_marker(&pin, style);
            }
            MarkerOp::Remove(id) => surface.remove_marker(&id),
            MarkerOp::Restyle(id, style) => surface.restyle_marker(&id, style),
        }
    }
    match update.camera {
        CameraOp::Keep => {}
        CameraOp::CenterZoom { lat, lng, zoom } => surface.set_view(lat, lng, zoom),
        CameraOp::FitBounds { bounds, padding } => surface.fit_bounds(bounds, padding),
    }
}
