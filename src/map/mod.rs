//! Map pins: diffing a rendered marker set against a changing event list, and
//! the lifecycle of the rendering surface that shows them.

pub mod canvas;
pub mod pins;

pub use canvas::{MapCanvas, MarkerSurface, SurfaceError, SurfaceTarget};
pub use pins::{Bounds, CameraOp, MarkerOp, MarkerStyle, Pin, PinReconciler, PinUpdate};
