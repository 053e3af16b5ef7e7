//! Window binding collaborator
//!
//! The compositor exports the video surface under an identifier that arrives
//! asynchronously after the window is created. Sessions only read that
//! identifier; the output region is forwarded to whatever sink the display
//! layer installed.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Axis-aligned rectangle in compositor coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    /// Left edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
    /// Right edge
    pub x2: f32,
    /// Bottom edge
    pub y2: f32,
}

impl Rect {
    /// Rectangle from two corners
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Width
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Height
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Compositor-side receiver of crop/placement regions
pub trait OutputRegionSink: Send + Sync {
    /// Apply the regions; `false` when the surface rejected them
    fn set_crop_region(&self, origin: Rect, source: Rect, destination: Rect) -> bool;
}

#[derive(Default)]
struct BindingState {
    window_handle: String,
    sink: Option<Arc<dyn OutputRegionSink>>,
}

/// Thread-safe holder of the exported window handle
#[derive(Clone, Default)]
pub struct WindowBinding {
    state: Arc<RwLock<BindingState>>,
}

impl WindowBinding {
    /// Unbound binding
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identifier assigned by the compositor
    pub fn bind(&self, window_handle: impl Into<String>) {
        let window_handle = window_handle.into();
        debug!(window = %window_handle, "video surface exported");
        self.state.write().window_handle = window_handle;
    }

    /// Install the compositor surface that receives output regions
    pub fn attach_surface(&self, sink: Arc<dyn OutputRegionSink>) {
        self.state.write().sink = Some(sink);
    }

    /// Current handle; empty until the compositor assigned one
    pub fn window_handle(&self) -> String {
        self.state.read().window_handle.clone()
    }

    /// Whether a handle has been assigned
    pub fn is_bound(&self) -> bool {
        !self.state.read().window_handle.is_empty()
    }

    /// Place the video output; `false` when no compositor surface is available
    pub fn set_output_region(&self, origin: Rect, source: Rect, destination: Rect) -> bool {
        let sink = self.state.read().sink.clone();
        match sink {
            Some(sink) => {
                info!(?origin, ?source, ?destination, "setting exported window region");
                sink.set_crop_region(origin, source, destination)
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for WindowBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("WindowBinding")
            .field("window_handle", &state.window_handle)
            .field("has_surface", &state.sink.is_some())
            .finish()
    }
}
