//! Collaborator seams
//!
//! The charts never talk to Plotly, d3 or the DOM directly. The browser
//! build implements these traits in the wasm-bridge crate; tests use the
//! recorders in [`crate::testing`].

use annotations::{LayoutPatch, Trace, TracePatch};
use serde_json::Value;
use shared_types::events::{PhysicalPosition, PointerEventKind};
use shared_types::{AnnotateResult, DataPoint, Viewport};

use crate::color_bar::{BandJoin, LegendFrame, PlacedBand};

/// The external plotting library bound to one container
pub trait PlotBackend {
    fn new_plot(&mut self, traces: &[Trace], layout: &Value, config: &Value) -> AnnotateResult<()>;

    /// Apply `patch` to every trace in `indices`
    fn restyle(&mut self, patch: &TracePatch, indices: &[usize]) -> AnnotateResult<()>;

    fn relayout(&mut self, patch: &LayoutPatch) -> AnnotateResult<()>;

    /// Free-form layout merge for caller supplied layout objects
    fn update_layout(&mut self, layout: &Value) -> AnnotateResult<()>;

    fn add_traces(&mut self, traces: &[Trace]) -> AnnotateResult<()>;

    /// `indices` arrive sorted descending
    fn delete_traces(&mut self, indices: &[usize]) -> AnnotateResult<()>;

    fn purge(&mut self) -> AnnotateResult<()>;

    fn resize(&mut self) -> AnnotateResult<()>;

    /// Current axis ranges, `None` before the first draw
    fn viewport(&self) -> Option<Viewport>;

    /// Plot area size in pixels
    fn container_size(&self) -> (f64, f64);

    /// Convert a container-relative pixel position to data space. `None`
    /// when the position falls outside the plot area.
    fn pixel_to_data(&self, position: PhysicalPosition) -> Option<DataPoint>;
}

/// Vector graphics host for the colour-bar legend
pub trait LegendRenderer {
    /// Host height in pixels; `None` while the host is hidden or unsized
    fn host_height(&self) -> Option<f64>;

    fn create_scene(&mut self, frame: &LegendFrame, bands: &[PlacedBand]) -> AnnotateResult<()>;

    fn apply_join(&mut self, join: &BandJoin) -> AnnotateResult<()>;

    fn remove_scene(&mut self) -> AnnotateResult<()>;
}

/// Pointer listeners and cursor style on the plot container
pub trait PointerSurface {
    fn attach(&mut self, kinds: &[PointerEventKind]) -> AnnotateResult<()>;

    fn detach(&mut self, kinds: &[PointerEventKind]);

    fn set_cursor(&mut self, cursor: &str);
}

pub trait Clock {
    /// Monotonic milliseconds
    fn now_ms(&self) -> f64;
}

/// Everything a chart needs from its host
pub struct ChartParts {
    pub backend: Box<dyn PlotBackend>,
    pub surface: Box<dyn PointerSurface>,
    pub legend: Box<dyn LegendRenderer>,
    pub clock: Box<dyn Clock>,
}
