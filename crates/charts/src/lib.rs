//! Contour and scatter chart wrappers with interactive annotation
//!
//! Both charts share an [`Annotator`]: the drawing state machine, the
//! annotation registry operations, named events, the eagle-eye overview and
//! the colour-bar legend. The plotting library, legend renderer, pointer
//! surface and clock are reached only through the traits in [`backend`].
//!
//! Time-based work (debounced session starts, preview refreshes, highlight
//! reverts, overview updates) is drained by [`Annotator::on_animation_frame`],
//! which the host calls once per animation frame.

pub mod annotator;
pub mod backend;
pub mod color_bar;
pub mod config;
pub mod contour;
pub mod drawing;
pub mod eagle_eye;
pub mod event_bus;
pub mod event_manager;
pub mod plot;
pub mod scatter;
pub mod scheduler;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use annotator::{Annotator, ShapeRecord, DEFAULT_LOCATE_PADDING};
pub use backend::{ChartParts, Clock, LegendRenderer, PlotBackend, PointerSurface};
pub use color_bar::ColorBar;
pub use config::ChartConfig;
pub use contour::ContourChart;
pub use drawing::{DrawingMachine, DrawingSession};
pub use eagle_eye::{EagleEye, OverviewKind};
pub use event_bus::{
    EventBus, EventPayload, Listener, ListenerId, DRAWING_COMPLETE, POINT_CLICK, SELECTION_CHANGE,
};
pub use plot::Plot;
pub use scatter::ScatterChart;
