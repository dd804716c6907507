//! Annotation model for the plot annotator
//!
//! Shapes (points, polylines, polygons and text), their resolved styles, the
//! memoizing factory, the Plotly layer model and the registry planning used
//! to locate, restyle, hide and delete persisted annotations. Nothing in this
//! crate talks to a plotting library; charts apply the planned updates.

pub mod factory;
pub mod registry;
pub mod sampling;
pub mod shape;
pub mod style;
pub mod trace;

pub use factory::ShapeFactory;
pub use registry::VisibilityFlags;
pub use sampling::decimate;
pub use shape::{centroid, generate_shape_id, PropertiesUpdate, RenderLayers, Shape};
pub use style::{ShapeStyle, StylePatch};
pub use trace::{Grid, LayerMeta, LayoutPatch, Trace, TracePatch};
