//! Shared types for the plot annotator
//!
//! This crate contains the geometry, pointer-event and colour-scale types that
//! are shared between the annotation model, the chart wrappers and the
//! wasm-bridge crate.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use tsify::Tsify;

pub mod errors;
pub mod events;

pub use errors::{AnnotateError, AnnotateResult};

/// A coordinate pair in data space (never pixel space)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(Tsify))]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

impl DataPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Closed interval on one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(Tsify))]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn center(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.min, self.max]
    }
}

/// The visible data window of a plot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(Tsify))]
pub struct Viewport {
    pub x: AxisRange,
    pub y: AxisRange,
}

impl Viewport {
    pub fn new(x: AxisRange, y: AxisRange) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box over a set of data points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Bounding box of two coordinate arrays. Non-finite values are skipped;
    /// `None` when nothing finite remains.
    pub fn from_coordinates(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let (min_x, max_x) = finite_extent(xs)?;
        let (min_y, max_y) = finite_extent(ys)?;
        Some(Self {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow each side by `fraction` of the extent on that axis
    pub fn padded(&self, fraction: f64) -> Self {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        Self {
            min_x: self.min_x - dx,
            max_x: self.max_x + dx,
            min_y: self.min_y - dy,
            max_y: self.max_y + dy,
        }
    }

    pub fn to_viewport(&self) -> Viewport {
        Viewport::new(
            AxisRange::new(self.min_x, self.max_x),
            AxisRange::new(self.min_y, self.max_y),
        )
    }
}

fn finite_extent(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Annotation shape kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(Tsify))]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Point,
    Polyline,
    Polygon,
    Text,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Point => "point",
            ShapeKind::Polyline => "polyline",
            ShapeKind::Polygon => "polygon",
            ShapeKind::Text => "text",
        }
    }

    /// Kinds that are drawn with strokes and take multiple clicks
    pub fn is_multi_point(&self) -> bool {
        matches!(self, ShapeKind::Polyline | ShapeKind::Polygon)
    }

    /// Minimum committed points for a secondary click to finish the shape
    pub fn min_points(&self) -> usize {
        match self {
            ShapeKind::Point | ShapeKind::Text => 1,
            ShapeKind::Polyline | ShapeKind::Polygon => 2,
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShapeKind {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "point" => Ok(ShapeKind::Point),
            "polyline" => Ok(ShapeKind::Polyline),
            "polygon" => Ok(ShapeKind::Polygon),
            "text" => Ok(ShapeKind::Text),
            other => Err(AnnotateError::UnsupportedShapeType {
                kind: other.to_string(),
            }),
        }
    }
}

/// One band of the colour-bar legend, `[level, color]` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendBand(pub f64, pub String);

impl LegendBand {
    pub fn new(level: f64, color: impl Into<String>) -> Self {
        Self(level, color.into())
    }

    pub fn level(&self) -> f64 {
        self.0
    }

    pub fn color(&self) -> &str {
        &self.1
    }
}

/// One stop of a colour scale: normalized position and CSS colour.
/// Serializes as `[position, "color"]`, the shape Plotly expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop(pub f64, pub String);

impl ColorStop {
    pub fn new(position: f64, color: impl Into<String>) -> Self {
        Self(position, color.into())
    }

    pub fn position(&self) -> f64 {
        self.0
    }

    pub fn color(&self) -> &str {
        &self.1
    }
}

/// Ordered colour scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorScale(pub Vec<ColorStop>);

impl ColorScale {
    pub fn stops(&self) -> &[ColorStop] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A usable scale has at least two stops with finite positions
    pub fn validate(&self) -> AnnotateResult<()> {
        if self.0.len() < 2 {
            return Err(AnnotateError::InvalidInput {
                message: "colour scale needs at least two stops".to_string(),
            });
        }
        if self.0.iter().any(|stop| !stop.0.is_finite()) {
            return Err(AnnotateError::InvalidInput {
                message: "colour scale positions must be finite".to_string(),
            });
        }
        Ok(())
    }

    /// Tick values for a colourbar spanning `[zmin, zmax]`
    pub fn tick_values(&self, zmin: f64, zmax: f64) -> Vec<f64> {
        self.0
            .iter()
            .map(|stop| zmin + (zmax - zmin) * stop.0)
            .collect()
    }
}

impl Default for ColorScale {
    /// Blue to red through cyan, green and yellow
    fn default() -> Self {
        const STOPS: [(f64, &str); 20] = [
            (0.00, "rgb(0,0,255)"),
            (0.05, "rgb(0,64,255)"),
            (0.10, "rgb(0,128,255)"),
            (0.15, "rgb(0,191,255)"),
            (0.20, "rgb(0,255,255)"),
            (0.25, "rgb(0,255,191)"),
            (0.30, "rgb(0,255,128)"),
            (0.35, "rgb(0,255,64)"),
            (0.40, "rgb(0,255,0)"),
            (0.45, "rgb(64,255,0)"),
            (0.50, "rgb(128,255,0)"),
            (0.55, "rgb(191,255,0)"),
            (0.60, "rgb(255,255,0)"),
            (0.65, "rgb(255,223,0)"),
            (0.70, "rgb(255,191,0)"),
            (0.75, "rgb(255,159,0)"),
            (0.80, "rgb(255,128,0)"),
            (0.85, "rgb(255,64,0)"),
            (0.90, "rgb(255,32,0)"),
            (1.00, "rgb(255,0,0)"),
        ];
        Self(
            STOPS
                .iter()
                .map(|(position, color)| ColorStop::new(*position, *color))
                .collect(),
        )
    }
}

/// Value range of the colour mapping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub zmin: Option<f64>,
    pub zmax: Option<f64>,
}

/// Local timestamp in the `YYYY-MM-DD HH:MM:SS` form used for `createTime`
pub fn format_timestamp(time: chrono::DateTime<chrono::Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn now_timestamp() -> String {
    format_timestamp(chrono::Local::now())
}

/// Render a number the way a JS string conversion would: integral values
/// lose the fractional part (`3.0` becomes `"3"`).
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bounding_box_skips_non_finite() {
        let bbox = BoundingBox::from_coordinates(&[1.0, f64::NAN, 5.0], &[2.0, 8.0]).unwrap();
        assert_eq!(bbox.min_x, 1.0);
        assert_eq!(bbox.max_x, 5.0);
        assert_eq!(bbox.height(), 6.0);
        assert!(BoundingBox::from_coordinates(&[], &[1.0]).is_none());
    }

    #[test]
    fn test_padding() {
        let bbox = BoundingBox::from_coordinates(&[0.0, 10.0], &[0.0, 20.0])
            .unwrap()
            .padded(0.1);
        assert_eq!(bbox.min_x, -1.0);
        assert_eq!(bbox.max_y, 22.0);
    }

    #[test]
    fn test_color_scale_serialization() {
        let scale = ColorScale(vec![ColorStop::new(0.0, "blue"), ColorStop::new(1.0, "red")]);
        let json = serde_json::to_string(&scale).unwrap();
        assert_eq!(json, r#"[[0.0,"blue"],[1.0,"red"]]"#);

        let parsed: ColorScale = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scale);
        assert_eq!(scale.tick_values(0.0, 200.0), vec![0.0, 200.0]);
    }

    #[test]
    fn test_color_scale_validation() {
        assert!(ColorScale::default().validate().is_ok());
        assert_eq!(ColorScale::default().len(), 20);
        let short = ColorScale(vec![ColorStop::new(0.0, "blue")]);
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_shape_kind_parsing() {
        assert_eq!("polygon".parse::<ShapeKind>().unwrap(), ShapeKind::Polygon);
        assert_eq!(ShapeKind::Text.to_string(), "text");
        match "circle".parse::<ShapeKind>() {
            Err(AnnotateError::UnsupportedShapeType { kind }) => assert_eq!(kind, "circle"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-120.0), "-120");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[test]
    fn test_timestamp_format() {
        let time = chrono::Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(format_timestamp(time), "2024-03-07 09:05:02");
    }
}
