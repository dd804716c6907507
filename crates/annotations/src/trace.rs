//! Plotly trace and layout model
//!
//! `Trace` is the typed form of one plot layer. Annotation layers carry a
//! [`LayerMeta`] in `customdata` that identifies the shape, label or preview
//! they belong to. `TracePatch` and `LayoutPatch` are the partial updates sent
//! through `restyle`/`relayout`; their keys use Plotly's dotted attribute paths.

use serde::{Serialize, Serializer};
use serde_json::Value;
use shared_types::{AnnotateError, AnnotateResult, ColorScale, DataPoint, Viewport};

use crate::shape::Shape;
use crate::style::TextLabelStyle;

/// Contour z values, row-major; `None` cells are gaps
pub type Grid = Vec<Vec<Option<f64>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceType {
    #[default]
    Scatter,
    Contour,
}

/// A scalar or per-point array attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn at(&self, index: usize) -> Option<T> {
        match self {
            OneOrMany::One(value) => Some(value.clone()),
            OneOrMany::Many(values) => values.get(index).cloned(),
        }
    }
}

/// Marker colour: one CSS colour, one per point, or numeric values mapped through a colour scale
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Css(String),
    PerPoint(Vec<String>),
    Values(Vec<f64>),
    /// Per point, each entry a CSS colour or a value
    Mixed(Vec<Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkerLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<OneOrMany<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<OneOrMany<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<OneOrMany<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<MarkerLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<ColorScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Line {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothing: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillPattern {
    pub shape: String,
    pub fgcolor: String,
    pub bgcolor: String,
    pub size: f64,
    pub solidity: f64,
}

impl FillPattern {
    /// An empty glyph switches a pattern fill back to a plain colour fill
    pub fn none() -> Self {
        Self {
            shape: String::new(),
            fgcolor: String::new(),
            bgcolor: String::new(),
            size: 0.0,
            solidity: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFont {
    pub family: String,
    pub size: f64,
    pub color: String,
    pub style: String,
    pub weight: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelFont {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contours {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coloring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlabels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlines: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labelfont: Option<LabelFont>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

/// Dependent label kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    PointText,
    PolylineText,
    PolygonText,
}

/// Metadata of a label layer; `parent_id` is a back-reference only
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelMeta {
    pub id: String,
    pub parent_id: String,
    #[serde(rename = "type")]
    pub kind: LabelKind,
    pub create_time: String,
    pub style: TextLabelStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewMeta {
    #[serde(flatten)]
    pub shape: Shape,
    pub preview: bool,
}

/// What an annotation layer represents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LayerMeta {
    Shape(Shape),
    Label(LabelMeta),
    Preview(PreviewMeta),
}

/// `customdata` of a trace
#[derive(Debug, Clone, PartialEq)]
pub enum CustomData {
    /// Annotation layers carry one metadata record
    Layer(Box<LayerMeta>),
    /// Data traces carry one record per point
    Points(Vec<Value>),
}

impl Serialize for CustomData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CustomData::Layer(meta) => [meta.as_ref()].serialize(serializer),
            CustomData::Points(records) => records.serialize(serializer),
        }
    }
}

impl From<LayerMeta> for CustomData {
    fn from(meta: LayerMeta) -> Self {
        CustomData::Layer(Box::new(meta))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub trace_type: TraceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub x: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Grid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillpattern: Option<FillPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textfont: Option<TextFont>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoverinfo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showlegend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<CustomData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<ColorScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contours: Option<Contours>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
    /// Caller-supplied attributes passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Trace {
    pub fn scatter() -> Self {
        Self::default()
    }

    pub fn contour() -> Self {
        Self {
            trace_type: TraceType::Contour,
            ..Self::default()
        }
    }

    pub fn meta(&self) -> Option<&LayerMeta> {
        match &self.customdata {
            Some(CustomData::Layer(meta)) => Some(meta.as_ref()),
            _ => None,
        }
    }

    /// The persisted shape this layer renders
    pub fn shape(&self) -> Option<&Shape> {
        match self.meta() {
            Some(LayerMeta::Shape(shape)) => Some(shape),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&LabelMeta> {
        match self.meta() {
            Some(LayerMeta::Label(label)) => Some(label),
            _ => None,
        }
    }

    pub fn is_preview(&self) -> bool {
        matches!(self.meta(), Some(LayerMeta::Preview(_)))
    }

    pub fn points(&self) -> Vec<DataPoint> {
        self.x
            .iter()
            .zip(&self.y)
            .map(|(x, y)| DataPoint::new(*x, *y))
            .collect()
    }
}

/// Partial restyle of one or more traces
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TracePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Grid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(rename = "line.color", skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
    #[serde(rename = "line.width", skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(rename = "line.dash", skip_serializing_if = "Option::is_none")]
    pub line_dash: Option<String>,
    #[serde(rename = "marker.color", skip_serializing_if = "Option::is_none")]
    pub marker_color: Option<ColorSpec>,
    #[serde(rename = "marker.size", skip_serializing_if = "Option::is_none")]
    pub marker_size: Option<OneOrMany<f64>>,
    #[serde(rename = "marker.symbol", skip_serializing_if = "Option::is_none")]
    pub marker_symbol: Option<String>,
    #[serde(rename = "marker.opacity", skip_serializing_if = "Option::is_none")]
    pub marker_opacity: Option<OneOrMany<f64>>,
    #[serde(rename = "marker.line.color", skip_serializing_if = "Option::is_none")]
    pub marker_line_color: Option<ColorSpec>,
    #[serde(rename = "marker.line.width", skip_serializing_if = "Option::is_none")]
    pub marker_line_width: Option<OneOrMany<f64>>,
    #[serde(rename = "marker.colorscale", skip_serializing_if = "Option::is_none")]
    pub marker_colorscale: Option<ColorScale>,
    #[serde(rename = "marker.cmin", skip_serializing_if = "Option::is_none")]
    pub marker_cmin: Option<f64>,
    #[serde(rename = "marker.cmax", skip_serializing_if = "Option::is_none")]
    pub marker_cmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillpattern: Option<FillPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textfont: Option<TextFont>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<CustomData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<ColorScale>,
    #[serde(rename = "contours.size", skip_serializing_if = "Option::is_none")]
    pub contours_size: Option<f64>,
    #[serde(rename = "contours.start", skip_serializing_if = "Option::is_none")]
    pub contours_start: Option<f64>,
    #[serde(rename = "contours.end", skip_serializing_if = "Option::is_none")]
    pub contours_end: Option<f64>,
    #[serde(rename = "contours.coloring", skip_serializing_if = "Option::is_none")]
    pub contours_coloring: Option<String>,
    #[serde(rename = "contours.showlabels", skip_serializing_if = "Option::is_none")]
    pub contours_showlabels: Option<bool>,
    #[serde(rename = "contours.showlines", skip_serializing_if = "Option::is_none")]
    pub contours_showlines: Option<bool>,
    #[serde(rename = "contours.labelfont.color", skip_serializing_if = "Option::is_none")]
    pub contours_labelfont_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
    #[serde(rename = "colorbar.tickvals", skip_serializing_if = "Option::is_none")]
    pub colorbar_tickvals: Option<Vec<f64>>,
    #[serde(rename = "colorbar.ticktext", skip_serializing_if = "Option::is_none")]
    pub colorbar_ticktext: Option<Vec<String>>,
}

fn assign<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

impl TracePatch {
    /// Only coordinate arrays, used by the cursor refresh channel
    pub fn coordinates(points: &[DataPoint]) -> Self {
        Self {
            x: Some(points.iter().map(|p| p.x).collect()),
            y: Some(points.iter().map(|p| p.y).collect()),
            ..Self::default()
        }
    }

    pub fn opacity(opacity: f64) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    /// Every channel a shape or label layer derives from its style
    pub fn restyle_from(trace: &Trace) -> Self {
        let marker = trace.marker.as_ref();
        let line = trace.line.as_ref();
        let is_filled = trace.fill.is_some();
        Self {
            x: Some(trace.x.clone()),
            y: Some(trace.y.clone()),
            mode: trace.mode.clone(),
            opacity: trace.opacity,
            visible: Some(trace.visible.unwrap_or(true)),
            line_color: line.and_then(|l| l.color.clone()),
            line_width: line.and_then(|l| l.width),
            line_dash: line.and_then(|l| l.dash.clone()),
            marker_color: marker.and_then(|m| m.color.clone()),
            marker_size: marker.and_then(|m| m.size.clone()),
            marker_symbol: marker.and_then(|m| m.symbol.clone()),
            marker_opacity: marker.and_then(|m| m.opacity.clone()),
            fillcolor: trace.fillcolor.clone(),
            fillpattern: if is_filled {
                Some(trace.fillpattern.clone().unwrap_or_else(FillPattern::none))
            } else {
                None
            },
            text: trace.text.clone(),
            textposition: trace.textposition.clone(),
            textfont: trace.textfont.clone(),
            customdata: trace.customdata.clone(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Mirror the patch into a locally held trace
    pub fn apply_to(&self, trace: &mut Trace) {
        if let Some(x) = &self.x {
            trace.x = x.clone();
        }
        if let Some(y) = &self.y {
            trace.y = y.clone();
        }
        assign(&mut trace.z, &self.z);
        assign(&mut trace.mode, &self.mode);
        assign(&mut trace.opacity, &self.opacity);
        assign(&mut trace.visible, &self.visible);

        if self.line_color.is_some() || self.line_width.is_some() || self.line_dash.is_some() {
            let line = trace.line.get_or_insert_with(Line::default);
            assign(&mut line.color, &self.line_color);
            assign(&mut line.width, &self.line_width);
            assign(&mut line.dash, &self.line_dash);
        }

        let touches_marker = self.marker_color.is_some()
            || self.marker_size.is_some()
            || self.marker_symbol.is_some()
            || self.marker_opacity.is_some()
            || self.marker_line_color.is_some()
            || self.marker_line_width.is_some()
            || self.marker_colorscale.is_some()
            || self.marker_cmin.is_some()
            || self.marker_cmax.is_some();
        if touches_marker {
            let marker = trace.marker.get_or_insert_with(Marker::default);
            assign(&mut marker.color, &self.marker_color);
            assign(&mut marker.size, &self.marker_size);
            assign(&mut marker.symbol, &self.marker_symbol);
            assign(&mut marker.opacity, &self.marker_opacity);
            assign(&mut marker.colorscale, &self.marker_colorscale);
            assign(&mut marker.cmin, &self.marker_cmin);
            assign(&mut marker.cmax, &self.marker_cmax);
            if self.marker_line_color.is_some() || self.marker_line_width.is_some() {
                let line = marker.line.get_or_insert_with(MarkerLine::default);
                assign(&mut line.color, &self.marker_line_color);
                assign(&mut line.width, &self.marker_line_width);
            }
        }

        assign(&mut trace.fillcolor, &self.fillcolor);
        if let Some(pattern) = &self.fillpattern {
            trace.fillpattern = if pattern.shape.is_empty() {
                None
            } else {
                Some(pattern.clone())
            };
        }
        assign(&mut trace.text, &self.text);
        assign(&mut trace.textposition, &self.textposition);
        assign(&mut trace.textfont, &self.textfont);
        assign(&mut trace.customdata, &self.customdata);
        assign(&mut trace.zmin, &self.zmin);
        assign(&mut trace.zmax, &self.zmax);
        assign(&mut trace.colorscale, &self.colorscale);
        assign(&mut trace.showscale, &self.showscale);
        if self.colorbar_tickvals.is_some() || self.colorbar_ticktext.is_some() {
            let colorbar = trace
                .extra
                .entry("colorbar")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if !colorbar.is_object() {
                *colorbar = Value::Object(serde_json::Map::new());
            }
            if let Some(ticks) = &self.colorbar_tickvals {
                colorbar["tickvals"] = serde_json::json!(ticks);
                colorbar["tickmode"] = Value::from("array");
            }
            if let Some(text) = &self.colorbar_ticktext {
                colorbar["ticktext"] = serde_json::json!(text);
            }
        }

        let touches_contours = self.contours_size.is_some()
            || self.contours_start.is_some()
            || self.contours_end.is_some()
            || self.contours_coloring.is_some()
            || self.contours_showlabels.is_some()
            || self.contours_showlines.is_some()
            || self.contours_labelfont_color.is_some();
        if touches_contours {
            let contours = trace.contours.get_or_insert_with(Contours::default);
            assign(&mut contours.size, &self.contours_size);
            assign(&mut contours.start, &self.contours_start);
            assign(&mut contours.end, &self.contours_end);
            assign(&mut contours.coloring, &self.contours_coloring);
            assign(&mut contours.showlabels, &self.contours_showlabels);
            assign(&mut contours.showlines, &self.contours_showlines);
            if let Some(color) = &self.contours_labelfont_color {
                contours
                    .labelfont
                    .get_or_insert_with(LabelFont::default)
                    .color = Some(color.clone());
            }
        }
    }
}

/// Plotly `dragmode`; `Disabled` serializes as `false`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Disabled,
    Pan,
    Zoom,
    Select,
}

impl Serialize for DragMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DragMode::Disabled => serializer.serialize_bool(false),
            DragMode::Pan => serializer.serialize_str("pan"),
            DragMode::Zoom => serializer.serialize_str("zoom"),
            DragMode::Select => serializer.serialize_str("select"),
        }
    }
}

/// Plotly `hovermode`; `Disabled` serializes as `false`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverMode {
    Disabled,
    Closest,
}

impl Serialize for HoverMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HoverMode::Disabled => serializer.serialize_bool(false),
            HoverMode::Closest => serializer.serialize_str("closest"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub l: f64,
    pub r: f64,
    pub t: f64,
    pub b: f64,
}

impl Margin {
    pub fn uniform(value: f64) -> Self {
        Self {
            l: value,
            r: value,
            t: value,
            b: value,
        }
    }
}

/// Partial relayout of the plot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutPatch {
    #[serde(rename = "xaxis.range", skip_serializing_if = "Option::is_none")]
    pub x_range: Option<[f64; 2]>,
    #[serde(rename = "yaxis.range", skip_serializing_if = "Option::is_none")]
    pub y_range: Option<[f64; 2]>,
    #[serde(rename = "xaxis.autorange", skip_serializing_if = "Option::is_none")]
    pub x_autorange: Option<bool>,
    #[serde(rename = "yaxis.autorange", skip_serializing_if = "Option::is_none")]
    pub y_autorange: Option<bool>,
    #[serde(rename = "xaxis.fixedrange", skip_serializing_if = "Option::is_none")]
    pub x_fixedrange: Option<bool>,
    #[serde(rename = "yaxis.fixedrange", skip_serializing_if = "Option::is_none")]
    pub y_fixedrange: Option<bool>,
    #[serde(rename = "xaxis.constrain", skip_serializing_if = "Option::is_none")]
    pub x_constrain: Option<String>,
    #[serde(rename = "yaxis.constrain", skip_serializing_if = "Option::is_none")]
    pub y_constrain: Option<String>,
    #[serde(rename = "yaxis.scaleanchor", skip_serializing_if = "Option::is_none")]
    pub y_scaleanchor: Option<String>,
    #[serde(rename = "yaxis.scaleratio", skip_serializing_if = "Option::is_none")]
    pub y_scaleratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dragmode: Option<DragMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovermode: Option<HoverMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<Margin>,
    #[serde(rename = "shapes[0].x0", skip_serializing_if = "Option::is_none")]
    pub rect_x0: Option<f64>,
    #[serde(rename = "shapes[0].x1", skip_serializing_if = "Option::is_none")]
    pub rect_x1: Option<f64>,
    #[serde(rename = "shapes[0].y0", skip_serializing_if = "Option::is_none")]
    pub rect_y0: Option<f64>,
    #[serde(rename = "shapes[0].y1", skip_serializing_if = "Option::is_none")]
    pub rect_y1: Option<f64>,
}

impl LayoutPatch {
    pub fn ranges(viewport: &Viewport) -> Self {
        Self {
            x_range: Some(viewport.x.as_array()),
            y_range: Some(viewport.y.as_array()),
            ..Self::default()
        }
    }

    /// 1:1 data aspect between the axes
    pub fn scale_lock() -> Self {
        Self {
            y_scaleanchor: Some("x".to_string()),
            y_scaleratio: Some(1.0),
            x_constrain: Some("domain".to_string()),
            y_constrain: Some("domain".to_string()),
            ..Self::default()
        }
    }

    /// Freeze the view at `viewport` while a drawing session runs
    pub fn drawing_lock(viewport: Option<&Viewport>) -> Self {
        let mut patch = Self::scale_lock();
        if let Some(viewport) = viewport {
            patch.x_range = Some(viewport.x.as_array());
            patch.y_range = Some(viewport.y.as_array());
        }
        patch.dragmode = Some(DragMode::Disabled);
        patch.hovermode = Some(HoverMode::Disabled);
        patch.x_fixedrange = Some(true);
        patch.y_fixedrange = Some(true);
        patch
    }

    /// Undo [`LayoutPatch::drawing_lock`]
    pub fn interaction_restore() -> Self {
        Self {
            dragmode: Some(DragMode::Pan),
            hovermode: Some(HoverMode::Closest),
            x_fixedrange: Some(false),
            y_fixedrange: Some(false),
            ..Self::default()
        }
    }

    /// Bounds of the first layout shape (the eagle-eye rectangle)
    pub fn rect(viewport: &Viewport) -> Self {
        Self {
            rect_x0: Some(viewport.x.min),
            rect_x1: Some(viewport.x.max),
            rect_y0: Some(viewport.y.min),
            rect_y1: Some(viewport.y.max),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Mirror the patch into a locally held layout object
    pub fn apply_to(&self, layout: &mut Value) -> AnnotateResult<()> {
        let Value::Object(entries) = serde_json::to_value(self)? else {
            return Err(AnnotateError::Serialization {
                message: "layout patch did not serialize to an object".to_string(),
            });
        };
        for (path, value) in entries {
            set_path(layout, &path, value)?;
        }
        Ok(())
    }
}

/// Set a dotted Plotly attribute path such as `shapes[0].x0` or `xaxis.range`
pub fn set_path(root: &mut Value, path: &str, value: Value) -> AnnotateResult<()> {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        let (key, index) = parse_segment(segment)?;

        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = current else {
            unreachable!("just replaced with an object")
        };

        match index {
            None if last => {
                map.insert(key.to_string(), value);
                return Ok(());
            }
            None => {
                current = map
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(serde_json::Map::new()));
            }
            Some(index) => {
                let slot = map
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                let Value::Array(items) = slot else {
                    unreachable!("just replaced with an array")
                };
                if items.len() <= index {
                    items.resize(index + 1, Value::Object(serde_json::Map::new()));
                }
                if last {
                    items[index] = value;
                    return Ok(());
                }
                current = &mut items[index];
            }
        }
    }
    Ok(())
}

fn parse_segment(segment: &str) -> AnnotateResult<(&str, Option<usize>)> {
    match segment.split_once('[') {
        None => Ok((segment, None)),
        Some((key, rest)) => {
            let index = rest
                .strip_suffix(']')
                .and_then(|digits| digits.parse::<usize>().ok())
                .ok_or_else(|| AnnotateError::invalid(format!("bad attribute path segment {segment}")))?;
            Ok((key, Some(index)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::AxisRange;

    #[test]
    fn test_patch_serializes_dotted_keys() {
        let patch = TracePatch {
            line_color: Some("red".to_string()),
            line_width: Some(4.0),
            ..TracePatch::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, json!({ "line.color": "red", "line.width": 4.0 }));
    }

    #[test]
    fn test_patch_apply_mirrors_nested_fields() {
        let mut trace = Trace::scatter();
        let patch = TracePatch {
            marker_line_width: Some(OneOrMany::Many(vec![1.0, 2.0])),
            contours_size: Some(5.0),
            ..TracePatch::default()
        };
        patch.apply_to(&mut trace);

        let marker_line = trace.marker.unwrap().line.unwrap();
        assert_eq!(marker_line.width, Some(OneOrMany::Many(vec![1.0, 2.0])));
        assert_eq!(trace.contours.unwrap().size, Some(5.0));
    }

    #[test]
    fn test_drawing_lock_layout() {
        let viewport = Viewport::new(AxisRange::new(0.0, 10.0), AxisRange::new(-5.0, 5.0));
        let value = serde_json::to_value(LayoutPatch::drawing_lock(Some(&viewport))).unwrap();

        assert_eq!(value["dragmode"], json!(false));
        assert_eq!(value["hovermode"], json!(false));
        assert_eq!(value["xaxis.fixedrange"], json!(true));
        assert_eq!(value["xaxis.range"], json!([0.0, 10.0]));
        assert_eq!(value["yaxis.scaleanchor"], json!("x"));
    }

    #[test]
    fn test_layout_apply_sets_paths() {
        let mut layout = json!({ "xaxis": { "title": "x" }, "shapes": [{ "type": "rect" }] });
        let viewport = Viewport::new(AxisRange::new(1.0, 2.0), AxisRange::new(3.0, 4.0));
        LayoutPatch::rect(&viewport).apply_to(&mut layout).unwrap();
        LayoutPatch::ranges(&viewport).apply_to(&mut layout).unwrap();

        assert_eq!(layout["shapes"][0]["type"], "rect");
        assert_eq!(layout["shapes"][0]["x1"], 2.0);
        assert_eq!(layout["xaxis"]["title"], "x");
        assert_eq!(layout["yaxis"]["range"], json!([3.0, 4.0]));
    }

    #[test]
    fn test_bad_path_segment() {
        let mut layout = json!({});
        assert!(set_path(&mut layout, "shapes[x].x0", json!(1)).is_err());
    }
}
