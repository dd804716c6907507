//! Annotation shape entity and its conversion to plot layers

use serde::{Deserialize, Serialize, Serializer};
use shared_types::{now_timestamp, AnnotateResult, DataPoint, ShapeKind};
use uuid::Uuid;

use crate::style::{FillKind, ShapeStyle, StylePatch, TextLabelStyle};
use crate::trace::{
    ColorSpec, FillPattern, LabelKind, LabelMeta, LayerMeta, Line, Marker, OneOrMany, PreviewMeta,
    TextFont, Trace,
};

pub const DEFAULT_STATUS: &str = "active";

/// Fresh shape id, `shape_<uuid>`
pub fn generate_shape_id() -> String {
    format!("shape_{}", Uuid::new_v4())
}

/// Mean of the points. Polylines need two points and polygons three,
/// anything smaller yields the origin.
pub fn centroid(kind: ShapeKind, points: &[DataPoint]) -> DataPoint {
    let required = match kind {
        ShapeKind::Polyline => 2,
        ShapeKind::Polygon => 3,
        ShapeKind::Point | ShapeKind::Text => 1,
    };
    if points.len() < required {
        return DataPoint::default();
    }
    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    DataPoint::new(sum_x / n, sum_y / n)
}

/// Primary layer plus the optional dependent label layer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderLayers {
    pub primary: Trace,
    pub label: Option<Trace>,
}

impl RenderLayers {
    pub fn into_traces(self) -> Vec<Trace> {
        let mut traces = vec![self.primary];
        traces.extend(self.label);
        traces
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    id: String,
    name: Option<String>,
    create_time: String,
    status: String,
    note: String,
    style: ShapeStyle,
}

/// Snapshot returned by `get_shape_properties` and carried in layer metadata
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProperties<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    pub style: &'a ShapeStyle,
    pub create_time: &'a str,
    pub status: &'a str,
    pub note: &'a str,
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.properties().serialize(serializer)
    }
}

/// Caller-editable fields of a stored shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertiesUpdate {
    pub name: Option<String>,
    pub status: Option<String>,
    pub note: Option<String>,
    pub style: Option<serde_json::Value>,
}

impl Shape {
    pub fn new(id: impl Into<String>, style: ShapeStyle) -> Self {
        Self {
            id: id.into(),
            name: None,
            create_time: now_timestamp(),
            status: DEFAULT_STATUS.to_string(),
            note: String::new(),
            style,
        }
    }

    /// Shape built from a kind-checked patch over the defaults
    pub fn from_patch(id: impl Into<String>, patch: &StylePatch) -> Self {
        Self::new(id, ShapeStyle::resolve(patch))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Keep a creation time recorded elsewhere (shapes restored from caller data)
    pub fn with_create_time(mut self, create_time: impl Into<String>) -> Self {
        self.create_time = create_time.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ShapeKind {
        self.style.kind()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn create_time(&self) -> &str {
        &self.create_time
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }

    pub fn properties(&self) -> ShapeProperties<'_> {
        ShapeProperties {
            id: &self.id,
            kind: self.kind(),
            name: self.name.as_deref(),
            style: &self.style,
            create_time: &self.create_time,
            status: &self.status,
            note: &self.note,
        }
    }

    /// Merge a patch of this shape's kind
    pub fn update_style(&mut self, patch: &StylePatch) -> AnnotateResult<()> {
        self.style.apply(patch)
    }

    /// Merge name, note, status and an optional style patch. Nothing changes
    /// when the style patch does not parse.
    pub fn update_properties(&mut self, update: &PropertiesUpdate) -> AnnotateResult<()> {
        let patch = match &update.style {
            Some(value) => Some(StylePatch::from_value(self.kind(), value)?),
            None => None,
        };
        if let Some(patch) = &patch {
            self.style.apply(patch)?;
        }
        if let Some(name) = &update.name {
            self.name = Some(name.clone());
        }
        if let Some(status) = &update.status {
            self.status = status.clone();
        }
        if let Some(note) = &update.note {
            self.note = note.clone();
        }
        Ok(())
    }

    pub fn label_id(&self) -> String {
        format!("{}_text", self.id)
    }

    /// Convert ordered points to plot layers
    pub fn to_renderable(&self, points: &[DataPoint]) -> RenderLayers {
        RenderLayers {
            primary: self.primary_layer(points),
            label: self.label_layer(points),
        }
    }

    /// In-progress layer shown while drawing; never treated as persisted
    pub fn preview_layer(&self, points: &[DataPoint]) -> Trace {
        let mut trace = self.primary_layer(points);
        trace.customdata = Some(
            LayerMeta::Preview(PreviewMeta {
                shape: self.clone(),
                preview: true,
            })
            .into(),
        );
        trace
    }

    /// Render coordinates, closing polygon paths
    pub fn path(&self, points: &[DataPoint]) -> (Vec<f64>, Vec<f64>) {
        let mut xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let mut ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        if self.kind() == ShapeKind::Polygon {
            if let Some(first) = points.first() {
                xs.push(first.x);
                ys.push(first.y);
            }
        }
        (xs, ys)
    }

    fn primary_layer(&self, points: &[DataPoint]) -> Trace {
        let (x, y) = self.path(points);
        let mut trace = Trace {
            x,
            y,
            hoverinfo: Some("none".to_string()),
            customdata: Some(LayerMeta::Shape(self.clone()).into()),
            ..Trace::scatter()
        };

        match &self.style {
            ShapeStyle::Point(style) => {
                trace.mode = Some("markers".to_string());
                trace.marker = Some(Marker {
                    color: Some(ColorSpec::Css(style.color.clone())),
                    size: Some(OneOrMany::One(style.size)),
                    symbol: Some(style.symbol.clone()),
                    opacity: Some(OneOrMany::One(style.opacity)),
                    ..Marker::default()
                });
            }
            ShapeStyle::Polyline(style) => {
                trace.mode = Some(stroke_mode(style.marker.show));
                trace.line = Some(Line {
                    color: Some(style.color.clone()),
                    width: Some(style.width),
                    dash: Some(style.line_type.as_str().to_string()),
                    smoothing: None,
                });
                trace.opacity = Some(style.opacity);
                if style.marker.show {
                    trace.marker = Some(vertex_marker(&style.marker));
                }
            }
            ShapeStyle::Polygon(style) => {
                trace.mode = Some(stroke_mode(style.marker.show));
                trace.fill = Some("toself".to_string());
                trace.line = Some(Line {
                    color: Some(style.line_style.color.clone()),
                    width: Some(style.line_style.width),
                    dash: Some(style.line_style.line_type.as_str().to_string()),
                    smoothing: None,
                });
                let fill = &style.fill_style;
                match fill.kind {
                    FillKind::Pattern => {
                        trace.fillpattern = Some(FillPattern {
                            shape: fill.pattern.clone(),
                            fgcolor: fill.fgcolor.clone(),
                            bgcolor: fill.bgcolor.clone(),
                            size: fill.size,
                            solidity: fill.solidity,
                        });
                    }
                    FillKind::Color => {
                        trace.fillcolor = Some(fill.color.clone());
                    }
                }
                trace.opacity = Some(fill.layer_opacity());
                if style.marker.show {
                    trace.marker = Some(vertex_marker(&style.marker));
                }
            }
            ShapeStyle::Text(style) => {
                trace.mode = Some("text".to_string());
                trace.text = Some(vec![style.text.clone(); points.len()]);
                trace.textposition = Some(style.text_position());
                trace.textfont = Some(TextFont {
                    family: style.font_family.clone(),
                    size: style.size,
                    color: style.color.clone(),
                    style: style.font_style.clone(),
                    weight: style.font_weight.clone(),
                });
                trace.opacity = Some(style.opacity);
            }
        }
        trace
    }

    /// Dependent label layer, when the label group is shown with content
    pub fn label_layer(&self, points: &[DataPoint]) -> Option<Trace> {
        let label_style = self.style.text_label()?;
        if !label_style.is_rendered() || points.is_empty() {
            return None;
        }

        let (x, y, text, position, kind) = match &self.style {
            ShapeStyle::Point(style) => {
                let offset = style.size / 10.0;
                (
                    points.iter().map(|p| p.x).collect(),
                    points.iter().map(|p| p.y + offset).collect(),
                    vec![label_style.content.clone(); points.len()],
                    "top center",
                    LabelKind::PointText,
                )
            }
            ShapeStyle::Polyline(_) | ShapeStyle::Polygon(_) => {
                let center = centroid(self.kind(), points);
                let kind = if self.kind() == ShapeKind::Polygon {
                    LabelKind::PolygonText
                } else {
                    LabelKind::PolylineText
                };
                (
                    vec![center.x],
                    vec![center.y],
                    vec![label_style.content.clone()],
                    "middle center",
                    kind,
                )
            }
            ShapeStyle::Text(_) => return None,
        };

        Some(Trace {
            x,
            y,
            mode: Some("text".to_string()),
            text: Some(text),
            textposition: Some(position.to_string()),
            textfont: Some(label_font(label_style)),
            hoverinfo: Some("none".to_string()),
            showlegend: Some(false),
            customdata: Some(
                LayerMeta::Label(LabelMeta {
                    id: self.label_id(),
                    parent_id: self.id.clone(),
                    kind,
                    create_time: self.create_time.clone(),
                    style: label_style.clone(),
                })
                .into(),
            ),
            ..Trace::scatter()
        })
    }
}

fn stroke_mode(show_markers: bool) -> String {
    if show_markers {
        "lines+markers".to_string()
    } else {
        "lines".to_string()
    }
}

fn vertex_marker(style: &crate::style::MarkerStyle) -> Marker {
    Marker {
        color: Some(ColorSpec::Css(style.color.clone())),
        size: Some(OneOrMany::One(style.size)),
        symbol: Some(style.symbol.clone()),
        opacity: Some(OneOrMany::One(style.opacity)),
        ..Marker::default()
    }
}

pub fn label_font(style: &TextLabelStyle) -> TextFont {
    TextFont {
        family: style.font_family.clone(),
        size: style.size,
        color: style.color.clone(),
        style: style.font_style.clone(),
        weight: style.font_weight.clone(),
    }
}
