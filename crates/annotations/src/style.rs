//! Resolved per-kind style structs and their partial patches
//!
//! Every resolved style is fully populated: construction starts from the
//! defaults, applies derived defaults (marker and pattern colours follow the
//! line colour) and then merges the caller's patch. Patches mirror the style
//! layout with every field optional; nested groups merge field by field.

use serde::{Deserialize, Serialize};
use shared_types::{AnnotateError, AnnotateResult, ShapeKind};

/// Structural fingerprint of a resolved style, used as a cache key.
/// Floats are compared by bit pattern so the key is `Eq + Hash`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<KeyField>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyField {
    Num(u64),
    Text(String),
    Flag(bool),
}

impl Fingerprint {
    fn num(&mut self, value: f64) {
        self.0.push(KeyField::Num(value.to_bits()));
    }

    fn text(&mut self, value: &str) {
        self.0.push(KeyField::Text(value.to_string()));
    }

    fn flag(&mut self, value: bool) {
        self.0.push(KeyField::Flag(value));
    }
}

pub trait StyleFingerprint {
    fn fingerprint_into(&self, out: &mut Fingerprint);

    fn fingerprint(&self) -> Fingerprint {
        let mut out = Fingerprint::default();
        self.fingerprint_into(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    #[default]
    Solid,
    Dash,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Solid => "solid",
            LineType::Dash => "dash",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillKind {
    #[default]
    Color,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl HorizontalAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalAlign::Left => "left",
            HorizontalAlign::Center => "center",
            HorizontalAlign::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalBaseline {
    #[default]
    Top,
    Middle,
    Bottom,
}

impl VerticalBaseline {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalBaseline::Top => "top",
            VerticalBaseline::Middle => "middle",
            VerticalBaseline::Bottom => "bottom",
        }
    }
}

fn merge<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

// ---------------------------------------------------------------------------
// Shared groups
// ---------------------------------------------------------------------------

/// Floating text label owned by a point, polyline or polygon
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLabelStyle {
    pub show: bool,
    pub content: String,
    pub color: String,
    pub size: f64,
    pub font_family: String,
    pub font_style: String,
    pub font_weight: String,
}

impl Default for TextLabelStyle {
    fn default() -> Self {
        Self {
            show: true,
            content: String::new(),
            color: "#000000".to_string(),
            size: 12.0,
            font_family: "Arial".to_string(),
            font_style: "normal".to_string(),
            font_weight: "normal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextLabelPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
}

impl TextLabelStyle {
    pub fn apply(&mut self, patch: &TextLabelPatch) {
        merge(&mut self.show, &patch.show);
        merge(&mut self.content, &patch.content);
        merge(&mut self.color, &patch.color);
        merge(&mut self.size, &patch.size);
        merge(&mut self.font_family, &patch.font_family);
        merge(&mut self.font_style, &patch.font_style);
        merge(&mut self.font_weight, &patch.font_weight);
    }

    /// A label layer exists only for visible, non-empty content
    pub fn is_rendered(&self) -> bool {
        self.show && !self.content.is_empty()
    }
}

impl StyleFingerprint for TextLabelStyle {
    fn fingerprint_into(&self, out: &mut Fingerprint) {
        out.flag(self.show);
        out.text(&self.content);
        out.text(&self.color);
        out.num(self.size);
        out.text(&self.font_family);
        out.text(&self.font_style);
        out.text(&self.font_weight);
    }
}

/// Vertex markers on polylines and polygons
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerStyle {
    pub show: bool,
    pub color: String,
    pub size: f64,
    pub symbol: String,
    pub opacity: f64,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            show: true,
            color: DEFAULT_LINE_COLOR.to_string(),
            size: 8.0,
            symbol: "circle".to_string(),
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl MarkerStyle {
    pub fn apply(&mut self, patch: &MarkerPatch) {
        merge(&mut self.show, &patch.show);
        merge(&mut self.color, &patch.color);
        merge(&mut self.size, &patch.size);
        merge(&mut self.symbol, &patch.symbol);
        merge(&mut self.opacity, &patch.opacity);
    }
}

impl StyleFingerprint for MarkerStyle {
    fn fingerprint_into(&self, out: &mut Fingerprint) {
        out.flag(self.show);
        out.text(&self.color);
        out.num(self.size);
        out.text(&self.symbol);
        out.num(self.opacity);
    }
}

pub const DEFAULT_LINE_COLOR: &str = "#F4F065";
pub const DEFAULT_FILL_COLOR: &str = "#CAEA37";

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub opacity: f64,
    pub symbol: String,
    pub text: TextLabelStyle,
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            color: "red".to_string(),
            size: 12.0,
            opacity: 1.0,
            symbol: "circle".to_string(),
            text: TextLabelStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointStylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextLabelPatch>,
}

impl PointStyle {
    pub fn resolve(patch: &PointStylePatch) -> Self {
        let mut style = Self::default();
        style.apply(patch);
        style
    }

    pub fn apply(&mut self, patch: &PointStylePatch) {
        merge(&mut self.color, &patch.color);
        merge(&mut self.size, &patch.size);
        merge(&mut self.opacity, &patch.opacity);
        merge(&mut self.symbol, &patch.symbol);
        if let Some(text) = &patch.text {
            self.text.apply(text);
        }
    }
}

impl StyleFingerprint for PointStyle {
    fn fingerprint_into(&self, out: &mut Fingerprint) {
        out.text(&self.color);
        out.num(self.size);
        out.num(self.opacity);
        out.text(&self.symbol);
        self.text.fingerprint_into(out);
    }
}

// ---------------------------------------------------------------------------
// Polyline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylineStyle {
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    pub line_type: LineType,
    pub marker: MarkerStyle,
    pub text: TextLabelStyle,
}

impl Default for PolylineStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_LINE_COLOR.to_string(),
            width: 2.0,
            opacity: 1.0,
            line_type: LineType::Solid,
            marker: MarkerStyle::default(),
            text: TextLabelStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolylineStylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Drawing options spell this `type`, stored styles `lineType`
    #[serde(alias = "type", skip_serializing_if = "Option::is_none")]
    pub line_type: Option<LineType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextLabelPatch>,
}

impl PolylineStyle {
    pub fn resolve(patch: &PolylineStylePatch) -> Self {
        let mut style = Self::default();
        style.apply(patch);
        let marker_color_given = patch
            .marker
            .as_ref()
            .is_some_and(|marker| marker.color.is_some());
        if !marker_color_given {
            style.marker.color = style.color.clone();
        }
        style
    }

    pub fn apply(&mut self, patch: &PolylineStylePatch) {
        merge(&mut self.color, &patch.color);
        merge(&mut self.width, &patch.width);
        merge(&mut self.opacity, &patch.opacity);
        merge(&mut self.line_type, &patch.line_type);
        if let Some(marker) = &patch.marker {
            self.marker.apply(marker);
        }
        if let Some(text) = &patch.text {
            self.text.apply(text);
        }
    }
}

impl StyleFingerprint for PolylineStyle {
    fn fingerprint_into(&self, out: &mut Fingerprint) {
        out.text(&self.color);
        out.num(self.width);
        out.num(self.opacity);
        out.text(self.line_type.as_str());
        self.marker.fingerprint_into(out);
        self.text.fingerprint_into(out);
    }
}

// ---------------------------------------------------------------------------
// Polygon
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStyle {
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    #[serde(rename = "type")]
    pub line_type: LineType,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_LINE_COLOR.to_string(),
            width: 2.0,
            opacity: 1.0,
            line_type: LineType::Solid,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineStylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub line_type: Option<LineType>,
}

impl LineStyle {
    pub fn apply(&mut self, patch: &LineStylePatch) {
        merge(&mut self.color, &patch.color);
        merge(&mut self.width, &patch.width);
        merge(&mut self.opacity, &patch.opacity);
        merge(&mut self.line_type, &patch.line_type);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillStyle {
    #[serde(rename = "type")]
    pub kind: FillKind,
    pub color: String,
    pub opacity: f64,
    pub pattern: String,
    pub fgcolor: String,
    pub bgcolor: String,
    pub size: f64,
    pub solidity: f64,
}

impl Default for FillStyle {
    fn default() -> Self {
        Self {
            kind: FillKind::Color,
            color: DEFAULT_FILL_COLOR.to_string(),
            opacity: 0.6,
            pattern: "+".to_string(),
            fgcolor: DEFAULT_LINE_COLOR.to_string(),
            bgcolor: "white".to_string(),
            size: 8.0,
            solidity: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FillStylePatch {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FillKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fgcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgcolor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solidity: Option<f64>,
}

impl FillStyle {
    pub fn apply(&mut self, patch: &FillStylePatch) {
        merge(&mut self.kind, &patch.kind);
        merge(&mut self.color, &patch.color);
        merge(&mut self.opacity, &patch.opacity);
        merge(&mut self.pattern, &patch.pattern);
        merge(&mut self.fgcolor, &patch.fgcolor);
        merge(&mut self.bgcolor, &patch.bgcolor);
        merge(&mut self.size, &patch.size);
        merge(&mut self.solidity, &patch.solidity);
    }

    /// Opacity the filled layer shows at: pattern fills are always opaque
    pub fn layer_opacity(&self) -> f64 {
        match self.kind {
            FillKind::Pattern => 1.0,
            FillKind::Color => self.opacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonStyle {
    pub line_style: LineStyle,
    pub fill_style: FillStyle,
    pub marker: MarkerStyle,
    pub text: TextLabelStyle,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self {
            line_style: LineStyle::default(),
            fill_style: FillStyle::default(),
            marker: MarkerStyle::default(),
            text: TextLabelStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolygonStylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_style: Option<LineStylePatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_style: Option<FillStylePatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextLabelPatch>,
}

impl PolygonStyle {
    pub fn resolve(patch: &PolygonStylePatch) -> Self {
        let mut style = Self::default();
        style.apply(patch);

        let line_color = style.line_style.color.clone();
        let marker = patch.marker.as_ref();
        if !marker.is_some_and(|m| m.color.is_some()) {
            style.marker.color = line_color.clone();
        }

        let fill = patch.fill_style.as_ref();
        if !fill.is_some_and(|f| f.fgcolor.is_some()) {
            style.fill_style.fgcolor = line_color;
        }
        // Fill colour falls back to the background colour before the default
        if !fill.is_some_and(|f| f.color.is_some()) {
            if let Some(bgcolor) = fill.and_then(|f| f.bgcolor.clone()) {
                style.fill_style.color = bgcolor;
            }
        }
        style
    }

    pub fn apply(&mut self, patch: &PolygonStylePatch) {
        if let Some(line) = &patch.line_style {
            self.line_style.apply(line);
        }
        if let Some(fill) = &patch.fill_style {
            self.fill_style.apply(fill);
        }
        if let Some(marker) = &patch.marker {
            self.marker.apply(marker);
        }
        if let Some(text) = &patch.text {
            self.text.apply(text);
        }
    }
}

impl StyleFingerprint for PolygonStyle {
    fn fingerprint_into(&self, out: &mut Fingerprint) {
        let line = &self.line_style;
        out.text(&line.color);
        out.num(line.width);
        out.num(line.opacity);
        out.text(line.line_type.as_str());

        let fill = &self.fill_style;
        out.flag(fill.kind == FillKind::Pattern);
        out.text(&fill.color);
        out.num(fill.opacity);
        out.text(&fill.pattern);
        out.text(&fill.fgcolor);
        out.text(&fill.bgcolor);
        out.num(fill.size);
        out.num(fill.solidity);

        self.marker.fingerprint_into(out);
        self.text.fingerprint_into(out);
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub text: String,
    pub color: String,
    pub size: f64,
    pub font_family: String,
    pub font_style: String,
    pub font_weight: String,
    pub opacity: f64,
    pub align: HorizontalAlign,
    pub baseline: VerticalBaseline,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            text: "Text".to_string(),
            color: "#000000".to_string(),
            size: 16.0,
            font_family: "Arial".to_string(),
            font_style: "normal".to_string(),
            font_weight: "normal".to_string(),
            opacity: 1.0,
            align: HorizontalAlign::Left,
            baseline: VerticalBaseline::Top,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextStylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<HorizontalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<VerticalBaseline>,
}

impl TextStyle {
    pub fn resolve(patch: &TextStylePatch) -> Self {
        let mut style = Self::default();
        style.apply(patch);
        style
    }

    pub fn apply(&mut self, patch: &TextStylePatch) {
        merge(&mut self.text, &patch.text);
        merge(&mut self.color, &patch.color);
        merge(&mut self.size, &patch.size);
        merge(&mut self.font_family, &patch.font_family);
        merge(&mut self.font_style, &patch.font_style);
        merge(&mut self.font_weight, &patch.font_weight);
        merge(&mut self.opacity, &patch.opacity);
        merge(&mut self.align, &patch.align);
        merge(&mut self.baseline, &patch.baseline);
    }

    /// Plotly `textposition`, vertical part first
    pub fn text_position(&self) -> String {
        format!("{} {}", self.baseline.as_str(), self.align.as_str())
    }
}

impl StyleFingerprint for TextStyle {
    fn fingerprint_into(&self, out: &mut Fingerprint) {
        out.text(&self.text);
        out.text(&self.color);
        out.num(self.size);
        out.text(&self.font_family);
        out.text(&self.font_style);
        out.text(&self.font_weight);
        out.num(self.opacity);
        out.text(self.align.as_str());
        out.text(self.baseline.as_str());
    }
}

// ---------------------------------------------------------------------------
// Kind-erased patch
// ---------------------------------------------------------------------------

/// A style patch for one specific shape kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StylePatch {
    Point(PointStylePatch),
    Polyline(PolylineStylePatch),
    Polygon(PolygonStylePatch),
    Text(TextStylePatch),
}

impl StylePatch {
    /// Parse caller JSON as a patch of the given kind. `null` is an empty patch.
    pub fn from_value(kind: ShapeKind, value: &serde_json::Value) -> AnnotateResult<Self> {
        let value = if value.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            value.clone()
        };
        let patch = match kind {
            ShapeKind::Point => StylePatch::Point(serde_json::from_value(value)?),
            ShapeKind::Polyline => StylePatch::Polyline(serde_json::from_value(value)?),
            ShapeKind::Polygon => StylePatch::Polygon(serde_json::from_value(value)?),
            ShapeKind::Text => StylePatch::Text(serde_json::from_value(value)?),
        };
        Ok(patch)
    }

    pub fn empty(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Point => StylePatch::Point(PointStylePatch::default()),
            ShapeKind::Polyline => StylePatch::Polyline(PolylineStylePatch::default()),
            ShapeKind::Polygon => StylePatch::Polygon(PolygonStylePatch::default()),
            ShapeKind::Text => StylePatch::Text(TextStylePatch::default()),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            StylePatch::Point(_) => ShapeKind::Point,
            StylePatch::Polyline(_) => ShapeKind::Polyline,
            StylePatch::Polygon(_) => ShapeKind::Polygon,
            StylePatch::Text(_) => ShapeKind::Text,
        }
    }

    /// The label sub-patch, for kinds that own a label
    pub fn text_label(&self) -> Option<&TextLabelPatch> {
        match self {
            StylePatch::Point(p) => p.text.as_ref(),
            StylePatch::Polyline(p) => p.text.as_ref(),
            StylePatch::Polygon(p) => p.text.as_ref(),
            StylePatch::Text(_) => None,
        }
    }
}

/// Resolved style of one shape; the variant is the shape's kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShapeStyle {
    Point(PointStyle),
    Polyline(PolylineStyle),
    Polygon(PolygonStyle),
    Text(TextStyle),
}

impl ShapeStyle {
    /// Defaults, derived defaults, then the patch
    pub fn resolve(patch: &StylePatch) -> Self {
        match patch {
            StylePatch::Point(p) => ShapeStyle::Point(PointStyle::resolve(p)),
            StylePatch::Polyline(p) => ShapeStyle::Polyline(PolylineStyle::resolve(p)),
            StylePatch::Polygon(p) => ShapeStyle::Polygon(PolygonStyle::resolve(p)),
            StylePatch::Text(p) => ShapeStyle::Text(TextStyle::resolve(p)),
        }
    }

    pub fn default_for(kind: ShapeKind) -> Self {
        Self::resolve(&StylePatch::empty(kind))
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeStyle::Point(_) => ShapeKind::Point,
            ShapeStyle::Polyline(_) => ShapeKind::Polyline,
            ShapeStyle::Polygon(_) => ShapeKind::Polygon,
            ShapeStyle::Text(_) => ShapeKind::Text,
        }
    }

    /// Merge a patch of the same kind in place
    pub fn apply(&mut self, patch: &StylePatch) -> AnnotateResult<()> {
        match (self, patch) {
            (ShapeStyle::Point(style), StylePatch::Point(p)) => style.apply(p),
            (ShapeStyle::Polyline(style), StylePatch::Polyline(p)) => style.apply(p),
            (ShapeStyle::Polygon(style), StylePatch::Polygon(p)) => style.apply(p),
            (ShapeStyle::Text(style), StylePatch::Text(p)) => style.apply(p),
            (style, patch) => {
                return Err(AnnotateError::ShapeTypeMismatch {
                    expected: style.kind().to_string(),
                    actual: patch.kind().to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn text_label(&self) -> Option<&TextLabelStyle> {
        match self {
            ShapeStyle::Point(s) => Some(&s.text),
            ShapeStyle::Polyline(s) => Some(&s.text),
            ShapeStyle::Polygon(s) => Some(&s.text),
            ShapeStyle::Text(_) => None,
        }
    }

    /// Opacity the primary layer is restored to when shown
    pub fn display_opacity(&self) -> f64 {
        match self {
            ShapeStyle::Point(s) => s.opacity,
            ShapeStyle::Polyline(s) => s.opacity,
            ShapeStyle::Polygon(s) => s.fill_style.layer_opacity(),
            ShapeStyle::Text(s) => s.opacity,
        }
    }

    /// Stroke colour and width for shapes drawn with lines
    pub fn stroke(&self) -> Option<(&str, f64)> {
        match self {
            ShapeStyle::Polyline(s) => Some((&s.color, s.width)),
            ShapeStyle::Polygon(s) => Some((&s.line_style.color, s.line_style.width)),
            ShapeStyle::Point(_) | ShapeStyle::Text(_) => None,
        }
    }
}

impl StyleFingerprint for ShapeStyle {
    fn fingerprint_into(&self, out: &mut Fingerprint) {
        out.text(self.kind().as_str());
        match self {
            ShapeStyle::Point(s) => s.fingerprint_into(out),
            ShapeStyle::Polyline(s) => s.fingerprint_into(out),
            ShapeStyle::Polygon(s) => s.fingerprint_into(out),
            ShapeStyle::Text(s) => s.fingerprint_into(out),
        }
    }
}
