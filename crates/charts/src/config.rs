//! Chart configuration and caller option objects
//!
//! Everything deserializes from the camelCase JSON the JavaScript side
//! passes, with every field defaulted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{AnnotateError, AnnotateResult, ColorScale};

/// Tunables shared by both chart kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    /// Preview render buffer cap while drawing
    pub max_preview_points: usize,
    pub draw_start_debounce_ms: f64,
    pub highlight_duration_ms: f64,
    pub highlight_color: String,
    pub eagle_eye_min_interval_ms: f64,
    pub margin: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_preview_points: 1000,
            draw_start_debounce_ms: 5.0,
            highlight_duration_ms: 1000.0,
            highlight_color: "red".to_string(),
            eagle_eye_min_interval_ms: 16.0,
            margin: 50.0,
        }
    }
}

impl ChartConfig {
    pub fn from_json(json: &str) -> AnnotateResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `json`, falling back to defaults with a warning when it is invalid
    pub fn load(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Invalid chart config, using defaults: {e}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> AnnotateResult<()> {
        if self.max_preview_points < 2 {
            return Err(AnnotateError::invalid("maxPreviewPoints must be at least 2"));
        }
        let durations = [
            ("drawStartDebounceMs", self.draw_start_debounce_ms),
            ("highlightDurationMs", self.highlight_duration_ms),
            ("eagleEyeMinIntervalMs", self.eagle_eye_min_interval_ms),
            ("margin", self.margin),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(AnnotateError::invalid(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        if self.highlight_color.trim().is_empty() {
            return Err(AnnotateError::invalid("highlightColor must not be empty"));
        }
        Ok(())
    }
}

/// `{x, y, z}` grid of a contour plot
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContourData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: annotations::Grid,
    pub zmin: Option<f64>,
    pub zmax: Option<f64>,
}

impl ContourData {
    pub fn is_complete(&self) -> bool {
        !self.x.is_empty() && !self.y.is_empty() && !self.z.is_empty()
    }

    /// Finite min/max over the grid, gaps and NaN skipped
    pub fn z_extent(&self) -> Option<(f64, f64)> {
        self.z
            .iter()
            .flatten()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContourStyleOptions {
    pub colorscale: Option<ColorScale>,
    #[serde(alias = "showLines")]
    pub showlines: Option<bool>,
    pub show_labels: Option<bool>,
    pub label_size: Option<f64>,
    pub label_color: Option<String>,
    pub line_color: Option<String>,
    pub line_style: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContourInitOptions {
    pub data: ContourData,
    pub style: ContourStyleOptions,
    /// Merged over the default layout
    pub layout: Value,
}

/// Contour line switches of a colour-scale update
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContourLineConfig {
    pub show_lines: Option<bool>,
    pub color: Option<String>,
}

/// Contour label switches of a colour-scale update
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContourLabelConfig {
    pub show_labels: Option<bool>,
    pub color: Option<String>,
}

/// New colour scale with an optional new value range
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColorScaleRangeUpdate {
    pub colorscale: ColorScale,
    #[serde(default)]
    pub zmin: Option<f64>,
    #[serde(default)]
    pub zmax: Option<f64>,
}

/// Data and colour scale replaced together; a missing bound is taken from the data
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataColorScaleUpdate {
    pub data: ContourData,
    pub colorscale: ColorScale,
    #[serde(default)]
    pub zmin: Option<f64>,
    #[serde(default)]
    pub zmax: Option<f64>,
}

/// Scatter samples: coordinates, colour values, hide flags, ids and the
/// extended attribute columns
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScatterData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub v: Option<Vec<f64>>,
    /// `1` hides the sample
    pub visible: Option<Vec<i64>>,
    pub id: Vec<Value>,
    pub a: Option<Vec<Value>>,
    pub b: Option<Vec<Value>>,
    pub m: Option<Vec<Value>>,
    pub n: Option<Vec<Value>>,
    pub row: Option<Vec<Value>>,
    pub pseu: Option<Vec<Value>>,
    pub zmin: Option<f64>,
    pub zmax: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScatterStyleOptions {
    pub mode: Option<String>,
    pub marker_size: Option<f64>,
    pub colorscale: Option<ColorScale>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScatterLayoutOptions {
    pub title: Option<String>,
    pub y_axis_title: Option<String>,
    /// Remaining keys merged over the default layout
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScatterInitOptions {
    pub data: ScatterData,
    pub style: ScatterStyleOptions,
    pub layout: ScatterLayoutOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EagleEyeOptions {
    pub width: f64,
    pub height: f64,
    pub background_color: String,
    /// Scatter overview marker size
    pub marker_size: f64,
}

impl Default for EagleEyeOptions {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 200.0,
            background_color: "#ffffff".to_string(),
            marker_size: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorBarOptions {
    pub width: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
    pub label_color: String,
    pub label_size: f64,
    pub font_family: String,
    pub show_labels: bool,
}

impl Default for ColorBarOptions {
    fn default() -> Self {
        Self {
            width: 30.0,
            right_margin: 20.0,
            top_margin: 80.0,
            bottom_margin: 80.0,
            label_color: "#000".to_string(),
            label_size: 12.0,
            font_family: "Arial".to_string(),
            show_labels: true,
        }
    }
}

/// Partial colour-bar options merged over the current ones on update
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorBarOptionsPatch {
    pub width: Option<f64>,
    pub right_margin: Option<f64>,
    pub top_margin: Option<f64>,
    pub bottom_margin: Option<f64>,
    pub label_color: Option<String>,
    pub label_size: Option<f64>,
    pub font_family: Option<String>,
    pub show_labels: Option<bool>,
}

impl ColorBarOptions {
    pub fn merged(&self, patch: &ColorBarOptionsPatch) -> Self {
        Self {
            width: patch.width.unwrap_or(self.width),
            right_margin: patch.right_margin.unwrap_or(self.right_margin),
            top_margin: patch.top_margin.unwrap_or(self.top_margin),
            bottom_margin: patch.bottom_margin.unwrap_or(self.bottom_margin),
            label_color: patch.label_color.clone().unwrap_or_else(|| self.label_color.clone()),
            label_size: patch.label_size.unwrap_or(self.label_size),
            font_family: patch.font_family.clone().unwrap_or_else(|| self.font_family.clone()),
            show_labels: patch.show_labels.unwrap_or(self.show_labels),
        }
    }
}

/// One header sample: position, optional colour value and its number
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeaderPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub v: Option<f64>,
    pub num: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkerLineOptions {
    pub color: String,
    pub width: f64,
}

impl Default for MarkerLineOptions {
    fn default() -> Self {
        Self {
            color: "white".to_string(),
            width: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeaderTextOptions {
    pub position: String,
    pub size: f64,
    pub color: String,
    pub family: String,
}

impl Default for HeaderTextOptions {
    fn default() -> Self {
        Self {
            position: "top center".to_string(),
            size: 12.0,
            color: "black".to_string(),
            family: "Arial".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderPointOptions {
    pub mode: String,
    pub marker_size: f64,
    pub marker_symbol: String,
    pub marker_color: String,
    pub marker_opacity: f64,
    pub marker_line: MarkerLineOptions,
    pub show_labels: bool,
    pub text_options: HeaderTextOptions,
    /// Thin labels to at most `max_labels` when there are more points
    pub smart_labels: bool,
    pub max_labels: usize,
}

impl Default for HeaderPointOptions {
    fn default() -> Self {
        Self {
            mode: "markers".to_string(),
            marker_size: 10.0,
            marker_symbol: "circle".to_string(),
            marker_color: "red".to_string(),
            marker_opacity: 1.0,
            marker_line: MarkerLineOptions::default(),
            show_labels: false,
            text_options: HeaderTextOptions::default(),
            smart_labels: true,
            max_labels: 50,
        }
    }
}

/// Options accepted by a header layer update; absent fields are left as is
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderPointUpdate {
    pub mode: Option<String>,
    pub marker_size: Option<f64>,
    pub marker_symbol: Option<String>,
    pub marker_color: Option<String>,
    pub marker_opacity: Option<f64>,
    pub marker_line: Option<PartialMarkerLine>,
    pub show_labels: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialMarkerLine {
    pub color: Option<String>,
    pub width: Option<f64>,
}
