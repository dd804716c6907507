//! Contour chart wrapper
//!
//! Trace 0 is the contour layer; everything after it belongs to the
//! annotation subsystem. The x/y scale stays locked 1:1.

use std::ops::{Deref, DerefMut};

use annotations::trace::{Contours, LabelFont, Line};
use annotations::{LayoutPatch, Trace, TracePatch};
use serde_json::{json, Value};
use shared_types::events::RelayoutEvent;
use shared_types::{format_number, AnnotateError, AnnotateResult, ColorScale, ValueRange};

use crate::annotator::Annotator;
use crate::backend::{ChartParts, PlotBackend};
use crate::config::{
    ChartConfig, ColorScaleRangeUpdate, ContourData, ContourInitOptions, ContourLabelConfig,
    ContourLineConfig, DataColorScaleUpdate, EagleEyeOptions,
};
use crate::eagle_eye::EagleEye;
use crate::plot::merge_json;

const DEFAULT_ZMIN: f64 = 0.0;
const DEFAULT_ZMAX: f64 = 200.0;
const CONTOUR_TRACE: usize = 0;

pub struct ContourChart {
    annotator: Annotator,
}

impl Deref for ContourChart {
    type Target = Annotator;

    fn deref(&self) -> &Annotator {
        &self.annotator
    }
}

impl DerefMut for ContourChart {
    fn deref_mut(&mut self) -> &mut Annotator {
        &mut self.annotator
    }
}

impl ContourChart {
    pub fn new(parts: ChartParts, config: ChartConfig) -> Self {
        Self {
            annotator: Annotator::new(parts, config),
        }
    }

    /// Draw the contour plot from `{data, style, layout}`
    pub fn init(&mut self, options: &Value) -> bool {
        let options: ContourInitOptions = match serde_json::from_value(options.clone()) {
            Ok(options) => options,
            Err(e) => {
                log::warn!("Invalid contour options: {e}");
                return false;
            }
        };
        if !options.data.is_complete() {
            log::warn!("Contour data needs x, y and z");
            return false;
        }
        match self.try_init(options) {
            Ok(()) => {
                log::info!("Contour chart initialized");
                true
            }
            Err(e) => {
                log::error!("Contour init failed: {e}");
                false
            }
        }
    }

    fn try_init(&mut self, options: ContourInitOptions) -> AnnotateResult<()> {
        if self.annotator.is_drawing() {
            self.annotator.cancel_drawing();
        }
        let margin = self.annotator.config().margin;
        let trace = contour_trace(options.data, &options.style);

        let mut layout = json!({
            "showlegend": false,
            "dragmode": "pan",
            "xaxis": {
                "showgrid": true,
                "zeroline": true,
                "side": "top",
                "constrain": "domain",
            },
            "yaxis": {
                "showgrid": true,
                "zeroline": true,
                "scaleanchor": "x",
                "scaleratio": 1,
                "constrain": "domain",
            },
            "margin": { "t": margin, "l": margin, "r": margin, "b": margin },
        });
        if options.layout.is_object() {
            merge_json(&mut layout, &options.layout);
        }
        let config = json!({
            "responsive": true,
            "displayModeBar": false,
            "scrollZoom": true,
        });
        self.annotator.plot_mut().new_plot(vec![trace], layout, &config)
    }

    /// Replace x, y and z of the contour layer
    pub fn update_data(&mut self, data: &Value) -> bool {
        let data: ContourData = match serde_json::from_value::<ContourData>(data.clone()) {
            Ok(data) if data.is_complete() => data,
            Ok(_) => {
                log::warn!("Contour data update needs x, y and z");
                return false;
            }
            Err(e) => {
                log::warn!("Invalid contour data: {e}");
                return false;
            }
        };
        let patch = TracePatch {
            x: Some(data.x),
            y: Some(data.y),
            z: Some(data.z),
            ..TracePatch::default()
        };
        self.restyle_contour(&patch, true)
    }

    /// Merge a caller layout; the 1:1 scale lock always survives
    pub fn update_layout(&mut self, layout: &Value) -> bool {
        if !layout.is_object() {
            log::warn!("Layout update must be an object");
            return false;
        }
        let mut layout = layout.clone();
        merge_json(
            &mut layout,
            &json!({
                "xaxis": { "constrain": "domain" },
                "yaxis": { "scaleanchor": "x", "scaleratio": 1, "constrain": "domain" },
            }),
        );
        match self.annotator.plot_mut().update_layout(&layout) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Layout update failed: {e}");
                false
            }
        }
    }

    /// `[min, max]` of the colour mapping
    pub fn set_color_range(&mut self, range: &[f64]) -> bool {
        let [zmin, zmax] = range else {
            log::warn!("Colour range must be [min, max]");
            return false;
        };
        let patch = TracePatch {
            zmin: Some(*zmin),
            zmax: Some(*zmax),
            ..TracePatch::default()
        };
        self.restyle_contour(&patch, true)
    }

    pub fn set_contour_interval(&mut self, interval: f64) -> bool {
        if !interval.is_finite() || interval <= 0.0 {
            log::warn!("Contour interval must be a positive number, got {interval}");
            return false;
        }
        let patch = TracePatch {
            contours_size: Some(interval),
            ..TracePatch::default()
        };
        self.restyle_contour(&patch, false)
    }

    /// Show or hide the contour lines (line width 1 or 0)
    pub fn set_contours_visible(&mut self, visible: bool) -> bool {
        let patch = TracePatch {
            line_width: Some(if visible { 1.0 } else { 0.0 }),
            ..TracePatch::default()
        };
        self.restyle_contour(&patch, true)
    }

    pub fn update_color_scale(&mut self, scale: &Value, lines: &Value, labels: &Value) -> bool {
        let parsed = parse_scale(scale).and_then(|scale| {
            let lines: ContourLineConfig = parse_or_default(lines)?;
            let labels: ContourLabelConfig = parse_or_default(labels)?;
            Ok((scale, lines, labels))
        });
        let (scale, lines, labels) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Invalid colour scale update: {e}");
                return false;
            }
        };
        let patch = TracePatch {
            colorscale: Some(scale),
            contours_showlines: lines.show_lines,
            line_color: lines.color,
            contours_showlabels: labels.show_labels,
            contours_labelfont_color: labels.color,
            ..TracePatch::default()
        };
        self.restyle_contour(&patch, true)
    }

    /// New colour scale, optionally a new value range; contour levels follow
    /// the scale stops
    pub fn update_color_scale_and_range(&mut self, options: &Value) -> bool {
        let update = match serde_json::from_value::<ColorScaleRangeUpdate>(options.clone())
            .map_err(AnnotateError::from)
            .and_then(|update| update.colorscale.validate().map(|()| update))
        {
            Ok(update) => update,
            Err(e) => {
                log::warn!("Invalid colour scale update: {e}");
                return false;
            }
        };
        let current = self.value_range();
        let zmin = update.zmin.or(current.zmin).unwrap_or(DEFAULT_ZMIN);
        let zmax = update.zmax.or(current.zmax).unwrap_or(DEFAULT_ZMAX);

        let patch = scale_patch(&update.colorscale, zmin, zmax);
        let mirror = TracePatch {
            colorscale: Some(update.colorscale),
            zmin: Some(zmin),
            zmax: Some(zmax),
            ..TracePatch::default()
        };
        self.restyle_with_mirror(&patch, &mirror)
    }

    /// Replace the grid and the colour scale in one restyle. Missing bounds
    /// come from the finite values of the grid.
    pub fn update_data_and_color_scale(&mut self, options: &Value) -> bool {
        let update = match serde_json::from_value::<DataColorScaleUpdate>(options.clone())
            .map_err(AnnotateError::from)
            .and_then(validate_data_update)
        {
            Ok(update) => update,
            Err(e) => {
                log::warn!("Invalid data and colour scale update: {e}");
                return false;
            }
        };
        let extent = update.data.z_extent();
        let (Some(zmin), Some(zmax)) = (
            update.zmin.or(extent.map(|(lo, _)| lo)),
            update.zmax.or(extent.map(|(_, hi)| hi)),
        ) else {
            log::warn!("Cannot derive a value range from a grid without finite values");
            return false;
        };

        let mut patch = scale_patch(&update.colorscale, zmin, zmax);
        patch.x = Some(update.data.x);
        patch.y = Some(update.data.y);
        patch.z = Some(update.data.z);
        let mirror = TracePatch {
            x: patch.x.clone(),
            y: patch.y.clone(),
            z: patch.z.clone(),
            colorscale: patch.colorscale.clone(),
            zmin: Some(zmin),
            zmax: Some(zmax),
            ..TracePatch::default()
        };
        self.restyle_with_mirror(&patch, &mirror)
    }

    /// Current colour scale, the default scale when none is set.
    /// `None` before init.
    pub fn get_color_scale(&self) -> Option<ColorScale> {
        let Some(trace) = self.annotator.plot().trace(CONTOUR_TRACE) else {
            log::warn!("Contour chart is not initialized");
            return None;
        };
        Some(trace.colorscale.clone().unwrap_or_default())
    }

    pub fn get_value_range(&self) -> Option<ValueRange> {
        if !self.annotator.is_initialized() {
            log::warn!("Contour chart is not initialized");
            return None;
        }
        Some(self.value_range())
    }

    fn value_range(&self) -> ValueRange {
        let trace = self.annotator.plot().trace(CONTOUR_TRACE);
        ValueRange {
            zmin: trace.and_then(|trace| trace.zmin),
            zmax: trace.and_then(|trace| trace.zmax),
        }
    }

    /// React to a relayout of the main view: repair a lost scale lock and
    /// move the overview rectangle
    pub fn handle_relayout(&mut self, event: &RelayoutEvent) {
        if !event.scale_locked && self.annotator.is_initialized() {
            let margin = self.annotator.config().margin;
            let patch = LayoutPatch {
                margin: Some(annotations::trace::Margin::uniform(margin)),
                ..LayoutPatch::scale_lock()
            };
            if let Err(e) = self.annotator.plot_mut().relayout(&patch) {
                log::error!("Failed to restore the scale lock: {e}");
            }
        }
        if let Some(viewport) = event.viewport {
            self.annotator.push_viewport(viewport);
        }
    }

    /// Build the overview in a second plot
    pub fn add_eagle_eye(&mut self, backend: Box<dyn PlotBackend>, options: &Value) -> bool {
        let options: EagleEyeOptions = match parse_or_default(options) {
            Ok(options) => options,
            Err(e) => {
                log::warn!("Invalid eagle-eye options: {e}");
                return false;
            }
        };
        let Some(main) = self.annotator.plot().trace(CONTOUR_TRACE).cloned() else {
            log::warn!("Cannot add an eagle-eye before init");
            return false;
        };
        let interval = self.annotator.config().eagle_eye_min_interval_ms;
        match EagleEye::contour(backend, &main, &options, interval) {
            Ok(eagle) => {
                self.annotator.set_eagle_eye(eagle);
                true
            }
            Err(e) => {
                log::error!("Failed to create eagle-eye: {e}");
                false
            }
        }
    }

    fn restyle_contour(&mut self, patch: &TracePatch, mirror: bool) -> bool {
        match self.annotator.plot_mut().restyle(patch, &[CONTOUR_TRACE]) {
            Ok(()) => {
                if mirror {
                    self.annotator.mirror_to_eagle_eye(patch);
                }
                true
            }
            Err(e) => {
                log::warn!("Contour restyle failed: {e}");
                false
            }
        }
    }

    fn restyle_with_mirror(&mut self, patch: &TracePatch, mirror: &TracePatch) -> bool {
        if !self.restyle_contour(patch, false) {
            return false;
        }
        self.annotator.mirror_to_eagle_eye(mirror);
        true
    }
}

fn contour_trace(data: ContourData, style: &crate::config::ContourStyleOptions) -> Trace {
    let mut trace = Trace {
        x: data.x,
        y: data.y,
        z: Some(data.z),
        zmin: Some(data.zmin.unwrap_or(DEFAULT_ZMIN)),
        zmax: Some(data.zmax.unwrap_or(DEFAULT_ZMAX)),
        colorscale: Some(style.colorscale.clone().unwrap_or_default()),
        contours: Some(Contours {
            showlines: style.showlines,
            showlabels: style.show_labels,
            labelfont: Some(LabelFont {
                size: Some(style.label_size.unwrap_or(12.0)),
                color: Some(style.label_color.clone().unwrap_or_else(|| "white".to_string())),
            }),
            ..Contours::default()
        }),
        line: Some(Line {
            width: Some(1.0),
            color: Some(style.line_color.clone().unwrap_or_else(|| "#000".to_string())),
            dash: Some(style.line_style.clone().unwrap_or_else(|| "solid".to_string())),
            smoothing: None,
        }),
        showscale: Some(false),
        ..Trace::contour()
    };
    trace.extra.insert("hoverongaps".to_string(), Value::Bool(false));
    trace
}

/// Colour scale, colourbar ticks and contour levels for `[zmin, zmax]`.
/// One contour level per scale stop.
fn scale_patch(scale: &ColorScale, zmin: f64, zmax: f64) -> TracePatch {
    let ticks = scale.tick_values(zmin, zmax);
    let labels = ticks.iter().map(|tick| format_number(tick.round())).collect();
    let intervals = scale.len().saturating_sub(1).max(1) as f64;
    TracePatch {
        colorscale: Some(scale.clone()),
        zmin: Some(zmin),
        zmax: Some(zmax),
        colorbar_tickvals: Some(ticks),
        colorbar_ticktext: Some(labels),
        contours_start: Some(zmin),
        contours_end: Some(zmax),
        contours_size: Some((zmax - zmin) / intervals),
        ..TracePatch::default()
    }
}

fn validate_data_update(update: DataColorScaleUpdate) -> AnnotateResult<DataColorScaleUpdate> {
    if !update.data.is_complete() {
        return Err(AnnotateError::invalid("data needs x, y and z"));
    }
    update.colorscale.validate()?;
    Ok(update)
}

fn parse_scale(value: &Value) -> AnnotateResult<ColorScale> {
    let scale: ColorScale = serde_json::from_value(value.clone())?;
    scale.validate()?;
    Ok(scale)
}

/// `null` means all defaults
fn parse_or_default<T: Default + serde::de::DeserializeOwned>(value: &Value) -> AnnotateResult<T> {
    if value.is_null() {
        Ok(T::default())
    } else {
        Ok(serde_json::from_value(value.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendCall, Harness};

    fn chart(harness: &Harness) -> ContourChart {
        let mut chart = ContourChart::new(harness.parts(), ChartConfig::default());
        assert!(chart.init(&json!({
            "data": { "x": [0, 1, 2], "y": [0, 1, 2], "z": [[1, 2, 3], [4, null, 6], [7, 8, 9]] },
            "style": { "showLabels": true },
            "layout": { "title": "depth" }
        })));
        chart
    }

    fn scale() -> Value {
        json!([[0, "blue"], [0.5, "green"], [1, "red"]])
    }

    #[test]
    fn test_init_defaults() {
        let harness = Harness::new();
        let _chart = chart(&harness);

        let Some(BackendCall::NewPlot { traces, layout, config }) = harness.backend.calls().first().cloned() else {
            panic!("expected a new plot");
        };
        let trace = &traces[0];
        assert_eq!(trace.zmin, Some(0.0));
        assert_eq!(trace.zmax, Some(200.0));
        assert_eq!(trace.showscale, Some(false));
        assert_eq!(trace.colorscale.as_ref().map(ColorScale::len), Some(20));
        assert_eq!(trace.extra["hoverongaps"], false);
        assert_eq!(layout["yaxis"]["scaleanchor"], "x");
        assert_eq!(layout["title"], "depth");
        assert_eq!(layout["margin"]["t"], 50.0);
        assert_eq!(config["scrollZoom"], true);
    }

    #[test]
    fn test_init_rejects_missing_grid() {
        let harness = Harness::new();
        let mut chart = ContourChart::new(harness.parts(), ChartConfig::default());
        assert!(!chart.init(&json!({ "data": { "x": [0], "y": [0] } })));
        assert!(!chart.is_initialized());
    }

    #[test]
    fn test_update_data_needs_full_grid() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        harness.backend.clear_calls();

        assert!(!chart.update_data(&json!({ "x": [0, 1], "y": [0, 1] })));
        assert!(!chart.update_data(&json!({ "x": "bad" })));
        assert!(harness.backend.restyles().is_empty());

        assert!(chart.update_data(&json!({ "x": [0, 1], "y": [0, 1], "z": [[1, 2], [3, 4]] })));
        assert_eq!(chart.plot().trace(0).map(|t| t.x.clone()), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn test_contour_interval_must_be_positive() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        assert!(!chart.set_contour_interval(0.0));
        assert!(chart.set_contour_interval(2.5));
        let contours = chart.plot().trace(0).and_then(|t| t.contours.clone()).unwrap();
        assert_eq!(contours.size, Some(2.5));
    }

    #[test]
    fn test_color_range_needs_two_values() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        assert!(!chart.set_color_range(&[1.0]));
        assert!(chart.set_color_range(&[-5.0, 5.0]));
        let range = chart.get_value_range().unwrap();
        assert_eq!((range.zmin, range.zmax), (Some(-5.0), Some(5.0)));
    }

    #[test]
    fn test_color_scale_and_range_levels() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        assert!(chart.update_color_scale_and_range(&json!({ "colorscale": scale(), "zmax": 100 })));

        let (patch, _) = harness.backend.restyles().pop().unwrap();
        assert_eq!(patch.colorbar_tickvals, Some(vec![0.0, 50.0, 100.0]));
        assert_eq!(
            patch.colorbar_ticktext,
            Some(vec!["0".to_string(), "50".to_string(), "100".to_string()])
        );
        assert_eq!(patch.contours_size, Some(50.0));
        assert_eq!(chart.get_color_scale().map(|s| s.len()), Some(3));
    }

    #[test]
    fn test_data_and_color_scale_derives_range() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        assert!(chart.update_data_and_color_scale(&json!({
            "data": { "x": [0, 1], "y": [0, 1], "z": [[-3, null], [9, 4]] },
            "colorscale": scale()
        })));
        let range = chart.get_value_range().unwrap();
        assert_eq!((range.zmin, range.zmax), (Some(-3.0), Some(9.0)));

        assert!(!chart.update_data_and_color_scale(&json!({
            "data": { "x": [0], "y": [0], "z": [[null]] },
            "colorscale": scale()
        })));
        assert!(!chart.update_color_scale(&json!([[0, "blue"]]), &Value::Null, &Value::Null));
    }

    #[test]
    fn test_relayout_restores_scale_lock() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        harness.backend.clear_calls();

        chart.handle_relayout(&RelayoutEvent {
            viewport: None,
            scale_locked: true,
        });
        assert!(harness.backend.relayouts().is_empty());

        chart.handle_relayout(&RelayoutEvent {
            viewport: None,
            scale_locked: false,
        });
        let patch = harness.backend.relayouts().pop().unwrap();
        assert_eq!(patch.y_scaleanchor.as_deref(), Some("x"));
        assert_eq!(patch.margin.map(|m| m.l), Some(50.0));
    }

    #[test]
    fn test_update_layout_keeps_scale_lock() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        assert!(chart.update_layout(&json!({ "yaxis": { "scaleanchor": false, "title": "depth" } })));
        assert_eq!(chart.plot().layout()["yaxis"]["scaleanchor"], "x");
        assert_eq!(chart.plot().layout()["yaxis"]["title"], "depth");
    }
}
