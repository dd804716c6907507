//! Scatter chart wrapper
//!
//! Trace 0 holds the samples. Each sample carries an id and extended
//! attributes; `visible[i] == 1` hides it (opacity 0). Selection is shown as a
//! red marker border. Header point layers are extra scatter traces tagged
//! with `role: "header"`.

use std::collections::{BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};

use annotations::trace::{ColorSpec, CustomData, DragMode, Marker, MarkerLine, OneOrMany, TextFont};
use annotations::{LayoutPatch, Trace, TracePatch};
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::events::RelayoutEvent;
use shared_types::{format_number, AnnotateError, AnnotateResult, ColorScale, ValueRange};

use crate::annotator::Annotator;
use crate::backend::{ChartParts, PlotBackend};
use crate::config::{
    ChartConfig, ColorScaleRangeUpdate, EagleEyeOptions, HeaderPoint, HeaderPointOptions,
    HeaderPointUpdate, ScatterData, ScatterInitOptions,
};
use crate::eagle_eye::EagleEye;
use crate::event_bus::{
    EventPayload, Listener, ListenerId, PointAttributes, PointClickEvent, SelectionChangeEvent,
    POINT_CLICK, SELECTION_CHANGE,
};

const DATA_TRACE: usize = 0;
const HEADER_ROLE: &str = "header";
const HIGHLIGHT_COLORS: [&str; 4] = ["red", "blue", "green", "#F4B008"];

const BORDER_COLOR: &str = "white";
const BORDER_WIDTH: f64 = 1.0;
const SELECTED_BORDER_COLOR: &str = "red";
const SELECTED_BORDER_WIDTH: f64 = 2.0;

const HOVER_TEMPLATE: &str =
    "X: %{x}<br>Y: %{y}<br>Value: %{marker.color}<br>a: %{customdata.a}<br>b: %{customdata.b}<extra></extra>";

/// Sample of [`ScatterChart::update_data`]
#[derive(Debug, Clone, Deserialize)]
struct TextPoint {
    x: f64,
    y: f64,
    #[serde(default)]
    text: Option<String>,
}

pub struct ScatterChart {
    annotator: Annotator,
    point_ids: Vec<Value>,
    attributes: Vec<PointAttributes>,
    hidden: BTreeSet<usize>,
    selected: BTreeSet<usize>,
    select_mode: bool,
    /// Listener registered by [`ScatterChart::set_point_click_callback`]
    point_click: Option<ListenerId>,
    /// Header colours saved before the first highlight, keyed by layer uid
    header_colors: HashMap<String, ColorSpec>,
    next_header: u64,
}

impl Deref for ScatterChart {
    type Target = Annotator;

    fn deref(&self) -> &Annotator {
        &self.annotator
    }
}

impl DerefMut for ScatterChart {
    fn deref_mut(&mut self) -> &mut Annotator {
        &mut self.annotator
    }
}

impl ScatterChart {
    pub fn new(parts: ChartParts, config: ChartConfig) -> Self {
        Self {
            annotator: Annotator::new(parts, config),
            point_ids: Vec::new(),
            attributes: Vec::new(),
            hidden: BTreeSet::new(),
            selected: BTreeSet::new(),
            select_mode: false,
            point_click: None,
            header_colors: HashMap::new(),
            next_header: 0,
        }
    }

    /// Draw the scatter plot from `{data, style, layout}`
    pub fn init(&mut self, options: &Value) -> bool {
        let options: ScatterInitOptions = match serde_json::from_value(options.clone()) {
            Ok(options) => options,
            Err(e) => {
                log::warn!("Invalid scatter options: {e}");
                return false;
            }
        };
        if options.data.x.len() != options.data.y.len() {
            log::warn!(
                "Scatter x and y lengths differ ({} vs {})",
                options.data.x.len(),
                options.data.y.len()
            );
            return false;
        }
        match self.try_init(options) {
            Ok(()) => {
                log::info!("Scatter chart initialized with {} points", self.point_count());
                true
            }
            Err(e) => {
                log::error!("Scatter init failed: {e}");
                false
            }
        }
    }

    fn try_init(&mut self, options: ScatterInitOptions) -> AnnotateResult<()> {
        if self.annotator.is_drawing() {
            self.annotator.cancel_drawing();
        }
        let ScatterInitOptions { data, style, layout } = options;
        let count = data.x.len();

        self.point_ids = data.id.clone();
        self.attributes = extended_attributes(&data);
        self.hidden = hidden_from(data.visible.as_deref());
        self.selected.clear();
        self.header_colors.clear();

        let customdata = self
            .attributes
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let mut trace = Trace {
            x: data.x,
            y: data.y,
            mode: Some(style.mode.unwrap_or_else(|| "markers".to_string())),
            zmin: data.zmin,
            zmax: data.zmax,
            customdata: Some(CustomData::Points(customdata)),
            marker: Some(Marker {
                size: Some(OneOrMany::One(style.marker_size.unwrap_or(7.0))),
                color: data.v.map(ColorSpec::Values),
                colorscale: style.colorscale,
                symbol: Some("square".to_string()),
                opacity: Some(OneOrMany::Many(self.opacities(count))),
                line: Some(MarkerLine {
                    color: Some(ColorSpec::PerPoint(vec![BORDER_COLOR.to_string(); count])),
                    width: Some(OneOrMany::Many(vec![BORDER_WIDTH; count])),
                }),
                ..Marker::default()
            }),
            showscale: Some(false),
            ..Trace::scatter()
        };
        trace
            .extra
            .insert("hovertemplate".to_string(), Value::from(HOVER_TEMPLATE));

        let margin = self.annotator.config().margin;
        let mut plot_layout = json!({
            "title": layout.title.unwrap_or_default(),
            "showlegend": false,
            "hovermode": "closest",
            "dragmode": "pan",
            "xaxis": {
                "showgrid": true,
                "zeroline": true,
                "autorange": true,
                "showline": true,
                "side": "top",
            },
            "yaxis": {
                "title": layout.y_axis_title.unwrap_or_default(),
                "showgrid": true,
                "zeroline": true,
                "autorange": "reversed",
                "showline": true,
            },
            "margin": { "t": margin, "l": margin, "r": margin, "b": margin },
        });
        // Caller keys replace the defaults wholesale
        if let Value::Object(target) = &mut plot_layout {
            target.extend(layout.rest);
        }
        let config = json!({
            "responsive": true,
            "displayModeBar": false,
            "scrollZoom": true,
        });
        self.annotator.plot_mut().new_plot(vec![trace], plot_layout, &config)
    }

    pub fn point_count(&self) -> usize {
        self.annotator.plot().trace(DATA_TRACE).map_or(0, |trace| trace.x.len())
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    /// Replace the sample coordinates and hover text: `[{x, y, text}]`
    pub fn update_data(&mut self, points: &Value) -> bool {
        let points: Vec<TextPoint> = match serde_json::from_value(points.clone()) {
            Ok(points) => points,
            Err(e) => {
                log::warn!("Invalid scatter points: {e}");
                return false;
            }
        };
        let patch = TracePatch {
            x: Some(points.iter().map(|p| p.x).collect()),
            y: Some(points.iter().map(|p| p.y).collect()),
            text: Some(points.into_iter().map(|p| p.text.unwrap_or_default()).collect()),
            ..TracePatch::default()
        };
        self.restyle_data(&patch, true)
    }

    pub fn update_layout(&mut self, layout: &Value) -> bool {
        if !layout.is_object() {
            log::warn!("Layout update must be an object");
            return false;
        }
        match self.annotator.plot_mut().update_layout(layout) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Layout update failed: {e}");
                false
            }
        }
    }

    /// Replace the samples. A `visible` array resets the hidden set; the
    /// selection is always cleared.
    pub fn update_scatter_data(&mut self, data: &Value) -> bool {
        let data = match parse_scatter_data(data) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Invalid scatter data: {e}");
                return false;
            }
        };
        let colorscale = self.current_color_scale().unwrap_or_default();
        let mut patch = self.data_patch(&data);
        patch.marker_colorscale = Some(colorscale);
        self.apply_data_update(data, patch)
    }

    /// [`ScatterChart::update_scatter_data`] with a new colour scale; the
    /// data's `zmin`/`zmax` become the colour bounds
    pub fn update_scatter_data_and_color_scale(&mut self, data: &Value, scale: &Value) -> bool {
        let parsed = parse_scatter_data(data).and_then(|data| Ok((data, parse_scale(scale)?)));
        let (data, scale) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Invalid scatter data or colour scale: {e}");
                return false;
            }
        };
        let mut patch = self.data_patch(&data);
        patch.marker_colorscale = Some(scale);
        patch.marker_cmin = data.zmin;
        patch.marker_cmax = data.zmax;
        self.apply_data_update(data, patch)
    }

    fn data_patch(&mut self, data: &ScatterData) -> TracePatch {
        let count = data.x.len();
        if let Some(visible) = data.visible.as_deref() {
            self.hidden = hidden_from(Some(visible));
        }
        self.hidden.retain(|index| *index < count);
        TracePatch {
            x: Some(data.x.clone()),
            y: Some(data.y.clone()),
            marker_color: data.v.clone().map(ColorSpec::Values),
            marker_opacity: Some(OneOrMany::Many(self.opacities(count))),
            ..TracePatch::default()
        }
    }

    fn apply_data_update(&mut self, data: ScatterData, patch: TracePatch) -> bool {
        if !data.id.is_empty() {
            self.point_ids = data.id.clone();
        }
        if data.a.is_some() {
            self.attributes = extended_attributes(&data);
        }
        if !self.restyle_data(&patch, true) {
            return false;
        }
        self.selected.clear();
        self.restyle_borders();

        let layout = json!({
            "autosize": true,
            "xaxis": { "autorange": true, "constrain": "domain" },
            "yaxis": { "autorange": "reversed", "constrain": "domain" },
        });
        if let Err(e) = self.annotator.plot_mut().update_layout(&layout) {
            log::warn!("Failed to reset axis ranges: {e}");
        }
        self.annotator.eagle_eye_layout(&layout);
        true
    }

    // ------------------------------------------------------------------
    // Colour scale
    // ------------------------------------------------------------------

    /// Min/max of the colour values, `None` when the samples carry none
    pub fn get_value_range(&self) -> Option<ValueRange> {
        let Some(trace) = self.annotator.plot().trace(DATA_TRACE) else {
            log::warn!("Scatter chart is not initialized");
            return None;
        };
        let Some(ColorSpec::Values(values)) = trace.marker.as_ref().and_then(|m| m.color.as_ref()) else {
            return None;
        };
        let (zmin, zmax) = finite_extent(values)?;
        Some(ValueRange {
            zmin: Some(zmin),
            zmax: Some(zmax),
        })
    }

    pub fn get_color_scale(&self) -> Option<ColorScale> {
        if !self.annotator.is_initialized() {
            log::warn!("Scatter chart is not initialized");
            return None;
        }
        Some(self.current_color_scale().unwrap_or_default())
    }

    fn current_color_scale(&self) -> Option<ColorScale> {
        self.annotator
            .plot()
            .trace(DATA_TRACE)
            .and_then(|trace| trace.marker.as_ref())
            .and_then(|marker| marker.colorscale.clone())
    }

    /// `{colorscale, zmin?, zmax?}`; bounds map to the marker `cmin`/`cmax`
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
        let patch = TracePatch {
            marker_colorscale: Some(update.colorscale),
            marker_cmin: update.zmin,
            marker_cmax: update.zmax,
            ..TracePatch::default()
        };
        self.restyle_data(&patch, true)
    }

    pub fn update_color_scale(&mut self, scale: &Value) -> bool {
        let scale = match parse_scale(scale) {
            Ok(scale) => scale,
            Err(e) => {
                log::warn!("Invalid colour scale: {e}");
                return false;
            }
        };
        let patch = TracePatch {
            marker_colorscale: Some(scale),
            ..TracePatch::default()
        };
        self.restyle_data(&patch, true)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Clicks toggle sample selection until [`ScatterChart::exit_select_mode`]
    pub fn enter_select_mode(&mut self) -> bool {
        if self.select_mode {
            return false;
        }
        let patch = LayoutPatch {
            dragmode: Some(DragMode::Disabled),
            ..LayoutPatch::default()
        };
        if let Err(e) = self.annotator.plot_mut().relayout(&patch) {
            log::warn!("Cannot enter select mode: {e}");
            return false;
        }
        self.select_mode = true;
        self.annotator.set_cursor("crosshair");
        log::debug!("Entered select mode");
        true
    }

    pub fn exit_select_mode(&mut self) -> bool {
        if !self.select_mode {
            return false;
        }
        self.select_mode = false;
        self.annotator.set_cursor("auto");
        let patch = LayoutPatch {
            dragmode: Some(DragMode::Pan),
            ..LayoutPatch::default()
        };
        if let Err(e) = self.annotator.plot_mut().relayout(&patch) {
            log::error!("Failed to restore pan mode: {e}");
        }
        self.clear_selection();
        log::debug!("Left select mode");
        true
    }

    pub fn is_select_mode(&self) -> bool {
        self.select_mode
    }

    /// A plot click on point `point_index` of trace `curve`. Toggles the
    /// selection in select mode and reports the point in property-view mode.
    /// Returns whether the click was consumed.
    pub fn handle_plot_click(&mut self, curve: usize, point_index: usize) -> bool {
        if curve != DATA_TRACE {
            return false;
        }
        let Some((x, y)) = self.annotator.plot().trace(DATA_TRACE).and_then(|trace| {
            Some((*trace.x.get(point_index)?, *trace.y.get(point_index)?))
        }) else {
            log::warn!("Click on unknown point {point_index}");
            return false;
        };
        let attributes = self.attributes.get(point_index).cloned();
        let mut consumed = false;

        if self.select_mode {
            if !self.selected.remove(&point_index) {
                self.selected.insert(point_index);
            }
            let payload = EventPayload::SelectionChange(SelectionChangeEvent {
                index: point_index,
                x,
                y,
                attributes: attributes.clone(),
            });
            self.annotator.emit(SELECTION_CHANGE, &payload);
            self.restyle_borders();
            consumed = true;
        }

        if self.point_click.is_some() {
            let payload = EventPayload::PointClick(PointClickEvent {
                x,
                y,
                point_index,
                attributes,
            });
            self.annotator.emit(POINT_CLICK, &payload);
            consumed = true;
        }
        consumed
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.restyle_borders();
    }

    pub fn selected_points(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    /// Hide every selected sample and clear the selection
    pub fn hide_selected_points(&mut self) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        let hidden = std::mem::take(&mut self.selected);
        self.hidden.extend(hidden);
        let patch = self.opacity_patch();
        let applied = self.restyle_data(&patch, true);
        self.restyle_borders();
        applied
    }

    pub fn show_hidden_points(&mut self) -> bool {
        if self.hidden.is_empty() {
            return false;
        }
        self.hidden.clear();
        let patch = self.opacity_patch();
        self.restyle_data(&patch, true)
    }

    pub fn hidden_points(&self) -> Vec<usize> {
        self.hidden.iter().copied().collect()
    }

    pub fn is_point_hidden(&self, index: usize) -> bool {
        self.hidden.contains(&index)
    }

    pub fn visible_points_count(&self) -> usize {
        self.point_count().saturating_sub(self.hidden.len())
    }

    pub fn hidden_point_ids(&self) -> Vec<Value> {
        self.ids_of(&self.hidden)
    }

    pub fn selected_point_ids(&self) -> Vec<Value> {
        self.ids_of(&self.selected)
    }

    pub fn point_index_by_id(&self, id: &Value) -> Option<usize> {
        self.point_ids.iter().position(|candidate| candidate == id)
    }

    pub fn is_point_hidden_by_id(&self, id: &Value) -> bool {
        self.point_index_by_id(id)
            .is_some_and(|index| self.hidden.contains(&index))
    }

    pub fn is_point_selected_by_id(&self, id: &Value) -> bool {
        self.point_index_by_id(id)
            .is_some_and(|index| self.selected.contains(&index))
    }

    fn ids_of(&self, indices: &BTreeSet<usize>) -> Vec<Value> {
        indices
            .iter()
            .filter_map(|index| self.point_ids.get(*index).cloned())
            .collect()
    }

    fn opacities(&self, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| if self.hidden.contains(&i) { 0.0 } else { 1.0 })
            .collect()
    }

    fn opacity_patch(&self) -> TracePatch {
        TracePatch {
            marker_opacity: Some(OneOrMany::Many(self.opacities(self.point_count()))),
            ..TracePatch::default()
        }
    }

    fn restyle_borders(&mut self) {
        if !self.annotator.is_initialized() {
            return;
        }
        let count = self.point_count();
        let (colors, widths): (Vec<String>, Vec<f64>) = (0..count)
            .map(|i| {
                if self.selected.contains(&i) {
                    (SELECTED_BORDER_COLOR.to_string(), SELECTED_BORDER_WIDTH)
                } else {
                    (BORDER_COLOR.to_string(), BORDER_WIDTH)
                }
            })
            .unzip();
        let patch = TracePatch {
            marker_line_color: Some(ColorSpec::PerPoint(colors)),
            marker_line_width: Some(OneOrMany::Many(widths)),
            ..TracePatch::default()
        };
        self.restyle_data(&patch, false);
    }

    fn restyle_data(&mut self, patch: &TracePatch, mirror: bool) -> bool {
        match self.annotator.plot_mut().restyle(patch, &[DATA_TRACE]) {
            Ok(()) => {
                if mirror {
                    self.annotator.mirror_to_eagle_eye(patch);
                }
                true
            }
            Err(e) => {
                log::warn!("Scatter restyle failed: {e}");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Header points
    // ------------------------------------------------------------------

    /// Add a header point layer. Returns its trace index.
    pub fn add_header_points(&mut self, points: &Value, options: &Value) -> Option<usize> {
        let parsed = parse_header_points(points).and_then(|points| {
            let options: HeaderPointOptions = if options.is_null() {
                HeaderPointOptions::default()
            } else {
                serde_json::from_value(options.clone())?
            };
            Ok((points, options))
        });
        let (points, options) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Invalid header points: {e}");
                return None;
            }
        };

        self.next_header += 1;
        let uid = format!("header-{}", self.next_header);
        let trace = header_trace(&points, &options, &uid);
        match self.annotator.plot_mut().add_traces(vec![trace]) {
            Ok(range) => {
                log::debug!("Added {} header points as trace {}", points.len(), range.start);
                Some(range.start)
            }
            Err(e) => {
                log::error!("Failed to add header points: {e}");
                None
            }
        }
    }

    pub fn update_header_points(&mut self, index: usize, points: &Value, options: &Value) -> bool {
        let parsed = parse_header_points(points).and_then(|points| {
            let options: HeaderPointUpdate = if options.is_null() {
                HeaderPointUpdate::default()
            } else {
                serde_json::from_value(options.clone())?
            };
            Ok((points, options))
        });
        let (points, options) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Invalid header point update: {e}");
                return false;
            }
        };
        let Some(uid) = self.header_uid(index) else {
            log::warn!("Trace {index} is not a header point layer");
            return false;
        };
        let current_mode = self
            .annotator
            .plot()
            .trace(index)
            .and_then(|trace| trace.mode.clone())
            .unwrap_or_else(|| "markers".to_string());

        let nums: Vec<f64> = points.iter().map(|p| p.num).collect();
        let mode = match (&options.mode, options.show_labels) {
            (Some(mode), show) => Some(with_text(mode, show.unwrap_or(false))),
            (None, Some(show)) => Some(with_text(base_mode(&current_mode), show)),
            (None, None) => None,
        };
        let line = options.marker_line.unwrap_or_default();
        let patch = TracePatch {
            x: Some(points.iter().map(|p| p.x).collect()),
            y: Some(points.iter().map(|p| p.y).collect()),
            customdata: Some(CustomData::Points(nums.iter().map(|n| json!(n)).collect())),
            text: Some(nums.iter().map(|n| format_number(*n)).collect()),
            mode,
            marker_color: header_color(&points, options.marker_color.as_deref()),
            marker_size: options.marker_size.map(OneOrMany::One),
            marker_symbol: options.marker_symbol,
            marker_opacity: options.marker_opacity.map(OneOrMany::One),
            marker_line_color: line.color.map(ColorSpec::Css),
            marker_line_width: line.width.map(OneOrMany::One),
            ..TracePatch::default()
        };
        match self.annotator.plot_mut().restyle(&patch, &[index]) {
            Ok(()) => {
                self.header_colors.remove(&uid);
                true
            }
            Err(e) => {
                log::warn!("Header point update failed: {e}");
                false
            }
        }
    }

    pub fn remove_header_points(&mut self, index: usize) -> bool {
        let Some(uid) = self.header_uid(index) else {
            log::warn!("Trace {index} is not a header point layer");
            return false;
        };
        match self.annotator.plot_mut().delete_traces(&[index]) {
            Ok(()) => {
                self.header_colors.remove(&uid);
                true
            }
            Err(e) => {
                log::error!("Failed to remove header points: {e}");
                false
            }
        }
    }

    pub fn trace_count(&self) -> usize {
        self.annotator.plot().len()
    }

    /// Colour the header points numbered `nums[0..4]` red, blue, green and
    /// amber; the rest keep their original colour
    pub fn highlight_header_points(&mut self, nums: &[f64]) -> bool {
        if nums.len() != HIGHLIGHT_COLORS.len() {
            log::warn!("Header highlight takes exactly 4 numbers, got {}", nums.len());
            return false;
        }
        let layers: Vec<(usize, String, Vec<Option<f64>>, Option<ColorSpec>)> = self
            .annotator
            .plot()
            .traces()
            .iter()
            .enumerate()
            .filter_map(|(index, trace)| {
                let uid = header_uid_of(trace)?;
                let nums = match &trace.customdata {
                    Some(CustomData::Points(values)) => values.iter().map(Value::as_f64).collect(),
                    _ => Vec::new(),
                };
                let color = trace.marker.as_ref().and_then(|m| m.color.clone());
                Some((index, uid, nums, color))
            })
            .collect();

        let mut all_applied = true;
        for (index, uid, layer_nums, color) in layers {
            let original = self
                .header_colors
                .entry(uid)
                .or_insert_with(|| color.unwrap_or_else(|| ColorSpec::Css("red".to_string())))
                .clone();
            let colors = layer_nums
                .iter()
                .enumerate()
                .map(|(i, num)| {
                    match num.and_then(|num| nums.iter().position(|wanted| *wanted == num)) {
                        Some(slot) => Value::from(HIGHLIGHT_COLORS[slot]),
                        None => color_at(&original, i),
                    }
                })
                .collect();
            let patch = TracePatch {
                marker_color: Some(ColorSpec::Mixed(colors)),
                ..TracePatch::default()
            };
            if let Err(e) = self.annotator.plot_mut().restyle(&patch, &[index]) {
                log::error!("Header highlight failed on trace {index}: {e}");
                all_applied = false;
            }
        }
        all_applied
    }

    /// Restore the colours saved by the first highlight of layer `index`
    pub fn reset_header_points_color(&mut self, index: usize) -> bool {
        let Some(original) = self
            .header_uid(index)
            .and_then(|uid| self.header_colors.get(&uid).cloned())
        else {
            return false;
        };
        let patch = TracePatch {
            marker_color: Some(original),
            ..TracePatch::default()
        };
        match self.annotator.plot_mut().restyle(&patch, &[index]) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Header colour reset failed: {e}");
                false
            }
        }
    }

    fn header_uid(&self, index: usize) -> Option<String> {
        self.annotator.plot().trace(index).and_then(header_uid_of)
    }

    // ------------------------------------------------------------------
    // Property view
    // ------------------------------------------------------------------

    /// Report clicked samples to `listener` as `pointClick` events until
    /// [`ScatterChart::remove_point_click_callback`]
    pub fn set_point_click_callback(&mut self, listener: Listener, cursor: &str) -> ListenerId {
        if let Some(previous) = self.point_click.take() {
            self.annotator.off(POINT_CLICK, previous);
        }
        let id = self.annotator.on(POINT_CLICK, listener);
        self.point_click = Some(id);
        self.annotator.set_cursor(cursor);
        log::debug!("Property view mode on");
        id
    }

    pub fn remove_point_click_callback(&mut self) -> bool {
        let Some(id) = self.point_click.take() else {
            return false;
        };
        self.annotator.off(POINT_CLICK, id);
        self.annotator.set_cursor("auto");
        log::debug!("Property view mode off");
        true
    }

    pub fn is_in_property_view_mode(&self) -> bool {
        self.point_click.is_some()
    }

    // ------------------------------------------------------------------
    // Views and lifecycle
    // ------------------------------------------------------------------

    pub fn handle_relayout(&mut self, event: &RelayoutEvent) {
        if let Some(viewport) = event.viewport {
            self.annotator.push_viewport(viewport);
        }
    }

    pub fn add_eagle_eye(&mut self, backend: Box<dyn PlotBackend>, options: &Value) -> bool {
        let options: EagleEyeOptions = if options.is_null() {
            EagleEyeOptions::default()
        } else {
            match serde_json::from_value(options.clone()) {
                Ok(options) => options,
                Err(e) => {
                    log::warn!("Invalid eagle-eye options: {e}");
                    return false;
                }
            }
        };
        let Some(main) = self.annotator.plot().trace(DATA_TRACE).cloned() else {
            log::warn!("Cannot add an eagle-eye before init");
            return false;
        };
        let interval = self.annotator.config().eagle_eye_min_interval_ms;
        match EagleEye::scatter(backend, &main, &options, interval) {
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

    /// Dispose the annotation subsystem and forget all sample state
    pub fn dispose(&mut self) {
        self.annotator.dispose();
        self.point_ids.clear();
        self.attributes.clear();
        self.hidden.clear();
        self.selected.clear();
        self.select_mode = false;
        self.point_click = None;
        self.header_colors.clear();
    }
}

fn hidden_from(visible: Option<&[i64]>) -> BTreeSet<usize> {
    visible
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter(|(_, flag)| **flag == 1)
        .map(|(index, _)| index)
        .collect()
}

/// One attribute record per sample, built from the `a` column's length
fn extended_attributes(data: &ScatterData) -> Vec<PointAttributes> {
    let Some(a) = &data.a else {
        return Vec::new();
    };
    let column = |values: &Option<Vec<Value>>, i: usize| {
        values
            .as_ref()
            .and_then(|values| values.get(i).cloned())
            .unwrap_or(Value::Null)
    };
    (0..a.len())
        .map(|i| PointAttributes {
            a: a[i].clone(),
            b: column(&data.b, i),
            m: column(&data.m, i),
            n: column(&data.n, i),
            row: column(&data.row, i),
            pseu: column(&data.pseu, i),
        })
        .collect()
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

fn parse_scatter_data(value: &Value) -> AnnotateResult<ScatterData> {
    let data: ScatterData = serde_json::from_value(value.clone())?;
    if data.x.len() != data.y.len() {
        return Err(AnnotateError::invalid("x and y lengths differ"));
    }
    Ok(data)
}

fn parse_scale(value: &Value) -> AnnotateResult<ColorScale> {
    let scale: ColorScale = serde_json::from_value(value.clone())?;
    scale.validate()?;
    Ok(scale)
}

fn parse_header_points(value: &Value) -> AnnotateResult<Vec<HeaderPoint>> {
    let points: Vec<HeaderPoint> = serde_json::from_value(value.clone())?;
    if points.is_empty() {
        return Err(AnnotateError::invalid("header points must not be empty"));
    }
    Ok(points)
}

fn header_uid_of(trace: &Trace) -> Option<String> {
    if trace.extra.get("role").and_then(Value::as_str) != Some(HEADER_ROLE) {
        return None;
    }
    trace.extra.get("uid").and_then(Value::as_str).map(str::to_string)
}

fn base_mode(mode: &str) -> &str {
    mode.strip_suffix("+text").unwrap_or(mode)
}

fn with_text(mode: &str, show_labels: bool) -> String {
    if show_labels {
        format!("{}+text", base_mode(mode))
    } else {
        mode.to_string()
    }
}

/// Value colours when every point has one, else the fixed colour
fn header_color(points: &[HeaderPoint], fallback: Option<&str>) -> Option<ColorSpec> {
    let values: Option<Vec<f64>> = points.iter().map(|p| p.v).collect();
    match values {
        Some(values) => Some(ColorSpec::Values(values)),
        None => fallback.map(|color| ColorSpec::Css(color.to_string())),
    }
}

fn color_at(spec: &ColorSpec, index: usize) -> Value {
    match spec {
        ColorSpec::Css(color) => Value::from(color.as_str()),
        ColorSpec::PerPoint(colors) => colors.get(index).map_or(Value::Null, |c| Value::from(c.as_str())),
        ColorSpec::Values(values) => values.get(index).map_or(Value::Null, |v| json!(v)),
        ColorSpec::Mixed(values) => values.get(index).cloned().unwrap_or(Value::Null),
    }
}

fn header_trace(points: &[HeaderPoint], options: &HeaderPointOptions, uid: &str) -> Trace {
    let nums: Vec<f64> = points.iter().map(|p| p.num).collect();
    let step = if options.show_labels && options.smart_labels && points.len() > options.max_labels {
        points.len().div_ceil(options.max_labels.max(1))
    } else {
        1
    };
    let text = nums
        .iter()
        .enumerate()
        .map(|(i, num)| if i % step == 0 { format_number(*num) } else { String::new() })
        .collect();
    let text_options = &options.text_options;

    let mut trace = Trace {
        x: points.iter().map(|p| p.x).collect(),
        y: points.iter().map(|p| p.y).collect(),
        mode: Some(with_text(&options.mode, options.show_labels)),
        marker: Some(Marker {
            size: Some(OneOrMany::One(options.marker_size)),
            color: header_color(points, Some(&options.marker_color)),
            symbol: Some(options.marker_symbol.clone()),
            opacity: Some(OneOrMany::One(options.marker_opacity)),
            line: Some(MarkerLine {
                color: Some(ColorSpec::Css(options.marker_line.color.clone())),
                width: Some(OneOrMany::One(options.marker_line.width)),
            }),
            ..Marker::default()
        }),
        text: Some(text),
        textposition: Some(text_options.position.clone()),
        textfont: Some(TextFont {
            family: text_options.family.clone(),
            size: text_options.size,
            color: text_options.color.clone(),
            style: "normal".to_string(),
            weight: "normal".to_string(),
        }),
        hoverinfo: Some("x+y+text".to_string()),
        customdata: Some(CustomData::Points(nums.iter().map(|n| json!(n)).collect())),
        showlegend: Some(false),
        ..Trace::scatter()
    };
    trace.extra.insert("role".to_string(), Value::from(HEADER_ROLE));
    trace.extra.insert("uid".to_string(), Value::from(uid));
    trace.extra.insert("zindex".to_string(), json!(999));
    trace.extra.insert(
        "hovertemplate".to_string(),
        Value::from("x: %{x}<br>y: %{y}<br>num: %{text}<extra></extra>"),
    );
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendCall, Harness};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn chart(harness: &Harness) -> ScatterChart {
        let mut chart = ScatterChart::new(harness.parts(), ChartConfig::default());
        assert!(chart.init(&json!({
            "data": {
                "x": [1, 2, 3, 4],
                "y": [10, 20, 30, 40],
                "v": [5, 15, 25, 35],
                "visible": [0, 1, 0, 0],
                "id": ["p1", "p2", "p3", "p4"],
                "a": [1, 2, 3, 4],
                "b": ["w", "x", "y", "z"]
            },
            "layout": { "title": "wells", "yAxisTitle": "depth", "height": 480 }
        })));
        chart
    }

    fn record(chart: &mut ScatterChart, event: &str) -> Rc<RefCell<Vec<Value>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        chart.on(
            event,
            Box::new(move |payload| {
                sink.borrow_mut().push(serde_json::to_value(payload)?);
                Ok(())
            }),
        );
        seen
    }

    fn header_points() -> Value {
        json!([
            { "x": 1, "y": 1, "num": 1 },
            { "x": 2, "y": 2, "num": 2 },
            { "x": 3, "y": 3, "num": 3 }
        ])
    }

    #[test]
    fn test_init_hides_flagged_points() {
        let harness = Harness::new();
        let chart = chart(&harness);

        let Some(BackendCall::NewPlot { traces, layout, .. }) = harness.backend.calls().first().cloned() else {
            panic!("expected a new plot");
        };
        let marker = traces[0].marker.clone().unwrap();
        assert_eq!(marker.opacity, Some(OneOrMany::Many(vec![1.0, 0.0, 1.0, 1.0])));
        assert_eq!(marker.symbol.as_deref(), Some("square"));
        assert_eq!(layout["yaxis"]["autorange"], "reversed");
        assert_eq!(layout["yaxis"]["title"], "depth");
        assert_eq!(layout["height"], 480);

        assert_eq!(chart.hidden_points(), vec![1]);
        assert_eq!(chart.visible_points_count(), 3);
        assert!(chart.is_point_hidden_by_id(&json!("p2")));
        assert_eq!(chart.point_index_by_id(&json!("p4")), Some(3));
        assert_eq!(chart.point_index_by_id(&json!("nope")), None);
    }

    #[test]
    fn test_select_toggle_and_hide() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        let seen = record(&mut chart, SELECTION_CHANGE);

        assert!(!chart.handle_plot_click(0, 0));
        assert!(chart.enter_select_mode());
        assert_eq!(harness.surface.cursor(), "crosshair");

        assert!(chart.handle_plot_click(0, 2));
        assert!(chart.handle_plot_click(0, 3));
        assert!(chart.handle_plot_click(0, 3));
        assert_eq!(chart.selected_point_ids(), vec![json!("p3")]);
        assert!(chart.is_point_selected_by_id(&json!("p3")));

        let events = seen.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["index"], 2);
        assert_eq!(events[0]["b"], "y");
        drop(events);

        let (borders, _) = harness.backend.restyles().pop().unwrap();
        let Some(ColorSpec::PerPoint(colors)) = borders.marker_line_color else {
            panic!("expected per-point border colours");
        };
        assert_eq!(colors[2], "red");
        assert_eq!(colors[3], "white");

        assert!(chart.hide_selected_points());
        assert_eq!(chart.hidden_points(), vec![1, 2]);
        assert!(chart.selected_points().is_empty());
        assert_eq!(chart.visible_points_count(), 2);

        assert!(chart.show_hidden_points());
        assert!(chart.hidden_points().is_empty());
        assert!(!chart.show_hidden_points());
    }

    #[test]
    fn test_exit_select_mode_clears_selection() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        chart.enter_select_mode();
        chart.handle_plot_click(0, 1);
        assert!(chart.exit_select_mode());
        assert!(chart.selected_points().is_empty());
        assert_eq!(harness.surface.cursor(), "auto");
        assert!(!chart.exit_select_mode());
    }

    #[test]
    fn test_property_view_reports_clicks() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        chart.set_point_click_callback(
            Box::new(move |payload| {
                sink.borrow_mut().push(serde_json::to_value(payload)?);
                Ok(())
            }),
            "pointer",
        );
        assert!(chart.is_in_property_view_mode());
        assert_eq!(harness.surface.cursor(), "pointer");

        assert!(chart.handle_plot_click(0, 1));
        assert!(!chart.handle_plot_click(1, 0));
        assert_eq!(seen.borrow()[0]["pointIndex"], 1);
        assert_eq!(seen.borrow()[0]["a"], 2);

        assert!(chart.remove_point_click_callback());
        assert!(!chart.handle_plot_click(0, 1));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(chart.listener_count(POINT_CLICK), 0);
    }

    #[test]
    fn test_update_scatter_data_resets_hidden_and_keeps_scale() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        harness.backend.clear_calls();

        assert!(chart.update_scatter_data(&json!({
            "x": [1, 2], "y": [3, 4], "v": [7, 9], "visible": [1, 0]
        })));
        assert_eq!(chart.hidden_points(), vec![0]);
        let (patch, indices) = harness.backend.restyles().remove(0);
        assert_eq!(indices, vec![0]);
        assert_eq!(patch.marker_opacity, Some(OneOrMany::Many(vec![0.0, 1.0])));
        assert_eq!(patch.marker_colorscale.map(|s| s.len()), Some(20));

        let range = chart.get_value_range().unwrap();
        assert_eq!((range.zmin, range.zmax), (Some(7.0), Some(9.0)));
        assert!(!chart.update_scatter_data(&json!({ "x": [1], "y": [] })));
    }

    #[test]
    fn test_color_scale_updates() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        let scale = json!([[0, "blue"], [1, "red"]]);

        assert!(!chart.update_color_scale(&json!([[0, "blue"]])));
        assert!(chart.update_color_scale_and_range(&json!({ "colorscale": scale, "zmin": 0, "zmax": 50 })));
        let marker = chart.plot().trace(0).and_then(|t| t.marker.clone()).unwrap();
        assert_eq!((marker.cmin, marker.cmax), (Some(0.0), Some(50.0)));
        assert_eq!(chart.get_color_scale().map(|s| s.len()), Some(2));

        assert!(chart.update_scatter_data_and_color_scale(
            &json!({ "x": [1], "y": [1], "v": [3], "zmax": 10 }),
            &json!([[0, "black"], [0.5, "grey"], [1, "white"]]),
        ));
        let marker = chart.plot().trace(0).and_then(|t| t.marker.clone()).unwrap();
        assert_eq!(marker.cmax, Some(10.0));
        assert_eq!(chart.get_color_scale().map(|s| s.len()), Some(3));
    }

    #[test]
    fn test_header_points_labels_thinned() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        let points: Vec<Value> = (0..10)
            .map(|i| json!({ "x": i, "y": i, "num": i + 100 }))
            .collect();

        let index = chart
            .add_header_points(&Value::Array(points), &json!({ "showLabels": true, "maxLabels": 4 }))
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(chart.trace_count(), 2);

        let trace = chart.plot().trace(index).unwrap();
        assert_eq!(trace.mode.as_deref(), Some("markers+text"));
        let text = trace.text.clone().unwrap();
        // ceil(10 / 4) = 3
        assert_eq!(text[0], "100");
        assert_eq!(text[1], "");
        assert_eq!(text[3], "103");
        assert_eq!(trace.marker.as_ref().and_then(|m| m.color.clone()), Some(ColorSpec::Css("red".to_string())));

        assert!(chart.add_header_points(&json!([]), &Value::Null).is_none());
    }

    #[test]
    fn test_header_highlight_and_reset() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        let index = chart
            .add_header_points(&header_points(), &json!({ "markerColor": "black" }))
            .unwrap();

        assert!(!chart.highlight_header_points(&[1.0, 2.0]));
        assert!(chart.highlight_header_points(&[3.0, 9.0, 1.0, 8.0]));
        let color = chart.plot().trace(index).and_then(|t| t.marker.clone()).and_then(|m| m.color);
        assert_eq!(
            color,
            Some(ColorSpec::Mixed(vec![json!("green"), json!("black"), json!("red")]))
        );

        // A second highlight still starts from the saved colours
        chart.highlight_header_points(&[2.0, 0.0, 0.0, 0.0]);
        let color = chart.plot().trace(index).and_then(|t| t.marker.clone()).and_then(|m| m.color);
        assert_eq!(
            color,
            Some(ColorSpec::Mixed(vec![json!("black"), json!("red"), json!("black")]))
        );

        assert!(chart.reset_header_points_color(index));
        let color = chart.plot().trace(index).and_then(|t| t.marker.clone()).and_then(|m| m.color);
        assert_eq!(color, Some(ColorSpec::Css("black".to_string())));
        assert!(!chart.reset_header_points_color(0));
    }

    #[test]
    fn test_header_update_and_remove() {
        let harness = Harness::new();
        let mut chart = chart(&harness);
        let index = chart.add_header_points(&header_points(), &Value::Null).unwrap();

        assert!(!chart.update_header_points(0, &header_points(), &Value::Null));
        assert!(chart.update_header_points(
            index,
            &json!([{ "x": 5, "y": 5, "v": 1.5, "num": 7 }]),
            &json!({ "showLabels": true, "markerSize": 14 }),
        ));
        let trace = chart.plot().trace(index).unwrap();
        assert_eq!(trace.mode.as_deref(), Some("markers+text"));
        assert_eq!(trace.x, vec![5.0]);
        let marker = trace.marker.clone().unwrap();
        assert_eq!(marker.color, Some(ColorSpec::Values(vec![1.5])));
        assert_eq!(marker.size, Some(OneOrMany::One(14.0)));

        assert!(!chart.remove_header_points(0));
        assert!(chart.remove_header_points(index));
        assert_eq!(chart.trace_count(), 1);
    }
}
