//! Annotation subsystem shared by both chart kinds
//!
//! Owns the plot mirror, the drawing state machine, the annotation registry
//! operations, the event bus and the ancillary views. Public methods follow
//! one convention: failures are logged and reported as `false`/`None`, never
//! propagated to the caller.

use annotations::registry::{self, LabelChange, StyleUpdatePlan};
use annotations::{PropertiesUpdate, Shape, ShapeFactory, StylePatch, TracePatch, VisibilityFlags};
use serde::Deserialize;
use serde_json::Value;
use shared_types::events::PointerEvent;
use shared_types::{AnnotateError, AnnotateResult, DataPoint, LegendBand, ShapeKind, Viewport};

use crate::backend::{ChartParts, Clock};
use crate::color_bar::ColorBar;
use crate::config::{ChartConfig, ColorBarOptions, ColorBarOptionsPatch};
use crate::drawing::{DrawingContext, DrawingMachine, DrawingSession};
use crate::eagle_eye::EagleEye;
use crate::event_bus::{EventBus, EventPayload, Listener, ListenerId};
use crate::event_manager::EventManager;
use crate::plot::Plot;
use crate::scheduler::TimedTasks;

/// Default padding fraction around a located shape
pub const DEFAULT_LOCATE_PADDING: f64 = 0.1;

/// A persisted shape handed back by the caller
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub create_time: Option<String>,
    pub note: Option<String>,
    pub status: Option<String>,
    pub style: Value,
    pub points: Vec<DataPoint>,
}

impl ShapeRecord {
    /// Check the record and build the stored shape
    pub fn to_shape(&self) -> AnnotateResult<Shape> {
        if self.id.is_empty() || self.name.is_empty() || self.kind.is_empty() || self.points.is_empty() {
            return Err(AnnotateError::invalid("shape record needs id, name, type and points"));
        }
        let kind: ShapeKind = self.kind.parse()?;
        if kind.is_multi_point() && self.points.len() < 2 {
            return Err(AnnotateError::invalid(format!("{kind} needs at least 2 points")));
        }

        let patch = StylePatch::from_value(kind, &self.style)?;
        let mut shape = Shape::from_patch(self.id.as_str(), &patch).with_name(self.name.as_str());
        if let Some(create_time) = &self.create_time {
            shape = shape.with_create_time(create_time.as_str());
        }
        shape.update_properties(&PropertiesUpdate {
            status: self.status.clone(),
            note: self.note.clone(),
            ..PropertiesUpdate::default()
        })?;
        Ok(shape)
    }
}

pub struct Annotator {
    config: ChartConfig,
    plot: Plot,
    factory: ShapeFactory,
    events: EventManager,
    bus: EventBus,
    drawing: DrawingMachine,
    /// Highlight reverts keyed by shape id
    highlights: TimedTasks<String, TracePatch>,
    eagle_eye: Option<EagleEye>,
    color_bar: ColorBar,
    clock: Box<dyn Clock>,
}

impl Annotator {
    pub fn new(parts: ChartParts, config: ChartConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("Invalid chart config, using defaults: {e}");
                ChartConfig::default()
            }
        };
        Self {
            drawing: DrawingMachine::new(config.max_preview_points, config.draw_start_debounce_ms),
            plot: Plot::new(parts.backend),
            factory: ShapeFactory::new(),
            events: EventManager::new(parts.surface),
            bus: EventBus::new(),
            highlights: TimedTasks::new(),
            eagle_eye: None,
            color_bar: ColorBar::new(parts.legend),
            clock: parts.clock,
            config,
        }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn plot(&self) -> &Plot {
        &self.plot
    }

    pub(crate) fn plot_mut(&mut self) -> &mut Plot {
        &mut self.plot
    }

    pub fn is_initialized(&self) -> bool {
        self.plot.is_initialized()
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    pub(crate) fn set_cursor(&mut self, cursor: &str) {
        self.events.set_cursor(cursor);
    }

    fn drawing_parts(&mut self) -> (&mut DrawingMachine, DrawingContext<'_>) {
        (
            &mut self.drawing,
            DrawingContext {
                plot: &mut self.plot,
                factory: &mut self.factory,
                events: &mut self.events,
                bus: &self.bus,
            },
        )
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    pub fn start_drawing(&mut self, kind: ShapeKind, options: &Value) -> bool {
        let patch = match StylePatch::from_value(kind, options) {
            Ok(patch) => patch,
            Err(e) => {
                log::warn!("Invalid {kind} options: {e}");
                return false;
            }
        };
        let now = self.now();
        let (drawing, mut ctx) = self.drawing_parts();
        drawing.request_start(&mut ctx, patch, now)
    }

    pub fn start_draw_point(&mut self, options: &Value) -> bool {
        self.start_drawing(ShapeKind::Point, options)
    }

    pub fn start_draw_polyline(&mut self, options: &Value) -> bool {
        self.start_drawing(ShapeKind::Polyline, options)
    }

    pub fn start_draw_polygon(&mut self, options: &Value) -> bool {
        self.start_drawing(ShapeKind::Polygon, options)
    }

    pub fn start_draw_text(&mut self, options: &Value) -> bool {
        self.start_drawing(ShapeKind::Text, options)
    }

    pub fn cancel_drawing(&mut self) -> bool {
        let (drawing, mut ctx) = self.drawing_parts();
        match drawing.cancel(&mut ctx) {
            Ok(dropped) => dropped,
            Err(e) => {
                log::error!("Failed to cancel drawing: {e}");
                true
            }
        }
    }

    /// Same as a secondary click: commit when enough points are in
    pub fn finish_drawing(&mut self) -> bool {
        let (drawing, mut ctx) = self.drawing_parts();
        drawing.finish(&mut ctx).unwrap_or_else(|e| {
            log::error!("Failed to finish drawing: {e}");
            false
        })
    }

    pub fn handle_pointer_event(&mut self, event: &PointerEvent) {
        let (drawing, mut ctx) = self.drawing_parts();
        if let Err(e) = drawing.handle_pointer(&mut ctx, event) {
            log::error!("Pointer {:?} failed: {e}", event.kind);
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing.is_drawing()
    }

    pub fn drawing_session(&self) -> Option<&DrawingSession> {
        self.drawing.session()
    }

    pub fn drawing_machine(&self) -> &DrawingMachine {
        &self.drawing
    }

    /// Run everything due at `now`: the drawing frame, highlight reverts and
    /// the eagle-eye rectangle
    pub fn on_animation_frame(&mut self, now: f64) {
        let (drawing, mut ctx) = self.drawing_parts();
        if let Err(e) = drawing.on_frame(&mut ctx, now) {
            log::error!("Drawing frame failed: {e}");
        }

        for (id, revert) in self.highlights.drain_due(now) {
            let Some(index) = registry::find_shape_index(self.plot.traces(), &id) else {
                continue;
            };
            if let Err(e) = self.plot.restyle(&revert, &[index]) {
                log::error!("Failed to revert highlight of {id}: {e}");
            }
        }

        if let Some(eagle) = self.eagle_eye.as_mut() {
            if let Err(e) = eagle.poll(now) {
                log::error!("Eagle-eye update failed: {e}");
            }
        }
    }

    /// Whether the frame loop still has work queued
    pub fn has_pending_frame_work(&self) -> bool {
        self.drawing.has_pending_start()
            || self.drawing.has_pending_refresh()
            || !self.highlights.is_empty()
            || self.eagle_eye.as_ref().is_some_and(EagleEye::has_pending_viewport)
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Remove a shape and its dependent labels
    pub fn delete_shape(&mut self, id: &str) -> bool {
        let indices = registry::cascade_delete_indices(self.plot.traces(), id);
        if indices.is_empty() {
            log::warn!("Cannot delete shape {id}: not found");
            return false;
        }
        self.highlights.remove(&id.to_string());
        match self.plot.delete_traces(&indices) {
            Ok(()) => {
                log::info!("Deleted shape {id} ({} layers)", indices.len());
                true
            }
            Err(e) => {
                log::error!("Failed to delete shape {id}: {e}");
                false
            }
        }
    }

    /// Frame the shape and briefly highlight its stroke
    pub fn locate_shape(&mut self, id: &str, padding: Option<f64>) -> bool {
        match self.try_locate(id, padding.unwrap_or(DEFAULT_LOCATE_PADDING)) {
            Ok(()) => true,
            Err(AnnotateError::ShapeNotFound { .. }) => {
                log::warn!("Cannot locate shape {id}: not found");
                false
            }
            Err(e) => {
                log::error!("Failed to locate shape {id}: {e}");
                false
            }
        }
    }

    fn try_locate(&mut self, id: &str, padding: f64) -> AnnotateResult<()> {
        let plan = registry::locate_plan(
            self.plot.traces(),
            id,
            padding,
            self.plot.container_size(),
            &self.config.highlight_color,
        )?;
        self.plot.relayout(&annotations::LayoutPatch::ranges(&plan.viewport))?;
        self.push_viewport(plan.viewport);

        if let Some(highlight) = plan.highlight {
            self.plot.restyle(&highlight.apply, &[plan.index])?;
            let due = self.now() + self.config.highlight_duration_ms;
            self.highlights.schedule(id.to_string(), due, highlight.revert);
        }
        Ok(())
    }

    pub fn update_shape_style(&mut self, id: &str, kind: &str, style: &Value) -> bool {
        let plan = kind
            .parse::<ShapeKind>()
            .and_then(|kind| StylePatch::from_value(kind, style))
            .and_then(|patch| registry::style_update_plan(self.plot.traces(), id, &patch));
        self.apply_update_plan(id, plan)
    }

    pub fn update_shape_properties(&mut self, id: &str, properties: &Value) -> bool {
        let plan = serde_json::from_value::<PropertiesUpdate>(properties.clone())
            .map_err(AnnotateError::from)
            .and_then(|update| registry::properties_update_plan(self.plot.traces(), id, &update));
        self.apply_update_plan(id, plan)
    }

    fn apply_update_plan(&mut self, id: &str, plan: AnnotateResult<StyleUpdatePlan>) -> bool {
        let result = plan.and_then(|plan| {
            // A pending highlight revert would restore the old style
            self.highlights.remove(&id.to_string());
            self.plot.restyle(&plan.primary, &[plan.index])?;
            match plan.label {
                LabelChange::Unchanged => {}
                LabelChange::Restyle(index, patch) => self.plot.restyle(&patch, &[index])?,
                LabelChange::Add(label) => {
                    self.plot.add_traces(vec![label])?;
                }
            }
            Ok(())
        });
        match result {
            Ok(()) => true,
            Err(AnnotateError::ShapeNotFound { .. }) => {
                log::warn!("Cannot update shape {id}: not found");
                false
            }
            Err(e) => {
                log::warn!("Failed to update shape {id}: {e}");
                false
            }
        }
    }

    pub fn get_shape_properties(&self, id: &str) -> Option<Value> {
        let Some(index) = registry::find_shape_index(self.plot.traces(), id) else {
            log::warn!("Shape {id} not found");
            return None;
        };
        let shape = self.plot.trace(index)?.shape()?;
        match serde_json::to_value(shape) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("Failed to serialize shape {id}: {e}");
                None
            }
        }
    }

    /// Ids of every persisted shape in layer order
    pub fn shape_ids(&self) -> Vec<String> {
        self.plot
            .traces()
            .iter()
            .filter_map(|trace| trace.shape().map(|shape| shape.id().to_string()))
            .collect()
    }

    /// Restore a shape the caller persisted earlier
    pub fn init_shape(&mut self, data: &Value) -> bool {
        let result = serde_json::from_value::<ShapeRecord>(data.clone())
            .map_err(AnnotateError::from)
            .and_then(|record| {
                let shape = record.to_shape()?;
                if registry::find_shape_index(self.plot.traces(), shape.id()).is_some() {
                    return Err(AnnotateError::invalid(format!("shape {} already exists", shape.id())));
                }
                let layers = shape.to_renderable(&record.points);
                self.plot.add_traces(layers.into_traces())?;
                Ok(shape)
            });
        match result {
            Ok(shape) => {
                log::info!("Restored {} {}", shape.kind(), shape.id());
                true
            }
            Err(e) => {
                log::warn!("Invalid shape data: {e}");
                false
            }
        }
    }

    pub fn set_shapes_visibility(&mut self, flags: &Value) -> bool {
        let flags = match serde_json::from_value::<VisibilityFlags>(flags.clone()) {
            Ok(flags) => flags,
            Err(e) => {
                log::warn!("Invalid visibility flags: {e}");
                return false;
            }
        };
        for (index, patch) in registry::visibility_plan(self.plot.traces(), &flags) {
            if let Err(e) = self.plot.restyle(&patch, &[index]) {
                log::error!("Failed to apply visibility to layer {index}: {e}");
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn on(&mut self, event: &str, listener: Listener) -> ListenerId {
        self.bus.on(event, listener)
    }

    pub fn off(&mut self, event: &str, id: ListenerId) -> bool {
        self.bus.off(event, id)
    }

    pub fn emit(&self, event: &str, payload: &EventPayload) -> usize {
        self.bus.emit(event, payload)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.bus.listener_count(event)
    }

    // ------------------------------------------------------------------
    // Eagle-eye
    // ------------------------------------------------------------------

    pub(crate) fn set_eagle_eye(&mut self, mut eagle: EagleEye) {
        self.remove_eagle_eye();
        if let Some(viewport) = self.plot.viewport() {
            eagle.push_viewport(viewport);
        }
        self.eagle_eye = Some(eagle);
    }

    pub fn eagle_eye(&self) -> Option<&EagleEye> {
        self.eagle_eye.as_ref()
    }

    pub fn has_eagle_eye(&self) -> bool {
        self.eagle_eye.is_some()
    }

    pub fn remove_eagle_eye(&mut self) {
        if let Some(mut eagle) = self.eagle_eye.take() {
            if let Err(e) = eagle.dispose() {
                log::error!("Failed to dispose eagle-eye: {e}");
            }
        }
    }

    /// Queue the main view window for the overview rectangle
    pub fn push_viewport(&mut self, viewport: Viewport) {
        if let Some(eagle) = self.eagle_eye.as_mut() {
            eagle.push_viewport(viewport);
        }
    }

    pub(crate) fn mirror_to_eagle_eye(&mut self, patch: &TracePatch) {
        if let Some(eagle) = self.eagle_eye.as_mut() {
            if let Err(e) = eagle.mirror(patch) {
                log::error!("Eagle-eye mirror failed: {e}");
            }
        }
    }

    pub(crate) fn eagle_eye_layout(&mut self, layout: &Value) {
        if let Some(eagle) = self.eagle_eye.as_mut() {
            if let Err(e) = eagle.update_layout(layout) {
                log::error!("Eagle-eye layout update failed: {e}");
            }
        }
    }

    // ------------------------------------------------------------------
    // Colour bar
    // ------------------------------------------------------------------

    /// `bands` is `[[level, color], ...]`. Returns `false` on invalid input;
    /// a render deferred by a hidden host still counts as success.
    pub fn add_color_bar(&mut self, bands: &Value, options: &Value) -> bool {
        let parsed = parse_bands(bands).and_then(|bands| {
            let options = if options.is_null() {
                ColorBarOptions::default()
            } else {
                serde_json::from_value(options.clone())?
            };
            Ok((bands, options))
        });
        let result = parsed.and_then(|(bands, options)| self.color_bar.add(&bands, options));
        report_color_bar("add", result)
    }

    pub fn update_color_bar(&mut self, bands: &Value, options: &Value) -> bool {
        let parsed = parse_bands(bands).and_then(|bands| {
            let patch = if options.is_null() {
                ColorBarOptionsPatch::default()
            } else {
                serde_json::from_value(options.clone())?
            };
            Ok((bands, patch))
        });
        let result = parsed.and_then(|(bands, patch)| self.color_bar.update(&bands, &patch));
        report_color_bar("update", result)
    }

    pub fn remove_color_bar(&mut self) {
        if let Err(e) = self.color_bar.remove() {
            log::error!("Failed to remove colour bar: {e}");
        }
    }

    /// Render a colour bar deferred while its host was hidden. Returns
    /// whether anything was drawn.
    pub fn check_pending_color_bar_update(&mut self) -> bool {
        self.color_bar.check_pending().unwrap_or_else(|e| {
            log::error!("Deferred colour bar render failed: {e}");
            false
        })
    }

    pub fn color_bar(&self) -> &ColorBar {
        &self.color_bar
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn resize(&mut self) -> bool {
        match self.plot.resize() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Resize failed: {e}");
                false
            }
        }
    }

    /// Release listeners, timers and views. Safe to call twice.
    pub fn dispose(&mut self) {
        self.cancel_drawing();
        self.events.remove_events();
        self.highlights.clear();
        self.remove_eagle_eye();
        self.remove_color_bar();
        if let Err(e) = self.plot.purge() {
            log::error!("Failed to purge plot: {e}");
        }
        self.factory.clear_cache();
        self.bus.clear();
        log::info!("Chart disposed");
    }
}

fn parse_bands(bands: &Value) -> AnnotateResult<Vec<LegendBand>> {
    Ok(serde_json::from_value(bands.clone())?)
}

fn report_color_bar(operation: &str, result: AnnotateResult<bool>) -> bool {
    match result {
        Ok(rendered) => {
            if !rendered {
                log::debug!("Colour bar {operation} deferred until the host is visible");
            }
            true
        }
        Err(e) => {
            log::warn!("Colour bar {operation} failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use annotations::Trace;
    use serde_json::json;

    fn annotator(harness: &Harness) -> Annotator {
        let mut annotator = Annotator::new(harness.parts(), ChartConfig::default());
        annotator
            .plot_mut()
            .new_plot(vec![Trace::contour()], json!({}), &json!({}))
            .unwrap();
        annotator
    }

    #[test]
    fn test_invalid_config_replaced_by_defaults() {
        let harness = Harness::new();
        let config = ChartConfig {
            max_preview_points: 0,
            ..ChartConfig::default()
        };
        let annotator = Annotator::new(harness.parts(), config);
        assert_eq!(annotator.config(), &ChartConfig::default());
    }

    #[test]
    fn test_shape_record_validation() {
        let record: ShapeRecord = serde_json::from_value(json!({
            "id": "a", "name": "line", "type": "polyline", "points": [{ "x": 1, "y": 1 }]
        }))
        .unwrap();
        assert!(record.to_shape().is_err());

        let record: ShapeRecord = serde_json::from_value(json!({
            "id": "a", "name": "mark", "type": "point", "points": [{ "x": 1, "y": 1 }],
            "createTime": "2024-01-02 03:04:05", "status": "archived"
        }))
        .unwrap();
        let shape = record.to_shape().unwrap();
        assert_eq!(shape.create_time(), "2024-01-02 03:04:05");
        assert_eq!(shape.status(), "archived");
        assert_eq!(shape.name(), Some("mark"));
    }

    #[test]
    fn test_init_shape_refuses_duplicates() {
        let harness = Harness::new();
        let mut annotator = annotator(&harness);
        let data = json!({
            "id": "p1", "name": "mark", "type": "point", "points": [{ "x": 1, "y": 2 }]
        });
        assert!(annotator.init_shape(&data));
        assert!(!annotator.init_shape(&data));
        assert_eq!(annotator.shape_ids(), vec!["p1".to_string()]);
    }

    #[test]
    fn test_unknown_ids_return_sentinels() {
        let harness = Harness::new();
        let mut annotator = annotator(&harness);
        assert!(!annotator.delete_shape("missing"));
        assert!(!annotator.locate_shape("missing", None));
        assert!(!annotator.update_shape_style("missing", "point", &json!({})));
        assert!(annotator.get_shape_properties("missing").is_none());
    }

    #[test]
    fn test_invalid_drawing_options_refused() {
        let harness = Harness::new();
        let mut annotator = annotator(&harness);
        assert!(!annotator.start_draw_point(&json!({ "size": "large" })));
        assert!(!annotator.is_drawing());
    }

    #[test]
    fn test_dispose_releases_everything() {
        let harness = Harness::new();
        let mut annotator = annotator(&harness);
        annotator.start_draw_point(&Value::Null);
        assert!(annotator.is_drawing());

        annotator.dispose();
        assert!(!annotator.is_drawing());
        assert!(!annotator.is_initialized());
        assert!(harness.surface.attached().is_empty());

        annotator.dispose();
    }
}
