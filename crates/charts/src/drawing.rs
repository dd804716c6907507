//! Drawing state machine
//!
//! `Idle -> Drawing(kind) -> {commit, cancel} -> Idle`. Pointer input only
//! mutates the session and schedules work; the plot is touched from
//! [`DrawingMachine::on_frame`], once per animation frame, through two
//! latest-wins refresh channels:
//!
//! - cursor refresh: preview coordinates only (committed points + cursor)
//! - full refresh: the whole preview layer recomputed from the shape
//!
//! Polyline and polygon starts are debounced; point and text start at once.

use std::rc::Rc;

use annotations::{decimate, generate_shape_id, LayoutPatch, Shape, ShapeFactory, StylePatch, TracePatch};
use shared_types::events::{PointerEvent, PointerEventKind};
use shared_types::{AnnotateResult, DataPoint, ShapeKind};

use crate::event_bus::{DrawingCompleteEvent, EventBus, EventPayload, DRAWING_COMPLETE};
use crate::event_manager::EventManager;
use crate::plot::Plot;
use crate::scheduler::{DelayedTask, FrameTask};

/// Chart parts a drawing session works on
pub struct DrawingContext<'a> {
    pub plot: &'a mut Plot,
    pub factory: &'a mut ShapeFactory,
    pub events: &'a mut EventManager,
    pub bus: &'a EventBus,
}

#[derive(Debug)]
pub struct DrawingSession {
    patch: StylePatch,
    shape: Rc<Shape>,
    committed: Vec<DataPoint>,
    cursor: Option<DataPoint>,
}

impl DrawingSession {
    pub fn kind(&self) -> ShapeKind {
        self.patch.kind()
    }

    pub fn shape_id(&self) -> &str {
        self.shape.id()
    }

    pub fn committed_points(&self) -> &[DataPoint] {
        &self.committed
    }

    pub fn cursor_point(&self) -> Option<DataPoint> {
        self.cursor
    }

    /// Committed points followed by the cursor, thinned to `max_points`
    fn render_buffer(&self, max_points: usize) -> Vec<DataPoint> {
        let mut points = Vec::with_capacity(self.committed.len() + 1);
        points.extend_from_slice(&self.committed);
        points.extend(self.cursor);
        decimate(&points, max_points)
    }
}

#[derive(Debug)]
enum DrawingState {
    Idle,
    Drawing(DrawingSession),
}

#[derive(Debug)]
pub struct DrawingMachine {
    state: DrawingState,
    pending_start: DelayedTask<StylePatch>,
    cursor_refresh: FrameTask<()>,
    full_refresh: FrameTask<()>,
    max_preview_points: usize,
    start_debounce_ms: f64,
}

impl DrawingMachine {
    pub fn new(max_preview_points: usize, start_debounce_ms: f64) -> Self {
        Self {
            state: DrawingState::Idle,
            pending_start: DelayedTask::new(),
            cursor_refresh: FrameTask::new(),
            full_refresh: FrameTask::new(),
            max_preview_points,
            start_debounce_ms,
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawingState::Drawing(_))
    }

    pub fn session(&self) -> Option<&DrawingSession> {
        match &self.state {
            DrawingState::Drawing(session) => Some(session),
            DrawingState::Idle => None,
        }
    }

    pub fn has_pending_start(&self) -> bool {
        self.pending_start.is_pending()
    }

    /// Whether a refresh is waiting for the next frame
    pub fn has_pending_refresh(&self) -> bool {
        self.cursor_refresh.is_pending() || self.full_refresh.is_pending()
    }

    /// Refreshes replaced before their frame, cursor channel then full channel
    pub fn superseded_refreshes(&self) -> (u64, u64) {
        (
            self.cursor_refresh.superseded_count(),
            self.full_refresh.superseded_count(),
        )
    }

    /// Ask for a new session. Returns `false` when the request is refused;
    /// a debounced request counts as accepted.
    pub fn request_start(&mut self, ctx: &mut DrawingContext<'_>, patch: StylePatch, now: f64) -> bool {
        let kind = patch.kind();
        if !ctx.plot.is_initialized() {
            log::warn!("Cannot start drawing {kind}: chart is not initialized");
            return false;
        }
        if self.is_drawing() {
            log::warn!("Cannot start drawing {kind}: a drawing session is already active");
            return false;
        }

        if kind.is_multi_point() {
            if self.pending_start.schedule(now, self.start_debounce_ms, patch) {
                log::debug!("Collapsed repeated {kind} start request");
            }
            return true;
        }

        match self.begin(ctx, patch) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to start drawing {kind}: {e}");
                false
            }
        }
    }

    fn begin(&mut self, ctx: &mut DrawingContext<'_>, patch: StylePatch) -> AnnotateResult<()> {
        let viewport = ctx.plot.viewport();
        ctx.plot.relayout(&LayoutPatch::drawing_lock(viewport.as_ref()))?;
        if let Err(e) = ctx.events.add_events() {
            let _ = ctx.plot.relayout(&LayoutPatch::interaction_restore());
            return Err(e);
        }

        let id = generate_shape_id();
        let shape = ctx.factory.create_shape(&id, &patch);
        if let Err(e) = ctx.plot.add_traces(vec![shape.preview_layer(&[])]) {
            ctx.events.remove_events();
            let _ = ctx.plot.relayout(&LayoutPatch::interaction_restore());
            return Err(e);
        }
        ctx.events.set_cursor("crosshair");

        log::info!("Drawing started: {} {id}", patch.kind());
        self.state = DrawingState::Drawing(DrawingSession {
            patch,
            shape,
            committed: Vec::new(),
            cursor: None,
        });
        Ok(())
    }

    pub fn handle_pointer(&mut self, ctx: &mut DrawingContext<'_>, event: &PointerEvent) -> AnnotateResult<()> {
        let DrawingState::Drawing(session) = &mut self.state else {
            return Ok(());
        };

        match event.kind {
            PointerEventKind::Move => {
                let Some(point) = ctx.plot.pixel_to_data(event.position) else {
                    return Ok(());
                };
                session.cursor = Some(point);
                self.cursor_refresh.schedule(());
            }
            PointerEventKind::Click => {
                let Some(point) = ctx.plot.pixel_to_data(event.position) else {
                    return Ok(());
                };
                if session.kind().is_multi_point() {
                    session.committed.push(point);
                    self.full_refresh.schedule(());
                } else {
                    session.committed = vec![point];
                    self.commit(ctx)?;
                }
            }
            PointerEventKind::ContextMenu => {
                self.finish(ctx)?;
            }
        }
        Ok(())
    }

    /// Commit the session if it has enough points. Returns whether it did.
    pub fn finish(&mut self, ctx: &mut DrawingContext<'_>) -> AnnotateResult<bool> {
        let DrawingState::Drawing(session) = &self.state else {
            return Ok(false);
        };
        let kind = session.kind();
        let required = kind.min_points();
        if session.committed.len() < required {
            log::warn!(
                "Cannot finish {kind}: {} point(s) committed, {required} required",
                session.committed.len()
            );
            return Ok(false);
        }
        self.commit(ctx)?;
        Ok(true)
    }

    fn commit(&mut self, ctx: &mut DrawingContext<'_>) -> AnnotateResult<()> {
        let DrawingState::Drawing(session) = std::mem::replace(&mut self.state, DrawingState::Idle) else {
            return Ok(());
        };
        self.drop_refreshes();

        let result = persist(ctx, &session);
        ctx.events.remove_events();
        ctx.events.set_cursor("auto");
        result
    }

    /// Abandon the session and any debounced start. Returns whether anything
    /// was dropped. No event is emitted.
    pub fn cancel(&mut self, ctx: &mut DrawingContext<'_>) -> AnnotateResult<bool> {
        let dropped_start = self.pending_start.cancel();
        let DrawingState::Drawing(session) = std::mem::replace(&mut self.state, DrawingState::Idle) else {
            return Ok(dropped_start);
        };
        self.drop_refreshes();

        let result = remove_preview(ctx.plot);
        ctx.events.remove_events();
        ctx.events.set_cursor("auto");
        log::info!("Drawing cancelled: {} {}", session.kind(), session.shape_id());
        result.map(|()| true)
    }

    /// Frame work: a due debounced start, then at most one refresh
    pub fn on_frame(&mut self, ctx: &mut DrawingContext<'_>, now: f64) -> AnnotateResult<()> {
        if let Some(patch) = self.pending_start.take_due(now) {
            if self.is_drawing() {
                log::warn!("Dropping delayed {} start: a drawing session is already active", patch.kind());
            } else {
                self.begin(ctx, patch)?;
            }
        }

        let DrawingState::Drawing(session) = &self.state else {
            self.drop_refreshes();
            return Ok(());
        };
        let Some(index) = ctx.plot.preview_index() else {
            return Ok(());
        };

        if self.full_refresh.take().is_some() {
            // The full refresh covers everything the cursor refresh would do
            self.cursor_refresh.cancel();
            let buffer = session.render_buffer(self.max_preview_points);
            let layer = session.shape.preview_layer(&buffer);
            ctx.plot.restyle(&TracePatch::restyle_from(&layer), &[index])?;
            log::trace!("Full preview refresh with {} points", buffer.len());
        } else if self.cursor_refresh.take().is_some() {
            let buffer = session.render_buffer(self.max_preview_points);
            let (x, y) = session.shape.path(&buffer);
            let patch = TracePatch {
                x: Some(x),
                y: Some(y),
                ..TracePatch::default()
            };
            ctx.plot.restyle(&patch, &[index])?;
        }
        Ok(())
    }

    fn drop_refreshes(&mut self) {
        self.cursor_refresh.cancel();
        self.full_refresh.cancel();
    }
}

/// Swap the preview for the final layers and announce the shape
fn persist(ctx: &mut DrawingContext<'_>, session: &DrawingSession) -> AnnotateResult<()> {
    let shape = ctx.factory.create_shape(session.shape_id(), &session.patch);
    let layers = shape.to_renderable(&session.committed);

    remove_preview(ctx.plot)?;
    ctx.plot.add_traces(layers.into_traces())?;

    log::info!(
        "Drawing complete: {} {} with {} points",
        shape.kind(),
        shape.id(),
        session.committed.len()
    );
    let event = DrawingCompleteEvent {
        shape: Shape::clone(&shape),
        points: session.committed.clone(),
        is_closed: shape.kind() == ShapeKind::Polygon,
    };
    ctx.bus.emit(DRAWING_COMPLETE, &EventPayload::DrawingComplete(event));
    Ok(())
}

fn remove_preview(plot: &mut Plot) -> AnnotateResult<()> {
    if let Some(index) = plot.preview_index() {
        plot.delete_traces(&[index])?;
    }
    plot.relayout(&LayoutPatch::interaction_restore())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendCall, RecordingBackend, RecordingSurface};
    use annotations::Trace;
    use serde_json::json;
    use std::cell::RefCell;

    struct Fixture {
        plot: Plot,
        factory: ShapeFactory,
        events: EventManager,
        bus: EventBus,
        backend: RecordingBackend,
        surface: RecordingSurface,
        completed: Rc<RefCell<Vec<serde_json::Value>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let backend = RecordingBackend::new();
            let surface = RecordingSurface::new();
            let mut plot = Plot::new(Box::new(backend.clone()));
            plot.new_plot(vec![Trace::contour()], json!({}), &json!({}))
                .unwrap();
            let completed = Rc::new(RefCell::new(Vec::new()));
            let mut bus = EventBus::new();
            let sink = completed.clone();
            bus.on(
                DRAWING_COMPLETE,
                Box::new(move |payload| {
                    sink.borrow_mut().push(serde_json::to_value(payload)?);
                    Ok(())
                }),
            );
            Self {
                plot,
                factory: ShapeFactory::new(),
                events: EventManager::new(Box::new(surface.clone())),
                bus,
                backend,
                surface,
                completed,
            }
        }

        fn ctx(&mut self) -> DrawingContext<'_> {
            DrawingContext {
                plot: &mut self.plot,
                factory: &mut self.factory,
                events: &mut self.events,
                bus: &self.bus,
            }
        }
    }

    fn machine() -> DrawingMachine {
        DrawingMachine::new(1000, 5.0)
    }

    #[test]
    fn test_point_click_commits_immediately() {
        let mut fx = Fixture::new();
        let mut drawing = machine();

        assert!(drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Point), 0.0));
        assert!(drawing.is_drawing());
        assert_eq!(fx.plot.preview_index(), Some(1));
        assert_eq!(fx.surface.cursor(), "crosshair");

        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(3.0, 4.0))
            .unwrap();

        assert!(!drawing.is_drawing());
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::moved(5.0, 5.0))
            .unwrap();
        drawing.on_frame(&mut fx.ctx(), 20.0).unwrap();
        assert!(!drawing.is_drawing());
        assert!(drawing.session().is_none());
        assert_eq!(fx.plot.preview_index(), None);
        assert_eq!(fx.plot.len(), 2);
        assert!(fx.surface.attached().is_empty());
        let completed = fx.completed.borrow();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0]["type"], "point");
        assert_eq!(completed[0]["isClosed"], false);
        assert_eq!(completed[0]["points"][0]["x"], 3.0);
    }

    #[test]
    fn test_second_start_refused_while_drawing() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polyline), 0.0);
        drawing.on_frame(&mut fx.ctx(), 5.0).unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(1.0, 1.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::moved(2.0, 3.0))
            .unwrap();
        let shape_id = drawing.session().unwrap().shape_id().to_string();

        assert!(!drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Point), 10.0));
        assert!(!drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polygon), 10.0));
        drawing.on_frame(&mut fx.ctx(), 20.0).unwrap();

        let session = drawing.session().unwrap();
        assert_eq!(session.kind(), ShapeKind::Polyline);
        assert_eq!(session.shape_id(), shape_id);
        assert_eq!(session.committed_points(), &[DataPoint::new(1.0, 1.0)]);
        assert_eq!(session.cursor_point(), Some(DataPoint::new(2.0, 3.0)));
        assert_eq!(fx.surface.attach_calls(), 1);
    }

    #[test]
    fn test_start_refused_before_init() {
        let backend = RecordingBackend::new();
        let mut plot = Plot::new(Box::new(backend));
        let mut factory = ShapeFactory::new();
        let mut events = EventManager::new(Box::new(RecordingSurface::new()));
        let bus = EventBus::new();
        let mut ctx = DrawingContext {
            plot: &mut plot,
            factory: &mut factory,
            events: &mut events,
            bus: &bus,
        };
        assert!(!machine().request_start(&mut ctx, StylePatch::empty(ShapeKind::Point), 0.0));
    }

    #[test]
    fn test_multi_point_start_is_debounced() {
        let mut fx = Fixture::new();
        let mut drawing = machine();

        assert!(drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polyline), 0.0));
        assert!(drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polygon), 2.0));
        assert!(!drawing.is_drawing());

        drawing.on_frame(&mut fx.ctx(), 6.0).unwrap();
        assert!(!drawing.is_drawing());

        drawing.on_frame(&mut fx.ctx(), 7.0).unwrap();
        assert_eq!(drawing.session().map(DrawingSession::kind), Some(ShapeKind::Polygon));
        assert_eq!(fx.surface.attach_calls(), 1);
    }

    #[test]
    fn test_secondary_click_needs_two_points() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polygon), 0.0);
        drawing.on_frame(&mut fx.ctx(), 5.0).unwrap();

        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(0.0, 0.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::context_menu(0.0, 0.0))
            .unwrap();
        assert!(drawing.is_drawing());

        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(4.0, 0.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(4.0, 4.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::moved(9.0, 9.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::context_menu(0.0, 0.0))
            .unwrap();

        assert!(!drawing.is_drawing());
        assert!(!drawing.has_pending_refresh());
        let completed = fx.completed.borrow();
        assert_eq!(completed[0]["isClosed"], true);
        // The cursor is never part of the committed shape
        assert_eq!(completed[0]["points"].as_array().map(Vec::len), Some(3));
        let polygon = fx.plot.trace(1).unwrap();
        assert_eq!(polygon.x, vec![0.0, 4.0, 4.0, 0.0]);
    }

    #[test]
    fn test_polyline_commits_with_exactly_two_points() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polyline), 0.0);
        drawing.on_frame(&mut fx.ctx(), 5.0).unwrap();

        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(0.0, 0.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(6.0, 2.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::context_menu(6.0, 2.0))
            .unwrap();

        assert!(!drawing.is_drawing());
        assert!(fx.surface.attached().is_empty());
        let completed = fx.completed.borrow();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0]["type"], "polyline");
        assert_eq!(completed[0]["isClosed"], false);
        assert_eq!(completed[0]["points"].as_array().map(Vec::len), Some(2));
        assert_eq!(fx.plot.trace(1).unwrap().x, vec![0.0, 6.0]);
    }

    #[test]
    fn test_failed_listener_attach_releases_lock() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        fx.surface.fail_next_attach();
        fx.backend.clear_calls();

        assert!(!drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Point), 0.0));
        assert!(!drawing.is_drawing());
        assert_eq!(fx.plot.preview_index(), None);
        let relayouts = fx.backend.relayouts();
        assert_eq!(relayouts.len(), 2);
        assert_eq!(relayouts[1], LayoutPatch::interaction_restore());
    }

    #[test]
    fn test_refresh_channels_are_latest_wins() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polyline), 0.0);
        drawing.on_frame(&mut fx.ctx(), 5.0).unwrap();
        fx.backend.clear_calls();

        for x in [1.0, 2.0, 3.0] {
            drawing
                .handle_pointer(&mut fx.ctx(), &PointerEvent::moved(x, x))
                .unwrap();
        }
        drawing.on_frame(&mut fx.ctx(), 20.0).unwrap();

        let restyles = fx.backend.restyles();
        assert_eq!(restyles.len(), 1);
        assert_eq!(restyles[0].0.x, Some(vec![3.0]));
        assert_eq!(drawing.superseded_refreshes().0, 2);

        drawing.on_frame(&mut fx.ctx(), 36.0).unwrap();
        assert_eq!(fx.backend.restyles().len(), 1);
    }

    #[test]
    fn test_full_refresh_replaces_cursor_refresh() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polygon), 0.0);
        drawing.on_frame(&mut fx.ctx(), 5.0).unwrap();
        fx.backend.clear_calls();

        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(1.0, 1.0))
            .unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::moved(2.0, 2.0))
            .unwrap();
        drawing.on_frame(&mut fx.ctx(), 20.0).unwrap();

        let restyles = fx.backend.restyles();
        assert_eq!(restyles.len(), 1);
        let (patch, _) = &restyles[0];
        // Closed path plus the layer style
        assert_eq!(patch.x, Some(vec![1.0, 2.0, 1.0]));
        assert!(patch.line_color.is_some());
        assert!(!drawing.has_pending_refresh());
    }

    #[test]
    fn test_decimation_never_touches_committed_points() {
        let mut fx = Fixture::new();
        let mut drawing = DrawingMachine::new(100, 0.0);
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polyline), 0.0);
        drawing.on_frame(&mut fx.ctx(), 0.0).unwrap();

        for i in 0..250 {
            let x = i as f64 / 10.0;
            drawing
                .handle_pointer(&mut fx.ctx(), &PointerEvent::click(x, x))
                .unwrap();
        }
        fx.backend.clear_calls();
        drawing.on_frame(&mut fx.ctx(), 16.0).unwrap();

        let rendered = fx.backend.restyles()[0].0.x.clone().unwrap();
        assert!(rendered.len() <= 102);
        assert_eq!(rendered.first(), Some(&0.0));
        assert_eq!(rendered.last(), Some(&24.9));
        assert_eq!(drawing.session().unwrap().committed_points().len(), 250);
    }

    #[test]
    fn test_cancel_drops_everything_without_event() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polyline), 0.0);
        drawing.on_frame(&mut fx.ctx(), 5.0).unwrap();
        drawing
            .handle_pointer(&mut fx.ctx(), &PointerEvent::click(1.0, 1.0))
            .unwrap();

        assert!(drawing.cancel(&mut fx.ctx()).unwrap());
        assert!(!drawing.is_drawing());
        assert!(!drawing.has_pending_refresh());
        assert_eq!(fx.plot.len(), 1);
        assert!(fx.surface.attached().is_empty());
        assert!(fx.completed.borrow().is_empty());
        assert!(matches!(
            fx.backend.calls().last(),
            Some(BackendCall::Relayout(patch)) if *patch == LayoutPatch::interaction_restore()
        ));
    }

    #[test]
    fn test_cancel_drops_pending_start() {
        let mut fx = Fixture::new();
        let mut drawing = machine();
        drawing.request_start(&mut fx.ctx(), StylePatch::empty(ShapeKind::Polyline), 0.0);
        assert!(drawing.cancel(&mut fx.ctx()).unwrap());
        drawing.on_frame(&mut fx.ctx(), 50.0).unwrap();
        assert!(!drawing.is_drawing());
        assert_eq!(fx.surface.attach_calls(), 0);
    }
}
