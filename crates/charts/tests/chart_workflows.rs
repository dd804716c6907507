//! End-to-end chart workflows driven through recording collaborators and a
//! manual clock

use std::cell::RefCell;
use std::rc::Rc;

use charts::testing::{BackendCall, Harness, RecordingBackend};
use charts::{ChartConfig, ContourChart, ScatterChart, DRAWING_COMPLETE, SELECTION_CHANGE};
use serde_json::{json, Value};
use shared_types::events::{PointerEvent, RelayoutEvent};
use shared_types::{AxisRange, Viewport};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn contour(harness: &Harness) -> ContourChart {
    let mut chart = ContourChart::new(harness.parts(), ChartConfig::default());
    assert!(chart.init(&json!({
        "data": {
            "x": [0, 50, 100],
            "y": [0, 50, 100],
            "z": [[1, 2, 3], [4, 5, 6], [7, 8, 9]]
        }
    })));
    chart
}

fn collect(chart: &mut charts::Annotator, event: &str) -> Rc<RefCell<Vec<Value>>> {
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

/// Start a polygon, wait out the debounce and click three vertices
fn draw_triangle(chart: &mut ContourChart, harness: &Harness) {
    assert!(chart.start_draw_polygon(&json!({ "fillStyle": { "color": "#00ff00" } })));
    assert!(!chart.is_drawing());
    let now = harness.clock.advance(5.0);
    chart.on_animation_frame(now);
    assert!(chart.is_drawing());

    for (x, y) in [(10.0, 10.0), (40.0, 10.0), (25.0, 30.0)] {
        chart.handle_pointer_event(&PointerEvent::moved(x, y));
        chart.handle_pointer_event(&PointerEvent::click(x, y));
    }
    let now = harness.clock.advance(16.0);
    chart.on_animation_frame(now);
    chart.handle_pointer_event(&PointerEvent::context_menu(25.0, 30.0));
}

#[test]
fn test_polygon_drawing_lifecycle() {
    init_logging();
    let harness = Harness::new();
    let mut chart = contour(&harness);
    let completed = collect(&mut chart, DRAWING_COMPLETE);

    draw_triangle(&mut chart, &harness);

    assert!(!chart.is_drawing());
    assert!(harness.surface.attached().is_empty());
    assert_eq!(harness.surface.cursor(), "auto");

    let events = completed.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "polygon");
    assert_eq!(events[0]["isClosed"], true);
    assert_eq!(events[0]["points"].as_array().map(Vec::len), Some(3));

    let ids = chart.shape_ids();
    assert_eq!(ids.len(), 1);
    assert!(ids[0].starts_with("shape_"));
    assert!(chart.plot().preview_index().is_none());

    let properties = chart.get_shape_properties(&ids[0]).unwrap();
    assert_eq!(properties["status"], "active");
    assert_eq!(properties["note"], "");
}

#[test]
fn test_cancel_mid_drawing_leaves_no_trace() {
    init_logging();
    let harness = Harness::new();
    let mut chart = contour(&harness);
    let completed = collect(&mut chart, DRAWING_COMPLETE);

    assert!(chart.start_draw_polyline(&Value::Null));
    chart.on_animation_frame(harness.clock.advance(10.0));
    chart.handle_pointer_event(&PointerEvent::click(1.0, 1.0));
    assert!(chart.cancel_drawing());

    assert_eq!(chart.plot().len(), 1);
    assert!(completed.borrow().is_empty());
    assert!(!chart.has_pending_frame_work());
}

#[test]
fn test_locate_highlight_reverts_after_duration() {
    init_logging();
    let harness = Harness::new();
    let mut chart = contour(&harness);
    draw_triangle(&mut chart, &harness);
    let id = chart.shape_ids().remove(0);
    harness.backend.clear_calls();

    assert!(chart.locate_shape(&id, None));
    let ranges = harness.backend.relayouts().remove(0);
    let [x0, x1] = ranges.x_range.unwrap();
    assert!(x0 < 10.0 && x1 > 40.0);
    assert_eq!(harness.backend.restyles().len(), 1);

    chart.on_animation_frame(harness.clock.advance(500.0));
    assert_eq!(harness.backend.restyles().len(), 1);

    chart.on_animation_frame(harness.clock.advance(600.0));
    let restyles = harness.backend.restyles();
    assert_eq!(restyles.len(), 2);
    assert_eq!(restyles[0].1, restyles[1].1);
    assert!(!chart.has_pending_frame_work());

    assert!(!chart.locate_shape("shape_missing", None));
}

#[test]
fn test_style_update_creates_label_then_delete_cascades() {
    init_logging();
    let harness = Harness::new();
    let mut chart = contour(&harness);
    draw_triangle(&mut chart, &harness);
    let id = chart.shape_ids().remove(0);
    let layers = chart.plot().len();

    assert!(chart.update_shape_style(&id, "polygon", &json!({ "text": { "content": "Zone A" } })));
    assert_eq!(chart.plot().len(), layers + 1);
    assert!(!chart.update_shape_style(&id, "polyline", &json!({ "color": "#000" })));

    assert!(chart.update_shape_properties(&id, &json!({ "name": "zone", "note": "checked" })));
    assert_eq!(chart.get_shape_properties(&id).unwrap()["note"], "checked");

    assert!(chart.delete_shape(&id));
    assert_eq!(chart.plot().len(), 1);
    assert!(chart.shape_ids().is_empty());
    assert!(!chart.delete_shape(&id));
}

#[test]
fn test_visibility_hides_shapes_and_their_labels() {
    init_logging();
    let harness = Harness::new();
    let mut chart = contour(&harness);
    assert!(chart.init_shape(&json!({
        "id": "shape_saved",
        "name": "fault",
        "type": "polyline",
        "style": { "text": { "content": "F1" } },
        "points": [{ "x": 0, "y": 0 }, { "x": 10, "y": 10 }]
    })));
    let layers = chart.plot().len();
    assert!(layers >= 3);

    assert!(chart.set_shapes_visibility(&json!({ "showPolyline": false })));
    let hidden = chart
        .plot()
        .traces()
        .iter()
        .skip(1)
        .all(|trace| trace.visible == Some(false) && trace.opacity == Some(0.0));
    assert!(hidden);

    assert!(chart.set_shapes_visibility(&json!({})));
    assert!(chart.plot().traces().iter().skip(1).all(|trace| trace.visible == Some(true)));
}

#[test]
fn test_eagle_eye_follows_relayouts_at_frame_rate() {
    init_logging();
    let harness = Harness::new();
    let mut chart = contour(&harness);
    let overview = RecordingBackend::new();
    assert!(chart.add_eagle_eye(Box::new(overview.clone()), &Value::Null));

    let window = |max: f64| RelayoutEvent {
        viewport: Some(Viewport::new(AxisRange::new(0.0, max), AxisRange::new(0.0, max))),
        scale_locked: true,
    };
    chart.on_animation_frame(harness.clock.advance(1.0));
    let initial = overview.relayouts().len();

    chart.handle_relayout(&window(40.0));
    chart.handle_relayout(&window(30.0));
    chart.on_animation_frame(harness.clock.advance(20.0));
    chart.handle_relayout(&window(20.0));
    chart.on_animation_frame(harness.clock.advance(4.0));

    let rects = overview.relayouts();
    assert_eq!(rects.len(), initial + 1);
    assert_eq!(rects.last().and_then(|r| r.rect_x1), Some(30.0));

    chart.on_animation_frame(harness.clock.advance(16.0));
    assert_eq!(overview.relayouts().last().and_then(|r| r.rect_x1), Some(20.0));

    // Data changes reach the overview, label channels do not
    assert!(chart.set_contours_visible(false));
    let (mirrored, _) = overview.restyles().pop().unwrap();
    assert_eq!(mirrored.line_width, Some(0.0));

    chart.dispose();
    assert!(matches!(overview.calls().last(), Some(BackendCall::Purge)));
}

#[test]
fn test_color_bar_waits_for_visible_host() {
    init_logging();
    let harness = Harness::new();
    let mut chart = contour(&harness);
    harness.legend.set_host_height(None);

    let bands = json!([[30, "red"], [10, "blue"], [20, "green"]]);
    assert!(chart.add_color_bar(&bands, &json!({ "width": 20 })));
    assert!(harness.legend.calls().is_empty());
    assert!(!chart.check_pending_color_bar_update());

    harness.legend.set_host_height(Some(500.0));
    assert!(chart.check_pending_color_bar_update());
    assert_eq!(harness.legend.calls().len(), 1);
    assert_eq!(chart.color_bar().bands()[0].level(), 10.0);

    assert!(!chart.add_color_bar(&json!([[1, "red"]]), &Value::Null));
}

#[test]
fn test_scatter_selection_workflow_with_annotations() {
    init_logging();
    let harness = Harness::new();
    let mut chart = ScatterChart::new(harness.parts(), ChartConfig::default());
    assert!(chart.init(&json!({
        "data": {
            "x": [1, 2, 3],
            "y": [1, 2, 3],
            "v": [10, 20, 30],
            "visible": [0, 0, 0],
            "id": [101, 102, 103]
        }
    })));
    let selections = collect(&mut chart, SELECTION_CHANGE);

    chart.enter_select_mode();
    chart.handle_plot_click(0, 0);
    chart.handle_plot_click(0, 2);
    assert_eq!(selections.borrow().len(), 2);
    assert!(chart.hide_selected_points());
    assert_eq!(chart.hidden_point_ids(), vec![json!(101), json!(103)]);
    chart.exit_select_mode();

    // Annotation works on the scatter chart too
    assert!(chart.start_draw_point(&json!({ "color": "blue" })));
    chart.handle_pointer_event(&PointerEvent::click(2.0, 2.0));
    assert_eq!(chart.shape_ids().len(), 1);
    assert_eq!(chart.visible_points_count(), 1);
}
