//! Annotation registry planning
//!
//! Pure functions over the ordered layer list: they find shapes and their
//! dependent labels by id and compute the restyle/relayout updates a chart
//! applies. Labels are found by scanning for `parent_id`; parents never hold
//! a reference to their label.

use serde::Deserialize;
use shared_types::{AnnotateError, AnnotateResult, AxisRange, BoundingBox, DataPoint, ShapeKind, Viewport};

use crate::shape::{PropertiesUpdate, Shape};
use crate::style::{ShapeStyle, StylePatch, TextLabelStyle};
use crate::trace::{CustomData, LayerMeta, Trace, TracePatch};

/// Index of the persisted shape layer with `id`
pub fn find_shape_index(traces: &[Trace], id: &str) -> Option<usize> {
    traces
        .iter()
        .position(|trace| trace.shape().is_some_and(|shape| shape.id() == id))
}

/// Index of the label layer that points back at `parent_id`
pub fn find_label_index(traces: &[Trace], parent_id: &str) -> Option<usize> {
    traces
        .iter()
        .position(|trace| trace.label().is_some_and(|label| label.parent_id == parent_id))
}

/// Layers removed by deleting `id`: the shape and every label whose
/// `parent_id` is `id`. Ascending order.
pub fn cascade_delete_indices(traces: &[Trace], id: &str) -> Vec<usize> {
    traces
        .iter()
        .enumerate()
        .filter(|(_, trace)| match trace.meta() {
            Some(LayerMeta::Shape(shape)) => shape.id() == id,
            Some(LayerMeta::Label(label)) => label.parent_id == id,
            _ => false,
        })
        .map(|(index, _)| index)
        .collect()
}

/// The points a shape was drawn with, dropping the polygon closing point
pub fn shape_points(trace: &Trace) -> Vec<DataPoint> {
    let mut points = trace.points();
    let closed_polygon = trace
        .shape()
        .is_some_and(|shape| shape.kind() == ShapeKind::Polygon);
    if closed_polygon && points.len() >= 2 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Viewport framing `bbox` with `padding` on each side, widened on one axis
/// so the data aspect matches the container's `(width, height)`.
pub fn fit_viewport(bbox: &BoundingBox, padding: f64, container: (f64, f64)) -> Viewport {
    let padded = bbox.padded(padding);
    let mut x = AxisRange::new(padded.min_x, padded.max_x);
    let mut y = AxisRange::new(padded.min_y, padded.max_y);

    // A single point or a straight line has no extent on some axis
    if x.span() <= 0.0 {
        x = AxisRange::new(x.center() - 0.5, x.center() + 0.5);
    }
    if y.span() <= 0.0 {
        y = AxisRange::new(y.center() - 0.5, y.center() + 0.5);
    }

    let (width, height) = container;
    if width > 0.0 && height > 0.0 {
        let container_aspect = width / height;
        let data_aspect = x.span() / y.span();
        if data_aspect > container_aspect {
            let half = x.span() / container_aspect / 2.0;
            let center = y.center();
            y = AxisRange::new(center - half, center + half);
        } else {
            let half = y.span() * container_aspect / 2.0;
            let center = x.center();
            x = AxisRange::new(center - half, center + half);
        }
    }
    Viewport::new(x, y)
}

/// Highlight applied while a located shape is emphasised, and its revert
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub apply: TracePatch,
    pub revert: TracePatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatePlan {
    pub index: usize,
    pub viewport: Viewport,
    pub highlight: Option<Highlight>,
}

/// Frame the shape `id` and, for stroked shapes, build the highlight. The
/// revert restores the stored style, so re-locating a highlighted shape
/// never bakes the highlight in.
pub fn locate_plan(
    traces: &[Trace],
    id: &str,
    padding: f64,
    container: (f64, f64),
    highlight_color: &str,
) -> AnnotateResult<LocatePlan> {
    let index = find_shape_index(traces, id).ok_or_else(|| AnnotateError::not_found(id))?;
    let trace = &traces[index];
    let bbox = BoundingBox::from_coordinates(&trace.x, &trace.y)
        .ok_or_else(|| AnnotateError::invalid(format!("shape {id} has no finite coordinates")))?;
    let viewport = fit_viewport(&bbox, padding, container);

    let highlight = trace
        .shape()
        .and_then(|shape| shape.style().stroke())
        .map(|(color, width)| Highlight {
            apply: TracePatch {
                line_color: Some(highlight_color.to_string()),
                line_width: Some(width * 2.0),
                ..TracePatch::default()
            },
            revert: TracePatch {
                line_color: Some(color.to_string()),
                line_width: Some(width),
                ..TracePatch::default()
            },
        });

    Ok(LocatePlan {
        index,
        viewport,
        highlight,
    })
}

/// Category switches for [`visibility_plan`]; missing flags mean shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisibilityFlags {
    pub show_polyline: bool,
    pub show_polygon: bool,
    pub show_point: bool,
    pub show_text: bool,
}

impl Default for VisibilityFlags {
    fn default() -> Self {
        Self {
            show_polyline: true,
            show_polygon: true,
            show_point: true,
            show_text: true,
        }
    }
}

impl VisibilityFlags {
    fn for_kind(&self, kind: ShapeKind) -> bool {
        match kind {
            ShapeKind::Point => self.show_point,
            ShapeKind::Polyline => self.show_polyline,
            ShapeKind::Polygon => self.show_polygon,
            ShapeKind::Text => self.show_text,
        }
    }
}

/// One restyle per annotation layer. A label is shown only when its parent
/// is shown and text is on; the parent's visibility from earlier in the
/// same pass wins over the category flag.
pub fn visibility_plan(traces: &[Trace], flags: &VisibilityFlags) -> Vec<(usize, TracePatch)> {
    let mut seen: std::collections::HashMap<&str, bool> = std::collections::HashMap::new();
    let mut plan = Vec::new();

    for (index, trace) in traces.iter().enumerate() {
        let (visible, opacity) = match trace.meta() {
            Some(LayerMeta::Shape(shape)) => {
                let visible = flags.for_kind(shape.kind());
                seen.insert(shape.id(), visible);
                (visible, shape.style().display_opacity())
            }
            Some(LayerMeta::Label(label)) => {
                let parent_visible = match seen.get(label.parent_id.as_str()) {
                    Some(parent) => *parent,
                    None => flags.for_kind(label_parent_kind(label.kind)),
                };
                (parent_visible && flags.show_text, 1.0)
            }
            _ => continue,
        };

        plan.push((
            index,
            TracePatch {
                visible: Some(visible),
                opacity: Some(if visible { opacity } else { 0.0 }),
                ..TracePatch::default()
            },
        ));
    }
    plan
}

fn label_parent_kind(kind: crate::trace::LabelKind) -> ShapeKind {
    match kind {
        crate::trace::LabelKind::PointText => ShapeKind::Point,
        crate::trace::LabelKind::PolylineText => ShapeKind::Polyline,
        crate::trace::LabelKind::PolygonText => ShapeKind::Polygon,
    }
}

/// What happens to the dependent label after a style update
#[derive(Debug, Clone, PartialEq)]
pub enum LabelChange {
    Unchanged,
    Restyle(usize, TracePatch),
    Add(Trace),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleUpdatePlan {
    pub index: usize,
    pub shape: Shape,
    pub primary: TracePatch,
    pub label: LabelChange,
}

/// Merge `patch` into the stored shape `id` and derive the layer updates
pub fn style_update_plan(
    traces: &[Trace],
    id: &str,
    patch: &StylePatch,
) -> AnnotateResult<StyleUpdatePlan> {
    let (index, mut shape) = stored_shape(traces, id)?;
    shape.update_style(patch)?;
    Ok(rerender_plan(traces, index, shape))
}

/// Merge name/status/note and an optional style patch into the stored shape.
/// Nothing is planned when the style patch is invalid.
pub fn properties_update_plan(
    traces: &[Trace],
    id: &str,
    update: &PropertiesUpdate,
) -> AnnotateResult<StyleUpdatePlan> {
    let (index, mut shape) = stored_shape(traces, id)?;
    shape.update_properties(update)?;
    Ok(rerender_plan(traces, index, shape))
}

fn stored_shape(traces: &[Trace], id: &str) -> AnnotateResult<(usize, Shape)> {
    let index = find_shape_index(traces, id).ok_or_else(|| AnnotateError::not_found(id))?;
    let shape = traces[index]
        .shape()
        .cloned()
        .ok_or_else(|| AnnotateError::not_found(id))?;
    Ok((index, shape))
}

fn rerender_plan(traces: &[Trace], index: usize, shape: Shape) -> StyleUpdatePlan {
    let trace = &traces[index];
    let points = shape_points(trace);
    let layers = shape.to_renderable(&points);

    let mut primary = TracePatch::restyle_from(&layers.primary);
    // Keep the visibility switch the layer currently has
    primary.visible = None;
    if trace.visible == Some(false) {
        primary.opacity = None;
    }

    let label = match shape.style() {
        ShapeStyle::Text(_) => LabelChange::Unchanged,
        _ => label_change(traces, &shape, layers.label, trace.visible == Some(false)),
    };

    StyleUpdatePlan {
        index,
        shape,
        primary,
        label,
    }
}

/// Sync the dependent label of `shape` after its label style changed.
/// A label hidden by a visibility pass, or whose parent is hidden, stays
/// hidden.
fn label_change(
    traces: &[Trace],
    shape: &Shape,
    rendered: Option<Trace>,
    parent_hidden: bool,
) -> LabelChange {
    match (find_label_index(traces, shape.id()), rendered) {
        (Some(index), Some(label)) => {
            let mut patch = TracePatch::restyle_from(&label);
            if parent_hidden || hidden_by_visibility(&traces[index]) {
                patch.visible = None;
                patch.opacity = None;
            }
            LabelChange::Restyle(index, patch)
        }
        (Some(index), None) => {
            let label_style = shape.style().text_label().cloned().unwrap_or_default();
            LabelChange::Restyle(index, hidden_label_patch(traces, index, label_style))
        }
        (None, Some(mut label)) => {
            if parent_hidden {
                label.visible = Some(false);
                label.opacity = Some(0.0);
            }
            LabelChange::Add(label)
        }
        (None, None) => LabelChange::Unchanged,
    }
}

/// The visibility pass zeroes opacity; a label disabled through its style
/// keeps it
fn hidden_by_visibility(label: &Trace) -> bool {
    label.visible == Some(false) && label.opacity == Some(0.0)
}

fn hidden_label_patch(traces: &[Trace], index: usize, style: TextLabelStyle) -> TracePatch {
    let mut patch = TracePatch {
        visible: Some(false),
        text: Some(vec![style.content.clone()]),
        ..TracePatch::default()
    };
    if let Some(mut meta) = traces[index].label().cloned() {
        meta.style = style;
        patch.customdata = Some(CustomData::from(LayerMeta::Label(meta)));
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> Vec<DataPoint> {
        vec![
            DataPoint::new(0.0, 0.0),
            DataPoint::new(4.0, 0.0),
            DataPoint::new(4.0, 4.0),
            DataPoint::new(0.0, 4.0),
        ]
    }

    fn layers(kind: ShapeKind, id: &str, style: serde_json::Value) -> Vec<Trace> {
        let patch = StylePatch::from_value(kind, &style).unwrap();
        Shape::from_patch(id, &patch)
            .to_renderable(&square())
            .into_traces()
    }

    #[test]
    fn test_cascade_delete_includes_label() {
        let mut traces = vec![Trace::contour()];
        traces.extend(layers(ShapeKind::Polygon, "a", json!({ "text": { "content": "A" } })));
        traces.extend(layers(ShapeKind::Polyline, "b", json!({})));

        assert_eq!(cascade_delete_indices(&traces, "a"), vec![1, 2]);
        assert_eq!(cascade_delete_indices(&traces, "b"), vec![3]);
        assert!(cascade_delete_indices(&traces, "missing").is_empty());
    }

    #[test]
    fn test_preview_layers_are_not_shapes() {
        let patch = StylePatch::empty(ShapeKind::Polyline);
        let preview = Shape::from_patch("p", &patch).preview_layer(&square());
        assert_eq!(find_shape_index(&[preview], "p"), None);
    }

    #[test]
    fn test_shape_points_drop_polygon_closure() {
        let traces = layers(ShapeKind::Polygon, "a", json!({}));
        assert_eq!(traces[0].x.len(), 5);
        assert_eq!(shape_points(&traces[0]), square());
    }

    #[test]
    fn test_fit_viewport_widens_short_axis() {
        let bbox = BoundingBox::from_coordinates(&[0.0, 10.0], &[0.0, 10.0]).unwrap();
        let viewport = fit_viewport(&bbox, 0.0, (200.0, 100.0));
        assert_eq!(viewport.y, AxisRange::new(0.0, 10.0));
        assert_eq!(viewport.x, AxisRange::new(-5.0, 15.0));

        let viewport = fit_viewport(&bbox, 0.0, (100.0, 200.0));
        assert_eq!(viewport.x, AxisRange::new(0.0, 10.0));
        assert_eq!(viewport.y, AxisRange::new(-5.0, 15.0));
    }

    #[test]
    fn test_fit_viewport_zero_extent() {
        let bbox = BoundingBox::from_coordinates(&[3.0], &[7.0]).unwrap();
        let viewport = fit_viewport(&bbox, 0.1, (100.0, 100.0));
        assert_eq!(viewport.x, AxisRange::new(2.5, 3.5));
        assert_eq!(viewport.y, AxisRange::new(6.5, 7.5));
    }

    #[test]
    fn test_locate_highlight_only_for_strokes() {
        let mut traces = layers(ShapeKind::Polyline, "line", json!({ "width": 3 }));
        traces.extend(layers(ShapeKind::Point, "dot", json!({})));

        let plan = locate_plan(&traces, "line", 0.1, (100.0, 100.0), "red").unwrap();
        let highlight = plan.highlight.unwrap();
        assert_eq!(highlight.apply.line_width, Some(6.0));
        assert_eq!(highlight.revert.line_width, Some(3.0));
        assert_eq!(highlight.revert.line_color.as_deref(), Some("#F4F065"));

        let plan = locate_plan(&traces, "dot", 0.1, (100.0, 100.0), "red").unwrap();
        assert!(plan.highlight.is_none());

        assert!(matches!(
            locate_plan(&traces, "nope", 0.1, (100.0, 100.0), "red"),
            Err(AnnotateError::ShapeNotFound { .. })
        ));
    }

    #[test]
    fn test_polygon_label_follows_category() {
        let traces = layers(ShapeKind::Polygon, "a", json!({ "text": { "content": "A" } }));
        let flags = VisibilityFlags {
            show_polygon: false,
            ..VisibilityFlags::default()
        };
        let plan = visibility_plan(&traces, &flags);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].1.visible, Some(false));
        assert_eq!(plan[0].1.opacity, Some(0.0));
        assert_eq!(plan[1].1.visible, Some(false));
    }

    #[test]
    fn test_shown_layers_restore_stored_opacity() {
        let mut traces = layers(
            ShapeKind::Polygon,
            "a",
            json!({ "fillStyle": { "opacity": 0.25 }, "text": { "content": "A" } }),
        );
        traces.extend(layers(ShapeKind::Point, "p", json!({ "opacity": 0.5 })));
        let plan = visibility_plan(&traces, &VisibilityFlags::default());

        let opacities: Vec<_> = plan.iter().map(|(_, patch)| patch.opacity.unwrap()).collect();
        assert_eq!(opacities, vec![0.25, 1.0, 0.5]);
    }

    #[test]
    fn test_orphan_label_uses_category_flag() {
        let traces = layers(ShapeKind::Polyline, "a", json!({ "text": { "content": "A" } }));
        // Label before its parent in layer order
        let reordered = vec![traces[1].clone(), traces[0].clone()];
        let flags = VisibilityFlags {
            show_text: false,
            ..VisibilityFlags::default()
        };
        let plan = visibility_plan(&reordered, &flags);
        assert_eq!(plan[0].1.visible, Some(false));
        assert_eq!(plan[1].1.visible, Some(true));
    }

    #[test]
    fn test_style_update_creates_label() {
        let traces = layers(ShapeKind::Polygon, "a", json!({}));
        assert_eq!(traces.len(), 1);

        let patch =
            StylePatch::from_value(ShapeKind::Polygon, &json!({ "text": { "content": "Zone" } }))
                .unwrap();
        let plan = style_update_plan(&traces, "a", &patch).unwrap();

        match plan.label {
            LabelChange::Add(label) => {
                assert_eq!(label.x, vec![2.0]);
                assert_eq!(label.y, vec![2.0]);
                assert_eq!(label.label().unwrap().parent_id, "a");
            }
            other => panic!("expected a new label, got {other:?}"),
        }
    }

    #[test]
    fn test_style_update_hides_label() {
        let traces = layers(ShapeKind::Polyline, "a", json!({ "text": { "content": "A" } }));
        let patch =
            StylePatch::from_value(ShapeKind::Polyline, &json!({ "text": { "show": false } }))
                .unwrap();
        let plan = style_update_plan(&traces, "a", &patch).unwrap();

        match plan.label {
            LabelChange::Restyle(1, patch) => {
                assert_eq!(patch.visible, Some(false));
                let meta = match patch.customdata {
                    Some(CustomData::Layer(meta)) => meta,
                    other => panic!("unexpected customdata {other:?}"),
                };
                match *meta {
                    LayerMeta::Label(label) => assert!(!label.style.show),
                    other => panic!("unexpected meta {other:?}"),
                }
            }
            other => panic!("expected a label restyle, got {other:?}"),
        }
    }

    fn apply_visibility(traces: &mut [Trace], flags: &VisibilityFlags) {
        for (index, patch) in visibility_plan(traces, flags) {
            patch.apply_to(&mut traces[index]);
        }
    }

    #[test]
    fn test_label_added_under_hidden_polygon_starts_hidden() {
        let mut traces = layers(ShapeKind::Polygon, "a", json!({}));
        let flags = VisibilityFlags {
            show_polygon: false,
            ..VisibilityFlags::default()
        };
        apply_visibility(&mut traces, &flags);

        let patch =
            StylePatch::from_value(ShapeKind::Polygon, &json!({ "text": { "content": "Zone" } }))
                .unwrap();
        let plan = style_update_plan(&traces, "a", &patch).unwrap();

        assert_eq!(plan.primary.visible, None);
        match plan.label {
            LabelChange::Add(label) => {
                assert_eq!(label.visible, Some(false));
                assert_eq!(label.opacity, Some(0.0));
            }
            other => panic!("expected a new label, got {other:?}"),
        }
    }

    #[test]
    fn test_label_restyle_keeps_text_toggle_off() {
        let mut traces = layers(ShapeKind::Polygon, "a", json!({ "text": { "content": "A" } }));
        let flags = VisibilityFlags {
            show_text: false,
            ..VisibilityFlags::default()
        };
        apply_visibility(&mut traces, &flags);
        assert_eq!(traces[1].visible, Some(false));

        let patch =
            StylePatch::from_value(ShapeKind::Polygon, &json!({ "text": { "color": "blue" } }))
                .unwrap();
        let plan = style_update_plan(&traces, "a", &patch).unwrap();

        match plan.label {
            LabelChange::Restyle(1, patch) => {
                assert_eq!(patch.visible, None);
                assert_eq!(patch.opacity, None);
                patch.apply_to(&mut traces[1]);
                assert_eq!(traces[1].visible, Some(false));
            }
            other => panic!("expected a label restyle, got {other:?}"),
        }
    }

    #[test]
    fn test_label_reenabled_by_style_shows_again() {
        let mut traces = layers(ShapeKind::Polyline, "a", json!({ "text": { "content": "A" } }));
        let hide =
            StylePatch::from_value(ShapeKind::Polyline, &json!({ "text": { "show": false } }))
                .unwrap();
        let plan = style_update_plan(&traces, "a", &hide).unwrap();
        plan.primary.apply_to(&mut traces[0]);
        if let LabelChange::Restyle(index, patch) = plan.label {
            patch.apply_to(&mut traces[index]);
        }
        assert_eq!(traces[1].visible, Some(false));

        let show =
            StylePatch::from_value(ShapeKind::Polyline, &json!({ "text": { "show": true } }))
                .unwrap();
        let plan = style_update_plan(&traces, "a", &show).unwrap();
        match plan.label {
            LabelChange::Restyle(1, patch) => assert_eq!(patch.visible, Some(true)),
            other => panic!("expected a label restyle, got {other:?}"),
        }
    }

    #[test]
    fn test_style_update_rejects_kind_mismatch() {
        let traces = layers(ShapeKind::Point, "a", json!({}));
        let patch = StylePatch::empty(ShapeKind::Polygon);
        assert!(matches!(
            style_update_plan(&traces, "a", &patch),
            Err(AnnotateError::ShapeTypeMismatch { .. })
        ));
    }
}
