//! Plotly bound to one container element

use annotations::{LayoutPatch, Trace, TracePatch};
use charts::PlotBackend;
use js_sys::{Function, Reflect};
use serde_json::Value;
use shared_types::events::{PhysicalPosition, RelayoutEvent};
use shared_types::{AnnotateResult, AxisRange, DataPoint, Viewport};
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

use crate::convert::{dotted_paths, from_js, per_trace, to_js};
use crate::instance_manager::InstanceManager;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Plotly, js_name = newPlot, catch)]
    fn new_plot(
        gd: &HtmlElement,
        data: &JsValue,
        layout: &JsValue,
        config: &JsValue,
    ) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = Plotly, catch)]
    fn restyle(gd: &HtmlElement, update: &JsValue, traces: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = Plotly, catch)]
    fn relayout(gd: &HtmlElement, update: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = Plotly, js_name = addTraces, catch)]
    fn add_traces(gd: &HtmlElement, traces: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = Plotly, js_name = deleteTraces, catch)]
    fn delete_traces(gd: &HtmlElement, indices: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = Plotly, catch)]
    fn purge(gd: &HtmlElement) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["Plotly", "Plots"], catch)]
    fn resize(gd: &HtmlElement) -> Result<JsValue, JsValue>;

    /// A container after `newPlot`, which adds an event emitter to it
    #[wasm_bindgen(extends = HtmlElement)]
    type PlotlyDiv;

    #[wasm_bindgen(method)]
    fn on(this: &PlotlyDiv, event: &str, handler: &Function);

    #[wasm_bindgen(method, js_name = removeListener)]
    fn remove_listener(this: &PlotlyDiv, event: &str, handler: &Function);
}

/// Read a nested property, `None` when any step is missing
fn lookup(root: &JsValue, path: &[&str]) -> Option<JsValue> {
    let mut current = root.clone();
    for key in path {
        current = Reflect::get(&current, &JsValue::from_str(key)).ok()?;
        if current.is_undefined() || current.is_null() {
            return None;
        }
    }
    Some(current)
}

fn number(root: &JsValue, path: &[&str]) -> Option<f64> {
    lookup(root, path).and_then(|value| value.as_f64())
}

fn axis_range(root: &JsValue, axis: &str) -> Option<AxisRange> {
    let range = lookup(root, &["_fullLayout", axis, "range"])?;
    let [min, max]: [f64; 2] = serde_wasm_bindgen::from_value(range).ok()?;
    Some(AxisRange::new(min, max))
}

/// Plot area offset and size inside the container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PlotArea {
    /// Map a container pixel into `viewport`. The y axis grows upwards.
    pub fn to_data(&self, viewport: &Viewport, position: PhysicalPosition) -> Option<DataPoint> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let fx = (position.x - self.left) / self.width;
        let fy = (position.y - self.top) / self.height;
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        Some(DataPoint::new(
            viewport.x.min + fx * (viewport.x.max - viewport.x.min),
            viewport.y.max - fy * (viewport.y.max - viewport.y.min),
        ))
    }
}

pub struct PlotlyBackend {
    element: HtmlElement,
}

impl PlotlyBackend {
    pub fn new(element: HtmlElement) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &HtmlElement {
        &self.element
    }

    fn plot_area(&self) -> Option<PlotArea> {
        let root: &JsValue = self.element.as_ref();
        Some(PlotArea {
            left: number(root, &["_fullLayout", "_size", "l"])?,
            top: number(root, &["_fullLayout", "_size", "t"])?,
            width: number(root, &["_fullLayout", "_size", "w"])?,
            height: number(root, &["_fullLayout", "_size", "h"])?,
        })
    }

    /// Whether the y axis is still anchored 1:1 to x
    pub fn scale_locked(&self) -> bool {
        lookup(self.element.as_ref(), &["_fullLayout", "yaxis", "scaleanchor"])
            .and_then(|anchor| anchor.as_string())
            .is_some_and(|anchor| anchor == "x")
    }
}

impl PlotBackend for PlotlyBackend {
    fn new_plot(&mut self, traces: &[Trace], layout: &Value, config: &Value) -> AnnotateResult<()> {
        new_plot(&self.element, &to_js(traces)?, &to_js(layout)?, &to_js(config)?)?;
        Ok(())
    }

    fn restyle(&mut self, patch: &TracePatch, indices: &[usize]) -> AnnotateResult<()> {
        let update = per_trace(serde_json::to_value(patch)?);
        restyle(&self.element, &to_js(&update)?, &to_js(indices)?)?;
        Ok(())
    }

    fn relayout(&mut self, patch: &LayoutPatch) -> AnnotateResult<()> {
        relayout(&self.element, &to_js(patch)?)?;
        Ok(())
    }

    fn update_layout(&mut self, layout: &Value) -> AnnotateResult<()> {
        relayout(&self.element, &to_js(&dotted_paths(layout))?)?;
        Ok(())
    }

    fn add_traces(&mut self, traces: &[Trace]) -> AnnotateResult<()> {
        add_traces(&self.element, &to_js(traces)?)?;
        Ok(())
    }

    fn delete_traces(&mut self, indices: &[usize]) -> AnnotateResult<()> {
        delete_traces(&self.element, &to_js(indices)?)?;
        Ok(())
    }

    fn purge(&mut self) -> AnnotateResult<()> {
        purge(&self.element)?;
        Ok(())
    }

    fn resize(&mut self) -> AnnotateResult<()> {
        resize(&self.element)?;
        Ok(())
    }

    fn viewport(&self) -> Option<Viewport> {
        let root: &JsValue = self.element.as_ref();
        Some(Viewport::new(axis_range(root, "xaxis")?, axis_range(root, "yaxis")?))
    }

    fn container_size(&self) -> (f64, f64) {
        match self.plot_area() {
            Some(area) => (area.width, area.height),
            None => (
                f64::from(self.element.client_width()),
                f64::from(self.element.client_height()),
            ),
        }
    }

    fn pixel_to_data(&self, position: PhysicalPosition) -> Option<DataPoint> {
        self.plot_area()?.to_data(&self.viewport()?, position)
    }
}

/// Axis ranges reported by a `plotly_relayout` payload, when both axes are in it
pub fn reported_viewport(update: &Value) -> Option<Viewport> {
    let axis = |name: &str| -> Option<AxisRange> {
        if let Some([min, max]) = update
            .get(format!("{name}.range"))
            .and_then(|range| serde_json::from_value::<[f64; 2]>(range.clone()).ok())
        {
            return Some(AxisRange::new(min, max));
        }
        let min = update.get(format!("{name}.range[0]"))?.as_f64()?;
        let max = update.get(format!("{name}.range[1]"))?.as_f64()?;
        Some(AxisRange::new(min, max))
    };
    Some(Viewport::new(axis("xaxis")?, axis("yaxis")?))
}

/// Whether a relayout payload moved either axis
pub fn touches_ranges(update: &Value) -> bool {
    update.as_object().is_some_and(|map| {
        map.keys()
            .any(|key| key.starts_with("xaxis.") || key.starts_with("yaxis."))
    })
}

/// `plotly_click` and `plotly_relayout` subscriptions of one chart. The
/// handlers defer to a microtask since Plotly emits from inside its own
/// calls, which already hold the instance.
pub struct PlotEvents {
    div: PlotlyDiv,
    click: Closure<dyn FnMut(JsValue)>,
    relayout: Closure<dyn FnMut(JsValue)>,
}

impl PlotEvents {
    pub fn bind(element: &HtmlElement, instance_id: Uuid) -> Self {
        let div: PlotlyDiv = element.clone().unchecked_into();

        let click = Closure::wrap(Box::new(move |data: JsValue| {
            let curve = number(&data, &["points", "0", "curveNumber"]);
            let point = number(&data, &["points", "0", "pointNumber"]);
            let (Some(curve), Some(point)) = (curve, point) else {
                return;
            };
            wasm_bindgen_futures::spawn_local(async move {
                InstanceManager::with_instance_mut(&instance_id, |instance| {
                    instance.handle_plot_click(curve as usize, point as usize);
                });
            });
        }) as Box<dyn FnMut(JsValue)>);

        let relayout = Closure::wrap(Box::new(move |data: JsValue| {
            let update = match from_js(data) {
                Ok(update) => update,
                Err(e) => {
                    log::warn!("Unreadable relayout payload: {e}");
                    return;
                }
            };
            wasm_bindgen_futures::spawn_local(async move {
                InstanceManager::with_instance_mut(&instance_id, |instance| {
                    instance.handle_relayout(&update);
                });
            });
        }) as Box<dyn FnMut(JsValue)>);

        div.on("plotly_click", click.as_ref().unchecked_ref());
        div.on("plotly_relayout", relayout.as_ref().unchecked_ref());
        Self {
            div,
            click,
            relayout,
        }
    }

    pub fn unbind(&self) {
        self.div
            .remove_listener("plotly_click", self.click.as_ref().unchecked_ref());
        self.div
            .remove_listener("plotly_relayout", self.relayout.as_ref().unchecked_ref());
    }
}

/// Build the relayout summary the charts consume
pub fn relayout_event(backend: &PlotlyBackend, update: &Value) -> Option<RelayoutEvent> {
    if !touches_ranges(update) {
        return None;
    }
    Some(RelayoutEvent {
        viewport: reported_viewport(update).or_else(|| backend.viewport()),
        scale_locked: backend.scale_locked(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reported_viewport_accepts_both_forms() {
        let indexed = json!({
            "xaxis.range[0]": 1.0, "xaxis.range[1]": 5.0,
            "yaxis.range[0]": 2.0, "yaxis.range[1]": 6.0
        });
        let viewport = reported_viewport(&indexed).unwrap();
        assert_eq!(viewport.x, AxisRange::new(1.0, 5.0));
        assert_eq!(viewport.y, AxisRange::new(2.0, 6.0));

        let whole = json!({ "xaxis.range": [0, 10], "yaxis.range": [0, 20] });
        assert_eq!(reported_viewport(&whole).unwrap().y.max, 20.0);

        let one_axis = json!({ "xaxis.range[0]": 1.0, "xaxis.range[1]": 5.0 });
        assert!(reported_viewport(&one_axis).is_none());
    }

    #[test]
    fn test_touches_ranges() {
        assert!(touches_ranges(&json!({ "xaxis.autorange": true })));
        assert!(!touches_ranges(&json!({ "dragmode": "pan" })));
        assert!(!touches_ranges(&Value::Null));
    }

    #[test]
    fn test_plot_area_mapping() {
        let area = PlotArea {
            left: 50.0,
            top: 50.0,
            width: 100.0,
            height: 200.0,
        };
        let viewport = Viewport::new(AxisRange::new(0.0, 10.0), AxisRange::new(0.0, 20.0));

        let corner = area.to_data(&viewport, PhysicalPosition::new(50.0, 50.0)).unwrap();
        assert_eq!((corner.x, corner.y), (0.0, 20.0));
        let middle = area.to_data(&viewport, PhysicalPosition::new(100.0, 150.0)).unwrap();
        assert_eq!((middle.x, middle.y), (5.0, 10.0));
        assert!(area.to_data(&viewport, PhysicalPosition::new(10.0, 60.0)).is_none());
    }
}
