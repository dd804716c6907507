use charts::ScatterChart;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

use crate::convert::{from_js, js_listener, options, to_js_or_null};
use crate::instance_manager::{ChartKind, InstanceManager};
use crate::plotly::PlotlyBackend;

#[wasm_bindgen(js_name = ScatterChart)]
pub struct ScatterHandle {
    instance_id: Uuid,
}

annotator_bindings!(ScatterHandle, ScatterChart);

impl ScatterHandle {
    fn chart<R>(&self, operation: &str, f: impl FnOnce(&mut ScatterChart) -> R) -> Option<R> {
        let result = InstanceManager::with_instance_mut(&self.instance_id, |instance| {
            instance.scatter_mut().map(f)
        })
        .flatten();
        if result.is_none() {
            log::warn!("{operation}: scatter chart instance not found");
        }
        result
    }

    fn flag(&self, operation: &str, f: impl FnOnce(&mut ScatterChart) -> bool) -> bool {
        self.chart(operation, f).unwrap_or(false)
    }
}

#[wasm_bindgen(js_class = ScatterChart)]
impl ScatterHandle {
    /// Bind a scatter chart to the element with id `container_id`
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, config: JsValue) -> Result<ScatterHandle, JsValue> {
        let instance_id = crate::create_chart("ScatterChart", container_id, config, |parts, config| {
            ChartKind::Scatter(ScatterChart::new(parts, config))
        })?;
        Ok(ScatterHandle { instance_id })
    }

    /// Draw from `{data: {x, y, v, id, visible, ...}, style, layout}`
    pub fn init(&self, options_js: JsValue) -> bool {
        let init_options = options(options_js, "init");
        let id = self.instance_id;
        InstanceManager::with_instance_mut(&id, |instance| {
            let drawn = instance
                .scatter_mut()
                .is_some_and(|chart| chart.init(&init_options));
            if drawn {
                crate::bind_plot_events(instance, id);
            }
            drawn
        })
        .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = getPointCount)]
    pub fn point_count(&self) -> usize {
        self.chart("getPointCount", |chart| chart.point_count())
            .unwrap_or(0)
    }

    /// Replace the samples with `[{x, y, text}, ...]`
    #[wasm_bindgen(js_name = updateData)]
    pub fn update_data(&self, points: JsValue) -> bool {
        let points = options(points, "updateData");
        self.flag("updateData", |chart| chart.update_data(&points))
    }

    #[wasm_bindgen(js_name = updateLayout)]
    pub fn update_layout(&self, layout: JsValue) -> bool {
        let layout = options(layout, "updateLayout");
        self.flag("updateLayout", |chart| chart.update_layout(&layout))
    }

    #[wasm_bindgen(js_name = updateScatterData)]
    pub fn update_scatter_data(&self, data: JsValue) -> bool {
        let data = options(data, "updateScatterData");
        self.flag("updateScatterData", |chart| chart.update_scatter_data(&data))
    }

    #[wasm_bindgen(js_name = updateScatterDataAndColorScale)]
    pub fn update_scatter_data_and_color_scale(&self, data: JsValue, scale: JsValue) -> bool {
        let data = options(data, "updateScatterDataAndColorScale");
        let scale = options(scale, "updateScatterDataAndColorScale");
        self.flag("updateScatterDataAndColorScale", |chart| {
            chart.update_scatter_data_and_color_scale(&data, &scale)
        })
    }

    #[wasm_bindgen(js_name = getValueRange)]
    pub fn get_value_range(&self) -> JsValue {
        self.chart("getValueRange", |chart| chart.get_value_range())
            .flatten()
            .map(|range| to_js_or_null(&range))
            .unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(js_name = getColorScale)]
    pub fn get_color_scale(&self) -> JsValue {
        self.chart("getColorScale", |chart| chart.get_color_scale())
            .flatten()
            .map(|scale| to_js_or_null(&scale))
            .unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(js_name = updateColorScaleAndRange)]
    pub fn update_color_scale_and_range(&self, options_js: JsValue) -> bool {
        let update = options(options_js, "updateColorScaleAndRange");
        self.flag("updateColorScaleAndRange", |chart| {
            chart.update_color_scale_and_range(&update)
        })
    }

    #[wasm_bindgen(js_name = updateColorScale)]
    pub fn update_color_scale(&self, scale: JsValue) -> bool {
        let scale = options(scale, "updateColorScale");
        self.flag("updateColorScale", |chart| chart.update_color_scale(&scale))
    }

    #[wasm_bindgen(js_name = enterSelectMode)]
    pub fn enter_select_mode(&self) -> bool {
        self.flag("enterSelectMode", |chart| chart.enter_select_mode())
    }

    #[wasm_bindgen(js_name = exitSelectMode)]
    pub fn exit_select_mode(&self) -> bool {
        self.flag("exitSelectMode", |chart| chart.exit_select_mode())
    }

    #[wasm_bindgen(js_name = isSelectMode)]
    pub fn is_select_mode(&self) -> bool {
        self.flag("isSelectMode", |chart| chart.is_select_mode())
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&self) {
        self.chart("clearSelection", |chart| chart.clear_selection());
    }

    #[wasm_bindgen(js_name = getSelectedPoints)]
    pub fn selected_points(&self) -> JsValue {
        let points = self
            .chart("getSelectedPoints", |chart| chart.selected_points())
            .unwrap_or_default();
        to_js_or_null(&points)
    }

    #[wasm_bindgen(js_name = hideSelectedPoints)]
    pub fn hide_selected_points(&self) -> bool {
        self.flag("hideSelectedPoints", |chart| chart.hide_selected_points())
    }

    #[wasm_bindgen(js_name = showHiddenPoints)]
    pub fn show_hidden_points(&self) -> bool {
        self.flag("showHiddenPoints", |chart| chart.show_hidden_points())
    }

    #[wasm_bindgen(js_name = getHiddenPoints)]
    pub fn hidden_points(&self) -> JsValue {
        let points = self
            .chart("getHiddenPoints", |chart| chart.hidden_points())
            .unwrap_or_default();
        to_js_or_null(&points)
    }

    #[wasm_bindgen(js_name = isPointHidden)]
    pub fn is_point_hidden(&self, index: usize) -> bool {
        self.flag("isPointHidden", |chart| chart.is_point_hidden(index))
    }

    #[wasm_bindgen(js_name = getVisiblePointsCount)]
    pub fn visible_points_count(&self) -> usize {
        self.chart("getVisiblePointsCount", |chart| chart.visible_points_count())
            .unwrap_or(0)
    }

    #[wasm_bindgen(js_name = getHiddenPointIds)]
    pub fn hidden_point_ids(&self) -> JsValue {
        let ids = self
            .chart("getHiddenPointIds", |chart| chart.hidden_point_ids())
            .unwrap_or_default();
        to_js_or_null(&ids)
    }

    #[wasm_bindgen(js_name = getSelectedPointIds)]
    pub fn selected_point_ids(&self) -> JsValue {
        let ids = self
            .chart("getSelectedPointIds", |chart| chart.selected_point_ids())
            .unwrap_or_default();
        to_js_or_null(&ids)
    }

    #[wasm_bindgen(js_name = getPointIndexById)]
    pub fn point_index_by_id(&self, id: JsValue) -> Option<usize> {
        let id = from_js(id).ok()?;
        self.chart("getPointIndexById", |chart| chart.point_index_by_id(&id))
            .flatten()
    }

    #[wasm_bindgen(js_name = isPointHiddenById)]
    pub fn is_point_hidden_by_id(&self, id: JsValue) -> bool {
        let Ok(id) = from_js(id) else {
            return false;
        };
        self.flag("isPointHiddenById", |chart| chart.is_point_hidden_by_id(&id))
    }

    #[wasm_bindgen(js_name = isPointSelectedById)]
    pub fn is_point_selected_by_id(&self, id: JsValue) -> bool {
        let Ok(id) = from_js(id) else {
            return false;
        };
        self.flag("isPointSelectedById", |chart| chart.is_point_selected_by_id(&id))
    }

    /// Add a header layer, returning its trace index
    #[wasm_bindgen(js_name = addHeaderPoints)]
    pub fn add_header_points(&self, points: JsValue, options_js: JsValue) -> Option<usize> {
        let points = options(points, "addHeaderPoints");
        let header_options = options(options_js, "addHeaderPoints");
        self.chart("addHeaderPoints", |chart| {
            chart.add_header_points(&points, &header_options)
        })
        .flatten()
    }

    #[wasm_bindgen(js_name = updateHeaderPoints)]
    pub fn update_header_points(&self, index: usize, points: JsValue, options_js: JsValue) -> bool {
        let points = options(points, "updateHeaderPoints");
        let header_options = options(options_js, "updateHeaderPoints");
        self.flag("updateHeaderPoints", |chart| {
            chart.update_header_points(index, &points, &header_options)
        })
    }

    #[wasm_bindgen(js_name = removeHeaderPoints)]
    pub fn remove_header_points(&self, index: usize) -> bool {
        self.flag("removeHeaderPoints", |chart| chart.remove_header_points(index))
    }

    #[wasm_bindgen(js_name = getTraceCount)]
    pub fn trace_count(&self) -> usize {
        self.chart("getTraceCount", |chart| chart.trace_count())
            .unwrap_or(0)
    }

    /// Colour header samples by the four given point numbers
    #[wasm_bindgen(js_name = highlightHeaderPoints)]
    pub fn highlight_header_points(&self, nums: Vec<f64>) -> bool {
        self.flag("highlightHeaderPoints", |chart| chart.highlight_header_points(&nums))
    }

    #[wasm_bindgen(js_name = resetHeaderPointsColor)]
    pub fn reset_header_points_color(&self, index: usize) -> bool {
        self.flag("resetHeaderPointsColor", |chart| chart.reset_header_points_color(index))
    }

    /// Enter property view: clicks call `callback` with the sample's
    /// extended attributes
    #[wasm_bindgen(js_name = setPointClickCallback)]
    pub fn set_point_click_callback(
        &self,
        callback: js_sys::Function,
        cursor: Option<String>,
    ) -> Option<f64> {
        let cursor = cursor.unwrap_or_else(|| "pointer".to_string());
        self.chart("setPointClickCallback", |chart| {
            chart
                .set_point_click_callback(js_listener(callback), &cursor)
                .as_u64() as f64
        })
    }

    #[wasm_bindgen(js_name = removePointClickCallback)]
    pub fn remove_point_click_callback(&self) -> bool {
        self.flag("removePointClickCallback", |chart| chart.remove_point_click_callback())
    }

    #[wasm_bindgen(js_name = isInPropertyViewMode)]
    pub fn is_in_property_view_mode(&self) -> bool {
        self.flag("isInPropertyViewMode", |chart| chart.is_in_property_view_mode())
    }

    #[wasm_bindgen(js_name = addEagleEye)]
    pub fn add_eagle_eye(&self, container_id: &str, options_js: JsValue) -> bool {
        let element = match crate::container(container_id) {
            Ok(element) => element,
            Err(e) => {
                log::warn!("addEagleEye: {e}");
                return false;
            }
        };
        let eagle_options = options(options_js, "addEagleEye");
        self.flag("addEagleEye", |chart| {
            chart.add_eagle_eye(Box::new(PlotlyBackend::new(element)), &eagle_options)
        })
    }
}
