use charts::ContourChart;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

use crate::convert::{options, to_js_or_null};
use crate::instance_manager::{ChartKind, InstanceManager};
use crate::plotly::PlotlyBackend;

#[wasm_bindgen(js_name = ContourChart)]
pub struct ContourHandle {
    instance_id: Uuid,
}

annotator_bindings!(ContourHandle, ContourChart);

impl ContourHandle {
    fn chart<R>(&self, operation: &str, f: impl FnOnce(&mut ContourChart) -> R) -> Option<R> {
        let result = InstanceManager::with_instance_mut(&self.instance_id, |instance| {
            instance.contour_mut().map(f)
        })
        .flatten();
        if result.is_none() {
            log::warn!("{operation}: contour chart instance not found");
        }
        result
    }
}

#[wasm_bindgen(js_class = ContourChart)]
impl ContourHandle {
    /// Bind a contour chart to the element with id `container_id`
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, config: JsValue) -> Result<ContourHandle, JsValue> {
        let instance_id = crate::create_chart("ContourChart", container_id, config, |parts, config| {
            ChartKind::Contour(ContourChart::new(parts, config))
        })?;
        Ok(ContourHandle { instance_id })
    }

    /// Draw the contour from `{data: {x, y, z, zmin, zmax}, style, layout}`
    pub fn init(&self, options_js: JsValue) -> bool {
        let init_options = options(options_js, "init");
        let id = self.instance_id;
        InstanceManager::with_instance_mut(&id, |instance| {
            let drawn = instance
                .contour_mut()
                .is_some_and(|chart| chart.init(&init_options));
            if drawn {
                crate::bind_plot_events(instance, id);
            }
            drawn
        })
        .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = updateData)]
    pub fn update_data(&self, data: JsValue) -> bool {
        let data = options(data, "updateData");
        self.chart("updateData", |chart| chart.update_data(&data))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = updateLayout)]
    pub fn update_layout(&self, layout: JsValue) -> bool {
        let layout = options(layout, "updateLayout");
        self.chart("updateLayout", |chart| chart.update_layout(&layout))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = setColorRange)]
    pub fn set_color_range(&self, range: Vec<f64>) -> bool {
        self.chart("setColorRange", |chart| chart.set_color_range(&range))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = setContourInterval)]
    pub fn set_contour_interval(&self, interval: f64) -> bool {
        self.chart("setContourInterval", |chart| chart.set_contour_interval(interval))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = setContoursVisible)]
    pub fn set_contours_visible(&self, visible: bool) -> bool {
        self.chart("setContoursVisible", |chart| chart.set_contours_visible(visible))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = updateColorScale)]
    pub fn update_color_scale(&self, scale: JsValue, lines: JsValue, labels: JsValue) -> bool {
        let scale = options(scale, "updateColorScale");
        let lines = options(lines, "updateColorScale");
        let labels = options(labels, "updateColorScale");
        self.chart("updateColorScale", |chart| {
            chart.update_color_scale(&scale, &lines, &labels)
        })
        .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = updateColorScaleAndRange)]
    pub fn update_color_scale_and_range(&self, options_js: JsValue) -> bool {
        let update = options(options_js, "updateColorScaleAndRange");
        self.chart("updateColorScaleAndRange", |chart| {
            chart.update_color_scale_and_range(&update)
        })
        .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = updateDataAndColorScale)]
    pub fn update_data_and_color_scale(&self, options_js: JsValue) -> bool {
        let update = options(options_js, "updateDataAndColorScale");
        self.chart("updateDataAndColorScale", |chart| {
            chart.update_data_and_color_scale(&update)
        })
        .unwrap_or(false)
    }

    /// `[[position, color], ...]`, or `null` before init
    #[wasm_bindgen(js_name = getColorScale)]
    pub fn get_color_scale(&self) -> JsValue {
        self.chart("getColorScale", |chart| chart.get_color_scale())
            .flatten()
            .map(|scale| to_js_or_null(&scale))
            .unwrap_or(JsValue::NULL)
    }

    /// `{zmin, zmax}`, or `null` before init
    #[wasm_bindgen(js_name = getValueRange)]
    pub fn get_value_range(&self) -> JsValue {
        self.chart("getValueRange", |chart| chart.get_value_range())
            .flatten()
            .map(|range| to_js_or_null(&range))
            .unwrap_or(JsValue::NULL)
    }

    /// Draw the overview into the element with id `container_id`
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
        self.chart("addEagleEye", |chart| {
            chart.add_eagle_eye(Box::new(PlotlyBackend::new(element)), &eagle_options)
        })
        .unwrap_or(false)
    }
}
