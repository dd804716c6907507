//! Annotation methods shared by both chart handles

/// Expand the annotation, event, colour-bar and lifecycle methods for a
/// handle type exported to JavaScript as `$class`
macro_rules! annotator_bindings {
    ($handle:ident, $class:tt) => {
        impl $handle {
            fn annotator<R>(
                &self,
                operation: &str,
                f: impl FnOnce(&mut charts::Annotator) -> R,
            ) -> Option<R> {
                crate::with_annotator(&self.instance_id, operation, f)
            }
        }

        #[wasm_bindgen(js_class = $class)]
        impl $handle {
            #[wasm_bindgen(js_name = startDrawPoint)]
            pub fn start_draw_point(&self, options: JsValue) -> bool {
                let options = crate::convert::options(options, "startDrawPoint");
                self.annotator("startDrawPoint", |a| a.start_draw_point(&options))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = startDrawPolyline)]
            pub fn start_draw_polyline(&self, options: JsValue) -> bool {
                let options = crate::convert::options(options, "startDrawPolyline");
                self.annotator("startDrawPolyline", |a| a.start_draw_polyline(&options))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = startDrawPolygon)]
            pub fn start_draw_polygon(&self, options: JsValue) -> bool {
                let options = crate::convert::options(options, "startDrawPolygon");
                self.annotator("startDrawPolygon", |a| a.start_draw_polygon(&options))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = startDrawText)]
            pub fn start_draw_text(&self, options: JsValue) -> bool {
                let options = crate::convert::options(options, "startDrawText");
                self.annotator("startDrawText", |a| a.start_draw_text(&options))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = cancelDrawing)]
            pub fn cancel_drawing(&self) -> bool {
                self.annotator("cancelDrawing", |a| a.cancel_drawing())
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = finishDrawing)]
            pub fn finish_drawing(&self) -> bool {
                self.annotator("finishDrawing", |a| a.finish_drawing())
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = isDrawing)]
            pub fn is_drawing(&self) -> bool {
                self.annotator("isDrawing", |a| a.is_drawing()).unwrap_or(false)
            }

            #[wasm_bindgen(js_name = deleteShapeById)]
            pub fn delete_shape(&self, id: &str) -> bool {
                self.annotator("deleteShapeById", |a| a.delete_shape(id))
                    .unwrap_or(false)
            }

            /// `options` is `{padding}` or a bare padding fraction
            #[wasm_bindgen(js_name = locateShapeById)]
            pub fn locate_shape(&self, id: &str, options: JsValue) -> bool {
                let padding = crate::convert::padding(&crate::convert::options(options, "locateShapeById"));
                self.annotator("locateShapeById", |a| a.locate_shape(id, padding))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = updateShapeStyle)]
            pub fn update_shape_style(&self, id: &str, kind: &str, style: JsValue) -> bool {
                let style = crate::convert::options(style, "updateShapeStyle");
                self.annotator("updateShapeStyle", |a| a.update_shape_style(id, kind, &style))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = updateShapeProperties)]
            pub fn update_shape_properties(&self, id: &str, properties: JsValue) -> bool {
                let properties = crate::convert::options(properties, "updateShapeProperties");
                self.annotator("updateShapeProperties", |a| {
                    a.update_shape_properties(id, &properties)
                })
                .unwrap_or(false)
            }

            /// `null` when the shape does not exist
            #[wasm_bindgen(js_name = getShapeProperties)]
            pub fn get_shape_properties(&self, id: &str) -> JsValue {
                self.annotator("getShapeProperties", |a| a.get_shape_properties(id))
                    .flatten()
                    .map(|properties| crate::convert::to_js_or_null(&properties))
                    .unwrap_or(JsValue::NULL)
            }

            #[wasm_bindgen(js_name = getShapeIds)]
            pub fn shape_ids(&self) -> JsValue {
                let ids = self.annotator("getShapeIds", |a| a.shape_ids()).unwrap_or_default();
                crate::convert::to_js_or_null(&ids)
            }

            #[wasm_bindgen(js_name = initShape)]
            pub fn init_shape(&self, data: JsValue) -> bool {
                let data = crate::convert::options(data, "initShape");
                self.annotator("initShape", |a| a.init_shape(&data))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = setShapesVisibility)]
            pub fn set_shapes_visibility(&self, flags: JsValue) -> bool {
                let flags = crate::convert::options(flags, "setShapesVisibility");
                self.annotator("setShapesVisibility", |a| a.set_shapes_visibility(&flags))
                    .unwrap_or(false)
            }

            /// Subscribe `callback` to `event`; the returned id unsubscribes
            pub fn on(&self, event: &str, callback: js_sys::Function) -> Option<f64> {
                crate::subscribe(&self.instance_id, event, callback)
            }

            /// Unsubscribe by the callback itself or by the id `on` returned
            pub fn off(&self, event: &str, callback: JsValue) -> bool {
                crate::unsubscribe(&self.instance_id, event, &callback)
            }

            /// Deliver `payload` to the listeners of `event`, returning how
            /// many were called
            pub fn emit(&self, event: &str, payload: JsValue) -> usize {
                let payload = crate::convert::options(payload, "emit");
                self.annotator("emit", |a| a.emit(event, &charts::EventPayload::Custom(payload)))
                    .unwrap_or(0)
            }

            #[wasm_bindgen(js_name = addD3ColorBar)]
            pub fn add_color_bar(&self, bands: JsValue, options: JsValue) -> bool {
                let bands = crate::convert::options(bands, "addD3ColorBar");
                let options = crate::convert::options(options, "addD3ColorBar");
                self.annotator("addD3ColorBar", |a| a.add_color_bar(&bands, &options))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = updateD3ColorBar)]
            pub fn update_color_bar(&self, bands: JsValue, options: JsValue) -> bool {
                let bands = crate::convert::options(bands, "updateD3ColorBar");
                let options = crate::convert::options(options, "updateD3ColorBar");
                self.annotator("updateD3ColorBar", |a| a.update_color_bar(&bands, &options))
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = removeD3ColorBar)]
            pub fn remove_color_bar(&self) {
                self.annotator("removeD3ColorBar", |a| a.remove_color_bar());
            }

            /// Render a colour bar deferred while the host was hidden
            #[wasm_bindgen(js_name = checkPendingColorBarUpdate)]
            pub fn check_pending_color_bar_update(&self) -> bool {
                self.annotator("checkPendingColorBarUpdate", |a| {
                    a.check_pending_color_bar_update()
                })
                .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = hasEagleEye)]
            pub fn has_eagle_eye(&self) -> bool {
                self.annotator("hasEagleEye", |a| a.has_eagle_eye())
                    .unwrap_or(false)
            }

            #[wasm_bindgen(js_name = removeEagleEye)]
            pub fn remove_eagle_eye(&self) {
                self.annotator("removeEagleEye", |a| a.remove_eagle_eye());
            }

            pub fn resize(&self) -> bool {
                self.annotator("resize", |a| a.resize()).unwrap_or(false)
            }

            /// Purge the plots and release every listener. The handle is
            /// inert afterwards.
            pub fn dispose(&self) -> bool {
                crate::dispose_chart(&self.instance_id)
            }
        }
    };
}
