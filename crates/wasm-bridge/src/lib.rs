//! Browser bindings for the plot annotator
//!
//! Exposes `ContourChart` and `ScatterChart` to JavaScript. Each handle owns
//! only an instance id; the chart itself lives in the thread-local
//! [`InstanceManager`] together with its Plotly event subscriptions and
//! animation-frame loop.

use charts::{Annotator, ChartConfig, ChartParts, ListenerId};
use once_cell::sync::OnceCell;
use serde_json::Value;
use shared_types::errors::ErrorResponse;
use shared_types::{AnnotateError, AnnotateResult};
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

#[macro_use]
mod annotator_api;

pub mod clock;
pub mod contour;
pub mod convert;
pub mod instance_manager;
pub mod legend;
pub mod plotly;
pub mod render_loop;
pub mod scatter;
pub mod surface;

use clock::PerformanceClock;
use instance_manager::{ChartInstance, ChartKind, InstanceManager};
use legend::D3Legend;
use plotly::{PlotEvents, PlotlyBackend};
use surface::DomSurface;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install the panic hook and console logger once per page
pub fn init_logging() {
    LOGGING.get_or_init(|| {
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));
        // Another module may already own the logger
        let _ = console_log::init_with_level(log::Level::Debug);
    });
}

#[wasm_bindgen(start)]
pub fn start() {
    init_logging();
}

#[wasm_bindgen(js_name = instanceCount)]
pub fn instance_count() -> usize {
    InstanceManager::instance_count()
}

pub(crate) fn container(id: &str) -> AnnotateResult<HtmlElement> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| AnnotateError::JsInterop {
            message: "No document available".to_string(),
        })?;
    document
        .get_element_by_id(id)
        .ok_or_else(|| AnnotateError::invalid(format!("Container '{id}' not found")))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| AnnotateError::invalid(format!("Container '{id}' is not an HTML element")))
}

/// Error envelope thrown to JavaScript
pub(crate) fn js_error(error: AnnotateError, component: &str, operation: &str) -> JsValue {
    JsValue::from_str(
        &ErrorResponse::new(error)
            .with_context(component, operation)
            .to_json(),
    )
}

fn chart_config(config: JsValue) -> ChartConfig {
    match convert::from_js(config) {
        Ok(Value::Null) => ChartConfig::default(),
        Ok(value) => ChartConfig::load(&value.to_string()),
        Err(e) => {
            log::warn!("Unreadable chart config, using defaults: {e}");
            ChartConfig::default()
        }
    }
}

/// Register a chart bound to the container `container_id` and start its
/// frame loop
pub(crate) fn create_chart(
    component: &str,
    container_id: &str,
    config: JsValue,
    make: fn(ChartParts, ChartConfig) -> ChartKind,
) -> Result<Uuid, JsValue> {
    init_logging();
    let element = container(container_id).map_err(|e| js_error(e, component, "new"))?;
    let config = chart_config(config);
    let id = InstanceManager::create_instance(|id| {
        let parts = ChartParts {
            backend: Box::new(PlotlyBackend::new(element.clone())),
            surface: Box::new(DomSurface::new(element.clone(), id)),
            legend: Box::new(D3Legend::new(element.clone())),
            clock: Box::new(PerformanceClock::new()),
        };
        let mut instance = ChartInstance::new(make(parts, config));
        instance.probe = Some(PlotlyBackend::new(element.clone()));
        instance
    });
    if let Some(frame_loop) = InstanceManager::with_instance(&id, |instance| instance.frame_loop.clone()) {
        frame_loop.start(id);
    }
    Ok(id)
}

/// Subscribe to Plotly's events once the plot exists
pub(crate) fn bind_plot_events(instance: &mut ChartInstance, id: Uuid) {
    if instance.plot_events.is_some() {
        return;
    }
    if let Some(probe) = &instance.probe {
        instance.plot_events = Some(PlotEvents::bind(probe.element(), id));
    }
}

pub(crate) fn with_annotator<R>(
    id: &Uuid,
    operation: &str,
    f: impl FnOnce(&mut Annotator) -> R,
) -> Option<R> {
    let result = InstanceManager::with_instance_mut(id, |instance| f(instance.annotator_mut()));
    if result.is_none() {
        log::warn!("{operation}: chart instance not found");
    }
    result
}

pub(crate) fn subscribe(id: &Uuid, event: &str, callback: js_sys::Function) -> Option<f64> {
    let result = InstanceManager::with_instance_mut(id, |instance| {
        let listener = instance
            .annotator_mut()
            .on(event, convert::js_listener(callback.clone()));
        instance
            .js_callbacks
            .push((event.to_string(), callback, listener));
        listener.as_u64() as f64
    });
    if result.is_none() {
        log::warn!("on: chart instance not found");
    }
    result
}

pub(crate) fn unsubscribe(id: &Uuid, event: &str, callback: &JsValue) -> bool {
    InstanceManager::with_instance_mut(id, |instance| {
        let listener = match (callback.as_f64(), callback.dyn_ref::<js_sys::Function>()) {
            (Some(raw), _) => {
                let listener = ListenerId::from_u64(raw as u64);
                instance.js_callbacks.retain(|(_, _, registered)| *registered != listener);
                Some(listener)
            }
            (None, Some(function)) => instance.take_js_callback(event, function),
            (None, None) => None,
        };
        match listener {
            Some(listener) => instance.annotator_mut().off(event, listener),
            None => {
                log::warn!("off: no '{event}' listener matches");
                false
            }
        }
    })
    .unwrap_or(false)
}

/// Remove the instance and release everything bound to it. The instance is
/// dropped after the registry borrow ends.
pub(crate) fn dispose_chart(id: &Uuid) -> bool {
    match InstanceManager::remove_instance(id) {
        Some(mut instance) => {
            instance.dispose();
            log::info!("Chart instance {id} disposed");
            true
        }
        None => false,
    }
}

pub use contour::ContourHandle;
pub use scatter::ScatterHandle;
