//! Thread-local registry of live charts
//!
//! JavaScript handles hold only a `Uuid`; DOM, Plotly and animation-frame
//! callbacks look the chart up here by that id.

use std::cell::RefCell;
use std::collections::HashMap;

use charts::{Annotator, ContourChart, ListenerId, ScatterChart};
use js_sys::Function;
use serde_json::Value;
use uuid::Uuid;

use crate::plotly::{relayout_event, PlotEvents, PlotlyBackend};
use crate::render_loop::FrameLoop;

pub enum ChartKind {
    Contour(ContourChart),
    Scatter(ScatterChart),
}

/// One chart plus the browser resources bound to it
pub struct ChartInstance {
    pub chart: ChartKind,
    pub frame_loop: FrameLoop,
    /// Second handle on the main container for reading Plotly's computed layout
    pub probe: Option<PlotlyBackend>,
    pub plot_events: Option<PlotEvents>,
    /// JavaScript subscribers, so `off` can take the callback itself
    pub js_callbacks: Vec<(String, Function, ListenerId)>,
}

impl ChartInstance {
    pub fn new(chart: ChartKind) -> Self {
        Self {
            chart,
            frame_loop: FrameLoop::new(),
            probe: None,
            plot_events: None,
            js_callbacks: Vec::new(),
        }
    }

    pub fn annotator(&self) -> &Annotator {
        match &self.chart {
            ChartKind::Contour(chart) => chart,
            ChartKind::Scatter(chart) => chart,
        }
    }

    pub fn annotator_mut(&mut self) -> &mut Annotator {
        match &mut self.chart {
            ChartKind::Contour(chart) => chart,
            ChartKind::Scatter(chart) => chart,
        }
    }

    pub fn contour_mut(&mut self) -> Option<&mut ContourChart> {
        match &mut self.chart {
            ChartKind::Contour(chart) => Some(chart),
            ChartKind::Scatter(_) => None,
        }
    }

    pub fn scatter(&self) -> Option<&ScatterChart> {
        match &self.chart {
            ChartKind::Scatter(chart) => Some(chart),
            ChartKind::Contour(_) => None,
        }
    }

    pub fn scatter_mut(&mut self) -> Option<&mut ScatterChart> {
        match &mut self.chart {
            ChartKind::Scatter(chart) => Some(chart),
            ChartKind::Contour(_) => None,
        }
    }

    pub fn contour(&self) -> Option<&ContourChart> {
        match &self.chart {
            ChartKind::Contour(chart) => Some(chart),
            ChartKind::Scatter(_) => None,
        }
    }

    /// Find the listener registered for `callback` on `event`
    pub fn take_js_callback(&mut self, event: &str, callback: &Function) -> Option<ListenerId> {
        let position = self.js_callbacks.iter().position(|(name, registered, _)| {
            name == event && js_sys::Object::is(registered.as_ref(), callback.as_ref())
        })?;
        Some(self.js_callbacks.remove(position).2)
    }

    /// Route a `plotly_click`; only the scatter chart reacts
    pub fn handle_plot_click(&mut self, curve: usize, point_index: usize) {
        if let Some(chart) = self.scatter_mut() {
            chart.handle_plot_click(curve, point_index);
        }
    }

    /// Route a raw `plotly_relayout` payload
    pub fn handle_relayout(&mut self, update: &Value) {
        let Some(event) = self
            .probe
            .as_ref()
            .and_then(|probe| relayout_event(probe, update))
        else {
            return;
        };
        match &mut self.chart {
            ChartKind::Contour(chart) => chart.handle_relayout(&event),
            ChartKind::Scatter(chart) => chart.handle_relayout(&event),
        }
    }

    /// Release listeners, the frame loop and the plots
    pub fn dispose(&mut self) {
        self.js_callbacks.clear();
        if let Some(events) = self.plot_events.take() {
            events.unbind();
        }
        self.frame_loop.stop();
        match &mut self.chart {
            ChartKind::Contour(chart) => chart.dispose(),
            ChartKind::Scatter(chart) => chart.dispose(),
        }
    }
}

thread_local! {
    static CHART_INSTANCES: RefCell<HashMap<Uuid, ChartInstance>> = RefCell::new(HashMap::new());
}

pub struct InstanceManager;

impl InstanceManager {
    /// Build an instance that needs its own id (DOM listeners capture it)
    /// and register it
    pub fn create_instance<F>(build: F) -> Uuid
    where
        F: FnOnce(Uuid) -> ChartInstance,
    {
        let id = Uuid::new_v4();
        let instance = build(id);
        CHART_INSTANCES.with(|instances| {
            instances.borrow_mut().insert(id, instance);
        });
        log::info!("Chart instance {id} created");
        id
    }

    pub fn with_instance<F, R>(id: &Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&ChartInstance) -> R,
    {
        CHART_INSTANCES.with(|instances| instances.borrow().get(id).map(f))
    }

    pub fn with_instance_mut<F, R>(id: &Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut ChartInstance) -> R,
    {
        CHART_INSTANCES.with(|instances| instances.borrow_mut().get_mut(id).map(f))
    }

    pub fn instance_exists(id: &Uuid) -> bool {
        CHART_INSTANCES.with(|instances| instances.borrow().contains_key(id))
    }

    /// Remove and return an instance. Dropping it outside the registry
    /// borrow lets its DOM listeners detach safely.
    pub fn remove_instance(id: &Uuid) -> Option<ChartInstance> {
        CHART_INSTANCES.with(|instances| instances.borrow_mut().remove(id))
    }

    pub fn instance_count() -> usize {
        CHART_INSTANCES.with(|instances| instances.borrow().len())
    }

    pub fn clear_all() {
        let drained: Vec<ChartInstance> = CHART_INSTANCES
            .with(|instances| instances.borrow_mut().drain().map(|(_, v)| v).collect());
        drop(drained);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charts::testing::Harness;
    use charts::ChartConfig;
    use serde_json::json;

    fn contour_instance(harness: &Harness) -> ChartInstance {
        ChartInstance::new(ChartKind::Contour(ContourChart::new(
            harness.parts(),
            ChartConfig::default(),
        )))
    }

    #[test]
    fn test_instance_creation_and_retrieval() {
        InstanceManager::clear_all();
        let harness = Harness::new();

        let id = InstanceManager::create_instance(|_| contour_instance(&harness));
        assert!(InstanceManager::instance_exists(&id));
        assert_eq!(InstanceManager::instance_count(), 1);
        assert_eq!(
            InstanceManager::with_instance(&id, |instance| instance.contour().is_some()),
            Some(true)
        );

        let removed = InstanceManager::remove_instance(&id);
        assert!(removed.is_some());
        assert!(!InstanceManager::instance_exists(&id));
        assert_eq!(InstanceManager::instance_count(), 0);
        assert!(InstanceManager::with_instance_mut(&id, |_| ()).is_none());
    }

    #[test]
    fn test_kind_accessors_route_by_chart() {
        let harness = Harness::new();
        let mut instance = ChartInstance::new(ChartKind::Scatter(ScatterChart::new(
            harness.parts(),
            ChartConfig::default(),
        )));
        assert!(instance.contour_mut().is_none());
        let scatter = instance.scatter_mut().unwrap();
        assert!(scatter.init(&json!({ "data": { "x": [1, 2], "y": [3, 4] } })));
        assert!(instance.annotator().is_initialized());

        // Relayouts are ignored until a Plotly probe is bound
        instance.handle_relayout(&json!({ "xaxis.range": [0, 1], "yaxis.range": [0, 1] }));
        instance.handle_plot_click(0, 1);
        assert!(instance.scatter().unwrap().selected_points().is_empty());
    }
}
