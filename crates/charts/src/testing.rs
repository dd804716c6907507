//! In-memory collaborators that record every call
//!
//! Each recorder is a cheap handle over shared state: box one clone into the
//! chart and keep another to inspect what the chart did.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use annotations::{LayoutPatch, Trace, TracePatch};
use serde_json::Value;
use shared_types::events::{PhysicalPosition, PointerEventKind};
use shared_types::{AnnotateError, AnnotateResult, AxisRange, DataPoint, Viewport};

use crate::backend::{Clock, LegendRenderer, PlotBackend, PointerSurface};
use crate::color_bar::{BandJoin, LegendFrame, PlacedBand};

#[derive(Debug, Clone)]
pub enum BackendCall {
    NewPlot {
        traces: Vec<Trace>,
        layout: Value,
        config: Value,
    },
    Restyle {
        patch: TracePatch,
        indices: Vec<usize>,
    },
    Relayout(LayoutPatch),
    UpdateLayout(Value),
    AddTraces(Vec<Trace>),
    DeleteTraces(Vec<usize>),
    Purge,
    Resize,
}

#[derive(Debug)]
struct BackendState {
    calls: Vec<BackendCall>,
    viewport: Option<Viewport>,
    container: (f64, f64),
    fail_next: bool,
}

/// Plot backend whose pixel space equals data space
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    state: Rc<RefCell<BackendState>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(BackendState {
                calls: Vec::new(),
                viewport: Some(Viewport::new(
                    AxisRange::new(0.0, 100.0),
                    AxisRange::new(0.0, 100.0),
                )),
                container: (800.0, 600.0),
                fail_next: false,
            })),
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn restyles(&self) -> Vec<(TracePatch, Vec<usize>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Restyle { patch, indices } => Some((patch, indices)),
                _ => None,
            })
            .collect()
    }

    pub fn relayouts(&self) -> Vec<LayoutPatch> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Relayout(patch) => Some(patch),
                _ => None,
            })
            .collect()
    }

    pub fn set_viewport(&self, viewport: Option<Viewport>) {
        self.state.borrow_mut().viewport = viewport;
    }

    pub fn set_container(&self, width: f64, height: f64) {
        self.state.borrow_mut().container = (width, height);
    }

    /// Make the next mutating call fail with a backend error
    pub fn fail_next(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    fn record(&self, call: BackendCall) -> AnnotateResult<()> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_next) {
            return Err(AnnotateError::backend("injected failure"));
        }
        state.calls.push(call);
        Ok(())
    }
}

impl PlotBackend for RecordingBackend {
    fn new_plot(&mut self, traces: &[Trace], layout: &Value, config: &Value) -> AnnotateResult<()> {
        self.record(BackendCall::NewPlot {
            traces: traces.to_vec(),
            layout: layout.clone(),
            config: config.clone(),
        })
    }

    fn restyle(&mut self, patch: &TracePatch, indices: &[usize]) -> AnnotateResult<()> {
        self.record(BackendCall::Restyle {
            patch: patch.clone(),
            indices: indices.to_vec(),
        })
    }

    fn relayout(&mut self, patch: &LayoutPatch) -> AnnotateResult<()> {
        self.record(BackendCall::Relayout(patch.clone()))?;
        if let (Some(x), Some(y)) = (patch.x_range, patch.y_range) {
            self.state.borrow_mut().viewport = Some(Viewport::new(
                AxisRange::new(x[0], x[1]),
                AxisRange::new(y[0], y[1]),
            ));
        }
        Ok(())
    }

    fn update_layout(&mut self, layout: &Value) -> AnnotateResult<()> {
        self.record(BackendCall::UpdateLayout(layout.clone()))
    }

    fn add_traces(&mut self, traces: &[Trace]) -> AnnotateResult<()> {
        self.record(BackendCall::AddTraces(traces.to_vec()))
    }

    fn delete_traces(&mut self, indices: &[usize]) -> AnnotateResult<()> {
        self.record(BackendCall::DeleteTraces(indices.to_vec()))
    }

    fn purge(&mut self) -> AnnotateResult<()> {
        self.record(BackendCall::Purge)
    }

    fn resize(&mut self) -> AnnotateResult<()> {
        self.record(BackendCall::Resize)
    }

    fn viewport(&self) -> Option<Viewport> {
        self.state.borrow().viewport
    }

    fn container_size(&self) -> (f64, f64) {
        self.state.borrow().container
    }

    fn pixel_to_data(&self, position: PhysicalPosition) -> Option<DataPoint> {
        Some(DataPoint::new(position.x, position.y))
    }
}

#[derive(Debug, Clone)]
pub enum LegendCall {
    CreateScene(LegendFrame, Vec<PlacedBand>),
    ApplyJoin(BandJoin),
    RemoveScene,
}

#[derive(Debug, Clone)]
pub struct RecordingLegend {
    host_height: Rc<Cell<Option<f64>>>,
    calls: Rc<RefCell<Vec<LegendCall>>>,
}

impl Default for RecordingLegend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingLegend {
    pub fn new() -> Self {
        Self {
            host_height: Rc::new(Cell::new(Some(600.0))),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// `None` simulates a hidden host
    pub fn set_host_height(&self, height: Option<f64>) {
        self.host_height.set(height);
    }

    pub fn calls(&self) -> Vec<LegendCall> {
        self.calls.borrow().clone()
    }
}

impl LegendRenderer for RecordingLegend {
    fn host_height(&self) -> Option<f64> {
        self.host_height.get()
    }

    fn create_scene(&mut self, frame: &LegendFrame, bands: &[PlacedBand]) -> AnnotateResult<()> {
        self.calls
            .borrow_mut()
            .push(LegendCall::CreateScene(frame.clone(), bands.to_vec()));
        Ok(())
    }

    fn apply_join(&mut self, join: &BandJoin) -> AnnotateResult<()> {
        self.calls.borrow_mut().push(LegendCall::ApplyJoin(join.clone()));
        Ok(())
    }

    fn remove_scene(&mut self) -> AnnotateResult<()> {
        self.calls.borrow_mut().push(LegendCall::RemoveScene);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    attached: HashSet<PointerEventKind>,
    attach_calls: usize,
    detach_calls: usize,
    cursor: String,
    fail_attach: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(&self) -> HashSet<PointerEventKind> {
        self.state.borrow().attached.clone()
    }

    pub fn attach_calls(&self) -> usize {
        self.state.borrow().attach_calls
    }

    pub fn detach_calls(&self) -> usize {
        self.state.borrow().detach_calls
    }

    pub fn cursor(&self) -> String {
        self.state.borrow().cursor.clone()
    }

    /// Make the next attach fail
    pub fn fail_next_attach(&self) {
        self.state.borrow_mut().fail_attach = true;
    }
}

impl PointerSurface for RecordingSurface {
    fn attach(&mut self, kinds: &[PointerEventKind]) -> AnnotateResult<()> {
        let mut state = self.state.borrow_mut();
        state.attach_calls += 1;
        if std::mem::take(&mut state.fail_attach) {
            return Err(AnnotateError::backend("listener attach refused"));
        }
        state.attached.extend(kinds.iter().copied());
        Ok(())
    }

    fn detach(&mut self, kinds: &[PointerEventKind]) {
        let mut state = self.state.borrow_mut();
        state.detach_calls += 1;
        for kind in kinds {
            state.attached.remove(kind);
        }
    }

    fn set_cursor(&mut self, cursor: &str) {
        self.state.borrow_mut().cursor = cursor.to_string();
    }
}

/// Clock advanced by hand
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: f64) -> f64 {
        self.now.set(self.now.get() + ms);
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Recorders wired into one chart
pub struct Harness {
    pub backend: RecordingBackend,
    pub surface: RecordingSurface,
    pub legend: RecordingLegend,
    pub clock: ManualClock,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            backend: RecordingBackend::new(),
            surface: RecordingSurface::new(),
            legend: RecordingLegend::new(),
            clock: ManualClock::new(),
        }
    }

    pub fn parts(&self) -> crate::backend::ChartParts {
        crate::backend::ChartParts {
            backend: Box::new(self.backend.clone()),
            surface: Box::new(self.surface.clone()),
            legend: Box::new(self.legend.clone()),
            clock: Box::new(self.clock.clone()),
        }
    }
}
