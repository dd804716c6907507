//! Local mirror of a plot
//!
//! Every mutation is sent to the backend first and mirrored locally only once
//! the backend accepted it, so `traces()` always describes what the plotting
//! library holds. Registry planning reads the mirror, never the backend.

use std::ops::Range;

use annotations::{LayoutPatch, Trace, TracePatch};
use serde_json::Value;
use shared_types::events::PhysicalPosition;
use shared_types::{AnnotateError, AnnotateResult, DataPoint, Viewport};

use crate::backend::PlotBackend;

pub struct Plot {
    backend: Box<dyn PlotBackend>,
    traces: Vec<Trace>,
    layout: Value,
    initialized: bool,
}

impl Plot {
    pub fn new(backend: Box<dyn PlotBackend>) -> Self {
        Self {
            backend,
            traces: Vec::new(),
            layout: Value::Object(serde_json::Map::new()),
            initialized: false,
        }
    }

    pub fn new_plot(&mut self, traces: Vec<Trace>, layout: Value, config: &Value) -> AnnotateResult<()> {
        self.backend.new_plot(&traces, &layout, config)?;
        self.traces = traces;
        self.layout = layout;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn trace(&self, index: usize) -> Option<&Trace> {
        self.traces.get(index)
    }

    pub fn layout(&self) -> &Value {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn restyle(&mut self, patch: &TracePatch, indices: &[usize]) -> AnnotateResult<()> {
        self.ensure_initialized()?;
        if let Some(bad) = indices.iter().find(|index| **index >= self.traces.len()) {
            return Err(AnnotateError::invalid(format!("trace index {bad} out of range")));
        }
        if patch.is_empty() || indices.is_empty() {
            return Ok(());
        }
        self.backend.restyle(patch, indices)?;
        for index in indices {
            patch.apply_to(&mut self.traces[*index]);
        }
        Ok(())
    }

    pub fn relayout(&mut self, patch: &LayoutPatch) -> AnnotateResult<()> {
        self.ensure_initialized()?;
        if patch.is_empty() {
            return Ok(());
        }
        self.backend.relayout(patch)?;
        patch.apply_to(&mut self.layout)
    }

    /// Merge a caller supplied layout object
    pub fn update_layout(&mut self, layout: &Value) -> AnnotateResult<()> {
        self.ensure_initialized()?;
        self.backend.update_layout(layout)?;
        merge_json(&mut self.layout, layout);
        Ok(())
    }

    /// Append traces and return the indices they landed at
    pub fn add_traces(&mut self, traces: Vec<Trace>) -> AnnotateResult<Range<usize>> {
        self.ensure_initialized()?;
        let start = self.traces.len();
        if traces.is_empty() {
            return Ok(start..start);
        }
        self.backend.add_traces(&traces)?;
        self.traces.extend(traces);
        Ok(start..self.traces.len())
    }

    /// Remove the traces at `indices`, highest index first
    pub fn delete_traces(&mut self, indices: &[usize]) -> AnnotateResult<()> {
        self.ensure_initialized()?;
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        if let Some(bad) = sorted.iter().find(|index| **index >= self.traces.len()) {
            return Err(AnnotateError::invalid(format!("trace index {bad} out of range")));
        }
        if sorted.is_empty() {
            return Ok(());
        }
        self.backend.delete_traces(&sorted)?;
        for index in sorted {
            self.traces.remove(index);
        }
        Ok(())
    }

    pub fn purge(&mut self) -> AnnotateResult<()> {
        if !self.initialized {
            return Ok(());
        }
        self.backend.purge()?;
        self.traces.clear();
        self.layout = Value::Object(serde_json::Map::new());
        self.initialized = false;
        Ok(())
    }

    pub fn resize(&mut self) -> AnnotateResult<()> {
        self.ensure_initialized()?;
        self.backend.resize()
    }

    /// Index of the drawing preview layer, if one is on the plot
    pub fn preview_index(&self) -> Option<usize> {
        self.traces.iter().position(Trace::is_preview)
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.backend.viewport()
    }

    pub fn container_size(&self) -> (f64, f64) {
        self.backend.container_size()
    }

    pub fn pixel_to_data(&self, position: PhysicalPosition) -> Option<DataPoint> {
        self.backend.pixel_to_data(position)
    }

    fn ensure_initialized(&self) -> AnnotateResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(AnnotateError::NotInitialized)
        }
    }
}

/// Recursive object merge; non-object values replace the target
pub fn merge_json(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendCall, RecordingBackend};
    use serde_json::json;

    fn plot_with(traces: usize) -> (Plot, RecordingBackend) {
        let backend = RecordingBackend::new();
        let mut plot = Plot::new(Box::new(backend.clone()));
        plot.new_plot(vec![Trace::scatter(); traces], json!({}), &json!({}))
            .unwrap();
        (plot, backend)
    }

    #[test]
    fn test_mutations_require_initialization() {
        let mut plot = Plot::new(Box::new(RecordingBackend::new()));
        assert_eq!(
            plot.add_traces(vec![Trace::scatter()]),
            Err(AnnotateError::NotInitialized)
        );
    }

    #[test]
    fn test_delete_traces_sends_descending_indices() {
        let (mut plot, backend) = plot_with(5);
        plot.delete_traces(&[1, 3, 1]).unwrap();
        assert_eq!(plot.len(), 3);
        assert!(matches!(
            backend.calls().last(),
            Some(BackendCall::DeleteTraces(indices)) if indices == &vec![3, 1]
        ));
    }

    #[test]
    fn test_failed_backend_call_leaves_mirror_untouched() {
        let (mut plot, backend) = plot_with(1);
        backend.fail_next();
        assert!(plot.add_traces(vec![Trace::scatter()]).is_err());
        assert_eq!(plot.len(), 1);
    }

    #[test]
    fn test_layout_mirror() {
        let (mut plot, _) = plot_with(1);
        plot.update_layout(&json!({ "xaxis": { "side": "top" } })).unwrap();
        plot.relayout(&LayoutPatch::scale_lock()).unwrap();
        assert_eq!(plot.layout()["xaxis"]["side"], "top");
        assert_eq!(plot.layout()["yaxis"]["scaleanchor"], "x");
    }
}
