//! Eagle-eye overview
//!
//! A static copy of the main data trace in a second plot, with one rectangle
//! showing the main view's current window. Viewport changes are coalesced
//! through a [`Throttle`] and pushed from the frame loop.

use annotations::trace::{ColorSpec, Contours, Marker, OneOrMany};
use annotations::{LayoutPatch, Trace, TracePatch};
use serde_json::{json, Value};
use shared_types::{AnnotateResult, Viewport};

use crate::backend::PlotBackend;
use crate::config::EagleEyeOptions;
use crate::plot::Plot;
use crate::scheduler::Throttle;

const RECT_FILL: &str = "rgba(255,255,255,0.3)";
const CONTOUR_RECT_LINE: &str = "rgb(68,68,68)";
const SCATTER_RECT_LINE: &str = "rgb(38,139,57)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewKind {
    Contour,
    Scatter,
}

pub struct EagleEye {
    plot: Plot,
    kind: OverviewKind,
    throttle: Throttle<Viewport>,
}

impl EagleEye {
    /// Overview of a contour trace: no colour scale, no contour labels
    pub fn contour(
        backend: Box<dyn PlotBackend>,
        main: &Trace,
        options: &EagleEyeOptions,
        min_interval_ms: f64,
    ) -> AnnotateResult<Self> {
        let mut trace = main.clone();
        trace.showscale = Some(false);
        trace.customdata = None;
        trace.contours.get_or_insert_with(Contours::default).showlabels = Some(false);
        trace.extra.remove("colorbar");
        Self::build(backend, OverviewKind::Contour, trace, options, min_interval_ms)
    }

    /// Overview of a scatter trace drawn as small square markers
    pub fn scatter(
        backend: Box<dyn PlotBackend>,
        main: &Trace,
        options: &EagleEyeOptions,
        min_interval_ms: f64,
    ) -> AnnotateResult<Self> {
        let source = main.marker.clone().unwrap_or_default();
        let trace = Trace {
            x: main.x.clone(),
            y: main.y.clone(),
            mode: Some("markers".to_string()),
            marker: Some(Marker {
                size: Some(OneOrMany::One(options.marker_size)),
                color: source.color.or_else(|| Some(ColorSpec::Css("#268B39".to_string()))),
                colorscale: source.colorscale,
                opacity: source.opacity,
                symbol: Some("square".to_string()),
                ..Marker::default()
            }),
            hoverinfo: Some("none".to_string()),
            ..Trace::scatter()
        };
        Self::build(backend, OverviewKind::Scatter, trace, options, min_interval_ms)
    }

    fn build(
        backend: Box<dyn PlotBackend>,
        kind: OverviewKind,
        trace: Trace,
        options: &EagleEyeOptions,
        min_interval_ms: f64,
    ) -> AnnotateResult<Self> {
        let layout = overview_layout(kind, &trace, options);
        let config = json!({
            "displayModeBar": false,
            "responsive": true,
            "staticPlot": true,
        });
        let mut plot = Plot::new(backend);
        plot.new_plot(vec![trace], layout, &config)?;
        log::debug!("Eagle-eye overview created ({kind:?})");
        Ok(Self {
            plot,
            kind,
            throttle: Throttle::new(min_interval_ms),
        })
    }

    pub fn kind(&self) -> OverviewKind {
        self.kind
    }

    pub fn plot(&self) -> &Plot {
        &self.plot
    }

    /// Record the main view window; applied by the next due [`EagleEye::poll`]
    pub fn push_viewport(&mut self, viewport: Viewport) {
        self.throttle.push(viewport);
    }

    pub fn has_pending_viewport(&self) -> bool {
        self.throttle.is_pending()
    }

    /// Move the rectangle if a viewport is pending and the interval allows.
    /// Returns whether the overview changed.
    pub fn poll(&mut self, now: f64) -> AnnotateResult<bool> {
        let Some(viewport) = self.throttle.poll(now) else {
            return Ok(false);
        };
        self.plot.relayout(&LayoutPatch::rect(&viewport))?;
        log::trace!("Eagle-eye rectangle moved to {viewport:?}");
        Ok(true)
    }

    /// Forward a main-trace restyle, dropping channels the overview never shows
    pub fn mirror(&mut self, patch: &TracePatch) -> AnnotateResult<()> {
        let patch = self.overview_patch(patch);
        self.plot.restyle(&patch, &[0])
    }

    pub fn update_layout(&mut self, layout: &Value) -> AnnotateResult<()> {
        self.plot.update_layout(layout)
    }

    pub fn dispose(&mut self) -> AnnotateResult<()> {
        self.throttle.cancel();
        self.plot.purge()
    }

    fn overview_patch(&self, patch: &TracePatch) -> TracePatch {
        let mut patch = TracePatch {
            showscale: None,
            colorbar_tickvals: None,
            colorbar_ticktext: None,
            contours_showlabels: None,
            contours_labelfont_color: None,
            customdata: None,
            text: None,
            textposition: None,
            textfont: None,
            ..patch.clone()
        };
        if self.kind == OverviewKind::Scatter {
            // Selection borders and sizes belong to the main view
            patch.marker_line_color = None;
            patch.marker_line_width = None;
            patch.marker_size = None;
        }
        patch
    }
}

fn overview_layout(kind: OverviewKind, trace: &Trace, options: &EagleEyeOptions) -> Value {
    let (x0, x1) = (trace.x.first(), trace.x.last());
    let (y0, y1) = (trace.y.first(), trace.y.last());
    let line_color = match kind {
        OverviewKind::Contour => CONTOUR_RECT_LINE,
        OverviewKind::Scatter => SCATTER_RECT_LINE,
    };
    let y_autorange = match kind {
        OverviewKind::Contour => json!(true),
        OverviewKind::Scatter => json!("reversed"),
    };

    json!({
        "width": options.width,
        "height": options.height,
        "showlegend": false,
        "hovermode": false,
        "dragmode": false,
        "paper_bgcolor": options.background_color,
        "plot_bgcolor": options.background_color,
        "margin": { "l": 2, "r": 2, "t": 2, "b": 2 },
        "xaxis": {
            "visible": false,
            "fixedrange": true,
            "autorange": true,
            "side": "top",
        },
        "yaxis": {
            "visible": false,
            "fixedrange": true,
            "autorange": y_autorange,
        },
        "shapes": [{
            "type": "rect",
            "xref": "x",
            "yref": "y",
            "x0": x0,
            "y0": y0,
            "x1": x1,
            "y1": y1,
            "fillcolor": RECT_FILL,
            "line": { "color": line_color, "width": 1 },
        }],
    })
}
