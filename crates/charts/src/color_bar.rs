//! Colour-bar legend
//!
//! Bands are kept sorted by level and laid out bottom to top in equal blocks.
//! An update is expressed as an index join against the previous band set
//! (update the common prefix, enter the new tail, exit the old tail). While
//! the host is hidden nothing is drawn; the data is recorded and rendered on
//! [`ColorBar::check_pending`].

use serde::Serialize;
use shared_types::{format_number, AnnotateError, AnnotateResult, LegendBand};

use crate::backend::LegendRenderer;
use crate::config::{ColorBarOptions, ColorBarOptionsPatch};

/// Extra width reserved right of the bar for labels
const LABEL_GUTTER: f64 = 60.0;
const LABEL_OFFSET: f64 = 5.0;

/// Geometry and label style of the legend scene
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendFrame {
    pub width: f64,
    pub height: f64,
    pub bar_width: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
    pub label_color: String,
    pub label_size: f64,
    pub font_family: String,
    pub show_labels: bool,
}

/// One band placed in the frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedBand {
    pub index: usize,
    pub color: String,
    pub label: String,
    pub y: f64,
    pub height: f64,
    pub label_x: f64,
    pub label_y: f64,
}

/// Enter/update/exit join against the previous band set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandJoin {
    pub frame: LegendFrame,
    pub update: Vec<PlacedBand>,
    pub enter: Vec<PlacedBand>,
    /// Indices of old bands to remove
    pub exit: Vec<usize>,
}

enum ColorBarState {
    Absent,
    /// Added while the host was hidden
    Pending {
        bands: Vec<LegendBand>,
        options: ColorBarOptions,
    },
    Rendered {
        bands: Vec<LegendBand>,
        options: ColorBarOptions,
        /// Bands currently in the scene
        drawn: usize,
        pending_update: bool,
    },
}

pub struct ColorBar {
    renderer: Box<dyn LegendRenderer>,
    state: ColorBarState,
}

pub fn sort_bands(bands: &[LegendBand]) -> Vec<LegendBand> {
    let mut sorted = bands.to_vec();
    sorted.sort_by(|a, b| a.level().total_cmp(&b.level()));
    sorted
}

fn frame_for(options: &ColorBarOptions, host_height: f64) -> LegendFrame {
    LegendFrame {
        width: options.width + LABEL_GUTTER,
        height: (host_height - options.top_margin - options.bottom_margin).max(1.0),
        bar_width: options.width,
        right_margin: options.right_margin,
        top_margin: options.top_margin,
        bottom_margin: options.bottom_margin,
        label_color: options.label_color.clone(),
        label_size: options.label_size,
        font_family: options.font_family.clone(),
        show_labels: options.show_labels,
    }
}

/// Lay sorted bands out bottom to top
pub fn place_bands(frame: &LegendFrame, bands: &[LegendBand]) -> Vec<PlacedBand> {
    if bands.is_empty() {
        return Vec::new();
    }
    let block = (frame.height / bands.len() as f64).max(1.0);
    bands
        .iter()
        .enumerate()
        .map(|(i, band)| PlacedBand {
            index: i,
            color: band.color().to_string(),
            label: format_number(band.level()),
            y: frame.height - (i as f64 + 1.0) * block,
            height: block,
            label_x: frame.bar_width + LABEL_OFFSET,
            label_y: frame.height - (i as f64 + 0.5) * block,
        })
        .collect()
}

fn join(frame: LegendFrame, previous: usize, placed: Vec<PlacedBand>) -> BandJoin {
    let common = previous.min(placed.len());
    let mut update = placed;
    let enter = update.split_off(common);
    BandJoin {
        frame,
        update,
        enter,
        exit: (common..previous).collect(),
    }
}

impl ColorBar {
    pub fn new(renderer: Box<dyn LegendRenderer>) -> Self {
        Self {
            renderer,
            state: ColorBarState::Absent,
        }
    }

    /// Replace any legend with `bands`. Returns `Ok(false)` when rendering was
    /// deferred because the host is hidden.
    pub fn add(&mut self, bands: &[LegendBand], options: ColorBarOptions) -> AnnotateResult<bool> {
        if bands.len() < 2 {
            return Err(AnnotateError::invalid("colour bar needs at least two bands"));
        }
        self.remove()?;
        let bands = sort_bands(bands);

        let Some(host_height) = self.visible_host_height() else {
            log::debug!("Colour bar host hidden, deferring render");
            self.state = ColorBarState::Pending { bands, options };
            return Ok(false);
        };

        let frame = frame_for(&options, host_height);
        let placed = place_bands(&frame, &bands);
        self.renderer.create_scene(&frame, &placed)?;
        self.state = ColorBarState::Rendered {
            drawn: bands.len(),
            bands,
            options,
            pending_update: false,
        };
        Ok(true)
    }

    /// Join `bands` against the rendered legend. Falls back to [`ColorBar::add`]
    /// when nothing is rendered yet.
    pub fn update(&mut self, bands: &[LegendBand], patch: &ColorBarOptionsPatch) -> AnnotateResult<bool> {
        if bands.len() < 2 {
            return Err(AnnotateError::invalid("colour bar needs at least two bands"));
        }
        let (previous, options) = match &self.state {
            ColorBarState::Rendered { drawn, options, .. } => (*drawn, options.merged(patch)),
            ColorBarState::Pending { options, .. } => {
                let options = options.merged(patch);
                return self.add(bands, options);
            }
            ColorBarState::Absent => {
                return self.add(bands, ColorBarOptions::default().merged(patch));
            }
        };
        let bands = sort_bands(bands);

        let Some(host_height) = self.visible_host_height() else {
            log::debug!("Colour bar host hidden, update recorded");
            self.state = ColorBarState::Rendered {
                bands,
                options,
                drawn: previous,
                pending_update: true,
            };
            return Ok(false);
        };

        let frame = frame_for(&options, host_height);
        let placed = place_bands(&frame, &bands);
        self.renderer.apply_join(&join(frame, previous, placed))?;
        self.state = ColorBarState::Rendered {
            drawn: bands.len(),
            bands,
            options,
            pending_update: false,
        };
        Ok(true)
    }

    /// Render whatever was deferred while the host was hidden
    pub fn check_pending(&mut self) -> AnnotateResult<bool> {
        match &self.state {
            ColorBarState::Rendered {
                bands,
                pending_update: true,
                ..
            } => {
                let bands = bands.clone();
                self.update(&bands, &ColorBarOptionsPatch::default())
            }
            ColorBarState::Pending { bands, options } => {
                let (bands, options) = (bands.clone(), options.clone());
                self.add(&bands, options)
            }
            _ => Ok(false),
        }
    }

    pub fn remove(&mut self) -> AnnotateResult<()> {
        let state = std::mem::replace(&mut self.state, ColorBarState::Absent);
        if matches!(state, ColorBarState::Rendered { .. }) {
            self.renderer.remove_scene()?;
        }
        Ok(())
    }

    pub fn bands(&self) -> &[LegendBand] {
        match &self.state {
            ColorBarState::Pending { bands, .. } | ColorBarState::Rendered { bands, .. } => bands,
            ColorBarState::Absent => &[],
        }
    }

    pub fn options(&self) -> Option<&ColorBarOptions> {
        match &self.state {
            ColorBarState::Pending { options, .. } | ColorBarState::Rendered { options, .. } => {
                Some(options)
            }
            ColorBarState::Absent => None,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self.state, ColorBarState::Rendered { .. })
    }

    pub fn has_pending_work(&self) -> bool {
        matches!(
            self.state,
            ColorBarState::Pending { .. }
                | ColorBarState::Rendered {
                    pending_update: true,
                    ..
                }
        )
    }

    fn visible_host_height(&self) -> Option<f64> {
        self.renderer.host_height().filter(|height| *height > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LegendCall, RecordingLegend};

    fn bands(levels: &[f64]) -> Vec<LegendBand> {
        levels
            .iter()
            .map(|level| LegendBand::new(*level, format!("c{level}")))
            .collect()
    }

    #[test]
    fn test_bands_sorted_and_placed_bottom_up() {
        let legend = RecordingLegend::new();
        let mut bar = ColorBar::new(Box::new(legend.clone()));
        assert!(bar.add(&bands(&[30.0, 10.0, 20.0]), ColorBarOptions::default()).unwrap());

        let calls = legend.calls();
        let Some(LegendCall::CreateScene(frame, placed)) = calls.last() else {
            panic!("expected a scene, got {calls:?}");
        };
        // 600 host - 80 top - 80 bottom
        assert_eq!(frame.height, 440.0);
        assert_eq!(frame.width, 90.0);
        let labels: Vec<&str> = placed.iter().map(|band| band.label.as_str()).collect();
        assert_eq!(labels, vec!["10", "20", "30"]);
        assert!(placed[0].y > placed[2].y);
        assert_eq!(placed[0].label_x, 35.0);
    }

    #[test]
    fn test_update_joins_by_index() {
        let legend = RecordingLegend::new();
        let mut bar = ColorBar::new(Box::new(legend.clone()));
        bar.add(&bands(&[1.0, 2.0, 3.0]), ColorBarOptions::default()).unwrap();
        bar.update(&bands(&[5.0, 6.0]), &ColorBarOptionsPatch::default()).unwrap();

        let Some(LegendCall::ApplyJoin(join)) = legend.calls().last().cloned() else {
            panic!("expected a join");
        };
        assert_eq!(join.update.len(), 2);
        assert!(join.enter.is_empty());
        assert_eq!(join.exit, vec![2]);
    }

    #[test]
    fn test_hidden_host_defers_until_checked() {
        let legend = RecordingLegend::new();
        let mut bar = ColorBar::new(Box::new(legend.clone()));
        bar.add(&bands(&[1.0, 2.0]), ColorBarOptions::default()).unwrap();

        legend.set_host_height(None);
        assert!(!bar.update(&bands(&[1.0, 2.0, 3.0]), &ColorBarOptionsPatch::default()).unwrap());
        assert!(bar.has_pending_work());
        let calls_before = legend.calls().len();

        legend.set_host_height(Some(400.0));
        assert!(bar.check_pending().unwrap());
        assert!(!bar.has_pending_work());
        assert_eq!(legend.calls().len(), calls_before + 1);
        let Some(LegendCall::ApplyJoin(join)) = legend.calls().last().cloned() else {
            panic!("expected a join");
        };
        assert_eq!(join.enter.len(), 1);
    }

    #[test]
    fn test_pending_add_rendered_on_check() {
        let legend = RecordingLegend::new();
        legend.set_host_height(Some(0.0));
        let mut bar = ColorBar::new(Box::new(legend.clone()));
        assert!(!bar.add(&bands(&[1.0, 2.0]), ColorBarOptions::default()).unwrap());
        assert!(legend.calls().is_empty());

        legend.set_host_height(Some(100.0));
        assert!(bar.check_pending().unwrap());
        assert!(bar.is_rendered());
        // Frame height never drops below one pixel
        let Some(LegendCall::CreateScene(frame, _)) = legend.calls().last().cloned() else {
            panic!("expected a scene");
        };
        assert_eq!(frame.height, 1.0);
    }

    #[test]
    fn test_single_band_rejected() {
        let mut bar = ColorBar::new(Box::new(RecordingLegend::new()));
        assert!(bar.add(&bands(&[1.0]), ColorBarOptions::default()).is_err());
    }
}
