//! Pointer and relayout events delivered by the host surface

use serde::{Deserialize, Serialize};

use crate::Viewport;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalPosition {
    pub x: f64,
    pub y: f64,
}

impl PhysicalPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Listener kinds a drawing session acquires on the plot surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEventKind {
    Move,
    Click,
    ContextMenu,
}

impl PointerEventKind {
    pub const ALL: [PointerEventKind; 3] = [
        PointerEventKind::Move,
        PointerEventKind::Click,
        PointerEventKind::ContextMenu,
    ];

    /// DOM event name used when attaching the listener
    pub fn dom_name(&self) -> &'static str {
        match self {
            PointerEventKind::Move => "mousemove",
            PointerEventKind::Click => "click",
            PointerEventKind::ContextMenu => "contextmenu",
        }
    }
}

/// A pointer event in container pixel space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub position: PhysicalPosition,
}

impl PointerEvent {
    pub fn moved(x: f64, y: f64) -> Self {
        Self {
            kind: PointerEventKind::Move,
            position: PhysicalPosition::new(x, y),
        }
    }

    pub fn click(x: f64, y: f64) -> Self {
        Self {
            kind: PointerEventKind::Click,
            position: PhysicalPosition::new(x, y),
        }
    }

    pub fn context_menu(x: f64, y: f64) -> Self {
        Self {
            kind: PointerEventKind::ContextMenu,
            position: PhysicalPosition::new(x, y),
        }
    }
}

/// Summary of a `plotly_relayout` on the main view
#[derive(Clone, Debug, PartialEq, Default)]
pub struct RelayoutEvent {
    /// New axis ranges when both were part of the update
    pub viewport: Option<Viewport>,
    /// Whether the x/y 1:1 anchor is still in place
    pub scale_locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_names() {
        let names: Vec<_> = PointerEventKind::ALL.iter().map(|k| k.dom_name()).collect();
        assert_eq!(names, vec!["mousemove", "click", "contextmenu"]);
    }
}
