//! Named chart events
//!
//! Listeners are keyed by event name. A failing or panicking listener is
//! logged and the remaining listeners still receive the event.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use annotations::Shape;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::DataPoint;

pub const DRAWING_COMPLETE: &str = "drawingComplete";
pub const SELECTION_CHANGE: &str = "selectionChange";
pub const POINT_CLICK: &str = "pointClick";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Rebuild an id handed out to JavaScript
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

pub type Listener = Box<dyn Fn(&EventPayload) -> anyhow::Result<()>>;

/// Extended per-point attributes of a scatter sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointAttributes {
    pub a: Value,
    pub b: Value,
    pub m: Value,
    pub n: Value,
    pub row: Value,
    pub pseu: Value,
}

/// Payload of `drawingComplete`: the shape properties plus its points
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingCompleteEvent {
    #[serde(flatten)]
    pub shape: Shape,
    pub points: Vec<DataPoint>,
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionChangeEvent {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub attributes: Option<PointAttributes>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointClickEvent {
    pub x: f64,
    pub y: f64,
    pub point_index: usize,
    #[serde(flatten)]
    pub attributes: Option<PointAttributes>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    DrawingComplete(DrawingCompleteEvent),
    SelectionChange(SelectionChangeEvent),
    PointClick(PointClickEvent),
    Custom(Value),
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event: &str, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove one listener; `false` when it was not registered for `event`
    pub fn off(&mut self, event: &str, id: ListenerId) -> bool {
        let Some(listeners) = self.listeners.get_mut(event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            self.listeners.remove(event);
        }
        removed
    }

    /// Deliver `payload` to every listener of `event`. Returns how many
    /// listeners completed without error.
    pub fn emit(&self, event: &str, payload: &EventPayload) -> usize {
        let Some(listeners) = self.listeners.get(event) else {
            return 0;
        };
        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    log::error!("Listener {} for {event} failed: {e:#}", id.as_u64());
                }
                Err(_) => {
                    log::error!("Listener {} for {event} panicked", id.as_u64());
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
