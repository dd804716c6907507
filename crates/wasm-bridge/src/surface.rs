//! DOM pointer listeners on the plot container

use std::collections::HashMap;

use charts::PointerSurface;
use shared_types::events::{PhysicalPosition, PointerEvent, PointerEventKind};
use shared_types::AnnotateResult;
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlElement, MouseEvent};

use crate::instance_manager::InstanceManager;

/// Plotly's drag layer, which owns the cursor over the plot area
const DRAG_LAYER: &str = ".nsewdrag";

type PointerClosure = Closure<dyn FnMut(MouseEvent)>;

pub struct DomSurface {
    element: HtmlElement,
    instance_id: Uuid,
    listeners: HashMap<PointerEventKind, PointerClosure>,
}

impl DomSurface {
    pub fn new(element: HtmlElement, instance_id: Uuid) -> Self {
        Self {
            element,
            instance_id,
            listeners: HashMap::new(),
        }
    }

    fn listener(&self, kind: PointerEventKind) -> PointerClosure {
        let element = self.element.clone();
        let instance_id = self.instance_id;
        Closure::wrap(Box::new(move |event: MouseEvent| {
            if kind == PointerEventKind::ContextMenu {
                event.prevent_default();
            }
            let rect = element.get_bounding_client_rect();
            let pointer = PointerEvent {
                kind,
                position: PhysicalPosition::new(
                    f64::from(event.client_x()) - rect.left(),
                    f64::from(event.client_y()) - rect.top(),
                ),
            };
            InstanceManager::with_instance_mut(&instance_id, |instance| {
                instance.annotator_mut().handle_pointer_event(&pointer);
            });
        }) as Box<dyn FnMut(MouseEvent)>)
    }

    fn cursor_target(&self) -> HtmlElement {
        self.element
            .query_selector(DRAG_LAYER)
            .ok()
            .flatten()
            .and_then(|layer| layer.dyn_into::<HtmlElement>().ok())
            .unwrap_or_else(|| self.element.clone())
    }
}

impl PointerSurface for DomSurface {
    fn attach(&mut self, kinds: &[PointerEventKind]) -> AnnotateResult<()> {
        for &kind in kinds {
            if self.listeners.contains_key(&kind) {
                continue;
            }
            let closure = self.listener(kind);
            self.element
                .add_event_listener_with_callback(kind.dom_name(), closure.as_ref().unchecked_ref())?;
            self.listeners.insert(kind, closure);
        }
        Ok(())
    }

    fn detach(&mut self, kinds: &[PointerEventKind]) {
        for kind in kinds {
            if let Some(closure) = self.listeners.remove(kind) {
                if let Err(e) = self.element.remove_event_listener_with_callback(
                    kind.dom_name(),
                    closure.as_ref().unchecked_ref(),
                ) {
                    log::warn!("Failed to remove {} listener: {e:?}", kind.dom_name());
                }
            }
        }
    }

    fn set_cursor(&mut self, cursor: &str) {
        if let Err(e) = self.cursor_target().style().set_property("cursor", cursor) {
            log::warn!("Failed to set cursor: {e:?}");
        }
    }
}

impl Drop for DomSurface {
    fn drop(&mut self) {
        let kinds: Vec<_> = self.listeners.keys().copied().collect();
        self.detach(&kinds);
    }
}
