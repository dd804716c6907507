//! Animation-frame loop driving a chart's timed work
//!
//! Each frame hands the timestamp to the chart's `on_animation_frame`, which
//! drains debounced session starts, preview refreshes, highlight reverts and
//! the eagle-eye throttle. The loop stops itself once the instance is gone.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::instance_manager::InstanceManager;

type AnimationClosure = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoopState {
    Off,
    Running,
}

/// Cheap to clone; clones share the same loop
#[derive(Clone)]
pub struct FrameLoop {
    state: Rc<Cell<FrameLoopState>>,
    animation_frame_id: Rc<RefCell<Option<i32>>>,
    animation_closure: AnimationClosure,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: Rc::new(Cell::new(FrameLoopState::Off)),
            animation_frame_id: Rc::new(RefCell::new(None)),
            animation_closure: Rc::new(RefCell::new(None)),
        }
    }

    pub fn state(&self) -> FrameLoopState {
        self.state.get()
    }

    pub fn start(&self, instance_id: Uuid) {
        if self.state.get() == FrameLoopState::Running {
            return;
        }
        let controller = self.clone();
        let closure = Closure::wrap(Box::new(move |timestamp: f64| {
            controller.on_frame(instance_id, timestamp);
        }) as Box<dyn FnMut(f64)>);
        *self.animation_closure.borrow_mut() = Some(closure);
        self.state.set(FrameLoopState::Running);
        log::debug!("Frame loop started for {instance_id}");
        self.request_frame();
    }

    /// Cancel the pending frame and release the callback
    pub fn stop(&self) {
        self.state.set(FrameLoopState::Off);
        if let Some(id) = self.animation_frame_id.borrow_mut().take() {
            if let Some(window) = web_sys::window() {
                window.cancel_animation_frame(id).ok();
            }
        }
        self.animation_closure.borrow_mut().take();
    }

    fn on_frame(&self, instance_id: Uuid, timestamp: f64) {
        self.animation_frame_id.borrow_mut().take();
        if self.state.get() == FrameLoopState::Off {
            return;
        }
        let alive = InstanceManager::with_instance_mut(&instance_id, |instance| {
            instance.annotator_mut().on_animation_frame(timestamp);
        })
        .is_some();
        if !alive {
            log::debug!("Frame loop for {instance_id} stopped, instance removed");
            self.stop();
            return;
        }
        self.request_frame();
    }

    fn request_frame(&self) {
        let Some(window) = web_sys::window() else {
            log::error!("No window, frame loop cannot run");
            self.state.set(FrameLoopState::Off);
            return;
        };
        let closure = self.animation_closure.borrow();
        let Some(callback) = closure.as_ref() else {
            return;
        };
        match window.request_animation_frame(callback.as_ref().unchecked_ref()) {
            Ok(handle) => *self.animation_frame_id.borrow_mut() = Some(handle),
            Err(e) => {
                log::error!("requestAnimationFrame failed: {e:?}");
                self.state.set(FrameLoopState::Off);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_loop_is_off() {
        let frame_loop = FrameLoop::new();
        assert_eq!(frame_loop.state(), FrameLoopState::Off);
        frame_loop.stop();
        assert_eq!(frame_loop.clone().state(), FrameLoopState::Off);
    }
}
