//! Scoped pointer listeners for a drawing session

use shared_types::events::PointerEventKind;
use shared_types::AnnotateResult;

use crate::backend::PointerSurface;

/// Owns the drawing listeners on the plot surface. Attaching twice or
/// detaching twice is a no-op, and dropping the manager releases whatever
/// is still attached.
pub struct EventManager {
    surface: Box<dyn PointerSurface>,
    attached: bool,
}

impl EventManager {
    pub fn new(surface: Box<dyn PointerSurface>) -> Self {
        Self {
            surface,
            attached: false,
        }
    }

    pub fn add_events(&mut self) -> AnnotateResult<()> {
        if self.attached {
            return Ok(());
        }
        self.surface.attach(&PointerEventKind::ALL)?;
        self.attached = true;
        log::debug!("Drawing listeners attached");
        Ok(())
    }

    pub fn remove_events(&mut self) {
        if !self.attached {
            return;
        }
        self.surface.detach(&PointerEventKind::ALL);
        self.attached = false;
        log::debug!("Drawing listeners released");
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn set_cursor(&mut self, cursor: &str) {
        self.surface.set_cursor(cursor);
    }
}

impl Drop for EventManager {
    fn drop(&mut self) {
        self.remove_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSurface;

    #[test]
    fn test_attach_and_detach_are_idempotent() {
        let surface = RecordingSurface::new();
        let mut manager = EventManager::new(Box::new(surface.clone()));

        manager.add_events().unwrap();
        manager.add_events().unwrap();
        assert_eq!(surface.attach_calls(), 1);
        assert_eq!(surface.attached().len(), 3);

        manager.remove_events();
        manager.remove_events();
        assert_eq!(surface.detach_calls(), 1);
        assert!(surface.attached().is_empty());
    }

    #[test]
    fn test_drop_releases_listeners() {
        let surface = RecordingSurface::new();
        {
            let mut manager = EventManager::new(Box::new(surface.clone()));
            manager.add_events().unwrap();
        }
        assert!(surface.attached().is_empty());
    }
}
