//! Memoized shape construction
//!
//! Drawing sessions ask for the same logical shape on every refresh; the
//! factory hands back the cached instance while kind, id and resolved style
//! stay the same.

use std::collections::HashMap;
use std::rc::Rc;

use shared_types::{AnnotateResult, ShapeKind};

use crate::shape::Shape;
use crate::style::{Fingerprint, ShapeStyle, StyleFingerprint, StylePatch};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: ShapeKind,
    id: String,
    style: Fingerprint,
}

#[derive(Debug, Default)]
pub struct ShapeFactory {
    cache: HashMap<CacheKey, Rc<Shape>>,
}

impl ShapeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached shape for `(kind, id, resolved style)`, built on a miss.
    /// The patch kind decides the shape kind.
    pub fn create_shape(&mut self, id: &str, patch: &StylePatch) -> Rc<Shape> {
        let style = ShapeStyle::resolve(patch);
        let key = CacheKey {
            kind: style.kind(),
            id: id.to_string(),
            style: style.fingerprint(),
        };

        if let Some(shape) = self.cache.get(&key) {
            log::trace!("shape cache hit for {id}");
            return Rc::clone(shape);
        }

        let shape = Rc::new(Shape::new(id, style));
        self.cache.insert(key, Rc::clone(&shape));
        shape
    }

    /// Build from a type name and JSON options. Unknown names are a caller bug
    /// and come back as `UnsupportedShapeType`.
    pub fn create_shape_named(
        &mut self,
        kind: &str,
        id: &str,
        options: &serde_json::Value,
    ) -> AnnotateResult<Rc<Shape>> {
        let kind: ShapeKind = kind.parse()?;
        let patch = StylePatch::from_value(kind, options)?;
        Ok(self.create_shape(id, &patch))
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::AnnotateError;

    #[test]
    fn test_same_key_returns_cached_instance() {
        let mut factory = ShapeFactory::new();
        let a = factory
            .create_shape_named("polyline", "shape_1", &json!({ "color": "blue" }))
            .unwrap();
        let b = factory
            .create_shape_named("polyline", "shape_1", &json!({ "color": "blue" }))
            .unwrap();

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_key_is_structural() {
        let mut factory = ShapeFactory::new();
        // Field order and explicit defaults do not change the key
        let a = factory
            .create_shape_named("point", "p", &json!({ "size": 12, "color": "red" }))
            .unwrap();
        let b = factory
            .create_shape_named("point", "p", &json!({ "color": "red" }))
            .unwrap();
        assert!(Rc::ptr_eq(&a, &b));

        let c = factory
            .create_shape_named("point", "p", &json!({ "color": "blue" }))
            .unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn test_every_kind_is_fully_populated() {
        let mut factory = ShapeFactory::new();
        for kind in ["point", "polyline", "polygon", "text"] {
            let shape = factory.create_shape_named(kind, "id_1", &json!({})).unwrap();
            assert_eq!(shape.properties().id, "id_1");
            assert_eq!(shape.kind().as_str(), kind);

            let value = serde_json::to_value(shape.style()).unwrap();
            assert!(value.as_object().is_some_and(|o| !o.is_empty()));
            assert!(!value.to_string().contains("null"));
        }
    }

    #[test]
    fn test_unsupported_type() {
        let mut factory = ShapeFactory::new();
        let err = factory
            .create_shape_named("ellipse", "id", &json!({}))
            .unwrap_err();
        assert_eq!(
            err,
            AnnotateError::UnsupportedShapeType {
                kind: "ellipse".to_string()
            }
        );
    }

    #[test]
    fn test_clear_cache() {
        let mut factory = ShapeFactory::new();
        factory.create_shape("a", &StylePatch::empty(ShapeKind::Text));
        assert!(!factory.is_empty());
        factory.clear_cache();
        assert!(factory.is_empty());
    }
}
