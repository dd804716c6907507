//! Conversions between JavaScript values and the serde models

use charts::{EventPayload, Listener};
use js_sys::Function;
use serde::Serialize;
use serde_json::Value;
use shared_types::{AnnotateError, AnnotateResult};
use wasm_bindgen::JsValue;

/// Plain objects and arrays only, never `Map`
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> AnnotateResult<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| AnnotateError::Serialization {
            message: e.to_string(),
        })
}

/// `undefined` and `null` both become `Value::Null`
pub fn from_js(value: JsValue) -> AnnotateResult<Value> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| AnnotateError::Serialization {
        message: e.to_string(),
    })
}

/// Caller options, logged and treated as absent when they cannot be read
pub fn options(value: JsValue, operation: &str) -> Value {
    match from_js(value) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("{operation}: unreadable options ({e})");
            Value::Null
        }
    }
}

pub fn to_js_or_null<T: Serialize + ?Sized>(value: &T) -> JsValue {
    to_js(value).unwrap_or_else(|e| {
        log::error!("Failed to convert a result for JavaScript: {e}");
        JsValue::NULL
    })
}

/// Wrap a JavaScript callback as an event listener. The callback runs on a
/// microtask so it may call back into the chart.
pub fn js_listener(callback: Function) -> Listener {
    Box::new(move |payload: &EventPayload| {
        let value = to_js(payload).map_err(|e| anyhow::anyhow!("{e}"))?;
        let callback = callback.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                log::error!("Event callback threw: {e:?}");
            }
        });
        Ok(())
    })
}

/// Locate padding from `{padding}` or a bare number
pub fn padding(options: &Value) -> Option<f64> {
    match options {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("padding").and_then(Value::as_f64),
        _ => None,
    }
}

/// Plotly's restyle reads arrays as one entry per target trace, so every
/// array valued attribute is wrapped once
pub fn per_trace(update: Value) -> Value {
    match update {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| match value {
                    Value::Array(_) => (key, Value::Array(vec![value])),
                    other => (key, other),
                })
                .collect(),
        ),
        other => other,
    }
}

/// Flatten nested layout objects into Plotly's dotted attribute paths so a
/// relayout merges instead of replacing whole containers
pub fn dotted_paths(layout: &Value) -> serde_json::Map<String, Value> {
    fn walk(prefix: &str, value: &Value, out: &mut serde_json::Map<String, Value>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(&path, child, out);
                }
            }
            _ if !prefix.is_empty() => {
                out.insert(prefix.to_string(), value.clone());
            }
            _ => {}
        }
    }

    let mut out = serde_json::Map::new();
    walk("", layout, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_per_trace_wraps_arrays_only() {
        let wrapped = per_trace(json!({
            "x": [1, 2],
            "opacity": 0.5,
            "colorscale": [[0, "red"], [1, "blue"]]
        }));
        assert_eq!(wrapped["x"], json!([[1, 2]]));
        assert_eq!(wrapped["opacity"], json!(0.5));
        assert_eq!(wrapped["colorscale"], json!([[[0, "red"], [1, "blue"]]]));
    }

    #[test]
    fn test_padding_forms() {
        assert_eq!(padding(&json!(0.2)), Some(0.2));
        assert_eq!(padding(&json!({ "padding": 0.5 })), Some(0.5));
        assert_eq!(padding(&json!({})), None);
        assert_eq!(padding(&Value::Null), None);
    }

    #[test]
    fn test_dotted_paths() {
        let flat = dotted_paths(&json!({
            "xaxis": { "title": { "text": "Offset" }, "range": [0, 10] },
            "showlegend": false,
            "annotations": []
        }));
        assert_eq!(flat["xaxis.title.text"], json!("Offset"));
        assert_eq!(flat["xaxis.range"], json!([0, 10]));
        assert_eq!(flat["showlegend"], json!(false));
        assert_eq!(flat["annotations"], json!([]));
        assert!(dotted_paths(&Value::Null).is_empty());
    }
}
