//! JS-side event handlers and value conversion.
//!
//! Payloads cross the boundary as JSON: the core renders an
//! [`EventPayload`] to `serde_json::Value`, and `JSON.parse` turns the text
//! into a plain JS object.  No wasm-bindgen serde glue is involved.

use wasm_bindgen::prelude::*;

use xbedrock_bridge::{EventHandler, EventPayload};

// ---------------------------------------------------------------------------
// JsHandler
// ---------------------------------------------------------------------------

/// A JS callback registered with `on`.
///
/// Two handlers are the same when they are the same JS function object
/// (`Object.is`), so `off(name, fn)` must be passed the exact function that
/// was given to `on`.
#[derive(Clone)]
pub struct JsHandler(pub js_sys::Function);

impl EventHandler for JsHandler {
    fn same_handler(&self, other: &Self) -> bool {
        js_sys::Object::is(&self.0, &other.0)
    }

    fn call(&self, payload: &EventPayload) {
        call_fn(&self.0, &payload_args(payload));
    }
}

/// Arguments for one JS callback.  `error` handlers get a real `Error`
/// whose `message` is the bridge error text; everything else gets its
/// JSON payload, or no argument at all.
pub fn payload_args(payload: &EventPayload) -> Vec<JsValue> {
    if let EventPayload::Error(e) = payload {
        return vec![js_sys::Error::new(&e.to_string()).into()];
    }
    match payload.to_json() {
        Some(value) => vec![json_to_js(&value)],
        None => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// `serde_json::Value` → JS value via `JSON.parse`.
pub fn json_to_js(value: &serde_json::Value) -> JsValue {
    match js_sys::JSON::parse(&value.to_string()) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("[events] JSON.parse rejected payload: {:?}", e);
            JsValue::UNDEFINED
        }
    }
}

/// JS value → `serde_json::Value` via `JSON.stringify`.
///
/// `undefined` (and anything else `JSON.stringify` drops) maps to `null`.
pub fn js_to_json(value: &JsValue) -> Result<serde_json::Value, JsValue> {
    let text = js_sys::JSON::stringify(value)?;
    match text.as_string() {
        Some(text) => parse_json_text(&text).map_err(|e| JsValue::from_str(&e)),
        None => Ok(serde_json::Value::Null),
    }
}

/// Parse text produced by `JSON.stringify`.
pub fn parse_json_text(text: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

/// Invoke `func` with `this = null`.  A throwing callback is logged and
/// does not stop dispatch to the remaining handlers.
pub fn call_fn(func: &js_sys::Function, args: &[JsValue]) {
    let this = JsValue::NULL;
    let arr = js_sys::Array::new();
    for a in args {
        arr.push(a);
    }
    if let Err(e) = func.apply(&this, &arr) {
        log::warn!("[events] Callback error: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_text_accepts_objects() {
        let v = parse_json_text(r#"{"x":1,"y":2,"z":3}"#).unwrap();
        assert_eq!(v["y"], 2);
    }

    #[test]
    fn parse_json_text_reports_garbage() {
        assert!(parse_json_text("{").is_err());
    }
}
