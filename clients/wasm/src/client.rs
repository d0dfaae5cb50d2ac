//! `XBedrock`: the primary wasm-bindgen export.
//!
//! ## JavaScript usage
//!
//! ```js
//! import init, { XBedrock } from './pkg/xbedrock_bridge_wasm.js';
//!
//! await init();
//!
//! const xb = new XBedrock({
//!   serverUrl: 'ws://localhost:8080',
//!   syncInterval: 1000,
//!   features: { webstore: false },
//! });
//!
//! const onChat = (data) => console.log('chat', data.message);
//! xb.on('connect', () => xb.sendChat('hello'));
//! xb.on('chat', onChat);
//! xb.on('position', ({ position }) => movePlayer(position));
//!
//! xb.connect();
//! xb.updateInventory([{ id: 'diamond_sword', count: 1 }]);
//! xb.off('chat', onChat);
//! ```

use serde_json::Value;
use wasm_bindgen::prelude::*;

use xbedrock_bridge::{Bridge, Item, PartialConfig, Position, WebstoreData};

use crate::bridge::BrowserRuntime;
use crate::events::{js_to_json, json_to_js, JsHandler};

// ---------------------------------------------------------------------------
// XBedrock
// ---------------------------------------------------------------------------

/// Instantiate with `new XBedrock(config?)`.  Every config field is
/// optional; see `PartialConfig` for the accepted keys.
#[wasm_bindgen(js_name = XBedrock)]
pub struct XBedrockClient {
    bridge: Bridge<BrowserRuntime, JsHandler>,
}

#[wasm_bindgen(js_class = XBedrock)]
impl XBedrockClient {
    // -----------------------------------------------------------------------
    // Constructor
    // -----------------------------------------------------------------------

    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<XBedrockClient, JsValue> {
        let partial = if config.is_undefined() || config.is_null() {
            PartialConfig::default()
        } else {
            partial_config_from_json(js_to_json(&config)?).map_err(type_error)?
        };
        let config = partial.resolve();
        log::info!(
            "[client] XBedrock for {} (sync every {} ms)",
            config.server_url(),
            config.sync_interval_ms()
        );

        let (runtime, sink) = BrowserRuntime::new();
        let bridge = Bridge::new(config, runtime);
        let weak = bridge.downgrade();
        if sink
            .set(Box::new(move |id, event| {
                if let Some(bridge) = weak.upgrade() {
                    bridge.handle_socket_event(id, event);
                }
            }))
            .is_err()
        {
            log::warn!("[client] event sink already attached");
        }

        Ok(Self { bridge })
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Open the WebSocket.  No-op while connecting or connected.
    pub fn connect(&self) {
        self.bridge.connect();
    }

    pub fn disconnect(&self) {
        self.bridge.disconnect();
    }

    #[wasm_bindgen(js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.bridge.is_connected()
    }

    /// `"disconnected"` | `"connecting"` | `"connected"`
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.bridge.state().as_str().to_string()
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    #[wasm_bindgen(js_name = sendChat)]
    pub fn send_chat(&self, message: &str) {
        self.bridge.send_chat(message);
    }

    /// `position: { x, y, z }`
    #[wasm_bindgen(js_name = sendPosition)]
    pub fn send_position(&self, position: JsValue) -> Result<(), JsValue> {
        let position = position_from_json(js_to_json(&position)?).map_err(type_error)?;
        self.bridge.send_position(position);
        Ok(())
    }

    /// `items: any[]`
    #[wasm_bindgen(js_name = updateInventory)]
    pub fn update_inventory(&self, items: JsValue) -> Result<(), JsValue> {
        let items = items_from_json(js_to_json(&items)?).map_err(type_error)?;
        self.bridge.update_inventory(items);
        Ok(())
    }

    /// `items: any[]`
    #[wasm_bindgen(js_name = updateCosmetics)]
    pub fn update_cosmetics(&self, items: JsValue) -> Result<(), JsValue> {
        let items = items_from_json(js_to_json(&items)?).map_err(type_error)?;
        self.bridge.update_cosmetics(items);
        Ok(())
    }

    /// `data: object`
    #[wasm_bindgen(js_name = updateWebstore)]
    pub fn update_webstore(&self, data: JsValue) -> Result<(), JsValue> {
        let data = webstore_from_json(js_to_json(&data)?).map_err(type_error)?;
        self.bridge.update_webstore(data);
        Ok(())
    }

    /// A fresh plain object each call: `{ position, inventory, cosmetics, webstore }`.
    #[wasm_bindgen(js_name = getPlayerData)]
    pub fn get_player_data(&self) -> Result<JsValue, JsValue> {
        let value = serde_json::to_value(self.bridge.get_player_data())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(json_to_js(&value))
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// `event`: `chat` | `position` | `inventory` | `cosmetics` | `webstore` |
    /// `connect` | `disconnect` | `error`.  Unknown names are ignored.
    pub fn on(&self, event: &str, handler: js_sys::Function) {
        if !self.bridge.on_named(event, JsHandler(handler)) {
            log::debug!("[client] ignoring handler for unknown event '{}'", event);
        }
    }

    pub fn off(&self, event: &str, handler: js_sys::Function) {
        self.bridge.off_named(event, &JsHandler(handler));
    }
}

// ---------------------------------------------------------------------------
// Argument conversion
// ---------------------------------------------------------------------------

fn type_error(message: String) -> JsValue {
    js_sys::TypeError::new(&message).into()
}

pub fn partial_config_from_json(value: Value) -> Result<PartialConfig, String> {
    serde_json::from_value(value).map_err(|e| format!("invalid XBedrock config: {}", e))
}

pub fn position_from_json(value: Value) -> Result<Position, String> {
    serde_json::from_value(value).map_err(|e| format!("position must be {{x, y, z}}: {}", e))
}

pub fn items_from_json(value: Value) -> Result<Vec<Item>, String> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(format!("expected an array, got {}", other)),
    }
}

pub fn webstore_from_json(value: Value) -> Result<WebstoreData, String> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected an object, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_from_js_object() {
        let partial = partial_config_from_json(json!({
            "serverUrl": "wss://mc.example/bridge",
            "features": { "cosmetics": false }
        }))
        .unwrap();
        let cfg = partial.resolve();
        assert_eq!(cfg.server_url(), "wss://mc.example/bridge");
        assert_eq!(cfg.sync_interval_ms(), 1000);
        assert!(!cfg.features().cosmetics);
        assert!(cfg.features().chat);
    }

    #[test]
    fn empty_config_object_is_all_defaults() {
        let cfg = partial_config_from_json(json!({})).unwrap().resolve();
        assert_eq!(cfg.server_url(), "ws://localhost:8080");
    }

    #[test]
    fn config_rejects_wrong_types() {
        assert!(partial_config_from_json(json!({ "syncInterval": "fast" })).is_err());
    }

    #[test]
    fn position_needs_all_axes() {
        let p = position_from_json(json!({"x": 1.5, "y": 64, "z": -3})).unwrap();
        assert_eq!(p, Position::new(1.5, 64.0, -3.0));
        assert!(position_from_json(json!({"x": 1})).is_err());
    }

    #[test]
    fn items_and_webstore_shapes() {
        assert_eq!(items_from_json(json!([1, "a"])).unwrap().len(), 2);
        assert!(items_from_json(json!({"a": 1})).is_err());
        assert_eq!(webstore_from_json(json!({"vip": true})).unwrap()["vip"], true);
        assert!(webstore_from_json(json!([])).is_err());
    }
}
