//! Browser runtime: `web_sys::WebSocket` sockets and a `setInterval` sync
//! timer.
//!
//! ## Threading model
//!
//! WASM is single-threaded.  Every callback below is queued by the browser
//! and runs to completion on the main event loop, so nothing here ever
//! fires while the session is borrowed.
//!
//! ```text
//! JS main frame
//! ─────────────────────────────────────────────────────────
//! XBedrock.sendChat() / connect() / ...
//!   Bridge → Session → BrowserRuntime::open / BrowserSocket::send_text
//!
//! web_sys::WebSocket callbacks (onopen / onmessage / onerror / onclose)
//! window.setInterval callback
//!   sink(SocketId, SocketEvent)
//!     → WeakBridge::upgrade() → bridge.handle_socket_event(id, ev)
//!     → JS handlers
//! ```

use std::cell::OnceCell;
use std::rc::Rc;
use std::time::Duration;

use wasm_bindgen::prelude::*;

use xbedrock_bridge::{BridgeError, Runtime, Socket, SocketEvent, SocketId};

/// Where socket and timer callbacks deliver their events.  Filled in once
/// the bridge that owns the runtime exists.
pub type EventSink = Rc<OnceCell<Box<dyn Fn(SocketId, SocketEvent)>>>;

fn deliver(sink: &EventSink, id: SocketId, event: SocketEvent) {
    match sink.get() {
        Some(f) => f(id, event),
        None => log::warn!("[bridge] {} event before sink was attached", id),
    }
}

/// Best-effort text for a thrown JS value.
pub(crate) fn describe(err: &JsValue) -> String {
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return String::from(e.message());
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

struct SyncTimer {
    handle: i32,
    // Keep the closure alive while the interval is registered.
    _tick: Closure<dyn FnMut()>,
}

pub struct BrowserRuntime {
    sink: EventSink,
    sync: Option<SyncTimer>,
}

impl BrowserRuntime {
    /// Create the runtime and the sink the owner must fill in.
    pub fn new() -> (Self, EventSink) {
        let sink: EventSink = Rc::new(OnceCell::new());
        (
            Self {
                sink: sink.clone(),
                sync: None,
            },
            sink,
        )
    }
}

impl Runtime for BrowserRuntime {
    type Socket = BrowserSocket;

    fn open(&mut self, url: &str, id: SocketId) -> Result<BrowserSocket, BridgeError> {
        // Throws synchronously for a malformed URL.
        let ws = web_sys::WebSocket::new(url).map_err(|e| BridgeError::Transport(describe(&e)))?;

        // ----- onopen -------------------------------------------------------
        let sink = self.sink.clone();
        let onopen = Closure::<dyn FnMut()>::new(move || {
            log::info!("[bridge] {} open", id);
            deliver(&sink, id, SocketEvent::Opened);
        });
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));

        // ----- onmessage ----------------------------------------------------
        let sink = self.sink.clone();
        let onmessage =
            Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |ev: web_sys::MessageEvent| {
                match ev.data().as_string() {
                    Some(text) => deliver(&sink, id, SocketEvent::Message(text)),
                    None => log::debug!("[bridge] {} ignoring binary frame", id),
                }
            });
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        // ----- onerror ------------------------------------------------------
        // The browser hides error details from scripts.
        let sink = self.sink.clone();
        let onerror = Closure::<dyn FnMut(web_sys::Event)>::new(move |_ev: web_sys::Event| {
            log::error!("[bridge] {} WebSocket error", id);
            deliver(
                &sink,
                id,
                SocketEvent::Error(BridgeError::transport("WebSocket error")),
            );
        });
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        // ----- onclose ------------------------------------------------------
        let sink = self.sink.clone();
        let onclose =
            Closure::<dyn FnMut(web_sys::CloseEvent)>::new(move |ev: web_sys::CloseEvent| {
                log::info!("[bridge] {} closed ({}): {}", id, ev.code(), ev.reason());
                deliver(&sink, id, SocketEvent::Closed);
            });
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));

        Ok(BrowserSocket {
            ws,
            _onopen: onopen,
            _onmessage: onmessage,
            _onerror: onerror,
            _onclose: onclose,
        })
    }

    fn start_sync(&mut self, id: SocketId, period: Duration) {
        self.cancel_sync();

        let Some(window) = web_sys::window() else {
            log::warn!("[bridge] no window; sync loop disabled");
            return;
        };
        let sink = self.sink.clone();
        let tick = Closure::<dyn FnMut()>::new(move || deliver(&sink, id, SocketEvent::SyncTick));
        let ms = i32::try_from(period.as_millis()).unwrap_or(i32::MAX);

        match window
            .set_interval_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), ms)
        {
            Ok(handle) => {
                log::debug!("[bridge] {} sync every {} ms", id, ms);
                self.sync = Some(SyncTimer {
                    handle,
                    _tick: tick,
                });
            }
            Err(e) => log::error!("[bridge] setInterval failed: {}", describe(&e)),
        }
    }

    fn cancel_sync(&mut self) {
        if let Some(timer) = self.sync.take() {
            if let Some(window) = web_sys::window() {
                window.clear_interval_with_handle(timer.handle);
            }
        }
    }
}

impl Drop for BrowserRuntime {
    fn drop(&mut self) {
        self.cancel_sync();
    }
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

pub struct BrowserSocket {
    ws: web_sys::WebSocket,
    // Keep closures alive for the lifetime of the socket.
    _onopen: Closure<dyn FnMut()>,
    _onmessage: Closure<dyn FnMut(web_sys::MessageEvent)>,
    _onerror: Closure<dyn FnMut(web_sys::Event)>,
    _onclose: Closure<dyn FnMut(web_sys::CloseEvent)>,
}

impl BrowserSocket {
    fn detach(&self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
    }
}

impl Socket for BrowserSocket {
    fn send_text(&mut self, frame: &str) -> Result<(), BridgeError> {
        self.ws
            .send_with_str(frame)
            .map_err(|e| BridgeError::Transport(describe(&e)))
    }

    fn close(&mut self) {
        self.detach();
        let _ = self.ws.close();
    }
}

impl Drop for BrowserSocket {
    fn drop(&mut self) {
        // wasm-bindgen defers freeing a closure that is dropped while it is
        // running, so this is safe from inside `onclose` too.
        self.detach();
        let _ = self.ws.close();
    }
}
