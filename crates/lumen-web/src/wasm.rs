#![forbid(unsafe_code)]

//! `wasm-bindgen` exports. Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::rc::Rc;

use lumen_core::EngineConfig;
use tracing::Level;
use wasm_bindgen::prelude::*;

use crate::app::App;
use crate::console_sink;

thread_local! {
    static RUNNING: RefCell<Option<Rc<RefCell<App>>>> = const { RefCell::new(None) };
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = match info.location() {
                Some(loc) => format!(
                    "lumen panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                ),
                None => format!("lumen panic: {info}"),
            };
            web_sys::console::error_1(&JsValue::from_str(&msg));
        }));
    });
}

fn run(config: EngineConfig) -> Result<(), JsValue> {
    stop();
    let app = App::boot(config)?;
    RUNNING.with(|slot| *slot.borrow_mut() = Some(app));
    Ok(())
}

/// Module entry point: start with the default tunables.
#[wasm_bindgen(start)]
pub fn start() {
    install_panic_hook();
    console_sink::install(Level::INFO);
    if let Err(err) = run(EngineConfig::default()) {
        tracing::warn!(?err, "lumen failed to start");
    }
}

/// Restart with tunables given as JSON (see `EngineConfig`).
#[wasm_bindgen(js_name = startWithConfig)]
pub fn start_with_config(json: &str) -> Result<(), JsValue> {
    let config =
        EngineConfig::from_json_str(json).map_err(|err| JsValue::from_str(&err.to_string()))?;
    run(config)
}

/// Remove every listener, overlay and the modal from the page.
#[wasm_bindgen]
pub fn stop() {
    if let Some(app) = RUNNING.with(|slot| slot.borrow_mut().take()) {
        App::shutdown(&app);
    }
}
