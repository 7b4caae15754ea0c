#![forbid(unsafe_code)]

//! `fetch` transport for provider calls.

use js_sys::{Object, Reflect};
use lumen_core::ConversionError;
use lumen_services::HttpRequest;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

fn network(err: JsValue) -> ConversionError {
    ConversionError::Network(err.as_string().unwrap_or_else(|| "request failed".to_owned()))
}

/// POST `request` and return the status with the body text.
///
/// Any rejection before a response arrives (offline, CORS, aborted) is a
/// network error; HTTP status handling is left to the response parser.
pub async fn send(request: &HttpRequest) -> Result<(u16, String), ConversionError> {
    let window = web_sys::window().ok_or_else(|| ConversionError::Network("no window".into()))?;

    let headers = Object::new();
    for (name, value) in &request.headers {
        Reflect::set(&headers, &JsValue::from_str(name), &JsValue::from_str(value))
            .map_err(network)?;
    }
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(&headers);
    init.set_body(&JsValue::from_str(&request.body));

    let req = Request::new_with_str_and_init(&request.url, &init).map_err(network)?;
    let response: Response = JsFuture::from(window.fetch_with_request(&req))
        .await
        .map_err(network)?
        .dyn_into()
        .map_err(network)?;
    let status = response.status();
    let body = JsFuture::from(response.text().map_err(network)?)
        .await
        .map_err(network)?
        .as_string()
        .unwrap_or_default();
    tracing::debug!(status, body_len = body.len(), "provider responded");
    Ok((status, body))
}
