#![forbid(unsafe_code)]

//! Content-script binding for Lumen.
//!
//! # Role in Lumen
//! `lumen-core` decides when overlays appear and what the modal may do;
//! this crate is the page side of that contract on `wasm32`:
//!
//! - `DomHost` implements [`lumen_core::Host`] over `web-sys`.
//! - Document listeners (`focusin`/`focusout`, capture-phase `scroll`,
//!   `resize`, a `MutationObserver`, `pagehide`) feed the engine.
//! - One re-armed `setTimeout` drives the engine's deadline queue.
//! - Provider calls go through `fetch`; credentials live in
//!   `chrome.storage.local`.
//! - The panel is a small DOM view of [`panel_model::PanelModel`].
//!
//! Platform-independent pieces ([`panel_model`], [`console_sink`],
//! [`clock`], [`storage`] resolution, [`styles`]) build and test natively.

pub mod clock;
pub mod console_sink;
pub mod panel_model;
pub mod storage;
pub mod styles;

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
pub mod dom_host;
#[cfg(target_arch = "wasm32")]
mod fetch;
#[cfg(target_arch = "wasm32")]
mod listeners;
#[cfg(target_arch = "wasm32")]
mod panel_view;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::{start, start_with_config, stop};
