#![forbid(unsafe_code)]

//! Core: field detection and overlay lifecycle for the Lumen content script.
//!
//! # Role in Lumen
//! `lumen-core` decides which elements of a page accept typed text, keeps at
//! most one floating icon per such field, drives the icon through its
//! appear/fade lifecycle, and bridges a click on the icon to the single
//! conversion modal and back.
//!
//! # Primary responsibilities
//! - **Classification**: [`is_editable_surface`] over plain [`ElementTraits`].
//! - **Registry**: [`OverlayRegistry`], the only owner of overlay nodes.
//! - **Visibility**: the per-surface state machine in [`visibility`].
//! - **Modal bridge**: the focused target, ticketed modal sessions and the
//!   headless [`Panel`].
//!
//! # How it fits in the system
//! Nothing here touches a DOM or a clock. A host implements [`Host`] and feeds
//! events with an explicit monotonic `now` into one [`Engine`] per document;
//! `lumen-web` does that in the browser, [`testing::SimDocument`] does it in
//! tests. Concrete collaborators (guard, rate limiter, providers) live in
//! `lumen-services` and plug in through the traits in [`collab`].

pub mod classify;
pub mod collab;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod host;
pub mod modal;
pub mod panel;
pub mod position;
pub mod registry;
pub mod timer;
pub mod visibility;
pub mod watcher;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use classify::{ElementTag, ElementTraits, InputType, is_editable_surface};
pub use collab::{
    AdmissionControl, ConversionError, ConversionRequest, OptionKind, ProviderConfig,
    ProviderKind, RequestId, Services, TextGuard, ValidationRequest,
};
pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use geometry::{Point, Rect};
pub use host::{Host, HostError, ModalRequest, OverlayId};
pub use modal::{InsertOutcome, ModalTicket};
pub use panel::{Panel, PanelStage};
pub use registry::{OverlayHandle, OverlayRegistry};
pub use visibility::{Visibility, VisibilityDelays};
pub use watcher::{MutationBatch, ScanReport};
