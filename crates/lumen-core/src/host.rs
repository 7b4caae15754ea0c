#![forbid(unsafe_code)]

//! The seam between the engine and the document it runs in.
//!
//! The engine never touches a real DOM. Everything it needs from the page
//! (classification facts, layout boxes, text, overlay nodes, the modal mount)
//! goes through [`Host`]. The `lumen-web` crate implements it with `web-sys`;
//! [`crate::testing::SimDocument`] implements it in memory for tests.

use core::fmt;
use core::hash::Hash;

use crate::classify::ElementTraits;
use crate::geometry::{Point, Rect};

/// Engine-allocated identity of one overlay node.
///
/// Ids are never reused within an engine's lifetime, so a stale id held by a
/// host click handler can never address a newer overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// Errors a host may report for the few operations that can fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The document has no body (or equivalent mount root) yet.
    NoMountRoot,
    /// The node left the document between lookup and use.
    Detached,
    /// A host API call threw.
    Call(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMountRoot => write!(f, "document has no mount root"),
            Self::Detached => write!(f, "node is no longer attached"),
            Self::Call(msg) => write!(f, "host call failed: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Host document operations used by the engine.
pub trait Host {
    /// Identity of a live element. Equality must be reference identity, not
    /// value equality: two fields with the same text are different surfaces.
    type Node: Clone + Eq + Hash + fmt::Debug;

    /// Classification snapshot, or `None` for nodes that are not elements.
    fn traits(&self, node: &Self::Node) -> Option<ElementTraits>;

    /// Whether the node is still connected to the document.
    fn is_attached(&self, node: &Self::Node) -> bool;

    /// Current viewport-relative layout box. `None` when detached.
    fn layout_rect(&self, node: &Self::Node) -> Option<Rect>;

    /// Current text: `value` for form controls, rendered text otherwise.
    fn read_text(&self, node: &Self::Node) -> String;

    /// Replace the node's text through its native update path and dispatch the
    /// change notifications frameworks listen for.
    fn write_text(&mut self, node: &Self::Node, text: &str) -> Result<(), HostError>;

    /// Append editable candidates strictly inside `root` (not `root` itself).
    fn candidate_descendants(&self, root: &Self::Node, out: &mut Vec<Self::Node>);

    /// Create an overlay node for `surface` and mount it under the document
    /// body (never inside the surface). It starts transparent.
    fn mount_overlay(&mut self, id: OverlayId, surface: &Self::Node) -> Result<(), HostError>;

    /// Move an overlay to `at` (top-left corner, viewport coordinates).
    fn place_overlay(&mut self, id: OverlayId, at: Point);

    /// Fade an overlay in (`true`) or out (`false`).
    fn set_overlay_shown(&mut self, id: OverlayId, shown: bool);

    /// Remove an overlay node. Unknown ids are ignored.
    fn unmount_overlay(&mut self, id: OverlayId);

    /// Mount (first call) or update the single modal surface.
    fn show_modal(&mut self, request: &ModalRequest) -> Result<(), HostError>;

    /// Hide the modal surface, keeping its mount point for reuse.
    fn hide_modal(&mut self);
}

/// Payload handed to the host when the modal opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalRequest {
    /// Ticket the host must present on every later modal call.
    pub ticket: crate::modal::ModalTicket,
    /// Text read from the focused target at activation time.
    pub source_text: String,
}
