#![forbid(unsafe_code)]

//! In-memory host document for deterministic tests.
//!
//! [`SimDocument`] implements [`Host`] over a small node arena. Nodes are
//! addressed by [`NodeId`]; detaching a node detaches its subtree, exactly
//! like removing it from a real DOM. Overlay and modal calls are recorded so
//! tests can assert on what the engine asked the page to do.

use core::time::Duration;
use std::collections::BTreeMap;

use crate::classify::ElementTraits;
use crate::collab::{AdmissionControl, ConversionError, OptionKind, ProviderKind, Services, TextGuard};
use crate::geometry::{Point, Rect};
use crate::host::{Host, HostError, ModalRequest, OverlayId};

/// Node identity inside a [`SimDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
struct SimNode {
    traits: Option<ElementTraits>,
    attached: bool,
    rect: Rect,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    dispatched: Vec<&'static str>,
}

/// Recorded state of one mounted overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct SimOverlay {
    pub surface: NodeId,
    pub at: Option<Point>,
    pub shown: bool,
    pub placements: u32,
}

/// Simulated host document.
#[derive(Debug, Clone)]
pub struct SimDocument {
    nodes: Vec<SimNode>,
    overlays: BTreeMap<OverlayId, SimOverlay>,
    mount_root: bool,
    modal: Option<ModalRequest>,
    modal_shows: u32,
}

impl Default for SimDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDocument {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            overlays: BTreeMap::new(),
            mount_root: true,
            modal: None,
            modal_shows: 0,
        }
    }

    /// Add an attached top-level element.
    pub fn add(&mut self, traits: ElementTraits) -> NodeId {
        self.push(Some(traits), None, true)
    }

    /// Add a non-element node (text, comment).
    pub fn add_text_node(&mut self) -> NodeId {
        self.push(None, None, true)
    }

    /// Add an element under `parent`, inheriting its attachment.
    pub fn add_child(&mut self, parent: NodeId, traits: ElementTraits) -> NodeId {
        let attached = self.node(parent).attached;
        let id = self.push(Some(traits), Some(parent), attached);
        self.node_mut(parent).children.push(id);
        id
    }

    /// Create an element that is not yet in the document.
    pub fn create_detached(&mut self, traits: ElementTraits) -> NodeId {
        self.push(Some(traits), None, false)
    }

    /// Insert a detached subtree into the document.
    pub fn attach(&mut self, id: NodeId) {
        self.set_attached(id, true);
    }

    /// Remove a node (and its subtree) from the document.
    pub fn detach(&mut self, id: NodeId) {
        self.set_attached(id, false);
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        self.node_mut(id).rect = rect;
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.node_mut(id).text = text.to_owned();
    }

    pub fn set_traits(&mut self, id: NodeId, traits: ElementTraits) {
        self.node_mut(id).traits = Some(traits);
    }

    /// Simulate a document without a body.
    pub fn set_mount_root(&mut self, present: bool) {
        self.mount_root = present;
    }

    #[must_use]
    pub fn text(&self, id: NodeId) -> &str {
        &self.node(id).text
    }

    /// Events dispatched on `id` by [`Host::write_text`], in order.
    #[must_use]
    pub fn dispatched(&self, id: NodeId) -> &[&'static str] {
        &self.node(id).dispatched
    }

    /// Number of mounted overlay nodes owned by `surface`.
    #[must_use]
    pub fn overlays_for(&self, surface: NodeId) -> usize {
        self.overlays.values().filter(|o| o.surface == surface).count()
    }

    #[must_use]
    pub fn mounted_overlays(&self) -> usize {
        self.overlays.len()
    }

    /// The overlay mounted for `surface`, if any.
    #[must_use]
    pub fn overlay_for(&self, surface: NodeId) -> Option<(OverlayId, &SimOverlay)> {
        self.overlays
            .iter()
            .find(|(_, o)| o.surface == surface)
            .map(|(id, o)| (*id, o))
    }

    #[must_use]
    pub fn overlay(&self, id: OverlayId) -> Option<&SimOverlay> {
        self.overlays.get(&id)
    }

    /// Whether `surface` currently has a shown overlay.
    #[must_use]
    pub fn is_shown(&self, surface: NodeId) -> bool {
        self.overlay_for(surface).is_some_and(|(_, o)| o.shown)
    }

    /// Current modal payload, `None` while hidden.
    #[must_use]
    pub fn modal(&self) -> Option<&ModalRequest> {
        self.modal.as_ref()
    }

    /// Number of `show_modal` calls so far.
    #[must_use]
    pub fn modal_shows(&self) -> u32 {
        self.modal_shows
    }

    fn push(&mut self, traits: Option<ElementTraits>, parent: Option<NodeId>, attached: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let top = 40.0 * f64::from(id.0);
        self.nodes.push(SimNode {
            traits,
            attached,
            rect: Rect::new(8.0, top, 240.0, 32.0),
            text: String::new(),
            parent,
            children: Vec::new(),
            dispatched: Vec::new(),
        });
        id
    }

    fn set_attached(&mut self, id: NodeId, attached: bool) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node_mut(next);
            node.attached = attached;
            stack.extend(node.children.iter().copied());
        }
    }

    fn node(&self, id: NodeId) -> &SimNode {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut SimNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Parent of a node, if it was created as a child.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }
}

impl Host for SimDocument {
    type Node = NodeId;

    fn traits(&self, node: &NodeId) -> Option<ElementTraits> {
        self.node(*node).traits
    }

    fn is_attached(&self, node: &NodeId) -> bool {
        self.node(*node).attached
    }

    fn layout_rect(&self, node: &NodeId) -> Option<Rect> {
        let n = self.node(*node);
        n.attached.then_some(n.rect)
    }

    fn read_text(&self, node: &NodeId) -> String {
        self.node(*node).text.clone()
    }

    fn write_text(&mut self, node: &NodeId, text: &str) -> Result<(), HostError> {
        let n = self.node_mut(*node);
        if !n.attached {
            return Err(HostError::Detached);
        }
        n.text = text.to_owned();
        n.dispatched.push("input");
        if n.traits.is_some_and(|t| t.is_form_control()) {
            n.dispatched.push("change");
        }
        Ok(())
    }

    fn candidate_descendants(&self, root: &NodeId, out: &mut Vec<NodeId>) {
        let mut stack: Vec<NodeId> = self.node(*root).children.clone();
        while let Some(next) = stack.pop() {
            let node = self.node(next);
            if node.traits.is_some() {
                out.push(next);
            }
            stack.extend(node.children.iter().copied());
        }
    }

    fn mount_overlay(&mut self, id: OverlayId, surface: &NodeId) -> Result<(), HostError> {
        if !self.mount_root {
            return Err(HostError::NoMountRoot);
        }
        self.overlays.insert(
            id,
            SimOverlay {
                surface: *surface,
                at: None,
                shown: false,
                placements: 0,
            },
        );
        Ok(())
    }

    fn place_overlay(&mut self, id: OverlayId, at: Point) {
        if let Some(o) = self.overlays.get_mut(&id) {
            o.at = Some(at);
            o.placements += 1;
        }
    }

    fn set_overlay_shown(&mut self, id: OverlayId, shown: bool) {
        if let Some(o) = self.overlays.get_mut(&id) {
            o.shown = shown;
        }
    }

    fn unmount_overlay(&mut self, id: OverlayId) {
        self.overlays.remove(&id);
    }

    fn show_modal(&mut self, request: &ModalRequest) -> Result<(), HostError> {
        if !self.mount_root {
            return Err(HostError::NoMountRoot);
        }
        self.modal = Some(request.clone());
        self.modal_shows += 1;
        Ok(())
    }

    fn hide_modal(&mut self) {
        self.modal = None;
    }
}

/// Guard that trims text, prefixes error messages with `redacted: ` and
/// accepts any credential of at least 20 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughGuard;

impl TextGuard for PassthroughGuard {
    fn outbound(&self, text: &str) -> String {
        text.trim().to_owned()
    }

    fn inbound(&self, text: &str, _option: OptionKind) -> String {
        text.trim().to_owned()
    }

    fn redact_error(&self, error: &ConversionError) -> String {
        format!("redacted: {error}")
    }

    fn credential_format_ok(&self, _provider: ProviderKind, credential: &str) -> bool {
        credential.len() >= 20
    }
}

/// Admission control with a fixed budget and a fixed reported wait.
#[derive(Debug, Clone)]
pub struct LimitedAdmission {
    remaining: u32,
    wait: Duration,
    pub admitted: u32,
}

impl LimitedAdmission {
    #[must_use]
    pub fn new(budget: u32, wait: Duration) -> Self {
        Self {
            remaining: budget,
            wait,
            admitted: 0,
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(u32::MAX, Duration::ZERO)
    }
}

impl AdmissionControl for LimitedAdmission {
    fn can_proceed(&mut self, _now: Duration) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.admitted += 1;
        true
    }

    fn time_until_next_slot(&self, _now: Duration) -> Duration {
        if self.remaining == 0 { self.wait } else { Duration::ZERO }
    }
}

/// Services built from [`PassthroughGuard`] and unlimited admission.
#[must_use]
pub fn passthrough_services() -> Services {
    Services::new(Box::new(LimitedAdmission::unlimited()), Box::new(PassthroughGuard))
}
