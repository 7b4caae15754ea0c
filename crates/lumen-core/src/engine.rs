#![forbid(unsafe_code)]

//! The per-document engine context.
//!
//! [`Engine`] owns every piece of process-wide state: the overlay registry,
//! focus tracking and suppression, the modal bridge, the reposition throttle
//! and the deadline queue. One engine exists per document. The host creates
//! it on first activation, forwards document events to it with a monotonic
//! `now`, and calls [`Engine::teardown`] when the page goes away.
//!
//! # Driving timers
//!
//! The engine schedules but never waits. After any call the host reads
//! [`Engine::next_deadline`] and arranges to call [`Engine::advance`] once
//! that instant has passed:
//!
//! ```ignore
//! engine.handle_focus(&node, clock.now());
//! if let Some(at) = engine.next_deadline() {
//!     scheduler.arm(at);
//! }
//! // later, when the scheduler fires:
//! engine.advance(clock.now());
//! ```

use core::time::Duration;

use crate::classify::is_editable_surface;
use crate::collab::{
    ConversionError, ConversionRequest, OptionKind, ProviderConfig, ProviderKind, RequestId,
    Services, ValidationRequest,
};
use crate::config::EngineConfig;
use crate::host::{Host, ModalRequest, OverlayId};
use crate::modal::{InsertOutcome, ModalBridge, ModalTicket};
use crate::panel::Panel;
use crate::position::{Positioner, RepositionThrottle};
use crate::registry::{OverlayHandle, OverlayRegistry};
use crate::timer::{TimerKind, TimerQueue};
use crate::visibility::{Stage, Visibility, VisibilityCoordinator};
use crate::watcher::{MutationBatch, MutationWatcher, ScanReport};

/// Field overlay engine for one document.
pub struct Engine<H: Host> {
    host: H,
    config: EngineConfig,
    services: Services,
    registry: OverlayRegistry<H::Node>,
    positioner: Positioner,
    coordinator: VisibilityCoordinator<H::Node>,
    watcher: MutationWatcher<H::Node>,
    bridge: ModalBridge<H::Node>,
    throttle: RepositionThrottle,
    timers: TimerQueue<H::Node>,
}

impl<H: Host> core::fmt::Debug for Engine<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("overlays", &self.registry.len())
            .field("suppressed", &self.coordinator.is_suppressed())
            .field("modal_open", &self.bridge.is_open())
            .field("pending_timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl<H: Host> Engine<H> {
    /// Create the engine. `config` is used as given; call
    /// [`EngineConfig::validate`] first when it comes from user input.
    pub fn new(host: H, config: EngineConfig, services: Services) -> Self {
        tracing::debug!(?config, "engine initialised");
        Self {
            host,
            positioner: Positioner::new(config.anchor_inset),
            coordinator: VisibilityCoordinator::new(config.delays()),
            throttle: RepositionThrottle::new(config.reposition_interval()),
            config,
            services,
            registry: OverlayRegistry::new(),
            watcher: MutationWatcher::new(),
            bridge: ModalBridge::new(),
            timers: TimerQueue::new(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── document events ──────────────────────────────────────────────

    /// A node gained focus. Returns whether it is an editable surface.
    pub fn handle_focus(&mut self, node: &H::Node, now: Duration) -> bool {
        let editable = self
            .host
            .traits(node)
            .is_some_and(|t| is_editable_surface(&t));
        if !editable || !self.host.is_attached(node) {
            return false;
        }
        self.sweep_detached();
        let (coordinator, mut stage) = self.parts();
        coordinator.on_focus(&mut stage, node, now);
        true
    }

    /// A node lost focus.
    pub fn handle_blur(&mut self, node: &H::Node, now: Duration) {
        let (coordinator, mut stage) = self.parts();
        coordinator.on_blur(&mut stage, node, now);
    }

    /// Scroll or resize happened. Repositioning is coalesced to at most one
    /// flush per configured interval.
    pub fn handle_viewport_change(&mut self, now: Duration) {
        if let Some(at) = self.throttle.request(now) {
            self.timers.schedule(at, TimerKind::RepositionFlush);
        }
    }

    /// Structural changes observed in the document.
    pub fn handle_mutations(&mut self, batch: &MutationBatch<H::Node>) -> ScanReport {
        let report = self
            .watcher
            .scan(&mut self.host, &mut self.registry, batch);
        if !batch.removed.is_empty() {
            self.forget_detached_refs();
        }
        report
    }

    // ── modal ────────────────────────────────────────────────────────

    /// The user clicked overlay `id`. Opens (or re-targets) the modal with
    /// the owning surface's current text. Returns `None` when the overlay is
    /// unknown, its surface has left the document, or the host cannot show
    /// the modal. A modal that could not be shown leaves nothing suppressed.
    pub fn activate_overlay(&mut self, id: OverlayId, now: Duration) -> Option<ModalTicket> {
        let surface = self.registry.surface_of(id).cloned()?;
        if !self.host.is_attached(&surface) {
            self.registry.release(&mut self.host, &surface);
            self.coordinator.forget(&surface);
            return None;
        }
        let source_text = self.host.read_text(&surface);
        let chars = source_text.chars().count();
        let ticket = self.bridge.open(surface, source_text.clone());
        let shown = self.host.show_modal(&ModalRequest {
            ticket,
            source_text,
        });
        if let Err(err) = shown {
            tracing::warn!(overlay = %id, error = %err, "modal could not be shown");
            self.bridge.close(ticket);
            self.host.hide_modal();
            let (coordinator, mut stage) = self.parts();
            coordinator.set_suppressed(&mut stage, false, now);
            return None;
        }
        {
            let (coordinator, mut stage) = self.parts();
            coordinator.set_suppressed(&mut stage, true, now);
        }
        tracing::debug!(overlay = %id, %ticket, chars, "modal opened");
        Some(ticket)
    }

    /// The user closed the modal. Clears suppression and schedules the
    /// focused target's overlay to come back if it is still attached and
    /// still the last-focused surface. Returns `false` for a stale ticket.
    pub fn close_modal(&mut self, ticket: ModalTicket, now: Duration) -> bool {
        let Some(target) = self.bridge.close(ticket) else {
            return false;
        };
        self.host.hide_modal();
        {
            let (coordinator, mut stage) = self.parts();
            coordinator.set_suppressed(&mut stage, false, now);
        }
        if let Some(surface) = target {
            let restorable = self.host.is_attached(&surface)
                && self.coordinator.last_focused() == Some(&surface);
            if restorable {
                self.timers.schedule(
                    now.saturating_add(self.coordinator.delays().restore),
                    TimerKind::Restore {
                        surface,
                        modal_generation: self.bridge.generation(),
                    },
                );
            }
        }
        tracing::debug!(%ticket, "modal closed");
        true
    }

    /// Write the panel's current result into the focused target and close
    /// the modal. No overlay restore is scheduled afterwards.
    pub fn insert_result(&mut self, ticket: ModalTicket, now: Duration) -> InsertOutcome {
        if !self.bridge.is_current(ticket) {
            return InsertOutcome::Stale;
        }
        let Some(text) = self
            .bridge
            .panel(ticket)
            .and_then(Panel::result_text)
            .map(str::to_owned)
        else {
            return InsertOutcome::NoResult;
        };

        let outcome = match self.bridge.target().cloned() {
            Some(target) if self.host.is_attached(&target) => {
                match self.host.write_text(&target, &text) {
                    Ok(()) => InsertOutcome::Inserted,
                    Err(err) => {
                        tracing::warn!(%ticket, error = %err, "result insertion failed");
                        InsertOutcome::TargetGone
                    }
                }
            }
            _ => InsertOutcome::TargetGone,
        };

        self.bridge.close(ticket);
        self.host.hide_modal();
        let (coordinator, mut stage) = self.parts();
        coordinator.set_suppressed(&mut stage, false, now);
        tracing::debug!(%ticket, ?outcome, "modal closed by insertion");
        outcome
    }

    /// Headless panel of the open modal.
    #[must_use]
    pub fn panel(&self, ticket: ModalTicket) -> Option<&Panel> {
        self.bridge.panel(ticket)
    }

    /// The credential store answered for this modal session.
    pub fn configuration_loaded(&mut self, ticket: ModalTicket, config: Option<ProviderConfig>) -> bool {
        self.with_panel(ticket, |panel| panel.configuration_loaded(config))
            .is_some()
    }

    pub fn request_configuration(&mut self, ticket: ModalTicket) -> bool {
        self.with_panel(ticket, Panel::request_configuration).is_some()
    }

    pub fn panel_back(&mut self, ticket: ModalTicket) -> bool {
        self.with_panel(ticket, Panel::back).is_some()
    }

    pub fn edit_result(&mut self, ticket: ModalTicket, edited: &str) -> bool {
        self.with_panel(ticket, |panel| panel.edit_result(edited))
            .is_some()
    }

    /// Gate and start a conversion; the returned request is for the host to
    /// send.
    pub fn begin_conversion(
        &mut self,
        ticket: ModalTicket,
        option: OptionKind,
        now: Duration,
    ) -> Option<ConversionRequest> {
        let Self {
            bridge, services, ..
        } = self;
        bridge
            .panel_mut(ticket)?
            .begin_conversion(option, services, now)
    }

    /// Deliver a conversion response. Responses for a closed or replaced
    /// modal, or for a superseded request, are dropped.
    pub fn finish_conversion(
        &mut self,
        ticket: ModalTicket,
        request: RequestId,
        outcome: Result<String, ConversionError>,
    ) -> bool {
        let Self {
            bridge, services, ..
        } = self;
        let Some(panel) = bridge.panel_mut(ticket) else {
            tracing::debug!(%ticket, request = request.0, "late conversion response dropped");
            return false;
        };
        panel.finish_conversion(request, outcome, services)
    }

    pub fn begin_validation(
        &mut self,
        ticket: ModalTicket,
        provider: ProviderKind,
        credential: &str,
        now: Duration,
    ) -> Option<ValidationRequest> {
        let Self {
            bridge, services, ..
        } = self;
        bridge
            .panel_mut(ticket)?
            .begin_validation(provider, credential, services, now)
    }

    /// Deliver a validation response. On success the validated configuration
    /// is returned for the host to persist.
    pub fn finish_validation(
        &mut self,
        ticket: ModalTicket,
        request: &ValidationRequest,
        outcome: Result<(), ConversionError>,
    ) -> Option<ProviderConfig> {
        let Self {
            bridge, services, ..
        } = self;
        bridge
            .panel_mut(ticket)?
            .finish_validation(request, outcome, services)
    }

    // ── time ─────────────────────────────────────────────────────────

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Fire every timer due at `now`, in deadline order. Returns how many
    /// fired (stale ones included).
    pub fn advance(&mut self, now: Duration) -> usize {
        let mut fired = 0;
        while let Some((at, kind)) = self.timers.pop_due(now) {
            fired += 1;
            self.fire(kind, at);
        }
        fired
    }

    fn fire(&mut self, kind: TimerKind<H::Node>, at: Duration) {
        match kind {
            TimerKind::Appear {
                surface,
                generation,
            } => {
                let (coordinator, mut stage) = self.parts();
                coordinator.on_appear(&mut stage, &surface, generation);
            }
            TimerKind::BlurSettle {
                surface,
                generation,
            } => {
                let (coordinator, mut stage) = self.parts();
                coordinator.on_blur_settle(&mut stage, &surface, generation, at);
            }
            TimerKind::FadeComplete {
                surface,
                generation,
            } => {
                let (coordinator, mut stage) = self.parts();
                coordinator.on_fade_complete(&mut stage, &surface, generation);
            }
            TimerKind::Restore {
                surface,
                modal_generation,
            } => {
                if self.bridge.is_open() || self.bridge.generation() != modal_generation {
                    return;
                }
                let (coordinator, mut stage) = self.parts();
                coordinator.restore(&mut stage, &surface, at);
            }
            TimerKind::RepositionFlush => {
                let Some(coalesced) = self.throttle.fire() else {
                    return;
                };
                let (coordinator, mut stage) = self.parts();
                let released = coordinator.reposition_all(&mut stage);
                tracing::trace!(coalesced, released, "reposition flush");
            }
        }
    }

    // ── inspection ───────────────────────────────────────────────────

    /// Visibility phase of `node`'s overlay.
    #[must_use]
    pub fn visibility(&self, node: &H::Node) -> Visibility {
        self.registry
            .get(node)
            .map_or(Visibility::Hidden, |h| h.visibility)
    }

    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.registry.len()
    }

    /// Live overlay handles, in no particular order.
    pub fn overlays(&self) -> impl Iterator<Item = &OverlayHandle<H::Node>> {
        self.registry.handles()
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.coordinator.is_suppressed()
    }

    /// Surface the open modal reads from and writes into.
    #[must_use]
    pub fn focused_target(&self) -> Option<&H::Node> {
        self.bridge.target()
    }

    /// Surface that currently holds focus.
    #[must_use]
    pub fn focused(&self) -> Option<&H::Node> {
        self.coordinator.focused()
    }

    #[must_use]
    pub fn is_modal_open(&self) -> bool {
        self.bridge.is_open()
    }

    /// Unmount every overlay and the modal and drop all pending work. The
    /// engine stays usable; a later focus starts from a clean slate.
    pub fn teardown(&mut self) {
        self.registry.release_all(&mut self.host);
        self.timers.clear();
        self.throttle.reset();
        if self.bridge.is_open() {
            self.bridge.close(ModalTicket(self.bridge.generation()));
            self.host.hide_modal();
        }
        if let Some(target) = self.bridge.target().cloned() {
            self.bridge.forget_target(&target);
        }
        self.coordinator = VisibilityCoordinator::new(self.config.delays());
        tracing::debug!("engine torn down");
    }

    // ── internals ────────────────────────────────────────────────────

    fn parts(&mut self) -> (&mut VisibilityCoordinator<H::Node>, Stage<'_, H>) {
        (
            &mut self.coordinator,
            Stage {
                host: &mut self.host,
                registry: &mut self.registry,
                timers: &mut self.timers,
                positioner: self.positioner,
            },
        )
    }

    fn with_panel<R>(&mut self, ticket: ModalTicket, f: impl FnOnce(&mut Panel) -> R) -> Option<R> {
        self.bridge.panel_mut(ticket).map(f)
    }

    /// Release overlays of detached surfaces and drop references to them.
    fn sweep_detached(&mut self) {
        if !self.registry.is_empty() {
            self.registry.prune_detached(&mut self.host);
        }
        self.forget_detached_refs();
    }

    fn forget_detached_refs(&mut self) {
        let mut gone = Vec::new();
        for node in [self.coordinator.focused(), self.coordinator.last_focused()]
            .into_iter()
            .flatten()
        {
            if !self.host.is_attached(node) {
                gone.push(node.clone());
            }
        }
        if let Some(target) = self.bridge.target() {
            if !self.host.is_attached(target) {
                gone.push(target.clone());
            }
        }
        for node in &gone {
            self.coordinator.forget(node);
            self.bridge.forget_target(node);
        }
    }
}
