#![forbid(unsafe_code)]

//! The single modal surface and the focused-target reference.
//!
//! [`ModalBridge`] is the only writer of the focused target: the surface the
//! modal reads its source text from and writes its result into. Every
//! open and close bumps a generation; the [`ModalTicket`] handed to the host
//! on open carries that generation, and any later call presenting an older
//! ticket (a close for a replaced modal, a response that arrived after the
//! user closed it) is ignored.

use core::fmt;

use crate::panel::Panel;

/// Proof that a modal call refers to the currently open modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModalTicket(pub u64);

impl fmt::Display for ModalTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "modal#{}", self.0)
    }
}

/// Result of asking the bridge to insert the panel's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The text was written and the modal closed.
    Inserted,
    /// The ticket is stale; nothing happened.
    Stale,
    /// There is no result to insert yet.
    NoResult,
    /// The focused target left the document; the modal closed without writing.
    TargetGone,
}

/// Modal open/close bookkeeping.
#[derive(Debug)]
pub struct ModalBridge<N> {
    open: bool,
    generation: u64,
    target: Option<N>,
    panel: Option<Panel>,
}

impl<N> Default for ModalBridge<N> {
    fn default() -> Self {
        Self {
            open: false,
            generation: 0,
            target: None,
            panel: None,
        }
    }
}

impl<N: Clone + PartialEq> ModalBridge<N> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or re-open, replacing the payload) for `target`.
    pub fn open(&mut self, target: N, source_text: String) -> ModalTicket {
        self.generation += 1;
        self.open = true;
        self.target = Some(target);
        self.panel = Some(Panel::new(source_text));
        ModalTicket(self.generation)
    }

    /// Close the modal if `ticket` is current. Returns the focused target.
    pub fn close(&mut self, ticket: ModalTicket) -> Option<Option<N>> {
        if !self.is_current(ticket) {
            return None;
        }
        self.generation += 1;
        self.open = false;
        self.panel = None;
        Some(self.target.clone())
    }

    #[must_use]
    pub fn is_current(&self, ticket: ModalTicket) -> bool {
        self.open && ticket.0 == self.generation
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Surface the modal reads from and writes into.
    #[must_use]
    pub fn target(&self) -> Option<&N> {
        self.target.as_ref()
    }

    /// Drop the target if it is `surface` (it left the document).
    pub fn forget_target(&mut self, surface: &N) {
        if self.target.as_ref() == Some(surface) {
            self.target = None;
        }
    }

    #[must_use]
    pub fn panel(&self, ticket: ModalTicket) -> Option<&Panel> {
        if self.is_current(ticket) { self.panel.as_ref() } else { None }
    }

    pub fn panel_mut(&mut self, ticket: ModalTicket) -> Option<&mut Panel> {
        if self.is_current(ticket) { self.panel.as_mut() } else { None }
    }
}
