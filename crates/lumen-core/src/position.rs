#![forbid(unsafe_code)]

//! Overlay anchoring and scroll/resize coalescing.
//!
//! [`Positioner`] places an overlay a fixed inset up and left of its surface's
//! bottom-right corner, so the icon sits inside the field without covering
//! the start of the typed text. Positions are viewport coordinates for a
//! `position: fixed` overlay, which is why every scroll or resize has to move
//! it again.
//!
//! [`RepositionThrottle`] bounds that work: the first scroll/resize event
//! arms a flush one interval later, and every event until then rides along.
//! The flush reads the layout as it is at flush time, so intermediate
//! positions may be skipped but the settled one never is.

use core::time::Duration;

use crate::geometry::{Point, Rect};
use crate::host::Host;
use crate::registry::OverlayHandle;

/// Default inset from the surface's bottom-right corner, in CSS pixels.
pub const DEFAULT_ANCHOR_INSET: f64 = 32.0;

/// Outcome of one [`Positioner::reposition`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// The overlay was moved to a new anchor.
    Moved(Point),
    /// The layout did not change; no host call was made.
    Unchanged(Point),
    /// The surface is gone; the caller should release the handle.
    Detached,
}

/// Computes and applies overlay anchors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Positioner {
    inset: f64,
}

impl Default for Positioner {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHOR_INSET)
    }
}

impl Positioner {
    #[must_use]
    pub const fn new(inset: f64) -> Self {
        Self { inset }
    }

    /// Anchor for a surface laid out at `rect`.
    #[must_use]
    pub fn anchor_for(&self, rect: Rect) -> Point {
        Point::new(rect.right() - self.inset, rect.bottom() - self.inset)
    }

    /// Re-read the surface's layout box and move the overlay if needed.
    pub fn reposition<H>(&self, host: &mut H, handle: &mut OverlayHandle<H::Node>) -> Placement
    where
        H: Host,
    {
        if !host.is_attached(&handle.surface) {
            return Placement::Detached;
        }
        let Some(rect) = host.layout_rect(&handle.surface) else {
            return Placement::Detached;
        };
        let anchor = self.anchor_for(rect);
        if handle.anchor == Some(anchor) {
            return Placement::Unchanged(anchor);
        }
        host.place_overlay(handle.id, anchor);
        handle.anchor = Some(anchor);
        tracing::trace!(overlay = %handle.id, x = anchor.x, y = anchor.y, "overlay placed");
        Placement::Moved(anchor)
    }
}

/// Trailing-edge throttle for scroll/resize repositioning.
#[derive(Debug, Clone)]
pub struct RepositionThrottle {
    interval: Duration,
    armed_at: Option<Duration>,
    coalesced: u32,
}

impl RepositionThrottle {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            armed_at: None,
            coalesced: 0,
        }
    }

    /// Record a layout-affecting event. Returns the flush deadline to schedule
    /// when this event armed the throttle, `None` when one is already pending.
    pub fn request(&mut self, now: Duration) -> Option<Duration> {
        if self.armed_at.is_some() {
            self.coalesced = self.coalesced.saturating_add(1);
            return None;
        }
        self.armed_at = Some(now);
        self.coalesced = 0;
        Some(now.saturating_add(self.interval))
    }

    /// Disarm on flush. Returns how many events were folded into this flush
    /// beyond the first, or `None` if nothing was pending.
    pub fn fire(&mut self) -> Option<u32> {
        self.armed_at.take().map(|_| core::mem::take(&mut self.coalesced))
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn reset(&mut self) {
        self.armed_at = None;
        self.coalesced = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ElementTraits;
    use crate::registry::OverlayRegistry;
    use crate::testing::SimDocument;
    use pretty_assertions::assert_eq;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn anchor_sits_inside_bottom_right_corner() {
        let p = Positioner::default();
        let at = p.anchor_for(Rect::new(100.0, 50.0, 300.0, 80.0));
        assert_eq!(at, Point::new(368.0, 98.0));
    }

    #[test]
    fn reposition_is_idempotent_without_layout_change() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        doc.set_rect(a, Rect::new(0.0, 0.0, 100.0, 100.0));
        let mut reg = OverlayRegistry::new();
        let p = Positioner::default();

        let handle = reg.acquire(&mut doc, &a).unwrap();
        let first = p.reposition(&mut doc, handle);
        let second = p.reposition(&mut doc, handle);
        let id = handle.id;

        assert_eq!(first, Placement::Moved(Point::new(68.0, 68.0)));
        assert_eq!(second, Placement::Unchanged(Point::new(68.0, 68.0)));
        assert_eq!(doc.overlay(id).unwrap().placements, 1);
    }

    #[test]
    fn reposition_follows_layout_changes() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        doc.set_rect(a, Rect::new(0.0, 0.0, 100.0, 100.0));
        let mut reg = OverlayRegistry::new();
        let p = Positioner::default();
        let handle = reg.acquire(&mut doc, &a).unwrap();
        p.reposition(&mut doc, handle);

        doc.set_rect(a, Rect::new(0.0, -40.0, 100.0, 100.0));
        assert_eq!(p.reposition(&mut doc, handle), Placement::Moved(Point::new(68.0, 28.0)));
    }

    #[test]
    fn reposition_reports_detached_surface() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        let mut reg = OverlayRegistry::new();
        let p = Positioner::default();
        let handle = reg.acquire(&mut doc, &a).unwrap();
        doc.detach(a);
        assert_eq!(p.reposition(&mut doc, handle), Placement::Detached);
    }

    #[test]
    fn throttle_arms_once_per_window() {
        let mut t = RepositionThrottle::new(ms(10));
        assert_eq!(t.request(ms(0)), Some(ms(10)));
        assert_eq!(t.request(ms(3)), None);
        assert_eq!(t.request(ms(9)), None);
        assert_eq!(t.fire(), Some(2));
        assert_eq!(t.fire(), None);
        assert_eq!(t.request(ms(11)), Some(ms(21)));
    }
}
