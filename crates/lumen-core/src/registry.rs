#![forbid(unsafe_code)]

//! Surface → overlay ownership map.
//!
//! [`OverlayRegistry`] enforces the central invariant of the engine: at most
//! one overlay node exists per editable surface, and a registered surface has
//! exactly one mounted overlay. It is the only place overlay nodes are created
//! or destroyed.
//!
//! Keys are host node identities. The registry holds them only while an
//! overlay is alive; detached surfaces are pruned whenever a reposition, focus
//! or mutation pass touches them (see [`OverlayRegistry::prune_detached`]).

use ahash::AHashMap;

use crate::geometry::Point;
use crate::host::{Host, HostError, OverlayId};
use crate::visibility::Visibility;

/// Engine-side state of one mounted overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayHandle<N> {
    /// Host overlay node.
    pub id: OverlayId,
    /// Back-reference to the owning surface.
    pub surface: N,
    /// Current visibility phase.
    pub visibility: Visibility,
    /// Bumped on every transition; delayed work compares against it.
    pub generation: u64,
    /// Last position applied through [`Host::place_overlay`].
    pub anchor: Option<Point>,
}

/// Registry of live overlays keyed by surface identity.
#[derive(Debug)]
pub struct OverlayRegistry<N> {
    by_surface: AHashMap<N, OverlayHandle<N>>,
    by_overlay: AHashMap<OverlayId, N>,
    next_overlay: u64,
    next_generation: u64,
}

impl<N> Default for OverlayRegistry<N> {
    fn default() -> Self {
        Self {
            by_surface: AHashMap::default(),
            by_overlay: AHashMap::default(),
            next_overlay: 1,
            next_generation: 1,
        }
    }
}

impl<N> OverlayRegistry<N>
where
    N: Clone + Eq + core::hash::Hash + core::fmt::Debug,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle registered for `surface`, creating and mounting one
    /// if none exists. A fresh handle starts [`Visibility::Hidden`].
    pub fn acquire<H>(&mut self, host: &mut H, surface: &N) -> Result<&mut OverlayHandle<N>, HostError>
    where
        H: Host<Node = N>,
    {
        if !self.by_surface.contains_key(surface) {
            let id = OverlayId(self.next_overlay);
            host.mount_overlay(id, surface)?;
            self.next_overlay += 1;
            let generation = self.fresh_generation();
            self.by_overlay.insert(id, surface.clone());
            self.by_surface.insert(
                surface.clone(),
                OverlayHandle {
                    id,
                    surface: surface.clone(),
                    visibility: Visibility::Hidden,
                    generation,
                    anchor: None,
                },
            );
            tracing::debug!(overlay = %id, surface = ?surface, "overlay acquired");
        }
        self.by_surface.get_mut(surface).ok_or(HostError::Detached)
    }

    /// Unmount and forget the overlay for `surface`. Returns whether one existed.
    pub fn release<H>(&mut self, host: &mut H, surface: &N) -> bool
    where
        H: Host<Node = N>,
    {
        let Some(handle) = self.by_surface.remove(surface) else {
            return false;
        };
        self.by_overlay.remove(&handle.id);
        host.unmount_overlay(handle.id);
        tracing::debug!(overlay = %handle.id, surface = ?surface, "overlay released");
        true
    }

    /// Release every overlay whose surface has left the document.
    pub fn prune_detached<H>(&mut self, host: &mut H) -> usize
    where
        H: Host<Node = N>,
    {
        let stale: Vec<N> = self
            .by_surface
            .keys()
            .filter(|s| !host.is_attached(s))
            .cloned()
            .collect();
        for surface in &stale {
            self.release(host, surface);
        }
        stale.len()
    }

    /// Release everything (engine teardown).
    pub fn release_all<H>(&mut self, host: &mut H)
    where
        H: Host<Node = N>,
    {
        for surface in self.surfaces() {
            self.release(host, &surface);
        }
    }

    /// Advance `surface`'s generation, invalidating its pending timers.
    pub fn bump(&mut self, surface: &N) -> Option<u64> {
        let generation = self.fresh_generation();
        let handle = self.by_surface.get_mut(surface)?;
        handle.generation = generation;
        Some(generation)
    }

    #[must_use]
    pub fn get(&self, surface: &N) -> Option<&OverlayHandle<N>> {
        self.by_surface.get(surface)
    }

    pub fn get_mut(&mut self, surface: &N) -> Option<&mut OverlayHandle<N>> {
        self.by_surface.get_mut(surface)
    }

    #[must_use]
    pub fn contains(&self, surface: &N) -> bool {
        self.by_surface.contains_key(surface)
    }

    /// Owning surface of an overlay node.
    #[must_use]
    pub fn surface_of(&self, id: OverlayId) -> Option<&N> {
        self.by_overlay.get(&id)
    }

    /// Snapshot of registered surfaces, for iteration while mutating.
    #[must_use]
    pub fn surfaces(&self) -> Vec<N> {
        self.by_surface.keys().cloned().collect()
    }

    pub fn handles(&self) -> impl Iterator<Item = &OverlayHandle<N>> {
        self.by_surface.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_surface.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_surface.is_empty()
    }

    fn fresh_generation(&mut self) -> u64 {
        let g = self.next_generation;
        self.next_generation += 1;
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ElementTraits, InputType};
    use crate::testing::SimDocument;
    use pretty_assertions::assert_eq;

    #[test]
    fn acquire_is_idempotent_per_surface() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::input(InputType::TextLike));
        let mut reg = OverlayRegistry::new();

        let first = reg.acquire(&mut doc, &a).unwrap().id;
        let second = reg.acquire(&mut doc, &a).unwrap().id;

        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
        assert_eq!(doc.overlays_for(a), 1);
    }

    #[test]
    fn release_is_idempotent_and_unmounts() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        let mut reg = OverlayRegistry::new();
        let id = reg.acquire(&mut doc, &a).unwrap().id;

        assert!(reg.release(&mut doc, &a));
        assert!(!reg.release(&mut doc, &a));
        assert_eq!(reg.surface_of(id), None);
        assert_eq!(doc.overlays_for(a), 0);
    }

    #[test]
    fn reacquire_after_release_gets_fresh_id_and_generation() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        let mut reg = OverlayRegistry::new();
        let (id1, g1) = {
            let h = reg.acquire(&mut doc, &a).unwrap();
            (h.id, h.generation)
        };
        reg.release(&mut doc, &a);
        let h = reg.acquire(&mut doc, &a).unwrap();
        assert_ne!(h.id, id1);
        assert!(h.generation > g1);
    }

    #[test]
    fn prune_releases_only_detached_surfaces() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        let b = doc.add(ElementTraits::textarea());
        let mut reg = OverlayRegistry::new();
        reg.acquire(&mut doc, &a).unwrap();
        reg.acquire(&mut doc, &b).unwrap();

        doc.detach(a);
        assert_eq!(reg.prune_detached(&mut doc), 1);
        assert!(!reg.contains(&a));
        assert!(reg.contains(&b));
        assert_eq!(doc.mounted_overlays(), 1);
    }

    #[test]
    fn failed_mount_registers_nothing() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        doc.set_mount_root(false);
        let mut reg = OverlayRegistry::new();
        assert_eq!(reg.acquire(&mut doc, &a).err(), Some(HostError::NoMountRoot));
        assert!(reg.is_empty());
    }
}
