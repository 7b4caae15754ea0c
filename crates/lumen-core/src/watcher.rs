#![forbid(unsafe_code)]

//! Structural-change scanning.
//!
//! The host forwards each `MutationObserver` batch as a [`MutationBatch`].
//! Inserted subtrees are classified so newly added fields are known to be
//! eligible, but no overlay is created here: creation waits for focus. Cost
//! is proportional to the inserted subtrees, never to the whole document.
//!
//! Removals are where registry growth is bounded. Any batch with removed
//! nodes prunes registry entries whose surface is no longer attached; the
//! registry only holds surfaces with live overlays, so this pass is small.

use crate::classify::is_editable_surface;
use crate::host::Host;
use crate::registry::OverlayRegistry;

/// One observer callback's worth of structural changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationBatch<N> {
    /// Roots of inserted subtrees.
    pub added: Vec<N>,
    /// Roots of removed subtrees.
    pub removed: Vec<N>,
}

impl<N> Default for MutationBatch<N> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<N> MutationBatch<N> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Summary of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanReport {
    /// Elements classified.
    pub scanned: usize,
    /// Of those, how many are editable surfaces.
    pub eligible: usize,
    /// Overlays released because their surface left the document.
    pub released: usize,
}

/// Scans mutation batches. Holds only a scratch buffer that is emptied
/// before every scan returns.
#[derive(Debug)]
pub struct MutationWatcher<N> {
    scratch: Vec<N>,
}

impl<N> Default for MutationWatcher<N> {
    fn default() -> Self {
        Self {
            scratch: Vec::new(),
        }
    }
}

impl<N> MutationWatcher<N>
where
    N: Clone + Eq + core::hash::Hash + core::fmt::Debug,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one batch.
    pub fn scan<H>(
        &mut self,
        host: &mut H,
        registry: &mut OverlayRegistry<N>,
        batch: &MutationBatch<N>,
    ) -> ScanReport
    where
        H: Host<Node = N>,
    {
        let _span = tracing::debug_span!(
            "mutation_scan",
            added = batch.added.len(),
            removed = batch.removed.len()
        )
        .entered();
        let mut report = ScanReport::default();

        for root in &batch.added {
            self.scratch.clear();
            self.scratch.push(root.clone());
            host.candidate_descendants(root, &mut self.scratch);
            for node in &self.scratch {
                let Some(traits) = host.traits(node) else {
                    continue;
                };
                report.scanned += 1;
                if is_editable_surface(&traits) {
                    report.eligible += 1;
                }
            }
        }
        self.scratch.clear();

        if !batch.removed.is_empty() && !registry.is_empty() {
            report.released = registry.prune_detached(host);
        }

        if report.eligible > 0 || report.released > 0 {
            tracing::debug!(
                scanned = report.scanned,
                eligible = report.eligible,
                released = report.released,
                "mutation batch scanned"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ElementTraits, InputType};
    use crate::testing::SimDocument;
    use pretty_assertions::assert_eq;

    #[test]
    fn inserted_subtree_is_classified_without_creating_overlays() {
        let mut doc = SimDocument::new();
        let form = doc.create_detached(ElementTraits::plain());
        doc.add_child(form, ElementTraits::input(InputType::TextLike));
        doc.add_child(form, ElementTraits::input(InputType::Checkbox));
        let wrapper = doc.add_child(form, ElementTraits::plain());
        doc.add_child(wrapper, ElementTraits::textarea());
        doc.attach(form);

        let mut reg = OverlayRegistry::new();
        let mut watcher = MutationWatcher::new();
        let report = watcher.scan(
            &mut doc,
            &mut reg,
            &MutationBatch {
                added: vec![form],
                removed: vec![],
            },
        );

        assert_eq!(
            report,
            ScanReport {
                scanned: 5,
                eligible: 2,
                released: 0
            }
        );
        assert!(reg.is_empty());
        assert_eq!(doc.mounted_overlays(), 0);
        assert!(watcher.scratch.is_empty());
    }

    #[test]
    fn text_nodes_are_skipped() {
        let mut doc = SimDocument::new();
        let text = doc.add_text_node();
        let mut reg = OverlayRegistry::new();
        let report = MutationWatcher::new().scan(
            &mut doc,
            &mut reg,
            &MutationBatch {
                added: vec![text],
                removed: vec![],
            },
        );
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn removals_prune_detached_overlays() {
        let mut doc = SimDocument::new();
        let a = doc.add(ElementTraits::textarea());
        let b = doc.add(ElementTraits::textarea());
        let mut reg = OverlayRegistry::new();
        reg.acquire(&mut doc, &a).unwrap();
        reg.acquire(&mut doc, &b).unwrap();

        doc.detach(a);
        let report = MutationWatcher::new().scan(
            &mut doc,
            &mut reg,
            &MutationBatch {
                added: vec![],
                removed: vec![a],
            },
        );
        assert_eq!(report.released, 1);
        assert!(!reg.contains(&a));
        assert_eq!(doc.overlays_for(a), 0);
        assert_eq!(doc.overlays_for(b), 1);
    }
}
