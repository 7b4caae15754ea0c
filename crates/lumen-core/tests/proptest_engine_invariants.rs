//! Property-based invariants of the overlay engine.
//!
//! 1. **Classifier determinism**: two calls on the same traits agree, and an
//!    excluded input type never qualifies whatever else is set.
//! 2. **One overlay per surface**: after any event sequence every surface owns
//!    zero or one mounted overlay, and the registry matches the document.
//! 3. **Suppression holds**: while the modal is open nothing is `Visible`.
//! 4. **No orphans**: once every surface is removed and time passes, no
//!    overlay node remains mounted.

use std::time::Duration;

use lumen_core::classify::{EditableAttr, Role};
use lumen_core::testing::{NodeId, SimDocument, passthrough_services};
use lumen_core::{
    ElementTag, ElementTraits, Engine, EngineConfig, InputType, ModalTicket, MutationBatch,
    Visibility, is_editable_surface,
};
use proptest::prelude::*;

const SURFACES: usize = 4;

fn input_type() -> impl Strategy<Value = InputType> {
    prop::sample::select(vec![
        "text", "search", "email", "", "checkbox", "radio", "file", "submit", "button", "image",
        "hidden", "range", "reset", "color", "number",
    ])
    .prop_map(InputType::parse)
}

fn traits() -> impl Strategy<Value = ElementTraits> {
    let tag = prop_oneof![
        input_type().prop_map(ElementTag::Input),
        Just(ElementTag::TextArea),
        Just(ElementTag::Other),
    ];
    let attr = prop::option::of(
        prop::sample::select(vec!["", "true", "false", "plaintext-only", "inherit"])
            .prop_map(EditableAttr::parse),
    );
    let role = prop::option::of(
        prop::sample::select(vec!["textbox", "searchbox", "button", "textbox combobox"])
            .prop_map(Role::parse),
    );
    (tag, any::<bool>(), any::<bool>(), any::<bool>(), attr, role, any::<bool>()).prop_map(
        |(tag, disabled, read_only, content_editable, editable_attr, role, design_mode)| {
            ElementTraits {
                tag,
                disabled,
                read_only,
                content_editable,
                editable_attr,
                role,
                design_mode,
            }
        },
    )
}

#[derive(Debug, Clone)]
enum Op {
    Focus(usize),
    Blur(usize),
    Wait(u64),
    Scroll,
    Remove(usize),
    Reinsert(usize),
    Activate(usize),
    Close,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..SURFACES).prop_map(Op::Focus),
        3 => (0..SURFACES).prop_map(Op::Blur),
        4 => (1u64..250).prop_map(Op::Wait),
        1 => Just(Op::Scroll),
        1 => (0..SURFACES).prop_map(Op::Remove),
        1 => (0..SURFACES).prop_map(Op::Reinsert),
        1 => (0..SURFACES).prop_map(Op::Activate),
        1 => Just(Op::Close),
    ]
}

struct Harness {
    engine: Engine<SimDocument>,
    nodes: Vec<NodeId>,
    now: Duration,
    ticket: Option<ModalTicket>,
}

impl Harness {
    fn new() -> Self {
        let mut engine = Engine::new(
            SimDocument::new(),
            EngineConfig::default(),
            passthrough_services(),
        );
        let nodes = (0..SURFACES)
            .map(|i| {
                let traits = if i % 2 == 0 {
                    ElementTraits::textarea()
                } else {
                    ElementTraits::input(InputType::TextLike)
                };
                engine.host_mut().add(traits)
            })
            .collect();
        Self {
            engine,
            nodes,
            now: Duration::ZERO,
            ticket: None,
        }
    }

    fn apply(&mut self, op: &Op) {
        self.now += Duration::from_millis(1);
        let now = self.now;
        match *op {
            Op::Focus(i) => {
                self.engine.handle_focus(&self.nodes[i], now);
            }
            Op::Blur(i) => self.engine.handle_blur(&self.nodes[i], now),
            Op::Wait(dt) => {
                self.now += Duration::from_millis(dt);
                self.engine.advance(self.now);
            }
            Op::Scroll => self.engine.handle_viewport_change(now),
            Op::Remove(i) => {
                let node = self.nodes[i];
                self.engine.host_mut().detach(node);
                self.engine.handle_mutations(
                    &MutationBatch {
                        added: vec![],
                        removed: vec![node],
                    },
                );
            }
            Op::Reinsert(i) => {
                let node = self.nodes[i];
                self.engine.host_mut().attach(node);
                self.engine.handle_mutations(
                    &MutationBatch {
                        added: vec![node],
                        removed: vec![],
                    },
                );
            }
            Op::Activate(i) => {
                let overlay = self.engine.host().overlay_for(self.nodes[i]).map(|(id, _)| id);
                if let Some(id) = overlay {
                    if let Some(ticket) = self.engine.activate_overlay(id, now) {
                        self.ticket = Some(ticket);
                    }
                }
            }
            Op::Close => {
                if let Some(ticket) = self.ticket.take() {
                    self.engine.close_modal(ticket, now);
                }
            }
        }
    }

    fn check(&self) -> Result<(), TestCaseError> {
        let host = self.engine.host();
        for node in &self.nodes {
            prop_assert!(host.overlays_for(*node) <= 1, "surface {node:?} has several overlays");
        }
        prop_assert_eq!(host.mounted_overlays(), self.engine.overlay_count());
        if self.engine.is_suppressed() {
            for node in &self.nodes {
                prop_assert_ne!(self.engine.visibility(node), Visibility::Visible);
            }
        }
        Ok(())
    }
}

proptest! {
    #[test]
    fn classifier_is_deterministic(t in traits()) {
        prop_assert_eq!(is_editable_surface(&t), is_editable_surface(&t));
    }

    #[test]
    fn excluded_input_types_never_qualify(t in traits()) {
        if let ElementTag::Input(kind) = t.tag {
            if kind.is_excluded() {
                prop_assert!(!is_editable_surface(&t));
            }
        }
    }

    #[test]
    fn disabled_form_controls_never_qualify(t in traits()) {
        if t.is_form_control() && (t.disabled || t.read_only) {
            prop_assert!(!is_editable_surface(&t));
        }
    }

    #[test]
    fn invariants_hold_over_random_event_sequences(ops in prop::collection::vec(op(), 1..80)) {
        let mut h = Harness::new();
        for op in &ops {
            h.apply(op);
            h.check()?;
        }
    }

    #[test]
    fn removed_surfaces_leave_no_overlay_behind(ops in prop::collection::vec(op(), 1..60)) {
        let mut h = Harness::new();
        for op in &ops {
            h.apply(op);
        }
        for i in 0..SURFACES {
            h.apply(&Op::Remove(i));
        }
        h.apply(&Op::Close);
        h.apply(&Op::Wait(5_000));
        prop_assert_eq!(h.engine.host().mounted_overlays(), 0);
        prop_assert_eq!(h.engine.overlay_count(), 0);
    }
}
