//! End-to-end engine scenarios against the simulated document.
//!
//! Every test drives time explicitly: events carry a `now`, and pending work
//! only runs when `advance` is called past its deadline.

use std::time::Duration;

use lumen_core::testing::{NodeId, SimDocument, passthrough_services};
use lumen_core::{
    ElementTraits, Engine, EngineConfig, InputType, InsertOutcome, MutationBatch, OptionKind,
    PanelStage, Point, ProviderConfig, ProviderKind, Rect, Visibility,
};
use pretty_assertions::assert_eq;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn engine() -> Engine<SimDocument> {
    Engine::new(
        SimDocument::new(),
        EngineConfig::default(),
        passthrough_services(),
    )
}

fn configured() -> ProviderConfig {
    ProviderConfig {
        is_configured: true,
        provider: ProviderKind::OpenAi,
        credential: "sk-test-credential-0000".into(),
    }
}

/// Focus `node` at `at` and let the appearance delay elapse.
fn show(e: &mut Engine<SimDocument>, node: NodeId, at: u64) {
    assert!(e.handle_focus(&node, ms(at)));
    e.advance(ms(at + 100));
    assert_eq!(e.visibility(&node), Visibility::Visible);
}

fn overlay_of(e: &Engine<SimDocument>, node: NodeId) -> lumen_core::OverlayId {
    e.host().overlay_for(node).expect("overlay mounted").0
}

#[test]
fn text_input_overlay_appears_after_delay() {
    let mut e = engine();
    let field = e.host_mut().add(ElementTraits::input(InputType::parse("text")));

    e.handle_focus(&field, ms(0));
    assert_eq!(e.visibility(&field), Visibility::Appearing);
    assert!(!e.host().is_shown(field));
    assert_eq!(e.next_deadline(), Some(ms(100)));

    e.advance(ms(99));
    assert_eq!(e.visibility(&field), Visibility::Appearing);

    e.advance(ms(100));
    assert_eq!(e.visibility(&field), Visibility::Visible);
    assert!(e.host().is_shown(field));

    // Default rect is (8, 0, 240, 32); the icon sits 32px inside the corner.
    let (_, overlay) = e.host().overlay_for(field).unwrap();
    assert_eq!(overlay.at, Some(Point::new(216.0, 0.0)));
}

#[test]
fn blur_before_appear_delay_never_shows() {
    let mut e = engine();
    let field = e.host_mut().add(ElementTraits::input(InputType::TextLike));

    e.handle_focus(&field, ms(0));
    e.handle_blur(&field, ms(40));
    e.advance(ms(100));

    assert_eq!(e.visibility(&field), Visibility::Hidden);
    assert_eq!(e.overlay_count(), 0);
    assert_eq!(e.host().mounted_overlays(), 0);
}

#[test]
fn blur_fades_then_releases() {
    let mut e = engine();
    let field = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, field, 0);

    e.handle_blur(&field, ms(150));
    e.advance(ms(249));
    assert_eq!(e.visibility(&field), Visibility::Visible);
    e.advance(ms(250));
    assert_eq!(e.visibility(&field), Visibility::FadingOut);
    assert!(!e.host().is_shown(field));
    e.advance(ms(450));
    assert_eq!(e.visibility(&field), Visibility::Hidden);
    assert_eq!(e.host().mounted_overlays(), 0);
}

#[test]
fn refocus_during_debounce_keeps_overlay() {
    let mut e = engine();
    let field = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, field, 0);

    e.handle_blur(&field, ms(150));
    e.handle_focus(&field, ms(180));
    e.advance(ms(1_000));
    assert_eq!(e.visibility(&field), Visibility::Visible);
}

#[test]
fn refocus_during_fade_returns_to_visible_without_reappearing() {
    let mut e = engine();
    let field = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, field, 0);
    let id = overlay_of(&e, field);

    e.handle_blur(&field, ms(150));
    e.advance(ms(250));
    assert_eq!(e.visibility(&field), Visibility::FadingOut);

    e.handle_focus(&field, ms(300));
    assert_eq!(e.visibility(&field), Visibility::Visible);
    assert!(e.host().is_shown(field));
    assert_eq!(overlay_of(&e, field), id);

    e.advance(ms(1_000));
    assert_eq!(e.visibility(&field), Visibility::Visible);
}

#[test]
fn modal_suppresses_and_close_restores_focused_target() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    e.host_mut().set_text(a, "hello there");
    show(&mut e, a, 0);

    // Clicking the icon blurs the field first.
    e.handle_blur(&a, ms(140));
    let ticket = e.activate_overlay(overlay_of(&e, a), ms(150)).unwrap();

    assert!(e.is_suppressed());
    assert_ne!(e.visibility(&a), Visibility::Visible);
    assert_eq!(e.focused_target(), Some(&a));
    assert_eq!(e.host().modal().map(|m| m.source_text.as_str()), Some("hello there"));
    assert_eq!(e.panel(ticket).map(|p| p.stage().clone()), Some(PanelStage::Loading));

    assert!(e.close_modal(ticket, ms(200)));
    assert!(!e.is_suppressed());
    assert!(e.host().modal().is_none());

    e.advance(ms(299));
    assert_ne!(e.visibility(&a), Visibility::Visible);
    e.advance(ms(300));
    assert_eq!(e.visibility(&a), Visibility::Visible);
    assert!(e.host().is_shown(a));

    // The field lost focus before the modal opened, so the restored icon
    // fades once the blur debounce runs out.
    e.advance(ms(399));
    assert_eq!(e.visibility(&a), Visibility::Visible);
    e.advance(ms(400));
    assert_eq!(e.visibility(&a), Visibility::FadingOut);
    e.advance(ms(2_000));
    assert_eq!(e.visibility(&a), Visibility::Hidden);
    assert_eq!(e.host().overlays_for(a), 0);
}

#[test]
fn restored_overlay_stays_while_target_is_refocused() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, a, 0);

    e.handle_blur(&a, ms(140));
    let ticket = e.activate_overlay(overlay_of(&e, a), ms(150)).unwrap();
    assert!(e.close_modal(ticket, ms(200)));
    e.handle_focus(&a, ms(210));
    e.advance(ms(300));
    assert_eq!(e.visibility(&a), Visibility::Visible);

    // The stale fade from suppression must not take it down later.
    e.advance(ms(2_000));
    assert_eq!(e.visibility(&a), Visibility::Visible);
    assert_eq!(e.host().overlays_for(a), 1);
}

#[test]
fn target_blurred_during_modal_fades_after_close() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    let b = e.host_mut().add(ElementTraits::input(InputType::TextLike));
    show(&mut e, a, 0);

    let ticket = e.activate_overlay(overlay_of(&e, a), ms(150)).unwrap();
    // A button inside the modal takes focus away from the field.
    e.handle_blur(&a, ms(160));
    assert!(e.close_modal(ticket, ms(200)));
    e.advance(ms(300));
    e.handle_focus(&b, ms(400));
    e.advance(ms(10_000));

    assert_eq!(e.focused(), Some(&b));
    assert_eq!(e.visibility(&a), Visibility::Hidden);
    assert_eq!(e.visibility(&b), Visibility::Visible);
    assert!(!e.host().is_shown(a));
    assert!(e.host().is_shown(b));
    assert_eq!(e.host().mounted_overlays(), 1);
}

#[test]
fn focus_while_suppressed_starts_no_cycle() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    let b = e.host_mut().add(ElementTraits::input(InputType::TextLike));
    show(&mut e, a, 0);
    let _ticket = e.activate_overlay(overlay_of(&e, a), ms(150)).unwrap();

    e.handle_focus(&b, ms(160));
    e.advance(ms(1_000));
    assert_eq!(e.visibility(&b), Visibility::Hidden);
    assert_eq!(e.visibility(&a), Visibility::Hidden);
    assert_eq!(e.host().mounted_overlays(), 0);
}

#[test]
fn only_last_focused_surface_is_restored() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    let b = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, a, 0);

    e.handle_blur(&a, ms(200));
    e.handle_focus(&b, ms(200));
    e.advance(ms(300));
    assert_eq!(e.visibility(&b), Visibility::Visible);
    assert_eq!(e.visibility(&a), Visibility::FadingOut);

    let ticket = e.activate_overlay(overlay_of(&e, b), ms(350)).unwrap();
    assert!(e.close_modal(ticket, ms(400)));
    e.advance(ms(2_000));

    assert_eq!(e.visibility(&a), Visibility::Hidden);
    assert_eq!(e.visibility(&b), Visibility::Visible);
}

#[test]
fn close_does_not_restore_a_detached_target() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, a, 0);
    let ticket = e.activate_overlay(overlay_of(&e, a), ms(150)).unwrap();

    e.host_mut().detach(a);
    assert!(e.close_modal(ticket, ms(200)));
    e.advance(ms(2_000));
    assert_eq!(e.overlay_count(), 0);
    assert_eq!(e.host().mounted_overlays(), 0);
}

#[test]
fn late_response_after_close_writes_nothing() {
    let mut e = engine();
    let b = e.host_mut().add(ElementTraits::textarea());
    e.host_mut().set_text(b, "draft");
    show(&mut e, b, 0);

    let ticket = e.activate_overlay(overlay_of(&e, b), ms(150)).unwrap();
    assert!(e.configuration_loaded(ticket, Some(configured())));
    let request = e
        .begin_conversion(ticket, OptionKind::TextToEnglish, ms(160))
        .unwrap();
    assert_eq!(request.text, "draft");

    assert!(e.close_modal(ticket, ms(170)));
    assert!(!e.finish_conversion(ticket, request.id, Ok("converted".into())));
    assert_eq!(e.insert_result(ticket, ms(180)), InsertOutcome::Stale);
    assert_eq!(e.host().text(b), "draft");
    assert!(e.host().dispatched(b).is_empty());
}

#[test]
fn reopening_replaces_payload_and_retires_old_ticket() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    let b = e.host_mut().add(ElementTraits::textarea());
    e.host_mut().set_text(a, "first");
    e.host_mut().set_text(b, "second");
    show(&mut e, a, 0);
    show(&mut e, b, 200);

    let first = e.activate_overlay(overlay_of(&e, a), ms(400)).unwrap();
    let second = e.activate_overlay(overlay_of(&e, b), ms(410)).unwrap();

    assert_eq!(e.host().modal_shows(), 2);
    assert_eq!(e.host().modal().map(|m| m.ticket), Some(second));
    assert_eq!(e.focused_target(), Some(&b));
    assert!(!e.close_modal(first, ms(420)));
    assert!(e.is_modal_open());
    assert!(e.close_modal(second, ms(430)));
}

#[test]
fn insert_writes_result_and_does_not_restore() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::input(InputType::TextLike));
    e.host_mut().set_text(a, "make this formal");
    show(&mut e, a, 0);

    let ticket = e.activate_overlay(overlay_of(&e, a), ms(150)).unwrap();
    assert_eq!(e.insert_result(ticket, ms(155)), InsertOutcome::NoResult);

    e.configuration_loaded(ticket, Some(configured()));
    let request = e
        .begin_conversion(ticket, OptionKind::TextToEnglish, ms(160))
        .unwrap();
    assert!(e.finish_conversion(ticket, request.id, Ok(" Please formalise. ".into())));
    assert!(e.edit_result(ticket, "Please formalise this."));

    assert_eq!(e.insert_result(ticket, ms(200)), InsertOutcome::Inserted);
    assert_eq!(e.host().text(a), "Please formalise this.");
    assert_eq!(e.host().dispatched(a), &["input", "change"]);
    assert!(!e.is_modal_open());
    assert!(!e.is_suppressed());

    e.advance(ms(2_000));
    assert_eq!(e.visibility(&a), Visibility::Hidden);
}

#[test]
fn insert_into_removed_target_closes_without_writing() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    e.host_mut().set_text(a, "source");
    show(&mut e, a, 0);
    let ticket = e.activate_overlay(overlay_of(&e, a), ms(150)).unwrap();
    e.configuration_loaded(ticket, Some(configured()));
    let request = e
        .begin_conversion(ticket, OptionKind::TextToEnglish, ms(160))
        .unwrap();
    e.finish_conversion(ticket, request.id, Ok("result".into()));

    e.host_mut().detach(a);
    assert_eq!(e.insert_result(ticket, ms(200)), InsertOutcome::TargetGone);
    assert!(!e.is_modal_open());
    assert_eq!(e.host().text(a), "source");
}

#[test]
fn checkbox_never_gets_an_overlay() {
    let mut e = engine();
    let traits = ElementTraits {
        content_editable: true,
        role: Some(lumen_core::classify::Role::Textbox),
        design_mode: true,
        ..ElementTraits::input(InputType::parse("checkbox"))
    };
    let boxed = e.host_mut().add(traits);

    assert!(!e.handle_focus(&boxed, ms(0)));
    e.advance(ms(1_000));
    assert_eq!(e.visibility(&boxed), Visibility::Hidden);
    assert_eq!(e.host().mounted_overlays(), 0);
}

#[test]
fn replaced_textarea_releases_old_overlay_and_new_one_appears() {
    let mut e = engine();
    let old = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, old, 0);

    e.host_mut().detach(old);
    let new = e.host_mut().create_detached(ElementTraits::textarea());
    e.host_mut().set_rect(new, Rect::new(20.0, 500.0, 300.0, 60.0));
    e.host_mut().attach(new);
    let report = e.handle_mutations(
        &MutationBatch {
            added: vec![new],
            removed: vec![old],
        },
    );
    assert_eq!(report.eligible, 1);
    assert_eq!(report.released, 1);
    assert_eq!(e.host().overlays_for(old), 0);
    assert_eq!(e.overlay_count(), 0);

    show(&mut e, new, 200);
    let (_, overlay) = e.host().overlay_for(new).unwrap();
    assert_eq!(overlay.at, Some(Point::new(288.0, 528.0)));
}

#[test]
fn detached_surface_is_released_by_next_reposition() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, a, 0);

    e.host_mut().detach(a);
    e.handle_viewport_change(ms(150));
    e.advance(ms(160));
    assert_eq!(e.overlay_count(), 0);
    assert_eq!(e.host().mounted_overlays(), 0);
}

#[test]
fn surface_that_stops_being_editable_is_released_on_reposition() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, a, 0);

    e.host_mut().set_traits(
        a,
        ElementTraits {
            disabled: true,
            ..ElementTraits::textarea()
        },
    );
    e.handle_viewport_change(ms(150));
    e.advance(ms(160));
    assert_eq!(e.visibility(&a), Visibility::Hidden);
}

#[test]
fn missing_mount_root_leaves_engine_usable() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    e.host_mut().set_mount_root(false);

    assert!(e.handle_focus(&a, ms(0)));
    assert_eq!(e.overlay_count(), 0);

    e.host_mut().set_mount_root(true);
    e.handle_blur(&a, ms(10));
    show(&mut e, a, 20);
}

#[test]
fn modal_that_cannot_mount_leaves_nothing_suppressed() {
    let mut e = engine();
    let a = e.host_mut().add(ElementTraits::textarea());
    show(&mut e, a, 0);

    e.host_mut().set_mount_root(false);
    assert_eq!(e.activate_overlay(overlay_of(&e, a), ms(150)), None);
    assert!(!e.is_suppressed());
    assert!(!e.is_modal_open());
    assert!(e.host().modal().is_none());

    e.advance(ms(2_000));
    assert_eq!(e.visibility(&a), Visibility::Visible);

    e.host_mut().set_mount_root(true);
    let ticket = e.activate_overlay(overlay_of(&e, a), ms(2_100)).unwrap();
    assert!(e.is_suppressed());
    assert!(e.close_modal(ticket, ms(2_200)));
}
