#![forbid(unsafe_code)]

//! The running content script: one engine over the page, its listeners and
//! its wake-up timer.
//!
//! All state sits in one `Rc<RefCell<App>>`. Callbacks hold a `Weak` and
//! borrow through [`with_app`]; an event that arrives while the app is
//! already borrowed (a synchronous re-entry from a DOM call) is dropped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use lumen_core::{
    ConversionError, Engine, EngineConfig, InsertOutcome, ModalTicket, OptionKind, OverlayId,
};
use lumen_services::default_services;
use lumen_services::providers::{
    conversion_request, parse_conversion, parse_validation, validation_request,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Element, Event, HtmlTextAreaElement, KeyboardEvent};

use crate::clock::{Clock, WakeTimer};
use crate::dom_host::DomHost;
use crate::listeners::{Listener, Observer, Phase, event_element, mutation_batch};
use crate::panel_model::{PanelAction, describe};
use crate::styles::{ACTION_ATTR, MODAL_ATTR, OVERLAY_ATTR};
use crate::{fetch, panel_view, storage};

pub struct App {
    engine: Engine<DomHost>,
    clock: Clock,
    timer: WakeTimer,
    listeners: Vec<Listener>,
    observer: Option<Observer>,
}

type Shared = Rc<RefCell<App>>;

fn with_app<R>(weak: &Weak<RefCell<App>>, f: impl FnOnce(&mut App) -> R) -> Option<R> {
    let app = weak.upgrade()?;
    let Ok(mut app) = app.try_borrow_mut() else {
        tracing::trace!("re-entrant event dropped");
        return None;
    };
    let out = f(&mut app);
    app.settle();
    Some(out)
}

impl App {
    /// Build the engine over `document` and wire every listener.
    pub fn boot(config: EngineConfig) -> Result<Shared, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let host = DomHost::new(document.clone());
        host.install_styles()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;

        let shared: Shared = Rc::new_cyclic(|weak: &Weak<RefCell<App>>| {
            let tick = weak.clone();
            let wake = Closure::<dyn FnMut()>::new(move || {
                with_app(&tick, |app| {
                    let now = app.clock.now();
                    app.engine.advance(now);
                });
            });
            RefCell::new(App {
                engine: Engine::new(host, config, default_services()),
                clock: Clock::start(),
                timer: WakeTimer::new(wake),
                listeners: Vec::new(),
                observer: None,
            })
        });

        let weak = Rc::downgrade(&shared);
        let doc_target: &web_sys::EventTarget = document.as_ref();
        let win_target: &web_sys::EventTarget = window.as_ref();
        let mut listeners = Vec::with_capacity(10);

        let w = weak.clone();
        listeners.push(Listener::attach(doc_target, "focusin", Phase::CAPTURE_PASSIVE, move |ev| {
            on_focus_change(&w, &ev, true);
        })?);
        let w = weak.clone();
        listeners.push(Listener::attach(doc_target, "focusout", Phase::CAPTURE_PASSIVE, move |ev| {
            on_focus_change(&w, &ev, false);
        })?);
        let w = weak.clone();
        listeners.push(Listener::attach(doc_target, "scroll", Phase::CAPTURE_PASSIVE, move |_| {
            with_app(&w, |app| {
                let now = app.clock.now();
                app.engine.handle_viewport_change(now);
            });
        })?);
        let w = weak.clone();
        listeners.push(Listener::attach(win_target, "resize", Phase::BUBBLE_PASSIVE, move |_| {
            with_app(&w, |app| {
                let now = app.clock.now();
                app.engine.handle_viewport_change(now);
            });
        })?);
        listeners.push(Listener::attach(doc_target, "mousedown", Phase::CAPTURE, |ev| {
            if event_element(&ev).is_some_and(|el| closest(&el, OVERLAY_ATTR).is_some()) {
                ev.prevent_default();
                ev.stop_propagation();
            }
        })?);
        let w = weak.clone();
        listeners.push(Listener::attach(doc_target, "click", Phase::CAPTURE, move |ev| {
            on_click(&w, &ev);
        })?);
        let w = weak.clone();
        listeners.push(Listener::attach(doc_target, "input", Phase::CAPTURE_PASSIVE, move |ev| {
            on_input(&w, &ev);
        })?);
        let w = weak.clone();
        listeners.push(Listener::attach(doc_target, "keydown", Phase::CAPTURE, move |ev| {
            on_keydown(&w, &ev);
        })?);
        let w = weak.clone();
        listeners.push(Listener::attach(win_target, "pagehide", Phase::BUBBLE_PASSIVE, move |_| {
            if let Some(app) = w.upgrade() {
                App::shutdown(&app);
            }
        })?);

        let w = weak.clone();
        let root: web_sys::Node = match document.document_element() {
            Some(el) => el.into(),
            None => document.clone().into(),
        };
        let observer = Observer::observe(&root, move |records| {
            with_app(&w, |app| {
                let batch = mutation_batch(app.engine.host(), &records);
                if !batch.is_empty() {
                    app.engine.handle_mutations(&batch);
                }
            });
        })?;

        {
            let mut app = shared.borrow_mut();
            app.listeners = listeners;
            app.observer = Some(observer);
        }
        tracing::info!("lumen content script started");
        Ok(shared)
    }

    /// Remove every listener, overlay and the modal.
    pub fn shutdown(shared: &Shared) {
        let Ok(mut app) = shared.try_borrow_mut() else {
            return;
        };
        for listener in app.listeners.drain(..) {
            listener.detach();
        }
        if let Some(observer) = app.observer.take() {
            observer.disconnect();
        }
        app.timer.cancel();
        app.engine.teardown();
        app.engine.host_mut().unmount_modal();
        tracing::debug!("lumen content script stopped");
    }

    /// Re-arm the wake-up timer and redraw the panel after any change.
    fn settle(&mut self) {
        let now = self.clock.now();
        self.timer.rearm(self.engine.next_deadline(), now);
        self.render_panel();
    }

    fn render_panel(&self) {
        let host = self.engine.host();
        let (Some(ticket), Some(container)) = (host.modal_ticket(), host.modal_panel()) else {
            return;
        };
        let Some(panel) = self.engine.panel(ticket) else {
            return;
        };
        if let Err(err) = panel_view::render(host.document(), container, &describe(panel)) {
            tracing::warn!(?err, "panel render failed");
        }
    }

    fn ticket(&self) -> Option<ModalTicket> {
        self.engine.host().modal_ticket()
    }
}

fn closest(element: &Element, attr: &str) -> Option<Element> {
    element.closest(&format!("[{attr}]")).ok().flatten()
}

fn on_focus_change(weak: &Weak<RefCell<App>>, event: &Event, focused: bool) {
    let Some(element) = event_element(event) else {
        return;
    };
    if DomHost::is_own_ui(&element) {
        return;
    }
    with_app(weak, |app| {
        let now = app.clock.now();
        let node = app.engine.host().node(element);
        if focused {
            app.engine.handle_focus(&node, now);
        } else {
            app.engine.handle_blur(&node, now);
        }
    });
}

fn on_click(weak: &Weak<RefCell<App>>, event: &Event) {
    let Some(element) = event_element(event) else {
        return;
    };

    if let Some(icon) = closest(&element, OVERLAY_ATTR) {
        event.prevent_default();
        event.stop_propagation();
        let Some(id) = icon
            .get_attribute(OVERLAY_ATTR)
            .and_then(|raw| raw.parse::<u64>().ok())
        else {
            return;
        };
        let opened = with_app(weak, |app| {
            let now = app.clock.now();
            app.engine.activate_overlay(OverlayId(id), now)
        })
        .flatten();
        if let Some(ticket) = opened {
            load_configuration(weak.clone(), ticket);
        }
        return;
    }

    if closest(&element, MODAL_ATTR).is_none() {
        return;
    }
    let action = if element.has_attribute(MODAL_ATTR) {
        Some(PanelAction::Close)
    } else {
        closest(&element, ACTION_ATTR)
            .and_then(|el| el.get_attribute(ACTION_ATTR))
            .and_then(|raw| PanelAction::parse(&raw))
    };
    if let Some(action) = action {
        event.stop_propagation();
        dispatch(weak, action);
    }
}

fn on_input(weak: &Weak<RefCell<App>>, event: &Event) {
    let Some(area) = event_element(event).filter(panel_view::is_result_box) else {
        return;
    };
    let Ok(area) = area.dyn_into::<HtmlTextAreaElement>() else {
        return;
    };
    let value = area.value();
    let Some(app) = weak.upgrade() else {
        return;
    };
    // Editing must not redraw the panel, which would reset the caret.
    if let Ok(mut app) = app.try_borrow_mut() {
        if let Some(ticket) = app.ticket() {
            app.engine.edit_result(ticket, &value);
        }
    }
}

fn on_keydown(weak: &Weak<RefCell<App>>, event: &Event) {
    let Some(key) = event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key) else {
        return;
    };
    if key != "Escape" {
        return;
    }
    let Some(app) = weak.upgrade() else {
        return;
    };
    let open = match app.try_borrow() {
        Ok(app) => app.ticket().is_some(),
        Err(_) => false,
    };
    if open {
        event.stop_propagation();
        dispatch(weak, PanelAction::Close);
    }
}

fn load_configuration(weak: Weak<RefCell<App>>, ticket: ModalTicket) {
    spawn_local(async move {
        let config = storage::load().await;
        with_app(&weak, |app| app.engine.configuration_loaded(ticket, config));
    });
}

fn dispatch(weak: &Weak<RefCell<App>>, action: PanelAction) {
    match action {
        PanelAction::Close => {
            with_app(weak, |app| {
                if let Some(ticket) = app.ticket() {
                    let now = app.clock.now();
                    app.engine.close_modal(ticket, now);
                }
            });
        }
        PanelAction::Back => {
            with_app(weak, |app| app.ticket().map(|t| app.engine.panel_back(t)));
        }
        PanelAction::Configure => {
            with_app(weak, |app| {
                app.ticket().map(|t| app.engine.request_configuration(t))
            });
        }
        PanelAction::Insert => {
            with_app(weak, |app| {
                let Some(ticket) = app.ticket() else {
                    return;
                };
                let now = app.clock.now();
                match app.engine.insert_result(ticket, now) {
                    InsertOutcome::Inserted => {}
                    outcome => tracing::debug!(?outcome, "insert did not apply"),
                }
            });
        }
        PanelAction::Copy => copy_result(weak),
        PanelAction::Convert(option) => convert(weak.clone(), option),
        PanelAction::SaveCredential => save_credential(weak.clone()),
    }
}

fn copy_result(weak: &Weak<RefCell<App>>) {
    let text = with_app(weak, |app| {
        let ticket = app.ticket()?;
        app.engine
            .panel(ticket)?
            .result_text()
            .map(str::to_owned)
    })
    .flatten();
    let (Some(text), Some(window)) = (text, web_sys::window()) else {
        return;
    };
    let promise = window.navigator().clipboard().write_text(&text);
    spawn_local(async move {
        if let Err(err) = JsFuture::from(promise).await {
            tracing::warn!(?err, "clipboard write failed");
        }
    });
}

fn convert(weak: Weak<RefCell<App>>, option: OptionKind) {
    let started = with_app(&weak, |app| {
        let ticket = app.ticket()?;
        let now = app.clock.now();
        let request = app.engine.begin_conversion(ticket, option, now)?;
        Some((ticket, request))
    })
    .flatten();
    let Some((ticket, request)) = started else {
        return;
    };

    let http = match conversion_request(&request) {
        Ok(http) => http,
        Err(err) => {
            with_app(&weak, |app| {
                app.engine.finish_conversion(ticket, request.id, Err(err))
            });
            return;
        }
    };
    spawn_local(async move {
        let outcome = fetch::send(&http)
            .await
            .and_then(|(status, body)| parse_conversion(request.provider, status, &body));
        with_app(&weak, |app| {
            app.engine.finish_conversion(ticket, request.id, outcome)
        });
    });
}

fn save_credential(weak: Weak<RefCell<App>>) {
    let started = with_app(&weak, |app| {
        let ticket = app.ticket()?;
        let (provider, credential) = app
            .engine
            .host()
            .modal_panel()
            .and_then(panel_view::read_credential_form)?;
        let now = app.clock.now();
        let probe = app
            .engine
            .begin_validation(ticket, provider, &credential, now)?;
        Some((ticket, probe))
    })
    .flatten();
    let Some((ticket, probe)) = started else {
        return;
    };

    let http = validation_request(&probe);
    spawn_local(async move {
        let outcome: Result<(), ConversionError> = match http {
            Ok(http) => fetch::send(&http)
                .await
                .and_then(|(status, body)| parse_validation(probe.provider, status, &body)),
            Err(err) => Err(err),
        };
        let saved = with_app(&weak, |app| {
            app.engine.finish_validation(ticket, &probe, outcome)
        })
        .flatten();
        if let Some(config) = saved {
            storage::save(config).await;
        }
    });
}
