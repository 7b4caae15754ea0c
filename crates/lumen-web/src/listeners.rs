#![forbid(unsafe_code)]

//! Owned event listeners and the document mutation observer.
//!
//! Each wrapper keeps its closure alive and knows how to unregister itself,
//! so teardown leaves nothing attached to the page.

use js_sys::Array;
use lumen_core::MutationBatch;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Element, Event, EventTarget, MutationObserver, MutationObserverInit,
    MutationRecord, Node, NodeList,
};

use crate::dom_host::{DomHost, DomNode};

/// How a listener is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct Phase {
    pub capture: bool,
    pub passive: bool,
}

impl Phase {
    pub const CAPTURE: Self = Self {
        capture: true,
        passive: false,
    };
    pub const CAPTURE_PASSIVE: Self = Self {
        capture: true,
        passive: true,
    };
    pub const BUBBLE_PASSIVE: Self = Self {
        capture: false,
        passive: true,
    };
}

/// A registered event listener.
pub struct Listener {
    target: EventTarget,
    kind: &'static str,
    capture: bool,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    pub fn attach(
        target: &EventTarget,
        kind: &'static str,
        phase: Phase,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut(Event)>::new(handler);
        let options = AddEventListenerOptions::new();
        options.set_capture(phase.capture);
        options.set_passive(phase.passive);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            kind,
            callback.as_ref().unchecked_ref(),
            &options,
        )?;
        Ok(Self {
            target: target.clone(),
            kind,
            capture: phase.capture,
            callback,
        })
    }

    pub fn detach(&self) {
        let _ = self.target.remove_event_listener_with_callback_and_bool(
            self.kind,
            self.callback.as_ref().unchecked_ref(),
            self.capture,
        );
    }
}

/// A `MutationObserver` watching a subtree for inserted and removed nodes.
pub struct Observer {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl Observer {
    pub fn observe(
        root: &Node,
        handler: impl FnMut(Array) + 'static,
    ) -> Result<Self, JsValue> {
        let mut handler = handler;
        let callback = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |records: Array, _observer: MutationObserver| handler(records),
        );
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer.observe_with_options(root, &init)?;
        Ok(Self {
            observer,
            _callback: callback,
        })
    }

    pub fn disconnect(&self) {
        self.observer.disconnect();
    }
}

/// Element that dispatched `event`, if it was an element.
pub fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn collect(host: &DomHost, nodes: &NodeList, out: &mut Vec<DomNode>) {
    for i in 0..nodes.length() {
        let Some(element) = nodes.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
            continue;
        };
        if !DomHost::is_own_ui(&element) {
            out.push(host.node(element));
        }
    }
}

/// Turn observer records into a batch, skipping our own overlay and modal
/// nodes and anything that is not an element.
pub fn mutation_batch(host: &DomHost, records: &Array) -> MutationBatch<DomNode> {
    let mut batch = MutationBatch::default();
    for record in records.iter() {
        let Ok(record) = record.dyn_into::<MutationRecord>() else {
            continue;
        };
        collect(host, &record.added_nodes(), &mut batch.added);
        collect(host, &record.removed_nodes(), &mut batch.removed);
    }
    batch
}
