#![forbid(unsafe_code)]

//! [`Host`] over the live page DOM.
//!
//! Elements get a stable numeric identity from a `WeakMap`, so the engine can
//! hash and compare them without keeping anything alive that the page drops.
//! Overlays and the modal are mounted under `document.body` and tagged with
//! `data-lumen-*` attributes; listeners use [`DomHost::is_own_ui`] to ignore
//! events coming from them.

use core::cell::Cell;
use core::fmt;
use core::hash::{Hash, Hasher};

use ahash::AHashMap;
use js_sys::{Object, WeakMap};
use lumen_core::classify::{EditableAttr, Role};
use lumen_core::{
    ElementTag, ElementTraits, Host, HostError, InputType, ModalRequest, ModalTicket, OverlayId,
    Point, Rect,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, EventInit, HtmlElement, HtmlInputElement, HtmlTextAreaElement,
};

use crate::styles::{
    CANDIDATE_SELECTOR, ICON_SVG, MODAL_ATTR, OVERLAY_ATTR, OWN_UI_SELECTOR, STYLE_ELEMENT_ID,
    STYLESHEET, px,
};

/// A page element with a stable identity.
#[derive(Clone)]
pub struct DomNode {
    id: u32,
    element: Element,
}

impl DomNode {
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl PartialEq for DomNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DomNode {}

impl Hash for DomNode {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DomNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.element.tag_name().to_ascii_lowercase(), self.id)
    }
}

/// Element-to-id table. Entries die with their elements.
struct NodeIds {
    map: WeakMap,
    next: Cell<u32>,
}

impl NodeIds {
    fn new() -> Self {
        Self {
            map: WeakMap::new(),
            next: Cell::new(1),
        }
    }

    fn node(&self, element: Element) -> DomNode {
        let key: &Object = element.as_ref();
        if let Some(id) = self.map.get(key).as_f64() {
            return DomNode {
                id: id as u32,
                element,
            };
        }
        let id = self.next.get();
        self.next.set(id.wrapping_add(1));
        self.map.set(key, &JsValue::from(id));
        DomNode { id, element }
    }
}

struct ModalMount {
    root: HtmlElement,
    panel: HtmlElement,
}

/// The page document as the engine sees it.
pub struct DomHost {
    document: Document,
    ids: NodeIds,
    overlays: AHashMap<OverlayId, HtmlElement>,
    modal: Option<ModalMount>,
    ticket: Option<ModalTicket>,
}

impl fmt::Debug for DomHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomHost")
            .field("overlays", &self.overlays.len())
            .field("modal_mounted", &self.modal.is_some())
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

impl DomHost {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            ids: NodeIds::new(),
            overlays: AHashMap::new(),
            modal: None,
            ticket: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Identity for a page element.
    pub fn node(&self, element: Element) -> DomNode {
        self.ids.node(element)
    }

    /// Whether `element` belongs to an overlay or the modal.
    pub fn is_own_ui(element: &Element) -> bool {
        element.closest(OWN_UI_SELECTOR).ok().flatten().is_some()
    }

    /// Ticket of the modal currently shown, if any.
    pub fn modal_ticket(&self) -> Option<ModalTicket> {
        self.ticket
    }

    /// Panel container of the shown modal.
    pub fn modal_panel(&self) -> Option<&HtmlElement> {
        self.ticket?;
        self.modal.as_ref().map(|m| &m.panel)
    }

    /// Add the stylesheet once per document.
    pub fn install_styles(&self) -> Result<(), HostError> {
        if self.document.get_element_by_id(STYLE_ELEMENT_ID).is_some() {
            return Ok(());
        }
        let style = self.document.create_element("style").map_err(call)?;
        style.set_id(STYLE_ELEMENT_ID);
        style.set_text_content(Some(STYLESHEET));
        let parent: Element = match self.document.head() {
            Some(head) => head.into(),
            None => self.body()?.into(),
        };
        parent.append_child(&style).map_err(call)?;
        Ok(())
    }

    /// Remove the modal root entirely. Used on page teardown.
    pub fn unmount_modal(&mut self) {
        if let Some(mount) = self.modal.take() {
            mount.root.remove();
        }
        self.ticket = None;
    }

    fn body(&self) -> Result<HtmlElement, HostError> {
        self.document.body().ok_or(HostError::NoMountRoot)
    }

    fn create_div(&self, class: &str) -> Result<HtmlElement, HostError> {
        let el: HtmlElement = self
            .document
            .create_element("div")
            .map_err(call)?
            .unchecked_into();
        el.set_class_name(class);
        Ok(el)
    }

    fn ensure_modal(&mut self) -> Result<&ModalMount, HostError> {
        if self.modal.is_none() {
            let root = self.create_div("lumen-modal")?;
            root.set_attribute(MODAL_ATTR, "").map_err(call)?;
            let panel = self.create_div("lumen-panel")?;
            panel.set_attribute("role", "dialog").map_err(call)?;
            panel.set_attribute("aria-modal", "true").map_err(call)?;
            root.append_child(&panel).map_err(call)?;
            self.body()?.append_child(&root).map_err(call)?;
            self.modal = Some(ModalMount { root, panel });
        }
        self.modal.as_ref().ok_or(HostError::NoMountRoot)
    }
}

fn call(err: JsValue) -> HostError {
    HostError::Call(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

fn dispatch(element: &Element, name: &str) -> Result<(), HostError> {
    let init = EventInit::new();
    init.set_bubbles(true);
    let event = Event::new_with_event_init_dict(name, &init).map_err(call)?;
    element.dispatch_event(&event).map_err(call)?;
    Ok(())
}

impl Host for DomHost {
    type Node = DomNode;

    fn traits(&self, node: &DomNode) -> Option<ElementTraits> {
        let el = &node.element;
        let mut traits = ElementTraits::plain();
        if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
            traits.tag = ElementTag::Input(InputType::parse(&input.type_()));
            traits.disabled = input.disabled();
            traits.read_only = input.read_only();
        } else if let Some(area) = el.dyn_ref::<HtmlTextAreaElement>() {
            traits.tag = ElementTag::TextArea;
            traits.disabled = area.disabled();
            traits.read_only = area.read_only();
        }
        traits.content_editable = el
            .dyn_ref::<HtmlElement>()
            .is_some_and(HtmlElement::is_content_editable);
        traits.editable_attr = el
            .get_attribute("contenteditable")
            .map(|raw| EditableAttr::parse(&raw));
        traits.role = el.get_attribute("role").map(|raw| Role::parse(&raw));
        traits.design_mode = self.document.design_mode().eq_ignore_ascii_case("on");
        Some(traits)
    }

    fn is_attached(&self, node: &DomNode) -> bool {
        node.element.is_connected()
    }

    fn layout_rect(&self, node: &DomNode) -> Option<Rect> {
        if !node.element.is_connected() {
            return None;
        }
        let r = node.element.get_bounding_client_rect();
        Some(Rect::new(r.left(), r.top(), r.width(), r.height()))
    }

    fn read_text(&self, node: &DomNode) -> String {
        let el = &node.element;
        if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
            input.value()
        } else if let Some(area) = el.dyn_ref::<HtmlTextAreaElement>() {
            area.value()
        } else if let Some(html) = el.dyn_ref::<HtmlElement>() {
            html.inner_text()
        } else {
            el.text_content().unwrap_or_default()
        }
    }

    fn write_text(&mut self, node: &DomNode, text: &str) -> Result<(), HostError> {
        let el = &node.element;
        if !el.is_connected() {
            return Err(HostError::Detached);
        }
        if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
            input.set_value(text);
            dispatch(el, "input")?;
            dispatch(el, "change")
        } else if let Some(area) = el.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(text);
            dispatch(el, "input")?;
            dispatch(el, "change")
        } else {
            el.set_text_content(Some(text));
            dispatch(el, "input")
        }
    }

    fn candidate_descendants(&self, root: &DomNode, out: &mut Vec<DomNode>) {
        let Ok(list) = root.element.query_selector_all(CANDIDATE_SELECTOR) else {
            return;
        };
        for i in 0..list.length() {
            let Some(element) = list.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
                continue;
            };
            if !Self::is_own_ui(&element) {
                out.push(self.ids.node(element));
            }
        }
    }

    fn mount_overlay(&mut self, id: OverlayId, _surface: &DomNode) -> Result<(), HostError> {
        let icon = self.create_div("lumen-icon")?;
        icon.set_attribute(OVERLAY_ATTR, &id.0.to_string())
            .map_err(call)?;
        icon.set_attribute("role", "button").map_err(call)?;
        icon.set_attribute("aria-label", "Open Lumen").map_err(call)?;
        icon.set_inner_html(ICON_SVG);
        self.body()?.append_child(&icon).map_err(call)?;
        if let Some(old) = self.overlays.insert(id, icon) {
            old.remove();
        }
        Ok(())
    }

    fn place_overlay(&mut self, id: OverlayId, at: Point) {
        let Some(icon) = self.overlays.get(&id) else {
            return;
        };
        let style = icon.style();
        let _ = style.set_property("left", &px(at.x));
        let _ = style.set_property("top", &px(at.y));
    }

    fn set_overlay_shown(&mut self, id: OverlayId, shown: bool) {
        if let Some(icon) = self.overlays.get(&id) {
            let _ = icon.class_list().toggle_with_force("lumen-shown", shown);
        }
    }

    fn unmount_overlay(&mut self, id: OverlayId) {
        if let Some(icon) = self.overlays.remove(&id) {
            icon.remove();
        }
    }

    fn show_modal(&mut self, request: &ModalRequest) -> Result<(), HostError> {
        let mount = self.ensure_modal()?;
        mount.root.class_list().add_1("lumen-open").map_err(call)?;
        self.ticket = Some(request.ticket);
        Ok(())
    }

    fn hide_modal(&mut self) {
        if let Some(mount) = &self.modal {
            let _ = mount.root.class_list().remove_1("lumen-open");
            mount.panel.set_inner_html("");
        }
        self.ticket = None;
    }
}
