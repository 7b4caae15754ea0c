#![forbid(unsafe_code)]

//! DOM rendering of a [`PanelModel`].
//!
//! The panel is rebuilt from scratch on every change; it is small and the
//! only state worth keeping across renders (the result text) lives in the
//! engine.

use lumen_core::ProviderKind;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

use crate::panel_model::{Body, Button, PanelModel};
use crate::styles::ACTION_ATTR;

const ROLE_ATTR: &str = "data-role";
const ROLE_PROVIDER: &str = "provider";
const ROLE_CREDENTIAL: &str = "credential";
const ROLE_RESULT: &str = "result";

fn el(document: &Document, tag: &str, class: Option<&str>, text: Option<&str>) -> Result<Element, JsValue> {
    let node = document.create_element(tag)?;
    if let Some(class) = class {
        node.set_class_name(class);
    }
    if let Some(text) = text {
        node.set_text_content(Some(text));
    }
    Ok(node)
}

/// Replace the panel's content with `model`.
pub fn render(document: &Document, panel: &HtmlElement, model: &PanelModel) -> Result<(), JsValue> {
    panel.set_inner_html("");
    panel.append_child(&el(document, "h2", None, Some(model.title))?)?;

    if let Some(notice) = &model.notice {
        let class = if model.error {
            "lumen-notice lumen-error"
        } else {
            "lumen-notice"
        };
        panel.append_child(&el(document, "p", Some(class), Some(notice.as_str()))?)?;
    }

    match &model.body {
        Body::Busy(caption) => {
            let p = el(document, "p", Some("lumen-notice"), Some(*caption))?;
            p.set_attribute("aria-busy", "true")?;
            panel.append_child(&p)?;
        }
        Body::CredentialForm { providers } => {
            let select = el(document, "select", None, None)?;
            select.set_attribute(ROLE_ATTR, ROLE_PROVIDER)?;
            for (kind, label) in providers {
                let option = el(document, "option", None, Some(*label))?;
                option.set_attribute("value", kind.as_str())?;
                select.append_child(&option)?;
            }
            panel.append_child(&select)?;

            let input: HtmlInputElement = el(document, "input", None, None)?.unchecked_into();
            input.set_type("password");
            input.set_placeholder("API key");
            input.set_attribute(ROLE_ATTR, ROLE_CREDENTIAL)?;
            input.set_attribute("autocomplete", "off")?;
            panel.append_child(&input)?;
        }
        Body::Options { preview } => {
            panel.append_child(&el(document, "p", Some("lumen-preview"), Some(preview.as_str()))?)?;
        }
        Body::Result { text } => {
            let area: HtmlTextAreaElement = el(document, "textarea", None, None)?.unchecked_into();
            area.set_value(text);
            area.set_attribute(ROLE_ATTR, ROLE_RESULT)?;
            area.set_attribute("spellcheck", "false")?;
            panel.append_child(&area)?;
        }
        Body::Message(message) => {
            panel.append_child(&el(
                document,
                "p",
                Some("lumen-message lumen-error"),
                Some(message.as_str()),
            )?)?;
        }
    }

    for button in &model.buttons {
        panel.append_child(&render_button(document, button)?)?;
    }
    Ok(())
}

fn render_button(document: &Document, button: &Button) -> Result<Element, JsValue> {
    let class = button.primary.then_some("lumen-primary");
    let node = el(document, "button", class, None)?;
    node.set_attribute("type", "button")?;
    node.set_attribute(ACTION_ATTR, &button.action.to_attr())?;
    node.append_child(&document.create_text_node(button.label))?;
    if let Some(hint) = button.hint {
        node.append_child(&el(document, "small", None, Some(hint))?)?;
    }
    Ok(node)
}

fn find<T: JsCast>(panel: &HtmlElement, role: &str) -> Option<T> {
    panel
        .query_selector(&format!("[{ROLE_ATTR}=\"{role}\"]"))
        .ok()
        .flatten()
        .and_then(|node| node.dyn_into::<T>().ok())
}

/// Provider and credential typed into the configuration form.
pub fn read_credential_form(panel: &HtmlElement) -> Option<(ProviderKind, String)> {
    let provider = find::<HtmlSelectElement>(panel, ROLE_PROVIDER)
        .and_then(|select| ProviderKind::parse(&select.value()))?;
    let credential = find::<HtmlInputElement>(panel, ROLE_CREDENTIAL)?.value();
    Some((provider, credential))
}

/// Whether `target` is the editable result box.
pub fn is_result_box(target: &Element) -> bool {
    target.get_attribute(ROLE_ATTR).as_deref() == Some(ROLE_RESULT)
}
