#![forbid(unsafe_code)]

//! Stylesheet and markup injected into the page.
//!
//! Every selector is scoped under a `lumen-` class so page styles and ours do
//! not collide. Overlays use `position: fixed`, matching the viewport
//! coordinates the engine computes from `getBoundingClientRect`.

/// Edge length of the overlay icon.
pub const ICON_SIZE_PX: u32 = 28;

/// Attribute carrying an overlay's [`lumen_core::OverlayId`].
pub const OVERLAY_ATTR: &str = "data-lumen-overlay";

/// Attribute marking the modal root.
pub const MODAL_ATTR: &str = "data-lumen-modal";

/// Attribute carrying a [`crate::panel_model::PanelAction`].
pub const ACTION_ATTR: &str = "data-action";

/// Selector matching any node inside our own UI.
pub const OWN_UI_SELECTOR: &str = "[data-lumen-overlay], [data-lumen-modal]";

/// Elements a mutation scan classifies inside an inserted subtree.
pub const CANDIDATE_SELECTOR: &str =
    r#"input, textarea, [contenteditable], [role="textbox"], [role="searchbox"]"#;

pub const STYLE_ELEMENT_ID: &str = "lumen-styles";

pub const STYLESHEET: &str = r#"
.lumen-icon {
  position: fixed;
  width: 28px;
  height: 28px;
  background: rgba(255, 255, 255, 0.95);
  border-radius: 50%;
  cursor: pointer;
  display: flex;
  align-items: center;
  justify-content: center;
  z-index: 2147483647;
  opacity: 0;
  pointer-events: none;
  transition: opacity 0.2s ease, transform 0.2s ease;
  box-shadow: 0 2px 8px rgba(0, 0, 0, 0.15);
  border: 1px solid rgba(0, 0, 0, 0.06);
}
.lumen-icon.lumen-shown { opacity: 1; pointer-events: auto; }
.lumen-icon:hover { transform: scale(1.1); }
.lumen-modal {
  position: fixed;
  inset: 0;
  z-index: 2147483646;
  display: none;
  align-items: center;
  justify-content: center;
  background: rgba(0, 0, 0, 0.4);
  font: 14px/1.4 system-ui, sans-serif;
  color: #111;
}
.lumen-modal.lumen-open { display: flex; }
.lumen-panel {
  width: min(520px, 92vw);
  max-height: 86vh;
  overflow: auto;
  background: #fff;
  border-radius: 12px;
  padding: 20px;
  box-shadow: 0 12px 40px rgba(0, 0, 0, 0.25);
}
.lumen-panel h2 { margin: 0 0 12px; font-size: 16px; }
.lumen-notice { margin: 0 0 12px; color: #555; }
.lumen-notice.lumen-error, .lumen-message.lumen-error { color: #b42318; }
.lumen-preview { margin: 0 0 12px; color: #555; font-style: italic; }
.lumen-panel button {
  display: block;
  width: 100%;
  text-align: left;
  margin: 6px 0;
  padding: 10px 12px;
  border: 1px solid #ddd;
  border-radius: 8px;
  background: #fff;
  cursor: pointer;
}
.lumen-panel button:hover { border-color: #4f46e5; background: #f5f5ff; }
.lumen-panel button.lumen-primary { background: #4f46e5; border-color: #4f46e5; color: #fff; }
.lumen-panel button small { display: block; color: #666; }
.lumen-panel textarea, .lumen-panel input, .lumen-panel select {
  box-sizing: border-box;
  width: 100%;
  margin: 6px 0;
  padding: 8px;
  border: 1px solid #ddd;
  border-radius: 6px;
  font: inherit;
}
.lumen-panel textarea { min-height: 160px; font-family: ui-monospace, monospace; }
"#;

/// Lightbulb glyph shown inside every overlay.
pub const ICON_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="#f5a623" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M9 18h6"/><path d="M10 22h4"/><path d="M12 2a7 7 0 0 0-4 12.7c.6.5 1 1.3 1 2.3h6c0-1 .4-1.8 1-2.3A7 7 0 0 0 12 2z"/></svg>"##;

/// CSS pixel value, rounded to whole pixels.
#[must_use]
pub fn px(value: f64) -> String {
    format!("{}px", value.round())
}
