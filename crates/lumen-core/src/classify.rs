#![forbid(unsafe_code)]

//! Editable-surface classification.
//!
//! The host reduces an element to an [`ElementTraits`] snapshot (all `Copy`,
//! parsed from attribute strings once) and [`is_editable_surface`] decides
//! whether the engine should ever attach an overlay to it. The decision is a
//! pure function of the snapshot: no allocation, no side effects, safe to call
//! on every focus event and every node of a mutation batch.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. disabled or read-only form controls are rejected;
//! 2. `<input>` is accepted unless its type is in [`InputType::is_excluded`];
//! 3. `<textarea>` is accepted;
//! 4. natively content-editable elements are accepted;
//! 5. an explicit `contenteditable` of `""`, `true` or `plaintext-only` is
//!    accepted; any other value present on the element (such as `false`)
//!    rejects it without consulting the later rules;
//! 6. `role="textbox"` / `role="searchbox"` is accepted;
//! 7. any element of a document in design mode is accepted;
//! 8. everything else is rejected.
//!
//! Anything ambiguous falls through to rule 8.

/// Form-control kind of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTag {
    /// `<input>` with its parsed `type`.
    Input(InputType),
    /// `<textarea>`.
    TextArea,
    /// Any other element.
    Other,
}

/// Parsed `type` of an `<input>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Checkbox,
    Radio,
    File,
    Submit,
    Button,
    Image,
    Hidden,
    Range,
    Reset,
    Color,
    /// `text`, `search`, `email`, `url`, `password`, unknown values, ...
    TextLike,
}

impl InputType {
    /// Parse the `type` attribute, case-insensitively. Unknown values behave as
    /// text, matching how browsers fall back to `type="text"`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let eq = |name: &str| raw.eq_ignore_ascii_case(name);
        if eq("checkbox") {
            Self::Checkbox
        } else if eq("radio") {
            Self::Radio
        } else if eq("file") {
            Self::File
        } else if eq("submit") {
            Self::Submit
        } else if eq("button") {
            Self::Button
        } else if eq("image") {
            Self::Image
        } else if eq("hidden") {
            Self::Hidden
        } else if eq("range") {
            Self::Range
        } else if eq("reset") {
            Self::Reset
        } else if eq("color") {
            Self::Color
        } else {
            Self::TextLike
        }
    }

    /// Input types that never accept typed text.
    #[must_use]
    pub const fn is_excluded(self) -> bool {
        !matches!(self, Self::TextLike)
    }
}

/// Value of an explicit `contenteditable` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableAttr {
    /// `contenteditable` or `contenteditable=""`.
    Empty,
    True,
    PlaintextOnly,
    /// `false`, `inherit` or anything unrecognized.
    Other,
}

impl EditableAttr {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Empty
        } else if raw.eq_ignore_ascii_case("true") {
            Self::True
        } else if raw.eq_ignore_ascii_case("plaintext-only") {
            Self::PlaintextOnly
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub const fn enables_editing(self) -> bool {
        matches!(self, Self::Empty | Self::True | Self::PlaintextOnly)
    }
}

/// ARIA role relevant to classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Textbox,
    Searchbox,
    Other,
}

impl Role {
    /// Parse a `role` attribute. Only the first token of a space-separated
    /// fallback list is honored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.split_ascii_whitespace().next() {
            Some(r) if r.eq_ignore_ascii_case("textbox") => Self::Textbox,
            Some(r) if r.eq_ignore_ascii_case("searchbox") => Self::Searchbox,
            _ => Self::Other,
        }
    }
}

/// Classification-relevant snapshot of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementTraits {
    pub tag: ElementTag,
    /// `disabled` (form controls only).
    pub disabled: bool,
    /// `readOnly` (form controls only).
    pub read_only: bool,
    /// The element's computed `isContentEditable`.
    pub content_editable: bool,
    /// Explicit `contenteditable` attribute, if present.
    pub editable_attr: Option<EditableAttr>,
    /// `role` attribute, if present.
    pub role: Option<Role>,
    /// `document.designMode == "on"` for the owning document.
    pub design_mode: bool,
}

impl ElementTraits {
    /// A plain, non-editable element. Handy base for building fixtures.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            tag: ElementTag::Other,
            disabled: false,
            read_only: false,
            content_editable: false,
            editable_attr: None,
            role: None,
            design_mode: false,
        }
    }

    #[must_use]
    pub const fn input(kind: InputType) -> Self {
        Self {
            tag: ElementTag::Input(kind),
            ..Self::plain()
        }
    }

    #[must_use]
    pub const fn textarea() -> Self {
        Self {
            tag: ElementTag::TextArea,
            ..Self::plain()
        }
    }

    #[must_use]
    pub const fn is_form_control(&self) -> bool {
        matches!(self.tag, ElementTag::Input(_) | ElementTag::TextArea)
    }
}

/// Decide whether an element is a supported editable surface.
#[must_use]
pub fn is_editable_surface(traits: &ElementTraits) -> bool {
    if traits.is_form_control() && (traits.disabled || traits.read_only) {
        return false;
    }
    match traits.tag {
        ElementTag::Input(kind) => return !kind.is_excluded(),
        ElementTag::TextArea => return true,
        ElementTag::Other => {}
    }
    if traits.content_editable {
        return true;
    }
    // A present attribute settles the answer either way.
    if let Some(attr) = traits.editable_attr {
        return attr.enables_editing();
    }
    if matches!(traits.role, Some(Role::Textbox | Role::Searchbox)) {
        return true;
    }
    traits.design_mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_like_inputs_qualify() {
        for raw in ["text", "TEXT", "search", "email", "password", "url", "", "weird"] {
            let t = ElementTraits::input(InputType::parse(raw));
            assert!(is_editable_surface(&t), "type={raw:?}");
        }
    }

    #[test]
    fn excluded_input_types_never_qualify() {
        for raw in [
            "checkbox", "radio", "file", "submit", "button", "image", "hidden", "range",
            "reset", "color",
        ] {
            let t = ElementTraits {
                content_editable: true,
                editable_attr: Some(EditableAttr::True),
                role: Some(Role::Textbox),
                design_mode: true,
                ..ElementTraits::input(InputType::parse(raw))
            };
            assert!(!is_editable_surface(&t), "type={raw:?}");
        }
    }

    #[test]
    fn disabled_or_read_only_controls_short_circuit() {
        let disabled = ElementTraits {
            disabled: true,
            ..ElementTraits::input(InputType::TextLike)
        };
        let read_only = ElementTraits {
            read_only: true,
            ..ElementTraits::textarea()
        };
        assert!(!is_editable_surface(&disabled));
        assert!(!is_editable_surface(&read_only));
    }

    #[test]
    fn disabled_flag_is_ignored_on_non_controls() {
        let div = ElementTraits {
            disabled: true,
            content_editable: true,
            ..ElementTraits::plain()
        };
        assert!(is_editable_surface(&div));
    }

    #[test]
    fn explicit_contenteditable_values() {
        let with = |raw: &str| ElementTraits {
            editable_attr: Some(EditableAttr::parse(raw)),
            ..ElementTraits::plain()
        };
        assert!(is_editable_surface(&with("")));
        assert!(is_editable_surface(&with("true")));
        assert!(is_editable_surface(&with("plaintext-only")));
        assert!(!is_editable_surface(&with("false")));
        assert!(!is_editable_surface(&with("inherit")));
    }

    #[test]
    fn explicit_false_attribute_wins_over_role() {
        let t = ElementTraits {
            editable_attr: Some(EditableAttr::Other),
            role: Some(Role::Textbox),
            ..ElementTraits::plain()
        };
        assert!(!is_editable_surface(&t));

        let in_design_mode = ElementTraits {
            design_mode: true,
            ..t
        };
        assert!(!is_editable_surface(&in_design_mode));
    }

    #[test]
    fn aria_roles_and_design_mode() {
        let textbox = ElementTraits {
            role: Some(Role::parse("textbox")),
            ..ElementTraits::plain()
        };
        let searchbox = ElementTraits {
            role: Some(Role::parse("searchbox combobox")),
            ..ElementTraits::plain()
        };
        let button = ElementTraits {
            role: Some(Role::parse("button")),
            ..ElementTraits::plain()
        };
        let designed = ElementTraits {
            design_mode: true,
            ..ElementTraits::plain()
        };
        assert!(is_editable_surface(&textbox));
        assert!(is_editable_surface(&searchbox));
        assert!(!is_editable_surface(&button));
        assert!(is_editable_surface(&designed));
        assert!(!is_editable_surface(&ElementTraits::plain()));
    }
}
