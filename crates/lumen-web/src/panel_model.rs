#![forbid(unsafe_code)]

//! What the modal panel shows, derived from the headless [`Panel`].
//!
//! The DOM layer renders a [`PanelModel`] and routes clicks back as
//! [`PanelAction`]s encoded in `data-action` attributes. Keeping this mapping
//! free of `web-sys` lets it be tested natively.

use lumen_core::{OptionKind, Panel, PanelStage, ProviderKind};

/// A user action inside the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Close,
    Back,
    Configure,
    SaveCredential,
    Convert(OptionKind),
    Insert,
    Copy,
}

impl PanelAction {
    /// Value stored in the element's `data-action` attribute.
    #[must_use]
    pub fn to_attr(self) -> String {
        match self {
            Self::Close => "close".to_owned(),
            Self::Back => "back".to_owned(),
            Self::Configure => "configure".to_owned(),
            Self::SaveCredential => "save-credential".to_owned(),
            Self::Convert(option) => format!("convert:{}", option.as_str()),
            Self::Insert => "insert".to_owned(),
            Self::Copy => "copy".to_owned(),
        }
    }

    /// Parse a `data-action` value. Unknown values are ignored by the caller.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(option) = raw.strip_prefix("convert:") {
            return OptionKind::parse(option).map(Self::Convert);
        }
        Some(match raw {
            "close" => Self::Close,
            "back" => Self::Back,
            "configure" => Self::Configure,
            "save-credential" => Self::SaveCredential,
            "insert" => Self::Insert,
            "copy" => Self::Copy,
            _ => return None,
        })
    }
}

/// A labelled button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub action: PanelAction,
    pub label: &'static str,
    pub hint: Option<&'static str>,
    pub primary: bool,
}

impl Button {
    const fn plain(action: PanelAction, label: &'static str) -> Self {
        Self {
            action,
            label,
            hint: None,
            primary: false,
        }
    }

    const fn primary(action: PanelAction, label: &'static str) -> Self {
        Self {
            action,
            label,
            hint: None,
            primary: true,
        }
    }
}

/// Main area of the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Spinner with a caption.
    Busy(&'static str),
    /// Provider picker and credential input.
    CredentialForm { providers: Vec<(ProviderKind, &'static str)> },
    /// Option list with a preview of the field text.
    Options { preview: String },
    /// Editable result.
    Result { text: String },
    /// Plain message.
    Message(String),
}

/// Everything the DOM layer needs to draw the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelModel {
    pub title: &'static str,
    pub notice: Option<String>,
    pub error: bool,
    pub body: Body,
    pub buttons: Vec<Button>,
}

pub const PREVIEW_CHARS: usize = 120;

const TITLE: &str = "Lumen";

/// Derive the panel model for the current stage.
#[must_use]
pub fn describe(panel: &Panel) -> PanelModel {
    let close = Button::plain(PanelAction::Close, "Close");
    match panel.stage() {
        PanelStage::Loading => PanelModel {
            title: TITLE,
            notice: None,
            error: false,
            body: Body::Busy("Loading settings…"),
            buttons: vec![close],
        },
        PanelStage::Configure { notice } => PanelModel {
            title: "Configure API key",
            notice: notice.clone(),
            error: notice.is_some(),
            body: Body::CredentialForm {
                providers: ProviderKind::ALL.iter().map(|p| (*p, p.label())).collect(),
            },
            buttons: vec![
                Button::primary(PanelAction::SaveCredential, "Save"),
                close,
            ],
        },
        PanelStage::Validating { .. } => PanelModel {
            title: "Configure API key",
            notice: None,
            error: false,
            body: Body::Busy("Checking API key…"),
            buttons: vec![close],
        },
        PanelStage::Options => {
            let mut buttons: Vec<Button> = OptionKind::ALL
                .iter()
                .map(|option| Button {
                    action: PanelAction::Convert(*option),
                    label: option.label(),
                    hint: Some(option.description()),
                    primary: false,
                })
                .collect();
            buttons.push(Button::plain(PanelAction::Configure, "API settings"));
            buttons.push(close);
            PanelModel {
                title: TITLE,
                notice: None,
                error: false,
                body: Body::Options {
                    preview: preview(panel.source_text()),
                },
                buttons,
            }
        }
        PanelStage::Busy { option, .. } => PanelModel {
            title: option.label(),
            notice: None,
            error: false,
            body: Body::Busy("Processing…"),
            buttons: vec![close],
        },
        PanelStage::Result { option, text } => PanelModel {
            title: option.label(),
            notice: None,
            error: false,
            body: Body::Result { text: text.clone() },
            buttons: vec![
                Button::primary(PanelAction::Insert, "Insert"),
                Button::plain(PanelAction::Copy, "Copy"),
                Button::plain(PanelAction::Back, "Back"),
                close,
            ],
        },
        PanelStage::Failed { option, message } => PanelModel {
            title: option.map_or(TITLE, OptionKind::label),
            notice: None,
            error: true,
            body: Body::Message(message.clone()),
            buttons: vec![Button::plain(PanelAction::Back, "Back"), close],
        },
    }
}

/// First [`PREVIEW_CHARS`] characters of the field text, on one line.
#[must_use]
pub fn preview(text: &str) -> String {
    let flat: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = flat.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
