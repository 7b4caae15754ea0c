#![forbid(unsafe_code)]

//! Contracts for the collaborators the modal flow consumes.
//!
//! The engine never performs I/O. It decides *whether* a conversion or
//! credential validation may go out (configuration, admission control,
//! outbound guard) and *what* to show when a response comes back (inbound
//! guard, error redaction). The host performs the request in between.
//! Concrete implementations live in `lumen-services`.

use core::fmt;
use core::time::Duration;

/// Text-transformation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [Self; 2] = [Self::OpenAi, Self::Gemini];

    /// Stable identifier used in stored settings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == raw)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Google Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user asked the service to do with the field text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    TextToEnglish,
    TextToJsonEnglish,
    TextToJsonMultilingual,
    TextToToon,
}

impl OptionKind {
    pub const ALL: [Self; 4] = [
        Self::TextToEnglish,
        Self::TextToJsonEnglish,
        Self::TextToJsonMultilingual,
        Self::TextToToon,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TextToEnglish => "text-to-english-prompt",
            Self::TextToJsonEnglish => "text-to-json-english-prompt",
            Self::TextToJsonMultilingual => "text-to-json-prompt",
            Self::TextToToon => "text-to-toon",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == raw)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TextToEnglish => "Process Text → English Response",
            Self::TextToJsonEnglish => "Process Text → JSON (English)",
            Self::TextToJsonMultilingual => "Process Text → JSON (Multilingual)",
            Self::TextToToon => "Process Text → TOON",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::TextToEnglish => "Process your text and get a detailed response in English",
            Self::TextToJsonEnglish => {
                "Enhance and improve your text, then generate structured JSON with English keys and values"
            }
            Self::TextToJsonMultilingual => {
                "Enhance and improve your text in its original language, then generate JSON with English keys"
            }
            Self::TextToToon => {
                "Convert your text into Token-Oriented Object Notation (TOON) for LLM-efficient prompts"
            }
        }
    }

    /// Options whose result must be a JSON object.
    #[must_use]
    pub const fn expects_json(self) -> bool {
        matches!(self, Self::TextToJsonEnglish | Self::TextToJsonMultilingual)
    }
}

/// Credential-store record as the modal flow sees it.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub is_configured: bool,
    pub provider: ProviderKind,
    pub credential: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("is_configured", &self.is_configured)
            .field("provider", &self.provider)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Identity of one outbound request within a modal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// An admitted, sanitized conversion request for the host to send.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub id: RequestId,
    /// Outbound-guarded text.
    pub text: String,
    pub option: OptionKind,
    pub provider: ProviderKind,
    pub credential: String,
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("id", &self.id)
            .field("text_len", &self.text.len())
            .field("option", &self.option)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// An admitted credential-validation probe.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub id: RequestId,
    pub provider: ProviderKind,
    pub credential: String,
}

impl fmt::Debug for ValidationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRequest")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Failure of an outbound call. Network errors, HTTP errors and unparseable
/// bodies are all "no result"; the panel shows the redacted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The request never completed (offline, CORS, aborted).
    Network(String),
    /// The provider answered with a non-success status.
    Api { status: u16, message: String },
    /// The body was not the expected shape.
    MalformedResponse,
    /// The endpoint failed the allowlist check.
    InvalidEndpoint,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Api { status, message } => write!(f, "api error {status}: {message}"),
            Self::MalformedResponse => write!(f, "invalid api response format"),
            Self::InvalidEndpoint => write!(f, "invalid api endpoint"),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Rate limiting consulted before every outbound call.
pub trait AdmissionControl {
    /// Admit one call at `now`, recording it if admitted.
    fn can_proceed(&mut self, now: Duration) -> bool;

    /// How long until the next call would be admitted.
    fn time_until_next_slot(&self, now: Duration) -> Duration;
}

/// Sanitizers applied where text crosses between page and service.
pub trait TextGuard {
    /// Applied to field text just before it is embedded in a request.
    /// An empty result means the input is unusable.
    fn outbound(&self, text: &str) -> String;

    /// Applied to service text before it is shown or inserted.
    fn inbound(&self, text: &str, option: OptionKind) -> String;

    /// User-facing message for a failed call, with secrets removed.
    fn redact_error(&self, error: &ConversionError) -> String;

    /// Cheap shape check of a credential before any call is attempted.
    fn credential_format_ok(&self, provider: ProviderKind, credential: &str) -> bool;
}

/// Collaborators owned by the engine for the lifetime of the page.
pub struct Services {
    pub admission: Box<dyn AdmissionControl>,
    pub guard: Box<dyn TextGuard>,
}

impl Services {
    #[must_use]
    pub fn new(admission: Box<dyn AdmissionControl>, guard: Box<dyn TextGuard>) -> Self {
        Self { admission, guard }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
