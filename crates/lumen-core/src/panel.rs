#![forbid(unsafe_code)]

//! Headless state of the modal panel.
//!
//! One [`Panel`] lives for one modal session. It gates every outbound call
//! behind configuration, credential shape, admission control and the
//! outbound guard, and it only accepts the response of the request it is
//! currently waiting for. Rendering is the host's business: it reads
//! [`Panel::stage`] after each call and draws accordingly.

use core::time::Duration;

use crate::collab::{
    ConversionError, ConversionRequest, OptionKind, ProviderConfig, ProviderKind, RequestId,
    Services, ValidationRequest,
};

pub const NOT_CONFIGURED: &str = "Extension is not configured. Please configure your API key.";
pub const INVALID_KEY_FORMAT: &str = "Invalid API key format";
pub const INVALID_INPUT: &str = "Invalid input text";

/// What the panel is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelStage {
    /// Waiting for the credential store.
    Loading,
    /// Credential entry, with an optional message.
    Configure { notice: Option<String> },
    /// Credential probe outstanding.
    Validating { request: RequestId },
    /// Option list.
    Options,
    /// Conversion outstanding.
    Busy { option: OptionKind, request: RequestId },
    /// Editable result, ready to insert.
    Result { option: OptionKind, text: String },
    /// A gate refused or the call failed.
    Failed { option: Option<OptionKind>, message: String },
}

/// One modal session's panel.
#[derive(Debug, Clone)]
pub struct Panel {
    source_text: String,
    stage: PanelStage,
    config: Option<ProviderConfig>,
    next_request: u64,
}

impl Panel {
    #[must_use]
    pub fn new(source_text: String) -> Self {
        Self {
            source_text,
            stage: PanelStage::Loading,
            config: None,
            next_request: 1,
        }
    }

    #[must_use]
    pub fn stage(&self) -> &PanelStage {
        &self.stage
    }

    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Whether a usable credential is loaded.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.is_configured)
    }

    /// Result text as currently edited, if a result is showing.
    #[must_use]
    pub fn result_text(&self) -> Option<&str> {
        match &self.stage {
            PanelStage::Result { text, .. } if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    /// The credential store answered. Absent or unconfigured settings route
    /// to the configuration step.
    pub fn configuration_loaded(&mut self, config: Option<ProviderConfig>) {
        self.config = config.filter(|c| c.is_configured);
        self.stage = if self.config.is_some() {
            PanelStage::Options
        } else {
            PanelStage::Configure { notice: None }
        };
    }

    /// The user asked to (re)enter a credential.
    pub fn request_configuration(&mut self) {
        self.stage = PanelStage::Configure { notice: None };
    }

    /// Leave a result or failure and go back to the option list.
    pub fn back(&mut self) {
        self.stage = if self.is_configured() {
            PanelStage::Options
        } else {
            PanelStage::Configure { notice: None }
        };
    }

    /// Replace the result text with the user's edit.
    pub fn edit_result(&mut self, edited: &str) {
        if let PanelStage::Result { text, .. } = &mut self.stage {
            edited.clone_into(text);
        }
    }

    /// Try to start a conversion. Returns the request to send, or `None` with
    /// the refusal shown in the stage.
    pub fn begin_conversion(
        &mut self,
        option: OptionKind,
        services: &mut Services,
        now: Duration,
    ) -> Option<ConversionRequest> {
        if matches!(self.stage, PanelStage::Busy { .. } | PanelStage::Validating { .. }) {
            return None;
        }
        let Some(config) = self.config.clone() else {
            self.stage = PanelStage::Configure {
                notice: Some(NOT_CONFIGURED.to_owned()),
            };
            return None;
        };
        if !services
            .guard
            .credential_format_ok(config.provider, &config.credential)
        {
            return self.refuse(Some(option), INVALID_KEY_FORMAT.to_owned());
        }
        if !services.admission.can_proceed(now) {
            let wait = services.admission.time_until_next_slot(now);
            return self.refuse(Some(option), rate_limit_message(wait));
        }
        let text = services.guard.outbound(&self.source_text);
        if text.is_empty() {
            return self.refuse(Some(option), INVALID_INPUT.to_owned());
        }
        let id = self.fresh_request();
        self.stage = PanelStage::Busy { option, request: id };
        tracing::debug!(request = id.0, option = option.as_str(), "conversion admitted");
        Some(ConversionRequest {
            id,
            text,
            option,
            provider: config.provider,
            credential: config.credential,
        })
    }

    /// Apply a conversion response. Responses for anything but the request
    /// currently outstanding are dropped; returns whether it was applied.
    pub fn finish_conversion(
        &mut self,
        request: RequestId,
        outcome: Result<String, ConversionError>,
        services: &Services,
    ) -> bool {
        let option = match self.stage {
            PanelStage::Busy { option, request: pending } if pending == request => option,
            _ => return false,
        };
        self.stage = match outcome {
            Ok(raw) => PanelStage::Result {
                option,
                text: services.guard.inbound(&raw, option),
            },
            Err(err) => {
                let message = services.guard.redact_error(&err);
                tracing::warn!(request = request.0, error = %message, "conversion failed");
                PanelStage::Failed {
                    option: Some(option),
                    message,
                }
            }
        };
        true
    }

    /// Try to start validating a credential entered in the configuration step.
    pub fn begin_validation(
        &mut self,
        provider: ProviderKind,
        credential: &str,
        services: &mut Services,
        now: Duration,
    ) -> Option<ValidationRequest> {
        let credential = credential.trim();
        if credential.is_empty() {
            self.stage = PanelStage::Configure {
                notice: Some("Please enter an API key".to_owned()),
            };
            return None;
        }
        if !services.guard.credential_format_ok(provider, credential) {
            self.stage = PanelStage::Configure {
                notice: Some(INVALID_KEY_FORMAT.to_owned()),
            };
            return None;
        }
        if !services.admission.can_proceed(now) {
            let wait = services.admission.time_until_next_slot(now);
            self.stage = PanelStage::Configure {
                notice: Some(rate_limit_message(wait)),
            };
            return None;
        }
        let id = self.fresh_request();
        self.stage = PanelStage::Validating { request: id };
        Some(ValidationRequest {
            id,
            provider,
            credential: credential.to_owned(),
        })
    }

    /// Apply a validation response. On success the credential becomes the
    /// session's configuration and is returned for the host to persist.
    pub fn finish_validation(
        &mut self,
        request: &ValidationRequest,
        outcome: Result<(), ConversionError>,
        services: &Services,
    ) -> Option<ProviderConfig> {
        match self.stage {
            PanelStage::Validating { request: pending } if pending == request.id => {}
            _ => return None,
        }
        match outcome {
            Ok(()) => {
                let config = ProviderConfig {
                    is_configured: true,
                    provider: request.provider,
                    credential: request.credential.clone(),
                };
                self.config = Some(config.clone());
                self.stage = PanelStage::Options;
                Some(config)
            }
            Err(err) => {
                let message = services.guard.redact_error(&err);
                tracing::warn!(request = request.id.0, error = %message, "credential validation failed");
                self.stage = PanelStage::Configure {
                    notice: Some(message),
                };
                None
            }
        }
    }

    fn refuse<T>(&mut self, option: Option<OptionKind>, message: String) -> Option<T> {
        tracing::debug!(%message, "outbound call refused");
        self.stage = PanelStage::Failed { option, message };
        None
    }

    fn fresh_request(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }
}

/// Wait message for an admission refusal, rounded up to whole seconds.
#[must_use]
pub fn rate_limit_message(wait: Duration) -> String {
    let secs = wait.as_millis().div_ceil(1000);
    format!("Rate limit exceeded. Try again in {secs} seconds.")
}
