#![forbid(unsafe_code)]

//! Services: the concrete collaborators behind the Lumen modal.
//!
//! # Role in Lumen
//! `lumen-core` decides when text may leave the page and what happens to the
//! answer; this crate supplies the policies it consults and the wire shapes
//! the host sends:
//!
//! - [`PromptGuard`]: outbound escaping, inbound sanitizing, error redaction
//!   and credential shape checks.
//! - [`RateLimiter`]: sliding-window admission control.
//! - [`StoredSettings`]: the persisted credential record.
//! - [`providers`]: OpenAI and Gemini request bodies and response parsing,
//!   restricted to the hosts in [`endpoint`].

pub mod admission;
pub mod endpoint;
pub mod guard;
pub mod providers;
pub mod settings;

pub use admission::RateLimiter;
pub use endpoint::is_allowed_endpoint;
pub use guard::PromptGuard;
pub use providers::HttpRequest;
pub use settings::{SettingsError, StoredSettings};

use lumen_core::Services;

/// Production collaborators: ten calls per minute and the prompt guard.
#[must_use]
pub fn default_services() -> Services {
    Services::new(Box::new(RateLimiter::default()), Box::new(PromptGuard))
}
