#![forbid(unsafe_code)]

//! Provider settings as stored in extension storage.
//!
//! The record lives under [`STORAGE_KEY`] as JSON with the credential
//! base64-obfuscated. This is not encryption; it only keeps the key from
//! being readable at a glance in storage dumps. Settings written by older
//! versions as plain JSON under [`LEGACY_KEY`] are accepted for migration.

use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use lumen_core::{ProviderConfig, ProviderKind};
use serde::{Deserialize, Serialize};

/// Storage key of the current record.
pub const STORAGE_KEY: &str = "secureSettings";
/// Page storage key used by the first releases.
pub const LEGACY_KEY: &str = "text-to-prompt-settings";

/// Persisted settings record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    pub provider: ProviderKind,
    /// Base64 of the credential.
    pub api_key: String,
    pub is_configured: bool,
    /// Milliseconds since the Unix epoch of the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<u64>,
}

impl fmt::Debug for StoredSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSettings")
            .field("provider", &self.provider)
            .field("is_configured", &self.is_configured)
            .field("last_updated", &self.last_updated)
            .finish_non_exhaustive()
    }
}

/// Plain record written by the first releases.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySettings {
    provider: ProviderKind,
    api_key: String,
    is_configured: bool,
}

/// Settings that could not be read.
#[derive(Debug)]
pub enum SettingsError {
    Json(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "settings json error: {err}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl StoredSettings {
    /// Seal `config` for storage.
    #[must_use]
    pub fn seal(config: &ProviderConfig, now_ms: u64) -> Self {
        Self {
            provider: config.provider,
            api_key: STANDARD.encode(config.credential.as_bytes()),
            is_configured: config.is_configured,
            last_updated: Some(now_ms),
        }
    }

    /// Recover the configuration. A credential that does not decode yields
    /// an unconfigured result.
    #[must_use]
    pub fn unseal(&self) -> ProviderConfig {
        let credential = STANDARD
            .decode(self.api_key.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        match credential {
            Some(credential) if !credential.is_empty() => ProviderConfig {
                is_configured: self.is_configured,
                provider: self.provider,
                credential,
            },
            _ => {
                tracing::warn!(provider = %self.provider, "stored credential unreadable");
                ProviderConfig {
                    is_configured: false,
                    provider: self.provider,
                    credential: String::new(),
                }
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read the record stored under [`LEGACY_KEY`], converting it to the
    /// current form.
    pub fn from_legacy_json(json: &str, now_ms: u64) -> Result<Self, SettingsError> {
        let legacy: LegacySettings = serde_json::from_str(json)?;
        Ok(Self::seal(
            &ProviderConfig {
                is_configured: legacy.is_configured,
                provider: legacy.provider,
                credential: legacy.api_key,
            },
            now_ms,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ProviderConfig {
        ProviderConfig {
            is_configured: true,
            provider: ProviderKind::Gemini,
            credential: "AIzaSyD-valid_key_0123456789".into(),
        }
    }

    #[test]
    fn stored_form_is_camel_case_and_obfuscated() {
        let json = StoredSettings::seal(&config(), 1_700_000_000_000)
            .to_json()
            .unwrap();
        assert!(json.contains(r#""provider":"gemini""#));
        assert!(json.contains(r#""isConfigured":true"#));
        assert!(json.contains(r#""lastUpdated":1700000000000"#));
        assert!(!json.contains("AIzaSyD-valid"));

        let back = StoredSettings::from_json(&json).unwrap().unseal();
        assert_eq!(back, config());
    }

    #[test]
    fn undecodable_credential_is_not_configured() {
        let stored = StoredSettings::from_json(
            r#"{"provider":"openai","apiKey":"%%not base64%%","isConfigured":true}"#,
        )
        .unwrap();
        let config = stored.unseal();
        assert!(!config.is_configured);
        assert!(config.credential.is_empty());
    }

    #[test]
    fn legacy_record_migrates() {
        let stored = StoredSettings::from_legacy_json(
            r#"{"provider":"openai","apiKey":"sk-legacy-0000000000000","isConfigured":true}"#,
            42,
        )
        .unwrap();
        assert_eq!(stored.last_updated, Some(42));
        assert_eq!(stored.unseal().credential, "sk-legacy-0000000000000");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let err = StoredSettings::from_json(
            r#"{"provider":"claude","apiKey":"","isConfigured":false}"#,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("settings json error"));
    }

    #[test]
    fn debug_does_not_leak_the_credential() {
        let stored = StoredSettings::seal(&config(), 0);
        assert!(!format!("{stored:?}").contains(&stored.api_key));
    }
}
