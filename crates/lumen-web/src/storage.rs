#![forbid(unsafe_code)]

//! Credential persistence in `chrome.storage.local`.
//!
//! The record lives under [`STORAGE_KEY`] as a JSON object. Settings written
//! by the first releases sat in the page's `localStorage` under
//! [`LEGACY_KEY`]; when no current record exists they are sealed, written to
//! extension storage and removed from the page.

use lumen_core::ProviderConfig;
use lumen_services::StoredSettings;
pub use lumen_services::settings::{LEGACY_KEY, STORAGE_KEY};

/// What a load found.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Loaded {
    /// Configuration for the panel; `None` routes to the credential form.
    pub config: Option<ProviderConfig>,
    /// Record to write under the current key, when migrating.
    pub migrate: Option<StoredSettings>,
}

/// Decide what the stored values mean. Both inputs are raw JSON text.
#[must_use]
pub fn resolve(current: Option<&str>, legacy: Option<&str>, now_ms: u64) -> Loaded {
    if let Some(raw) = current {
        return match StoredSettings::from_json(raw) {
            Ok(stored) => Loaded {
                config: Some(stored.unseal()),
                migrate: None,
            },
            Err(err) => {
                tracing::warn!(error = %err, "stored settings unreadable");
                Loaded::default()
            }
        };
    }
    let Some(raw) = legacy else {
        return Loaded::default();
    };
    match StoredSettings::from_legacy_json(raw, now_ms) {
        Ok(stored) => {
            tracing::debug!(provider = %stored.provider, "migrating legacy settings");
            Loaded {
                config: Some(stored.unseal()),
                migrate: Some(stored),
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "legacy settings unreadable");
            Loaded::default()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::{load, save};

#[cfg(target_arch = "wasm32")]
mod wasm {
    use js_sys::{Function, JSON, Object, Promise, Reflect};
    use lumen_core::ProviderConfig;
    use lumen_services::StoredSettings;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;

    use super::{LEGACY_KEY, STORAGE_KEY, resolve};

    fn storage_area() -> Result<Object, JsValue> {
        let chrome = Reflect::get(&js_sys::global(), &"chrome".into())?;
        let storage = Reflect::get(&chrome, &"storage".into())?;
        Ok(Reflect::get(&storage, &"local".into())?.unchecked_into())
    }

    async fn invoke(area: &Object, method: &str, arg: &JsValue) -> Result<JsValue, JsValue> {
        let func: Function = Reflect::get(area, &method.into())?.dyn_into()?;
        let promise: Promise = func.call1(area, arg)?.dyn_into()?;
        JsFuture::from(promise).await
    }

    fn legacy_store() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }

    fn now_ms() -> u64 {
        js_sys::Date::now() as u64
    }

    /// Read the configuration, migrating legacy settings on the way.
    pub async fn load() -> Option<ProviderConfig> {
        match try_load().await {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(?err, "settings read failed");
                None
            }
        }
    }

    async fn try_load() -> Result<Option<ProviderConfig>, JsValue> {
        let area = storage_area()?;
        let result = invoke(&area, "get", &JsValue::from_str(STORAGE_KEY)).await?;
        let value = Reflect::get(&result, &STORAGE_KEY.into())?;
        let current = if value.is_undefined() || value.is_null() {
            None
        } else {
            JSON::stringify(&value)?.as_string()
        };

        let legacy = match current {
            Some(_) => None,
            None => legacy_store().and_then(|s| s.get_item(LEGACY_KEY).ok().flatten()),
        };

        let loaded = resolve(current.as_deref(), legacy.as_deref(), now_ms());
        if let Some(stored) = &loaded.migrate {
            write(&area, stored).await?;
            if let Some(store) = legacy_store() {
                let _ = store.remove_item(LEGACY_KEY);
            }
        }
        Ok(loaded.config)
    }

    async fn write(area: &Object, stored: &StoredSettings) -> Result<(), JsValue> {
        let json = stored
            .to_json()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let record = Object::new();
        Reflect::set(&record, &STORAGE_KEY.into(), &JSON::parse(&json)?)?;
        invoke(area, "set", &record).await?;
        Ok(())
    }

    /// Persist a validated configuration. Failures are logged only; the
    /// session keeps working with the in-memory copy.
    pub async fn save(config: ProviderConfig) {
        let stored = StoredSettings::seal(&config, now_ms());
        let outcome = match storage_area() {
            Ok(area) => write(&area, &stored).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => tracing::debug!(provider = %config.provider, "settings saved"),
            Err(err) => tracing::warn!(?err, "settings write failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::ProviderKind;
    use pretty_assertions::assert_eq;

    const CURRENT: &str =
        r#"{"provider":"gemini","apiKey":"QUl6YVN5RC12YWxpZF9rZXlfMDEyMzQ1Njc4OQ==","isConfigured":true,"lastUpdated":1}"#;
    const LEGACY: &str =
        r#"{"provider":"openai","apiKey":"sk-test-credential-0000","isConfigured":true}"#;

    #[test]
    fn current_record_wins_over_legacy() {
        let loaded = resolve(Some(CURRENT), Some(LEGACY), 5);
        let config = loaded.config.unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.credential, "AIzaSyD-valid_key_0123456789");
        assert_eq!(loaded.migrate, None);
    }

    #[test]
    fn legacy_record_is_sealed_for_migration() {
        let loaded = resolve(None, Some(LEGACY), 42);
        assert_eq!(
            loaded.config.as_ref().map(|c| c.credential.as_str()),
            Some("sk-test-credential-0000")
        );
        let migrated = loaded.migrate.unwrap();
        assert_eq!(migrated.last_updated, Some(42));
        assert_ne!(migrated.api_key, "sk-test-credential-0000");
        assert_eq!(migrated.unseal().credential, "sk-test-credential-0000");
    }

    #[test]
    fn nothing_stored_means_unconfigured() {
        assert_eq!(resolve(None, None, 0), Loaded::default());
    }

    #[test]
    fn unreadable_records_mean_unconfigured() {
        assert_eq!(resolve(Some("{"), Some(LEGACY), 0), Loaded::default());
        assert_eq!(resolve(None, Some("[]"), 0), Loaded::default());
    }
}
