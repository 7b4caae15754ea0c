#![forbid(unsafe_code)]

//! Outbound endpoint allowlist.

use url::Url;

/// Hosts outbound calls may reach.
pub const ALLOWED_HOSTS: [&str; 2] = ["api.openai.com", "generativelanguage.googleapis.com"];

/// Whether `raw` is an HTTPS URL on one of [`ALLOWED_HOSTS`].
#[must_use]
pub fn is_allowed_endpoint(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    url.scheme() == "https"
        && url
            .host_str()
            .is_some_and(|host| ALLOWED_HOSTS.contains(&host))
}
