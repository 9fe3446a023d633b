//! HTTP client construction shared by the providers and the content fetcher.

use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("quarry/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// Build a rustls client with the given request timeout and user agent.
///
/// Falls back to reqwest's default client if the builder is rejected, so a
/// caller always gets something usable.
#[must_use]
pub fn build_client(timeout: Duration, user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("custom HTTP client rejected, using defaults: {e}");
            reqwest::Client::default()
        })
}

/// Client for provider APIs: 120s request timeout, `quarry/{version}` agent.
#[must_use]
pub fn default_client() -> reqwest::Client {
    build_client(Duration::from_secs(120), DEFAULT_USER_AGENT)
}
