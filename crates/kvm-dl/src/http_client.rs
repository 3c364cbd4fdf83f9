use std::{
    sync::{Arc, LazyLock, RwLock},
    time::Duration,
};

use ureq::{
    http::{self, HeaderMap, Uri},
    typestate::WithoutBody,
    Agent, Proxy, RequestBuilder,
};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub headers: Option<HeaderMap>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    /// Creates a default ClientConfig with a `kvm/<version>` user agent and a 60 second timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use kvm_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert!(cfg.user_agent.as_deref().unwrap().starts_with("kvm/"));
    /// assert!(cfg.proxy.is_none());
    /// assert!(cfg.headers.is_none());
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some(concat!("kvm/", env!("CARGO_PKG_VERSION")).into()),
            proxy: None,
            headers: None,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl ClientConfig {
    /// Builds an HTTP `Agent` configured from this `ClientConfig`.
    ///
    /// The returned `Agent` will incorporate the configured proxy, global timeout,
    /// and user agent header (if present).
    pub fn build(&self) -> Agent {
        let mut config = ureq::Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

struct SharedClient {
    agent: Agent,
    config: ClientConfig,
}

static SHARED_CLIENT_STATE: LazyLock<Arc<RwLock<SharedClient>>> = LazyLock::new(|| {
    let config = ClientConfig::default();
    let agent = config.build();

    Arc::new(RwLock::new(SharedClient {
        agent,
        config,
    }))
});

#[derive(Clone, Default)]
pub struct SharedAgent;

impl SharedAgent {
    pub fn new() -> Self {
        Self
    }

    /// Create a GET request builder for the given URI using the shared agent.
    ///
    /// Any global headers configured in the shared client are applied to the request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kvm_dl::http_client::SHARED_AGENT;
    ///
    /// let response = SHARED_AGENT.get("https://cdn.dl.k8s.io/release/stable.txt").call();
    /// ```
    pub fn get<T>(&self, uri: T) -> RequestBuilder<WithoutBody>
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        let state = SHARED_CLIENT_STATE
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let req = state.agent.get(uri);
        apply_headers(req, &state.config.headers)
    }

    /// Returns the timeout the shared agent is currently configured with.
    pub fn timeout(&self) -> Option<Duration> {
        SHARED_CLIENT_STATE
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .config
            .timeout
    }
}

/// Apply headers from an optional `HeaderMap` to a `RequestBuilder`.
fn apply_headers<B>(mut req: RequestBuilder<B>, headers: &Option<HeaderMap>) -> RequestBuilder<B> {
    if let Some(headers) = headers {
        for (key, value) in headers.iter() {
            req = req.header(key, value);
        }
    }
    req
}

pub static SHARED_AGENT: LazyLock<SharedAgent> = LazyLock::new(SharedAgent::new);

/// Updates the global shared HTTP client configuration by applying the provided updater and rebuilding the shared Agent.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use kvm_dl::http_client::configure_http_client;
///
/// configure_http_client(|cfg| {
///     cfg.user_agent = Some("my-app/1.0".to_string());
///     cfg.timeout = Some(Duration::from_secs(10));
/// });
/// ```
pub fn configure_http_client<F>(updater: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut state = SHARED_CLIENT_STATE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut new_config = state.config.clone();
    updater(&mut new_config);
    let new_agent = new_config.build();
    state.agent = new_agent;
    state.config = new_config;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(
            config.user_agent,
            Some(format!("kvm/{}", env!("CARGO_PKG_VERSION")))
        );
        assert!(config.proxy.is_none());
        assert!(config.headers.is_none());
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn test_client_config_build_with_timeout() {
        let config = ClientConfig {
            user_agent: Some("test-agent".to_string()),
            proxy: None,
            headers: None,
            timeout: Some(Duration::from_secs(30)),
        };
        let _ = config.build();
    }

    #[test]
    fn test_shared_agent_get() {
        let agent = SharedAgent::new();
        let _ = agent.get("https://example.com");
    }

    #[test]
    fn test_configure_http_client_timeout() {
        configure_http_client(|cfg| {
            cfg.timeout = Some(Duration::from_secs(10));
        });
        assert_eq!(SHARED_AGENT.timeout(), Some(Duration::from_secs(10)));

        configure_http_client(|cfg| {
            cfg.timeout = Some(DEFAULT_TIMEOUT);
        });
    }

    #[test]
    fn test_apply_headers_some() {
        let agent: ureq::Agent = ureq::Agent::config_builder().build().into();
        let req = agent.get("https://example.com");

        let mut headers = ureq::http::HeaderMap::new();
        headers.insert(
            ureq::http::header::USER_AGENT,
            ureq::http::HeaderValue::from_static("test-agent"),
        );

        let _ = apply_headers(req, &Some(headers));
    }
}
