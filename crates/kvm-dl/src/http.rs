use std::{io::Read, time::Duration};

use tracing::debug;
use ureq::http::header::CONTENT_LENGTH;

use crate::{error::DownloadError, http_client::SHARED_AGENT};

/// A successful (2xx) response whose body has not been read yet.
pub struct FetchResponse {
    pub content_length: Option<u64>,
    pub body: Box<dyn Read>,
}

impl FetchResponse {
    pub fn new(content_length: Option<u64>, body: impl Read + 'static) -> Self {
        Self {
            content_length,
            body: Box::new(body),
        }
    }
}

/// Blocking GET transport used by the release index and the fetch pipeline.
///
/// Implementations make exactly one attempt per call and return an error for transport failures,
/// timeouts, and non-2xx statuses.
pub trait HttpFetch {
    fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError>;

    /// Fetches `url` and reads the whole body as UTF-8 text.
    fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        let mut resp = self.fetch(url)?;
        let mut bytes = Vec::new();
        resp.body.read_to_end(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| {
            DownloadError::InvalidResponse {
                url: url.to_string(),
            }
        })
    }
}

impl<T: HttpFetch + ?Sized> HttpFetch for &T {
    fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        (**self).fetch(url)
    }
}

/// [`HttpFetch`] over the shared `ureq` agent.
#[derive(Clone, Debug, Default)]
pub struct Http {
    timeout: Option<Duration>,
}

impl Http {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the agent-wide timeout for every request made through this transport.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.or_else(|| SHARED_AGENT.timeout())
    }
}

impl HttpFetch for Http {
    fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        debug!("GET {}", url);

        let mut req = SHARED_AGENT.get(url);
        if let Some(timeout) = self.timeout {
            req = req.config().timeout_global(Some(timeout)).build();
        }

        let resp = req.call().map_err(|err| DownloadError::from_ureq(url, err))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|h| h.to_str().ok())
            .and_then(|len| len.parse::<u64>().ok());

        Ok(FetchResponse::new(
            content_length,
            resp.into_body().into_reader(),
        ))
    }
}
