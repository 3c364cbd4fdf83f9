use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    #[diagnostic(
        code(kvm_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(kvm_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("Request timed out: {url}")]
    #[diagnostic(
        code(kvm_dl::timeout),
        help("Increase `http_timeout` in the config file or check your connection")
    )]
    Timeout { url: String },

    #[error(transparent)]
    #[diagnostic(code(kvm_dl::io))]
    Io(#[from] std::io::Error),

    #[error("Invalid response from server: {url}")]
    #[diagnostic(code(kvm_dl::invalid_response))]
    InvalidResponse { url: String },
}

impl DownloadError {
    /// Maps a `ureq` failure for `url` onto the matching variant.
    ///
    /// `ureq` reports non-2xx statuses as errors, so they become [`DownloadError::HttpError`].
    pub fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => {
                Self::HttpError {
                    status,
                    url: url.to_string(),
                }
            }
            ureq::Error::Timeout(_) => {
                Self::Timeout {
                    url: url.to_string(),
                }
            }
            other => Self::Network(Box::new(other)),
        }
    }
}

impl From<ureq::Error> for DownloadError {
    /// Converts a `ureq::Error` into a `DownloadError::Network` variant.
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_error() {
        let err = DownloadError::HttpError {
            status: 404,
            url: "https://example.com/notfound".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("HTTP 404"));
        assert!(msg.contains("https://example.com/notfound"));
    }

    #[test]
    fn test_download_error_timeout() {
        let err = DownloadError::Timeout {
            url: "https://cdn.dl.k8s.io/release/stable.txt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request timed out: https://cdn.dl.k8s.io/release/stable.txt"
        );
    }

    #[test]
    fn test_download_error_invalid_response() {
        let err = DownloadError::InvalidResponse {
            url: "https://example.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid response from server: https://example.com"
        );
    }

    #[test]
    fn test_from_ureq_status_code() {
        let err = DownloadError::from_ureq("https://example.com", ureq::Error::StatusCode(401));
        assert!(matches!(
            err,
            DownloadError::HttpError { status: 401, ref url } if url == "https://example.com"
        ));
    }

    #[test]
    fn test_from_ureq_connection_failed() {
        let err = DownloadError::from_ureq("https://example.com", ureq::Error::ConnectionFailed);
        assert!(matches!(err, DownloadError::Network(_)));
    }

    #[test]
    fn test_from_ureq_error() {
        let download_err: DownloadError = ureq::Error::ConnectionFailed.into();
        assert!(matches!(download_err, DownloadError::Network(_)));
    }

    #[test]
    fn test_from_ureq_timeout() {
        let err = DownloadError::from_ureq(
            "https://cdn.dl.k8s.io/release/stable.txt",
            ureq::Error::Timeout(ureq::Timeout::Global),
        );
        assert!(matches!(
            err,
            DownloadError::Timeout { ref url } if url == "https://cdn.dl.k8s.io/release/stable.txt"
        ));
    }

    #[test]
    fn test_io_error_is_transparent() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DownloadError::Io(io_err);
        assert_eq!(err.to_string(), "file not found");
        assert!(std::error::Error::source(&err).is_none());
    }
}
