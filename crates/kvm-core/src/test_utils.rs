use std::{cell::RefCell, collections::HashMap, io::Cursor};

use kvm_dl::{
    error::DownloadError,
    http::{FetchResponse, HttpFetch},
};

enum Route {
    Body(Vec<u8>),
    Status(u16),
}

/// In-memory [`HttpFetch`] that serves canned responses and records every requested URL.
///
/// Unrouted URLs answer with HTTP 404.
#[derive(Default)]
pub struct MockHttp {
    routes: HashMap<String, Route>,
    requests: RefCell<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(url.to_string(), Route::Body(body.into()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(url.to_string(), Route::Status(status));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }
}

impl HttpFetch for MockHttp {
    fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        self.requests.borrow_mut().push(url.to_string());

        match self.routes.get(url) {
            Some(Route::Body(body)) => {
                Ok(FetchResponse::new(
                    Some(body.len() as u64),
                    Cursor::new(body.clone()),
                ))
            }
            Some(Route::Status(status)) => {
                Err(DownloadError::HttpError {
                    status: *status,
                    url: url.to_string(),
                })
            }
            None => {
                Err(DownloadError::HttpError {
                    status: 404,
                    url: url.to_string(),
                })
            }
        }
    }
}
