use std::io::{Read as _, Write};

use tracing::debug;

use crate::{error::DownloadError, http::HttpFetch, types::Progress};

const CHUNK_SIZE: usize = 8192;

pub struct Download {
    pub url: String,
    pub on_progress: Option<Box<dyn Fn(Progress)>>,
}

impl Download {
    /// Creates a new `Download` for the given URL with no progress callback.
    ///
    /// # Examples
    ///
    /// ```
    /// use kvm_dl::download::Download;
    ///
    /// let dl = Download::new("https://cdn.dl.k8s.io/release/v1.30.1/bin/linux/amd64/kubectl");
    /// assert!(dl.on_progress.is_none());
    /// ```
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            on_progress: None,
        }
    }

    /// Registers a progress callback that will be invoked with `Progress` events during the download lifecycle.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kvm_dl::download::Download;
    /// use kvm_dl::types::Progress;
    ///
    /// let _dl = Download::new("https://example.com/file")
    ///     .progress(|event: Progress| match event {
    ///         Progress::Starting { total } => eprintln!("starting, total={}", total),
    ///         Progress::Chunk { current, total } => eprintln!("{}/{}", current, total),
    ///         Progress::Complete { total } => eprintln!("complete, total={}", total),
    ///     });
    /// ```
    pub fn progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(Progress) + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Streams the response body for this download's URL into `sink`.
    ///
    /// The body is read in fixed-size chunks and each chunk is forwarded to `sink` before the next
    /// one is requested, so the caller decides whether bytes are buffered, hashed, or written out.
    ///
    /// # Returns
    ///
    /// The number of bytes written to `sink`.
    pub fn execute<H, W>(&self, http: &H, sink: &mut W) -> Result<u64, DownloadError>
    where
        H: HttpFetch + ?Sized,
        W: Write,
    {
        debug!("Downloading {}", self.url);

        let resp = http.fetch(&self.url)?;
        let total = resp.content_length.unwrap_or(0);
        self.emit(Progress::Starting {
            total,
        });

        let mut reader = resp.body;
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut downloaded = 0u64;

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }

            sink.write_all(&buffer[..n])?;
            downloaded += n as u64;

            self.emit(Progress::Chunk {
                current: downloaded,
                total,
            });
        }
        sink.flush()?;

        self.emit(Progress::Complete {
            total: downloaded,
        });

        Ok(downloaded)
    }

    fn emit(&self, event: Progress) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }
}
