//! Fetching raw resource bytes by URI.
//!
//! Loaders block and must be called from worker threads, never from the
//! owning thread. `HttpLoader` uses reqwest's blocking client, which is only
//! valid on blocking threads, not inside async tasks.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The resource could not be opened: missing file, unreachable host,
    /// not-found response.
    Open(String),
    /// Anything else: read errors, unexpected responses.
    Other(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Open(msg) => write!(f, "failed to open resource: {msg}"),
            LoadError::Other(msg) => write!(f, "failed to load resource: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

pub trait ResourceLoader: Send + Sync {
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError>;
}

/// Local files, addressed either by plain path or `file://` URI.
#[derive(Debug, Default, Copy, Clone)]
pub struct FileLoader;

impl ResourceLoader for FileLoader {
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError> {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        std::fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                LoadError::Open(format!("{}: {err}", path.display()))
            }
            _ => LoadError::Other(format!("{}: {err}", path.display())),
        })
    }
}

pub struct HttpLoader {
    client: reqwest::blocking::Client,
}

impl HttpLoader {
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Other(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

impl ResourceLoader for HttpLoader {
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError> {
        let resp = self.client.get(uri).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                LoadError::Open(format!("{uri}: {e}"))
            } else {
                LoadError::Other(format!("{uri}: {e}"))
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::GONE
            || status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(LoadError::Open(format!("{uri}: HTTP {status}")));
        }
        if !status.is_success() {
            return Err(LoadError::Other(format!("{uri}: HTTP {status}")));
        }

        let bytes = resp
            .bytes()
            .map_err(|e| LoadError::Other(format!("{uri}: {e}")))?;
        debug!(uri, len = bytes.len(), "http resource fetched");
        Ok(bytes.to_vec())
    }
}

/// Dispatches on the URI scheme: `http(s)://` goes to the network, everything
/// else is treated as a local path.
pub struct UriLoader {
    file: FileLoader,
    http: Option<HttpLoader>,
}

impl UriLoader {
    pub fn new(http: Option<HttpLoader>) -> Self {
        Self {
            file: FileLoader,
            http,
        }
    }

    pub fn files_only() -> Self {
        Self::new(None)
    }
}

pub fn is_remote_uri(uri: &str) -> bool {
    let lower = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl ResourceLoader for UriLoader {
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError> {
        if is_remote_uri(uri) {
            match &self.http {
                Some(http) => http.load(uri),
                None => Err(LoadError::Open(format!("{uri}: network loading disabled"))),
            }
        } else {
            self.file.load(uri)
        }
    }
}
