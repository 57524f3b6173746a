//! Remote file access for URL inputs.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::RANGE;
use tracing::debug;

use crate::error::{FetchError, FetchResult};

/// Result of reading the first byte of a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// At least one byte came back.
    Readable,
    /// The server answered but returned no data; carries the transport
    /// diagnostic when there is one.
    Empty(Option<String>),
}

/// HTTP access used when a URL cannot be opened in place.
pub trait Fetcher: Send + Sync {
    /// Read the first byte of `url`. `Err` means the URL is unreachable.
    fn probe(&self, url: &str) -> FetchResult<Probe>;

    /// Download the whole resource, whatever the HTTP status.
    fn download(&self, url: &str) -> FetchResult<Vec<u8>>;
}

/// Blocking reqwest client.
///
/// A client is built per call so no reqwest runtime outlives the blocking
/// thread that used it.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self) -> FetchResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(FetchError::Client)
    }
}

impl Fetcher for HttpFetcher {
    fn probe(&self, url: &str) -> FetchResult<Probe> {
        let mut response = self
            .client()?
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .map_err(|source| FetchError::Unreachable {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        debug!(url, %status, "probed remote file");
        if !status.is_success() {
            return Ok(Probe::Empty(Some(format!(
                "HTTP response code: {}",
                status.as_u16()
            ))));
        }

        // Servers may ignore the range; never read past the first byte.
        let mut first = [0u8; 1];
        match response.read(&mut first) {
            Ok(0) => Ok(Probe::Empty(None)),
            Ok(_) => Ok(Probe::Readable),
            Err(e) => Ok(Probe::Empty(Some(e.to_string()))),
        }
    }

    fn download(&self, url: &str) -> FetchResult<Vec<u8>> {
        let unreachable = |source| FetchError::Unreachable {
            url: url.to_string(),
            source,
        };
        let response = self.client()?.get(url).send().map_err(unreachable)?;
        debug!(url, status = %response.status(), "downloading remote file");
        let bytes = response.bytes().map_err(unreachable)?;
        Ok(bytes.to_vec())
    }
}
