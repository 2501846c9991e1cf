//! A blocking HTTP fetcher.

use std::str::FromStr;

use bytes::Bytes;
use reqwest::StatusCode;
use url::Url;

use crate::engine::{EngineError, Fetcher};

/// A [`Fetcher`] that retrieves href content with a blocking HTTP client.
///
/// Used to fetch reference-file content before virtualized opening.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, href: &str) -> Result<Bytes, EngineError> {
        let url = Url::from_str(href)?;
        let response = self.client.get(url).send()?;
        match response.status() {
            StatusCode::OK => Ok(response.bytes()?),
            status => Err(EngineError::from(format!(
                "http unexpected status code {status} fetching {href}"
            ))),
        }
    }
}
