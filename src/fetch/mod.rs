// src/fetch/mod.rs

use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

pub mod zips;

/// Retrieves raw archive bytes from a remote address.
pub trait Fetcher {
    fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError>,
{
    fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        self(address)
    }
}

/// Blocking HTTP(S) fetcher. Must not be constructed inside a tokio runtime;
/// async callers go through [`zips::fetch_zip`] instead.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        let url = Url::parse(address)?;
        debug!(%url, "fetching archive");
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let bytes = resp.bytes()?;
        debug!(%address, bytes = bytes.len(), "fetch complete");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_addresses_before_any_request() {
        let fetcher = HttpFetcher::new();
        assert!(matches!(
            fetcher.fetch("not a url"),
            Err(FetchError::InvalidAddress(_))
        ));
    }

    #[test]
    fn closures_are_fetchers() {
        let f = |addr: &str| -> Result<Vec<u8>, FetchError> { Ok(addr.as_bytes().to_vec()) };
        assert_eq!(f.fetch("abc").unwrap(), b"abc");
    }
}
