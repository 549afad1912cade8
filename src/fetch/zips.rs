use futures_util::StreamExt;
use reqwest::Client;
use std::future::Future;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// Download the archive at `address` into memory.
pub async fn fetch_zip(client: &Client, address: &str) -> Result<Vec<u8>, FetchError> {
    let url = Url::parse(address)?;
    let resp = client.get(url.as_str()).send().await?;
    if !resp.status().is_success() {
        return Err(FetchError::Status(resp.status().as_u16()));
    }

    let mut data = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        data.extend_from_slice(&chunk);

        // Log progress every 10MB
        if data.len() % (10 * 1024 * 1024) < chunk.len() {
            debug!("Downloaded {} MB", data.len() / (1024 * 1024));
        }
    }

    debug!(%address, bytes = data.len(), "download complete");
    Ok(data)
}

/// Like [`fetch_zip`], abandoning the transfer as soon as `cancel` resolves.
pub async fn fetch_zip_cancellable<C>(
    client: &Client,
    address: &str,
    cancel: C,
) -> Result<Vec<u8>, FetchError>
where
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = cancel => {
            warn!(%address, "download cancelled");
            Err(FetchError::Cancelled)
        }
        res = fetch_zip(client, address) => res,
    }
}
