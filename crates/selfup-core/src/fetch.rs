//! Byte-stream fetching for manifests and update payloads.
//!
//! The updater talks to a [`Fetcher`] rather than to an HTTP client directly,
//! so hosts can route requests through their own transport and tests can
//! script responses with [`SequencedFetcher`].

use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::debug;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::UpdateError;

/// Readable body of a fetched resource.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch capability consumed by the updater.
///
/// Implementations return `Ok(Some(stream))` with the response body or an
/// error. `Ok(None)` means the transport produced neither; the updater
/// reports it as [`UpdateError::EmptyResponse`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<ByteStream>, UpdateError>;
}

/// Wrap an in-memory body as a [`ByteStream`].
pub fn byte_stream(body: impl Into<Vec<u8>>) -> ByteStream {
    Box::pin(std::io::Cursor::new(body.into()))
}

/// Default [`Fetcher`] performing plain HTTP(S) GET requests.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the default timeouts.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, UpdateError> {
        Self::with_timeouts(DEFAULT_READ_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Build a fetcher with explicit read and connect timeouts.
    ///
    /// `read_timeout` bounds each wait for more bytes, not the whole
    /// transfer, so large payloads may take as long as they keep flowing.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_timeouts(
        read_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .read_timeout(read_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(format!("selfup/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpdateError::ClientBuild)?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<ByteStream>, UpdateError> {
        debug!("GET {url}");
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| UpdateError::Request {
                    url: url.to_string(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Some(Box::pin(StreamReader::new(body))))
    }
}

type Responder = Box<dyn FnOnce(&str) -> Result<Option<ByteStream>, UpdateError> + Send>;

#[derive(Default)]
struct Sequence {
    responders: Vec<Option<Responder>>,
    cursor: usize,
    requests: Vec<String>,
}

/// Scripted [`Fetcher`] that answers calls with queued responders in order.
///
/// Every call is recorded and consumes the next responder. Calls past the end
/// of the queue fail with an error naming the request index.
#[derive(Default)]
pub struct SequencedFetcher {
    sequence: Mutex<Sequence>,
}

impl SequencedFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond_with<F>(self, responder: F) -> Self
    where
        F: FnOnce(&str) -> Result<Option<ByteStream>, UpdateError> + Send + 'static,
    {
        self.lock().responders.push(Some(Box::new(responder)));
        self
    }

    #[must_use]
    pub fn respond_bytes(self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.respond_with(move |_| Ok(Some(byte_stream(body))))
    }

    #[must_use]
    pub fn respond_error(self, details: impl Into<String>) -> Self {
        let details = details.into();
        self.respond_with(move |url| Err(UpdateError::fetch(url, details)))
    }

    #[must_use]
    pub fn respond_empty(self) -> Self {
        self.respond_with(|_| Ok(None))
    }

    /// URLs requested so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Number of responders not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let sequence = self.lock();
        sequence.responders.len().saturating_sub(sequence.cursor)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sequence> {
        self.sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Fetcher for SequencedFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<ByteStream>, UpdateError> {
        let responder = {
            let mut sequence = self.lock();
            sequence.requests.push(url.to_string());
            let index = sequence.cursor;
            sequence.cursor += 1;
            sequence.responders.get_mut(index).and_then(Option::take)
        };

        match responder {
            Some(responder) => responder(url),
            None => Err(UpdateError::fetch(
                url,
                format!("no scripted response for request #{}", self.lock().cursor),
            )),
        }
    }
}
