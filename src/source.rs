use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::campaign::{decode_payload, Campaign};

/// Result of one fetch: `None` when the endpoint answered with a falsy body.
pub type FetchResult = Result<Option<Vec<Campaign>>, FetchError>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint answered with HTTP {0}")]
    Status(u16),
    #[error("could not read campaign file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed campaign payload: {0}")]
    Decode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

/// Where campaign snapshots come from.
pub trait DataSource: Send + Sync {
    /// Human readable location, for the header and logs.
    fn describe(&self) -> String;
    fn fetch(&self) -> FetchResult;
}

/// Polls an HTTP(S) endpoint.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl DataSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> FetchResult {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text()?;
        Ok(decode_payload(&body)?)
    }
}

/// Re-reads a local JSON file holding an endpoint response.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> FetchResult {
        let body = std::fs::read_to_string(&self.path)?;
        Ok(decode_payload(&body)?)
    }
}

/// Pick a source for `url`: `http(s)://` goes over the network, `file://`
/// URLs and plain paths are read from disk.
pub fn source_for(url: &str, timeout: Option<Duration>) -> Result<Arc<dyn DataSource>, FetchError> {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(url, timeout)?))
    } else if let Some(path) = url.strip_prefix("file://") {
        Ok(Arc::new(FileSource::new(path)))
    } else {
        Ok(Arc::new(FileSource::new(url)))
    }
}

// ---------------------------------------------------------------------------
// Background fetches
// ---------------------------------------------------------------------------

/// Completion of one background fetch.
pub struct FetchEvent {
    /// Sequence number assigned when the fetch was started.
    pub request: u64,
    pub elapsed: Duration,
    pub result: FetchResult,
}

/// Most fetches allowed to be outstanding at once. Without a timeout a hung
/// endpoint would otherwise leave one blocked thread behind per refresh.
pub const MAX_IN_FLIGHT: usize = 4;

/// Runs fetches off the UI thread and reports completions over a channel.
///
/// Every call to [`Poller::spawn_fetch`] starts an independent fetch. Nothing
/// cancels or orders them: completions are delivered in whatever order they
/// finish.
pub struct Poller {
    source: Arc<dyn DataSource>,
    tx: mpsc::Sender<FetchEvent>,
    next_request: u64,
    in_flight: Arc<AtomicUsize>,
}

impl Poller {
    pub fn new(source: Arc<dyn DataSource>) -> (Self, mpsc::Receiver<FetchEvent>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                source,
                tx,
                next_request: 0,
                in_flight: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Fetch on the calling thread.
    pub fn fetch_now(&self) -> FetchResult {
        self.source.fetch()
    }

    /// Fetches started but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start a fetch on a new thread and return its request number.
    ///
    /// Returns `None`, skipping this refresh, while [`MAX_IN_FLIGHT`] fetches
    /// are still running.
    pub fn spawn_fetch(&mut self) -> Option<u64> {
        let outstanding = self.in_flight();
        if outstanding >= MAX_IN_FLIGHT {
            tracing::warn!(
                outstanding,
                source = %self.source.describe(),
                "Earlier fetches have not finished, skipping this refresh"
            );
            return None;
        }

        self.next_request += 1;
        let request = self.next_request;
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let in_flight = Arc::clone(&self.in_flight);

        tracing::debug!(request, outstanding, source = %source.describe(), "Starting fetch");

        in_flight.fetch_add(1, Ordering::SeqCst);
        let spawned = std::thread::Builder::new()
            .name(format!("sovwatch-fetch-{}", request))
            .spawn(move || {
                let started = Instant::now();
                let result = source.fetch();
                in_flight.fetch_sub(1, Ordering::SeqCst);
                // The receiver is gone once the UI has shut down.
                let _ = tx.send(FetchEvent {
                    request,
                    elapsed: started.elapsed(),
                    result,
                });
            });

        if let Err(e) = spawned {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(request, error = %e, "Could not start fetch thread");
        }

        Some(request)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
