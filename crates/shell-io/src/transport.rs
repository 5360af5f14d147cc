//! Navigation fetches over HTTP.
//!
//! Requests are fire-and-forget: each navigable request runs on its own
//! worker thread and its result becomes available on a later call to
//! [`Transport::poll`]. Nothing here blocks the caller's event loop.

use std::{
    sync::mpsc::{self, Receiver, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use reqwest::header::{HeaderName, HeaderValue};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Result, TransportError};
use crate::protocol::{RequestMethod, ShellRequest, ShellResponse, decode_response};

/// Result of one request, tagged with the id it was issued under.
#[derive(Debug)]
pub struct TransportCompletion {
    pub request_id: u64,
    pub result: Result<ShellResponse>,
}

/// A non-blocking source of navigation responses.
pub trait Transport {
    /// Start a request. The outcome is reported by a later [`Transport::poll`].
    fn request(&mut self, request: ShellRequest);

    /// Collect every completion that is ready, without waiting.
    fn poll(&mut self) -> Vec<TransportCompletion>;

    /// True if there are outstanding requests waiting to complete.
    fn has_pending(&self) -> bool;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Origin of the admin; relative URLs resolve against it.
    pub base_url: Url,
    /// Path prefix of navigable URLs, e.g. `/admin/`.
    pub admin_root: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Header (name, value) marking a request as a shell navigation.
    pub request_marker: (String, String),
    /// Response header the server sets on shell responses.
    pub status_header: String,
}

impl TransportOptions {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            admin_root: "/admin/".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "AdminShell/0.1".to_string(),
            request_marker: ("X-Requested-With".to_string(), "WagtailShell".to_string()),
            status_header: "X-WagtailShellStatus".to_string(),
        }
    }

    pub fn is_navigable(&self, url: &str) -> bool {
        self.navigable_url(url).is_some()
    }

    /// Resolve `url` and return it if it addresses a shell page: same origin
    /// as the admin and under the admin root.
    pub fn navigable_url(&self, url: &str) -> Option<Url> {
        let resolved = self.base_url.join(url).ok()?;
        if resolved.origin() != self.base_url.origin() {
            return None;
        }
        resolved
            .path()
            .starts_with(self.admin_root.as_str())
            .then_some(resolved)
    }
}

struct PendingFetch {
    request_id: u64,
    receiver: Receiver<Result<ShellResponse>>,
    join: Option<JoinHandle<()>>,
}

/// Fetches navigation responses using a worker thread per request.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    options: TransportOptions,
    marker_name: HeaderName,
    marker_value: HeaderValue,
    pending: Vec<PendingFetch>,
    ready: Vec<TransportCompletion>,
}

impl HttpTransport {
    pub fn new(options: TransportOptions) -> Result<Self> {
        // Navigable URLs share the base origin, so this covers every fetch.
        let scheme = options.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(TransportError::UnsupportedScheme(scheme.to_string()));
        }
        let marker_name = HeaderName::from_bytes(options.request_marker.0.as_bytes())
            .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
        let marker_value = HeaderValue::from_str(&options.request_marker.1)
            .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
        let client = reqwest::blocking::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            client,
            options,
            marker_name,
            marker_value,
            pending: Vec::new(),
            ready: Vec::new(),
        })
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn resolve_now(&mut self, request_id: u64, result: Result<ShellResponse>) {
        self.ready.push(TransportCompletion { request_id, result });
    }
}

impl Transport for HttpTransport {
    fn request(&mut self, request: ShellRequest) {
        let Some(url) = self.options.navigable_url(&request.url) else {
            debug!(url = %request.url, "not a shell url, loading externally");
            self.resolve_now(request.id, Ok(ShellResponse::LoadExternally));
            return;
        };

        let (tx, rx) = mpsc::channel();
        let client = self.client.clone();
        let marker_name = self.marker_name.clone();
        let marker_value = self.marker_value.clone();
        let status_header = self.options.status_header.clone();
        let timeout_ms = self.options.timeout.as_millis() as u64;
        let request_id = request.id;

        trace!(request_id, %url, "dispatching navigation fetch");
        let join = thread::spawn(move || {
            let display_url = url.to_string();
            let builder = match request.method {
                RequestMethod::Get => client.get(url),
                RequestMethod::Post { fields } => client.post(url).form(&fields),
            };
            let result = match builder.header(marker_name, marker_value).send() {
                Ok(resp) => {
                    let has_marker = resp.headers().contains_key(status_header.as_str());
                    match resp.text() {
                        Ok(body) => decode_response(&display_url, has_marker, &body),
                        Err(err) => Err(map_reqwest_error(err, timeout_ms)),
                    }
                }
                Err(err) => Err(map_reqwest_error(err, timeout_ms)),
            };
            let _ = tx.send(result);
        });

        self.pending.push(PendingFetch {
            request_id,
            receiver: rx,
            join: Some(join),
        });
    }

    fn poll(&mut self) -> Vec<TransportCompletion> {
        let mut ready = std::mem::take(&mut self.ready);
        let mut still = Vec::new();
        for mut pending in self.pending.drain(..) {
            match pending.receiver.try_recv() {
                Ok(result) => {
                    if let Some(j) = pending.join.take() {
                        let _ = j.join();
                    }
                    ready.push(TransportCompletion {
                        request_id: pending.request_id,
                        result,
                    });
                }
                Err(TryRecvError::Empty) => still.push(pending),
                Err(TryRecvError::Disconnected) => {
                    if let Some(j) = pending.join.take() {
                        let _ = j.join();
                    }
                    ready.push(TransportCompletion {
                        request_id: pending.request_id,
                        result: Err(TransportError::Disconnected),
                    });
                }
            }
        }
        self.pending = still;
        ready
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.ready.is_empty()
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout_ms: u64) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout_ms)
    } else {
        TransportError::Http(err.to_string())
    }
}
