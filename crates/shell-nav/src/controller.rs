//! Navigation controller: sequencing of in-flight fetches and frame swaps.
//!
//! Every navigation gets a sequence id when it is dispatched. Completions can
//! arrive in any order; one whose id is lower than the last accepted id has
//! been superseded and is dropped, so the most recent navigation always wins.
//!
//! An accepted page becomes the *next* frame. It stays hidden until the
//! renderer reports it loaded through [`NavigationController::on_load_next_frame`],
//! which is the only way the current frame ever changes.

use std::collections::HashMap;
use std::sync::Arc;

use shell_io::{RequestMethod, ShellRequest, ShellResponse, Transport, TransportCompletion};

use crate::frame::{ErrorFrame, ErrorKind, Frame, FrameId};
use crate::history::BrowserHost;

/// One dispatched fetch awaiting its completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub sequence_id: u64,
    pub url: String,
    pub push_history: bool,
    pub method: RequestMethod,
}

/// The state change that triggered a listener call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A page was accepted and is waiting to be painted.
    NextFrameReady(FrameId),
    /// The pending frame finished loading and is now current.
    FramePromoted(FrameId),
    /// An error frame is shown over the current frame.
    ErrorShown(FrameId),
    /// The shell handed the window to a full page load.
    LoadedExternally(String),
}

/// Read-only view of the controller handed to listeners.
#[derive(Debug, Clone)]
pub struct NavigationSnapshot {
    pub transition: Transition,
    pub current_frame: Arc<Frame>,
    pub next_frame: Option<Arc<Frame>>,
    pub error_frame: Option<Arc<ErrorFrame>>,
}

type NavigationListener = Box<dyn FnMut(&NavigationSnapshot)>;

pub struct NavigationController<T: Transport, H: BrowserHost> {
    transport: T,
    host: H,
    current_frame: Arc<Frame>,
    next_frame: Option<Arc<Frame>>,
    error_frame: Option<Arc<ErrorFrame>>,
    in_flight: HashMap<u64, NavigationRequest>,
    next_sequence_id: u64,
    last_accepted_sequence_id: u64,
    next_frame_id: u64,
    terminated: Option<String>,
    last_transition: Option<Transition>,
    listeners: Vec<NavigationListener>,
}

impl<T: Transport, H: BrowserHost> NavigationController<T, H> {
    /// Create a controller whose current frame is the server-embedded
    /// response for `initial_url`. No fetch is issued.
    pub fn new(
        transport: T,
        host: H,
        initial_url: impl Into<String>,
        initial_response: ShellResponse,
    ) -> Self {
        let current_frame = Arc::new(Frame {
            id: FrameId::new(0),
            url: initial_url.into(),
            data: initial_response,
        });
        log::debug!(
            "shell mounted at {} ({})",
            current_frame.url,
            current_frame.data.status()
        );
        Self {
            transport,
            host,
            current_frame,
            next_frame: None,
            error_frame: None,
            in_flight: HashMap::new(),
            next_sequence_id: 1,
            last_accepted_sequence_id: 0,
            next_frame_id: 1,
            terminated: None,
            last_transition: None,
            listeners: Vec::new(),
        }
    }

    /// Start navigating to `url`. Returns the sequence id of the request, or
    /// `None` if the shell has already been left.
    pub fn navigate(&mut self, url: &str, push_history: bool) -> Option<u64> {
        self.dispatch(url, push_history, None)
    }

    /// Submit a POST form through the transport. The result is sequenced
    /// like any navigation but never adds a history entry.
    pub fn submit_form(&mut self, action: &str, fields: Vec<(String, String)>) -> Option<u64> {
        self.dispatch(action, false, Some(fields))
    }

    fn dispatch(
        &mut self,
        url: &str,
        push_history: bool,
        form: Option<Vec<(String, String)>>,
    ) -> Option<u64> {
        if let Some(external) = &self.terminated {
            log::warn!("ignoring navigation to {url}: shell already left for {external}");
            return None;
        }
        let url = url.trim();
        if url.is_empty() {
            return None;
        }

        let sequence_id = self.next_sequence_id;
        self.next_sequence_id += 1;
        log::info!("Navigation requested: {url} (seq {sequence_id})");

        let method = match form {
            Some(fields) => RequestMethod::Post { fields },
            None => RequestMethod::Get,
        };
        let request = NavigationRequest {
            sequence_id,
            url: url.to_string(),
            push_history,
            method,
        };
        self.transport.request(ShellRequest {
            id: sequence_id,
            url: request.url.clone(),
            method: request.method.clone(),
        });
        self.in_flight.insert(sequence_id, request);
        Some(sequence_id)
    }

    /// Apply every completion the transport has ready. Returns how many were
    /// processed, stale ones included.
    pub fn poll(&mut self) -> usize {
        let completions = self.transport.poll();
        let count = completions.len();
        for completion in completions {
            self.complete(completion);
        }
        count
    }

    fn complete(&mut self, completion: TransportCompletion) {
        let Some(request) = self.in_flight.remove(&completion.request_id) else {
            log::debug!("completion for unknown request {}", completion.request_id);
            return;
        };
        if self.terminated.is_some() {
            return;
        }
        if request.sequence_id < self.last_accepted_sequence_id {
            log::debug!(
                "discarding stale response for {} (seq {} < {})",
                request.url,
                request.sequence_id,
                self.last_accepted_sequence_id
            );
            return;
        }
        self.last_accepted_sequence_id = request.sequence_id;

        match completion.result {
            Ok(response) => self.accept(request, response),
            Err(error) => {
                log::warn!("navigation to {} failed: {error}", request.url);
                self.show_error(request.url, ErrorKind::TransportFailure(error.to_string()));
            }
        }
    }

    fn accept(&mut self, request: NavigationRequest, response: ShellResponse) {
        match response {
            ShellResponse::LoadExternally => {
                log::info!("loading {} outside the shell", request.url);
                self.next_frame = None;
                self.terminated = Some(request.url.clone());
                self.host.load_externally(&request.url);
                self.notify(Transition::LoadedExternally(request.url));
            }
            data @ (ShellResponse::RenderHtml { .. } | ShellResponse::RenderClientView { .. }) => {
                let id = self.allocate_frame_id();
                if request.push_history {
                    self.host.push_state(&request.url);
                }
                self.next_frame = Some(Arc::new(Frame {
                    id,
                    url: request.url,
                    data,
                }));
                self.notify(Transition::NextFrameReady(id));
            }
            ShellResponse::NotFound => self.show_error(request.url, ErrorKind::NotFound),
            ShellResponse::PermissionDenied => {
                self.show_error(request.url, ErrorKind::PermissionDenied)
            }
        }
    }

    fn show_error(&mut self, url: String, kind: ErrorKind) {
        let id = self.allocate_frame_id();
        // Whatever was pending is older than this navigation.
        self.next_frame = None;
        self.error_frame = Some(Arc::new(ErrorFrame { id, url, kind }));
        self.notify(Transition::ErrorShown(id));
    }

    /// The renderer finished painting `frame_id`. Promotes it if it is still
    /// the pending frame; returns whether a promotion happened.
    pub fn on_load_next_frame(&mut self, frame_id: FrameId) -> bool {
        let Some(next) = self.next_frame.take_if(|next| next.id == frame_id) else {
            log::debug!("ignoring load of {frame_id}: not the pending frame");
            return false;
        };
        self.current_frame = next;
        self.error_frame = None;
        self.notify(Transition::FramePromoted(frame_id));
        true
    }

    /// The renderer cannot paint the pending frame `frame_id`; replace it
    /// with an error frame.
    pub fn reject_next_frame(&mut self, frame_id: FrameId, reason: impl Into<String>) {
        let Some(next) = self.next_frame.take_if(|next| next.id == frame_id) else {
            return;
        };
        let reason = reason.into();
        log::error!("cannot render {}: {reason}", next.url);
        self.show_error(next.url.clone(), ErrorKind::RenderFailure(reason));
    }

    /// Register a callback invoked after every state transition.
    pub fn add_navigation_listener(&mut self, listener: impl FnMut(&NavigationSnapshot) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, transition: Transition) {
        self.last_transition = Some(transition);
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        for listener in self.listeners.iter_mut() {
            listener(&snapshot);
        }
    }

    fn allocate_frame_id(&mut self) -> FrameId {
        let id = FrameId::new(self.next_frame_id);
        self.next_frame_id += 1;
        id
    }

    /// State as of the last transition; `None` until something happened.
    pub fn snapshot(&self) -> Option<NavigationSnapshot> {
        let transition = self.last_transition.clone()?;
        Some(NavigationSnapshot {
            transition,
            current_frame: Arc::clone(&self.current_frame),
            next_frame: self.next_frame.clone(),
            error_frame: self.error_frame.clone(),
        })
    }

    /// Fetches dispatched and not yet completed, oldest first.
    pub fn in_flight(&self) -> Vec<&NavigationRequest> {
        let mut requests: Vec<_> = self.in_flight.values().collect();
        requests.sort_by_key(|request| request.sequence_id);
        requests
    }

    pub fn current_frame(&self) -> &Arc<Frame> {
        &self.current_frame
    }

    pub fn next_frame(&self) -> Option<&Arc<Frame>> {
        self.next_frame.as_ref()
    }

    pub fn error_frame(&self) -> Option<&Arc<ErrorFrame>> {
        self.error_frame.as_ref()
    }

    /// True while a fetch is in flight or a frame waits to be promoted.
    pub fn is_pending(&self) -> bool {
        !self.in_flight.is_empty() || self.next_frame.is_some()
    }

    /// The URL the shell was left for, once a full page load happened.
    pub fn terminated(&self) -> Option<&str> {
        self.terminated.as_deref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.is_some()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
