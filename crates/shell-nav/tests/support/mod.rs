#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Result;
use shell_frame::FrameDocument;
use shell_io::{ShellRequest, ShellResponse, Transport, TransportCompletion, TransportError};
use shell_nav::{BrowserHost, FrameId, FrameSurface};

#[derive(Default)]
struct ScriptState {
    requests: Vec<ShellRequest>,
    outstanding: Vec<u64>,
    ready: VecDeque<TransportCompletion>,
}

/// Transport whose completions are released by the test, in any order.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ShellRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn respond(&self, request_id: u64, response: ShellResponse) {
        self.finish(request_id, Ok(response));
    }

    pub fn fail(&self, request_id: u64, error: TransportError) {
        self.finish(request_id, Err(error));
    }

    fn finish(&self, request_id: u64, result: shell_io::Result<ShellResponse>) {
        let mut state = self.state.borrow_mut();
        state.outstanding.retain(|id| *id != request_id);
        state.ready.push_back(TransportCompletion { request_id, result });
    }
}

impl Transport for ScriptedTransport {
    fn request(&mut self, request: ShellRequest) {
        let mut state = self.state.borrow_mut();
        state.outstanding.push(request.id);
        state.requests.push(request);
    }

    fn poll(&mut self) -> Vec<TransportCompletion> {
        self.state.borrow_mut().ready.drain(..).collect()
    }

    fn has_pending(&self) -> bool {
        let state = self.state.borrow();
        !state.outstanding.is_empty() || !state.ready.is_empty()
    }
}

/// Host that records every call made to it.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub pushed: Vec<String>,
    pub titles: Vec<String>,
    pub external: Option<String>,
}

impl BrowserHost for RecordingHost {
    fn push_state(&mut self, url: &str) {
        self.pushed.push(url.to_string());
    }

    fn set_title(&mut self, title: &str) {
        self.titles.push(title.to_string());
    }

    fn load_externally(&mut self, url: &str) {
        self.external = Some(url.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct PaintedFrame {
    pub id: FrameId,
    pub title: String,
    pub text: String,
    pub visible: bool,
}

/// Surface that keeps painted frames in memory. Loads are reported only
/// when the test calls [`FakeSurface::finish_loading`].
#[derive(Debug, Default)]
pub struct FakeSurface {
    pub frames: Vec<PaintedFrame>,
    loaded: Vec<FrameId>,
}

impl FakeSurface {
    pub fn finish_loading(&mut self, frame_id: FrameId) {
        self.loaded.push(frame_id);
    }

    pub fn frame(&self, frame_id: FrameId) -> Option<&PaintedFrame> {
        self.frames.iter().find(|frame| frame.id == frame_id)
    }

    pub fn visible(&self) -> Vec<&PaintedFrame> {
        self.frames.iter().filter(|frame| frame.visible).collect()
    }
}

impl FrameSurface for FakeSurface {
    fn mount(&mut self, frame_id: FrameId, document: &FrameDocument, visible: bool) -> Result<()> {
        self.frames.push(PaintedFrame {
            id: frame_id,
            title: document.title.clone(),
            text: document.text().to_string(),
            visible,
        });
        Ok(())
    }

    fn set_visible(&mut self, frame_id: FrameId, visible: bool) {
        if let Some(frame) = self.frames.iter_mut().find(|frame| frame.id == frame_id) {
            frame.visible = visible;
        }
    }

    fn unmount(&mut self, frame_id: FrameId) {
        self.frames.retain(|frame| frame.id != frame_id);
    }

    fn poll_loaded(&mut self) -> Vec<FrameId> {
        std::mem::take(&mut self.loaded)
    }
}

pub fn page(title: &str, html: &str) -> ShellResponse {
    ShellResponse::render_html(title, html)
}
