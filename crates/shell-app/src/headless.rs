//! Terminal stand-ins for the window and its frames.

use std::collections::HashMap;

use anyhow::Result;
use shell_frame::FrameDocument;
use shell_nav::{BrowserHost, FrameId, FrameSurface, SessionHistory};

/// Frame surface without a display. Nothing needs to be fetched after
/// mounting, so every frame reports itself loaded on the next poll.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    visible: HashMap<FrameId, bool>,
    loaded: Vec<FrameId>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted(&self) -> usize {
        self.visible.len()
    }

    pub fn is_visible(&self, frame_id: FrameId) -> bool {
        self.visible.get(&frame_id).copied().unwrap_or(false)
    }
}

impl FrameSurface for HeadlessSurface {
    fn mount(&mut self, frame_id: FrameId, document: &FrameDocument, visible: bool) -> Result<()> {
        log::trace!("painting {frame_id}: {} bytes", document.html.len());
        self.visible.insert(frame_id, visible);
        self.loaded.push(frame_id);
        Ok(())
    }

    fn set_visible(&mut self, frame_id: FrameId, visible: bool) {
        if let Some(state) = self.visible.get_mut(&frame_id) {
            *state = visible;
        }
    }

    fn unmount(&mut self, frame_id: FrameId) {
        self.visible.remove(&frame_id);
        self.loaded.retain(|id| *id != frame_id);
    }

    fn poll_loaded(&mut self) -> Vec<FrameId> {
        std::mem::take(&mut self.loaded)
    }
}

/// Window state kept in memory: history, title and the URL the shell was
/// left for, if any.
#[derive(Debug)]
pub struct HeadlessHost {
    pub history: SessionHistory,
    pub title: String,
    pub external: Option<String>,
}

impl HeadlessHost {
    pub fn new(initial_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            history: SessionHistory::new(initial_url),
            title: title.into(),
            external: None,
        }
    }
}

impl BrowserHost for HeadlessHost {
    fn push_state(&mut self, url: &str) {
        self.history.push(url);
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn load_externally(&mut self, url: &str) {
        log::info!("leaving the shell for {url}");
        self.external = Some(url.to_string());
    }
}
