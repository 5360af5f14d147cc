//! Browser integration: history entries, document title and full page loads.

/// The window the shell lives in.
pub trait BrowserHost {
    /// Add a history entry for `url` (the `history.pushState` equivalent).
    fn push_state(&mut self, url: &str);

    /// Update the window title.
    fn set_title(&mut self, title: &str);

    /// Leave the shell and load `url` as a full page.
    fn load_externally(&mut self, url: &str);
}

/// Back/forward stack of visited URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistory {
    entries: Vec<String>,
    index: usize,
}

impl SessionHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            index: 0,
        }
    }

    /// Push a new entry, dropping anything forward of the current one.
    pub fn push(&mut self, url: impl Into<String>) {
        self.entries.truncate(self.index + 1);
        self.entries.push(url.into());
        self.index = self.entries.len() - 1;
    }

    /// Step back; returns the URL to replay.
    pub fn back(&mut self) -> Option<&str> {
        if !self.can_go_back() {
            return None;
        }
        self.index -= 1;
        self.current()
    }

    /// Step forward; returns the URL to replay.
    pub fn forward(&mut self) -> Option<&str> {
        if !self.can_go_forward() {
            return None;
        }
        self.index += 1;
        self.current()
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.index).map(String::as_str)
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
