use std::fmt;

use shell_io::ShellResponse;

/// Identity of one materialized frame. Revisiting a URL yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// A displayable navigation result. Shared immutably; replaced, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub url: String,
    pub data: ShellResponse,
}

impl Frame {
    pub fn title(&self) -> Option<&str> {
        match &self.data {
            ShellResponse::RenderHtml { title, .. } => Some(title),
            _ => None,
        }
    }
}

/// Why a navigation ended in an error frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    /// Network or decode failure reported by the transport.
    TransportFailure(String),
    /// The renderer could not paint the accepted frame.
    RenderFailure(String),
}

impl ErrorKind {
    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "Page not found",
            ErrorKind::PermissionDenied => "Permission denied",
            ErrorKind::TransportFailure(_) => "Page could not be loaded",
            ErrorKind::RenderFailure(_) => "Page could not be displayed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ErrorKind::NotFound => "Nothing lives at this address.".to_string(),
            ErrorKind::PermissionDenied => {
                "You do not have permission to access this page.".to_string()
            }
            ErrorKind::TransportFailure(reason) | ErrorKind::RenderFailure(reason) => {
                reason.clone()
            }
        }
    }
}

/// An in-place error shown over a frozen current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorFrame {
    pub id: FrameId,
    pub url: String,
    pub kind: ErrorKind,
}
