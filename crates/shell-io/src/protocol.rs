//! Wire types exchanged with the admin server.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// An external stylesheet a rendered fragment depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stylesheet {
    #[serde(rename = "type", default = "default_stylesheet_type")]
    pub kind: String,
    pub src: String,
}

fn default_stylesheet_type() -> String {
    "text/css".to_string()
}

impl Stylesheet {
    pub fn css(src: impl Into<String>) -> Self {
        Self {
            kind: default_stylesheet_type(),
            src: src.into(),
        }
    }
}

/// Decoded answer to a navigation fetch, discriminated by its `status` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ShellResponse {
    /// The target is not a shell page; the browser must load it directly.
    #[serde(rename = "load-it")]
    LoadExternally,
    /// An HTML fragment to mount as a new frame.
    RenderHtml {
        #[serde(default)]
        title: String,
        html: String,
        #[serde(default)]
        stylesheets: Vec<Stylesheet>,
    },
    /// Hand off to a named client-side view with an opaque context.
    #[serde(rename = "render-client-side-view")]
    RenderClientView {
        view: String,
        #[serde(default)]
        context: serde_json::Value,
    },
    NotFound,
    PermissionDenied,
}

impl ShellResponse {
    /// The wire `status` value of this response.
    pub fn status(&self) -> &'static str {
        match self {
            ShellResponse::LoadExternally => "load-it",
            ShellResponse::RenderHtml { .. } => "render-html",
            ShellResponse::RenderClientView { .. } => "render-client-side-view",
            ShellResponse::NotFound => "not-found",
            ShellResponse::PermissionDenied => "permission-denied",
        }
    }

    pub fn render_html(title: impl Into<String>, html: impl Into<String>) -> Self {
        ShellResponse::RenderHtml {
            title: title.into(),
            html: html.into(),
            stylesheets: Vec::new(),
        }
    }
}

/// How a navigation request reaches the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    /// Urlencoded form submission.
    Post { fields: Vec<(String, String)> },
}

/// A single fetch handed to a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
    /// Caller-chosen id echoed back in the completion.
    pub id: u64,
    pub url: String,
    pub method: RequestMethod,
}

impl ShellRequest {
    pub fn get(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            method: RequestMethod::Get,
        }
    }

    pub fn post(id: u64, url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            id,
            url: url.into(),
            method: RequestMethod::Post { fields },
        }
    }
}

/// Classify a server answer.
///
/// Responses without the shell status marker are plain pages (for example a
/// file download) and are never parsed as JSON; the browser loads them
/// directly instead.
pub fn decode_response(url: &str, has_status_marker: bool, body: &str) -> Result<ShellResponse> {
    if !has_status_marker {
        warn!(
            %url,
            "server returned a non-shell response; missing 'download' attribute on an <a> tag?"
        );
        return Ok(ShellResponse::LoadExternally);
    }
    Ok(serde_json::from_str(body)?)
}
