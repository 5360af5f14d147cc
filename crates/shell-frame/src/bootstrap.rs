//! Reading the initial shell state embedded in the server-rendered host page.

use anyhow::{Context, Result, bail};
use scraper::{Html, Selector};
use serde::Deserialize;
use shell_io::ShellResponse;
use tracing::{debug, info};

/// Sidebar and menu configuration serialised into the host page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellProps {
    pub logo_images: serde_json::Value,
    pub explorer_start_page_id: Option<u64>,
    pub search_url: Option<String>,
    pub menu_items: serde_json::Value,
}

/// Everything needed for the first paint without any fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Bootstrap {
    pub initial_response: ShellResponse,
    pub props: Option<ShellProps>,
}

impl Bootstrap {
    pub fn from_response(initial_response: ShellResponse) -> Self {
        Self {
            initial_response,
            props: None,
        }
    }

    /// Parse a host page.
    ///
    /// The inline `<script id="initial-response">` payload is preferred; pages
    /// that were rendered without it fall back to their `<title>` and the
    /// `#wagtailshell-content` element.
    pub fn from_host_page(html: &str) -> Result<Self> {
        let page = Html::parse_document(html);

        let initial_response = match inline_response(&page)? {
            Some(response) => response,
            None => extracted_response(&page)?,
        };
        let props = shell_props(&page)?;
        info!(
            status = initial_response.status(),
            has_props = props.is_some(),
            "bootstrapped shell from host page"
        );

        Ok(Self {
            initial_response,
            props,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector '{css}': {e:?}"))
}

fn inline_response(page: &Html) -> Result<Option<ShellResponse>> {
    let script = selector("script#initial-response")?;
    let Some(node) = page.select(&script).next() else {
        return Ok(None);
    };
    let json = node.text().collect::<String>();
    let response =
        serde_json::from_str(json.trim()).context("invalid inline initial response")?;
    Ok(Some(response))
}

fn extracted_response(page: &Html) -> Result<ShellResponse> {
    let content = selector("#wagtailshell-content")?;
    let Some(node) = page.select(&content).next() else {
        bail!("host page has neither an inline initial response nor #wagtailshell-content");
    };
    let title = selector("title")?;
    let title = page
        .select(&title)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();
    debug!(%title, "no inline initial response, extracting page content");
    Ok(ShellResponse::render_html(title, node.html()))
}

fn shell_props(page: &Html) -> Result<Option<ShellProps>> {
    let shell = selector(".js-shell")?;
    let Some(props) = page
        .select(&shell)
        .next()
        .and_then(|node| node.value().attr("data-props"))
    else {
        return Ok(None);
    };
    let props = serde_json::from_str(props).context("invalid shell props")?;
    Ok(Some(props))
}

