use anyhow::{Result, anyhow};
use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};
use shell_io::Stylesheet;
use tracing::{debug, trace};
use url::{Position, Url, form_urlencoded};

/// The inputs needed to paint one `render-html` payload.
#[derive(Debug, Clone, Copy)]
pub struct PageSource<'a> {
    /// Absolute URL of the frame; relative links resolve against it.
    pub url: &'a Url,
    pub title: &'a str,
    /// The server-rendered fragment.
    pub html: &'a str,
    pub stylesheets: &'a [Stylesheet],
}

/// An anchor inside a frame that routes through the navigation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLink {
    /// The `href` attribute as written in the fragment.
    pub href: String,
    /// What to hand to `navigate`: a path for same-origin links, an absolute URL otherwise.
    pub target: String,
    pub same_origin: bool,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// A form inside a frame, with the values it would submit untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameForm {
    pub method: FormMethod,
    pub action: Url,
    pub fields: Vec<(String, String)>,
}

/// What the controller should do in response to a user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Navigate(String),
    SubmitForm {
        action: String,
        fields: Vec<(String, String)>,
    },
}

/// A fragment prepared for painting into an isolated context.
#[derive(Debug, Clone)]
pub struct FrameDocument {
    pub url: Url,
    pub title: String,
    /// Complete standalone document: base URL, title and stylesheets injected.
    pub html: String,
    pub links: Vec<FrameLink>,
    pub forms: Vec<FrameForm>,
    text: String,
}

impl FrameDocument {
    /// Wrap a fragment into a standalone document and find every anchor and
    /// form that should be ajaxified.
    pub fn prepare(page: PageSource<'_>) -> Result<Self> {
        let fragment = Html::parse_fragment(page.html);
        let title = if page.title.trim().is_empty() {
            first_title(&fragment).unwrap_or_default()
        } else {
            page.title.trim().to_string()
        };

        let links = collect_links(&fragment, page.url)?;
        let forms = collect_forms(&fragment, page.url)?;
        let text = visible_text(*fragment.root_element());
        let html = wrap_document(page, &title);
        trace!(
            url = %page.url,
            links = links.len(),
            forms = forms.len(),
            "prepared frame document"
        );

        Ok(Self {
            url: page.url.clone(),
            title,
            html,
            links,
            forms,
            text,
        })
    }

    /// A minimal document standing in for a page that could not be shown.
    pub fn error_page(url: &Url, title: &str, message: &str) -> Result<Self> {
        let html = format!(
            "<div class=\"shell-error\"><h1>{}</h1><p>{}</p></div>",
            escape_html(title),
            escape_html(message)
        );
        Self::prepare(PageSource {
            url,
            title,
            html: &html,
            stylesheets: &[],
        })
    }

    /// Visible text of the fragment with whitespace collapsed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolve a click on the link at `index`.
    pub fn activate_link(&self, index: usize) -> Option<Interaction> {
        self.links
            .get(index)
            .map(|link| Interaction::Navigate(link.target.clone()))
    }

    /// Resolve submitting the form at `index`, with `overrides` replacing or
    /// adding to its default values.
    pub fn submit_form(&self, index: usize, overrides: &[(String, String)]) -> Option<Interaction> {
        let form = self.forms.get(index)?;
        let mut fields = form.fields.clone();
        for (name, value) in overrides {
            match fields.iter_mut().find(|(existing, _)| existing == name) {
                Some(field) => field.1 = value.clone(),
                None => fields.push((name.clone(), value.clone())),
            }
        }

        match form.method {
            FormMethod::Get => {
                let data = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                let mut action = form.action.clone();
                let query = match action.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{data}"),
                    _ => data,
                };
                action.set_query(Some(&query));
                Some(Interaction::Navigate(navigation_target(&self.url, &action)))
            }
            FormMethod::Post => Some(Interaction::SubmitForm {
                action: navigation_target(&self.url, &form.action),
                fields,
            }),
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{css}': {e:?}"))
}

fn first_title(fragment: &Html) -> Option<String> {
    let selector = selector("title").ok()?;
    fragment
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
}

/// Same-origin URLs are navigated by path so history entries stay relative.
fn navigation_target(frame_url: &Url, url: &Url) -> String {
    if url.origin() == frame_url.origin() {
        url[Position::BeforePath..].to_string()
    } else {
        url.to_string()
    }
}

fn collect_links(fragment: &Html, frame_url: &Url) -> Result<Vec<FrameLink>> {
    let anchors = selector("a[href]")?;
    let mut links = Vec::new();
    for anchor in fragment.select(&anchors) {
        // Downloads must reach the browser untouched.
        if anchor.value().attr("download").is_some() {
            continue;
        }
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        // `?query` hrefs keep the frame path.
        let resolved = match frame_url.join(href) {
            Ok(url) => url,
            Err(error) => {
                debug!(%href, %error, "skipping link that cannot be resolved");
                continue;
            }
        };
        if resolved.scheme() == "javascript" {
            continue;
        }
        links.push(FrameLink {
            href: href.to_string(),
            target: navigation_target(frame_url, &resolved),
            same_origin: resolved.origin() == frame_url.origin(),
            text: normalize_whitespace(&anchor.text().collect::<String>()),
        });
    }
    Ok(links)
}

fn collect_forms(fragment: &Html, frame_url: &Url) -> Result<Vec<FrameForm>> {
    let forms_selector = selector("form")?;
    let fields_selector = selector("input, textarea, select")?;
    let mut forms = Vec::new();
    for form in fragment.select(&forms_selector) {
        let method = match form.value().attr("method") {
            Some(method) if method.eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        };
        // A blank action would submit to the isolated context itself.
        let action = form
            .value()
            .attr("action")
            .map(str::trim)
            .filter(|action| !action.is_empty())
            .and_then(|action| frame_url.join(action).ok())
            .unwrap_or_else(|| frame_url.clone());

        let mut fields = Vec::new();
        for field in form.select(&fields_selector) {
            collect_field(field, &mut fields)?;
        }
        forms.push(FrameForm {
            method,
            action,
            fields,
        });
    }
    Ok(forms)
}

fn collect_field(field: ElementRef<'_>, fields: &mut Vec<(String, String)>) -> Result<()> {
    let element = field.value();
    let Some(name) = element.attr("name").filter(|name| !name.is_empty()) else {
        return Ok(());
    };
    if element.attr("disabled").is_some() {
        return Ok(());
    }

    match element.name() {
        "textarea" => fields.push((name.to_string(), field.text().collect())),
        "select" => {
            let options = selector("option")?;
            let mut chosen: Vec<String> = field
                .select(&options)
                .filter(|option| option.value().attr("selected").is_some())
                .map(option_value)
                .collect();
            if chosen.is_empty() && element.attr("multiple").is_none() {
                chosen.extend(field.select(&options).next().map(option_value));
            }
            fields.extend(chosen.into_iter().map(|value| (name.to_string(), value)));
        }
        _ => {
            let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
            match kind.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => {}
                "checkbox" | "radio" => {
                    if element.attr("checked").is_some() {
                        let value = element.attr("value").unwrap_or("on");
                        fields.push((name.to_string(), value.to_string()));
                    }
                }
                _ => {
                    let value = element.attr("value").unwrap_or_default();
                    fields.push((name.to_string(), value.to_string()));
                }
            }
        }
    }
    Ok(())
}

fn option_value(option: ElementRef<'_>) -> String {
    option
        .value()
        .attr("value")
        .map(str::to_string)
        .unwrap_or_else(|| normalize_whitespace(&option.text().collect::<String>()))
}

fn visible_text(root: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|parent| matches!(parent.name(), "script" | "style" | "title"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    normalize_whitespace(&out)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn wrap_document(page: PageSource<'_>, title: &str) -> String {
    let mut head = format!(
        "<meta charset=\"utf-8\"><base href=\"{}\" target=\"_parent\"><title>{}</title>",
        escape_html(page.url.as_str()),
        escape_html(title)
    );
    for sheet in page.stylesheets {
        head.push_str(&format!(
            "<link rel=\"stylesheet\" type=\"{}\" href=\"{}\">",
            escape_html(&sheet.kind),
            escape_html(&sheet.src)
        ));
    }
    format!(
        "<!DOCTYPE html><html><head>{head}</head><body>{}</body></html>",
        page.html
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_titles() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn navigation_target_keeps_same_origin_relative() {
        let frame = Url::parse("https://cms.example.com/admin/pages/").unwrap();
        let inside = frame.join("/admin/pages/2/?p=1#top").unwrap();
        let outside = Url::parse("https://example.org/x").unwrap();
        assert_eq!(navigation_target(&frame, &inside), "/admin/pages/2/?p=1#top");
        assert_eq!(navigation_target(&frame, &outside), "https://example.org/x");
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
    }
}
