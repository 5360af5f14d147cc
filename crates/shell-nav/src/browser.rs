//! Keeps a [`FrameSurface`] in step with the navigation controller.
//!
//! The current frame is always mounted and visible unless an error frame
//! covers it. A pending frame is mounted hidden so it can finish loading
//! before the swap; its load report is what promotes it.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use shell_frame::{FrameDocument, Interaction, PageSource};
use shell_io::{ShellResponse, Transport};
use url::Url;

use crate::controller::NavigationController;
use crate::frame::{ErrorKind, Frame, FrameId};
use crate::history::BrowserHost;

/// Where frames are painted.
pub trait FrameSurface {
    /// Paint `document` into a new isolated context.
    fn mount(&mut self, frame_id: FrameId, document: &FrameDocument, visible: bool) -> Result<()>;

    fn set_visible(&mut self, frame_id: FrameId, visible: bool);

    fn unmount(&mut self, frame_id: FrameId);

    /// Frames whose content finished loading since the last call.
    fn poll_loaded(&mut self) -> Vec<FrameId>;
}

/// Output of a [`ClientView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub title: String,
    pub html: String,
}

/// Renders `render-client-side-view` responses for one view name.
pub trait ClientView {
    fn render(&self, context: &serde_json::Value) -> Result<RenderedView>;
}

/// Client views by the name the server uses for them.
#[derive(Default)]
pub struct ClientViews {
    views: HashMap<String, Box<dyn ClientView>>,
}

impl ClientViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, view: impl ClientView + 'static) -> Self {
        self.views.insert(name.into(), Box::new(view));
        self
    }

    fn get(&self, name: &str) -> Option<&dyn ClientView> {
        self.views.get(name).map(|view| view.as_ref())
    }
}

struct MountedFrame {
    document: FrameDocument,
    visible: bool,
    load_signaled: bool,
}

pub struct Browser<T: Transport, H: BrowserHost, S: FrameSurface> {
    controller: NavigationController<T, H>,
    surface: S,
    base_url: Url,
    views: ClientViews,
    mounted: HashMap<FrameId, MountedFrame>,
}

impl<T: Transport, H: BrowserHost, S: FrameSurface> Browser<T, H, S> {
    /// Mount the controller's current frame. `base_url` resolves frame URLs
    /// into absolute document URLs.
    pub fn new(
        controller: NavigationController<T, H>,
        surface: S,
        base_url: Url,
        views: ClientViews,
    ) -> Result<Self> {
        let mut browser = Self {
            controller,
            surface,
            base_url,
            views,
            mounted: HashMap::new(),
        };
        browser.sync()?;
        Ok(browser)
    }

    /// Apply transport completions, reconcile mounts and handle load reports.
    /// Returns the number of completions processed.
    pub fn pump(&mut self) -> Result<usize> {
        let processed = self.controller.poll();
        self.sync()?;
        for frame_id in self.surface.poll_loaded() {
            self.frame_loaded(frame_id)?;
        }
        Ok(processed)
    }

    /// Navigate from outside the frames (menus, address bar).
    pub fn navigate(&mut self, url: &str) -> Option<u64> {
        self.controller.navigate(url, true)
    }

    /// Replay a back/forward entry without adding a new one.
    pub fn pop_state(&mut self, url: &str) -> Option<u64> {
        self.controller.navigate(url, false)
    }

    /// Click the link at `index` of the visible frame.
    pub fn activate_link(&mut self, index: usize) -> Option<u64> {
        let interaction = self.visible_document()?.activate_link(index)?;
        self.dispatch(interaction)
    }

    /// Submit the form at `index` of the visible frame.
    pub fn submit_form(&mut self, index: usize, overrides: &[(String, String)]) -> Option<u64> {
        let interaction = self.visible_document()?.submit_form(index, overrides)?;
        self.dispatch(interaction)
    }

    fn dispatch(&mut self, interaction: Interaction) -> Option<u64> {
        match interaction {
            Interaction::Navigate(url) => self.controller.navigate(&url, true),
            Interaction::SubmitForm { action, fields } => {
                self.controller.submit_form(&action, fields)
            }
        }
    }

    /// The document the user currently sees.
    pub fn visible_document(&self) -> Option<&FrameDocument> {
        let id = match self.controller.error_frame() {
            Some(error) => error.id,
            None => self.controller.current_frame().id,
        };
        self.mounted.get(&id).map(|mounted| &mounted.document)
    }

    pub fn is_mounted(&self, frame_id: FrameId) -> bool {
        self.mounted.contains_key(&frame_id)
    }

    pub fn controller(&self) -> &NavigationController<T, H> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut NavigationController<T, H> {
        &mut self.controller
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn frame_loaded(&mut self, frame_id: FrameId) -> Result<()> {
        let Some(mounted) = self.mounted.get_mut(&frame_id) else {
            return Ok(());
        };
        if mounted.load_signaled {
            return Ok(());
        }
        mounted.load_signaled = true;
        let title = mounted.document.title.clone();

        if self.controller.on_load_next_frame(frame_id) {
            // Title follows the swap so it never names content that is not shown.
            self.controller.host_mut().set_title(&title);
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if let Some(next) = self.controller.next_frame().cloned() {
            if !self.mounted.contains_key(&next.id) {
                match self.render_frame(&next) {
                    Ok(document) => self.mount(next.id, document, false)?,
                    Err(err) => self
                        .controller
                        .reject_next_frame(next.id, format!("{err:#}")),
                }
            }
        }

        let current = Arc::clone(self.controller.current_frame());
        let error = self.controller.error_frame().cloned();
        let mut wanted = vec![current.id];
        if let Some(next) = self.controller.next_frame() {
            wanted.push(next.id);
        }

        if !self.mounted.contains_key(&current.id) {
            let document = match self.render_frame(&current) {
                Ok(document) => document,
                Err(err) => {
                    log::error!("cannot render {}: {err:#}", current.url);
                    let kind = ErrorKind::RenderFailure(format!("{err:#}"));
                    self.error_page(&current.url, &kind)?
                }
            };
            self.mount(current.id, document, error.is_none())?;
        }
        self.set_visible(current.id, error.is_none());

        if let Some(error) = &error {
            wanted.push(error.id);
            if !self.mounted.contains_key(&error.id) {
                let document = self.error_page(&error.url, &error.kind)?;
                let title = document.title.clone();
                self.mount(error.id, document, true)?;
                self.controller.host_mut().set_title(&title);
            }
        }

        let stale: Vec<FrameId> = self
            .mounted
            .keys()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        for id in stale {
            self.mounted.remove(&id);
            self.surface.unmount(id);
        }
        Ok(())
    }

    fn mount(&mut self, frame_id: FrameId, document: FrameDocument, visible: bool) -> Result<()> {
        self.surface
            .mount(frame_id, &document, visible)
            .with_context(|| format!("failed to mount {frame_id}"))?;
        log::debug!("mounted {frame_id} ({}) visible={visible}", document.url);
        self.mounted.insert(
            frame_id,
            MountedFrame {
                document,
                visible,
                load_signaled: false,
            },
        );
        Ok(())
    }

    fn set_visible(&mut self, frame_id: FrameId, visible: bool) {
        if let Some(mounted) = self.mounted.get_mut(&frame_id) {
            if mounted.visible != visible {
                mounted.visible = visible;
                self.surface.set_visible(frame_id, visible);
            }
        }
    }

    fn frame_url(&self, url: &str) -> Result<Url> {
        self.base_url
            .join(url)
            .with_context(|| format!("invalid frame url '{url}'"))
    }

    fn render_frame(&self, frame: &Frame) -> Result<FrameDocument> {
        let url = self.frame_url(&frame.url)?;
        match &frame.data {
            ShellResponse::RenderHtml {
                title,
                html,
                stylesheets,
            } => FrameDocument::prepare(PageSource {
                url: &url,
                title,
                html,
                stylesheets,
            }),
            ShellResponse::RenderClientView { view, context } => {
                let Some(client_view) = self.views.get(view) else {
                    bail!("no client view registered as '{view}'");
                };
                let rendered = client_view.render(context)?;
                FrameDocument::prepare(PageSource {
                    url: &url,
                    title: &rendered.title,
                    html: &rendered.html,
                    stylesheets: &[],
                })
            }
            ShellResponse::NotFound => self.error_page(&frame.url, &ErrorKind::NotFound),
            ShellResponse::PermissionDenied => {
                self.error_page(&frame.url, &ErrorKind::PermissionDenied)
            }
            ShellResponse::LoadExternally => {
                bail!("{} must be loaded outside the shell", frame.url)
            }
        }
    }

    fn error_page(&self, url: &str, kind: &ErrorKind) -> Result<FrameDocument> {
        let url = self.frame_url(url)?;
        FrameDocument::error_page(&url, kind.title(), &kind.message())
    }
}
