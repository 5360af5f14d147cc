//! Navigation for the admin shell.
//!
//! [`NavigationController`] owns the frame state machine and decides which
//! fetch results are still wanted. [`Browser`] binds it to a [`FrameSurface`]
//! that paints frames and reports when they finish loading.

mod browser;
mod controller;
mod frame;
mod history;

pub use browser::{Browser, ClientView, ClientViews, FrameSurface, RenderedView};
pub use controller::{NavigationController, NavigationRequest, NavigationSnapshot, Transition};
pub use frame::{ErrorFrame, ErrorKind, Frame, FrameId};
pub use history::{BrowserHost, SessionHistory};
