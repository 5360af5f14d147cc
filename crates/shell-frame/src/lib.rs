//! Frame preparation for the admin shell.
//!
//! Turns server-rendered fragments into standalone documents and works out
//! which anchors and forms should route through the navigation controller
//! instead of causing a full page load.

pub mod bootstrap;
pub mod document;

pub use bootstrap::{Bootstrap, ShellProps};
pub use document::{FormMethod, FrameDocument, FrameForm, FrameLink, Interaction, PageSource};
