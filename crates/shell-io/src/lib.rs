//! Transport layer for the admin shell: wire protocol and navigation fetches.

mod error;
mod protocol;
mod transport;

pub use error::{Result, TransportError};
pub use protocol::{RequestMethod, ShellRequest, ShellResponse, Stylesheet, decode_response};
pub use transport::{HttpTransport, Transport, TransportCompletion, TransportOptions};
