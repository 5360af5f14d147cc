//! Headless admin shell.
//!
//! Boots the navigation controller from a saved host page or a first fetch
//! of the admin root, then drives it from commands read on stdin.

mod headless;
mod session;

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use shell_config::ShellConfig;
use shell_frame::Bootstrap;
use shell_io::{HttpTransport, ShellRequest, ShellResponse, Transport, TransportOptions};
use shell_nav::{Browser, ClientViews, NavigationController};
use url::Url;

pub use headless::{HeadlessHost, HeadlessSurface};
pub use session::{Command, Flow, HeadlessBrowser, Session, parse_command};

/// Request id used for the bootstrap fetch; navigation ids start at 1.
const BOOTSTRAP_REQUEST_ID: u64 = 0;

/// Command line options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// `--config=<path>`: TOML file to load instead of `shell.toml`.
    pub config: Option<PathBuf>,
    /// `--page=<path>`: saved host page to boot from without a fetch.
    pub page: Option<PathBuf>,
    /// `--url=<path>`: URL of the initial frame. Defaults to the admin root.
    pub url: Option<String>,
}

impl Options {
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut options = Options::default();
        for arg in args.into_iter().skip(1) {
            let arg = arg.into();
            let arg = arg
                .to_str()
                .with_context(|| format!("argument is not valid UTF-8: {arg:?}"))?;
            if let Some(path) = arg.strip_prefix("--config=") {
                options.config = Some(PathBuf::from(path));
            } else if let Some(path) = arg.strip_prefix("--page=") {
                options.page = Some(PathBuf::from(path));
            } else if let Some(url) = arg.strip_prefix("--url=") {
                options.url = Some(url.to_string());
            } else {
                bail!("unknown argument '{arg}'");
            }
        }
        Ok(options)
    }
}

pub fn run() -> Result<()> {
    let options = Options::from_args(std::env::args_os())?;
    let config = ShellConfig::load(options.config.as_deref())?;
    init_logging(&config);

    let transport_options = transport_options(&config)?;
    let base_url = transport_options.base_url.clone();
    let timeout = transport_options.timeout;
    let mut transport = HttpTransport::new(transport_options)?;

    let initial_url = options.url.clone().unwrap_or_else(|| config.admin_root());
    let bootstrap = match &options.page {
        Some(path) => {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read host page {}", path.display()))?;
            Bootstrap::from_host_page(&html)?
        }
        None => Bootstrap::from_response(fetch_initial(&mut transport, &initial_url, timeout)?),
    };
    if let Some(props) = &bootstrap.props {
        log::debug!("shell props: {props:?}");
    }

    let browser = boot(transport, base_url, &initial_url, bootstrap)?;
    let mut session = Session::new(browser, timeout + Duration::from_secs(5));
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    session.run(stdin.lock(), &mut stdout)
}

/// Build the browser around an initial response; no request is issued.
pub fn boot<T: Transport>(
    transport: T,
    base_url: Url,
    initial_url: &str,
    bootstrap: Bootstrap,
) -> Result<HeadlessBrowser<T>> {
    let title = match &bootstrap.initial_response {
        ShellResponse::RenderHtml { title, .. } => title.clone(),
        _ => String::new(),
    };
    let controller = NavigationController::new(
        transport,
        HeadlessHost::new(initial_url, title),
        initial_url,
        bootstrap.initial_response,
    );
    Browser::new(controller, HeadlessSurface::new(), base_url, ClientViews::new())
}

fn init_logging(config: &ShellConfig) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    if let Some(filter) = &config.logging.filter {
        builder.parse_filters(filter);
    }
    if let Ok(filter) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }
    // Ignore errors if a logger is already installed
    let _ = builder.try_init();
}

pub fn transport_options(config: &ShellConfig) -> Result<TransportOptions> {
    let base_url = Url::parse(&config.server.base_url)
        .with_context(|| format!("invalid base url '{}'", config.server.base_url))?;
    let mut options = TransportOptions::new(base_url);
    options.admin_root = config.admin_root();
    options.timeout = Duration::from_secs(config.server.request_timeout_secs);
    options.user_agent = config.server.user_agent.clone();
    options.request_marker = (
        config.protocol.request_header.clone(),
        config.protocol.request_header_value.clone(),
    );
    options.status_header = config.protocol.status_header.clone();
    Ok(options)
}

/// Fetch the first frame when there is no host page to read it from.
pub fn fetch_initial<T: Transport>(
    transport: &mut T,
    url: &str,
    timeout: Duration,
) -> Result<ShellResponse> {
    log::info!("fetching initial page {url}");
    transport.request(ShellRequest::get(BOOTSTRAP_REQUEST_ID, url));
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(completion) = transport
            .poll()
            .into_iter()
            .find(|completion| completion.request_id == BOOTSTRAP_REQUEST_ID)
        {
            let response = completion
                .result
                .with_context(|| format!("failed to fetch {url}"))?;
            if response == ShellResponse::LoadExternally {
                bail!("{url} is not served as a shell page");
            }
            return Ok(response);
        }
        if !transport.has_pending() {
            bail!("no response for {url}");
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for {url}");
        }
        thread::sleep(Duration::from_millis(10));
    }
}
