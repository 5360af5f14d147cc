//! Line-oriented driver for a headless shell.

use std::io::{BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use shell_frame::FormMethod;
use shell_io::Transport;
use shell_nav::Browser;

use crate::headless::{HeadlessHost, HeadlessSurface};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Back,
    Forward,
    Links,
    Forms,
    Click(usize),
    Submit {
        index: usize,
        fields: Vec<(String, String)>,
    },
    Show,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let command = match name {
        "open" | "o" => {
            let url = words.next().context("usage: open <url>")?;
            Command::Open(url.to_string())
        }
        "back" | "b" => Command::Back,
        "forward" | "f" => Command::Forward,
        "links" => Command::Links,
        "forms" => Command::Forms,
        "click" | "c" => Command::Click(parse_index(words.next(), "click <n>")?),
        "submit" | "s" => {
            let index = parse_index(words.next(), "submit <n> [name=value ...]")?;
            let fields = words
                .map(|pair| {
                    pair.split_once('=')
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .with_context(|| format!("expected name=value, got '{pair}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            Command::Submit { index, fields }
        }
        "show" | "p" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(command))
}

fn parse_index(word: Option<&str>, usage: &str) -> Result<usize> {
    let word = word.with_context(|| format!("usage: {usage}"))?;
    word.parse()
        .with_context(|| format!("'{word}' is not an index"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub type HeadlessBrowser<T> = Browser<T, HeadlessHost, HeadlessSurface>;

pub struct Session<T: Transport> {
    browser: HeadlessBrowser<T>,
    settle_timeout: Duration,
}

impl<T: Transport> Session<T> {
    /// `settle_timeout` bounds how long a navigation may take to settle.
    pub fn new(browser: HeadlessBrowser<T>, settle_timeout: Duration) -> Self {
        Self {
            browser,
            settle_timeout,
        }
    }

    pub fn browser(&self) -> &HeadlessBrowser<T> {
        &self.browser
    }

    /// Read commands until `quit`, end of input or the shell is left.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> Result<()> {
        self.show(out)?;
        for line in input.lines() {
            let line = line.context("failed to read command")?;
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    writeln!(out, "{err:#}")?;
                    continue;
                }
            };
            if self.execute(command, out)? == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<Flow> {
        let dispatched = match command {
            Command::Open(url) => self.browser.navigate(&url),
            Command::Back => {
                let url = self.history_step(|host| host.history.back().map(str::to_string));
                match url {
                    Some(url) => self.browser.pop_state(&url),
                    None => {
                        writeln!(out, "no previous page")?;
                        return Ok(Flow::Continue);
                    }
                }
            }
            Command::Forward => {
                let url = self.history_step(|host| host.history.forward().map(str::to_string));
                match url {
                    Some(url) => self.browser.pop_state(&url),
                    None => {
                        writeln!(out, "no next page")?;
                        return Ok(Flow::Continue);
                    }
                }
            }
            Command::Click(index) => match self.browser.activate_link(index) {
                Some(seq) => Some(seq),
                None => {
                    writeln!(out, "no link {index}")?;
                    return Ok(Flow::Continue);
                }
            },
            Command::Submit { index, fields } => {
                match self.browser.submit_form(index, &fields) {
                    Some(seq) => Some(seq),
                    None => {
                        writeln!(out, "no form {index}")?;
                        return Ok(Flow::Continue);
                    }
                }
            }
            Command::Links => {
                self.list_links(out)?;
                return Ok(Flow::Continue);
            }
            Command::Forms => {
                self.list_forms(out)?;
                return Ok(Flow::Continue);
            }
            Command::Show => {
                self.show(out)?;
                return Ok(Flow::Continue);
            }
            Command::Help => {
                writeln!(out, "{HELP}")?;
                return Ok(Flow::Continue);
            }
            Command::Quit => return Ok(Flow::Exit),
        };

        if dispatched.is_none() {
            writeln!(out, "navigation ignored")?;
            return Ok(Flow::Continue);
        }
        self.settle()?;

        if let Some(url) = self.browser.controller().terminated() {
            writeln!(out, "left the shell for {url}")?;
            return Ok(Flow::Exit);
        }
        self.show(out)?;
        Ok(Flow::Continue)
    }

    fn history_step(
        &mut self,
        step: impl FnOnce(&mut HeadlessHost) -> Option<String>,
    ) -> Option<String> {
        step(self.browser.controller_mut().host_mut())
    }

    /// Pump until nothing is in flight and no frame waits to be promoted.
    pub fn settle(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            self.browser.pump()?;
            let controller = self.browser.controller();
            if controller.is_terminated() || !controller.is_pending() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("navigation did not settle within {:?}", self.settle_timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn show(&self, out: &mut impl Write) -> Result<()> {
        let Some(document) = self.browser.visible_document() else {
            writeln!(out, "(nothing mounted)")?;
            return Ok(());
        };
        let controller = self.browser.controller();
        match controller.error_frame() {
            Some(error) => writeln!(out, "[{}] {}", error.url, document.title)?,
            None => writeln!(out, "[{}] {}", controller.current_frame().url, document.title)?,
        }
        if !document.text().is_empty() {
            writeln!(out, "{}", document.text())?;
        }
        Ok(())
    }

    fn list_links(&self, out: &mut impl Write) -> Result<()> {
        let Some(document) = self.browser.visible_document() else {
            return Ok(());
        };
        for (index, link) in document.links.iter().enumerate() {
            let scope = if link.same_origin { "" } else { "  (external)" };
            writeln!(
                out,
                "{index:>3}  {}  {} -> {}{scope}",
                link.text, link.href, link.target
            )?;
        }
        Ok(())
    }

    fn list_forms(&self, out: &mut impl Write) -> Result<()> {
        let Some(document) = self.browser.visible_document() else {
            return Ok(());
        };
        for (index, form) in document.forms.iter().enumerate() {
            let method = match form.method {
                FormMethod::Get => "GET",
                FormMethod::Post => "POST",
            };
            let fields: Vec<String> = form
                .fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            writeln!(out, "{index:>3}  {method} {}  {}", form.action, fields.join(" "))?;
        }
        Ok(())
    }
}

const HELP: &str = "\
open <url>                 navigate to a URL
back | forward             walk the session history
links | forms              list what the visible page offers
click <n>                  follow link n
submit <n> [name=value..]  submit form n with overrides
show                       print the visible page
quit                       leave";
