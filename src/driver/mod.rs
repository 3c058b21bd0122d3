//! # Script Driver
//!
//! Runs navigation scripts against the demo presenters. This is the binary's
//! only job; it exists to exercise the navigator end to end from a terminal.
//!
//! Each line is executed in turn. The steps of a `parallel` line are started
//! together and awaited with `join_all`, so their loads and transitions
//! interleave. After every line, pending self-close requests are forwarded.
//! Navigation errors are reported and the script carries on; only parse and
//! output errors abort the run.

pub mod command;
pub mod demo;

use std::fmt;
use std::io::{self, Write};

use futures::future::join_all;
use log::{info, warn};

use crate::core::{NavigationError, NavigationSnapshot, Navigator, Presenter, PublicPresenter};
use command::{Command, PopupName, ScreenName, Step, Target};
use demo::{Confirm, Game, Hud, MainMenu, Settings, Toast};

pub use command::{ParseError, parse_script};

#[derive(Debug)]
pub enum DriverError {
    Parse(ParseError),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Parse(e) => write!(f, "script error: {e}"),
            DriverError::Io(e) => write!(f, "output error: {e}"),
            DriverError::Json(e) => write!(f, "snapshot encoding error: {e}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<ParseError> for DriverError {
    fn from(e: ParseError) -> Self {
        DriverError::Parse(e)
    }
}

impl From<io::Error> for DriverError {
    fn from(e: io::Error) -> Self {
        DriverError::Io(e)
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(e: serde_json::Error) -> Self {
        DriverError::Json(e)
    }
}

/// What a script run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScriptReport {
    pub steps: usize,
    pub failures: usize,
    /// Presenters closed because they asked to be.
    pub requested_closes: usize,
}

enum Outcome {
    Done(String),
    Snapshot(NavigationSnapshot),
}

/// Parses and runs `source`, writing one line per step to `out`.
pub async fn run_script(
    navigator: &Navigator,
    source: &str,
    out: &mut dyn Write,
) -> Result<ScriptReport, DriverError> {
    let commands = parse_script(source)?;
    info!("Running script with {} commands", commands.len());

    let mut report = ScriptReport::default();
    for (line, command) in &commands {
        let steps = command.steps();
        let results = join_all(steps.iter().map(|step| execute(navigator, step))).await;

        for (step, result) in steps.iter().zip(results) {
            report.steps += 1;
            match result {
                Ok(Outcome::Done(message)) => writeln!(out, "{message}")?,
                Ok(Outcome::Snapshot(snapshot)) => {
                    writeln!(out, "{}", serde_json::to_string_pretty(&snapshot)?)?
                }
                Err(e) => {
                    report.failures += 1;
                    warn!("Line {}: {} failed: {}", line, step, e);
                    writeln!(out, "line {line}: {step}: {e}")?;
                }
            }
        }

        match navigator.process_close_requests().await {
            Ok(0) => {}
            Ok(closed) => {
                report.requested_closes += closed;
                writeln!(out, "closed {closed} on request")?;
            }
            Err(e) => {
                report.failures += 1;
                warn!("Line {}: requested close failed: {}", line, e);
                writeln!(out, "line {line}: requested close: {e}")?;
            }
        }
    }

    info!(
        "Script finished: {} steps, {} failures",
        report.steps, report.failures
    );
    Ok(report)
}

async fn execute(navigator: &Navigator, step: &Step) -> Result<Outcome, NavigationError> {
    match *step {
        Step::OpenScreen(screen) => open_screen(navigator, screen).await,
        Step::OpenPopup(popup) => open_popup(navigator, popup).await,
        Step::CloseScreen => {
            navigator.close_current_screen().await?;
            Ok(Outcome::Done("closed screen".to_string()))
        }
        Step::ClosePopup(popup) => {
            match popup {
                PopupName::Settings => navigator.close_popup::<Settings>().await?,
                PopupName::Confirm => navigator.close_popup::<Confirm>().await?,
                PopupName::Toast => navigator.close_popup::<Toast>().await?,
            }
            Ok(Outcome::Done(format!("closed popup {}", popup.label())))
        }
        Step::ClosePopups => {
            let count = navigator.popup_count();
            navigator.close_all_popups().await?;
            Ok(Outcome::Done(format!("closed {count} popups")))
        }
        Step::RequestClose(target) => request_close(navigator, target),
        Step::Status => Ok(Outcome::Snapshot(navigator.snapshot())),
    }
}

async fn open_screen(navigator: &Navigator, screen: ScreenName) -> Result<Outcome, NavigationError> {
    let path = match screen {
        ScreenName::Main => navigator.open_screen::<MainMenu>(None).await?.path(),
        ScreenName::Game => navigator.open_screen::<Game>(None).await?.path(),
        ScreenName::Hud => navigator.open_screen::<Hud>(None).await?.path(),
    };
    Ok(Outcome::Done(format!("opened screen {path}")))
}

async fn open_popup(navigator: &Navigator, popup: PopupName) -> Result<Outcome, NavigationError> {
    let handle_path = match popup {
        PopupName::Settings => navigator.open_popup::<Settings>(None).await?.path(),
        PopupName::Confirm => navigator.open_popup::<Confirm>(None).await?.path(),
        PopupName::Toast => navigator.open_popup::<Toast>(None).await?.path(),
    };
    Ok(Outcome::Done(format!("opened popup {handle_path}")))
}

fn request_close(navigator: &Navigator, target: Target) -> Result<Outcome, NavigationError> {
    let requested = match target {
        Target::Screen(ScreenName::Main) => request_screen::<MainMenu>(navigator),
        Target::Screen(ScreenName::Game) => request_screen::<Game>(navigator),
        Target::Screen(ScreenName::Hud) => request_screen::<Hud>(navigator),
        Target::Popup(PopupName::Settings) => request_popup::<Settings>(navigator),
        Target::Popup(PopupName::Confirm) => request_popup::<Confirm>(navigator),
        Target::Popup(PopupName::Toast) => request_popup::<Toast>(navigator),
    };
    match requested {
        Some(path) => Ok(Outcome::Done(format!("requested close of {path}"))),
        None => Err(NavigationError::InvalidTransition(
            "nothing open to request a close from".to_string(),
        )),
    }
}

fn request_screen<P: Presenter>(navigator: &Navigator) -> Option<&'static str> {
    let handle = navigator.active_screen::<P>()?;
    handle.request_close();
    Some(handle.path())
}

fn request_popup<P: Presenter>(navigator: &Navigator) -> Option<&'static str> {
    let handle = navigator.popup::<P>()?;
    handle.request_close();
    Some(handle.path())
}
