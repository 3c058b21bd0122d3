//! Navigation script parsing.
//!
//! One command per line; blank lines and `#` comments are skipped.
//!
//! ```text
//! open-screen main
//! open-popup settings
//! parallel open-popup confirm | open-popup toast
//! request-close confirm
//! close-popups
//! status
//! ```

use std::fmt;

/// Demo screens a script can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenName {
    Main,
    Game,
    Hud,
}

impl ScreenName {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "main" => Some(ScreenName::Main),
            "game" => Some(ScreenName::Game),
            "hud" => Some(ScreenName::Hud),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScreenName::Main => "main",
            ScreenName::Game => "game",
            ScreenName::Hud => "hud",
        }
    }
}

/// Demo popups a script can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupName {
    Settings,
    Confirm,
    Toast,
}

impl PopupName {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "settings" => Some(PopupName::Settings),
            "confirm" => Some(PopupName::Confirm),
            "toast" => Some(PopupName::Toast),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PopupName::Settings => "settings",
            PopupName::Confirm => "confirm",
            PopupName::Toast => "toast",
        }
    }
}

/// Anything `request-close` can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Screen(ScreenName),
    Popup(PopupName),
}

impl Target {
    fn parse(name: &str) -> Option<Self> {
        ScreenName::parse(name)
            .map(Target::Screen)
            .or_else(|| PopupName::parse(name).map(Target::Popup))
    }

    fn label(&self) -> &'static str {
        match self {
            Target::Screen(screen) => screen.label(),
            Target::Popup(popup) => popup.label(),
        }
    }
}

/// A single navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    OpenScreen(ScreenName),
    OpenPopup(PopupName),
    CloseScreen,
    ClosePopup(PopupName),
    ClosePopups,
    RequestClose(Target),
    Status,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::OpenScreen(screen) => write!(f, "open-screen {}", screen.label()),
            Step::OpenPopup(popup) => write!(f, "open-popup {}", popup.label()),
            Step::CloseScreen => write!(f, "close-screen"),
            Step::ClosePopup(popup) => write!(f, "close-popup {}", popup.label()),
            Step::ClosePopups => write!(f, "close-popups"),
            Step::RequestClose(target) => write!(f, "request-close {}", target.label()),
            Step::Status => write!(f, "status"),
        }
    }
}

/// One script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Single(Step),
    /// Steps started together and awaited as a group.
    Parallel(Vec<Step>),
}

impl Command {
    pub fn steps(&self) -> &[Step] {
        match self {
            Command::Single(step) => std::slice::from_ref(step),
            Command::Parallel(steps) => steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses a whole script, returning each command with its 1-based line number.
pub fn parse_script(source: &str) -> Result<Vec<(usize, Command)>, ParseError> {
    let mut commands = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        let command = parse_command(text).map_err(|message| ParseError { line, message })?;
        commands.push((line, command));
    }
    Ok(commands)
}

fn parse_command(text: &str) -> Result<Command, String> {
    if let Some(rest) = text.strip_prefix("parallel") {
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return Err(format!("unknown command `{}`", text));
        }
        let steps = rest
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_step)
            .collect::<Result<Vec<_>, _>>()?;
        if steps.len() < 2 {
            return Err("parallel needs at least two commands separated by `|`".to_string());
        }
        return Ok(Command::Parallel(steps));
    }
    parse_step(text).map(Command::Single)
}

fn parse_step(text: &str) -> Result<Step, String> {
    let mut words = text.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let arg = words.next();
    if let Some(extra) = words.next() {
        return Err(format!("unexpected argument `{}` after {}", extra, verb));
    }

    let screen = |arg: Option<&str>| {
        let name = arg.ok_or_else(|| format!("{} needs a screen name", verb))?;
        ScreenName::parse(name).ok_or_else(|| format!("unknown screen `{}`", name))
    };
    let popup = |arg: Option<&str>| {
        let name = arg.ok_or_else(|| format!("{} needs a popup name", verb))?;
        PopupName::parse(name).ok_or_else(|| format!("unknown popup `{}`", name))
    };
    let no_arg = |step: Step| match arg {
        Some(extra) => Err(format!("{} takes no argument, got `{}`", verb, extra)),
        None => Ok(step),
    };

    match verb {
        "open-screen" => screen(arg).map(Step::OpenScreen),
        "open-popup" => popup(arg).map(Step::OpenPopup),
        "close-screen" => no_arg(Step::CloseScreen),
        "close-popup" => popup(arg).map(Step::ClosePopup),
        "close-popups" => no_arg(Step::ClosePopups),
        "request-close" => {
            let name = arg.ok_or_else(|| "request-close needs a screen or popup name".to_string())?;
            Target::parse(name)
                .map(Step::RequestClose)
                .ok_or_else(|| format!("unknown screen or popup `{}`", name))
        }
        "status" => no_arg(Step::Status),
        "parallel" => Err("parallel cannot be nested".to_string()),
        other => Err(format!("unknown command `{}`", other)),
    }
}
