//! Command Loop
//!
//! Line-oriented driver for the display manager. Each line is one command;
//! observer events produced by the command are written back as JSON lines.
//!
//! ```text
//! displays <spec>                replace the connected displays
//! add-remove                     add a second display or remove it
//! mirror on|off                  software/hardware mirroring
//! unified on|off                 unified desktop
//! mode <id> <W>x<H> [ui] [dsf]   select a display mode
//! rotate <id> <degrees>          rotate a display
//! zoom in|out                    step the internal UI scale
//! toggle-scale                   flip every display between scale 1 and 2
//! layout <position> <offset>     re-place every display against its parent
//! show                           print the active topology
//! quit
//! ```
//!
//! The deferred mirroring task runs at the top of every loop iteration.

use anyhow::{Context, Result};
use serde_json::json;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::display::{
    ChannelObserver, DisplayEvent, DisplayId, DisplayManager, DisplayMode, LoggingDelegate,
    Position, Rotation, RotationSource, Size,
};

/// Command parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid {name}: {value}")]
    InvalidArgument { name: &'static str, value: String },
}

/// One parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Displays(String),
    AddRemove,
    Mirror(bool),
    Unified(bool),
    Mode {
        id: DisplayId,
        size: Size,
        ui_scale: f32,
        device_scale_factor: f32,
    },
    Rotate {
        id: DisplayId,
        rotation: Rotation,
    },
    /// `true` makes content larger
    Zoom(bool),
    ToggleScale,
    Layout {
        position: Position,
        offset: i32,
    },
    Show,
    Quit,
}

fn invalid(name: &'static str, value: &str) -> CommandError {
    CommandError::InvalidArgument {
        name,
        value: value.to_string(),
    }
}

fn parse_on_off(value: Option<&str>) -> Result<bool, CommandError> {
    match value {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(other) => Err(invalid("switch", other)),
        None => Err(CommandError::MissingArgument("on|off")),
    }
}

fn parse_arg<T: std::str::FromStr>(
    value: Option<&str>,
    name: &'static str,
) -> Result<T, CommandError> {
    let value = value.ok_or(CommandError::MissingArgument(name))?;
    value.parse().map_err(|_| invalid(name, value))
}

fn parse_size(value: Option<&str>) -> Result<Size, CommandError> {
    let value = value.ok_or(CommandError::MissingArgument("resolution"))?;
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| invalid("resolution", value))?;
    match (width.parse(), height.parse()) {
        (Ok(width), Ok(height)) => Ok(Size::new(width, height)),
        _ => Err(invalid("resolution", value)),
    }
}

/// Parse one input line; blank lines and `#` comments yield `None`
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let command = match name {
        "displays" => Command::Displays(words.next().unwrap_or_default().to_string()),
        "add-remove" => Command::AddRemove,
        "mirror" => Command::Mirror(parse_on_off(words.next())?),
        "unified" => Command::Unified(parse_on_off(words.next())?),
        "mode" => {
            let id = parse_arg(words.next(), "display id")?;
            let size = parse_size(words.next())?;
            let ui_scale = match words.next() {
                Some(value) => parse_arg(Some(value), "ui scale")?,
                None => 1.0,
            };
            let device_scale_factor = match words.next() {
                Some(value) => parse_arg(Some(value), "device scale factor")?,
                None => 1.0,
            };
            Command::Mode {
                id,
                size,
                ui_scale,
                device_scale_factor,
            }
        }
        "rotate" => {
            let id = parse_arg(words.next(), "display id")?;
            let degrees: i32 = parse_arg(words.next(), "rotation")?;
            let rotation =
                Rotation::from_degrees(degrees).ok_or_else(|| invalid("rotation", &degrees.to_string()))?;
            Command::Rotate { id, rotation }
        }
        "zoom" => match words.next() {
            Some("in") => Command::Zoom(true),
            Some("out") => Command::Zoom(false),
            Some(other) => return Err(invalid("zoom direction", other)),
            None => return Err(CommandError::MissingArgument("in|out")),
        },
        "toggle-scale" => Command::ToggleScale,
        "layout" => {
            let position = words
                .next()
                .ok_or(CommandError::MissingArgument("position"))
                .and_then(|value| value.parse().map_err(|_| invalid("position", value)))?;
            let offset = match words.next() {
                Some(value) => parse_arg(Some(value), "offset")?,
                None => 0,
            };
            Command::Layout { position, offset }
        }
        "show" => Command::Show,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

/// Whether the loop keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Owns the manager and the receiving end of its event channel
pub struct Controller {
    manager: DisplayManager,
    events: UnboundedReceiver<DisplayEvent>,
}

impl Controller {
    /// Wrap a manager, subscribing to its events and installing a logging delegate
    pub fn new(mut manager: DisplayManager) -> Self {
        let (observer, events) = ChannelObserver::channel();
        manager.add_observer(Box::new(observer));
        manager.set_delegate(Box::new(LoggingDelegate::new()));
        Self { manager, events }
    }

    pub fn manager(&self) -> &DisplayManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut DisplayManager {
        &mut self.manager
    }

    /// Run one command
    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<Flow> {
        debug!("Executing {:?}", command);
        match command {
            Command::Displays(spec) => {
                self.manager
                    .init_from_spec(&spec)
                    .with_context(|| format!("Failed to apply displays {:?}", spec))?;
            }
            Command::AddRemove => self.manager.add_remove_display()?,
            Command::Mirror(enabled) => self.manager.set_mirror_mode(enabled)?,
            Command::Unified(enabled) => self.manager.set_unified_desktop_enabled(enabled)?,
            Command::Mode {
                id,
                size,
                ui_scale,
                device_scale_factor,
            } => {
                let requested = self.requested_mode(id, size, ui_scale, device_scale_factor);
                if !self.manager.set_display_mode(id, &requested)? {
                    writeln!(out, "mode unchanged")?;
                }
            }
            Command::Rotate { id, rotation } => {
                self.manager
                    .set_display_rotation(id, rotation, RotationSource::User)?;
            }
            Command::Zoom(larger_content) => {
                // Larger content means a smaller UI scale
                if !self.manager.zoom_internal_display(!larger_content)? {
                    writeln!(out, "zoom unchanged")?;
                }
            }
            Command::ToggleScale => self.manager.toggle_display_scale_factor()?,
            Command::Layout { position, offset } => {
                let mut layout = self.manager.current_display_layout();
                for placement in layout.placement_list.iter_mut() {
                    placement.position = position;
                    placement.offset = offset;
                }
                self.manager.set_layout_for_current_displays(layout)?;
            }
            Command::Show => self.show(out)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Fill in timing from the display's own candidate list
    fn requested_mode(
        &self,
        id: DisplayId,
        size: Size,
        ui_scale: f32,
        device_scale_factor: f32,
    ) -> DisplayMode {
        let wanted = DisplayMode::new(size, 60.0, false, false, ui_scale, device_scale_factor);
        self.manager
            .display_info(id)
            .and_then(|record| {
                record
                    .display_modes
                    .iter()
                    .find(|mode| mode.matches_resolution(&wanted))
                    .copied()
            })
            .unwrap_or(wanted)
    }

    fn show(&self, out: &mut impl Write) -> Result<()> {
        let primary = self.manager.primary_display_candidate();
        let summary = json!({
            "mode": self.manager.multi_display_mode(),
            "resolved": self.manager.resolved_mode(),
            "primary": primary.id,
            "displays": self.manager.active_displays(),
            "mirroring": self.manager.software_mirroring_displays(),
        });
        writeln!(out, "{}", serde_json::to_string(&summary)?)?;
        Ok(())
    }

    /// Run the deferred task, if any, and write pending events
    pub fn flush(&mut self, out: &mut impl Write) -> Result<()> {
        if self.manager.has_pending_tasks() {
            self.manager.run_pending_tasks();
        }
        while let Ok(event) = self.events.try_recv() {
            writeln!(out, "{}", serde_json::to_string(&event)?)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Read commands until EOF, `quit` or Ctrl-C
    ///
    /// A rejected command is reported on `out` and the loop continues.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        loop {
            self.flush(out)?;

            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read command")?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    None
                }
            };
            let Some(line) = line else {
                break;
            };

            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{}", e);
                    writeln!(out, "error: {}", e)?;
                    continue;
                }
            };

            match self.execute(command, out) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => {
                    warn!("Command failed: {:#}", e);
                    writeln!(out, "error: {:#}", e)?;
                }
            }
        }
        self.flush(out)?;
        Ok(())
    }
}
