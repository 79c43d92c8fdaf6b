use crate::capture::CaptureConfig;
use crate::config::{
    parse_hex_color, parse_resolution, AiParams, ChromaParams, PipelineConfig, RemovalMode,
    ThrottleConfig,
};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use crossbeam_channel::{Receiver, Sender};
use std::io::BufRead;
use std::path::PathBuf;

/// Which removal mode is selected, independent of its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeKind {
    Chroma,
    Ai,
}

/// A single line from the control surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Mode(ModeKind),
    Skip(u32),
    Color([u8; 3]),
    Tolerance(u8),
    Threshold(u8),
    ShowMatte(bool),
    Pause,
    Play,
    Background(Option<PathBuf>),
    Camera {
        device_index: u32,
        resolution: Option<(u32, u32)>,
    },
    Resolution(u32, u32),
    Quit,
}

impl ControlCommand {
    /// Parse one control line, e.g. `mode ai` or `skip 2`
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().context("empty command")?;
        let arg = words.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("mode", Some(mode)) => ControlCommand::Mode(
                ModeKind::from_str(mode, true)
                    .map_err(|e| anyhow::anyhow!("invalid mode {:?}: {}", mode, e))?,
            ),
            ("skip", Some(n)) => {
                ControlCommand::Skip(n.parse().with_context(|| format!("invalid skip {:?}", n))?)
            }
            ("color", Some(hex)) => ControlCommand::Color(parse_hex_color(hex)?),
            ("tolerance", Some(n)) => ControlCommand::Tolerance(
                n.parse()
                    .with_context(|| format!("invalid tolerance {:?}", n))?,
            ),
            ("threshold", Some(n)) => ControlCommand::Threshold(
                n.parse()
                    .with_context(|| format!("invalid threshold {:?}", n))?,
            ),
            ("matte", Some("on")) => ControlCommand::ShowMatte(true),
            ("matte", Some("off")) => ControlCommand::ShowMatte(false),
            ("pause", None) => ControlCommand::Pause,
            ("play", None) => ControlCommand::Play,
            ("background", Some("none")) => ControlCommand::Background(None),
            ("background", Some(_)) => {
                // paths may contain spaces
                let path = line.trim_start()[verb.len()..].trim();
                ControlCommand::Background(Some(PathBuf::from(path)))
            }
            ("camera", Some(index)) => ControlCommand::Camera {
                device_index: index
                    .parse()
                    .with_context(|| format!("invalid camera index {:?}", index))?,
                resolution: words.next().map(parse_resolution).transpose()?,
            },
            ("resolution", Some(res)) => {
                let (width, height) = parse_resolution(res)?;
                ControlCommand::Resolution(width, height)
            }
            ("quit", None) => ControlCommand::Quit,
            _ => bail!("unrecognized command {:?}", line.trim()),
        };

        // a background path already consumed the rest of the line
        let takes_rest = matches!(command, ControlCommand::Background(Some(_)));
        if !takes_rest && words.next().is_some() {
            bail!("unexpected trailing input in {:?}", line.trim());
        }

        Ok(command)
    }
}

/// Side effects the render loop must carry out after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    SetBackground(Option<PathBuf>),
    ReconfigureCapture(CaptureConfig),
    Quit,
}

/// Settings owned by the control surface; the render loop is its only writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub mode: ModeKind,
    pub chroma: ChromaParams,
    pub ai: AiParams,
    pub throttle: ThrottleConfig,
    pub show_matte: bool,
    pub paused: bool,
    pub capture: CaptureConfig,
}

impl ControlState {
    /// Configuration snapshot for the next tick
    pub fn snapshot(&self) -> PipelineConfig {
        let mode = match self.mode {
            ModeKind::Chroma => RemovalMode::Chroma(self.chroma),
            ModeKind::Ai => RemovalMode::Ai(self.ai),
        };
        PipelineConfig {
            mode,
            throttle: self.throttle,
            show_matte: self.show_matte,
            paused: self.paused,
        }
    }

    pub fn apply(&mut self, command: ControlCommand) -> Option<ControlAction> {
        tracing::debug!("Control command: {:?}", command);
        match command {
            ControlCommand::Mode(mode) => {
                tracing::info!("Removal mode set to {:?}", mode);
                self.mode = mode;
            }
            ControlCommand::Skip(skip) => {
                tracing::info!("Processing 1 of every {} frames", u64::from(skip) + 1);
                self.throttle = ThrottleConfig::new(skip);
            }
            ControlCommand::Color(key) => self.chroma.key = key,
            ControlCommand::Tolerance(tolerance) => self.chroma.tolerance = tolerance,
            ControlCommand::Threshold(threshold) => self.ai.threshold = threshold,
            ControlCommand::ShowMatte(show) => self.show_matte = show,
            ControlCommand::Pause => self.paused = true,
            ControlCommand::Play => self.paused = false,
            ControlCommand::Background(path) => return Some(ControlAction::SetBackground(path)),
            ControlCommand::Camera {
                device_index,
                resolution,
            } => {
                self.capture.device_index = device_index;
                if let Some((width, height)) = resolution {
                    self.capture.width = width;
                    self.capture.height = height;
                }
                return Some(ControlAction::ReconfigureCapture(self.capture));
            }
            ControlCommand::Resolution(width, height) => {
                self.capture.width = width;
                self.capture.height = height;
                return Some(ControlAction::ReconfigureCapture(self.capture));
            }
            ControlCommand::Quit => return Some(ControlAction::Quit),
        }
        None
    }
}

/// Read control commands from stdin on a background thread
pub fn spawn_stdin_reader() -> Result<Receiver<ControlCommand>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("control".into())
        .spawn(move || read_commands(std::io::stdin().lock(), &tx))
        .context("Failed to spawn control thread")?;
    Ok(rx)
}

fn read_commands<R: BufRead>(reader: R, tx: &Sender<ControlCommand>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Control input closed: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match ControlCommand::parse(&line) {
            Ok(command) => {
                if tx.send(command).is_err() {
                    return;
                }
            }
            Err(e) => tracing::warn!("Ignoring control input: {:#}", e),
        }
    }
    tracing::debug!("Control input reached end of stream");
}
