mod capture;
mod compositor;
mod config;
mod control;
mod error;
mod masking;
mod output;
mod scheduler;
mod segmentation;
mod stats;

use anyhow::{Context, Result};
use capture::{open_webcam, reconfigure_capture, CaptureConfig, CaptureSource, StillCapture};
use clap::Parser;
use compositor::{load_background, BackgroundSource};
use config::{AiParams, ChromaParams, ThrottleConfig};
use control::{ControlAction, ControlCommand, ControlState, ModeKind};
use crossbeam_channel::Receiver;
use error::CaptureError;
use masking::{AiProvider, InferenceMasker, ModeSelector};
use output::{OutputSink, V4L2Output};
use scheduler::{FrameScheduler, TickOutcome};
use segmentation::ModelKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Use a still image instead of a webcam
    #[arg(long)]
    input_image: Option<PathBuf>,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Initial background removal mode
    #[arg(long, value_enum, default_value_t = ModeKind::Chroma)]
    mode: ModeKind,

    /// Chroma key color
    #[arg(long, default_value = "#00ff00", value_parser = parse_key_color)]
    key_color: [u8; 3],

    /// Per-channel chroma tolerance
    #[arg(long, default_value_t = config::DEFAULT_TOLERANCE)]
    tolerance: u8,

    /// Matte threshold for AI mode (0-255)
    #[arg(long, default_value_t = config::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Process 1 frame out of every SKIP + 1
    #[arg(long, default_value_t = 0)]
    skip: u32,

    /// Path to segmentation model (ONNX file)
    /// If not provided, AI mode is unavailable and degrades to passthrough
    #[arg(long)]
    model: Option<PathBuf>,

    /// Segmentation model family
    #[arg(long, value_enum, default_value_t = ModelKind::U2net)]
    model_kind: ModelKind,

    /// Replacement background (image, or GIF for a looping animation)
    #[arg(long)]
    background: Option<PathBuf>,

    /// Show matte visualization (grayscale silhouette) instead of the composite
    #[arg(long)]
    show_matte: bool,
}

fn parse_key_color(input: &str) -> Result<[u8; 3], String> {
    config::parse_hex_color(input).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Camola keyer starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);
    tracing::info!("Target FPS: {}", args.fps);

    let state = ControlState {
        mode: args.mode,
        chroma: ChromaParams {
            key: args.key_color,
            tolerance: args.tolerance,
        },
        ai: AiParams {
            threshold: args.threshold,
        },
        throttle: ThrottleConfig::new(args.skip),
        show_matte: args.show_matte,
        paused: false,
        capture: CaptureConfig {
            device_index: args.input_device,
            width: args.capture_width,
            height: args.capture_height,
        },
    };

    // Initialize capture
    let capture: Box<dyn CaptureSource> = match &args.input_image {
        Some(path) => Box::new(
            StillCapture::open(path, args.capture_width, args.capture_height)
                .context("Failed to load input image")?,
        ),
        None => open_webcam(&state.capture).context("Failed to initialize webcam capture")?,
    };

    // Initialize output
    let output = V4L2Output::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;

    // Initialize segmentation model if provided
    let ai: Option<AiProvider> = if let Some(model_path) = &args.model {
        tracing::info!(
            "Loading {:?} segmentation model from {}",
            args.model_kind,
            model_path.display()
        );
        let model = segmentation::create_model(args.model_kind, model_path)
            .context("Failed to load segmentation model")?;
        tracing::info!("Segmentation model loaded successfully");
        let masker: AiProvider = Box::new(InferenceMasker::new(model));
        Some(masker)
    } else {
        tracing::info!("No segmentation model, AI mode will pass frames through");
        None
    };

    let background = args.background.as_deref().and_then(open_background);
    let commands = control::spawn_stdin_reader()?;

    let mut render = RenderLoop {
        scheduler: FrameScheduler::new(ModeSelector::new(ai)),
        capture: Some(capture),
        output,
        background,
        state,
        open_camera: open_webcam,
        camera_locked: args.input_image.is_some(),
        failed_captures: 0,
    };
    run_pipeline(&mut render, &commands, args.fps)
}

/// Load a background, treating failures as "no background"
fn open_background(path: &Path) -> Option<Box<dyn BackgroundSource>> {
    match load_background(path) {
        Ok(background) => Some(background),
        Err(e) => {
            tracing::warn!("Continuing without background: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Everything the render loop owns between ticks
struct RenderLoop<O, F> {
    scheduler: FrameScheduler,
    capture: Option<Box<dyn CaptureSource>>,
    output: O,
    background: Option<Box<dyn BackgroundSource>>,
    state: ControlState,
    open_camera: F,
    /// Still-image input ignores camera commands
    camera_locked: bool,
    failed_captures: u64,
}

impl<O, F> RenderLoop<O, F>
where
    O: OutputSink,
    F: FnMut(&CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError>,
{
    /// Apply control input received since the previous tick
    fn apply_commands<I>(&mut self, commands: I) -> Flow
    where
        I: IntoIterator<Item = ControlCommand>,
    {
        for command in commands {
            match self.state.apply(command) {
                Some(ControlAction::Quit) => {
                    tracing::info!(
                        "Quit requested after {} captured frames ({} presented)",
                        self.scheduler.frame_counter(),
                        self.scheduler.stats_mut().presented()
                    );
                    return Flow::Quit;
                }
                Some(ControlAction::SetBackground(path)) => {
                    self.background = path.as_deref().and_then(open_background);
                    if self.background.is_none() {
                        tracing::info!("Background cleared");
                    }
                }
                Some(ControlAction::ReconfigureCapture(config)) if self.camera_locked => {
                    tracing::warn!("Ignoring camera change to {:?}: input is a still image", config);
                }
                Some(ControlAction::ReconfigureCapture(config)) => {
                    self.capture =
                        match reconfigure_capture(self.capture.take(), &config, &mut self.open_camera)
                        {
                            Ok(source) => Some(source),
                            Err(e) => {
                                tracing::error!("Camera unavailable: {}", e);
                                None
                            }
                        };
                    self.scheduler.selector_mut().reset();
                }
                None => {}
            }
        }
        Flow::Continue
    }

    /// Run one scheduler tick and present its frame. Only a failing output
    /// sink is an error.
    fn tick(&mut self) -> Result<()> {
        let config = self.state.snapshot();
        let outcome = self.scheduler.tick(
            self.capture
                .as_mut()
                .map(|c| -> &mut dyn CaptureSource { &mut **c }),
            self.background
                .as_mut()
                .map(|b| -> &mut dyn BackgroundSource { &mut **b }),
            config,
        );

        if let TickOutcome::NoFrame(e) = &outcome {
            if self.failed_captures % 30 == 0 {
                tracing::warn!("No frame this tick: {}", e);
            }
            self.failed_captures += 1;
        } else {
            self.failed_captures = 0;
        }

        if let Some(frame) = outcome.into_frame() {
            let output_start = Instant::now();
            self.output
                .write_frame(&frame)
                .context("Failed to write frame")?;
            let stats = self.scheduler.stats_mut();
            stats.record_output(output_start.elapsed());
            stats.frame_presented();
        }

        Ok(())
    }
}

fn run_pipeline<O, F>(
    render: &mut RenderLoop<O, F>,
    commands: &Receiver<ControlCommand>,
    target_fps: u32,
) -> Result<()>
where
    O: OutputSink,
    F: FnMut(&CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError>,
{
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);

    let (width, height) = render.output.resolution();
    tracing::info!("Starting main pipeline loop, presenting at {}x{}", width, height);
    tracing::info!("Commands: mode chroma|ai, skip N, color #rrggbb, tolerance N, threshold N, matte on|off, pause, play, background PATH|none, camera INDEX [WxH], resolution WxH, quit");
    render.scheduler.start();

    loop {
        let loop_start = Instant::now();

        if render.apply_commands(commands.try_iter()) == Flow::Quit {
            return Ok(());
        }
        render.tick()?;

        // Frame rate limiting
        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;
    use crate::masking::tests::FakeAi;
    use crossbeam_channel::Sender;
    use image::Rgba;

    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const CUT_OUT: Rgba<u8> = Rgba([0, 0, 0, 0]);

    /// Records written frames; can fail, or send `quit` after a number of frames
    struct RecordingSink {
        frames: Vec<Frame>,
        fail: bool,
        quit_after: Option<(usize, Sender<ControlCommand>)>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                frames: Vec::new(),
                fail: false,
                quit_after: None,
            }
        }
    }

    impl OutputSink for RecordingSink {
        fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            if self.fail {
                anyhow::bail!("loopback device went away");
            }
            self.frames.push(frame.clone());
            if let Some((count, tx)) = &self.quit_after {
                if self.frames.len() == *count {
                    tx.send(ControlCommand::Quit)?;
                }
            }
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (4, 4)
        }
    }

    fn green_camera() -> Box<dyn CaptureSource> {
        Box::new(StillCapture::from_frame(Frame::from_pixel(4, 4, GREEN), 4, 4))
    }

    /// Device 9 is missing; every other index opens a green camera
    fn open_test_camera(config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
        if config.device_index == 9 {
            return Err(CaptureError::Open("no such device".into()));
        }
        Ok(green_camera())
    }

    fn state() -> ControlState {
        ControlState {
            mode: ModeKind::Chroma,
            chroma: ChromaParams::default(),
            ai: AiParams::default(),
            throttle: ThrottleConfig::default(),
            show_matte: false,
            paused: false,
            capture: CaptureConfig {
                device_index: 0,
                width: 4,
                height: 4,
            },
        }
    }

    type TestOpener = fn(&CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError>;

    fn render_loop(output: RecordingSink, ai: FakeAi) -> RenderLoop<RecordingSink, TestOpener> {
        let ai: AiProvider = Box::new(ai);
        RenderLoop {
            scheduler: FrameScheduler::new(ModeSelector::new(Some(ai))),
            capture: Some(green_camera()),
            output,
            background: None,
            state: state(),
            open_camera: open_test_camera as TestOpener,
            camera_locked: false,
            failed_captures: 0,
        }
    }

    fn started(output: RecordingSink, ai: FakeAi) -> RenderLoop<RecordingSink, TestOpener> {
        let mut render = render_loop(output, ai);
        render.scheduler.start();
        render
    }

    fn all(frame: &Frame, pixel: Rgba<u8>) -> bool {
        frame.pixels().all(|p| *p == pixel)
    }

    #[test]
    fn commands_apply_between_ticks_until_quit() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ControlCommand::Skip(1)).unwrap();

        let mut output = RecordingSink::new();
        output.quit_after = Some((4, tx.clone()));
        let mut render = render_loop(output, FakeAi::new(0));

        run_pipeline(&mut render, &rx, 1000).unwrap();

        let frames = &render.output.frames;
        assert_eq!(frames.len(), 4);
        assert!(all(&frames[0], CUT_OUT));
        assert!(all(&frames[1], GREEN));
        assert!(all(&frames[2], CUT_OUT));
        assert!(all(&frames[3], GREEN));
        assert_eq!(render.scheduler.frame_counter(), 4);
    }

    #[test]
    fn quit_stops_before_later_commands() {
        let mut render = started(RecordingSink::new(), FakeAi::new(0));
        let flow = render.apply_commands([ControlCommand::Quit, ControlCommand::Skip(3)]);

        assert_eq!(flow, Flow::Quit);
        assert_eq!(render.state.throttle, ThrottleConfig::default());
    }

    #[test]
    fn failed_camera_switch_keeps_running_without_source() {
        let ai = FakeAi::new(0);
        let resets = ai.resets.clone();
        let mut render = started(RecordingSink::new(), ai);

        let flow = render.apply_commands([ControlCommand::Camera {
            device_index: 9,
            resolution: None,
        }]);
        assert_eq!(flow, Flow::Continue);
        assert!(render.capture.is_none());
        assert_eq!(resets.get(), 1);

        render.tick().unwrap();
        render.tick().unwrap();
        assert_eq!(render.failed_captures, 2);
        assert!(render.output.frames.is_empty());

        render.apply_commands([ControlCommand::Camera {
            device_index: 0,
            resolution: None,
        }]);
        assert_eq!(resets.get(), 2);
        render.tick().unwrap();
        assert_eq!(render.failed_captures, 0);
        assert_eq!(render.output.frames.len(), 1);
    }

    #[test]
    fn still_input_ignores_camera_commands() {
        let ai = FakeAi::new(0);
        let resets = ai.resets.clone();
        let mut render = started(RecordingSink::new(), ai);
        render.camera_locked = true;

        render.apply_commands([ControlCommand::Camera {
            device_index: 9,
            resolution: None,
        }]);

        assert!(render.capture.is_some());
        assert_eq!(resets.get(), 0);
    }

    #[test]
    fn output_failure_ends_the_loop() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let mut output = RecordingSink::new();
        output.fail = true;
        let mut render = render_loop(output, FakeAi::new(0));

        assert!(run_pipeline(&mut render, &rx, 1000).is_err());
        assert!(render.output.frames.is_empty());
    }
}
