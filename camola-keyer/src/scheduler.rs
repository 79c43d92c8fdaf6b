use crate::capture::{CaptureSource, Frame};
use crate::compositor::{composite, mask_to_rgba, BackgroundSource};
use crate::config::PipelineConfig;
use crate::error::{CaptureError, TickError};
use crate::masking::ModeSelector;
use crate::stats::PipelineStats;
use std::time::Instant;

/// Lifecycle of the render loop. There is no stopped state: once running,
/// the loop only ends with the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// What a single tick decided to present
#[derive(Debug)]
pub enum TickOutcome {
    /// The scheduler has not been started
    Idle,
    /// Camera paused; nothing captured or presented
    Paused,
    /// No frame could be captured this tick
    NoFrame(CaptureError),
    /// Skipped by frame throttling; raw frame passes through
    Throttled(Frame),
    /// Mask and composite applied
    Processed(Frame),
    /// Processing failed; raw frame passes through
    Degraded(Frame, TickError),
}

impl TickOutcome {
    /// The frame to present, if this tick has one
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            TickOutcome::Throttled(frame)
            | TickOutcome::Processed(frame)
            | TickOutcome::Degraded(frame, _) => Some(frame),
            TickOutcome::Idle | TickOutcome::Paused | TickOutcome::NoFrame(_) => None,
        }
    }
}

/// Drives capture -> mask -> composite once per tick
pub struct FrameScheduler {
    state: SchedulerState,
    frame_counter: u64,
    selector: ModeSelector,
    stats: PipelineStats,
}

impl FrameScheduler {
    pub fn new(selector: ModeSelector) -> Self {
        Self {
            state: SchedulerState::Idle,
            frame_counter: 0,
            selector,
            stats: PipelineStats::default(),
        }
    }

    pub fn start(&mut self) {
        if self.state == SchedulerState::Idle {
            tracing::info!("Starting frame scheduler");
            self.state = SchedulerState::Running;
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of captured frames seen while running
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn selector_mut(&mut self) -> &mut ModeSelector {
        &mut self.selector
    }

    pub fn stats_mut(&mut self) -> &mut PipelineStats {
        &mut self.stats
    }

    /// Run one tick against a configuration snapshot.
    ///
    /// The raw frame is the default presentation; it is replaced by the
    /// composite only when the tick is not throttled and processing succeeds.
    pub fn tick(
        &mut self,
        capture: Option<&mut dyn CaptureSource>,
        background: Option<&mut dyn BackgroundSource>,
        config: PipelineConfig,
    ) -> TickOutcome {
        if self.state == SchedulerState::Idle {
            return TickOutcome::Idle;
        }
        if config.paused {
            return TickOutcome::Paused;
        }

        let capture_start = Instant::now();
        let frame = match capture {
            Some(source) => source.capture_frame(),
            None => Err(CaptureError::NoSource),
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => return TickOutcome::NoFrame(e),
        };
        self.stats.record_capture(capture_start.elapsed());

        let process = config.throttle.should_process(self.frame_counter);
        self.frame_counter += 1;
        if !process {
            self.stats.count_throttled();
            return TickOutcome::Throttled(frame);
        }

        let mask_start = Instant::now();
        let selected = self.selector.select_mask(&frame, &config.mode);
        self.stats.record_mask(mask_start.elapsed());
        let mask = match selected {
            Ok(mask) => mask,
            Err(e) => {
                tracing::warn!("{} masking failed, presenting raw frame: {}", config.mode.name(), e);
                self.stats.count_degraded();
                return TickOutcome::Degraded(frame, e.into());
            }
        };

        if config.show_matte {
            self.stats.count_processed();
            return TickOutcome::Processed(mask_to_rgba(&mask));
        }

        let composite_start = Instant::now();
        let (width, height) = frame.dimensions();
        let backdrop = match background {
            Some(bg) => match bg.render(width, height) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!("Compositing without background: {}", e);
                    None
                }
            },
            None => None,
        };

        let outcome = match composite(&frame, &mask, backdrop) {
            Ok(output) => {
                self.stats.count_processed();
                TickOutcome::Processed(output)
            }
            Err(e) => {
                tracing::warn!("Compositing failed, presenting raw frame: {}", e);
                self.stats.count_degraded();
                TickOutcome::Degraded(frame, e.into())
            }
        };
        self.stats.record_composite(composite_start.elapsed());

        outcome
    }
}
