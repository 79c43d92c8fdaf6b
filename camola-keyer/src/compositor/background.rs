use crate::error::CompositeError;
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, RgbaImage};
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

/// Replacement background renderable at a requested size
pub trait BackgroundSource {
    /// The background for this tick, scaled to `width`x`height`
    fn render(&mut self, width: u32, height: u32) -> Result<&RgbaImage, CompositeError>;
}

fn scale(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
    }
}

fn check_target(width: u32, height: u32) -> Result<(), CompositeError> {
    if width == 0 || height == 0 {
        return Err(CompositeError::BackgroundUnavailable(format!(
            "cannot render at {}x{}",
            width, height
        )));
    }
    Ok(())
}

/// Still image, rescaled only when the target size changes
pub struct StillBackground {
    source: RgbaImage,
    scaled: Option<RgbaImage>,
}

impl StillBackground {
    pub fn new(source: RgbaImage) -> Self {
        Self {
            source,
            scaled: None,
        }
    }
}

impl BackgroundSource for StillBackground {
    fn render(&mut self, width: u32, height: u32) -> Result<&RgbaImage, CompositeError> {
        check_target(width, height)?;

        let stale = self
            .scaled
            .as_ref()
            .map_or(true, |s| s.dimensions() != (width, height));
        if stale {
            self.scaled = Some(scale(&self.source, width, height));
        }

        self.scaled
            .as_ref()
            .ok_or_else(|| CompositeError::BackgroundUnavailable("still image not scaled".into()))
    }
}

/// Used for animation frames that carry no delay of their own
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Looping animation played on its own clock, independent of how often it
/// is rendered
pub struct AnimatedBackground {
    frames: Vec<RgbaImage>,
    delays: Vec<Duration>,
    loop_length: Duration,
    scaled: Vec<RgbaImage>,
    scaled_size: (u32, u32),
    started: Option<Instant>,
}

impl AnimatedBackground {
    /// Build from frames paired with how long each one stays on screen
    pub fn new(frames: Vec<(RgbaImage, Duration)>) -> Result<Self, CompositeError> {
        if frames.is_empty() {
            return Err(CompositeError::BackgroundUnavailable(
                "animation has no frames".into(),
            ));
        }

        let (frames, delays): (Vec<_>, Vec<_>) = frames
            .into_iter()
            .map(|(frame, delay)| {
                let delay = if delay.is_zero() {
                    DEFAULT_FRAME_DELAY
                } else {
                    delay
                };
                (frame, delay)
            })
            .unzip();
        let loop_length = delays.iter().sum();

        Ok(Self {
            frames,
            delays,
            loop_length,
            scaled: Vec::new(),
            scaled_size: (0, 0),
            started: None,
        })
    }

    /// Index of the frame on screen `elapsed` after playback started
    fn frame_index(&self, elapsed: Duration) -> usize {
        let loop_nanos = self.loop_length.as_nanos().max(1);
        let mut offset = Duration::from_nanos((elapsed.as_nanos() % loop_nanos) as u64);

        for (index, delay) in self.delays.iter().enumerate() {
            if offset < *delay {
                return index;
            }
            offset -= *delay;
        }
        self.delays.len() - 1
    }
}

impl BackgroundSource for AnimatedBackground {
    fn render(&mut self, width: u32, height: u32) -> Result<&RgbaImage, CompositeError> {
        check_target(width, height)?;

        if self.scaled.is_empty() || self.scaled_size != (width, height) {
            tracing::debug!(
                "Scaling {} background frames to {}x{}",
                self.frames.len(),
                width,
                height
            );
            self.scaled = self
                .frames
                .iter()
                .map(|f| scale(f, width, height))
                .collect();
            self.scaled_size = (width, height);
        }

        let elapsed = self.started.get_or_insert_with(Instant::now).elapsed();
        let index = self.frame_index(elapsed);

        self.scaled.get(index).ok_or_else(|| {
            CompositeError::BackgroundUnavailable(format!("missing animation frame {}", index))
        })
    }
}

fn unavailable<E: Display>(path: &Path, err: E) -> CompositeError {
    CompositeError::BackgroundUnavailable(format!("{}: {}", path.display(), err))
}

/// Load a background from disk: `.gif` files loop as animations, anything else
/// is decoded as a still image
pub fn load_background<P: AsRef<Path>>(
    path: P,
) -> Result<Box<dyn BackgroundSource>, CompositeError> {
    let path = path.as_ref();

    let is_gif = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));

    if is_gif {
        let file = File::open(path).map_err(|e| unavailable(path, e))?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| unavailable(path, e))?;
        let frames: Vec<(RgbaImage, Duration)> = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| unavailable(path, e))?
            .into_iter()
            .map(|frame| {
                let delay = Duration::from(frame.delay());
                (frame.into_buffer(), delay)
            })
            .collect();

        tracing::info!(
            "Loaded animated background {} ({} frames)",
            path.display(),
            frames.len()
        );
        Ok(Box::new(AnimatedBackground::new(frames)?))
    } else {
        let image = image::open(path).map_err(|e| unavailable(path, e))?.into_rgba8();
        let (width, height) = image.dimensions();
        tracing::info!(
            "Loaded background image {} ({}x{})",
            path.display(),
            width,
            height
        );
        Ok(Box::new(StillBackground::new(image)))
    }
}
