use anyhow::{bail, Context, Result};

/// Default per-channel chroma tolerance
pub const DEFAULT_TOLERANCE: u8 = 40;

/// Default matte threshold, midpoint of the 8-bit range
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Default key color: pure green
pub const DEFAULT_KEY: [u8; 3] = [0, 255, 0];

/// Parameters for chroma-key masking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaParams {
    /// Key color as RGB
    pub key: [u8; 3],
    /// Per-channel band around the key color
    pub tolerance: u8,
}

impl Default for ChromaParams {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ChromaParams {
    /// Inclusive per-channel lower and upper bounds, saturating at 0 and 255
    pub fn bounds(&self) -> ([u8; 3], [u8; 3]) {
        let lower = self.key.map(|c| c.saturating_sub(self.tolerance));
        let upper = self.key.map(|c| c.saturating_add(self.tolerance));
        (lower, upper)
    }
}

/// Parameters for model-based masking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiParams {
    /// Matte values scaled to 0..=255 strictly above this are foreground
    pub threshold: u8,
}

impl Default for AiParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Background removal mode, read once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    Chroma(ChromaParams),
    Ai(AiParams),
}

impl RemovalMode {
    pub fn name(&self) -> &'static str {
        match self {
            RemovalMode::Chroma(_) => "chroma",
            RemovalMode::Ai(_) => "ai",
        }
    }
}

/// Frame-skip throttling: process 1 frame out of every `skip + 1`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub skip: u32,
}

impl ThrottleConfig {
    pub fn new(skip: u32) -> Self {
        Self { skip }
    }

    /// Whether the tick with zero-based index `counter` gets full processing
    pub fn should_process(&self, counter: u64) -> bool {
        self.skip == 0 || counter % (u64::from(self.skip) + 1) == 0
    }
}

/// Configuration snapshot handed to a single scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub mode: RemovalMode,
    pub throttle: ThrottleConfig,
    /// Present the mask as grayscale instead of the composite
    pub show_matte: bool,
    /// Camera paused: nothing is captured or presented
    pub paused: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: RemovalMode::Chroma(ChromaParams::default()),
            throttle: ThrottleConfig::default(),
            show_matte: false,
            paused: false,
        }
    }
}

/// Parse a `#rrggbb` (or bare `rrggbb`) color into RGB
pub fn parse_hex_color(input: &str) -> Result<[u8; 3]> {
    let hex = input.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("expected a color like #00ff00, got {:?}", input);
    }

    let value = u32::from_str_radix(hex, 16)
        .with_context(|| format!("invalid hex color {:?}", input))?;

    Ok([
        ((value >> 16) & 0xff) as u8,
        ((value >> 8) & 0xff) as u8,
        (value & 0xff) as u8,
    ])
}

/// Parse a `WIDTHxHEIGHT` resolution string
pub fn parse_resolution(input: &str) -> Result<(u32, u32)> {
    let (w, h) = input
        .trim()
        .split_once(['x', 'X'])
        .with_context(|| format!("expected a resolution like 1280x720, got {:?}", input))?;

    let width: u32 = w.parse().with_context(|| format!("invalid width {:?}", w))?;
    let height: u32 = h.parse().with_context(|| format!("invalid height {:?}", h))?;
    if width == 0 || height == 0 {
        bail!("resolution must be non-zero, got {}x{}", width, height);
    }

    Ok((width, height))
}
