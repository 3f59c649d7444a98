use std::path::Path;

use hound::WavReader;

use crate::error::ToolError;

/// Channel count of the canonical transcoder output.
pub const CANONICAL_CHANNELS: u16 = 1;
/// Sample rate of the canonical transcoder output.
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

/// Header facts about a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    /// Samples per channel.
    pub frames: u32,
}

impl WavInfo {
    pub fn read(path: &Path) -> Result<Self, ToolError> {
        let reader = WavReader::open(path).map_err(|e| ToolError::InvalidOutput {
            path: path.to_path_buf(),
            reason: format!("not a readable WAV file: {}", e),
        })?;
        let spec = reader.spec();
        Ok(Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            frames: reader.duration(),
        })
    }

    pub fn duration_secs_f64(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// Duration rounded to whole seconds.
    pub fn duration_sec(&self) -> i64 {
        self.duration_secs_f64().round() as i64
    }

    pub fn is_canonical(&self) -> bool {
        self.channels == CANONICAL_CHANNELS && self.sample_rate == CANONICAL_SAMPLE_RATE
    }
}
