pub mod stager;
pub mod transcoder;
pub mod wav;

pub use stager::MediaStager;
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use wav::WavInfo;
