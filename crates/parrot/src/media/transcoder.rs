use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ToolError;

/// Longest stderr tail kept in a tool error.
const MAX_STDERR_CHARS: usize = 2000;

/// Converts arbitrary media into a mono 16 kHz PCM WAV file.
pub trait Transcoder: Send + Sync {
    /// Writes the canonical waveform of `input` to `output`, overwriting it.
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Runs an external ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `-y -i <in> -ac 1 -ar 16000 -vn -f wav <out>`
    pub fn args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-ac".into(),
            "1".into(),
            "-ar".into(),
            "16000".into(),
            "-vn".into(),
            "-f".into(),
            "wav".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let program = self.program.display().to_string();
        log::debug!("Running {} on {}", program, input.display());

        let result = Command::new(&self.program)
            .args(Self::args(input, output))
            .output()
            .map_err(|e| ToolError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ToolError::Failed {
                program,
                status: result.status.to_string(),
                stderr: tail_chars(stderr.trim_end(), MAX_STDERR_CHARS).to_string(),
            });
        }

        Ok(())
    }
}

/// The last `max` characters of `s`.
fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    match s.char_indices().nth(count - max) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_arguments() {
        let args = FfmpegTranscoder::args(Path::new("/w/in.m4a"), Path::new("/w/out.wav"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/w/in.m4a", "-ac", "1", "-ar", "16000", "-vn", "-f", "wav",
                "/w/out.wav"
            ]
        );
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let t = FfmpegTranscoder::new("/nonexistent/parrot-ffmpeg");
        let err = t
            .transcode(Path::new("in.m4a"), Path::new("out.wav"))
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_failed_error() {
        // `false` ignores its arguments and exits with status 1.
        let t = FfmpegTranscoder::new("false");
        let err = t
            .transcode(Path::new("in.m4a"), Path::new("out.wav"))
            .unwrap_err();
        match err {
            ToolError::Failed { program, .. } => assert_eq!(program, "false"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("ééé", 2), "éé");
    }
}
