use std::{ffi::OsStr, fmt::Debug, path::Path};

use miette::Result;

use crate::types::{MergeQuality, SubtitleStyle};

use super::command::{assert_success_command, FFMPEG, FFXXX_DEFAULT_ARGS};

pub trait SubtitleRenderer: Debug {
    /// Burn the subtitles into the video frames, writing an MP4 to `output`.
    fn render(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
        style: &SubtitleStyle,
        quality: MergeQuality,
    ) -> Result<()>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg;

impl Ffmpeg {
    /// Verify that the `ffmpeg` binary is reachable
    pub fn new() -> Result<Self> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))?;

        Ok(Self)
    }
}

/// Value of the `-vf` option burning `subtitles` with `style`
pub fn subtitles_filter(subtitles: &Path, style: &SubtitleStyle) -> String {
    // The path goes through two parsers: the filter graph strips the quotes,
    // then the filter options unescape `\:` and `\'`. A quote cannot appear
    // inside quotes, so it is emitted between two quoted runs.
    let path = subtitles
        .to_string_lossy()
        .replace('\\', "/")
        .replace(':', r"\:")
        .replace('\'', r"'\\\''");

    format!("subtitles='{path}':force_style='{}'", style.force_style())
}

/// Encoding arguments of a quality preset
pub fn encoding_args(quality: MergeQuality) -> Vec<String> {
    let (codec, bitrate) = quality.codec_settings();
    let mut args: Vec<String> = ["-c:v", codec, "-profile:v", "baseline", "-pix_fmt", "yuv420p"]
        .map(String::from)
        .to_vec();

    match bitrate {
        Some(bitrate) => args.extend(["-b:v".to_string(), bitrate.to_string()]),
        None => args.extend(["-crf".to_string(), "18".to_string()]),
    }

    args.extend(
        ["-c:a", "aac", "-b:a", "128k", "-movflags", "+faststart", "-f", "mp4"].map(String::from),
    );
    args
}

impl SubtitleRenderer for Ffmpeg {
    fn render(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
        style: &SubtitleStyle,
        quality: MergeQuality,
    ) -> Result<()> {
        let filter = subtitles_filter(subtitles, style);

        assert_success_command(FFMPEG, |cmd| {
            cmd.args(FFXXX_DEFAULT_ARGS)
                .arg("-y")
                .args([OsStr::new("-i"), video.as_os_str()])
                .args(["-vf", &filter])
                .args(encoding_args(quality))
                .arg(output)
        })
    }
}
