use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Quality requested from the download backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    #[value(name = "best")]
    Best,
    #[serde(rename = "worst")]
    #[value(name = "worst")]
    Worst,
    #[serde(rename = "720p")]
    #[value(name = "720p")]
    P720,
    #[serde(rename = "1080p")]
    #[value(name = "1080p")]
    P1080,
    #[serde(rename = "audio")]
    #[value(name = "audio")]
    Audio,
}

impl Quality {
    /// The `yt-dlp` format selector for this quality.
    /// MP4 is preferred whenever the site offers it.
    pub fn format_selector(self) -> &'static str {
        match self {
            Quality::Best => "best[ext=mp4]/best",
            Quality::Worst => "worst[ext=mp4]/worst",
            Quality::P720 => "best[height<=720][ext=mp4]/best[height<=720]",
            Quality::P1080 => "best[height<=1080][ext=mp4]/best[height<=1080]",
            Quality::Audio => "bestaudio[ext=m4a]/bestaudio/best[ext=m4a]/best",
        }
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Quality::Best => "best",
            Quality::Worst => "worst",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::Audio => "audio",
        };
        f.write_str(name)
    }
}

/// Encoding preset used when burning subtitles into a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeQuality {
    #[default]
    High,
    Medium,
    Low,
    Lossless,
}

impl MergeQuality {
    /// Return the video codec and the target bitrate.
    /// `None` means the encoder picks the rate from a constant quality factor.
    pub fn codec_settings(self) -> (&'static str, Option<&'static str>) {
        match self {
            MergeQuality::High => ("libx264", Some("4000k")),
            MergeQuality::Medium => ("libx264", Some("2500k")),
            MergeQuality::Low => ("libx264", Some("1500k")),
            MergeQuality::Lossless => ("libx264", None),
        }
    }
}

impl Display for MergeQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MergeQuality::High => "high",
            MergeQuality::Medium => "medium",
            MergeQuality::Low => "low",
            MergeQuality::Lossless => "lossless",
        };
        f.write_str(name)
    }
}
