use std::path::Path;

/// Containers recognized as videos when scanning a directory
const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"];

/// Images the downloader writes as thumbnails
const THUMBNAIL_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Vtt,
    Srt,
}

impl SubtitleFormat {
    /// Formats in lookup order
    pub const ALL: [SubtitleFormat; 2] = [SubtitleFormat::Vtt, SubtitleFormat::Srt];

    /// Return the extension with the leading dot.
    /// e.g. ".ext"
    pub fn with_dot(self) -> &'static str {
        match self {
            SubtitleFormat::Vtt => ".vtt",
            SubtitleFormat::Srt => ".srt",
        }
    }

    /// Parse the path file extension.
    /// Return None in case of no or invalid extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        lowercase_extension(path.as_ref()).and_then(|ext| match ext.as_str() {
            "vtt" => Some(Self::Vtt),
            "srt" => Some(Self::Srt),
            _ => None,
        })
    }
}

/// Whether the path looks like a finished video file.
/// Partial downloads (`.part`) never match.
pub fn is_video_file(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_thumbnail_file(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| THUMBNAIL_EXTENSIONS.contains(&ext.as_str()))
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_downloads_are_not_videos() {
        assert!(is_video_file(Path::new("a/b/Title_abc.MP4")));
        assert!(is_video_file(Path::new("clip.webm")));
        assert!(!is_video_file(Path::new("clip.mp4.part")));
        assert!(!is_video_file(Path::new("clip.vtt")));
    }

    #[test]
    fn subtitle_format_from_path() {
        assert_eq!(
            SubtitleFormat::from_path("x.zh-Hans.vtt"),
            Some(SubtitleFormat::Vtt)
        );
        assert_eq!(SubtitleFormat::from_path("x.en.SRT"), Some(SubtitleFormat::Srt));
        assert_eq!(SubtitleFormat::from_path("x.ass"), None);
    }
}
