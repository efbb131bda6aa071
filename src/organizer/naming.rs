use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

use crate::{
    result::{bail, Result},
    types::VideoInfo,
};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Byte budget of a name stem. File systems usually cap a name at 255 bytes,
/// the rest is left for suffixes such as `_thumbnail.webp` or `.part`.
const STEM_MAX_BYTES: usize = 255 - 32;

static ILLEGAL_RE: OnceLock<Regex> = OnceLock::new();
static UNDERSCORES_RE: OnceLock<Regex> = OnceLock::new();

/// Turn a free-form name into a token safe on common file systems.
///
/// Characters other than word characters, whitespace, `-`, `_` and `.` become
/// `_`, runs of `_` are collapsed, leading and trailing `_`, `.` and spaces
/// are trimmed, and the result is cut to at most `max_len` characters and to
/// the stem byte budget, on a char boundary.
pub fn sanitize(name: &str, max_len: usize) -> String {
    // Covers the reserved <>:"/\|?* as well as control characters
    let illegal = ILLEGAL_RE.get_or_init(|| Regex::new(r"[^\w\s\-.]").unwrap());
    let underscores = UNDERSCORES_RE.get_or_init(|| Regex::new(r"_+").unwrap());

    let replaced = illegal.replace_all(name, "_");
    let collapsed = underscores.replace_all(&replaced, "_");
    let trimmed = trim_token(&collapsed);

    let truncated: String = trimmed.chars().take(max_len).collect();
    trim_token(truncate_bytes(&truncated, STEM_MAX_BYTES)).to_string()
}

fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let end = (0..=max_bytes)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    &s[..end]
}

fn trim_token(s: &str) -> &str {
    s.trim_matches(|c: char| c == '_' || c == '.' || c.is_whitespace())
}

/// Canonical on-disk location of a video and its artifacts.
///
/// It only depends on the channel name and id, the title and the video id,
/// so the same video always resolves to the same directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLayout {
    pub channel_dir: PathBuf,
    pub video_dir: PathBuf,
    /// `<title>_<id>`, or the id alone when the title sanitizes to nothing
    pub stem: String,
}

impl VideoLayout {
    pub fn resolve(
        root: &Path,
        channel_name: &str,
        channel_id: &str,
        title: &str,
        video_id: &str,
        max_len: usize,
    ) -> Result<Self> {
        let id = sanitize(video_id, max_len);
        if id.is_empty() {
            return bail(format!("Cannot build a file name for video id '{video_id}'"));
        }

        let channel_dir = root.join(join_tokens(
            &sanitize(channel_name, max_len),
            &sanitize(channel_id, max_len),
            "Unknown_Channel",
        ));

        let stem = join_tokens(&sanitize(title, max_len), &id, &id);
        let video_dir = channel_dir.join("videos").join(&stem);

        Ok(Self {
            channel_dir,
            video_dir,
            stem,
        })
    }

    pub fn for_info(root: &Path, info: &VideoInfo, max_len: usize) -> Result<Self> {
        Self::resolve(
            root,
            info.channel_name(),
            info.channel_key(),
            info.title(),
            &info.id,
            max_len,
        )
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.video_dir.join(MANIFEST_FILE)
    }

    /// Output template handed to the download backend for the media file
    pub fn video_template(&self) -> PathBuf {
        self.video_dir.join(format!("{}.%(ext)s", self.stem))
    }

    pub fn thumbnail_template(&self) -> PathBuf {
        self.channel_dir
            .join("thumbnails")
            .join(format!("{}_thumbnail.%(ext)s", self.stem))
    }

    /// The backend inserts the language before the extension
    pub fn subtitle_template(&self) -> PathBuf {
        self.channel_dir
            .join("subtitles")
            .join(format!("{}.%(ext)s", self.stem))
    }

    pub fn video_file(&self, ext: &str) -> PathBuf {
        self.video_dir.join(format!("{}.{ext}", self.stem))
    }

    pub fn thumbnail_file(&self, ext: &str) -> PathBuf {
        self.channel_dir
            .join("thumbnails")
            .join(format!("{}_thumbnail.{ext}", self.stem))
    }

    pub fn subtitle_file(&self, lang: &str, ext: &str) -> PathBuf {
        self.channel_dir
            .join("subtitles")
            .join(format!("{}.{lang}.{ext}", self.stem))
    }

    pub fn metadata_file(&self, ext: &str) -> PathBuf {
        self.channel_dir
            .join("metadata")
            .join(format!("{}_metadata.{ext}", self.stem))
    }
}

/// Directory of a playlist inside its channel directory
pub fn playlist_dir(
    root: &Path,
    channel_name: &str,
    channel_id: &str,
    title: &str,
    playlist_id: &str,
    max_len: usize,
) -> PathBuf {
    let channel = join_tokens(
        &sanitize(channel_name, max_len),
        &sanitize(channel_id, max_len),
        "Unknown_Channel",
    );
    let id = sanitize(playlist_id, max_len);
    root.join(channel)
        .join("playlists")
        .join(join_tokens(&sanitize(title, max_len), &id, "Unknown_Playlist"))
}

/// Join `a_b`, dropping empty tokens, `fallback` if both are empty.
/// `a` is shortened so that the result fits the stem byte budget.
fn join_tokens(a: &str, b: &str, fallback: &str) -> String {
    let a = trim_token(truncate_bytes(a, STEM_MAX_BYTES.saturating_sub(b.len() + 1)));
    match (a.is_empty(), b.is_empty()) {
        (false, false) => format!("{a}_{b}"),
        (false, true) => a.to_string(),
        (true, false) => b.to_string(),
        (true, true) => fallback.to_string(),
    }
}
