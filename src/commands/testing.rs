//! In-memory backends for the command tests

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use miette::miette;

use crate::{
    outside::{DownloadRequest, StreamDownloader, SubtitleRenderer},
    result::{Error, Result},
    types::{Listing, MergeQuality, SubtitleStyle, VideoInfo},
};

/// Downloader serving canned metadata and writing placeholder files
#[derive(Default)]
pub struct FakeDownloader {
    videos: HashMap<String, VideoInfo>,
    listings: HashMap<String, Listing>,
    unavailable: HashSet<String>,
    /// URLs passed to `download`, in call order
    pub downloads: RefCell<Vec<String>>,
}

impl FakeDownloader {
    pub fn with_video(mut self, url: &str, info: VideoInfo) -> Self {
        self.videos.insert(url.to_string(), info);
        self
    }

    pub fn with_listing(mut self, url: &str, listing: Listing) -> Self {
        self.listings.insert(url.to_string(), listing);
        self
    }

    pub fn with_unavailable(mut self, url: &str) -> Self {
        self.unavailable.insert(url.to_string());
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.borrow().len()
    }

    fn check(&self, url: &str) -> Result<()> {
        if self.unavailable.contains(url) {
            Err(Error::Unavailable(format!("{url}: Private video")))
        } else {
            Ok(())
        }
    }
}

impl StreamDownloader for FakeDownloader {
    fn list_entries(&self, url: &str, limit: Option<usize>) -> Result<Listing> {
        self.check(url)?;
        let mut listing = self
            .listings
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("{url}: not found")))?;
        if let Some(limit) = limit {
            listing.entries.truncate(limit);
        }
        Ok(listing)
    }

    fn get_info(&self, url: &str) -> Result<VideoInfo> {
        self.check(url)?;
        self.videos
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("{url}: not found")))
    }

    fn download(&self, url: &str, request: &DownloadRequest) -> Result<PathBuf> {
        self.check(url)?;
        self.downloads.borrow_mut().push(url.to_string());

        let path = PathBuf::from(
            request
                .video_template
                .to_string_lossy()
                .replace("%(ext)s", &request.container),
        );
        write_placeholder(&path)?;
        Ok(path)
    }
}

/// Renderer copying the input video, recording its calls
#[derive(Debug, Default)]
pub struct FakeRenderer {
    /// `(video, subtitles)` of each call
    pub calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    pub fail: bool,
}

impl SubtitleRenderer for FakeRenderer {
    fn render(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
        _style: &SubtitleStyle,
        _quality: MergeQuality,
    ) -> miette::Result<()> {
        self.calls
            .borrow_mut()
            .push((video.to_path_buf(), subtitles.to_path_buf()));
        if self.fail {
            return Err(miette!("ffmpeg did run but was not successful"));
        }
        write_placeholder(output).map_err(miette::Report::from)
    }
}

fn write_placeholder(path: &Path) -> Result<()> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"media")
    };
    write().map_err(|err| Error::Network(err.to_string()))
}
