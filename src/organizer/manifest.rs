use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use miette::{miette, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{io, types::VideoInfo};

use super::naming::{VideoLayout, MANIFEST_FILE};

/// Processing outcome of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Not settled yet. Never written to disk
    Pending,
    Downloaded,
    Skipped,
    DryRun,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Downloaded => "downloaded",
            Status::Skipped => "skipped",
            Status::DryRun => "dry-run",
            Status::Failed => "failed",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPaths {
    pub video_dir: Option<PathBuf>,
    pub prepared_filename: Option<PathBuf>,
}

/// Everything known about one processed URL. Serialized as its `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub url: String,
    pub status: Status,
    pub paths: RecordPaths,
    /// Why the video was skipped or failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VideoRecord {
    pub fn pending(video_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            title: None,
            uploader: None,
            url: url.into(),
            status: Status::Pending,
            paths: RecordPaths::default(),
            reason: None,
        }
    }

    /// Fill the descriptive fields from the backend metadata
    pub fn describe(&mut self, info: &VideoInfo) {
        self.video_id = info.id.clone();
        self.title = info.title.clone();
        self.uploader = info.uploader.clone().or_else(|| info.channel.clone());
        if let Some(url) = &info.webpage_url {
            self.url = url.clone();
        }
    }

    /// Return the record in its final state.
    ///
    /// A record settles exactly once: settling a record that is not
    /// pending, or settling into `pending`, is an error.
    pub fn settle(&self, status: Status, reason: Option<String>) -> Result<VideoRecord> {
        if self.status != Status::Pending {
            return Err(miette!(
                "Record of {} is already settled as {}",
                self.video_id,
                self.status
            ));
        }
        if status == Status::Pending {
            return Err(miette!("A record cannot settle as pending"));
        }

        Ok(VideoRecord {
            status,
            reason,
            ..self.clone()
        })
    }
}

/// Atomically write the manifest of a settled record into its video directory.
/// Return the manifest path.
pub fn write_manifest(record: &VideoRecord) -> Result<PathBuf> {
    let video_dir = record
        .paths
        .video_dir
        .as_deref()
        .ok_or_else(|| miette!("Record of {} has no video directory", record.video_id))?;
    if record.status == Status::Pending {
        return Err(miette!("Refusing to write the manifest of a pending record"));
    }

    let path = video_dir.join(MANIFEST_FILE);
    io::write_json_atomic(&path, record)?;
    debug!("Manifest written to {}", path.display());
    Ok(path)
}

/// Read a manifest. Missing or unparsable manifests are `None`.
pub fn read_manifest(path: &Path) -> Option<VideoRecord> {
    if !path.is_file() {
        return None;
    }

    match io::read_json(path) {
        Ok(record) => Some(record),
        Err(err) => {
            debug!("Ignoring unreadable manifest: {err:?}");
            None
        }
    }
}

/// Find where a video has already been downloaded, if anywhere.
///
/// The canonical directory of the layout is checked first. If it has no
/// `downloaded` manifest, the video directories of every channel under `root`
/// whose name ends with the video id are checked too, so a video renamed since
/// it was downloaded is still recognized.
pub fn find_downloaded(root: &Path, layout: &VideoLayout, video_id: &str) -> Option<PathBuf> {
    let is_downloaded = |path: &Path| {
        read_manifest(path)
            .is_some_and(|m| m.video_id == video_id && m.status == Status::Downloaded)
    };

    if is_downloaded(&layout.manifest_path()) {
        return Some(layout.video_dir.clone());
    }

    let suffix = format!("_{video_id}");
    let channels = std::fs::read_dir(root).ok()?;
    for channel in channels.flatten() {
        let Ok(videos) = std::fs::read_dir(channel.path().join("videos")) else {
            continue;
        };

        for video_dir in videos.flatten() {
            let name = video_dir.file_name();
            let name = name.to_string_lossy();
            if name != video_id && !name.ends_with(&suffix) {
                continue;
            }

            trace!("Checking candidate {}", video_dir.path().display());
            if is_downloaded(&video_dir.path().join(MANIFEST_FILE)) {
                return Some(video_dir.path());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(root: &Path, title: &str) -> VideoLayout {
        VideoLayout::resolve(root, "Chan", "UC1", title, "vid1", 200).unwrap()
    }

    fn downloaded(layout: &VideoLayout) -> VideoRecord {
        let mut record = VideoRecord::pending("vid1", "https://youtu.be/vid1");
        record.paths.video_dir = Some(layout.video_dir.clone());
        record.settle(Status::Downloaded, None).unwrap()
    }

    #[test]
    fn manifest_shape() {
        let mut record = VideoRecord::pending("vid1", "https://youtu.be/vid1");
        record.title = Some("Title".into());
        record.paths.video_dir = Some(PathBuf::from("/out/c/videos/Title_vid1"));
        let record = record.settle(Status::DryRun, None).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "video_id": "vid1",
                "title": "Title",
                "uploader": null,
                "url": "https://youtu.be/vid1",
                "status": "dry-run",
                "paths": {
                    "video_dir": "/out/c/videos/Title_vid1",
                    "prepared_filename": null,
                },
            })
        );
    }

    #[test]
    fn records_settle_exactly_once() {
        let record = VideoRecord::pending("vid1", "url");
        let settled = record.settle(Status::Failed, Some("boom".into())).unwrap();
        assert_eq!(settled.status, Status::Failed);

        assert!(settled.settle(Status::Downloaded, None).is_err());
        assert!(record.settle(Status::Pending, None).is_err());
    }

    #[test]
    fn pending_records_are_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = VideoRecord::pending("vid1", "url");
        record.paths.video_dir = Some(dir.path().to_path_buf());
        assert!(write_manifest(&record).is_err());
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn finds_canonical_download() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), "Title");
        assert_eq!(find_downloaded(dir.path(), &layout, "vid1"), None);

        write_manifest(&downloaded(&layout)).unwrap();
        assert_eq!(
            find_downloaded(dir.path(), &layout, "vid1"),
            Some(layout.video_dir.clone())
        );
    }

    #[test]
    fn finds_download_under_previous_title() {
        let dir = tempfile::tempdir().unwrap();
        let old = layout(dir.path(), "Old Title");
        write_manifest(&downloaded(&old)).unwrap();

        let new = layout(dir.path(), "New Title");
        assert_eq!(find_downloaded(dir.path(), &new, "vid1"), Some(old.video_dir));
    }

    #[test]
    fn ignores_non_downloaded_and_corrupt_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path(), "Title");

        let mut record = VideoRecord::pending("vid1", "url");
        record.paths.video_dir = Some(layout.video_dir.clone());
        write_manifest(&record.settle(Status::DryRun, None).unwrap()).unwrap();
        assert_eq!(find_downloaded(dir.path(), &layout, "vid1"), None);

        std::fs::write(layout.manifest_path(), b"{\"video_id\": ").unwrap();
        assert_eq!(find_downloaded(dir.path(), &layout, "vid1"), None);
    }
}
