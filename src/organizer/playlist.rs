use std::path::{Path, PathBuf};

use miette::Result;
use serde::Serialize;
use tracing::debug;

use crate::{io, types::Listing};

use super::{
    manifest::{Status, VideoRecord},
    naming::playlist_dir,
};

pub const PLAYLIST_MANIFEST_FILE: &str = "playlist_manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistVideo {
    /// 1-based position in the playlist
    pub index: usize,
    pub video_id: String,
    pub title: Option<String>,
    pub status: Status,
    pub video_dir: Option<PathBuf>,
}

/// Content of `playlist_manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistManifest {
    pub playlist_id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub organized_at: String,
    pub total_videos: usize,
    pub videos: Vec<PlaylistVideo>,
}

impl PlaylistManifest {
    pub fn new<'a>(
        listing: &Listing,
        records: impl IntoIterator<Item = &'a VideoRecord>,
        organized_at: String,
    ) -> Self {
        let videos: Vec<_> = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| PlaylistVideo {
                index: i + 1,
                video_id: record.video_id.clone(),
                title: record.title.clone(),
                status: record.status,
                video_dir: record.paths.video_dir.clone(),
            })
            .collect();

        Self {
            playlist_id: listing.id.clone(),
            title: listing.title.clone(),
            uploader: listing.uploader.clone(),
            organized_at,
            total_videos: videos.len(),
            videos,
        }
    }

    /// Atomically write the manifest under the channel's `playlists/` directory
    pub fn write(&self, root: &Path, channel_id: &str, max_len: usize) -> Result<PathBuf> {
        let dir = playlist_dir(
            root,
            self.uploader.as_deref().unwrap_or_default(),
            channel_id,
            self.title.as_deref().unwrap_or_default(),
            self.playlist_id.as_deref().unwrap_or_default(),
            max_len,
        );
        let path = dir.join(PLAYLIST_MANIFEST_FILE);

        io::write_json_atomic(&path, self)?;
        debug!("Playlist manifest written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_under_channel_playlists() {
        let dir = tempfile::tempdir().unwrap();
        let listing = Listing {
            id: Some("PL1".into()),
            title: Some("Best Of".into()),
            uploader: Some("Chan".into()),
            channel_id: Some("UC1".into()),
            entries: Vec::new(),
        };
        let records = [
            VideoRecord::pending("a", "url").settle(Status::Downloaded, None).unwrap(),
            VideoRecord::pending("b", "url").settle(Status::Failed, None).unwrap(),
        ];

        let manifest = PlaylistManifest::new(&listing, &records, "now".into());
        assert_eq!(manifest.total_videos, 2);
        assert_eq!(manifest.videos[1].index, 2);

        let path = manifest.write(dir.path(), "UC1", 200).unwrap();
        assert_eq!(
            path,
            dir.path().join("Chan_UC1/playlists/Best Of_PL1/playlist_manifest.json")
        );

        let json: serde_json::Value = io::read_json(&path).unwrap();
        assert_eq!(json["videos"][0]["status"], "downloaded");
        assert_eq!(json["playlist_id"], "PL1");
    }
}
