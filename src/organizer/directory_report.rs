use std::{
    collections::BTreeMap,
    fmt::Write,
    path::{Path, PathBuf},
};

use miette::{miette, IntoDiagnostic, Result};
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::types::is_video_file;

use super::{manifest::read_manifest, naming::MANIFEST_FILE};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human readable size with one decimal, e.g. `1.5 MB`
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", SIZE_UNITS[unit])
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub files: usize,
    pub size: u64,
    pub size_human: String,
}

impl Usage {
    fn add(&mut self, size: u64) {
        self.files += 1;
        self.size += size;
        self.size_human = format_size(self.size);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub name: String,
    pub videos: usize,
    pub total: Usage,
    /// Usage of each direct subdirectory (`videos`, `thumbnails`, ...)
    pub subdirectories: BTreeMap<String, Usage>,
}

/// Content summary of an output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryReport {
    pub root: PathBuf,
    pub generated_at: String,
    pub channels: Vec<ChannelReport>,
    pub total: Usage,
    /// Number of video manifests per status
    pub manifests: BTreeMap<String, usize>,
}

impl DirectoryReport {
    pub fn scan(root: &Path, generated_at: String) -> Result<Self> {
        if !root.is_dir() {
            return Err(miette!("{} is not a directory", root.display()));
        }

        let mut channels = Vec::new();
        let mut total = Usage {
            size_human: format_size(0),
            ..Default::default()
        };
        let mut manifests = BTreeMap::new();

        let mut channel_dirs: Vec<_> = std::fs::read_dir(root)
            .into_diagnostic()?
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .collect();
        channel_dirs.sort_by_key(|entry| entry.file_name());

        for channel_dir in channel_dirs {
            let mut channel = ChannelReport {
                name: channel_dir.file_name().to_string_lossy().into_owned(),
                videos: 0,
                total: Usage {
                    size_human: format_size(0),
                    ..Default::default()
                },
                subdirectories: BTreeMap::new(),
            };

            for entry in WalkDir::new(channel_dir.path()).min_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!("Could not walk directory: {err}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                let path = entry.path();
                channel.total.add(size);
                total.add(size);
                if is_video_file(path) {
                    channel.videos += 1;
                }

                // Files directly inside the channel directory have no subdirectory
                if entry.depth() > 1 {
                    if let Ok(relative) = path.strip_prefix(channel_dir.path()) {
                        if let Some(subdir) = relative.components().next() {
                            let name = subdir.as_os_str().to_string_lossy().into_owned();
                            channel.subdirectories.entry(name).or_default().add(size);
                        }
                    }
                }

                if entry.file_name() == MANIFEST_FILE {
                    if let Some(record) = read_manifest(path) {
                        *manifests.entry(record.status.to_string()).or_default() += 1;
                    }
                }
            }

            channels.push(channel);
        }

        Ok(Self {
            root: root.to_path_buf(),
            generated_at,
            channels,
            total,
            manifests,
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(out, "Directory report for {}", self.root.display());
        let _ = writeln!(out, "Generated at {}", self.generated_at);
        let _ = writeln!(
            out,
            "{} channel(s), {} file(s), {}",
            self.channels.len(),
            self.total.files,
            self.total.size_human
        );

        for channel in &self.channels {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{}: {} video(s), {} file(s), {}",
                channel.name, channel.videos, channel.total.files, channel.total.size_human
            );
            for (name, usage) in &channel.subdirectories {
                let _ = writeln!(
                    out,
                    "  {name:<12} {:>6} file(s) {:>10}",
                    usage.files, usage.size_human
                );
            }
        }

        if !self.manifests.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Manifests:");
            for (status, count) in &self.manifests {
                let _ = writeln!(out, "  {status:<12} {count:>6}");
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use crate::organizer::{
        manifest::{write_manifest, Status, VideoRecord},
        naming::VideoLayout,
    };

    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(1023), "1023.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024u64.pow(5)), "3072.0 TB");
    }

    #[test]
    fn scans_channels_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let layout = VideoLayout::resolve(root, "Chan", "UC1", "Title", "vid1", 200).unwrap();

        std::fs::create_dir_all(&layout.video_dir).unwrap();
        std::fs::write(layout.video_file("mp4"), vec![0u8; 2048]).unwrap();
        std::fs::create_dir_all(layout.thumbnail_file("jpg").parent().unwrap()).unwrap();
        std::fs::write(layout.thumbnail_file("jpg"), vec![0u8; 100]).unwrap();

        let mut record = VideoRecord::pending("vid1", "url");
        record.paths.video_dir = Some(layout.video_dir.clone());
        write_manifest(&record.settle(Status::Downloaded, None).unwrap()).unwrap();

        let report = DirectoryReport::scan(root, "now".into()).unwrap();
        assert_eq!(report.channels.len(), 1);

        let channel = &report.channels[0];
        assert_eq!(channel.name, "Chan_UC1");
        assert_eq!(channel.videos, 1);
        assert_eq!(channel.total.files, 3);
        assert_eq!(channel.subdirectories["videos"].files, 2);
        assert_eq!(channel.subdirectories["thumbnails"].size, 100);
        assert_eq!(report.manifests["downloaded"], 1);

        let text = report.to_text();
        assert!(text.contains("Chan_UC1: 1 video(s), 3 file(s)"));
        assert!(text.contains("downloaded"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectoryReport::scan(&dir.path().join("nope"), "now".into()).is_err());
    }
}
