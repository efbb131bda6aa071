use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    io,
    result::bail,
    types::{is_thumbnail_file, is_video_file, SubtitleFormat, VideoInfo},
};

use super::{
    manifest::{read_manifest, Status, VideoRecord},
    naming::VideoLayout,
    run::RunLog,
};

const INFO_SUFFIX: &str = ".info.json";

/// Files written next to each other by the downloader for one video
#[derive(Debug, Default, PartialEq, Eq)]
struct Sidecars {
    videos: Vec<PathBuf>,
    thumbnails: Vec<PathBuf>,
    /// Subtitle path and its `<lang>` part
    subtitles: Vec<(PathBuf, String)>,
}

/// Move files downloaded outside of the layout into it.
///
/// Every `<stem>.info.json` found below `source` describes one video. The
/// files sharing its `<stem>.` prefix are moved to their canonical place under
/// `output` and a `downloaded` manifest is written.
pub fn organize_existing(source: &Path, output: &Path, max_len: usize) -> Result<RunLog> {
    let mut log = RunLog::new();

    let mut infos: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.to_string_lossy().ends_with(INFO_SUFFIX))
        .collect();
    infos.sort();
    info!("{} metadata file(s) found in {}", infos.len(), source.display());

    for info_path in infos {
        // Replaced by the real id once the metadata is parsed
        let name = info_path
            .file_name()
            .map(|name| name.to_string_lossy().trim_end_matches(INFO_SUFFIX).to_string())
            .unwrap_or_default();
        let mut pending = VideoRecord::pending(name, info_path.display().to_string());

        let outcome = organize_one(&info_path, output, max_len, &mut pending);
        let (status, reason) = match outcome {
            Ok(status) => (status, status_reason(status)),
            Err(err) => {
                warn!("Could not organize {}: {}", info_path.display(), err.to_reason());
                (Status::Failed, Some(err.to_reason()))
            }
        };
        log.finish(&pending, status, reason)?;
    }

    Ok(log)
}

fn status_reason(status: Status) -> Option<String> {
    (status == Status::Skipped).then(|| "already-downloaded".to_string())
}

fn organize_one(
    info_path: &Path,
    output: &Path,
    max_len: usize,
    pending: &mut VideoRecord,
) -> crate::result::Result<Status> {
    let json = std::fs::read_to_string(info_path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not read {}", info_path.display()))?;
    let info = VideoInfo::from_json(&json)?;
    pending.describe(&info);

    let layout = VideoLayout::for_info(output, &info, max_len)?;
    pending.paths.video_dir = Some(layout.video_dir.clone());

    if read_manifest(&layout.manifest_path()).is_some_and(|m| m.status == Status::Downloaded) {
        debug!("{} is already organized", info.id);
        return Ok(Status::Skipped);
    }

    let sidecars = find_sidecars(info_path)?;
    let Some(video) = sidecars.videos.first() else {
        return bail(format!("No video file next to {}", info_path.display()));
    };

    let video_target = layout.video_file(&extension(video));
    move_if_needed(video, &video_target)?;
    pending.paths.prepared_filename = Some(video_target);

    for thumbnail in &sidecars.thumbnails {
        move_if_needed(thumbnail, &layout.thumbnail_file(&extension(thumbnail)))?;
    }
    for (subtitle, lang) in &sidecars.subtitles {
        move_if_needed(subtitle, &layout.subtitle_file(lang, &extension(subtitle)))?;
    }

    Ok(Status::Downloaded)
}

fn find_sidecars(info_path: &Path) -> crate::result::Result<Sidecars> {
    let file_name = info_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(stem) = file_name.strip_suffix(INFO_SUFFIX) else {
        return bail(format!("{} is not a metadata file", info_path.display()));
    };
    let prefix = format!("{stem}.");
    let dir = info_path.parent().unwrap_or(Path::new("."));

    let mut sidecars = Sidecars::default();
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .into_diagnostic()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    for path in entries {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };

        if is_video_file(&path) {
            sidecars.videos.push(path);
        } else if is_thumbnail_file(&path) {
            sidecars.thumbnails.push(path);
        } else if SubtitleFormat::from_path(&path).is_some() {
            // `<lang>.<ext>`
            let lang = rest.rsplit_once('.').map(|(lang, _)| lang).unwrap_or("");
            if !lang.is_empty() {
                sidecars.subtitles.push((path, lang.to_string()));
            }
        }
    }

    Ok(sidecars)
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn move_if_needed(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    debug!("Moving {} to {}", from.display(), to.display());
    io::move_file(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_download(dir: &Path, stem: &str, id: &str) {
        let info = serde_json::json!({
            "id": id,
            "title": "My Video",
            "channel": "Chan",
            "channel_id": "UC1",
        });
        std::fs::write(dir.join(format!("{stem}.info.json")), info.to_string()).unwrap();
        std::fs::write(dir.join(format!("{stem}.mp4")), b"video").unwrap();
        std::fs::write(dir.join(format!("{stem}.webp")), b"thumb").unwrap();
        std::fs::write(dir.join(format!("{stem}.en.vtt")), b"WEBVTT").unwrap();
    }

    #[test]
    fn moves_files_into_the_layout() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_download(source.path(), "My Video [abc]", "abc");

        let log = organize_existing(source.path(), output.path(), 200).unwrap();
        let records: Vec<_> = log.records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Status::Downloaded);

        let layout =
            VideoLayout::resolve(output.path(), "Chan", "UC1", "My Video", "abc", 200).unwrap();
        assert!(layout.video_file("mp4").is_file());
        assert!(layout.thumbnail_file("webp").is_file());
        assert!(layout.subtitle_file("en", "vtt").is_file());
        assert_eq!(
            read_manifest(&layout.manifest_path()).unwrap().status,
            Status::Downloaded
        );
        assert!(!source.path().join("My Video [abc].mp4").exists());
    }

    #[test]
    fn organized_videos_are_skipped_next_time() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_download(source.path(), "v", "abc");

        organize_existing(source.path(), output.path(), 200).unwrap();
        let log = organize_existing(source.path(), output.path(), 200).unwrap();
        let record = log.records().next().unwrap();
        assert_eq!(record.status, Status::Skipped);
        assert_eq!(record.reason.as_deref(), Some("already-downloaded"));
    }

    #[test]
    fn broken_items_do_not_stop_the_scan() {
        let source = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.info.json"), b"not json").unwrap();
        std::fs::write(
            source.path().join("b.info.json"),
            serde_json::json!({"id": "b"}).to_string(),
        )
        .unwrap();
        write_download(source.path(), "c", "ccc");

        let log = organize_existing(source.path(), output.path(), 200).unwrap();
        let statuses: Vec<_> = log.records().map(|r| r.status).collect();
        assert_eq!(statuses, [Status::Failed, Status::Failed, Status::Downloaded]);
        assert!(log.has_failures());
    }
}
