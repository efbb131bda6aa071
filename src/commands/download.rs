use std::{path::PathBuf, process::ExitCode};

use miette::Result;
use owo_colors::OwoColorize;
use tracing::{debug, info, warn};

use crate::{
    cli::DownloadArgs,
    commands::metadata::write_export,
    organizer::{
        find_downloaded, remove_empty_dirs, PlaylistManifest, RunLog, Status, VideoLayout,
        VideoRecord,
    },
    outside::{DownloadRequest, StreamDownloader, Ytdl, YtdlOptions},
    settings::Settings,
    types::{Listing, MetadataExport, Quality, VideoInfo},
    utils::{now_rfc3339, split_list},
};

const ALREADY_DOWNLOADED: &str = "already-downloaded";

/// Settings of a download run, after applying the command line overrides
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub output: PathBuf,
    pub quality: Quality,
    /// Treat the URLs as playlists or channels
    pub listing: bool,
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub force: bool,
    pub export_metadata: bool,
}

impl DownloadPlan {
    pub fn new(args: &DownloadArgs, settings: &Settings) -> Self {
        let audio_only = args.audio_only || settings.download.audio_only;
        let quality = if audio_only {
            Quality::Audio
        } else {
            args.quality.unwrap_or(settings.download.quality)
        };

        Self {
            output: args
                .output
                .clone()
                .unwrap_or_else(|| settings.download.output_path.clone()),
            quality,
            listing: args.playlist || args.channel,
            limit: args.limit,
            dry_run: args.dry_run,
            force: args.force,
            export_metadata: !args.no_metadata && settings.download.download_metadata,
        }
    }
}

pub fn run(args: &DownloadArgs, settings: &Settings) -> Result<ExitCode> {
    let plan = DownloadPlan::new(args, settings);
    let downloader = Ytdl::new(YtdlOptions::from(settings))?;

    let log = download_all(&downloader, &args.urls, &plan, settings)?;
    if log.is_empty() {
        warn!("Nothing to download");
    }
    print_results(&log);
    log.write(&plan.output)?;

    if settings.organization.cleanup_empty_dirs && !plan.dry_run {
        let removed = remove_empty_dirs(&plan.output)?;
        info!("{} empty directories removed", removed.len());
    }

    Ok(if log.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Process every URL, one item at a time. A failing item never stops the run.
pub fn download_all(
    downloader: &dyn StreamDownloader,
    urls: &[String],
    plan: &DownloadPlan,
    settings: &Settings,
) -> Result<RunLog> {
    let mut log = RunLog::new();

    for url in urls {
        info!("Processing {url}");
        if plan.listing {
            download_listing(downloader, url, plan, settings, &mut log)?;
        } else {
            download_video(downloader, url, plan, settings, &mut log)?;
        }
    }

    Ok(log)
}

fn download_listing(
    downloader: &dyn StreamDownloader,
    url: &str,
    plan: &DownloadPlan,
    settings: &Settings,
    log: &mut RunLog,
) -> Result<()> {
    let listing = match downloader.list_entries(url, plan.limit) {
        Ok(listing) => listing,
        Err(err) => {
            warn!("Could not list {url}: {}", err.to_reason());
            let pending = VideoRecord::pending(url, url);
            return log.finish(&pending, Status::Failed, Some(err.to_reason()));
        }
    };
    info!("{} video(s) in {url}", listing.entries.len());

    if plan.dry_run {
        for entry in &listing.entries {
            let mut pending = VideoRecord::pending(entry.id.clone(), entry.watch_url());
            pending.title = entry.title.clone();
            pending.uploader = listing.uploader.clone();
            log.finish(&pending, Status::DryRun, None)?;
        }
        return Ok(());
    }

    let first = log.len();
    for entry in &listing.entries {
        download_video(downloader, &entry.watch_url(), plan, settings, log)?;
    }

    if settings.organization.organize_by_playlist {
        write_playlist_manifest(&listing, log, first, plan, settings);
    }

    Ok(())
}

fn write_playlist_manifest(
    listing: &Listing,
    log: &RunLog,
    first: usize,
    plan: &DownloadPlan,
    settings: &Settings,
) {
    let manifest = PlaylistManifest::new(listing, log.records().skip(first), now_rfc3339());
    let channel_id = listing.channel_id.as_deref().unwrap_or("unknown_id");

    match manifest.write(
        &plan.output,
        channel_id,
        settings.organization.max_filename_length,
    ) {
        Ok(path) => info!("Playlist manifest written to {}", path.display()),
        Err(err) => warn!("Could not write the playlist manifest: {err:?}"),
    }
}

fn download_video(
    downloader: &dyn StreamDownloader,
    url: &str,
    plan: &DownloadPlan,
    settings: &Settings,
    log: &mut RunLog,
) -> Result<()> {
    let mut pending = VideoRecord::pending(url, url);

    let (status, reason) = match fetch_and_place(downloader, url, plan, settings, &mut pending) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("Could not download {url}: {}", err.to_reason());
            (Status::Failed, Some(err.to_reason()))
        }
    };

    log.finish(&pending, status, reason)
}

/// Fetch the metadata, resolve the layout, then download unless deduplicated.
/// Fill `pending` along the way so that a failure still reports what was known.
fn fetch_and_place(
    downloader: &dyn StreamDownloader,
    url: &str,
    plan: &DownloadPlan,
    settings: &Settings,
    pending: &mut VideoRecord,
) -> crate::result::Result<(Status, Option<String>)> {
    let info = downloader.get_info(url)?;
    pending.describe(&info);

    let max_len = settings.organization.max_filename_length;
    let layout = VideoLayout::for_info(&plan.output, &info, max_len)?;
    pending.paths.video_dir = Some(layout.video_dir.clone());

    if !plan.force {
        if let Some(existing) = find_downloaded(&plan.output, &layout, &info.id) {
            debug!("{} already downloaded in {}", info.id, existing.display());
            pending.paths.video_dir = Some(existing);
            return Ok((Status::Skipped, Some(ALREADY_DOWNLOADED.to_string())));
        }
    }

    let request = download_request(&layout, plan.quality, settings);
    if plan.dry_run {
        pending.paths.prepared_filename = Some(layout.video_file(&request.container));
        return Ok((Status::DryRun, None));
    }

    let path = downloader
        .download(url, &request)
        .map_err(|err| err.wrap_err_with(|| format!("Could not download {url}")))?;
    info!("Downloaded {}", path.display());
    pending.paths.prepared_filename = Some(path);

    if plan.export_metadata {
        export_metadata(&info, &layout, settings);
    }

    Ok((Status::Downloaded, None))
}

fn download_request(layout: &VideoLayout, quality: Quality, settings: &Settings) -> DownloadRequest {
    let download = &settings.download;
    let container = if quality == Quality::Audio {
        "m4a".to_string()
    } else {
        download.format.clone()
    };

    DownloadRequest {
        quality,
        container,
        subtitle_languages: if download.download_subtitles {
            split_list(&download.subtitle_languages)
        } else {
            Vec::new()
        },
        thumbnail: download.download_thumbnails,
        video_template: layout.video_template(),
        thumbnail_template: layout.thumbnail_template(),
        subtitle_template: layout.subtitle_template(),
    }
}

/// A failed export does not fail the download
fn export_metadata(info: &VideoInfo, layout: &VideoLayout, settings: &Settings) {
    let format = settings.metadata.export_format;
    let export = MetadataExport::new(info, &settings.metadata, now_rfc3339());
    let path = layout.metadata_file(format.extension());

    match write_export(&path, &export, format) {
        Ok(()) => debug!("Metadata written to {}", path.display()),
        Err(err) => warn!("Could not export the metadata of {}: {err:?}", info.id),
    }
}

fn print_results(log: &RunLog) {
    for record in log.records() {
        let title = record.title.as_deref().unwrap_or(&record.video_id);
        match record.status {
            Status::Downloaded => println!("{} {title}", "✓".green()),
            Status::Skipped => println!(
                "{} {title} ({})",
                "-".yellow(),
                record.reason.as_deref().unwrap_or("skipped")
            ),
            Status::DryRun => match &record.paths.video_dir {
                Some(dir) => println!("{} {title} -> {}", "?".blue(), dir.display()),
                None => println!("{} {title} ({})", "?".blue(), record.url),
            },
            Status::Failed | Status::Pending => println!(
                "{} {title}: {}",
                "✗".red(),
                record.reason.as_deref().unwrap_or("failed")
            ),
        }
    }

    let summary = log.summary();
    let count = |status: Status| summary.counts.get(status.as_str()).copied().unwrap_or(0);
    println!(
        "\n{} downloaded, {} skipped, {} dry-run, {} failed",
        count(Status::Downloaded).green(),
        count(Status::Skipped).yellow(),
        count(Status::DryRun).blue(),
        count(Status::Failed).red(),
    );
}
