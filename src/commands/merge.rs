use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::{
    cli::MergeArgs,
    io,
    outside::{Ffmpeg, SubtitleRenderer},
    settings::Settings,
    subtitles::vtt_file_to_srt,
    types::{is_video_file, MergeQuality, SubtitleFormat, SubtitleStyle},
};

const DEFAULT_OUTPUT_DIR: &str = "merged_videos";
const OUTPUT_SUFFIX: &str = "_with_subtitles";

/// Settings of a merge run, after applying the command line overrides
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub output_dir: PathBuf,
    pub language: String,
    pub quality: MergeQuality,
    pub style: SubtitleStyle,
    /// Where converted subtitles are written. System temp dir if unset
    pub temp_dir: Option<PathBuf>,
    pub dry_run: bool,
}

impl MergePlan {
    pub fn new(args: &MergeArgs, settings: &Settings) -> Self {
        let vp = &settings.video_processing;
        let output_dir = args.output.clone().unwrap_or_else(|| {
            args.input
                .parent()
                .unwrap_or(Path::new("."))
                .join(DEFAULT_OUTPUT_DIR)
        });

        Self {
            output_dir,
            language: args
                .language
                .clone()
                .unwrap_or_else(|| vp.default_subtitle_language.clone()),
            quality: args.quality.unwrap_or(vp.output_quality),
            style: SubtitleStyle {
                fontsize: args.fontsize.unwrap_or(vp.subtitle_fontsize),
                fontcolor: args
                    .fontcolor
                    .clone()
                    .unwrap_or_else(|| vp.subtitle_fontcolor.clone()),
                outline: args.outline.unwrap_or(vp.subtitle_outline),
                outlinecolor: vp.subtitle_outlinecolor.clone(),
            },
            temp_dir: vp.temp_directory.clone(),
            dry_run: args.dry_run,
        }
    }

    pub fn output_file(&self, video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(format!("{stem}{OUTPUT_SUFFIX}.mp4"))
    }
}

pub fn run(args: &MergeArgs, settings: &Settings) -> Result<ExitCode> {
    if !args.input.exists() {
        return Err(miette!("{} does not exist", args.input.display()));
    }
    let plan = MergePlan::new(args, settings);

    let videos = if args.batch {
        if !args.input.is_dir() {
            return Err(miette!("{} is not a directory", args.input.display()));
        }
        find_videos(&args.input, &plan.output_dir)
    } else {
        vec![args.input.clone()]
    };
    info!("{} video(s) to process", videos.len());

    if plan.dry_run {
        print_dry_run(&videos, &plan);
        return Ok(ExitCode::SUCCESS);
    }

    let renderer = Ffmpeg::new()?;
    let failures = merge_all(&renderer, &videos, &plan);
    println!(
        "\n{} merged, {} failed",
        (videos.len() - failures).green(),
        failures.red()
    );

    Ok(if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Merge every video, one at a time. Return the number of failures.
pub fn merge_all(renderer: &dyn SubtitleRenderer, videos: &[PathBuf], plan: &MergePlan) -> usize {
    let mut failures = 0;

    for video in videos {
        match merge_one(renderer, video, plan) {
            Ok(output) => println!("{} {}", "✓".green(), output.display()),
            Err(err) => {
                error!("Could not merge {}: {err:?}", video.display());
                println!("{} {}: {err}", "✗".red(), video.display());
                failures += 1;
            }
        }
    }

    failures
}

fn merge_one(renderer: &dyn SubtitleRenderer, video: &Path, plan: &MergePlan) -> Result<PathBuf> {
    let subtitles = find_subtitles(video, &plan.language)
        .ok_or_else(|| miette!("No {} subtitles found", plan.language))?;
    let output = plan.output_file(video);
    std::fs::create_dir_all(&plan.output_dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not create {}", plan.output_dir.display()))?;

    info!(
        "Burning {} into {} ({}, {})",
        subtitles.display(),
        video.display(),
        plan.quality,
        plan.style
    );

    match SubtitleFormat::from_path(&subtitles) {
        Some(SubtitleFormat::Vtt) => {
            // Removed when the handle is dropped
            let srt = io::named_tempfile(plan.temp_dir.as_deref(), SubtitleFormat::Srt.with_dot())?;
            vtt_file_to_srt(&subtitles, srt.path())?;
            renderer.render(video, srt.path(), &output, &plan.style, plan.quality)?;
        }
        _ => renderer.render(video, &subtitles, &output, &plan.style, plan.quality)?,
    }

    Ok(output)
}

/// Look for `<stem>.<lang>.<ext>`, then for the base language (`zh` for `zh-Hans`).
///
/// The video directory is searched first, then the `subtitles/` directory of
/// the channel when the video is inside a library.
pub fn find_subtitles(video: &Path, language: &str) -> Option<PathBuf> {
    let stem = video.file_stem()?.to_string_lossy();

    let mut languages = vec![language];
    if let Some((base, _)) = language.split_once('-') {
        languages.push(base);
    }

    let video_dir = video.parent()?;
    let mut dirs = vec![video_dir.to_path_buf()];
    // `<channel>/videos/<stem>/<file>`
    if let Some(videos_dir) = video_dir.parent().filter(|d| d.ends_with("videos")) {
        if let Some(channel_dir) = videos_dir.parent() {
            dirs.push(channel_dir.join("subtitles"));
        }
    }

    languages.iter().find_map(|lang| {
        dirs.iter().find_map(|dir| {
            SubtitleFormat::ALL
                .iter()
                .map(|format| dir.join(format!("{stem}.{lang}{}", format.with_dot())))
                .find(|path| path.is_file())
        })
    })
}

/// Videos below `dir`, sorted, skipping the output directory and partial downloads
pub fn find_videos(dir: &Path, output_dir: &Path) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| entry.path() != output_dir)
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_video_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    videos.sort();
    videos
}

fn print_dry_run(videos: &[PathBuf], plan: &MergePlan) {
    for video in videos {
        match find_subtitles(video, &plan.language) {
            Some(subtitles) => println!(
                "{} {} + {} -> {}",
                "?".blue(),
                video.display(),
                subtitles.display(),
                plan.output_file(video).display()
            ),
            None => println!(
                "{} {}: no {} subtitles",
                "✗".red(),
                video.display(),
                plan.language
            ),
        }
    }
}
