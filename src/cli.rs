use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use indoc::indoc;

use crate::{
    settings::ExportFormat,
    types::{MergeQuality, Quality},
};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("YTMIGRATOR_", $v)
    };
}

/// Wrapper-tool around `yt-dlp` and `ffmpeg` to migrate YouTube videos into an organized library.
/// Download, organize, report on, and burn subtitles into videos.
#[derive(Parser, Debug)]
#[command(version, after_help = indoc! {"
    Examples:
      ytmigrator download https://www.youtube.com/watch?v=dQw4w9WgXcQ
      ytmigrator download --playlist --limit 10 https://www.youtube.com/playlist?list=PL...
      ytmigrator download --channel --dry-run https://www.youtube.com/@channel
      ytmigrator merge ./downloads --batch -l zh-Hans -q medium
      ytmigrator config set download quality 720p
"})]
pub struct Cli {
    /// The path to the configuration file
    #[arg(long, global = true, env = arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// Log more details. Repeat for even more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download videos, playlists or channels into the library
    Download(DownloadArgs),

    /// Export the metadata of videos without downloading them
    Metadata(MetadataArgs),

    /// Move previously downloaded files into the library layout
    Organize(OrganizeArgs),

    /// Summarize the content of a library
    Report(ReportArgs),

    /// Burn subtitles into videos
    Merge(MergeArgs),

    /// Manage the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// The URLs of the videos, playlists or channels to download
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// The path to the output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The quality of the downloaded streams
    #[arg(short, long, value_enum)]
    pub quality: Option<Quality>,

    /// Only download the audio stream
    #[arg(long)]
    pub audio_only: bool,

    /// The URLs are playlists
    #[arg(long, conflicts_with = "channel")]
    pub playlist: bool,

    /// The URLs are channels
    #[arg(long)]
    pub channel: bool,

    /// The maximum number of videos to take from each playlist or channel
    #[arg(long)]
    pub limit: Option<usize>,

    /// Show what would be downloaded without downloading anything
    #[arg(long)]
    pub dry_run: bool,

    /// Download again videos that were already downloaded
    #[arg(long)]
    pub force: bool,

    /// Do not export the metadata of the downloaded videos
    #[arg(long)]
    pub no_metadata: bool,
}

#[derive(Args, Debug)]
pub struct MetadataArgs {
    /// The URLs of the videos
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// The path to the output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The format of the exported files
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
}

#[derive(Args, Debug)]
pub struct OrganizeArgs {
    /// The directory containing the downloaded files
    pub path: PathBuf,

    /// The library to move the files into. Defaults to `path`
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Remove the directories left empty afterwards
    #[arg(long)]
    pub cleanup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// The library to summarize
    pub path: PathBuf,

    /// Write the report to this file instead of the standard output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub format: ReportFormat,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// A video file, or a directory with `--batch`
    pub input: PathBuf,

    /// The path to the output directory. Defaults to `merged_videos` next to the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The language of the subtitles to burn
    #[arg(short = 'l', long = "language")]
    pub language: Option<String>,

    /// The encoding quality of the output videos
    #[arg(short, long, value_enum)]
    pub quality: Option<MergeQuality>,

    #[arg(long)]
    pub fontsize: Option<u32>,

    /// A color name (white, black, red, ...) or a `RRGGBB` hex code
    #[arg(long)]
    pub fontcolor: Option<String>,

    /// The width of the text outline
    #[arg(long)]
    pub outline: Option<u32>,

    /// Process every video found in the input directory
    #[arg(long)]
    pub batch: bool,

    /// Show what would be merged without doing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the current configuration
    Show,

    /// Set a single value
    #[command(after_help = indoc! {"
        Values are interpreted as booleans or numbers when possible,
        `none` unsets optional values.

        Example: ytmigrator config set download quality 720p
    "})]
    Set {
        section: String,
        key: String,
        value: String,
    },

    /// Restore the default configuration
    Reset,

    /// Write the configuration to a JSON file
    Export { file: PathBuf },

    /// Replace the configuration with one exported before
    Import { file: PathBuf },

    /// Check the configuration for problems
    Validate,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_download() {
        let cli = Cli::parse_from([
            "ytmigrator", "-vv", "download", "--playlist", "--limit", "5", "-q", "720p", "url",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Download(args) = cli.command else {
            panic!("not a download");
        };
        assert!(args.playlist);
        assert_eq!(args.limit, Some(5));
        assert_eq!(args.quality, Some(Quality::P720));
        assert_eq!(args.urls, ["url"]);
    }

    #[test]
    fn playlist_and_channel_conflict() {
        let res = Cli::try_parse_from(["ytmigrator", "download", "--playlist", "--channel", "url"]);
        assert!(res.is_err());
    }

    #[test]
    fn parses_config_set() {
        let cli = Cli::parse_from(["ytmigrator", "config", "set", "download", "quality", "best"]);
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommand::Set { .. })
        ));
    }
}
