use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use miette::miette;

use super::command::{assert_success_command, last_line, run_command, Capture, YT_DL, YT_DLP};
use crate::{
    result::{Error, Result},
    settings::Settings,
    types::{Listing, Quality, VideoInfo},
};

/// Interface for downloading streams and their metadata
pub trait StreamDownloader {
    /// List the videos behind a URL, without their full metadata.
    ///
    /// A playlist or a channel gives one entry per video, at most `limit`.
    /// A single video gives a single entry.
    fn list_entries(&self, url: &str, limit: Option<usize>) -> Result<Listing>;

    /// Get the full metadata of a single video
    fn get_info(&self, url: &str) -> Result<VideoInfo>;

    /// Download a single video and its side files as described by the request.
    /// Return the path of the downloaded media file.
    fn download(&self, url: &str, request: &DownloadRequest) -> Result<PathBuf>;
}

/// What to download for one video and where to put it
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub quality: Quality,
    /// Container the streams are merged into, e.g. `mp4`
    pub container: String,
    /// Languages of the subtitles to fetch. No subtitles when empty
    pub subtitle_languages: Vec<String>,
    pub thumbnail: bool,
    pub video_template: PathBuf,
    pub thumbnail_template: PathBuf,
    pub subtitle_template: PathBuf,
}

/// Options applied to every invocation of the downloader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YtdlOptions {
    pub concurrent_fragments: u32,
    pub rate_limit: Option<String>,
    pub retries: u32,
    pub proxy: Option<String>,
    pub cookies: Option<PathBuf>,
}

impl From<&Settings> for YtdlOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            concurrent_fragments: settings.download.concurrent_downloads,
            rate_limit: settings.download.rate_limit.clone(),
            retries: settings.download.retry_attempts,
            proxy: settings.advanced.proxy_url.clone(),
            cookies: settings.advanced.cookies_file.clone(),
        }
    }
}

impl YtdlOptions {
    fn apply<'c>(&self, cmd: &'c mut Command) -> &'c mut Command {
        if self.concurrent_fragments > 0 {
            cmd.args(["--concurrent-fragments", &self.concurrent_fragments.to_string()]);
        }
        cmd.args(["--retries", &self.retries.to_string()]);
        if let Some(rate) = &self.rate_limit {
            cmd.args(["--limit-rate", rate]);
        }
        if let Some(proxy) = &self.proxy {
            cmd.args(["--proxy", proxy]);
        }
        if let Some(cookies) = &self.cookies {
            cmd.args([OsStr::new("--cookies"), cookies.as_os_str()]);
        }
        cmd
    }
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program,
/// or `youtube-dl` when it is the only one installed
pub struct Ytdl {
    program: &'static str,
    options: YtdlOptions,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new(options: YtdlOptions) -> miette::Result<Self> {
        // Check `yt-dlp`
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self {
                program: YT_DLP,
                options,
            })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            // Check `youtube-dl`
            Ok(Self {
                program: YT_DL,
                options,
            })
        } else {
            Err(miette!(
                help = "Install yt-dlp and make sure it is in the PATH",
                "Neither yt-dlp nor youtube-dl found"
            ))
        }
    }

    /// Run the command and turn an unsuccessful run into the matching typed failure.
    ///
    /// In other cases, return the output handle.
    fn run_checked<F>(&self, f: F) -> Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let res = run_command(
            self.program,
            |cmd| self.options.apply(f(cmd)),
            Capture::STDOUT | Capture::STDERR,
        )?;

        if res.status.success() {
            Ok(res)
        } else {
            Err(classify_failure(&res.stderr))
        }
    }
}

/// Tell apart the reasons for which the downloader failed, from its error output
pub fn classify_failure(stderr: &[u8]) -> Error {
    let stderr = String::from_utf8_lossy(stderr);
    let errors: Vec<&str> = stderr
        .lines()
        .filter(|line| line.starts_with("ERROR:"))
        .collect();
    let message = errors
        .last()
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .or_else(|| last_line(stderr.as_bytes()))
        .unwrap_or_else(|| "unknown error".to_string());

    let has = |needles: &[&str]| {
        errors.iter().any(|line| {
            let line = line.to_lowercase();
            needles.iter().any(|needle| line.contains(needle))
        })
    };

    if has(&["unavailable", "private video", "has been removed", "not available"]) {
        Error::Unavailable(message)
    } else if has(&["http error 429", "too many requests", "rate limit", "rate-limit"]) {
        Error::RateLimited(message)
    } else {
        Error::Network(message)
    }
}

impl StreamDownloader for Ytdl {
    fn list_entries(&self, url: &str, limit: Option<usize>) -> Result<Listing> {
        let res = self.run_checked(|cmd| {
            cmd.arg("-J").arg("--flat-playlist");
            if let Some(limit) = limit {
                cmd.args(["--playlist-end", &limit.to_string()]);
            }
            cmd.arg("--").arg(url)
        })?;

        let output = String::from_utf8_lossy(&res.stdout);
        Ok(Listing::from_json(&output, limit)?)
    }

    fn get_info(&self, url: &str) -> Result<VideoInfo> {
        let res = self.run_checked(|cmd| {
            cmd.arg("-j")
                .arg("--skip-download")
                .arg("--no-playlist")
                .arg("--")
                .arg(url)
        })?;

        let output = String::from_utf8_lossy(&res.stdout);
        Ok(VideoInfo::from_json(&output)?)
    }

    fn download(&self, url: &str, request: &DownloadRequest) -> Result<PathBuf> {
        let res = self.run_checked(|cmd| {
            cmd.arg("--no-simulate")
                .args(["--print", "after_move:filepath"])
                .arg("--no-playlist")
                .args(["-f", request.quality.format_selector()])
                .args([OsStr::new("-o"), request.video_template.as_os_str()]);

            if request.quality != Quality::Audio {
                cmd.args(["--merge-output-format", &request.container]);
            }

            if request.thumbnail {
                cmd.arg("--write-thumbnail")
                    .args(["-o", &template_arg("thumbnail", &request.thumbnail_template)]);
            }

            if !request.subtitle_languages.is_empty() {
                cmd.arg("--write-subs")
                    .arg("--write-auto-subs")
                    .args(["--sub-langs", &request.subtitle_languages.join(",")])
                    .args(["-o", &template_arg("subtitle", &request.subtitle_template)]);
            }

            cmd.arg("--").arg(url)
        })?;

        let filepath = last_line(&res.stdout)
            .ok_or_else(|| miette!("The downloader did not report the downloaded file"))?;
        Ok(PathBuf::from(filepath))
    }
}

/// Output template for a specific kind of file, e.g. `thumbnail:<path>`
fn template_arg(kind: &str, template: &Path) -> String {
    format!("{kind}:{}", template.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_videos() {
        let stderr = b"[youtube] abc: Downloading webpage\nERROR: [youtube] abc: Private video. Sign in if you've been granted access\n";
        let err = classify_failure(stderr);
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(
            err.to_reason(),
            "Unavailable: [youtube] abc: Private video. Sign in if you've been granted access"
        );

        let err = classify_failure(b"ERROR: [youtube] abc: Video unavailable\n");
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[test]
    fn rate_limited() {
        let err = classify_failure(b"ERROR: Unable to download webpage: HTTP Error 429: Too Many Requests\n");
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[test]
    fn everything_else_is_a_network_failure() {
        let err = classify_failure(b"ERROR: Unable to download webpage: <urlopen error timed out>\n");
        assert!(matches!(err, Error::Network(_)));

        // No ERROR line at all
        let err = classify_failure(b"Traceback...\nConnectionResetError\n");
        assert_eq!(err.to_reason(), "Download failed: ConnectionResetError");
    }

    #[test]
    fn options_from_settings() {
        let mut settings = Settings::default();
        settings.download.rate_limit = Some("50K".into());
        settings.advanced.proxy_url = Some("socks5://127.0.0.1:1080".into());

        let options = YtdlOptions::from(&settings);
        let mut cmd = Command::new(YT_DLP);
        options.apply(&mut cmd);

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "--concurrent-fragments",
                "3",
                "--retries",
                "3",
                "--limit-rate",
                "50K",
                "--proxy",
                "socks5://127.0.0.1:1080",
            ]
        );
    }
}
