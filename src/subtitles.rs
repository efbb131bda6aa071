//! WebVTT to SubRip conversion.
//!
//! Auto-generated subtitles are full of inline timing tags, positioning
//! settings and repeated lines that look bad once burnt into a video.
//! They are cleaned up during the conversion.

use std::{fmt::Write, path::Path, sync::OnceLock};

use miette::{Context, IntoDiagnostic, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::io;

/// Cues shorter than this are flashes, most often artifacts of rolling captions
const MIN_CUE_MILLIS: u64 = 100;

/// Tags such as `<c>`, `</c>` or `<00:00:01.189>`
const TAG_PATTERN: &str = r"<[^>]*>|&lt;[^&]*&gt;";
/// Cue settings that may leak into the text
const SETTING_PATTERN: &str = r"align:\w+|position:\d+%";
const SPACES_PATTERN: &str = r"\s+";

static TAG_RE: OnceLock<Regex> = OnceLock::new();
static SETTING_RE: OnceLock<Regex> = OnceLock::new();
static SPACES_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cue {
    start: u64,
    end: u64,
    lines: Vec<String>,
}

/// Convert the WebVTT file at `vtt` into a SubRip file at `srt`
pub fn vtt_file_to_srt(vtt: &Path, srt: &Path) -> Result<()> {
    let content = std::fs::read_to_string(vtt)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not read subtitles {}", vtt.display()))?;

    io::write_bytes_atomic(srt, vtt_to_srt(&content).as_bytes())?;
    info!("Converted {} to SRT", vtt.display());
    Ok(())
}

/// Convert WebVTT content into SubRip content
pub fn vtt_to_srt(vtt: &str) -> String {
    let mut out = String::new();
    for (i, cue) in parse_cues(vtt).iter().enumerate() {
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{}\n{} --> {}\n{}\n",
            i + 1,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.lines.join("\n")
        );
    }
    out
}

fn parse_cues(vtt: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut lines = vtt.lines().map(str::trim).peekable();

    while let Some(line) = lines.next() {
        if !line.contains("-->") {
            continue;
        }

        // The cue text runs until the next blank line
        let mut text = Vec::new();
        while let Some(next) = lines.next_if(|l| !l.is_empty()) {
            text.push(next);
        }

        let Some((start, end)) = parse_timing(line) else {
            debug!("Skipping cue with invalid timing: {line}");
            continue;
        };
        if end < start.saturating_add(MIN_CUE_MILLIS) {
            continue;
        }

        let mut cue_lines: Vec<String> = Vec::new();
        for text in text {
            if text.starts_with("NOTE") || text.starts_with("Kind:") || text.starts_with("Language:") {
                continue;
            }
            let cleaned = clean_text(text);
            if !cleaned.is_empty() && !is_duplicate(&cleaned, &cue_lines) {
                cue_lines.push(cleaned);
            }
        }

        if cue_lines.iter().any(|l| l.chars().count() > 1) {
            cues.push(Cue {
                start,
                end,
                lines: cue_lines,
            });
        }
    }

    cues
}

/// Parse `00:00:01.000 --> 00:00:02.500 align:start position:0%`
fn parse_timing(line: &str) -> Option<(u64, u64)> {
    let (start, end) = line.split_once("-->")?;
    let start = parse_timestamp(start.split_whitespace().next()?)?;
    let end = parse_timestamp(end.split_whitespace().next()?)?;
    Some((start, end))
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into milliseconds
fn parse_timestamp(s: &str) -> Option<u64> {
    let (clock, millis) = s.split_once('.')?;
    let millis: u64 = millis.parse().ok()?;

    let mut parts = clock.rsplit(':');
    let seconds: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let hours: u64 = match parts.next() {
        Some(hours) => hours.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }

    hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}

fn format_timestamp(millis: u64) -> String {
    let (seconds, millis) = (millis / 1000, millis % 1000);
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

fn clean_text(text: &str) -> String {
    let tags = TAG_RE.get_or_init(|| Regex::new(TAG_PATTERN).unwrap());
    let settings = SETTING_RE.get_or_init(|| Regex::new(SETTING_PATTERN).unwrap());
    let spaces = SPACES_RE.get_or_init(|| Regex::new(SPACES_PATTERN).unwrap());

    let text = tags.replace_all(text, "");
    let text = settings.replace_all(&text, "");
    let text = text
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    spaces.replace_all(&text, " ").trim().to_string()
}

/// Whether the line repeats, contains or is contained in a line of the cue
fn is_duplicate(line: &str, existing: &[String]) -> bool {
    existing
        .iter()
        .any(|e| e.contains(line) || line.contains(e.as_str()))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn converts_simple_file() {
        let vtt = indoc! {"
            WEBVTT
            Kind: captions
            Language: en

            00:00:01.000 --> 00:00:03.500 align:start position:0%
            Hello <c>world</c>

            00:01:02.250 --> 00:01:04.000
            Tom &amp; Jerry
        "};

        let expected = indoc! {"
            1
            00:00:01,000 --> 00:00:03,500
            Hello world

            2
            00:01:02,250 --> 00:01:04,000
            Tom & Jerry

        "};
        assert_eq!(vtt_to_srt(vtt), expected);
    }

    #[test]
    fn drops_flashes_and_duplicates() {
        let vtt = indoc! {"
            WEBVTT

            00:00:01.000 --> 00:00:01.050
            too short

            00:00:02.000 --> 00:00:04.000
            rolling<00:00:02.500><c> caption</c>
            rolling caption
            second line

            00:00:05.000 --> 00:00:06.000
            a
        "};

        let expected = indoc! {"
            1
            00:00:02,000 --> 00:00:04,000
            rolling caption
            second line

        "};
        assert_eq!(vtt_to_srt(vtt), expected);
    }

    #[test]
    fn timestamps() {
        assert_eq!(parse_timestamp("01:02:03.004"), Some(3_723_004));
        assert_eq!(parse_timestamp("02:03.004"), Some(123_004));
        assert_eq!(parse_timestamp("garbage"), None);
        assert_eq!(format_timestamp(3_723_004), "01:02:03,004");
    }

    #[test]
    fn huge_timestamps_are_invalid() {
        assert_eq!(parse_timestamp("18446744073709551615:00:00.000"), None);
        assert_eq!(parse_timestamp("5124095576030432:00:00.000"), None);

        let vtt = indoc! {"
            WEBVTT

            99999999999999999:00:00.000 --> 99999999999999999:00:01.000
            overflow

            00:00:01.000 --> 00:00:02.000
            kept
        "};
        assert_eq!(vtt_to_srt(vtt), "1\n00:00:01,000 --> 00:00:02,000\nkept\n\n");
    }

    #[test]
    fn converts_files() {
        let dir = tempfile::tempdir().unwrap();
        let vtt = dir.path().join("v.en.vtt");
        let srt = dir.path().join("v.en.srt");
        std::fs::write(&vtt, "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nHi there\n").unwrap();

        vtt_file_to_srt(&vtt, &srt).unwrap();
        assert_eq!(
            std::fs::read_to_string(&srt).unwrap(),
            "1\n00:00:00,000 --> 00:00:01,000\nHi there\n\n"
        );
    }
}
