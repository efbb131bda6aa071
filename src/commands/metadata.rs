use std::{path::Path, process::ExitCode};

use miette::{miette, IntoDiagnostic, Result, WrapErr};
use owo_colors::OwoColorize;
use tracing::{error, info};

use crate::{
    cli::MetadataArgs,
    io,
    organizer::sanitize,
    outside::{StreamDownloader, Ytdl, YtdlOptions},
    settings::{ExportFormat, Settings},
    types::MetadataExport,
    utils::now_rfc3339,
};

/// Write a metadata export in the given format
pub fn write_export(path: &Path, export: &MetadataExport, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Json => io::write_json_atomic(path, export),
        ExportFormat::Csv => io::write_atomic_with(path, |writer| {
            let fields = export.flat_fields();
            let mut csv = csv::Writer::from_writer(writer);
            csv.write_record(fields.iter().map(|(name, _)| *name))
                .into_diagnostic()?;
            csv.write_record(fields.iter().map(|(_, value)| value.as_str()))
                .into_diagnostic()?;
            csv.flush().into_diagnostic()
        }),
    }
    .wrap_err_with(|| format!("Could not write metadata to {}", path.display()))
}

pub fn run(args: &MetadataArgs, settings: &Settings) -> Result<ExitCode> {
    let downloader = Ytdl::new(YtdlOptions::from(settings))?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| settings.download.output_path.clone());
    let format = args.format.unwrap_or(settings.metadata.export_format);

    let failures = export_all(&downloader, &args.urls, &output, format, settings);
    if failures > 0 {
        println!("{} {failures} URL(s) failed", "✗".red());
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Export the metadata of every URL as `<output>/<id>_metadata.<ext>`.
/// Return the number of failed URLs.
fn export_all(
    downloader: &dyn StreamDownloader,
    urls: &[String],
    output: &Path,
    format: ExportFormat,
    settings: &Settings,
) -> usize {
    let mut failures = 0;

    for url in urls {
        let res = downloader
            .get_info(url)
            .map_err(miette::Report::from)
            .and_then(|info| {
                let export = MetadataExport::new(&info, &settings.metadata, now_rfc3339());
                let id = sanitize(&info.id, settings.organization.max_filename_length);
                if id.is_empty() {
                    return Err(miette!("Cannot build a file name for video id '{}'", info.id));
                }
                let path = output.join(format!("{id}_metadata.{}", format.extension()));
                write_export(&path, &export, format)?;
                Ok(path)
            });

        match res {
            Ok(path) => {
                info!("Metadata of {url} written to {}", path.display());
                println!("{} {}", "✓".green(), path.display());
            }
            Err(err) => {
                error!("Could not export the metadata of {url}: {err:?}");
                println!("{} {url}: {err}", "✗".red());
                failures += 1;
            }
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use crate::{commands::testing::FakeDownloader, types::VideoInfo};

    use super::*;

    fn info() -> VideoInfo {
        VideoInfo {
            id: "abc".into(),
            title: Some("Title, with comma".into()),
            tags: Some(vec!["a".into(), "b".into()]),
            view_count: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn exports_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FakeDownloader::default().with_video("u1", info());
        let settings = Settings::default();

        let failures = export_all(
            &downloader,
            &["u1".to_string()],
            dir.path(),
            ExportFormat::Json,
            &settings,
        );
        assert_eq!(failures, 0);
        let json: serde_json::Value = io::read_json(&dir.path().join("abc_metadata.json")).unwrap();
        assert_eq!(json["basic_info"]["title"], "Title, with comma");
        assert_eq!(json["engagement_metrics"]["view_count"], 42);

        export_all(
            &downloader,
            &["u1".to_string()],
            dir.path(),
            ExportFormat::Csv,
            &settings,
        );
        let mut reader = csv::Reader::from_path(dir.path().join("abc_metadata.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        let row = reader.records().next().unwrap().unwrap();
        let title = headers.iter().position(|h| h == "title").unwrap();
        assert_eq!(&row[title], "Title, with comma");
        let tags = headers.iter().position(|h| h == "tags").unwrap();
        assert_eq!(&row[tags], "a;b");
    }

    #[test]
    fn ids_are_sanitized_in_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut escaping = info();
        escaping.id = "../x/y".into();
        let mut unnamable = info();
        unnamable.id = "//".into();
        let downloader = FakeDownloader::default()
            .with_video("u1", escaping)
            .with_video("u2", unnamable);
        let urls = vec!["u1".to_string(), "u2".to_string()];

        let failures =
            export_all(&downloader, &urls, dir.path(), ExportFormat::Json, &Settings::default());

        assert_eq!(failures, 1);
        assert!(dir.path().join("x_y_metadata.json").is_file());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failures_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = FakeDownloader::default()
            .with_video("u1", info())
            .with_unavailable("u2");

        let failures = export_all(
            &downloader,
            &["u1".to_string(), "u2".to_string()],
            dir.path(),
            ExportFormat::Json,
            &Settings::default(),
        );
        assert_eq!(failures, 1);
        assert!(dir.path().join("abc_metadata.json").is_file());
    }
}
