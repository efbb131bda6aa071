use std::process::ExitCode;

use miette::{IntoDiagnostic, Result};
use tracing::info;

use crate::{
    cli::{ReportArgs, ReportFormat},
    io,
    organizer::DirectoryReport,
    utils::now_rfc3339,
};

pub fn run(args: &ReportArgs) -> Result<ExitCode> {
    let report = DirectoryReport::scan(&args.path, now_rfc3339())?;

    let content = match args.format {
        ReportFormat::Text => report.to_text(),
        ReportFormat::Json => {
            let mut json = serde_json::to_string_pretty(&report).into_diagnostic()?;
            json.push('\n');
            json
        }
    };

    match &args.output {
        Some(path) => {
            io::write_bytes_atomic(path, content.as_bytes())?;
            info!("Report written to {}", path.display());
        }
        None => print!("{content}"),
    }

    Ok(ExitCode::SUCCESS)
}
