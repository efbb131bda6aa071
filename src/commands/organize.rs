use std::process::ExitCode;

use miette::Result;
use owo_colors::OwoColorize;
use tracing::info;

use crate::{
    cli::OrganizeArgs,
    organizer::{organize_existing, remove_empty_dirs, Status},
    settings::Settings,
};

pub fn run(args: &OrganizeArgs, settings: &Settings) -> Result<ExitCode> {
    let output = args.output.as_deref().unwrap_or(&args.path);
    let log = organize_existing(
        &args.path,
        output,
        settings.organization.max_filename_length,
    )?;

    for record in log.records() {
        let name = record.title.as_deref().unwrap_or(&record.video_id);
        match record.status {
            Status::Downloaded => println!("{} {name}", "✓".green()),
            Status::Skipped => println!("{} {name} (already organized)", "-".yellow()),
            _ => println!(
                "{} {name}: {}",
                "✗".red(),
                record.reason.as_deref().unwrap_or("failed")
            ),
        }
    }
    log.write(output)?;

    if args.cleanup {
        let removed = remove_empty_dirs(&args.path)?;
        info!("{} empty directories removed", removed.len());
        println!("{} empty directories removed", removed.len());
    }

    Ok(if log.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
