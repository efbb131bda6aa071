use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use miette::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::io;

use super::{
    manifest::{read_manifest, write_manifest, Status, VideoRecord},
    naming::MANIFEST_FILE,
};

pub const INDEX_FILE: &str = "index.json";
pub const REPORT_FILE: &str = "report.json";

const TOP_ERRORS: usize = 10;

/// One line of `index.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    pub video_id: String,
    pub title: Option<String>,
    pub status: Status,
    pub video_dir: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Number of records per status. Every status is present.
    pub counts: BTreeMap<String, usize>,
    pub skip_reasons: BTreeMap<String, usize>,
    /// Most frequent failure reasons, most frequent first
    pub top_errors: Vec<(String, usize)>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub summary: Summary,
    pub results: Vec<VideoRecord>,
}

/// Settled records of a single invocation, in processing order
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<(VideoRecord, Option<PathBuf>)>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a settled record and the manifest written for it, if any
    pub fn push(&mut self, record: VideoRecord, manifest_path: Option<PathBuf>) {
        debug_assert_ne!(record.status, Status::Pending);
        self.entries.push((record, manifest_path));
    }

    /// Settle a pending record, write its manifest and add it to the run.
    ///
    /// Records without a video directory get no manifest. Skipped records, and
    /// dry runs of downloaded videos, keep the manifest already on disk. When
    /// the manifest cannot be written, the record is added as failed instead.
    pub fn finish(
        &mut self,
        pending: &VideoRecord,
        status: Status,
        reason: Option<String>,
    ) -> Result<()> {
        let record = pending.settle(status, reason)?;
        let Some(video_dir) = record.paths.video_dir.clone() else {
            self.push(record, None);
            return Ok(());
        };

        let existing = video_dir.join(MANIFEST_FILE);
        let keeps_existing = match status {
            Status::Skipped => true,
            // A dry run never replaces the manifest of an actual download
            Status::DryRun => {
                read_manifest(&existing).is_some_and(|m| m.status == Status::Downloaded)
            }
            _ => false,
        };
        if keeps_existing {
            self.push(record, Some(existing));
            return Ok(());
        }

        match write_manifest(&record) {
            Ok(path) => self.push(record, Some(path)),
            Err(err) => {
                warn!("Could not write manifest of {}: {err:?}", record.video_id);
                let reason = crate::result::Error::from(err).to_reason();
                self.push(pending.settle(Status::Failed, Some(reason))?, None);
            }
        }

        Ok(())
    }

    pub fn records(&self) -> impl Iterator<Item = &VideoRecord> {
        self.entries.iter().map(|(record, _)| record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.records().any(|r| r.status == Status::Failed)
    }

    pub fn index(&self) -> Vec<IndexEntry> {
        self.entries
            .iter()
            .map(|(record, manifest_path)| IndexEntry {
                video_id: record.video_id.clone(),
                title: record.title.clone(),
                status: record.status,
                video_dir: record.paths.video_dir.clone(),
                manifest_path: manifest_path.clone(),
            })
            .collect()
    }

    pub fn summary(&self) -> Summary {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut skip_reasons = BTreeMap::new();
        let mut errors: BTreeMap<String, usize> = BTreeMap::new();

        for record in self.records() {
            *counts.entry(record.status.to_string()).or_default() += 1;

            let reason = record.reason.clone().unwrap_or_else(|| "unknown".to_string());
            match record.status {
                Status::Skipped => *skip_reasons.entry(reason).or_default() += 1,
                Status::Failed => *errors.entry(reason).or_default() += 1,
                _ => {}
            }
        }

        // Ties keep the alphabetical order of the map
        let mut top_errors: Vec<_> = errors.into_iter().collect();
        top_errors.sort_by(|(_, a), (_, b)| b.cmp(a));
        top_errors.truncate(TOP_ERRORS);

        Summary {
            counts,
            skip_reasons,
            top_errors,
            total: self.len(),
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            summary: self.summary(),
            results: self.records().cloned().collect(),
        }
    }

    /// Atomically write `index.json` and `report.json` under `output`.
    /// Return their paths.
    pub fn write(&self, output: &Path) -> Result<(PathBuf, PathBuf)> {
        let index_path = output.join(INDEX_FILE);
        let report_path = output.join(REPORT_FILE);

        io::write_json_atomic(&index_path, &self.index())?;
        io::write_json_atomic(&report_path, &self.report())?;
        info!(
            "Index written to {}, report to {}",
            index_path.display(),
            report_path.display()
        );

        Ok((index_path, report_path))
    }
}
