//! Where files go on disk and the bookkeeping written next to them

mod cleanup;
mod directory_report;
mod manifest;
mod naming;
mod organize;
mod playlist;
mod run;

pub use cleanup::remove_empty_dirs;
pub use directory_report::DirectoryReport;
#[cfg(test)]
pub use manifest::read_manifest;
pub use manifest::{find_downloaded, Status, VideoRecord};
pub use naming::{sanitize, VideoLayout};
pub use organize::organize_existing;
pub use playlist::PlaylistManifest;
pub use run::RunLog;
