pub mod config;
pub mod download;
pub mod merge;
pub mod metadata;
pub mod organize;
pub mod report;

#[cfg(test)]
mod testing;
