mod extension;
mod metadata;
mod quality;
mod style;

pub use extension::{is_thumbnail_file, is_video_file, SubtitleFormat};
#[cfg(test)]
pub use metadata::ListingEntry;
pub use metadata::{Listing, MetadataExport, VideoInfo};
pub use quality::{MergeQuality, Quality};
pub use style::SubtitleStyle;
