mod command;
mod ffmpeg;
mod ytdl;

pub use ffmpeg::{Ffmpeg, SubtitleRenderer};
pub use ytdl::{DownloadRequest, StreamDownloader, Ytdl, YtdlOptions};
