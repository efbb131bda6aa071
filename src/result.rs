use std::fmt::Display;

use miette::miette;

/// Failures whose kind matters to the caller.
///
/// Everything that only needs to be reported goes through [`Error::Miette`].
#[derive(Debug)]
pub enum Error {
    /// The video is private, removed or otherwise not available
    Unavailable(String),

    /// The site refuses to serve us for now (HTTP 429 and friends)
    RateLimited(String),

    /// The downloader failed for any other reason, most often the network
    Network(String),

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::Miette(err) => err,
            err => miette!("{err}"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unavailable(msg) => write!(f, "Unavailable: {msg}"),
            Error::RateLimited(msg) => write!(f, "Rate limited: {msg}"),
            Error::Network(msg) => write!(f, "Download failed: {msg}"),
            Error::Miette(report) => write!(f, "{report}"),
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }

    /// Flatten the error and its causes into a single line,
    /// suitable for a manifest or a report entry.
    pub fn to_reason(&self) -> String {
        match self {
            Error::Miette(report) => report
                .chain()
                .map(|cause| cause.to_string())
                .collect::<Vec<_>>()
                .join(": "),
            err => err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn err_msg<D: Display>(msg: D) -> Error {
    Error::Miette(miette!("{msg}"))
}

pub fn bail<T, D: Display>(msg: D) -> Result<T> {
    Err(err_msg(msg))
}
