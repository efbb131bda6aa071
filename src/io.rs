use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use miette::{Context, IntoDiagnostic, Result};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

/// Atomically replace the file at `path` with what `write` produces.
///
/// The content is written to a temporary file in the same directory, flushed,
/// then renamed over `path`. If `write` fails, or the process dies before the
/// rename, `path` keeps its previous content and the temporary file is removed.
pub fn write_atomic_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not create directory {}", dir.display()))?;

    let tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)
        .into_diagnostic()
        .wrap_err("Could not create temporary file")?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer.flush().into_diagnostic()?;
    }
    tmp.as_file().sync_all().into_diagnostic()?;

    tmp.persist(path)
        .map_err(|err| err.error)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not move temporary file to {}", path.display()))?;

    Ok(())
}

/// Atomically write `value` as pretty JSON
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic_with(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value).into_diagnostic()?;
        writeln!(writer).into_diagnostic()
    })
}

/// Atomically write raw bytes
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, |writer| writer.write_all(bytes).into_diagnostic())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not parse {}", path.display()))
}

/// Create a named temporary file and return its handle.
///
/// The file destructor will be called at the handle drop.
/// **As such, one must not simply get the file path and drop the handle.**
pub fn named_tempfile(dir: Option<&Path>, suffix: &str) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.suffix(suffix);

    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .into_diagnostic()
    .wrap_err("Could not create temporary file")
}

/// Move a file, falling back to copy and delete when renaming is not possible
/// (e.g. across file systems).
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }

    if std::fs::rename(from, to).is_err() {
        tracing::debug!("Moving file failed, falling back to copying");
        std::fs::copy(from, to)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not copy {} to {}", from.display(), to.display()))?;
        std::fs::remove_file(from).into_diagnostic()?;
    }

    Ok(())
}
