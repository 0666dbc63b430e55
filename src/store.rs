use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;

use crate::{Error, Lot, Result};

/// Makes sure `dir` exists before any page is requested.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::OutputDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Writes the dataset as a pretty printed JSON array to `dir/file_name`.
///
/// The array goes to a temp file in the same directory first, which then
/// replaces the target. A failed write leaves the previous dataset in place.
pub fn write_dataset(dir: &Path, file_name: &str, lots: &[Lot]) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let tmp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        let mut ser =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        lots.serialize(&mut ser)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| Error::Persist {
        path: path.clone(),
        source: e.error,
    })?;

    Ok(path)
}

/// Async wrapper around [`write_dataset`], run off the runtime threads.
pub async fn write_dataset_async(dir: PathBuf, file_name: String, lots: Vec<Lot>) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || write_dataset(&dir, &file_name, &lots)).await?
}

pub fn load_dataset(path: &Path) -> Result<Vec<Lot>> {
    let file = File::open(path)?;
    let lots = serde_json::from_reader(BufReader::new(file))?;
    Ok(lots)
}
