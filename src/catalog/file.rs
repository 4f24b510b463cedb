/// File-backed catalog store.
///
/// Layout: 4-byte magic `PCAT`, little-endian `u32` format version, then a
/// bincode-encoded map of pathname to record. The whole file is rewritten on
/// every mutation so a successful `put_series` has reached the file before it returns.
///
/// The handle holds an exclusive advisory lock on the file for its whole
/// lifetime; the lock is released by `close()` or on drop.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::{Catalog, CatalogError, validate_entry};
use crate::logging::{self, Component};
use crate::model::CatalogEntry;

const MAGIC: &[u8; 4] = b"PCAT";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogContents {
    records: BTreeMap<String, CatalogEntry>,
}

/// An open catalog file.
#[derive(Debug)]
pub struct CatalogFile {
    path: PathBuf,
    file: File,
    contents: CatalogContents,
    released: bool,
}

impl CatalogFile {
    /// Opens the catalog at `path`, creating an empty one if absent.
    ///
    /// Fails with `Locked` if another handle already holds the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let (path, file) = lock_file(path.as_ref())?;

        let len = file
            .metadata()
            .map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?
            .len();

        let contents = if len == 0 {
            CatalogContents::default()
        } else {
            decode(&path, &file)?
        };

        logging::debug(
            Component::Catalog,
            None,
            &format!(
                "Opened catalog {} ({} records)",
                path.display(),
                contents.records.len()
            ),
        );

        Ok(Self {
            path,
            file,
            contents,
            released: false,
        })
    }

    /// Opens the catalog at `path` and discards whatever it held.
    ///
    /// The lock is taken before truncating: a catalog held by another handle
    /// is left untouched and `Locked` is returned. The old contents are not
    /// decoded, so an unreadable catalog can still be replaced.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let (path, file) = lock_file(path.as_ref())?;

        let io_error = |source| CatalogError::Io {
            path: path.clone(),
            source,
        };
        let previous_len = file.metadata().map_err(io_error)?.len();
        file.set_len(0).map_err(io_error)?;

        if previous_len > 0 {
            logging::info(
                Component::Catalog,
                None,
                &format!("Cleared existing catalog {}", path.display()),
            );
        }

        Ok(Self {
            path,
            file,
            contents: CatalogContents::default(),
            released: false,
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.contents.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.records.is_empty()
    }

    /// Syncs the file and releases the lock.
    pub fn close(mut self) -> Result<(), CatalogError> {
        self.released = true;
        let synced = self.file.sync_all().map_err(|source| self.io_error(source));
        let _ = FileExt::unlock(&self.file);
        synced
    }

    fn io_error(&self, source: std::io::Error) -> CatalogError {
        CatalogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_from_disk(&self) -> Result<CatalogContents, CatalogError> {
        let len = self
            .file
            .metadata()
            .map_err(|source| self.io_error(source))?
            .len();
        if len == 0 {
            return Ok(CatalogContents::default());
        }

        let mut handle = &self.file;
        handle
            .seek(SeekFrom::Start(0))
            .map_err(|source| self.io_error(source))?;
        decode(&self.path, &self.file)
    }

    /// Rewrites the whole file from `self.contents`.
    fn persist(&mut self) -> Result<(), CatalogError> {
        if let Err(source) = self.file.set_len(0) {
            return Err(self.io_error(source));
        }
        if let Err(source) = self.file.seek(SeekFrom::Start(0)) {
            return Err(self.io_error(source));
        }

        let mut writer = BufWriter::new(&self.file);
        let header = writer
            .write_all(MAGIC)
            .and_then(|_| writer.write_all(&FORMAT_VERSION.to_le_bytes()));
        if let Err(source) = header {
            return Err(self.io_error(source));
        }
        bincode::serialize_into(&mut writer, &self.contents)?;
        if let Err(source) = writer.flush() {
            return Err(self.io_error(source));
        }
        Ok(())
    }
}

/// Opens (creating if needed) and exclusively locks the file at `path`.
fn lock_file(path: &Path) -> Result<(PathBuf, File), CatalogError> {
    let path = path.to_path_buf();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| CatalogError::Unavailable {
            path: path.clone(),
            source,
        })?;

    if FileExt::try_lock_exclusive(&file).is_err() {
        return Err(CatalogError::Locked { path });
    }
    Ok((path, file))
}

fn decode(path: &Path, file: &File) -> Result<CatalogContents, CatalogError> {
    let mut reader = BufReader::new(file);
    let mut header = [0u8; 8];
    reader
        .read_exact(&mut header)
        .map_err(|_| CatalogError::Corrupt {
            path: path.to_path_buf(),
            reason: "truncated header".to_string(),
        })?;

    if &header[..4] != MAGIC {
        return Err(CatalogError::Corrupt {
            path: path.to_path_buf(),
            reason: "bad magic".to_string(),
        });
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(CatalogError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unsupported format version {}", version),
        });
    }

    Ok(bincode::deserialize_from(reader)?)
}

impl Catalog for CatalogFile {
    fn pathnames(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.contents.records.keys().cloned().collect())
    }

    fn delete(&mut self, pathname: &str) -> Result<(), CatalogError> {
        let Some(previous) = self.contents.records.remove(pathname) else {
            return Ok(());
        };
        if let Err(e) = self.persist() {
            self.contents.records.insert(pathname.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn put_series(&mut self, entry: &CatalogEntry) -> Result<(), CatalogError> {
        validate_entry(entry)?;

        let previous = self
            .contents
            .records
            .insert(entry.pathname.clone(), entry.clone());

        if let Err(e) = self.persist() {
            match previous {
                Some(old) => {
                    self.contents.records.insert(entry.pathname.clone(), old);
                }
                None => {
                    self.contents.records.remove(&entry.pathname);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Decodes the file again rather than answering from memory, so a record
    /// damaged after it was written is reported.
    fn read_series(&self, pathname: &str) -> Result<CatalogEntry, CatalogError> {
        let mut stored = self.read_from_disk()?;
        stored
            .records
            .remove(pathname)
            .ok_or_else(|| CatalogError::NotFound(pathname.to_string()))
    }
}

impl Drop for CatalogFile {
    fn drop(&mut self) {
        if !self.released {
            let _ = FileExt::unlock(&self.file);
        }
    }
}
