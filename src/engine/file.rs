//! File-backed engine
//!
//! Layout: `<data_dir>/kv/<hex(key)>.val`, each file a checksummed envelope.
//!
//! Writes are atomic per key:
//! 1. Write the envelope to a unique temp file
//! 2. fsync the temp file
//! 3. Rename over the final name
//! 4. fsync the directory

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::checksum;
use super::errors::{StorageError, StorageResult};
use super::Engine;

const KV_DIR: &str = "kv";
const VALUE_EXT: &str = "val";
const TEMP_EXT: &str = "tmp";

/// One-file-per-key durable engine.
#[derive(Debug)]
pub struct FileEngine {
    dir: PathBuf,
    temp_seq: AtomicU64,
}

impl FileEngine {
    /// Open (creating if needed) the engine under `data_dir`.
    ///
    /// Stale temp files from an interrupted write are removed.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let dir = data_dir.join(KV_DIR);
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::io_error(format!("failed to create {}", dir.display()), e)
        })?;

        let entries = fs::read_dir(&dir).map_err(|e| {
            StorageError::io_error(format!("failed to list {}", dir.display()), e)
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(TEMP_EXT) {
                let _ = fs::remove_file(&path);
            }
        }

        Ok(Self {
            dir,
            temp_seq: AtomicU64::new(0),
        })
    }

    /// Directory holding the value files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &[u8]) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_hex(key), VALUE_EXT))
    }

    fn temp_path(&self, key: &[u8]) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{}.{}.{}", encode_hex(key), seq, TEMP_EXT))
    }

    fn read_file(path: &Path) -> io::Result<Option<Vec<u8>>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    /// A rename or unlink is not durable until the directory is synced.
    fn sync_dir(&self, key: &[u8]) -> StorageResult<()> {
        File::open(&self.dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| StorageError::write_failed("failed to sync kv directory", e).with_key(key))
    }
}

impl Engine for FileEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let bytes = Self::read_file(&self.value_path(key))
            .map_err(|e| StorageError::read_failed("failed to read value", e).with_key(key))?;
        match bytes {
            None => Ok(None),
            Some(bytes) => {
                let payload = checksum::open(&bytes).map_err(|e| e.with_key(key))?;
                Ok(Some(payload.to_vec()))
            }
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let temp = self.temp_path(key);
        let sealed = checksum::seal(value);

        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp)?;
            file.write_all(&sealed)?;
            file.sync_all()?;
            fs::rename(&temp, self.value_path(key))
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::write_failed("failed to write value", e).with_key(key));
        }
        self.sync_dir(key)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => self.sync_dir(key),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::write_failed("failed to delete value", e).with_key(key)),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StorageError::read_failed("failed to list values", e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::read_failed("failed to list values", e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".val") else { continue };
            let Some(key) = decode_hex(stem) else {
                return Err(StorageError::data_corruption(format!(
                    "unrecognized value file {}",
                    name
                )));
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            // A concurrent delete between listing and reading drops the key.
            if let Some(value) = self.get(&key)? {
                out.push((key, value));
            }
        }
        Ok(out)
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
