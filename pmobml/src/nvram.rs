//! Persistent storage of broadcast documents (NVRAM).
//!
//! Entries are structured arrays addressed by an `nvram://` filename and a
//! structure descriptor (`"S:7B"`, `"U:1B,S:20B"`...). A read only succeeds
//! when the stored structure matches the requested one.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::BridgeError;

/// Prefix of every key owned by the NVRAM store.
pub const NVRAM_NAMESPACE: &str = "nvram_";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NvramWriteFlags {
    /// Overwrite even when the entry exists with another structure.
    pub force: bool,
}

impl NvramWriteFlags {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredArray {
    pub structure: String,
    pub data: Vec<Value>,
}

pub trait NvramStore: Send {
    /// Reads an entry; `None` when absent or stored with another structure.
    fn read(&self, filename: &str, structure: &str) -> Result<Option<Vec<Value>>, BridgeError>;

    /// Writes an entry. Once this returns, a read of the same key sees the data.
    fn write(
        &mut self,
        filename: &str,
        structure: &str,
        data: Vec<Value>,
        flags: NvramWriteFlags,
    ) -> Result<(), BridgeError>;

    /// Removes every entry of the namespace; returns how many were removed.
    fn delete_all(&mut self) -> Result<usize, BridgeError>;
}

fn namespaced(filename: &str) -> String {
    format!("{}{}", NVRAM_NAMESPACE, filename)
}

fn check_overwrite(
    existing: Option<&StoredArray>,
    filename: &str,
    structure: &str,
    flags: NvramWriteFlags,
) -> Result<(), BridgeError> {
    match existing {
        Some(stored) if !flags.force && stored.structure != structure => Err(BridgeError::nvram(
            format!(
                "{} is stored as {}, refusing to overwrite as {}",
                filename, stored.structure, structure
            ),
        )),
        _ => Ok(()),
    }
}

/// In-process store. Clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryNvram {
    entries: Arc<Mutex<HashMap<String, StoredArray>>>,
}

impl MemoryNvram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl NvramStore for MemoryNvram {
    fn read(&self, filename: &str, structure: &str) -> Result<Option<Vec<Value>>, BridgeError> {
        let entries = self.entries.lock();
        Ok(entries
            .get(&namespaced(filename))
            .filter(|stored| stored.structure == structure)
            .map(|stored| stored.data.clone()))
    }

    fn write(
        &mut self,
        filename: &str,
        structure: &str,
        data: Vec<Value>,
        flags: NvramWriteFlags,
    ) -> Result<(), BridgeError> {
        let key = namespaced(filename);
        let mut entries = self.entries.lock();
        check_overwrite(entries.get(&key), filename, structure, flags)?;
        entries.insert(
            key,
            StoredArray {
                structure: structure.to_string(),
                data,
            },
        );
        Ok(())
    }

    fn delete_all(&mut self) -> Result<usize, BridgeError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(NVRAM_NAMESPACE));
        Ok(before - entries.len())
    }
}

/// One JSON document per entry under a directory.
///
/// File names are `nvram_<base64url(filename)>.json`; other files in the
/// directory are left alone by [`NvramStore::delete_all`]. Writes are
/// synchronous so the next read always sees them, and go through a
/// temporary file renamed into place.
///
/// An entry that cannot be parsed is treated as absent.
#[derive(Clone, Debug)]
pub struct FileNvram {
    dir: PathBuf,
}

impl FileNvram {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("NVRAM directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, filename: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(filename.as_bytes());
        self.dir.join(format!("{}.json", namespaced(&encoded)))
    }

    fn load(&self, filename: &str) -> Result<Option<StoredArray>, BridgeError> {
        let path = self.entry_path(filename);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                warn!(filename, path = %path.display(), error = %e, "Corrupt NVRAM entry ignored");
                Ok(None)
            }
        }
    }
}

impl NvramStore for FileNvram {
    fn read(&self, filename: &str, structure: &str) -> Result<Option<Vec<Value>>, BridgeError> {
        Ok(self
            .load(filename)?
            .filter(|stored| stored.structure == structure)
            .map(|stored| stored.data))
    }

    fn write(
        &mut self,
        filename: &str,
        structure: &str,
        data: Vec<Value>,
        flags: NvramWriteFlags,
    ) -> Result<(), BridgeError> {
        if !flags.force {
            check_overwrite(self.load(filename)?.as_ref(), filename, structure, flags)?;
        }
        let stored = StoredArray {
            structure: structure.to_string(),
            data,
        };
        let path = self.entry_path(filename);
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_vec(&stored)?)?;
        fs::rename(&temp, &path)?;
        debug!(filename, path = %path.display(), "NVRAM entry written");
        Ok(())
    }

    fn delete_all(&mut self) -> Result<usize, BridgeError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(NVRAM_NAMESPACE) || !entry.file_type()?.is_file() {
                continue;
            }
            fs::remove_file(entry.path())?;
            // Leftovers of an interrupted write are removed but not counted
            if name.ends_with(".json") {
                removed += 1;
            }
        }
        info!(removed, "NVRAM cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const ZIPCODE: &str = "nvram://receiverinfo/zipcode";

    #[test]
    fn test_memory_structure_must_match() {
        let mut store = MemoryNvram::new();
        store
            .write(ZIPCODE, "S:7B", vec![json!("1050011")], NvramWriteFlags::forced())
            .unwrap();

        assert_eq!(
            store.read(ZIPCODE, "S:7B").unwrap(),
            Some(vec![json!("1050011")])
        );
        assert_eq!(store.read(ZIPCODE, "U:1B").unwrap(), None);
        assert_eq!(store.read("nvram://other", "S:7B").unwrap(), None);
    }

    #[test]
    fn test_unforced_write_keeps_structure() {
        let mut store = MemoryNvram::new();
        store
            .write(ZIPCODE, "S:7B", vec![json!("1050011")], NvramWriteFlags::default())
            .unwrap();
        let result = store.write(ZIPCODE, "U:1B", vec![json!(1)], NvramWriteFlags::default());
        assert!(matches!(result, Err(BridgeError::Nvram(_))));

        store
            .write(ZIPCODE, "U:1B", vec![json!(1)], NvramWriteFlags::forced())
            .unwrap();
        assert_eq!(store.read(ZIPCODE, "U:1B").unwrap(), Some(vec![json!(1)]));
    }

    #[test]
    fn test_memory_clones_share_entries() {
        let store = MemoryNvram::new();
        let mut writer = store.clone();
        writer
            .write(ZIPCODE, "S:7B", vec![json!("1050011")], NvramWriteFlags::forced())
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(writer.delete_all().unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_roundtrip_and_delete() {
        let temp = TempDir::new().unwrap();
        let mut store = FileNvram::new(temp.path().join("nvram")).unwrap();

        assert_eq!(store.read(ZIPCODE, "S:7B").unwrap(), None);
        store
            .write(
                ZIPCODE,
                "S:7B",
                vec![json!("1050011")],
                NvramWriteFlags::forced(),
            )
            .unwrap();

        // A fresh store on the same directory sees the entry
        let reopened = FileNvram::new(temp.path().join("nvram")).unwrap();
        assert_eq!(
            reopened.read(ZIPCODE, "S:7B").unwrap(),
            Some(vec![json!("1050011")])
        );

        fs::write(store.directory().join("settings.json"), "{}").unwrap();
        assert_eq!(store.delete_all().unwrap(), 1);
        assert_eq!(store.read(ZIPCODE, "S:7B").unwrap(), None);
        assert!(store.directory().join("settings.json").exists());
    }

    #[test]
    fn test_file_store_recovers_from_corrupt_entry() {
        let temp = TempDir::new().unwrap();
        let mut store = FileNvram::new(temp.path()).unwrap();
        fs::write(store.entry_path(ZIPCODE), "{trunc").unwrap();

        assert_eq!(store.read(ZIPCODE, "S:7B").unwrap(), None);
        store
            .write(ZIPCODE, "S:7B", vec![json!("1050011")], NvramWriteFlags::forced())
            .unwrap();
        assert_eq!(
            store.read(ZIPCODE, "S:7B").unwrap(),
            Some(vec![json!("1050011")])
        );

        // Unforced writes over a corrupt entry go through as well
        fs::write(store.entry_path(ZIPCODE), "").unwrap();
        store
            .write(ZIPCODE, "U:1B", vec![json!(1)], NvramWriteFlags::default())
            .unwrap();
        assert_eq!(store.read(ZIPCODE, "U:1B").unwrap(), Some(vec![json!(1)]));
    }

    #[test]
    fn test_file_write_leaves_no_temporary() {
        let temp = TempDir::new().unwrap();
        let mut store = FileNvram::new(temp.path()).unwrap();
        store
            .write(ZIPCODE, "S:7B", vec![json!("1050011")], NvramWriteFlags::forced())
            .unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with(NVRAM_NAMESPACE) && names[0].ends_with(".json"));

        // A temporary left by an interrupted write is cleared without being counted
        fs::write(store.entry_path(ZIPCODE).with_extension("json.tmp"), "{").unwrap();
        assert_eq!(store.delete_all().unwrap(), 1);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
