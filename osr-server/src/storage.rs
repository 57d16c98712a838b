//! On-disk recording store
//!
//! Each slot is two files in the data directory:
//! - `<slot>.osr`: the recording as MessagePack, zstd-compressed
//! - `<slot>.json`: its `SlotInfo`, so listing never decodes frame data

use osr_core::error::StoreError;
use osr_core::store::{validate_slot, RecordingStore, SlotInfo};
use osr_core::Recording;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const ZSTD_LEVEL: i32 = 3;
const DATA_EXT: &str = "osr";
const INFO_EXT: &str = "json";

/// Default data directory: `<platform data dir>/osr/recordings`
pub fn default_data_dir() -> PathBuf {
    let mut dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    dir.push("osr");
    dir.push("recordings");
    dir
}

pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        info!("Recording store at {}", base_dir.display());
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path(&self, slot: &str, ext: &str) -> PathBuf {
        self.base_dir.join(format!("{}.{}", slot, ext))
    }
}

impl RecordingStore for FileStore {
    fn save(&mut self, slot: &str, recording: &Recording) -> Result<(), StoreError> {
        validate_slot(slot)?;

        let packed = rmp_serde::to_vec_named(recording).map_err(|e| StoreError::Encode(e.to_string()))?;
        let compressed = zstd::encode_all(packed.as_slice(), ZSTD_LEVEL)?;
        let info = serde_json::to_vec_pretty(&SlotInfo::describe(slot, recording))
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        fs::write(self.path(slot, DATA_EXT), &compressed)?;
        fs::write(self.path(slot, INFO_EXT), info)?;
        debug!(
            "Saved slot '{}' ({} bytes packed, {} compressed)",
            slot,
            packed.len(),
            compressed.len()
        );
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Recording, StoreError> {
        validate_slot(slot)?;

        let path = self.path(slot, DATA_EXT);
        if !path.exists() {
            return Err(StoreError::NotFound(slot.to_string()));
        }
        let compressed = fs::read(&path)?;
        let packed = zstd::decode_all(compressed.as_slice())?;
        rmp_serde::from_slice(&packed).map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn delete(&mut self, slot: &str) -> Result<bool, StoreError> {
        validate_slot(slot)?;

        let data = self.path(slot, DATA_EXT);
        if !data.exists() {
            return Ok(false);
        }
        fs::remove_file(data)?;
        let info = self.path(slot, INFO_EXT);
        if info.exists() {
            fs::remove_file(info)?;
        }
        Ok(true)
    }

    fn list(&self) -> Result<Vec<SlotInfo>, StoreError> {
        let mut slots = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(INFO_EXT) {
                continue;
            }
            let parsed = fs::File::open(&path)
                .map_err(|e| e.to_string())
                .and_then(|f| serde_json::from_reader::<_, SlotInfo>(BufReader::new(f)).map_err(|e| e.to_string()));
            match parsed {
                Ok(info) => slots.push(info),
                Err(e) => warn!("Skipping unreadable slot info {}: {}", path.display(), e),
            }
        }
        slots.sort_by(|a, b| a.slot.cmp(&b.slot));
        Ok(slots)
    }
}
