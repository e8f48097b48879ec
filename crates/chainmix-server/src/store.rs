//! File-backed draw history.
//!
//! One JSON snapshot per draw id. Writes go through a temp file in the same
//! directory, are fsynced, then renamed over the target — a reader can see
//! the old record or the new one, never a torn one. Listing parses every
//! snapshot (skipping unreadable files) and pages reverse-chronologically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use chainmix_core::{BeaconError, DrawRecord, DrawStore, DrawSummary, Result};

pub struct FileDrawStore {
    dir: PathBuf,
    current: Mutex<Option<String>>,
}

impl FileDrawStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            current: Mutex::new(None),
        })
    }

    fn path(&self, draw_id: &str) -> PathBuf {
        self.dir.join(format!("{draw_id}.json"))
    }

    /// Remember the most recently generated draw id.
    pub fn set_current(&self, draw_id: &str) {
        *self.current.lock().unwrap() = Some(draw_id.to_string());
    }

    /// The current draw id, falling back to the freshest stored record
    /// after a restart.
    pub fn current(&self) -> Option<String> {
        if let Some(id) = self.current.lock().unwrap().clone() {
            return Some(id);
        }
        self.list(1, 0)
            .ok()
            .and_then(|rows| rows.into_iter().next())
            .map(|row| row.draw_id)
    }

    fn read_record(path: &Path) -> Option<DrawRecord> {
        let data = fs::read(path).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

impl DrawStore for FileDrawStore {
    fn save(&self, record: &DrawRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| BeaconError::Storage(e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(&record.draw_id))
            .map_err(|e| BeaconError::Storage(e.to_string()))?;
        log::debug!("saved draw record {}", record.draw_id);
        Ok(())
    }

    fn load(&self, draw_id: &str) -> Result<Option<DrawRecord>> {
        let path = self.path(draw_id);
        match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| BeaconError::Storage(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<DrawSummary>> {
        let mut rows: Vec<DrawSummary> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // A corrupt or foreign file must not break the listing.
            if let Some(record) = Self::read_record(&path) {
                rows.push(record.summary());
            }
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}
