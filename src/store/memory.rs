//! In-memory store with JSON snapshots
//!
//! All rows live behind one mutex. Staging only reads the committed state;
//! `commit` takes the lock once and applies every staged row under it, so
//! uniqueness checks made at commit time are the final word even when
//! several pipelines share the store.

use super::{
    CommitSummary, MeterRef, MeterStore, NewReading, StageResult, StagedMeter, UnitOfWork,
};
use crate::constants::constraints;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    FlowFileDescriptor, MeasurementClass, MeterIdentity, MeterRecord, ReadingKey, ReadingRecord,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Committed rows plus lookup indexes rebuilt after loading
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    flow_files: Vec<FlowFileDescriptor>,
    meters: Vec<MeterRecord>,
    readings: Vec<ReadingRecord>,

    #[serde(skip)]
    checksums: HashMap<String, u64>,
    #[serde(skip)]
    meter_ids: HashMap<MeterIdentity, u64>,
    #[serde(skip)]
    reading_keys: HashSet<ReadingKey>,
}

impl StoreState {
    fn reindex(&mut self) {
        self.checksums = self
            .flow_files
            .iter()
            .map(|file| (file.checksum.clone(), file.id))
            .collect();
        self.meter_ids = self
            .meters
            .iter()
            .map(|meter| (meter.identity.clone(), meter.id))
            .collect();
        self.reading_keys = self
            .readings
            .iter()
            .map(|reading| reading.key.clone())
            .collect();
    }

    fn next_id(len: usize) -> u64 {
        len as u64 + 1
    }
}

/// Thread-safe store keeping every row in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Load a snapshot written by `save_snapshot`; a missing file is an empty store
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            info!("No state snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let bytes = fs::read(path).map_err(|e| StoreError::snapshot(path, e.to_string()))?;
        let mut state: StoreState =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::snapshot(path, e.to_string()))?;
        state.reindex();

        info!(
            "Loaded state from {}: {} files, {} meters, {} readings",
            path.display(),
            state.flow_files.len(),
            state.meters.len(),
            state.readings.len()
        );
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Write all committed rows to `path` as JSON, creating parent directories
    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let state = self.lock()?;
        let json =
            serde_json::to_vec_pretty(&*state).map_err(|e| StoreError::snapshot(path, e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::snapshot(path, e.to_string()))?;
        }
        fs::write(path, json).map_err(|e| StoreError::snapshot(path, e.to_string()))?;

        debug!("Saved state snapshot to {}", path.display());
        Ok(())
    }
}

impl MeterStore for InMemoryStore {
    fn find_flow_file_by_checksum(&self, checksum: &str) -> StoreResult<Option<FlowFileDescriptor>> {
        let state = self.lock()?;
        Ok(state
            .checksums
            .get(checksum)
            .and_then(|id| state.flow_files.iter().find(|file| file.id == *id))
            .cloned())
    }

    fn flow_files_named(&self, filename: &str) -> StoreResult<Vec<FlowFileDescriptor>> {
        let state = self.lock()?;
        Ok(state
            .flow_files
            .iter()
            .filter(|file| file.filename == filename)
            .cloned()
            .collect())
    }

    fn insert_flow_file(&self, mut descriptor: FlowFileDescriptor) -> StoreResult<FlowFileDescriptor> {
        let mut state = self.lock()?;
        if state.checksums.contains_key(&descriptor.checksum) {
            return Err(StoreError::unique_violation(
                constraints::FLOW_FILE_CHECKSUM,
                descriptor.checksum,
            ));
        }

        descriptor.id = StoreState::next_id(state.flow_files.len());
        state
            .checksums
            .insert(descriptor.checksum.clone(), descriptor.id);
        state.flow_files.push(descriptor.clone());

        debug!("Inserted flow file {} ({})", descriptor.id, descriptor.filename);
        Ok(descriptor)
    }

    fn update_flow_file(&self, descriptor: &FlowFileDescriptor) -> StoreResult<()> {
        let mut state = self.lock()?;
        let slot = state
            .flow_files
            .iter_mut()
            .find(|file| file.id == descriptor.id)
            .ok_or(StoreError::FlowFileNotFound { id: descriptor.id })?;

        if slot.checksum != descriptor.checksum {
            return Err(StoreError::write_rejected(format!(
                "checksum of flow file {} cannot change",
                descriptor.id
            )));
        }
        *slot = descriptor.clone();
        Ok(())
    }

    fn begin(&self) -> StoreResult<Box<dyn UnitOfWork + '_>> {
        Ok(Box::new(MemoryUnitOfWork::new(self)))
    }

    fn meters(&self) -> StoreResult<Vec<MeterRecord>> {
        Ok(self.lock()?.meters.clone())
    }

    fn readings(&self) -> StoreResult<Vec<ReadingRecord>> {
        Ok(self.lock()?.readings.clone())
    }

    fn flow_files(&self) -> StoreResult<Vec<FlowFileDescriptor>> {
        Ok(self.lock()?.flow_files.clone())
    }
}

#[derive(Debug)]
struct PendingMeter {
    identity: MeterIdentity,
    measurement_class: MeasurementClass,
    flow_file: u64,
}

/// Reading key as seen before meters have ids
type PendingKey = (MeterRef, String, chrono::NaiveDate, crate::models::ReadingType);

/// Unit of work staging rows against an `InMemoryStore`
#[derive(Debug)]
pub struct MemoryUnitOfWork<'s> {
    store: &'s InMemoryStore,
    meters: Vec<PendingMeter>,
    meter_refs: HashMap<MeterIdentity, MeterRef>,
    readings: Vec<NewReading>,
    reading_keys: HashSet<PendingKey>,
    finished: bool,
}

impl<'s> MemoryUnitOfWork<'s> {
    fn new(store: &'s InMemoryStore) -> Self {
        Self {
            store,
            meters: Vec::new(),
            meter_refs: HashMap::new(),
            readings: Vec::new(),
            reading_keys: HashSet::new(),
            finished: false,
        }
    }

    fn discard(&mut self) {
        self.finished = true;
        self.meters.clear();
        self.meter_refs.clear();
        self.readings.clear();
        self.reading_keys.clear();
    }
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn stage_meter(
        &mut self,
        identity: &MeterIdentity,
        measurement_class: MeasurementClass,
        flow_file: u64,
    ) -> StoreResult<StagedMeter> {
        if let Some(meter) = self.meter_refs.get(identity) {
            return Ok(StagedMeter {
                meter: *meter,
                created: false,
            });
        }

        let existing = self.store.lock()?.meter_ids.get(identity).copied();
        let staged = match existing {
            Some(id) => StagedMeter {
                meter: MeterRef::Stored(id),
                created: false,
            },
            None => {
                self.meters.push(PendingMeter {
                    identity: identity.clone(),
                    measurement_class,
                    flow_file,
                });
                StagedMeter {
                    meter: MeterRef::Staged(self.meters.len() - 1),
                    created: true,
                }
            }
        };

        self.meter_refs.insert(identity.clone(), staged.meter);
        Ok(staged)
    }

    fn stage_reading(&mut self, reading: NewReading) -> StoreResult<StageResult> {
        let key: PendingKey = (
            reading.meter,
            reading.register_id.clone(),
            reading.reading_date,
            reading.reading_type,
        );
        if self.reading_keys.contains(&key) {
            return Ok(StageResult::DuplicateInUnit);
        }

        if let MeterRef::Stored(meter_id) = reading.meter {
            let stored_key = ReadingKey {
                meter_id,
                register_id: reading.register_id.clone(),
                reading_date: reading.reading_date,
                reading_type: reading.reading_type,
            };
            if self.store.lock()?.reading_keys.contains(&stored_key) {
                return Ok(StageResult::AlreadyStored);
            }
        }

        self.reading_keys.insert(key);
        self.readings.push(reading);
        Ok(StageResult::Staged)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<CommitSummary> {
        let mut summary = CommitSummary::default();
        let store = self.store;
        let mut guard = store.lock()?;
        let state = &mut *guard;

        // Resolve staged meters, reusing any committed meanwhile
        let mut staged_ids = Vec::with_capacity(self.meters.len());
        for pending in &self.meters {
            let existing = state.meter_ids.get(&pending.identity).copied();
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = StoreState::next_id(state.meters.len());
                    state.meters.push(MeterRecord {
                        id,
                        identity: pending.identity.clone(),
                        measurement_class: pending.measurement_class,
                        first_flow_file: pending.flow_file,
                        created_at: Utc::now(),
                    });
                    state.meter_ids.insert(pending.identity.clone(), id);
                    summary.meters_created += 1;
                    id
                }
            };
            staged_ids.push(id);
        }

        for reading in self.readings.drain(..) {
            let meter_id = match reading.meter {
                MeterRef::Stored(id) => id,
                MeterRef::Staged(index) => staged_ids[index],
            };
            let key = ReadingKey {
                meter_id,
                register_id: reading.register_id,
                reading_date: reading.reading_date,
                reading_type: reading.reading_type,
            };
            if !state.reading_keys.insert(key.clone()) {
                summary.readings_already_present += 1;
                continue;
            }

            let id = StoreState::next_id(state.readings.len());
            state.readings.push(ReadingRecord {
                id,
                key,
                reading_value: reading.reading_value,
                measurement_method: reading.measurement_method,
                tpr_code: reading.tpr_code,
                flow_file: reading.flow_file,
            });
            summary.readings_created += 1;
        }

        drop(guard);
        self.discard();

        debug!(
            "Committed {} meters and {} readings ({} already present)",
            summary.meters_created, summary.readings_created, summary.readings_already_present
        );
        Ok(summary)
    }

    fn rollback(mut self: Box<Self>) {
        debug!(
            "Rolled back {} staged meters and {} staged readings",
            self.meters.len(),
            self.readings.len()
        );
        self.discard();
    }
}

impl Drop for MemoryUnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished && (!self.meters.is_empty() || !self.readings.is_empty()) {
            warn!(
                "Unit of work dropped without commit; discarding {} meters and {} readings",
                self.meters.len(),
                self.readings.len()
            );
        }
    }
}
