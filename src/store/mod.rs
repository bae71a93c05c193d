//! Storage collaborator for imported flow files, meters and readings
//!
//! The import pipeline talks to storage only through [`MeterStore`] and the
//! file-scoped [`UnitOfWork`] it hands out. Meters and readings are staged
//! in the unit of work and become visible together on `commit`; a unit of
//! work dropped without committing leaves the store untouched.
//!
//! Uniqueness is enforced by the store, not by callers:
//! - flow file checksum (`insert_flow_file` fails with `UniqueViolation`)
//! - meter identity `(mpan, serial)` (existing meters are reused)
//! - reading key `(meter, register, date, type)` (existing readings are kept)

pub mod memory;

pub use memory::InMemoryStore;

use crate::error::StoreResult;
use crate::models::{
    FlowFileDescriptor, MeasurementClass, MeterIdentity, MeterRecord, ReadingRecord, ReadingType,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;

/// Reference to a meter from inside a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterRef {
    /// Meter already committed, by id
    Stored(u64),
    /// Meter created in this unit of work, by staging index
    Staged(usize),
}

/// Result of staging a meter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedMeter {
    pub meter: MeterRef,
    /// True when this unit of work created the meter
    pub created: bool,
}

/// Outcome of staging one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageResult {
    Staged,
    /// Same reading key already staged by this unit of work
    DuplicateInUnit,
    /// Same reading key already committed by an earlier file
    AlreadyStored,
}

/// A reading to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub meter: MeterRef,
    pub register_id: String,
    pub reading_date: NaiveDate,
    pub reading_type: ReadingType,
    pub reading_value: BigDecimal,
    pub measurement_method: String,
    pub tpr_code: Option<String>,
    pub flow_file: u64,
}

/// Rows written by a committed unit of work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub meters_created: usize,
    pub readings_created: usize,
    /// Staged readings found committed by another writer at commit time
    pub readings_already_present: usize,
}

/// Durable storage for descriptors, meters and readings
pub trait MeterStore: Send + Sync {
    fn find_flow_file_by_checksum(&self, checksum: &str) -> StoreResult<Option<FlowFileDescriptor>>;

    /// Every descriptor recorded under this filename, oldest first
    fn flow_files_named(&self, filename: &str) -> StoreResult<Vec<FlowFileDescriptor>>;

    /// Insert a descriptor and return it with its assigned id.
    ///
    /// Fails with `StoreError::UniqueViolation` when the checksum is taken.
    fn insert_flow_file(&self, descriptor: FlowFileDescriptor) -> StoreResult<FlowFileDescriptor>;

    fn update_flow_file(&self, descriptor: &FlowFileDescriptor) -> StoreResult<()>;

    /// Open a unit of work for one file
    fn begin(&self) -> StoreResult<Box<dyn UnitOfWork + '_>>;

    fn meters(&self) -> StoreResult<Vec<MeterRecord>>;

    fn readings(&self) -> StoreResult<Vec<ReadingRecord>>;

    fn flow_files(&self) -> StoreResult<Vec<FlowFileDescriptor>>;
}

/// Staged writes for a single file, applied atomically
pub trait UnitOfWork {
    /// Reuse the meter with this identity or stage a new one
    fn stage_meter(
        &mut self,
        identity: &MeterIdentity,
        measurement_class: MeasurementClass,
        flow_file: u64,
    ) -> StoreResult<StagedMeter>;

    fn stage_reading(&mut self, reading: NewReading) -> StoreResult<StageResult>;

    /// Apply every staged write, or none
    fn commit(self: Box<Self>) -> StoreResult<CommitSummary>;

    /// Discard every staged write
    fn rollback(self: Box<Self>);
}
