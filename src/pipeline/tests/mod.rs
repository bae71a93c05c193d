//! Test utilities for pipeline testing
//!
//! Provides a deterministic configuration, sample files and a store wrapper
//! that injects failures into units of work.

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::config::ImportConfig;
use crate::error::{StoreError, StoreResult};
use crate::models::{FlowFileDescriptor, MeasurementClass, MeterIdentity, MeterRecord, ReadingRecord};
use crate::store::{
    CommitSummary, InMemoryStore, MeterStore, NewReading, StageResult, StagedMeter, UnitOfWork,
};

mod import_tests;

/// Configuration with a fixed processing date and no progress output
pub fn test_config() -> ImportConfig {
    ImportConfig::default()
        .with_processing_date(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap())
        .without_progress()
}

/// Strict flow with a single reading
pub fn single_reading_flow() -> &'static str {
    "ZHD|D0010|001|A|B|20241007|120000|\n\
     026|1234567890123|E|\n\
     028|01|210|kWh|MTR1|A|20240901|000000|20241001|000000|100.00|N|\n\
     029|2|20241001|000000|105.50|C|A|20241007 120000|\n\
     ZTR|1|"
}

/// Strict flow with three readings over two meters
pub fn three_reading_flow() -> &'static str {
    "ZHD|D0010|002|A|B|20241008|120000|\n\
     026|1200023305967|E|\n\
     028|01|210|kWh|MTR001|A|20240901|000000|20241001|000000|100.00|N|\n\
     029|1|20240901|000000|90.00|A|A||\n\
     029|2|20241001|000000|100.00|A|A||\n\
     028|01|210|kWh|MTR002|A|20240901|000000|20241001|000000|7.00|N|\n\
     029|2|20241001|000000|7.00|A|A||\n\
     ZTR|3|"
}

/// Store wrapper whose units of work fail or cancel on demand
pub struct FaultyStore {
    pub inner: InMemoryStore,
    /// Fail `stage_reading` after this many successful calls
    pub fail_after: Option<usize>,
    pub fail_commit: bool,
    /// Cancelled after the first staged reading
    pub cancel_on_stage: Option<CancellationToken>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_after: None,
            fail_commit: false,
            cancel_on_stage: None,
        }
    }
}

struct FaultyUnit<'s> {
    inner: Box<dyn UnitOfWork + 's>,
    remaining: Option<usize>,
    fail_commit: bool,
    cancel_on_stage: Option<CancellationToken>,
}

impl UnitOfWork for FaultyUnit<'_> {
    fn stage_meter(
        &mut self,
        identity: &MeterIdentity,
        measurement_class: MeasurementClass,
        flow_file: u64,
    ) -> StoreResult<StagedMeter> {
        self.inner.stage_meter(identity, measurement_class, flow_file)
    }

    fn stage_reading(&mut self, reading: NewReading) -> StoreResult<StageResult> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(StoreError::write_rejected("injected staging failure"));
            }
            *remaining -= 1;
        }
        let result = self.inner.stage_reading(reading)?;
        if let Some(token) = &self.cancel_on_stage {
            token.cancel();
        }
        Ok(result)
    }

    fn commit(self: Box<Self>) -> StoreResult<CommitSummary> {
        let unit = *self;
        if unit.fail_commit {
            unit.inner.rollback();
            return Err(StoreError::write_rejected("injected commit failure"));
        }
        unit.inner.commit()
    }

    fn rollback(self: Box<Self>) {
        self.inner.rollback();
    }
}

impl MeterStore for FaultyStore {
    fn find_flow_file_by_checksum(&self, checksum: &str) -> StoreResult<Option<FlowFileDescriptor>> {
        self.inner.find_flow_file_by_checksum(checksum)
    }

    fn flow_files_named(&self, filename: &str) -> StoreResult<Vec<FlowFileDescriptor>> {
        self.inner.flow_files_named(filename)
    }

    fn insert_flow_file(&self, descriptor: FlowFileDescriptor) -> StoreResult<FlowFileDescriptor> {
        self.inner.insert_flow_file(descriptor)
    }

    fn update_flow_file(&self, descriptor: &FlowFileDescriptor) -> StoreResult<()> {
        self.inner.update_flow_file(descriptor)
    }

    fn begin(&self) -> StoreResult<Box<dyn UnitOfWork + '_>> {
        Ok(Box::new(FaultyUnit {
            inner: self.inner.begin()?,
            remaining: self.fail_after,
            fail_commit: self.fail_commit,
            cancel_on_stage: self.cancel_on_stage.clone(),
        }))
    }

    fn meters(&self) -> StoreResult<Vec<MeterRecord>> {
        self.inner.meters()
    }

    fn readings(&self) -> StoreResult<Vec<ReadingRecord>> {
        self.inner.readings()
    }

    fn flow_files(&self) -> StoreResult<Vec<FlowFileDescriptor>> {
        self.inner.flow_files()
    }
}
