//! Checksum-gated, transactional import of reading files.
//!
//! Each file runs through the same steps:
//!
//! 1. checksum gate (identical bytes are skipped without parsing unless the
//!    earlier import failed)
//! 2. flow-file descriptor inserted as `Processing`, or the failed one reopened
//! 3. format detection and parser dispatch
//! 4. meters and readings staged in one unit of work, then committed
//! 5. descriptor marked `Imported`, or `Error` with the unit rolled back
//!
//! Files in a batch are processed strictly one after another and each has
//! its own unit of work, so a failing file never affects its neighbours.

pub mod checksum;
pub mod outcome;

#[cfg(test)]
pub mod tests;

pub use checksum::{ChecksumGate, GateDecision, compute_checksum};
pub use outcome::{BatchReport, BatchSummary, FileOutcome, Outcome};

use crate::config::ImportConfig;
use crate::detect::detect_format;
use crate::error::{ImportError, Result, StoreResult};
use crate::models::{FlowFileDescriptor, ParsedRecord};
use crate::parsers::{ParseOutput, ParseWarning, ParserKind, WarningKind};
use crate::store::{CommitSummary, MeterStore, NewReading, StageResult, UnitOfWork};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters gathered while staging one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StagingCounts {
    duplicates_in_file: usize,
    already_present: usize,
}

/// Imports files into a `MeterStore`
pub struct ImportPipeline<'s> {
    store: &'s dyn MeterStore,
    config: ImportConfig,
    cancellation: CancellationToken,
}

impl<'s> ImportPipeline<'s> {
    pub fn new(store: &'s dyn MeterStore, config: ImportConfig) -> Self {
        Self {
            store,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    /// Stop between files and between staged records once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Import a sequence of `(filename, bytes)` pairs, one outcome per file.
    ///
    /// After cancellation the remaining files are reported as errors without
    /// being read further.
    pub fn import_batch<I, N, B>(&self, files: I) -> BatchReport
    where
        I: IntoIterator<Item = (N, B)>,
        N: AsRef<str>,
        B: AsRef<[u8]>,
    {
        let mut report = BatchReport::default();
        for (filename, bytes) in files {
            let filename = filename.as_ref();
            let outcome = if self.cancellation.is_cancelled() {
                debug!("Skipping {} after cancellation", filename);
                FileOutcome::cancelled(filename)
            } else {
                self.import_file(filename, bytes.as_ref())
            };
            report.push(outcome);
        }

        info!(
            "Batch complete: {} files, {} imported, {} skipped, {} errors",
            report.summary.total,
            report.summary.successful,
            report.summary.skipped,
            report.summary.errors
        );
        report
    }

    /// Import one file; never fails, problems are reported in the outcome
    pub fn import_file(&self, filename: &str, bytes: &[u8]) -> FileOutcome {
        info!("Importing {} ({} bytes)", filename, bytes.len());

        let (checksum, previous) = match ChecksumGate::new(self.store).check(bytes) {
            Ok(GateDecision::Proceed { checksum }) => (checksum, None),
            Ok(GateDecision::Retry(existing)) => (existing.checksum.clone(), Some(existing)),
            Ok(GateDecision::SkipDuplicate(existing)) => {
                info!(
                    "Skipping {}: identical to flow file {} ({})",
                    filename, existing.id, existing.filename
                );
                return FileOutcome::skipped(filename, Some(&*existing));
            }
            Err(e) => {
                error!("Checksum lookup failed for {}: {}", filename, e);
                return FileOutcome::failed(filename, ImportError::from(e).to_string());
            }
        };

        let mut warnings = self.filename_warnings(filename, &checksum);

        let descriptor = match previous {
            Some(previous) => match self.reopen_flow_file(*previous, filename) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    error!("Could not reopen flow file for {}: {}", filename, e);
                    return FileOutcome::failed(filename, ImportError::from(e).to_string());
                }
            },
            None => match self
                .store
                .insert_flow_file(FlowFileDescriptor::processing(filename, checksum.as_str()))
            {
                Ok(descriptor) => descriptor,
                Err(e) if e.is_unique_violation() => {
                    info!("Skipping {}: another import recorded the same content", filename);
                    let existing = self.store.find_flow_file_by_checksum(&checksum).ok().flatten();
                    return FileOutcome::skipped(filename, existing.as_ref());
                }
                Err(e) => {
                    error!("Could not record flow file {}: {}", filename, e);
                    return FileOutcome::failed(filename, ImportError::from(e).to_string());
                }
            },
        };

        self.process(descriptor, bytes, &mut warnings)
    }

    /// Reset a failed descriptor to `Processing` under the new filename
    fn reopen_flow_file(
        &self,
        mut descriptor: FlowFileDescriptor,
        filename: &str,
    ) -> StoreResult<FlowFileDescriptor> {
        info!(
            "Retrying {}: flow file {} ({}) failed earlier",
            filename, descriptor.id, descriptor.filename
        );
        descriptor.reopen(filename);
        self.store.update_flow_file(&descriptor)?;
        Ok(descriptor)
    }

    /// Warn when the filename was imported before with different content
    fn filename_warnings(&self, filename: &str, checksum: &str) -> Vec<ParseWarning> {
        match self.store.flow_files_named(filename) {
            Ok(previous) => previous
                .iter()
                .filter(|file| file.checksum != checksum)
                .map(|file| {
                    warn!(
                        "{} was imported before as flow file {} with different content",
                        filename, file.id
                    );
                    ParseWarning {
                        line: 0,
                        kind: WarningKind::ReusedFilename,
                        message: format!(
                            "Filename previously imported as flow file {} with different content",
                            file.id
                        ),
                    }
                })
                .collect(),
            Err(e) => {
                debug!("Filename lookup failed for {}: {}", filename, e);
                Vec::new()
            }
        }
    }

    /// Detect, parse and persist a file whose descriptor is already recorded
    fn process(
        &self,
        mut descriptor: FlowFileDescriptor,
        bytes: &[u8],
        warnings: &mut Vec<ParseWarning>,
    ) -> FileOutcome {
        let head = &bytes[..bytes.len().min(self.config.sniff_bytes)];
        let format = detect_format(&descriptor.filename, head);
        descriptor.detected_format = Some(format);
        let parser = ParserKind::select(format, head);
        debug!("{}: detected {}, using {:?} parser", descriptor.filename, format, parser);

        let result = self.parse(&descriptor.filename, parser, bytes).and_then(|output| {
            let ParseOutput {
                records,
                warnings: parse_warnings,
                header,
                parser,
            } = output;
            warnings.extend(parse_warnings);
            if let Some(header) = header {
                descriptor.header = header;
            }
            let (summary, counts) = self.persist(&descriptor, &records)?;
            Ok((records.len(), parser, summary, counts))
        });

        match result {
            Ok((records_processed, parser, summary, counts)) => {
                descriptor.mark_imported(records_processed);
                if let Err(e) = self.store.update_flow_file(&descriptor) {
                    error!("Could not mark {} imported: {}", descriptor.filename, e);
                    let mut outcome = FileOutcome::failed(
                        &descriptor.filename,
                        ImportError::from(e).to_string(),
                    );
                    outcome.flow_file_id = Some(descriptor.id);
                    outcome.warnings = std::mem::take(warnings);
                    return outcome;
                }

                info!(
                    "Imported {}: {} records, {} meters created, {} readings created, {} warnings",
                    descriptor.filename,
                    records_processed,
                    summary.meters_created,
                    summary.readings_created,
                    warnings.len()
                );

                let mut outcome = FileOutcome::from_descriptor(&descriptor);
                outcome.parser = Some(parser);
                outcome.meters_created = summary.meters_created;
                outcome.readings_created = summary.readings_created;
                outcome.duplicates_in_file = counts.duplicates_in_file;
                outcome.readings_already_present =
                    counts.already_present + summary.readings_already_present;
                outcome.warnings = std::mem::take(warnings);
                outcome
            }
            Err(e) => {
                error!("Import of {} failed: {}", descriptor.filename, e);
                descriptor.mark_error(e.to_string());
                if let Err(update) = self.store.update_flow_file(&descriptor) {
                    warn!(
                        "Could not mark {} as failed: {}",
                        descriptor.filename, update
                    );
                }

                let mut outcome = FileOutcome::from_descriptor(&descriptor);
                outcome.parser = Some(parser);
                outcome.warnings = std::mem::take(warnings);
                outcome
            }
        }
    }

    fn parse(&self, filename: &str, parser: ParserKind, bytes: &[u8]) -> Result<ParseOutput> {
        let ctx = self.config.parse_context(filename);
        let output = parser.parse(bytes, &ctx)?;
        debug!(
            "{}: {} records, {} warnings from {:?}",
            filename,
            output.records.len(),
            output.warnings.len(),
            output.parser
        );
        Ok(output)
    }

    /// Stage every record in one unit of work and commit it, or roll it back
    fn persist(
        &self,
        descriptor: &FlowFileDescriptor,
        records: &[ParsedRecord],
    ) -> Result<(CommitSummary, StagingCounts)> {
        if self.cancellation.is_cancelled() {
            return Err(ImportError::cancelled("cancelled before persisting"));
        }

        let mut unit = self.store.begin()?;
        match self.stage_records(&mut *unit, descriptor.id, records) {
            Ok(counts) => {
                let summary = unit.commit()?;
                Ok((summary, counts))
            }
            Err(e) => {
                unit.rollback();
                Err(e)
            }
        }
    }

    fn stage_records(
        &self,
        unit: &mut dyn UnitOfWork,
        flow_file: u64,
        records: &[ParsedRecord],
    ) -> Result<StagingCounts> {
        let mut counts = StagingCounts::default();

        for record in records {
            if self.cancellation.is_cancelled() {
                return Err(ImportError::cancelled(format!(
                    "cancelled at record from line {}",
                    record.source_line
                )));
            }

            let meter = unit.stage_meter(&record.identity(), record.measurement_class, flow_file)?;
            let staged = unit.stage_reading(NewReading {
                meter: meter.meter,
                register_id: record.register_id.clone(),
                reading_date: record.reading_date,
                reading_type: record.reading_type,
                reading_value: record.reading_value.clone(),
                measurement_method: record.measurement_method.clone(),
                tpr_code: record.tpr_code.clone(),
                flow_file,
            })?;

            match staged {
                StageResult::Staged => {}
                StageResult::DuplicateInUnit => {
                    debug!(
                        "Duplicate reading for {} on {} at line {}",
                        record.identity(),
                        record.reading_date,
                        record.source_line
                    );
                    counts.duplicates_in_file += 1;
                }
                StageResult::AlreadyStored => counts.already_present += 1,
            }
        }

        Ok(counts)
    }
}
