use crate::contributions::errors::{PipelineError, RecordError};
use crate::contributions::recipients::Recipients;
use crate::contributions::records::validate;
use crate::contributions::reports::{FinalReporter, RunningReporter};
use csv::{ErrorKind, Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Streaming -> Finalizing -> Done, never back.
/// A fatal stream error jumps from Streaming straight to Done.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    Streaming,
    Finalizing,
    Done,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub records_read: u64,
    pub accepted: u64,
    pub filtered: u64,
    pub malformed: u64,
    pub invalid_zip: u64,
    pub invalid_date: u64,
    pub running_lines: u64,
    pub final_lines: u64,
}

/// Reader for the pipe-delimited contribution format.
/// No header row, field counts vary, and `"` is ordinary text.
pub fn input_reader<R: Read>(r: R) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(r)
}

/// Owns the record source, the aggregation store and both reporters for one run.
pub struct Pipeline<R: Read, Z: Write, D: Write> {
    phase: Phase,
    reader: Reader<R>,
    recipients: Recipients,
    running: RunningReporter<Z>,
    final_report: FinalReporter<D>,
    summary: RunSummary,
    aborted: bool,
}

impl<R: Read, Z: Write, D: Write> Pipeline<R, Z, D> {
    pub fn new(input: R, by_zip: Z, by_date: D) -> Self {
        Pipeline {
            phase: Phase::Streaming,
            reader: input_reader(input),
            recipients: Recipients::new(),
            running: RunningReporter::new(by_zip),
            final_report: FinalReporter::new(by_date),
            summary: RunSummary::default(),
            aborted: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn recipients(&self) -> &Recipients {
        &self.recipients
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Consumes the whole input, then writes the final report.
    /// On a fatal error the running output written so far is flushed and kept,
    /// and no final report is written. Once `Done`, calling `run` again repeats the
    /// outcome: the summary after a completed run, `Aborted` after a failed one.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        if self.phase == Phase::Done {
            if self.aborted {
                return Err(PipelineError::Aborted);
            }
            return Ok(self.summary.clone());
        }
        if let Err(err) = self.stream() {
            self.phase = Phase::Done;
            self.aborted = true;
            error!("Error calculating median information, aborting run: {}", err);
            if let Err(flush_err) = self.running.flush() {
                warn!("Could not flush running report: {}", flush_err);
            }
            return Err(err);
        }
        if let Err(err) = self.running.flush() {
            self.phase = Phase::Done;
            self.aborted = true;
            return Err(PipelineError::Output(err));
        }
        debug!("Completed calculating running median");

        self.phase = Phase::Finalizing;
        let finalized = self.final_report.emit_all(&self.recipients);
        self.phase = Phase::Done;
        self.summary.final_lines = match finalized {
            Ok(written) => written,
            Err(err) => {
                self.aborted = true;
                return Err(PipelineError::Output(err));
            }
        };

        info!(
            records_read = self.summary.records_read,
            accepted = self.summary.accepted,
            filtered = self.summary.filtered,
            malformed = self.summary.malformed,
            invalid_zip = self.summary.invalid_zip,
            invalid_date = self.summary.invalid_date,
            running_lines = self.summary.running_lines,
            final_lines = self.summary.final_lines,
            "Run complete"
        );
        Ok(self.summary.clone())
    }

    /// pulls records until the reader reports end of input.
    /// Only I/O failures end the stream early; bad records are skipped.
    fn stream(&mut self) -> Result<(), PipelineError> {
        let mut record = StringRecord::new();
        loop {
            match self.reader.read_record(&mut record) {
                Ok(true) => self.process(&record)?,
                Ok(false) => return Ok(()),
                Err(err) if matches!(err.kind(), ErrorKind::Utf8 { .. }) => {
                    self.summary.records_read += 1;
                    self.summary.malformed += 1;
                    warn!("Skipping line with invalid data: {}", err);
                }
                Err(err) => return Err(PipelineError::Stream(err)),
            }
        }
    }

    fn process(&mut self, record: &StringRecord) -> Result<(), PipelineError> {
        self.summary.records_read += 1;
        let line = record
            .position()
            .map_or(self.summary.records_read, |pos| pos.line());

        let contribution = match validate(record) {
            Ok(contribution) => contribution,
            Err(RecordError::Filtered(reason)) => {
                self.summary.filtered += 1;
                debug!(line, "Skipping out-of-scope line. {}", reason);
                return Ok(());
            }
            Err(RecordError::Malformed(reason)) => {
                self.summary.malformed += 1;
                warn!(line, "Skipping line with invalid data: {}", reason);
                return Ok(());
            }
        };

        self.summary.accepted += 1;
        if !contribution.zip.is_valid() {
            self.summary.invalid_zip += 1;
        }
        if !contribution.date.is_valid() {
            self.summary.invalid_date += 1;
        }

        self.recipients.insert(&contribution);
        let written = self
            .running
            .on_record_accepted(
                &self.recipients,
                &contribution.recipient_id,
                &contribution.zip,
            )
            .map_err(PipelineError::Output)?;
        if written {
            self.summary.running_lines += 1;
        }
        Ok(())
    }
}

/// Runs the pipeline over files.
/// Both outputs are created (truncating old content) before the input is opened;
/// every file is closed when this returns, whatever the outcome.
pub fn run_files(
    input: &Path,
    by_zip_output: &Path,
    by_date_output: &Path,
) -> Result<RunSummary, PipelineError> {
    let create = |path: &Path| {
        File::create(path).map_err(|source| PipelineError::File {
            path: path.to_path_buf(),
            source,
        })
    };
    let by_zip = create(by_zip_output)?;
    let by_date = create(by_date_output)?;
    let source = File::open(input).map_err(|source| PipelineError::File {
        path: input.to_path_buf(),
        source,
    })?;

    info!(
        "Reading contributions from {}, writing {} and {}",
        input.display(),
        by_zip_output.display(),
        by_date_output.display()
    );
    Pipeline::new(source, by_zip, by_date).run()
}
