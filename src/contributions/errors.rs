use std::path::PathBuf;
use thiserror::Error;

/// Why a single input record was not aggregated.
/// Both variants are recovered locally: the record is skipped and the stream continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// field extraction or amount parsing failed
    #[error("malformed record: {0}")]
    Malformed(String),
    /// structurally valid, but out of scope for aggregation
    #[error("filtered record: {0}")]
    Filtered(String),
}

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An input or output file could not be opened.
    #[error("Failed to open {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input stream failed while records were being read.
    #[error("Failed to read input stream: {0}")]
    Stream(#[source] csv::Error),

    /// A report line could not be written or flushed.
    #[error("Failed to write report: {0}")]
    Output(#[source] csv::Error),

    /// `run` was called again on a pipeline that already failed.
    #[error("Run was aborted by an earlier error")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display() {
        let err = RecordError::Malformed("expected at least 16 fields, found 3".to_string());
        assert_eq!(
            err.to_string(),
            "malformed record: expected at least 16 fields, found 3"
        );
        let err = RecordError::Filtered("other_id is not empty".to_string());
        assert_eq!(err.to_string(), "filtered record: other_id is not empty");
    }

    #[test]
    fn test_file_error_display() {
        let err = PipelineError::File {
            path: PathBuf::from("/missing/itcont.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/missing/itcont.txt"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_aborted_display() {
        assert_eq!(
            PipelineError::Aborted.to_string(),
            "Run was aborted by an earlier error"
        );
    }

    #[test]
    fn test_output_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::WriteZero, "disk full");
        let err = PipelineError::Output(csv::Error::from(io_err));
        assert!(err.to_string().starts_with("Failed to write report"));
        assert!(err.to_string().contains("disk full"));
    }
}
