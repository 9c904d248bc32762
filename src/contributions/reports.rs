use crate::contributions::recipients::{Bucket, Recipients};
use crate::contributions::records::{format_rounded, Amount, GroupKey};
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use serde::{Serialize, Serializer};
use std::io::Write;
use tracing::debug;

/// One output line: `recipient|subkey|median|count|total`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReportLine<'a> {
    pub recipient_id: &'a str,
    pub key: &'a str,
    #[serde(serialize_with = "serialize_rounded")]
    pub median: Amount,
    pub count: usize,
    #[serde(serialize_with = "serialize_rounded")]
    pub total: Amount,
}

impl<'a> ReportLine<'a> {
    /// snapshot of `bucket`. `None` for an empty bucket, which the store never creates.
    pub fn from_bucket(recipient_id: &'a str, key: &'a str, bucket: &Bucket) -> Option<Self> {
        Some(ReportLine {
            recipient_id,
            key,
            median: bucket.median()?,
            count: bucket.count(),
            total: bucket.total(),
        })
    }
}

/// builds the writer both reports share
/// better to be explicit in case library defaults change
pub fn report_writer<W: Write>(w: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(w)
}

/// Emits the running median by zip code, one line per accepted record.
pub struct RunningReporter<W: Write> {
    writer: Writer<W>,
    lines_written: u64,
}

impl<W: Write> RunningReporter<W> {
    pub fn new(w: W) -> Self {
        RunningReporter {
            writer: report_writer(w),
            lines_written: 0,
        }
    }

    /// writes the current state of the (recipient, zip) bucket.
    /// must be called right after the contribution was inserted into `recipients`.
    /// returns whether a line was written; an INVALID zip writes nothing.
    pub fn on_record_accepted(
        &mut self,
        recipients: &Recipients,
        recipient_id: &str,
        zip: &GroupKey,
    ) -> Result<bool, csv::Error> {
        if !zip.is_valid() {
            debug!(recipient_id, "Skipping invalid zip code for running median");
            return Ok(false);
        }
        let line = recipients
            .zip_bucket(recipient_id, zip)
            .and_then(|bucket| ReportLine::from_bucket(recipient_id, zip.as_str(), bucket));
        match line {
            Some(line) => {
                self.writer.serialize(line)?;
                self.lines_written += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn flush(&mut self) -> Result<(), csv::Error> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Emits the median by date once the stream is exhausted, sorted by recipient then date.
pub struct FinalReporter<W: Write> {
    writer: Writer<W>,
    lines_written: u64,
}

impl<W: Write> FinalReporter<W> {
    pub fn new(w: W) -> Self {
        FinalReporter {
            writer: report_writer(w),
            lines_written: 0,
        }
    }

    /// one line per (recipient, valid date) bucket, then flush.
    /// returns the number of lines written by this call.
    pub fn emit_all(&mut self, recipients: &Recipients) -> Result<u64, csv::Error> {
        let mut written = 0;
        for aggregate in recipients.iter() {
            for (date, bucket) in aggregate.dates() {
                if !date.is_valid() {
                    debug!(
                        recipient_id = aggregate.recipient_id.as_str(),
                        "Skipping invalid date for median calculation"
                    );
                    continue;
                }
                if let Some(line) =
                    ReportLine::from_bucket(&aggregate.recipient_id, date.as_str(), bucket)
                {
                    self.writer.serialize(line)?;
                    written += 1;
                }
            }
        }
        self.writer.flush()?;
        self.lines_written += written;
        Ok(written)
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }
}

/// Function to serialize an amount rounded to a whole number, ties away from zero.
fn serialize_rounded<S>(f: &Amount, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_rounded(*f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contributions::records::Contribution;
    use anyhow::Result;

    fn contribution(recipient_id: &str, zip: &str, date: &str, amount: f64) -> Contribution {
        let key = |value: &str| {
            if value == "INVALID" {
                GroupKey::Invalid
            } else {
                GroupKey::Valid(value.to_string())
            }
        };
        Contribution {
            recipient_id: recipient_id.to_string(),
            zip: key(zip),
            date: key(date),
            amount,
        }
    }

    #[test]
    fn test_report_line_serialization() -> Result<()> {
        let mut out: Vec<u8> = vec![];
        {
            let mut wtr = report_writer(&mut out);
            wtr.serialize(ReportLine {
                recipient_id: "C00629618",
                key: "90017",
                median: 40.5,
                count: 2,
                total: -81.49,
            })?;
            wtr.flush()?;
        }
        assert_eq!(String::from_utf8(out)?, "C00629618|90017|41|2|-81\n");
        Ok(())
    }

    #[test]
    fn test_amount_just_below_tie_rounds_down() -> Result<()> {
        let mut recipients = Recipients::new();
        let c = contribution("C005", "10001", "03012024", 2.49999);
        recipients.insert(&c);
        let mut out: Vec<u8> = vec![];
        {
            let mut running = RunningReporter::new(&mut out);
            running.on_record_accepted(&recipients, &c.recipient_id, &c.zip)?;
            running.flush()?;
        }
        assert_eq!(String::from_utf8(out)?, "C005|10001|2|1|2\n");
        Ok(())
    }

    #[test]
    fn test_running_reporter_emits_snapshot_per_record() -> Result<()> {
        let mut recipients = Recipients::new();
        let mut out: Vec<u8> = vec![];
        {
            let mut running = RunningReporter::new(&mut out);
            for c in &[
                contribution("C001", "94110", "01152024", 250.0),
                contribution("C001", "94110", "01162024", 500.0),
                contribution("C001", "INVALID", "01162024", 10.0),
                contribution("C001", "94110", "01162024", 20.0),
            ] {
                recipients.insert(c);
                running.on_record_accepted(&recipients, &c.recipient_id, &c.zip)?;
            }
            assert_eq!(running.lines_written(), 3);
            running.flush()?;
        }
        assert_eq!(
            String::from_utf8(out)?.lines().collect::<Vec<_>>(),
            vec!["C001|94110|250|1|250", "C001|94110|375|2|750", "C001|94110|250|3|770"]
        );
        Ok(())
    }

    #[test]
    fn test_final_reporter_sorted_and_skips_invalid_dates() -> Result<()> {
        let mut recipients = Recipients::new();
        for c in &[
            contribution("C002", "94110", "02012024", 7.0),
            contribution("C001", "94110", "INVALID", 99.0),
            contribution("C001", "94110", "01162024", 500.0),
            contribution("C001", "02895", "01152024", 250.0),
            contribution("C003", "02895", "INVALID", 1.0),
        ] {
            recipients.insert(c);
        }
        let mut out: Vec<u8> = vec![];
        {
            let mut final_report = FinalReporter::new(&mut out);
            assert_eq!(final_report.emit_all(&recipients)?, 3);
            assert_eq!(final_report.lines_written(), 3);
        }
        assert_eq!(
            String::from_utf8(out)?.lines().collect::<Vec<_>>(),
            vec!["C001|01152024|250|1|250", "C001|01162024|500|1|500", "C002|02012024|7|1|7"]
        );
        Ok(())
    }

    #[test]
    fn test_final_reporter_empty_store_writes_nothing() -> Result<()> {
        let mut out: Vec<u8> = vec![];
        {
            let mut final_report = FinalReporter::new(&mut out);
            assert_eq!(final_report.emit_all(&Recipients::new())?, 0);
        }
        assert!(out.is_empty());
        Ok(())
    }
}
