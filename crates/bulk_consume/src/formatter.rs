//! Formatter factory (`spec.md` §6): selects a streamable format from a
//! request's format selector and enforces the nt/nq-with-history
//! subject-uniqueness rule.

use std::collections::HashSet;

use errors::ErrorMetadata;

use crate::record_source::ScrolledRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamFormat {
    Text,
    Path,
    Tsv,
    NTriples,
    NQuads,
    Json,
}

impl StreamFormat {
    /// Parses the `format` query selector. Any identifier beginning with
    /// `json` is accepted as [`StreamFormat::Json`] (`spec.md` §6).
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        let lower = name.to_ascii_lowercase();
        Ok(match lower.as_str() {
            "text" => StreamFormat::Text,
            "path" => StreamFormat::Path,
            "tsv" | "tab" => StreamFormat::Tsv,
            "nt" | "ntriples" => StreamFormat::NTriples,
            "nq" | "nquads" => StreamFormat::NQuads,
            other if other.starts_with("json") => StreamFormat::Json,
            _ => anyhow::bail!(ErrorMetadata::bad_request(
                "InvalidFormat",
                format!("requested format ({name}) is invalid for as streamable response.")
            )),
        })
    }

    /// Whether this format, combined with `withHistory`, must enforce
    /// subject uniqueness within a chunk (`spec.md` §6).
    pub fn requires_subject_uniqueness(self, with_history: bool) -> bool {
        with_history && matches!(self, StreamFormat::NTriples | StreamFormat::NQuads)
    }
}

/// Formats one record as a line of output. Real triple/quad rendering is out
/// of scope here (it belongs to the record-serialization layer `spec.md` §1
/// explicitly excludes); this renders the minimal representation each
/// format needs to be distinguishable in tests and in the streamed body.
pub fn format_record(format: StreamFormat, record: &ScrolledRecord) -> String {
    match format {
        StreamFormat::Text => record.subject.clone(),
        StreamFormat::Path => record.path.clone(),
        StreamFormat::Tsv => format!("{}\t{}\t{}", record.path, record.index_time, record.subject),
        StreamFormat::NTriples => format!("<{}> <meta#indexTime> \"{}\" .", record.subject, record.index_time),
        StreamFormat::NQuads => format!(
            "<{}> <meta#indexTime> \"{}\" <{}> .",
            record.subject, record.index_time, record.path
        ),
        StreamFormat::Json => {
            serde_json::json!({
                "path": record.path,
                "indexTime": record.index_time,
                "subject": record.subject,
                "deleted": record.deleted,
            })
            .to_string()
        },
    }
}

/// Applies the nt/nq-with-history subject-uniqueness rule: once a subject
/// has already contributed a line to this chunk, subsequent records for the
/// same subject are dropped rather than mixed with a different version.
pub struct SubjectDeduper {
    enforce: bool,
    seen: HashSet<String>,
}

impl SubjectDeduper {
    pub fn new(format: StreamFormat, with_history: bool) -> Self {
        Self {
            enforce: format.requires_subject_uniqueness(with_history),
            seen: HashSet::new(),
        }
    }

    /// Returns `true` if `record` should be emitted.
    pub fn admit(&mut self, record: &ScrolledRecord) -> bool {
        if !self.enforce {
            return true;
        }
        self.seen.insert(record.subject.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str) -> ScrolledRecord {
        ScrolledRecord {
            path: "/foo".to_string(),
            index_time: 1,
            subject: subject.to_string(),
            deleted: false,
            data: None,
        }
    }

    #[test]
    fn parses_known_formats() {
        assert_eq!(StreamFormat::parse("nt").unwrap(), StreamFormat::NTriples);
        assert_eq!(StreamFormat::parse("ntriples").unwrap(), StreamFormat::NTriples);
        assert_eq!(StreamFormat::parse("NQUADS").unwrap(), StreamFormat::NQuads);
        assert_eq!(StreamFormat::parse("json-ld").unwrap(), StreamFormat::Json);
        assert_eq!(StreamFormat::parse("tab").unwrap(), StreamFormat::Tsv);
    }

    #[test]
    fn rejects_unknown_format_with_exact_message() {
        let err = StreamFormat::parse("xml").unwrap_err();
        assert_eq!(err.to_string(), "requested format (xml) is invalid for as streamable response.");
    }

    #[test]
    fn dedupes_subjects_only_for_nt_with_history() {
        let mut deduper = SubjectDeduper::new(StreamFormat::NTriples, true);
        assert!(deduper.admit(&record("a")));
        assert!(!deduper.admit(&record("a")));
        assert!(deduper.admit(&record("b")));

        let mut no_history = SubjectDeduper::new(StreamFormat::NTriples, false);
        assert!(no_history.admit(&record("a")));
        assert!(no_history.admit(&record("a")));

        let mut other_format = SubjectDeduper::new(StreamFormat::Tsv, true);
        assert!(other_format.admit(&record("a")));
        assert!(other_format.admit(&record("a")));
    }
}
