// src/ledger.rs
//
// Append-only CSV ledger of generated combinations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::IdentityHash;
use crate::{NumberCombination, ResonanceReport};

pub const LEDGER_HEADER: [&str; 8] = [
    "identity_hash",
    "display_name",
    "birth_date",
    "analysis_date",
    "channel",
    "combination",
    "aspects",
    "timestamp",
];

/// Channel label of the final combination row.
pub const CONSENSUS_LABEL: &str = "consensus";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
    /// Also record every intermediate candidate.
    pub log_candidates: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            path: PathBuf::from("resonance_log.csv"),
            log_candidates: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed ledger record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub identity_hash: IdentityHash,
    pub display_name: String,
    pub birth_date: NaiveDate,
    pub analysis_date: NaiveDate,
    pub channel_label: String,
    pub combination: NumberCombination,
    pub aspect_summary: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    fn to_record(&self) -> String {
        let fields = [
            self.identity_hash.to_string(),
            self.display_name.clone(),
            self.birth_date.to_string(),
            self.analysis_date.to_string(),
            self.channel_label.clone(),
            self.combination.to_string(),
            self.aspect_summary.clone(),
            self.timestamp.to_rfc3339(),
        ];
        join_record(fields.iter().map(String::as_str))
    }

    fn from_fields(fields: &[String], line: usize) -> Result<Self, LedgerError> {
        let malformed = |reason: String| LedgerError::Malformed { line, reason };
        if fields.len() != LEDGER_HEADER.len() {
            return Err(malformed(format!(
                "expected {} fields, found {}",
                LEDGER_HEADER.len(),
                fields.len()
            )));
        }
        let date = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| malformed(e.to_string()))
        };

        Ok(LedgerEntry {
            identity_hash: fields[0]
                .parse()
                .map_err(|e: crate::IdentityError| malformed(e.to_string()))?,
            display_name: fields[1].clone(),
            birth_date: date(&fields[2])?,
            analysis_date: date(&fields[3])?,
            channel_label: fields[4].clone(),
            combination: fields[5]
                .parse()
                .map_err(|e: crate::ParseCombinationError| malformed(e.to_string()))?,
            aspect_summary: fields[6].clone(),
            timestamp: DateTime::parse_from_rfc3339(&fields[7])
                .map_err(|e| malformed(e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

/// The consensus row, then one row per candidate when `log_candidates` is set.
pub fn entries_from_report(
    report: &ResonanceReport,
    log_candidates: bool,
    timestamp: DateTime<Utc>,
) -> Vec<LedgerEntry> {
    let entry = |channel_label: String, combination: &NumberCombination| LedgerEntry {
        identity_hash: report.identity.identity_hash.clone(),
        display_name: report.identity.display_name.clone(),
        birth_date: report.identity.birth_date,
        analysis_date: report.analysis_date,
        channel_label,
        combination: combination.clone(),
        aspect_summary: report.aspect_summary.clone(),
        timestamp,
    };

    let mut entries = vec![entry(CONSENSUS_LABEL.to_string(), report.combination())];
    if log_candidates {
        for draw in &report.synthesis.channels {
            for (n, candidate) in draw.candidates.iter().enumerate() {
                entries.push(entry(format!("{}-{}", draw.channel.label(), n + 1), candidate));
            }
        }
    }
    entries
}

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Ledger { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Writes `entries` in a single append; the header goes first on an empty file.
    pub fn append(&self, entries: &[LedgerEntry]) -> Result<usize, LedgerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let is_empty = file.metadata().map_err(|e| self.io_error(e))?.len() == 0;

        let mut buffer = String::new();
        if is_empty {
            buffer.push_str(&join_record(LEDGER_HEADER.iter().copied()));
            buffer.push('\n');
        }
        for entry in entries {
            buffer.push_str(&entry.to_record());
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes()).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), rows = entries.len(), "appended ledger rows");
        Ok(entries.len())
    }

    pub fn record(
        &self,
        report: &ResonanceReport,
        log_candidates: bool,
    ) -> Result<usize, LedgerError> {
        self.append(&entries_from_report(report, log_candidates, Utc::now()))
    }

    /// Rows written for `identity`, oldest first. A missing file reads as empty;
    /// rows that fail to parse are skipped with a warning.
    pub fn entries_for(&self, identity: &IdentityHash) -> Result<Vec<LedgerEntry>, LedgerError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut entries = Vec::new();
        for (line, fields) in parse_records(&text) {
            if line == 1 && fields.iter().map(String::as_str).eq(LEDGER_HEADER.iter().copied()) {
                continue;
            }
            match LedgerEntry::from_fields(&fields, line) {
                Ok(entry) if entry.identity_hash == *identity => entries.push(entry),
                Ok(_) => {}
                Err(err) => warn!(path = %self.path.display(), error = %err, "skipping ledger row"),
            }
        }
        Ok(entries)
    }
}

// ---------------------------
// ## CSV Helpers
// ---------------------------

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn join_record<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(escape_field).collect::<Vec<_>>().join(",")
}

/// Splits CSV text into records, each tagged with its starting line.
fn parse_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => {
                    if c == '\n' {
                        line += 1;
                    }
                    field.push(c);
                }
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut fields)));
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str, birth: NaiveDate, label: &str, summary: &str) -> LedgerEntry {
        LedgerEntry {
            identity_hash: IdentityHash::compute(name, birth),
            display_name: name.to_string(),
            birth_date: birth,
            analysis_date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
            channel_label: label.to_string(),
            combination: "3 11 17 22 38 41".parse().unwrap(),
            aspect_summary: summary.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap(),
        }
    }

    fn birth() -> NaiveDate {
        NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a, b"), "\"a, b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_records_handles_quotes() {
        let text = "a,b,c\n\"x, y\",\"multi\nline\",\"q\"\"uote\"\nlast,row,end";
        let records = parse_records(text);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], (1, vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(
            records[1],
            (2, vec!["x, y".into(), "multi\nline".into(), "q\"uote".into()])
        );
        assert_eq!(records[2].0, 4);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("absent.csv"));
        let id = IdentityHash::compute("nobody", birth());
        assert!(ledger.entries_for(&id).unwrap().is_empty());
    }

    #[test]
    fn test_append_writes_header_once_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let ledger = Ledger::new(&path);

        let summary = "Sun-Moon Conjunction, Mars-Saturn Trine";
        let mine = entry("설계자", birth(), CONSENSUS_LABEL, summary);
        let other = entry("someone, else", birth(), CONSENSUS_LABEL, "no notable aspect");
        assert_eq!(ledger.append(&[mine.clone()]).unwrap(), 1);
        assert_eq!(ledger.append(&[other.clone(), mine.clone()]).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("identity_hash,display_name").count(), 1);
        assert!(text.starts_with("identity_hash,display_name,birth_date"));

        let found = ledger.entries_for(&mine.identity_hash).unwrap();
        assert_eq!(found, vec![mine.clone(), mine]);

        let found_other = ledger.entries_for(&other.identity_hash).unwrap();
        assert_eq!(found_other, vec![other]);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let ledger = Ledger::new(&path);
        let good = entry("설계자", birth(), CONSENSUS_LABEL, "no notable aspect");
        ledger.append(&[good.clone()]).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{},broken,row", good.identity_hash).unwrap();

        assert_eq!(ledger.entries_for(&good.identity_hash).unwrap(), vec![good]);
    }

    #[test]
    fn test_entry_rejects_wrong_field_count() {
        let err = LedgerEntry::from_fields(&["only".to_string()], 3).unwrap_err();
        assert!(matches!(err, LedgerError::Malformed { line: 3, .. }));
    }
}
