//! Record extraction from stress-harness logs.
//!
//! Each interesting log line carries a marker (`State:{` by default) followed by
//! a JSON object mangled by the harness's log formatter, and a trailing quote.
//! Lines are scanned in order; a line without the marker is skipped, a line whose
//! repaired fragment is empty marks the end of useful data in that file, and a
//! fragment that does not decode to a record aborts the run.

use crate::config::ExtractConfig;
use crate::record::BenchmarkRecord;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// What a single log line turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Record(BenchmarkRecord),
    /// The marker was present but nothing survived trimming and repair.
    EndOfData,
    MissingMarker,
}

/// Per-file counters reported after a file has been scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub records: usize,
    /// Lines without the marker.
    pub skipped_lines: usize,
    /// Lines whose fragment was empty after repair.
    pub empty_lines: usize,
}

/// Everything read from one set of log files.
#[derive(Debug, Default, PartialEq)]
pub struct Extraction {
    pub records: Vec<BenchmarkRecord>,
    pub files: Vec<FileSummary>,
}

/// Isolate the raw fragment following `marker` in `line`.
///
/// The slice starts at the marker's final character (so the opening `{` is kept)
/// and stops two characters before the end of the line, dropping the logger's
/// trailing quote and line terminator. Returns `None` when the marker is absent
/// and an empty string when the end falls at or before the start.
pub fn isolate_fragment<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let pos = line.find(marker)?;
    let last_len = marker.chars().last().map_or(0, char::len_utf8);
    let start = pos + marker.len() - last_len;
    let end = line.char_indices().rev().nth(1).map_or(0, |(i, _)| i);
    if end <= start {
        Some("")
    } else {
        Some(&line[start..end])
    }
}

/// Undo the harness formatter's escaping: drop every `space + quote`, then every
/// backslash. Only these two substitutions, in this order.
pub fn repair_fragment(fragment: &str) -> String {
    fragment.replace(" \"", "").replace('\\', "")
}

/// Parse a repaired fragment as JSON.
pub fn parse_fragment(fragment: &str) -> serde_json::Result<Value> {
    serde_json::from_str(fragment)
}

/// Classify one raw line (terminator included, if the file had one).
pub fn scan_line(line: &str, marker: &str) -> serde_json::Result<LineOutcome> {
    let Some(fragment) = isolate_fragment(line, marker) else {
        return Ok(LineOutcome::MissingMarker);
    };
    let repaired = repair_fragment(fragment);
    if repaired.is_empty() {
        return Ok(LineOutcome::EndOfData);
    }
    let value = parse_fragment(&repaired)?;
    BenchmarkRecord::from_value(value).map(LineOutcome::Record)
}

/// Rewrite a `\r\n` or lone `\r` line ending as `\n`, so the two-character
/// trim in [`isolate_fragment`] always drops the same terminator.
fn normalize_terminator(line: &mut String) {
    if line.ends_with("\r\n") {
        line.truncate(line.len() - 2);
        line.push('\n');
    } else if line.ends_with('\r') {
        line.pop();
        line.push('\n');
    }
}

/// Lazily yields the records of a single log.
///
/// The stream ends at end of input, at the first empty fragment (unless
/// `stop_at_empty` is off), or right after yielding an error.
pub struct RecordStream<'a, R> {
    reader: R,
    config: &'a ExtractConfig,
    summary: FileSummary,
    line_no: usize,
    buf: String,
    done: bool,
}

impl<'a, R: BufRead> RecordStream<'a, R> {
    pub fn new(reader: R, path: impl Into<PathBuf>, config: &'a ExtractConfig) -> Self {
        Self {
            reader,
            config,
            summary: FileSummary {
                path: path.into(),
                ..Default::default()
            },
            line_no: 0,
            buf: String::new(),
            done: false,
        }
    }

    #[cfg(test)]
    pub fn summary(&self) -> &FileSummary {
        &self.summary
    }

    pub fn into_summary(self) -> FileSummary {
        self.summary
    }
}

impl<R: BufRead> Iterator for RecordStream<'_, R> {
    type Item = Result<BenchmarkRecord, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    self.line_no += 1;
                    normalize_terminator(&mut self.buf);
                }
                Err(source) => {
                    self.done = true;
                    return Some(Err(ExtractError::Read {
                        path: self.summary.path.clone(),
                        line_no: self.line_no + 1,
                        source,
                    }));
                }
            }

            match scan_line(&self.buf, &self.config.marker) {
                Ok(LineOutcome::Record(record)) => {
                    self.summary.records += 1;
                    return Some(Ok(record));
                }
                Ok(LineOutcome::EndOfData) => {
                    self.summary.empty_lines += 1;
                    debug!(
                        file = %self.summary.path.display(),
                        line = self.line_no,
                        "empty fragment"
                    );
                    if self.config.stop_at_empty {
                        self.done = true;
                    }
                }
                Ok(LineOutcome::MissingMarker) => {
                    self.summary.skipped_lines += 1;
                    trace!(
                        file = %self.summary.path.display(),
                        line = self.line_no,
                        "no marker, skipping line"
                    );
                }
                Err(source) => {
                    self.done = true;
                    return Some(Err(ExtractError::MalformedFragment {
                        path: self.summary.path.clone(),
                        line_no: self.line_no,
                        line: self.buf.trim_end_matches(['\r', '\n']).to_string(),
                        source,
                    }));
                }
            }
        }
        None
    }
}

/// Open a log file for scanning.
pub fn open_log<'a>(
    path: &Path,
    config: &'a ExtractConfig,
) -> Result<RecordStream<'a, BufReader<File>>, ExtractError> {
    let file = File::open(path).map_err(|source| ExtractError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RecordStream::new(BufReader::new(file), path, config))
}

/// Read every file in order and collect all records plus per-file summaries.
///
/// Stops at the first fatal error; nothing read so far is returned in that case.
pub fn extract_files(paths: &[PathBuf], config: &ExtractConfig) -> Result<Extraction, ExtractError> {
    let mut extraction = Extraction::default();

    for path in paths {
        let mut stream = open_log(path, config)?;
        for record in stream.by_ref() {
            let record = record?;
            debug!(?record, "parsed record");
            extraction.records.push(record);
        }
        let summary = stream.into_summary();
        info!(
            file = %summary.path.display(),
            records = summary.records,
            skipped_lines = summary.skipped_lines,
            empty_lines = summary.empty_lines,
            "scanned log file"
        );
        extraction.files.push(summary);
    }

    Ok(extraction)
}

#[derive(Debug)]
pub enum ExtractError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        line_no: usize,
        source: std::io::Error,
    },
    MalformedFragment {
        path: PathBuf,
        line_no: usize,
        line: String,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Open { path, source } => {
                write!(f, "cannot open {}: {source}", path.display())
            }
            ExtractError::Read {
                path,
                line_no,
                source,
            } => write!(f, "read error in {} at line {line_no}: {source}", path.display()),
            ExtractError::MalformedFragment {
                path,
                line_no,
                line,
                source,
            } => write!(
                f,
                "malformed record in {} at line {line_no}: {source}; line: {line}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Open { source, .. } => Some(source),
            ExtractError::Read { source, .. } => Some(source),
            ExtractError::MalformedFragment { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    const MARKER: &str = "State:{";

    fn config() -> ExtractConfig {
        ExtractConfig::default()
    }

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    fn rec_line(entries: u64, millis: f64, method: &str, batch: bool) -> String {
        format!(
            r#"2021-03-02 INFO [stress] State:{{"entries":{entries},"millis":{millis},"method":"{method}","batchapi":{batch}}} ""#
        )
    }

    #[test]
    fn isolate_fragment_from_marker_to_trailing_quote() {
        let line = r#"x State:{"a":1} ""#;
        let fragment = isolate_fragment(line, MARKER).unwrap();
        assert_eq!(fragment, r#"{"a":1}"#);
        assert_eq!(parse_fragment(fragment).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn isolate_fragment_counts_line_terminator() {
        let line = "x State:{\"a\":1}\"\n";
        assert_eq!(isolate_fragment(line, MARKER).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn isolate_fragment_without_marker() {
        assert_eq!(isolate_fragment("plain log line\n", MARKER), None);
    }

    #[test]
    fn isolate_fragment_empty_when_end_before_start() {
        assert_eq!(isolate_fragment("INFO State:{\n", MARKER), Some(""));
        assert_eq!(isolate_fragment("State:{", MARKER), Some(""));
    }

    #[test]
    fn isolate_fragment_respects_multibyte_characters() {
        let line = "é State:{\"a\":1}é\n";
        assert_eq!(isolate_fragment(line, MARKER).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn repair_removes_space_quote() {
        assert_eq!(repair_fragment(r#"{ "a":1}"#), r#"{a":1}"#);
    }

    #[test]
    fn repair_removes_backslashes() {
        assert_eq!(repair_fragment(r#"{\"a\":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn repair_applies_space_quote_before_backslash() {
        // Backslash removal first would expose a space+quote and drop it too.
        assert_eq!(repair_fragment(r#"x \"y"#), r#"x "y"#);
        assert_eq!(repair_fragment(r#" "\"key\""#), r#""key""#);
    }

    #[test]
    fn repair_leaves_rest_of_line_alone() {
        let line = r#"msg= "hello" \\ State:{\"entries\":1,\"millis\":2} ""#;
        let outcome = scan_line(line, MARKER).unwrap();
        assert_eq!(
            outcome,
            LineOutcome::Record(BenchmarkRecord {
                entries: 1,
                millis: 2.0,
                method: None,
                batchapi: None,
            })
        );
    }

    #[test]
    fn scan_line_outcomes() {
        assert_eq!(
            scan_line("nothing here\n", MARKER).unwrap(),
            LineOutcome::MissingMarker
        );
        assert_eq!(
            scan_line("done State:{\n", MARKER).unwrap(),
            LineOutcome::EndOfData
        );
        assert!(scan_line("bad State:{entries:1} \"\n", MARKER).is_err());
        // Valid JSON that is not a record is still malformed.
        assert!(scan_line("x State:{\"a\":1} \"\n", MARKER).is_err());
    }

    #[test]
    fn stream_yields_records_in_order() {
        let text = format!(
            "{}\nunrelated\n{}\n",
            rec_line(10, 1.5, "put", true),
            rec_line(20, 2.5, "get", false)
        );
        let cfg = config();
        let mut stream = RecordStream::new(Cursor::new(text), "mem.log", &cfg);
        let records: Vec<_> = stream.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entries, 10);
        assert_eq!(records[1].entries, 20);
        assert_eq!(records[1].method.as_deref(), Some("get"));
        assert_eq!(stream.summary().records, 2);
        assert_eq!(stream.summary().skipped_lines, 1);
        assert_eq!(stream.summary().empty_lines, 0);
    }

    #[test]
    fn stream_stops_at_first_empty_fragment() {
        let text = format!(
            "{}\nend State:{{\n{}\n",
            rec_line(1, 1.0, "put", true),
            rec_line(2, 2.0, "put", true)
        );
        let cfg = config();
        let mut stream = RecordStream::new(Cursor::new(text), "mem.log", &cfg);
        let records: Vec<_> = stream.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(stream.summary().empty_lines, 1);
        assert!(stream.next().is_none());
    }

    #[test]
    fn stream_keeps_scanning_when_configured() {
        let text = format!(
            "{}\nend State:{{\nend State:{{\n{}\n",
            rec_line(1, 1.0, "put", true),
            rec_line(2, 2.0, "put", true)
        );
        let cfg = ExtractConfig {
            stop_at_empty: false,
            ..ExtractConfig::default()
        };
        let mut stream = RecordStream::new(Cursor::new(text), "mem.log", &cfg);
        let records: Vec<_> = stream.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(stream.summary().empty_lines, 2);
    }

    #[test]
    fn stream_reports_malformed_line_with_context() {
        let text = format!(
            "{}\nboom State:{{\"entries\":}} \"\n",
            rec_line(1, 1.0, "put", true)
        );
        let cfg = config();
        let mut stream = RecordStream::new(Cursor::new(text), "stress3.log", &cfg);
        assert!(stream.next().unwrap().is_ok());
        let err = stream.next().unwrap().unwrap_err();
        match &err {
            ExtractError::MalformedFragment { path, line_no, line, .. } => {
                assert_eq!(path, Path::new("stress3.log"));
                assert_eq!(*line_no, 2);
                assert_eq!(line, r#"boom State:{"entries":} ""#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("stress3.log"));
        assert!(msg.contains("line 2"));
        assert!(stream.next().is_none());
    }

    #[test]
    fn stream_uses_configured_marker() {
        let cfg = ExtractConfig {
            marker: "Metrics={".to_string(),
            ..ExtractConfig::default()
        };
        let text = format!(
            "{}\nx Metrics={{\"entries\":3,\"millis\":4}}\"\n",
            rec_line(1, 1.0, "put", true)
        );
        let mut stream = RecordStream::new(Cursor::new(text), "m.log", &cfg);
        let records: Vec<_> = stream.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entries, 3);
        assert_eq!(records[0].millis, 4.0);
        assert_eq!(stream.summary().skipped_lines, 1);
    }

    #[test]
    fn stream_keeps_records_with_mistyped_flags() {
        let text = format!(
            "x State:{{\"entries\":7,\"millis\":1,\"method\":\"put\",\"batchapi\":\"yes\"}} \"\n{}\n",
            rec_line(8, 2.0, "put", true)
        );
        let cfg = config();
        let records: Vec<_> = RecordStream::new(Cursor::new(text), "m.log", &cfg)
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entries, 7);
        assert_eq!(records[0].batchapi, None);
        assert_eq!(records[1].batchapi, Some(true));
    }

    #[test]
    fn scan_line_rejects_non_object_fragment() {
        assert!(scan_line("x Result=[1, 2]\"\n", "Result=[").is_err());
    }

    #[test]
    fn terminators_normalize_to_newline() {
        let mut line = "a State:{\r\n".to_string();
        normalize_terminator(&mut line);
        assert_eq!(line, "a State:{\n");

        let mut line = "a State:{\r".to_string();
        normalize_terminator(&mut line);
        assert_eq!(line, "a State:{\n");

        let mut line = "a\rb\n".to_string();
        normalize_terminator(&mut line);
        assert_eq!(line, "a\rb\n");
    }

    #[test]
    fn stream_reads_crlf_record_lines() {
        let text = "a State:{\\\"entries\\\":1,\\\"millis\\\":2} \"\r\n\
                    b State:{\"entries\":3,\"millis\":4}\"\r\n";
        let cfg = config();
        let mut stream = RecordStream::new(Cursor::new(text), "crlf.log", &cfg);
        let records: Vec<_> = stream.by_ref().map(|r| r.unwrap()).collect();
        let points: Vec<(u64, f64)> = records.iter().map(|r| (r.entries, r.millis)).collect();
        assert_eq!(points, vec![(1, 2.0), (3, 4.0)]);
        assert_eq!(stream.summary().records, 2);
    }

    #[test]
    fn stream_stops_at_crlf_empty_fragment() {
        let text = "a State:{\"entries\":1,\"millis\":2} \"\r\nend State:{\r\nb State:{\"entries\":9,\"millis\":9} \"\r\n";
        let cfg = config();
        let mut stream = RecordStream::new(Cursor::new(text), "crlf.log", &cfg);
        let records: Vec<_> = stream.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entries, 1);
        assert_eq!(stream.summary().empty_lines, 1);
    }

    #[test]
    fn extract_files_reads_crlf_logs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stress1.log");
        let text = format!(
            "starting harness\r\n{}\r\n{}\r\ndone State:{{\r\n{}\r\n",
            rec_line(10, 1.5, "put", true),
            rec_line(20, 2.5, "put", false),
            rec_line(30, 3.5, "put", true)
        );
        std::fs::write(&path, text).unwrap();

        let ex = extract_files(&[path.clone()], &config()).unwrap();
        let entries: Vec<u64> = ex.records.iter().map(|r| r.entries).collect();
        assert_eq!(entries, vec![10, 20]);
        assert_eq!(
            ex.files,
            vec![FileSummary {
                path,
                records: 2,
                skipped_lines: 1,
                empty_lines: 1,
            }]
        );
    }

    #[test]
    fn extract_files_across_files_in_order() {
        let dir = TempDir::new().unwrap();
        let a = write_log(
            dir.path(),
            "stress1.log",
            &[
                "starting harness",
                &rec_line(100, 40.0, "put", true),
                &rec_line(100, 44.0, "put", false),
                "x State:{",
            ],
        );
        let b = write_log(dir.path(), "stress2.log", &[&rec_line(200, 80.0, "put", true)]);

        let ex = extract_files(&[a.clone(), b.clone()], &config()).unwrap();
        let entries: Vec<u64> = ex.records.iter().map(|r| r.entries).collect();
        assert_eq!(entries, vec![100, 100, 200]);
        assert_eq!(
            ex.files,
            vec![
                FileSummary {
                    path: a,
                    records: 2,
                    skipped_lines: 1,
                    empty_lines: 1,
                },
                FileSummary {
                    path: b,
                    records: 1,
                    skipped_lines: 0,
                    empty_lines: 0,
                },
            ]
        );
    }

    #[test]
    fn extract_files_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            write_log(dir.path(), "stress1.log", &[&rec_line(1, 10.0, "put", true)]),
            write_log(dir.path(), "stress2.log", &[&rec_line(2, 20.0, "put", false)]),
        ];
        let first = extract_files(&paths, &config()).unwrap();
        let second = extract_files(&paths, &config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn extract_files_empty_inputs() {
        let ex = extract_files(&[], &config()).unwrap();
        assert!(ex.records.is_empty());
        assert!(ex.files.is_empty());

        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "stress1.log", &["x State:{", &rec_line(1, 1.0, "put", true)]);
        let ex = extract_files(&[path], &config()).unwrap();
        assert!(ex.records.is_empty());
        assert_eq!(ex.files[0].empty_lines, 1);
    }

    #[test]
    fn extract_files_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("stress9.log");
        let err = extract_files(&[missing.clone()], &config()).unwrap_err();
        assert!(matches!(err, ExtractError::Open { ref path, .. } if *path == missing));
    }

    #[test]
    fn extract_files_last_line_without_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stress1.log");
        std::fs::write(&path, rec_line(5, 1.25, "put", true)).unwrap();
        let ex = extract_files(&[path], &config()).unwrap();
        assert_eq!(ex.records.len(), 1);
        assert_eq!(ex.records[0].millis, 1.25);
    }
}
