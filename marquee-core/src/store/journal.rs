//! Append-only journal for store mutations
//!
//! # Journal Format
//!
//! ```text
//! data/
//! └── events.raftlog     # One event per line: "<crc32 hex>:<json envelope>"
//! ```
//!
//! Every envelope carries the SHA-256 hash of its own content and the hash
//! of the previous envelope, so a line that was edited, dropped or reordered
//! breaks the chain and is reported on open.
//!
//! An append either lands as one whole line or not at all: when a write or
//! sync fails the file is truncated back to its length before the append.
//! If that truncate fails too, the journal is poisoned and refuses appends
//! until a later truncate succeeds.

use super::{StoreError, StoreResult};
use crc32fast::Hasher as Crc32Hasher;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// File name of the event log inside the data directory
pub const JOURNAL_FILE: &str = "events.raftlog";

/// Calculate CRC32 checksum for data
#[inline]
pub fn calculate_crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Format a journal line with its CRC32 prefix
#[inline]
pub fn format_line_with_crc32(envelope_json: &str) -> String {
    let crc = calculate_crc32(envelope_json.as_bytes());
    format!("{:08x}:{}", crc, envelope_json)
}

/// Split a journal line and validate its CRC32 prefix
pub fn parse_and_validate_line(line: &str) -> Result<&str, String> {
    if line.len() <= 9 || line.as_bytes()[8] != b':' {
        return Err("missing CRC32 prefix".to_string());
    }

    let (crc_hex, rest) = line.split_at(8);
    let json_data = &rest[1..];

    let expected_crc = u32::from_str_radix(crc_hex, 16)
        .map_err(|_| format!("Invalid CRC32 hex: {}", crc_hex))?;
    let actual_crc = calculate_crc32(json_data.as_bytes());

    if expected_crc != actual_crc {
        return Err(format!(
            "CRC32 mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        ));
    }

    Ok(json_data)
}

/// Persisted form of one store event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Logical kind, e.g. `VoteCast`
    pub event_type: String,
    /// Unique event id (uuid v4)
    pub event_id: String,
    /// Unix timestamp seconds
    pub timestamp: u64,
    /// Event JSON payload
    pub payload: String,
    /// Row the event touches, for grepping and audits
    pub aggregate_id: Option<String>,
    /// SHA256 of this envelope's content plus `previous_hash`
    pub event_hash: String,
    /// Hash of the previous envelope (None for the first event)
    pub previous_hash: Option<String>,
}

impl EventEnvelope {
    /// Create a new envelope chained to `previous_hash`
    pub fn new(
        event_type: String,
        payload: String,
        aggregate_id: Option<String>,
        previous_hash: Option<String>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
        let mut envelope = Self {
            event_type,
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            payload,
            aggregate_id,
            event_hash: String::new(),
            previous_hash,
        };
        envelope.event_hash = envelope.compute_hash();
        envelope
    }

    /// Compute SHA256 over every field except `event_hash`
    pub fn compute_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();

        hasher.update(self.event_type.as_bytes());
        hasher.update(b"|");
        hasher.update(self.event_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(b"|");
        hasher.update(self.payload.as_bytes());
        hasher.update(b"|");
        if let Some(ref agg) = self.aggregate_id {
            hasher.update(agg.as_bytes());
        }
        hasher.update(b"|");
        if let Some(ref prev) = self.previous_hash {
            hasher.update(prev.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Verify that this envelope's hash matches its content
    pub fn verify_hash(&self) -> bool {
        self.event_hash == self.compute_hash()
    }
}

/// Summary produced by [`Journal::verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalReport {
    pub events: usize,
    pub last_hash: Option<String>,
}

/// Append-only event log
///
/// A journal without a file keeps only the hash chain in memory; that is
/// what [`crate::store::Store::in_memory`] uses.
pub struct Journal {
    file: Option<JournalFile>,
    last_hash: Option<String>,
    appended: u64,
}

struct JournalFile {
    path: PathBuf,
    sink: Box<dyn JournalSink>,
    /// Length of the committed prefix; everything past it is rolled back
    len: u64,
    fsync_on_append: bool,
    poisoned: bool,
}

/// Byte-level target of a journal file
pub(crate) trait JournalSink: Send {
    /// Write one complete line at the end of the file
    fn write_line(&mut self, line: &[u8]) -> io::Result<()>;
    /// Cut the file back to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

// Opened with O_APPEND, so writes after a truncate land at the new end
impl JournalSink for File {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.write_all(line)?;
        self.flush()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl JournalFile {
    fn write(&mut self, line: &[u8]) -> StoreResult<()> {
        if self.poisoned {
            self.sink.truncate(self.len).map_err(|e| {
                StoreError::Persistence(format!(
                    "Journal {} has an unrecovered partial write: {}",
                    self.path.display(),
                    e
                ))
            })?;
            log::warn!("Journal {} recovered to {} bytes", self.path.display(), self.len);
            self.poisoned = false;
        }

        let written = self.sink.write_line(line).and_then(|()| {
            if self.fsync_on_append {
                self.sink.sync()
            } else {
                Ok(())
            }
        });

        match written {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(truncate_err) = self.sink.truncate(self.len) {
                    log::error!(
                        "Journal {} could not roll back a failed append: {}",
                        self.path.display(),
                        truncate_err
                    );
                    self.poisoned = true;
                }
                Err(StoreError::Io(e))
            }
        }
    }
}

impl Journal {
    /// Journal that writes nothing to disk
    pub fn in_memory() -> Self {
        Self { file: None, last_hash: None, appended: 0 }
    }

    /// Open (or create) the journal in `dir` and return the envelopes already in it
    ///
    /// Fails on the first line whose checksum or hash chain does not hold.
    pub fn open(dir: &Path, fsync_on_append: bool) -> StoreResult<(Self, Vec<EventEnvelope>)> {
        fs::create_dir_all(dir).map_err(|e| {
            StoreError::Persistence(format!("Failed to create directory {}: {}", dir.display(), e))
        })?;

        let path = dir.join(JOURNAL_FILE);
        let envelopes = if path.exists() { read_envelopes(&path)? } else { Vec::new() };
        let last_hash = envelopes.last().map(|e| e.event_hash.clone());

        let file = OpenOptions::new().create(true).append(true).open(&path).map_err(|e| {
            StoreError::Persistence(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let len = file.metadata()?.len();

        log::debug!("Journal {} opened with {} events", path.display(), envelopes.len());

        let journal = Self::with_sink(path, Box::new(file), len, fsync_on_append, last_hash);
        Ok((journal, envelopes))
    }

    pub(crate) fn with_sink(
        path: PathBuf,
        sink: Box<dyn JournalSink>,
        len: u64,
        fsync_on_append: bool,
        last_hash: Option<String>,
    ) -> Self {
        Self {
            file: Some(JournalFile { path, sink, len, fsync_on_append, poisoned: false }),
            last_hash,
            appended: 0,
        }
    }

    /// Check a journal directory without opening it for writes
    pub fn verify(dir: &Path) -> StoreResult<JournalReport> {
        let path = dir.join(JOURNAL_FILE);
        let envelopes = read_envelopes(&path)?;
        Ok(JournalReport {
            events: envelopes.len(),
            last_hash: envelopes.last().map(|e| e.event_hash.clone()),
        })
    }

    /// Append one event as a single line; on error nothing is kept
    pub fn append<E: Serialize>(
        &mut self,
        event_type: &str,
        aggregate_id: Option<String>,
        event: &E,
    ) -> StoreResult<()> {
        let payload = serde_json::to_string(event)?;
        let envelope =
            EventEnvelope::new(event_type.to_string(), payload, aggregate_id, self.last_hash.clone());

        if let Some(file) = self.file.as_mut() {
            let mut line = format_line_with_crc32(&serde_json::to_string(&envelope)?);
            line.push('\n');
            file.write(line.as_bytes())?;
        }

        self.last_hash = Some(envelope.event_hash);
        self.appended += 1;
        Ok(())
    }

    /// Number of events appended since the journal was opened
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }
}

fn read_envelopes(path: &Path) -> StoreResult<Vec<EventEnvelope>> {
    let file = File::open(path)
        .map_err(|e| StoreError::Persistence(format!("Failed to open {}: {}", path.display(), e)))?;
    parse_envelopes(BufReader::new(file))
}

fn parse_envelopes<R: BufRead>(reader: R) -> StoreResult<Vec<EventEnvelope>> {
    let mut envelopes: Vec<EventEnvelope> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let json = parse_and_validate_line(&line)
            .map_err(|reason| StoreError::Corrupted { line: line_no, reason })?;
        let envelope: EventEnvelope = serde_json::from_str(json).map_err(|e| {
            StoreError::Corrupted { line: line_no, reason: format!("bad envelope: {}", e) }
        })?;

        if !envelope.verify_hash() {
            return Err(StoreError::Corrupted {
                line: line_no,
                reason: "event hash does not match content".to_string(),
            });
        }
        let expected_previous = envelopes.last().map(|e| e.event_hash.as_str());
        if envelope.previous_hash.as_deref() != expected_previous {
            return Err(StoreError::Corrupted {
                line: line_no,
                reason: "hash chain broken".to_string(),
            });
        }

        envelopes.push(envelope);
    }

    Ok(envelopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory sink that can be told to fail its next writes or truncates
    #[derive(Clone, Default)]
    struct FlakySink {
        bytes: Arc<Mutex<Vec<u8>>>,
        failing_writes: Arc<AtomicUsize>,
        failing_truncates: Arc<AtomicUsize>,
    }

    impl FlakySink {
        fn take_failure(counter: &AtomicUsize) -> bool {
            counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
        }

        fn journal(&self) -> Journal {
            Journal::with_sink(PathBuf::from("flaky.raftlog"), Box::new(self.clone()), 0, true, None)
        }

        fn envelopes(&self) -> StoreResult<Vec<EventEnvelope>> {
            parse_envelopes(self.bytes.lock().unwrap().as_slice())
        }
    }

    impl JournalSink for FlakySink {
        fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
            let mut bytes = self.bytes.lock().unwrap();
            if Self::take_failure(&self.failing_writes) {
                // Half a line reaches the file before the error, like a full disk
                bytes.extend_from_slice(&line[..line.len() / 2]);
                return Err(io::Error::new(io::ErrorKind::Other, "file size limit exceeded"));
            }
            bytes.extend_from_slice(line);
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            if Self::take_failure(&self.failing_truncates) {
                return Err(io::Error::new(io::ErrorKind::Other, "read-only file system"));
            }
            self.bytes.lock().unwrap().truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_append_is_rolled_back() {
        let sink = FlakySink::default();
        let mut journal = sink.journal();

        journal.append("First", None, &json!({"n": 1})).unwrap();
        sink.failing_writes.store(1, Ordering::SeqCst);
        assert!(matches!(journal.append("Lost", None, &json!({"n": 2})), Err(StoreError::Io(_))));
        journal.append("Third", None, &json!({"n": 3})).unwrap();

        let envelopes = sink.envelopes().unwrap();
        let types: Vec<&str> = envelopes.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["First", "Third"]);
        assert_eq!(envelopes[1].previous_hash.as_deref(), Some(envelopes[0].event_hash.as_str()));
        assert_eq!(journal.last_hash(), Some(envelopes[1].event_hash.as_str()));
        assert_eq!(journal.appended(), 2);
    }

    #[test]
    fn test_failed_rollback_poisons_until_recovered() {
        let sink = FlakySink::default();
        let mut journal = sink.journal();

        journal.append("First", None, &json!({"n": 1})).unwrap();
        sink.failing_writes.store(1, Ordering::SeqCst);
        sink.failing_truncates.store(2, Ordering::SeqCst);

        assert!(matches!(journal.append("Lost", None, &json!({})), Err(StoreError::Io(_))));
        // The partial line is still there, so the retry refuses to write
        assert!(matches!(
            journal.append("Refused", None, &json!({})),
            Err(StoreError::Persistence(_))
        ));
        assert!(sink.envelopes().is_err());

        journal.append("Second", None, &json!({"n": 2})).unwrap();

        let envelopes = sink.envelopes().unwrap();
        let types: Vec<&str> = envelopes.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_failed_append_leaves_tables_untouched() {
        use crate::models::NewMovie;
        use crate::store::{MovieRepository, Store};

        let sink = FlakySink::default();
        let store = Store::with_journal(sink.journal());
        let movie = |name: &str| NewMovie {
            name: name.into(),
            price: 10,
            description: String::new(),
            image: String::new(),
        };

        store.add_movie(movie("Alien")).await.unwrap();
        sink.failing_writes.store(1, Ordering::SeqCst);
        assert!(store.add_movie(movie("Brazil")).await.is_err());
        store.add_movie(movie("Heat")).await.unwrap();

        assert_eq!(store.stats().movies, 2);
        assert_eq!(sink.envelopes().unwrap().len(), 2);
    }

    #[test]
    fn test_append_after_reopen_keeps_chain() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut journal, _) = Journal::open(dir.path(), true).unwrap();
            journal.append("First", None, &json!({"n": 1})).unwrap();
        }
        {
            let (mut journal, _) = Journal::open(dir.path(), true).unwrap();
            journal.append("Second", None, &json!({"n": 2})).unwrap();
        }

        assert_eq!(Journal::verify(dir.path()).unwrap().events, 2);
    }

    #[test]
    fn test_crc32_line_roundtrip() {
        let line = format_line_with_crc32(r#"{"a":1}"#);
        assert_eq!(parse_and_validate_line(&line).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_crc32_detects_corruption() {
        let line = format_line_with_crc32(r#"{"a":1}"#).replace("1}", "2}");
        assert!(parse_and_validate_line(&line).unwrap_err().contains("CRC32 mismatch"));
        assert!(parse_and_validate_line(r#"{"a":1}"#).is_err());
    }

    #[test]
    fn test_envelope_hash_chain() {
        let first = EventEnvelope::new("A".into(), "{}".into(), None, None);
        let second =
            EventEnvelope::new("B".into(), "{}".into(), Some("1".into()), Some(first.event_hash.clone()));
        assert!(first.verify_hash());
        assert!(second.verify_hash());

        let mut tampered = second.clone();
        tampered.payload = r#"{"x":1}"#.into();
        assert!(!tampered.verify_hash());
    }

    #[test]
    fn test_open_append_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut journal, existing) = Journal::open(dir.path(), false).unwrap();
            assert!(existing.is_empty());
            journal.append("First", Some("1".into()), &json!({"n": 1})).unwrap();
            journal.append("Second", None, &json!({"n": 2})).unwrap();
            assert_eq!(journal.appended(), 2);
        }

        let (journal, existing) = Journal::open(dir.path(), false).unwrap();
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[0].event_type, "First");
        assert_eq!(existing[1].previous_hash.as_deref(), Some(existing[0].event_hash.as_str()));
        assert_eq!(journal.last_hash(), Some(existing[1].event_hash.as_str()));

        let report = Journal::verify(dir.path()).unwrap();
        assert_eq!(report.events, 2);
    }

    #[test]
    fn test_dropped_line_breaks_chain() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut journal, _) = Journal::open(dir.path(), false).unwrap();
            for n in 0..3 {
                journal.append("Tick", None, &json!({ "n": n })).unwrap();
            }
        }

        let path = dir.path().join(JOURNAL_FILE);
        let content = fs::read_to_string(&path).unwrap();
        let kept: Vec<&str> = content.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
        fs::write(&path, kept.join("\n")).unwrap();

        match Journal::open(dir.path(), false) {
            Err(StoreError::Corrupted { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corruption, got {:?}", other.map(|(_, e)| e.len())),
        }
    }
}
