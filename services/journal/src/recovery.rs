//! Recovery Flow — Rebuild repository state by journal replay
//!
//! Recovery process:
//! 1. Resolve the repository hash (configured, or from the delegate)
//! 2. Open the journal directory, validating each file's header
//! 3. Decode each entry into a management call
//! 4. Invoke it on the delegate with the reconstructed context
//! 5. Halt at the first failure, leaving earlier changes in place
//!
//! Entries are replayed strictly in journal order; later entries may depend
//! on objects created by earlier ones. A driver runs once.

use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};
use types::errors::{ArgumentError, ManagementError};
use types::ids::EntryId;
use types::method::ManagementCall;

use crate::delegate::{self, ManagementDelegate};
use crate::reader::{EntrySource, FileJournalReader, ReaderConfig, ReaderError};

// ── Errors ──────────────────────────────────────────────────────────

/// Why a single entry could not be replayed.
#[derive(Error, Debug)]
pub enum ReplayFailure {
    #[error("{0}")]
    Arguments(#[from] ArgumentError),

    #[error("{0}")]
    Management(#[from] ManagementError),
}

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Recovery cannot start: driver is {0}")]
    AlreadyRun(RecoveryState),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Could not obtain repository hash: {0}")]
    RepositoryHash(ManagementError),

    #[error("Replay failed at entry {index} ({method} at {entry_id}): {source}")]
    Replay {
        index: u64,
        entry_id: EntryId,
        method: String,
        source: ReplayFailure,
    },
}

// ── Recovery State ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    NotStarted,
    Replaying,
    Complete,
    Failed,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryState::NotStarted => "not started",
            RecoveryState::Replaying => "replaying",
            RecoveryState::Complete => "complete",
            RecoveryState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ── Recovery Metrics ────────────────────────────────────────────────

/// Metrics collected during the recovery process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryMetrics {
    /// Number of journal entries replayed successfully.
    pub entries_replayed: u64,
    /// Number of journal files fully consumed.
    pub files_read: u64,
    /// Total recovery time.
    pub elapsed_ms: u64,
    /// Identifier of the last entry replayed.
    pub last_entry_id: Option<EntryId>,
    /// Whether recovery completed successfully.
    pub success: bool,
}

// ── Recovery Log Entry ──────────────────────────────────────────────

/// Structured recovery log entry for diagnostics.
#[derive(Debug, Clone)]
pub struct RecoveryLogEntry {
    pub stage: RecoveryStage,
    pub message: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStage {
    Start,
    JournalOpen,
    Replay,
    Complete,
    Error,
}

// ── Recovery Driver ─────────────────────────────────────────────────

/// Replays a journal against a management delegate.
pub struct RecoveryDriver {
    config: ReaderConfig,
    state: RecoveryState,
    log: Vec<RecoveryLogEntry>,
    started: Option<Instant>,
}

impl RecoveryDriver {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            state: RecoveryState::NotStarted,
            log: Vec::new(),
            started: None,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Get recovery log entries.
    pub fn log(&self) -> &[RecoveryLogEntry] {
        &self.log
    }

    /// Replay the configured journal directory into `delegate`.
    pub fn recover(
        &mut self,
        delegate: &mut dyn ManagementDelegate,
    ) -> Result<RecoveryMetrics, RecoveryError> {
        self.begin()?;
        let mut metrics = RecoveryMetrics::default();

        let mut config = self.config.clone();
        if config.expected_repository_hash.is_none() {
            match delegate.repository_hash() {
                Ok(hash) => config.expected_repository_hash = Some(hash),
                Err(e) => return Err(self.fail(RecoveryError::RepositoryHash(e), &mut metrics)),
            }
        }

        self.log_stage(
            RecoveryStage::JournalOpen,
            &format!("Opening journal {}", config.journal_dir.display()),
        );
        let mut reader = match FileJournalReader::open(config) {
            Ok(reader) => reader,
            Err(e) => return Err(self.fail(e.into(), &mut metrics)),
        };

        let result = self.replay(&mut reader, delegate, &mut metrics);
        metrics.files_read = reader.files_read();
        self.conclude(result, metrics)
    }

    /// Replay entries from an already opened source into `delegate`.
    pub fn replay_from(
        &mut self,
        source: &mut dyn EntrySource,
        delegate: &mut dyn ManagementDelegate,
    ) -> Result<RecoveryMetrics, RecoveryError> {
        self.begin()?;
        let mut metrics = RecoveryMetrics::default();
        let result = self.replay(source, delegate, &mut metrics);
        self.conclude(result, metrics)
    }

    // ── Internal ────────────────────────────────────────────────────

    fn begin(&mut self) -> Result<(), RecoveryError> {
        if self.state != RecoveryState::NotStarted {
            return Err(RecoveryError::AlreadyRun(self.state));
        }
        self.state = RecoveryState::Replaying;
        self.started = Some(Instant::now());
        self.log_stage(RecoveryStage::Start, "Recovery started");
        Ok(())
    }

    fn replay(
        &mut self,
        source: &mut dyn EntrySource,
        delegate: &mut dyn ManagementDelegate,
        metrics: &mut RecoveryMetrics,
    ) -> Result<(), RecoveryError> {
        self.log_stage(RecoveryStage::Replay, "Starting journal replay");

        while let Some(entry) = source.next_entry()? {
            let index = metrics.entries_replayed + 1;
            let replay_error = |source: ReplayFailure| RecoveryError::Replay {
                index,
                entry_id: entry.id(),
                method: entry.method().to_string(),
                source,
            };

            let call = ManagementCall::from_arguments(entry.method(), entry.arguments())
                .map_err(|e| replay_error(e.into()))?;
            delegate::invoke(&mut *delegate, entry.context(), &call)
                .map_err(|e| replay_error(e.into()))?;

            metrics.entries_replayed = index;
            metrics.last_entry_id = Some(entry.id());
            debug!(
                index,
                method = entry.method(),
                entry_id = %entry.id(),
                no_op = entry.context().is_no_op(),
                "Journal entry replayed"
            );
        }

        self.log_stage(
            RecoveryStage::Replay,
            &format!("Replayed {} entries", metrics.entries_replayed),
        );
        Ok(())
    }

    fn conclude(
        &mut self,
        result: Result<(), RecoveryError>,
        mut metrics: RecoveryMetrics,
    ) -> Result<RecoveryMetrics, RecoveryError> {
        if let Err(e) = result {
            return Err(self.fail(e, &mut metrics));
        }

        metrics.elapsed_ms = self.elapsed_ms();
        metrics.success = true;
        self.state = RecoveryState::Complete;
        self.log_stage(
            RecoveryStage::Complete,
            &format!(
                "Recovery complete: {} entries from {} files in {}ms",
                metrics.entries_replayed, metrics.files_read, metrics.elapsed_ms
            ),
        );
        info!(
            entries = metrics.entries_replayed,
            files = metrics.files_read,
            elapsed_ms = metrics.elapsed_ms,
            "Recovery complete"
        );
        Ok(metrics)
    }

    fn fail(&mut self, err: RecoveryError, metrics: &mut RecoveryMetrics) -> RecoveryError {
        metrics.elapsed_ms = self.elapsed_ms();
        self.state = RecoveryState::Failed;
        self.log_stage(RecoveryStage::Error, &format!("Recovery failed: {}", err));
        error!(
            error = %err,
            entries_replayed = metrics.entries_replayed,
            "Recovery halted"
        );
        err
    }

    fn elapsed_ms(&self) -> u64 {
        self.started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn log_stage(&mut self, stage: RecoveryStage, message: &str) {
        let elapsed_ms = self.elapsed_ms();
        info!(stage = ?stage, elapsed_ms, "{}", message);
        self.log.push(RecoveryLogEntry {
            stage,
            message: message.to_string(),
            elapsed_ms,
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::PasswordCipher;
    use crate::delegate::RecordingDelegate;
    use crate::journal::{FileJournalWriter, JournalConfig, JournalWriter};
    use crate::reader::JournalReader;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;
    use types::context::{recovery_keys, Context, Namespace};
    use types::entry::{Argument, ArgumentValue, JournalEntry};
    use types::method::{Ingest, PurgeObject};

    fn context(second: u32) -> Context {
        Context::new(Utc.with_ymd_and_hms(2024, 4, 4, 0, 0, second).unwrap())
            .with_password("pw")
            .with_attribute(Namespace::Subject, "loginId", "repoAdmin")
    }

    fn purge(second: u32) -> JournalEntry {
        let call = ManagementCall::PurgeObject(PurgeObject {
            pid: format!("demo:{}", second),
            log_message: "purge".into(),
        });
        JournalEntry::new(call.method().as_str(), context(second), call.to_arguments())
    }

    fn ingest(second: u32, pid: &str) -> JournalEntry {
        let call = ManagementCall::Ingest(Ingest {
            serialization: b"<object/>".to_vec(),
            log_message: "created".into(),
            format: "object-xml-1.0".into(),
            encoding: "UTF-8".into(),
            new_pid: true,
        });
        let mut ctx = context(second);
        ctx.set_recovery_values(recovery_keys::PID, vec![pid.to_string()]);
        JournalEntry::new(call.method().as_str(), ctx, call.to_arguments())
    }

    fn source(entries: &[JournalEntry]) -> JournalReader<Cursor<Vec<u8>>> {
        let mut writer = JournalWriter::new(Vec::new(), PasswordCipher::plain());
        writer.write_header("h", Utc::now()).unwrap();
        for entry in entries {
            writer.write_entry(entry).unwrap();
        }
        let mut reader = JournalReader::new(Cursor::new(writer.finish().unwrap()), PasswordCipher::plain());
        reader.read_header(Some("h"), false).unwrap();
        reader
    }

    fn write_dir(dir: &Path, entries: &[JournalEntry]) {
        let mut writer = FileJournalWriter::open(JournalConfig::new(dir), "h").unwrap();
        for entry in entries {
            writer.write_entry(entry).unwrap();
        }
        writer.shutdown().unwrap();
    }

    #[test]
    fn test_replay_preserves_order() {
        let entries: Vec<_> = (1..=10).map(purge).collect();
        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new("unused"));

        let metrics = driver.replay_from(&mut source(&entries), &mut delegate).unwrap();
        assert_eq!(metrics.entries_replayed, 10);
        assert_eq!(metrics.last_entry_id, Some(entries[9].id()));
        assert!(metrics.success);
        assert_eq!(driver.state(), RecoveryState::Complete);

        let pids: Vec<String> = delegate
            .calls()
            .iter()
            .map(|c| match &c.call {
                ManagementCall::PurgeObject(p) => p.pid.clone(),
                other => panic!("Unexpected call: {:?}", other),
            })
            .collect();
        let expected: Vec<String> = (1..=10).map(|s| format!("demo:{}", s)).collect();
        assert_eq!(pids, expected);
    }

    #[test]
    fn test_replay_passes_reconstructed_context() {
        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new("unused"));
        driver
            .replay_from(&mut source(&[ingest(1, "demo:77")]), &mut delegate)
            .unwrap();

        let recorded = &delegate.calls()[0].context;
        assert_eq!(recorded, ingest(1, "demo:77").context());
        assert_eq!(recorded.password(), "pw");
        assert_eq!(recorded.recovery_value(recovery_keys::PID), Some("demo:77"));
    }

    #[test]
    fn test_no_op_entries_are_replayed_with_flag() {
        let call = ManagementCall::PurgeObject(PurgeObject {
            pid: "demo:1".into(),
            log_message: String::new(),
        });
        let entry = JournalEntry::new(
            call.method().as_str(),
            context(1).with_no_op(true),
            call.to_arguments(),
        );
        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new("unused"));
        driver.replay_from(&mut source(&[entry]), &mut delegate).unwrap();

        assert_eq!(delegate.calls().len(), 1);
        assert!(delegate.calls()[0].context.is_no_op());
    }

    #[test]
    fn test_replay_halts_on_undecodable_entry() {
        let bad = JournalEntry::new(
            "purgeObject",
            context(2),
            vec![Argument::new("pid", ArgumentValue::Integer(2))],
        );
        let entries = vec![purge(1), bad, purge(3)];
        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new("unused"));

        match driver.replay_from(&mut source(&entries), &mut delegate) {
            Err(RecoveryError::Replay {
                index,
                method,
                source: ReplayFailure::Arguments(ArgumentError::TypeMismatch { .. }),
                ..
            }) => {
                assert_eq!(index, 2);
                assert_eq!(method, "purgeObject");
            }
            other => panic!("Expected Replay error, got: {:?}", other),
        }
        assert_eq!(driver.state(), RecoveryState::Failed);
        assert_eq!(delegate.calls().len(), 1, "Entries after the failure must not run");
        assert_eq!(driver.log().last().unwrap().stage, RecoveryStage::Error);
    }

    #[test]
    fn test_replay_halts_on_unknown_method() {
        let unknown = JournalEntry::new("exportObject", context(2), vec![]);
        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new("unused"));
        let err = driver
            .replay_from(&mut source(&[unknown, purge(3)]), &mut delegate)
            .unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Replay {
                index: 1,
                source: ReplayFailure::Arguments(ArgumentError::UnknownMethod { .. }),
                ..
            }
        ));
        assert!(delegate.calls().is_empty());
    }

    #[test]
    fn test_driver_runs_once() {
        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new("unused"));
        driver.replay_from(&mut source(&[purge(1)]), &mut delegate).unwrap();

        let err = driver
            .replay_from(&mut source(&[purge(2)]), &mut delegate)
            .unwrap_err();
        assert!(matches!(err, RecoveryError::AlreadyRun(RecoveryState::Complete)));
        assert_eq!(delegate.calls().len(), 1);
    }

    #[test]
    fn test_recover_from_directory() {
        let tmp = TempDir::new().unwrap();
        write_dir(tmp.path(), &[ingest(1, "demo:1"), purge(2)]);

        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new(tmp.path()));
        let metrics = driver.recover(&mut delegate).unwrap();

        assert_eq!(metrics.entries_replayed, 2);
        assert_eq!(metrics.files_read, 1);
        let stages: Vec<RecoveryStage> = driver.log().iter().map(|l| l.stage).collect();
        assert_eq!(stages.first(), Some(&RecoveryStage::Start));
        assert!(stages.contains(&RecoveryStage::JournalOpen));
        assert_eq!(stages.last(), Some(&RecoveryStage::Complete));
    }

    #[test]
    fn test_recover_checks_delegate_hash() {
        let tmp = TempDir::new().unwrap();
        write_dir(tmp.path(), &[purge(1)]);

        let mut delegate = RecordingDelegate::new("another-repository");
        let mut driver = RecoveryDriver::new(ReaderConfig::new(tmp.path()));
        let err = driver.recover(&mut delegate).unwrap_err();

        assert!(matches!(
            err,
            RecoveryError::Reader(ReaderError::RepositoryHashMismatch { .. })
        ));
        assert_eq!(driver.state(), RecoveryState::Failed);
        assert!(delegate.calls().is_empty());
    }

    #[test]
    fn test_recover_continues_on_hash_error_when_configured() {
        let tmp = TempDir::new().unwrap();
        write_dir(tmp.path(), &[purge(1)]);

        let config = ReaderConfig {
            continue_on_hash_error: true,
            ..ReaderConfig::new(tmp.path())
        };
        let mut delegate = RecordingDelegate::new("another-repository");
        let metrics = RecoveryDriver::new(config).recover(&mut delegate).unwrap();
        assert_eq!(metrics.entries_replayed, 1);
    }

    #[test]
    fn test_recover_missing_journal_fails() {
        let tmp = TempDir::new().unwrap();
        let mut delegate = RecordingDelegate::new("h");
        let mut driver = RecoveryDriver::new(ReaderConfig::new(tmp.path().join("absent")));

        let err = driver.recover(&mut delegate).unwrap_err();
        assert!(matches!(err, RecoveryError::Reader(ReaderError::MissingJournal(_))));
        assert_eq!(driver.state(), RecoveryState::Failed);
    }
}
