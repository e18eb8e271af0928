//! Journal Creator — write path of the journal
//!
//! Wraps the live management delegate. Each call is invoked on the
//! delegate, the recovery values it produced are added to the context, and
//! the entry is written, all under one lock so the journal order is the
//! order in which the repository changed.

use std::sync::Mutex;
use thiserror::Error;
use tracing::{error, info};
use types::context::Context;
use types::entry::JournalEntry;
use types::errors::{ArgumentError, ManagementError};
use types::method::{ManagementCall, MethodOutcome};

use crate::delegate::{self, ManagementDelegate};
use crate::journal::{FileJournalWriter, JournalConfig, JournalError};

#[derive(Error, Debug)]
pub enum CreatorError {
    #[error("Management error: {0}")]
    Management(#[from] ManagementError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Argument error: {0}")]
    Arguments(#[from] ArgumentError),

    #[error("Journal creator lock poisoned")]
    Poisoned,
}

struct CreatorInner<D> {
    delegate: D,
    writer: FileJournalWriter,
}

/// Live-operation front of a management delegate that journals every call.
pub struct JournalCreator<D: ManagementDelegate> {
    inner: Mutex<CreatorInner<D>>,
}

impl<D: ManagementDelegate> JournalCreator<D> {
    /// Open a new journal file for `delegate`'s repository.
    pub fn open(delegate: D, config: JournalConfig) -> Result<Self, JournalError> {
        let repository_hash = delegate
            .repository_hash()
            .map_err(|e| JournalError::RepositoryHash(e.to_string()))?;
        let writer = FileJournalWriter::open(config, repository_hash.as_str())?;
        info!(repository_hash = %repository_hash, "Journal creator started");

        Ok(Self {
            inner: Mutex::new(CreatorInner { delegate, writer }),
        })
    }

    /// Invoke `call` on the delegate and journal it.
    ///
    /// The delegate sees the call as the journal records it, so dates are
    /// at millisecond precision on both the live and the replay path.
    ///
    /// A call the delegate rejects is not journaled. A call that succeeded
    /// but could not be journaled returns the journal error.
    pub fn invoke(
        &self,
        mut context: Context,
        call: ManagementCall,
    ) -> Result<MethodOutcome, CreatorError> {
        let arguments = call.to_arguments();
        let call = ManagementCall::from_arguments(call.method().as_str(), &arguments)?;

        let mut guard = self.inner.lock().map_err(|_| CreatorError::Poisoned)?;
        let inner = &mut *guard;

        let outcome = delegate::invoke(&mut inner.delegate, &context, &call)?;
        for (key, values) in call.recovery_values(&outcome) {
            context.set_recovery_values(key, values);
        }

        let entry = JournalEntry::new(call.method().as_str(), context, arguments);
        if let Err(e) = inner.writer.write_entry(&entry) {
            error!(
                method = entry.method(),
                entry_id = %entry.id(),
                error = %e,
                "Repository changed but the call could not be journaled"
            );
            return Err(e.into());
        }
        Ok(outcome)
    }

    /// Run `f` against the delegate while holding the journal lock.
    pub fn with_delegate<T>(&self, f: impl FnOnce(&mut D) -> T) -> Result<T, CreatorError> {
        let mut guard = self.inner.lock().map_err(|_| CreatorError::Poisoned)?;
        Ok(f(&mut guard.delegate))
    }

    /// Close the journal. Later calls fail with a journal error.
    pub fn shutdown(&self) -> Result<(), CreatorError> {
        let mut guard = self.inner.lock().map_err(|_| CreatorError::Poisoned)?;
        guard.writer.shutdown()?;
        Ok(())
    }

    /// Close the journal and hand back the delegate.
    pub fn into_delegate(self) -> Result<D, CreatorError> {
        let mut inner = self.inner.into_inner().map_err(|_| CreatorError::Poisoned)?;
        inner.writer.shutdown()?;
        Ok(inner.delegate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::RecordingDelegate;
    use crate::reader::{FileJournalReader, ReaderConfig};
    use crate::recovery::RecoveryDriver;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;
    use types::context::{recovery_keys, Namespace};
    use types::method::{GetNextPid, Ingest, ModifyObject, PurgeObject};

    fn context(second: u32) -> Context {
        Context::new(Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, second).unwrap())
            .with_attribute(Namespace::Subject, "loginId", "repoAdmin")
    }

    fn ingest() -> ManagementCall {
        ManagementCall::Ingest(Ingest {
            serialization: b"<object/>".to_vec(),
            log_message: "created".into(),
            format: "object-xml-1.0".into(),
            encoding: "UTF-8".into(),
            new_pid: true,
        })
    }

    fn read_back(dir: &std::path::Path) -> Vec<JournalEntry> {
        FileJournalReader::open(ReaderConfig::new(dir))
            .unwrap()
            .read_all()
            .unwrap()
    }

    #[test]
    fn test_invoke_journals_call_with_recovery_values() {
        let tmp = TempDir::new().unwrap();
        let creator =
            JournalCreator::open(RecordingDelegate::new("h"), JournalConfig::new(tmp.path())).unwrap();

        let outcome = creator.invoke(context(1), ingest()).unwrap();
        let pid = match outcome {
            MethodOutcome::Pid(pid) => pid,
            other => panic!("Expected Pid, got: {:?}", other),
        };
        creator.shutdown().unwrap();

        let entries = read_back(tmp.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].method(), "ingest");
        assert_eq!(
            entries[0].context().recovery_value(recovery_keys::PID),
            Some(pid.as_str())
        );
        assert_eq!(
            ManagementCall::from_arguments(entries[0].method(), entries[0].arguments()).unwrap(),
            ingest()
        );
    }

    #[test]
    fn test_live_and_replayed_calls_match_for_sub_millisecond_dates() {
        let tmp = TempDir::new().unwrap();
        let creator =
            JournalCreator::open(RecordingDelegate::new("h"), JournalConfig::new(tmp.path())).unwrap();
        let last_modified = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + Duration::microseconds(1500);
        creator
            .invoke(
                context(1),
                ManagementCall::ModifyObject(ModifyObject {
                    pid: "demo:1".into(),
                    state: Some("I".into()),
                    label: None,
                    owner_id: None,
                    log_message: "retire".into(),
                    last_modified: Some(last_modified),
                }),
            )
            .unwrap();
        let live = creator.into_delegate().unwrap().into_calls();

        let mut reader = FileJournalReader::open(ReaderConfig::new(tmp.path())).unwrap();
        let mut replayed = RecordingDelegate::new("h");
        RecoveryDriver::new(ReaderConfig::new(tmp.path()))
            .replay_from(&mut reader, &mut replayed)
            .unwrap();

        assert_eq!(live.len(), 1);
        assert_eq!(live[0].call, replayed.calls()[0].call);
        match &live[0].call {
            ManagementCall::ModifyObject(m) => assert_eq!(
                m.last_modified,
                Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(1))
            ),
            other => panic!("Expected ModifyObject, got: {:?}", other),
        }
    }

    #[test]
    fn test_get_next_pid_records_pid_list() {
        let tmp = TempDir::new().unwrap();
        let creator =
            JournalCreator::open(RecordingDelegate::new("h"), JournalConfig::new(tmp.path())).unwrap();
        creator
            .invoke(
                context(1),
                ManagementCall::GetNextPid(GetNextPid {
                    num_pids: 2,
                    namespace: Some("demo".into()),
                }),
            )
            .unwrap();
        creator.shutdown().unwrap();

        let entries = read_back(tmp.path());
        assert_eq!(
            entries[0].context().recovery_values(recovery_keys::PID_LIST).len(),
            2
        );
    }

    #[test]
    fn test_header_carries_delegate_hash() {
        let tmp = TempDir::new().unwrap();
        let creator = JournalCreator::open(
            RecordingDelegate::new("repo-hash-7"),
            JournalConfig::new(tmp.path()),
        )
        .unwrap();
        creator.invoke(context(1), ingest()).unwrap();
        creator.shutdown().unwrap();

        let config = ReaderConfig {
            expected_repository_hash: Some("repo-hash-7".into()),
            ..ReaderConfig::new(tmp.path())
        };
        assert_eq!(FileJournalReader::open(config).unwrap().read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_invoke_after_shutdown_fails() {
        let tmp = TempDir::new().unwrap();
        let creator =
            JournalCreator::open(RecordingDelegate::new("h"), JournalConfig::new(tmp.path())).unwrap();
        creator.shutdown().unwrap();
        assert!(matches!(
            creator.invoke(context(1), ingest()),
            Err(CreatorError::Journal(JournalError::State { .. }))
        ));
    }

    #[test]
    fn test_into_delegate_returns_calls() {
        let tmp = TempDir::new().unwrap();
        let creator =
            JournalCreator::open(RecordingDelegate::new("h"), JournalConfig::new(tmp.path())).unwrap();
        creator.invoke(context(1), ingest()).unwrap();
        assert_eq!(creator.with_delegate(|d| d.calls().len()).unwrap(), 1);

        let delegate = creator.into_delegate().unwrap();
        assert_eq!(delegate.calls().len(), 1);
        assert_eq!(read_back(tmp.path()).len(), 1);
    }

    #[test]
    fn test_concurrent_callers_journal_in_invocation_order() {
        let tmp = TempDir::new().unwrap();
        let creator = Arc::new(
            JournalCreator::open(RecordingDelegate::new("h"), JournalConfig::new(tmp.path())).unwrap(),
        );

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let creator = Arc::clone(&creator);
                thread::spawn(move || {
                    for i in 0..10 {
                        let call = ManagementCall::PurgeObject(PurgeObject {
                            pid: format!("demo:{}-{}", t, i),
                            log_message: String::new(),
                        });
                        creator.invoke(context(i), call).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let invoked: Vec<ManagementCall> = creator
            .with_delegate(|d| d.calls().iter().map(|c| c.call.clone()).collect())
            .unwrap();
        creator.shutdown().unwrap();

        let journaled: Vec<ManagementCall> = read_back(tmp.path())
            .iter()
            .map(|e| ManagementCall::from_arguments(e.method(), e.arguments()).unwrap())
            .collect();
        assert_eq!(journaled.len(), 40);
        assert_eq!(journaled, invoked);
    }
}
