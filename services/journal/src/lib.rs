//! Management Journal Service
//!
//! Records every mutating management-method invocation of a repository as
//! an XML journal entry, and replays those entries in order to rebuild the
//! repository after a loss.
//!
//! # Layout
//! - `journal`: XML stream writer and rotating file journal
//! - `reader`: validating XML reader and directory reader with archiving
//! - `creator`: write path wrapping the live management delegate
//! - `recovery`: replay driver (NotStarted → Replaying → Complete | Failed)
//! - `delegate`: the management capability journaled calls drive
//! - `cipher`: password ciphering for recorded contexts
//! - `config`: TOML-backed settings

pub mod cipher;
pub mod config;
pub mod creator;
pub mod delegate;
pub mod format;
pub mod journal;
pub mod reader;
pub mod recovery;

pub use config::JournalSettings;
pub use creator::JournalCreator;
pub use delegate::{ManagementDelegate, RecordingDelegate};
pub use journal::{FileJournalWriter, JournalConfig, JournalWriter};
pub use reader::{EntrySource, FileJournalReader, JournalReader, ReaderConfig};
pub use recovery::{RecoveryDriver, RecoveryMetrics, RecoveryState};
