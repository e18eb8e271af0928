//! Tool commands
//!
//! None of the commands change a journal: `verify` and dry-run replay read
//! the directory with archiving disabled.

use anyhow::{bail, Context as _, Result};
use journal::cipher::PasswordCipher;
use journal::delegate::RecordingDelegate;
use journal::reader::{FileJournalReader, JournalReader, ReaderConfig};
use journal::recovery::RecoveryDriver;
use std::path::Path;
use tracing::{debug, info};
use types::method::ManagementCall;
use types::time::format_date;

use crate::reports::{EntrySummary, InspectReport, ReplayReport, VerifyReport};

/// List every entry of one journal file.
pub fn inspect(path: &Path, cipher: PasswordCipher) -> Result<InspectReport> {
    let mut reader = JournalReader::open_file(path, cipher)?;
    let header = reader
        .read_header(None, false)
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .with_context(|| format!("reading entry {} of {}", entries.len() + 1, path.display()))?
    {
        entries.push(EntrySummary::from_entry(entries.len() as u64 + 1, &entry));
    }

    Ok(InspectReport {
        file: path.display().to_string(),
        repository_hash: header.repository_hash,
        created: format_date(&header.created),
        entries,
    })
}

/// Read a journal directory end to end and decode every entry's arguments.
pub fn verify(mut config: ReaderConfig) -> Result<VerifyReport> {
    config.archive_dir = None;
    let mut report = VerifyReport {
        journal_dir: config.journal_dir.display().to_string(),
        ..VerifyReport::default()
    };

    let mut reader = FileJournalReader::open(config)?;
    report.files = reader
        .files()
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    loop {
        let index = report.entries + 1;
        let Some(entry) = reader
            .next_entry()
            .with_context(|| format!("reading entry {}", index))?
        else {
            break;
        };
        ManagementCall::from_arguments(entry.method(), entry.arguments())
            .with_context(|| format!("decoding entry {} ({})", index, entry.method()))?;

        let timestamp = format_date(&entry.timestamp());
        if report.first_entry.is_none() {
            report.first_entry = Some(timestamp.clone());
        }
        report.last_entry = Some(timestamp);
        *report.by_method.entry(entry.method().to_string()).or_insert(0) += 1;
        report.entries = index;
        debug!(index, method = entry.method(), "Entry verified");
    }

    info!(entries = report.entries, files = report.files.len(), "Journal verified");
    Ok(report)
}

/// Replay a journal directory into a recording delegate.
pub fn dry_run(mut config: ReaderConfig) -> Result<ReplayReport> {
    config.archive_dir = None;
    let journal_dir = config.journal_dir.display().to_string();

    let mut reader = FileJournalReader::open(config.clone())?;
    let mut delegate = RecordingDelegate::new("dry-run");
    let mut driver = RecoveryDriver::new(config);
    let metrics = driver.replay_from(&mut reader, &mut delegate)?;

    let calls = delegate
        .calls()
        .iter()
        .map(|c| format!("{} {:?}", c.call.method(), c.call))
        .collect();

    Ok(ReplayReport {
        journal_dir,
        entries_replayed: metrics.entries_replayed,
        files_read: reader.files_read(),
        elapsed_ms: metrics.elapsed_ms,
        calls,
    })
}

/// Refuse a live replay; the tool has no repository to replay into.
pub fn live_replay_unsupported() -> Result<ReplayReport> {
    bail!("live replay needs the repository server; rerun with --dry-run")
}
