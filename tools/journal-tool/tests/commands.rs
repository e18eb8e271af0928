//! Command tests against journals written by the journal service

use chrono::{Duration, TimeZone, Utc};
use journal::cipher::PasswordCipher;
use journal::config::JournalSettings;
use journal::journal::FileJournalWriter;
use journal_tool::commands;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use types::context::{recovery_keys, Context, Namespace};
use types::entry::{Argument, ArgumentValue, JournalEntry};
use types::method::{Ingest, ManagementCall, PurgeObject};

fn context(n: i64) -> Context {
    Context::new(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap() + Duration::seconds(n))
        .with_password("pw")
        .with_attribute(Namespace::Subject, "loginId", "repoAdmin")
}

fn entries() -> Vec<JournalEntry> {
    let ingest = ManagementCall::Ingest(Ingest {
        serialization: b"<object/>".to_vec(),
        log_message: "ingest".into(),
        format: "object-xml-1.0".into(),
        encoding: "UTF-8".into(),
        new_pid: true,
    });
    let mut ingest_context = context(1);
    ingest_context.set_recovery_values(recovery_keys::PID, vec!["demo:1".into()]);

    let purge = ManagementCall::PurgeObject(PurgeObject {
        pid: "demo:1".into(),
        log_message: "purge".into(),
    });

    vec![
        JournalEntry::new(ingest.method().as_str(), ingest_context, ingest.to_arguments()),
        JournalEntry::new(purge.method().as_str(), context(2), purge.to_arguments()),
    ]
}

fn write_journal(settings: &JournalSettings, entries: &[JournalEntry]) {
    let mut writer = FileJournalWriter::open(settings.journal_config(), "repo-1").unwrap();
    for entry in entries {
        writer.write_entry(entry).unwrap();
    }
    writer.shutdown().unwrap();
}

fn first_file(dir: &Path) -> std::path::PathBuf {
    let mut files: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    files.sort();
    files.remove(0)
}

#[test]
fn test_inspect_lists_entries() {
    let tmp = TempDir::new().unwrap();
    let settings = JournalSettings::new(tmp.path());
    write_journal(&settings, &entries());

    let report = commands::inspect(&first_file(&settings.journal_path()), settings.cipher()).unwrap();
    assert_eq!(report.repository_hash, "repo-1");
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[0].method, "ingest");
    assert_eq!(report.entries[0].recovery[0].1, vec!["demo:1".to_string()]);
    assert_eq!(report.entries[1].method, "purgeObject");
}

#[test]
fn test_inspect_needs_cipher_key_for_ciphered_journal() {
    let tmp = TempDir::new().unwrap();
    let settings = JournalSettings {
        cipher_key: Some("k".into()),
        ..JournalSettings::new(tmp.path())
    };
    write_journal(&settings, &entries());
    let file = first_file(&settings.journal_path());

    assert!(commands::inspect(&file, PasswordCipher::plain()).is_err());
    assert!(commands::inspect(&file, PasswordCipher::new("k")).is_ok());
}

#[test]
fn test_verify_counts_and_leaves_files_in_place() {
    let tmp = TempDir::new().unwrap();
    let settings = JournalSettings {
        archive_dir: Some("archive".into()),
        ..JournalSettings::new(tmp.path())
    };
    write_journal(&settings, &entries());

    let report = commands::verify(settings.reader_config()).unwrap();
    assert_eq!(report.entries, 2);
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.by_method.get("ingest"), Some(&1));
    assert_eq!(report.by_method.get("purgeObject"), Some(&1));
    assert_eq!(report.first_entry.as_deref(), Some("2024-07-01T00:00:01.000Z"));

    assert_eq!(fs::read_dir(settings.journal_path()).unwrap().count(), 1);
    assert!(!settings.archive_path().unwrap().exists());
}

#[test]
fn test_verify_rejects_undecodable_entry() {
    let tmp = TempDir::new().unwrap();
    let settings = JournalSettings::new(tmp.path());
    let mut bad = entries();
    bad.push(JournalEntry::new(
        "purgeObject",
        context(3),
        vec![Argument::new("pid", ArgumentValue::Boolean(true))],
    ));
    write_journal(&settings, &bad);

    let err = commands::verify(settings.reader_config()).unwrap_err();
    assert!(format!("{:#}", err).contains("decoding entry 3"));
}

#[test]
fn test_dry_run_replays_every_entry() {
    let tmp = TempDir::new().unwrap();
    let settings = JournalSettings::new(tmp.path());
    write_journal(&settings, &entries());

    let report = commands::dry_run(settings.reader_config()).unwrap();
    assert_eq!(report.entries_replayed, 2);
    assert_eq!(report.files_read, 1);
    assert!(report.calls[0].starts_with("ingest"));
    assert!(report.calls[1].contains("demo:1"));
    assert!(report.render_text().contains("Dry run replayed 2 entries"));
}

#[test]
fn test_live_replay_refused() {
    assert!(commands::live_replay_unsupported().is_err());
}
