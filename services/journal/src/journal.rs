//! Journal Writer — XML journal of management-method invocations
//!
//! Every mutating management call is recorded as one `journalEntry`
//! element, written once and never rewritten. A journal document is a
//! header (`repositoryJournal` with the repository hash and creation time)
//! followed by entries in invocation order.
//!
//! # Entry Layout
//! ```text
//! <journalEntry method=".." timestamp="..">
//!   <context>
//!     <password type="aes-256-gcm|plain">..</password>
//!     <noOp>false</noOp>
//!     <now>..</now>
//!     <multiValueMap name="environment|subject|action|resource|recovery">
//!       <key name=".."><value>..</value>..</key>..
//!     </multiValueMap>..
//!   </context>
//!   <argument name=".." type="..">..</argument>..
//! </journalEntry>
//! ```
//!
//! `FileJournalWriter` spreads a journal over a directory of complete
//! documents, rotating on size or age.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};
use types::context::{Context, MultiValueMap, Namespace};
use types::entry::{Argument, ArgumentValue, JournalEntry};
use types::time::format_date;

use crate::cipher::{CipherError, PasswordCipher};
use crate::format::{self, attrs, tags};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Journal writer is {state}; cannot {action}")]
    State {
        state: &'static str,
        action: &'static str,
    },

    #[error("Could not obtain repository hash: {0}")]
    RepositoryHash(String),

    #[error("{field} contains a character XML 1.0 cannot carry (U+{code:04X})")]
    InvalidText { field: String, code: u32 },
}

/// Reject characters outside the XML 1.0 `Char` production. Only tab, line
/// feed and carriage return are allowed below U+0020.
fn check_text(field: &str, text: &str) -> Result<(), JournalError> {
    let bad = text.chars().find(|&c| {
        (c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{FFFE}' || c == '\u{FFFF}'
    });
    match bad {
        Some(c) => Err(JournalError::InvalidText {
            field: field.to_string(),
            code: c as u32,
        }),
        None => Ok(()),
    }
}

/// Every string an entry would put into the document.
fn check_entry(entry: &JournalEntry) -> Result<(), JournalError> {
    check_text("method", entry.method())?;
    let context = entry.context();
    check_text("password", context.password())?;
    for namespace in Namespace::ALL {
        for (key, values) in context.attributes(namespace).iter() {
            check_text(namespace.as_str(), key)?;
            for value in values {
                check_text(key, value)?;
            }
        }
    }
    for argument in entry.arguments() {
        check_text("argument name", &argument.name)?;
        match &argument.value {
            ArgumentValue::String(s) => check_text(&argument.name, s)?,
            ArgumentValue::StringArray(items) => {
                for item in items {
                    check_text(&argument.name, item)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Stream Writer ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Fresh,
    Open,
    Finished,
    Poisoned,
}

impl WriterState {
    fn name(&self) -> &'static str {
        match self {
            WriterState::Fresh => "awaiting its header",
            WriterState::Open => "open",
            WriterState::Finished => "finished",
            WriterState::Poisoned => "poisoned by an earlier write failure",
        }
    }
}

/// Writes one journal document to any byte stream.
///
/// Usage: `write_header`, any number of `write_entry`, then `finish`. A
/// failed entry write leaves a partial element in the stream, so the writer
/// refuses all further writes after one.
pub struct JournalWriter<W: Write> {
    writer: Writer<W>,
    cipher: PasswordCipher,
    state: WriterState,
    entries_written: u64,
}

impl<W: Write> JournalWriter<W> {
    pub fn new(inner: W, cipher: PasswordCipher) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', 2),
            cipher,
            state: WriterState::Fresh,
            entries_written: 0,
        }
    }

    /// Write the XML declaration and open the root element.
    pub fn write_header(
        &mut self,
        repository_hash: &str,
        created: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        self.expect_state(WriterState::Fresh, "write a header")?;
        check_text("repository hash", repository_hash)?;
        let created = format_date(&created);
        let result = self.emit_header(repository_hash, &created);
        self.settle(result, WriterState::Open)
    }

    /// Append one entry.
    ///
    /// An entry carrying text XML cannot represent is rejected before
    /// anything is written, and the writer stays usable.
    pub fn write_entry(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        self.expect_state(WriterState::Open, "write an entry")?;
        check_entry(entry)?;
        let result = self.emit_entry(entry);
        self.settle(result, WriterState::Open)?;
        self.entries_written += 1;
        Ok(())
    }

    /// Close the root element and hand back the stream.
    pub fn finish(mut self) -> Result<W, JournalError> {
        self.expect_state(WriterState::Open, "finish")?;
        self.writer
            .write_event(Event::End(BytesEnd::new(tags::ROOT)))?;
        self.writer.get_mut().write_all(b"\n")?;
        self.state = WriterState::Finished;
        let mut inner = self.writer.into_inner();
        inner.flush()?;
        Ok(inner)
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.writer.get_mut()
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn expect_state(&self, wanted: WriterState, action: &'static str) -> Result<(), JournalError> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(JournalError::State {
                state: self.state.name(),
                action,
            })
        }
    }

    fn settle(
        &mut self,
        result: Result<(), JournalError>,
        next: WriterState,
    ) -> Result<(), JournalError> {
        self.state = if result.is_ok() {
            next
        } else {
            WriterState::Poisoned
        };
        result
    }

    fn emit_header(&mut self, repository_hash: &str, created: &str) -> Result<(), JournalError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let root = BytesStart::new(tags::ROOT).with_attributes([
            (attrs::REPOSITORY_HASH, repository_hash),
            (attrs::TIMESTAMP, created),
        ]);
        self.writer.write_event(Event::Start(root))?;
        Ok(())
    }

    fn emit_entry(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        let timestamp = format_date(&entry.timestamp());
        let start = BytesStart::new(tags::ENTRY).with_attributes([
            (attrs::METHOD, entry.method()),
            (attrs::TIMESTAMP, timestamp.as_str()),
        ]);
        self.writer.write_event(Event::Start(start))?;
        self.emit_context(entry.context())?;
        for argument in entry.arguments() {
            self.emit_argument(argument)?;
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(tags::ENTRY)))?;
        Ok(())
    }

    fn emit_context(&mut self, context: &Context) -> Result<(), JournalError> {
        let now = format_date(&context.now());
        let (kind, password) = self.cipher.encipher(&now, context.password())?;

        self.writer
            .write_event(Event::Start(BytesStart::new(tags::CONTEXT)))?;
        self.text_element(
            BytesStart::new(tags::PASSWORD).with_attributes([(attrs::TYPE, kind.as_str())]),
            &password,
        )?;
        self.text_element(
            BytesStart::new(tags::NO_OP),
            if context.is_no_op() { "true" } else { "false" },
        )?;
        self.text_element(BytesStart::new(tags::NOW), &now)?;
        for namespace in Namespace::ALL {
            self.emit_map(namespace, context.attributes(namespace))?;
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(tags::CONTEXT)))?;
        Ok(())
    }

    fn emit_map(&mut self, namespace: Namespace, map: &MultiValueMap) -> Result<(), JournalError> {
        let start = BytesStart::new(tags::MULTI_VALUE_MAP)
            .with_attributes([(attrs::NAME, namespace.as_str())]);
        if map.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        self.writer.write_event(Event::Start(start))?;
        for (key, values) in map.iter() {
            self.writer.write_event(Event::Start(
                BytesStart::new(tags::KEY).with_attributes([(attrs::NAME, key)]),
            ))?;
            for value in values {
                self.text_element(BytesStart::new(tags::VALUE), value)?;
            }
            self.writer.write_event(Event::End(BytesEnd::new(tags::KEY)))?;
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(tags::MULTI_VALUE_MAP)))?;
        Ok(())
    }

    fn emit_argument(&mut self, argument: &Argument) -> Result<(), JournalError> {
        let start = BytesStart::new(tags::ARGUMENT).with_attributes([
            (attrs::NAME, argument.name.as_str()),
            (attrs::TYPE, argument.value.type_name()),
        ]);
        match &argument.value {
            ArgumentValue::Null => {
                self.writer.write_event(Event::Empty(start))?;
            }
            ArgumentValue::String(s) => self.text_element(start, s)?,
            ArgumentValue::Boolean(b) => self.text_element(start, &b.to_string())?,
            ArgumentValue::Integer(i) => self.text_element(start, &i.to_string())?,
            ArgumentValue::Date(d) => self.text_element(start, &format_date(d))?,
            ArgumentValue::Stream(bytes) => self.text_element(start, &BASE64.encode(bytes))?,
            ArgumentValue::StringArray(items) => {
                self.writer.write_event(Event::Start(start))?;
                for item in items {
                    self.text_element(BytesStart::new(tags::ELEMENT), item)?;
                }
                self.writer
                    .write_event(Event::End(BytesEnd::new(tags::ARGUMENT)))?;
            }
        }
        Ok(())
    }

    /// `<tag ..>text</tag>` on one line. The text event is always written,
    /// even when empty, so the end tag is never indented onto a new line
    /// and the value reads back exactly.
    fn text_element(&mut self, start: BytesStart<'_>, text: &str) -> Result<(), JournalError> {
        let end = start.to_end().into_owned();
        self.writer.write_event(Event::Start(start))?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.writer.write_event(Event::End(end))?;
        Ok(())
    }
}

// ── Byte Counting ───────────────────────────────────────────────────

/// Counts bytes passed to the inner writer (for rotation by size).
pub struct CountingWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ── Flush / Fsync Policies ──────────────────────────────────────────

/// Controls when buffered data is flushed to OS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlushPolicy {
    /// Flush after every write.
    EveryWrite,
    /// Flush every N writes.
    EveryN(usize),
}

/// Controls when `fsync` (durable write) is called.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FsyncPolicy {
    /// Fsync after every write.
    EveryWrite,
    /// Fsync every N writes.
    EveryN(usize),
    /// Fsync only on file rotation.
    OnRotation,
}

// ── Journal Writer Configuration ────────────────────────────────────

/// Configuration for the file journal writer.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory for journal files.
    pub dir: PathBuf,
    /// Maximum file size in bytes before rotation (default 16 MiB).
    pub max_file_size: u64,
    /// Maximum time a file stays open before rotation (None = no limit).
    pub max_file_age: Option<Duration>,
    /// Flush policy.
    pub flush_policy: FlushPolicy,
    /// Fsync policy.
    pub fsync_policy: FsyncPolicy,
    /// Password cipher for context passwords.
    pub cipher: PasswordCipher,
}

impl JournalConfig {
    /// Create a config with sensible defaults.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 16 * 1024 * 1024, // 16 MiB
            max_file_age: None,
            flush_policy: FlushPolicy::EveryWrite,
            fsync_policy: FsyncPolicy::EveryWrite,
            cipher: PasswordCipher::plain(),
        }
    }
}

// ── File Journal Writer ─────────────────────────────────────────────

type FileSink = CountingWriter<BufWriter<File>>;

struct OpenJournalFile {
    path: PathBuf,
    opened_at: Instant,
    writer: JournalWriter<FileSink>,
}

/// Directory-backed journal with rotation and fsync control.
///
/// Every file is a complete journal document. Opening always starts a new
/// file after the highest existing index; earlier files are never reopened.
pub struct FileJournalWriter {
    config: JournalConfig,
    repository_hash: String,
    current: Option<OpenJournalFile>,
    file_index: u64,
    writes_since_flush: usize,
    writes_since_fsync: usize,
}

impl FileJournalWriter {
    /// Open a new journal file, creating the directory if needed.
    pub fn open(config: JournalConfig, repository_hash: impl Into<String>) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = Self::find_latest_index(&config.dir) + 1;
        let mut writer = Self {
            config,
            repository_hash: repository_hash.into(),
            current: None,
            file_index,
            writes_since_flush: 0,
            writes_since_fsync: 0,
        };
        writer.start_file()?;
        Ok(writer)
    }

    /// Get the current file path.
    pub fn current_file_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|f| f.path.as_path())
    }

    /// Append a journal entry, rotating first if the current file is full.
    pub fn write_entry(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if self.rotation_due() {
            self.rotate()?;
        }

        let file = self.current.as_mut().ok_or(JournalError::State {
            state: "shut down",
            action: "write an entry",
        })?;
        file.writer.write_entry(entry)?;
        debug!(
            method = entry.method(),
            entry_id = %entry.id(),
            file = %file.path.display(),
            "Journal entry written"
        );

        self.writes_since_flush += 1;
        self.writes_since_fsync += 1;
        self.apply_flush_policy()?;
        self.apply_fsync_policy()?;
        Ok(())
    }

    /// Force flush + fsync.
    pub fn sync(&mut self) -> Result<(), JournalError> {
        if let Some(file) = self.current.as_mut() {
            file.writer.get_mut().flush()?;
            file.writer.get_ref().get_ref().get_ref().sync_all()?;
        }
        self.writes_since_flush = 0;
        self.writes_since_fsync = 0;
        Ok(())
    }

    /// Close the current document. Further writes fail.
    pub fn shutdown(&mut self) -> Result<(), JournalError> {
        self.close_file()?;
        info!(dir = %self.config.dir.display(), "Journal writer shut down");
        Ok(())
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn rotation_due(&self) -> bool {
        let Some(file) = self.current.as_ref() else {
            return false;
        };
        if file.writer.entries_written() == 0 {
            return false;
        }
        let too_big = file.writer.get_ref().count() >= self.config.max_file_size;
        let too_old = self
            .config
            .max_file_age
            .is_some_and(|age| file.opened_at.elapsed() >= age);
        too_big || too_old
    }

    fn apply_flush_policy(&mut self) -> Result<(), JournalError> {
        let should_flush = match self.config.flush_policy {
            FlushPolicy::EveryWrite => true,
            FlushPolicy::EveryN(n) => self.writes_since_flush >= n,
        };
        if should_flush {
            if let Some(file) = self.current.as_mut() {
                file.writer.get_mut().flush()?;
            }
            self.writes_since_flush = 0;
        }
        Ok(())
    }

    fn apply_fsync_policy(&mut self) -> Result<(), JournalError> {
        let should_fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.writes_since_fsync >= n,
            FsyncPolicy::OnRotation => false,
        };
        if should_fsync {
            self.sync()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.close_file()?;
        self.file_index += 1;
        self.start_file()?;
        Ok(())
    }

    fn start_file(&mut self) -> Result<(), JournalError> {
        let path = self.config.dir.join(format::file_name(self.file_index));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;

        let sink = CountingWriter::new(BufWriter::new(file));
        let mut writer = JournalWriter::new(sink, self.config.cipher.clone());
        writer.write_header(&self.repository_hash, Utc::now())?;
        writer.get_mut().flush()?;

        info!(file = %path.display(), "Journal file opened");
        self.current = Some(OpenJournalFile {
            path,
            opened_at: Instant::now(),
            writer,
        });
        Ok(())
    }

    fn close_file(&mut self) -> Result<(), JournalError> {
        if let Some(file) = self.current.take() {
            let entries = file.writer.entries_written();
            let sink = file.writer.finish()?;
            sink.get_ref().get_ref().sync_all()?;
            info!(file = %file.path.display(), entries, "Journal file closed");
        }
        self.writes_since_flush = 0;
        self.writes_since_fsync = 0;
        Ok(())
    }

    fn find_latest_index(dir: &Path) -> u64 {
        fs::read_dir(dir)
            .ok()
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| format::file_index(&e.file_name().to_string_lossy()))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

impl Drop for FileJournalWriter {
    fn drop(&mut self) {
        if self.current.is_some() {
            if let Err(e) = self.close_file() {
                tracing::error!(error = %e, "Failed to close journal file on drop");
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
