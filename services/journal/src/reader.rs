//! Journal Reader — Sequential reader with structural validation
//!
//! Reads what `journal.rs` writes, in document order, one entry at a time.
//!
//! Features:
//! - Header validation, including the repository hash of the journal
//!   against the hash of the recovering repository
//! - Strict structure: a missing, misplaced or unexpected tag is an error,
//!   never a skipped entry
//! - Typed argument decoding (string, string-array, boolean, integer, date,
//!   stream, null)
//! - Password deciphering with the configured cipher
//! - Directory reading across rotated files, with optional archiving of
//!   fully consumed files

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use types::context::{Context, Namespace};
use types::entry::{Argument, ArgumentValue, JournalEntry};
use types::ids::EntryId;
use types::time::{format_date, parse_date};

use crate::cipher::{CipherError, CipherType, PasswordCipher};
use crate::format::{self, attrs, tags};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Journal not found: {0}")]
    MissingJournal(PathBuf),

    #[error("Malformed journal at byte {position}: expected {expected}, found {found}")]
    UnexpectedTag {
        position: u64,
        expected: String,
        found: String,
    },

    #[error("Malformed journal: <{element}> is missing attribute {attribute}")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Malformed journal: {0}")]
    Malformed(String),

    #[error("Repository hash mismatch: journal has {journal}, repository has {repository}")]
    RepositoryHashMismatch { journal: String, repository: String },

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Journal header has not been read")]
    HeaderNotRead,
}

// ── Journal Header ──────────────────────────────────────────────────

/// Document-level header of one journal.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalHeader {
    pub repository_hash: String,
    pub created: DateTime<Utc>,
}

// ── XML Cursor ──────────────────────────────────────────────────────

/// Pull cursor over XML events with one event of lookahead.
///
/// Structural reads skip the declaration, comments, processing
/// instructions and whitespace-only text. Text reads keep everything.
struct XmlCursor<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    peeked: Option<Event<'static>>,
}

impl<R: BufRead> XmlCursor<R> {
    fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.expand_empty_elements(true);
        Self {
            reader,
            buf: Vec::new(),
            peeked: None,
        }
    }

    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn raw_next(&mut self) -> Result<Event<'static>, ReaderError> {
        self.buf.clear();
        let event = self.reader.read_event_into(&mut self.buf)?;
        Ok(event.into_owned())
    }

    fn next_tag(&mut self) -> Result<Event<'static>, ReaderError> {
        if let Some(event) = self.peeked.take() {
            return Ok(event);
        }
        loop {
            match self.raw_next()? {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => continue,
                other => return Ok(other),
            }
        }
    }

    fn peek_tag(&mut self) -> Result<&Event<'static>, ReaderError> {
        let event = match self.peeked.take() {
            Some(event) => event,
            None => self.next_tag()?,
        };
        Ok(self.peeked.insert(event))
    }

    /// Whether the next structural event is `<name>`.
    fn at_start(&mut self, name: &str) -> Result<bool, ReaderError> {
        Ok(matches!(self.peek_tag()?, Event::Start(e) if e.name().as_ref() == name.as_bytes()))
    }

    /// Whether the next structural event is `</name>`.
    fn at_end(&mut self, name: &str) -> Result<bool, ReaderError> {
        Ok(matches!(self.peek_tag()?, Event::End(e) if e.name().as_ref() == name.as_bytes()))
    }

    fn expect_start(&mut self, name: &str) -> Result<BytesStart<'static>, ReaderError> {
        match self.next_tag()? {
            Event::Start(start) if start.name().as_ref() == name.as_bytes() => Ok(start),
            other => Err(self.unexpected(&format!("<{}>", name), &other)),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<(), ReaderError> {
        match self.next_tag()? {
            Event::End(end) if end.name().as_ref() == name.as_bytes() => Ok(()),
            other => Err(self.unexpected(&format!("</{}>", name), &other)),
        }
    }

    /// Collect the text content up to `</name>`. Must directly follow the
    /// matching start tag.
    fn read_text(&mut self, name: &str) -> Result<String, ReaderError> {
        let mut text = String::new();
        loop {
            match self.raw_next()? {
                Event::Text(t) => text.push_str(&t.unescape()?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
                Event::Comment(_) => continue,
                Event::End(end) if end.name().as_ref() == name.as_bytes() => return Ok(text),
                other => return Err(self.unexpected(&format!("text or </{}>", name), &other)),
            }
        }
    }

    /// Consume the next structural event, requiring end of input.
    fn expect_eof(&mut self) -> Result<(), ReaderError> {
        match self.next_tag()? {
            Event::Eof => Ok(()),
            other => Err(self.unexpected("end of document", &other)),
        }
    }

    fn unexpected(&self, expected: &str, found: &Event<'_>) -> ReaderError {
        ReaderError::UnexpectedTag {
            position: self.position(),
            expected: expected.to_string(),
            found: describe(found),
        }
    }
}

fn describe(event: &Event<'_>) -> String {
    match event {
        Event::Start(e) => format!("<{}>", String::from_utf8_lossy(e.name().as_ref())),
        Event::End(e) => format!("</{}>", String::from_utf8_lossy(e.name().as_ref())),
        Event::Empty(e) => format!("<{}/>", String::from_utf8_lossy(e.name().as_ref())),
        Event::Text(_) | Event::CData(_) => "text".to_string(),
        Event::Eof => "end of file".to_string(),
        _ => "markup".to_string(),
    }
}

fn attribute(start: &BytesStart<'_>, key: &str) -> Result<Option<String>, ReaderError> {
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(
    start: &BytesStart<'_>,
    element: &'static str,
    key: &'static str,
) -> Result<String, ReaderError> {
    attribute(start, key)?.ok_or(ReaderError::MissingAttribute {
        element,
        attribute: key,
    })
}

fn date(text: &str, what: &str) -> Result<DateTime<Utc>, ReaderError> {
    parse_date(text).map_err(|e| ReaderError::Malformed(format!("bad {} {:?}: {}", what, text, e)))
}

fn boolean(text: &str, what: &str) -> Result<bool, ReaderError> {
    match text.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ReaderError::Malformed(format!("bad {} {:?}", what, other))),
    }
}

// ── Journal Reader ──────────────────────────────────────────────────

/// Reads one journal document from any buffered byte stream.
pub struct JournalReader<R: BufRead> {
    cursor: XmlCursor<R>,
    cipher: PasswordCipher,
    header: Option<JournalHeader>,
    finished: bool,
    entries_read: u64,
}

impl JournalReader<BufReader<File>> {
    /// Open a journal file.
    pub fn open_file(path: &Path, cipher: PasswordCipher) -> Result<Self, ReaderError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ReaderError::MissingJournal(path.to_path_buf()),
            _ => ReaderError::Io(e),
        })?;
        Ok(Self::new(BufReader::new(file), cipher))
    }
}

impl<R: BufRead> JournalReader<R> {
    pub fn new(inner: R, cipher: PasswordCipher) -> Self {
        Self {
            cursor: XmlCursor::new(inner),
            cipher,
            header: None,
            finished: false,
            entries_read: 0,
        }
    }

    /// Read the document header.
    ///
    /// When `expected_hash` is given, the journal's repository hash must
    /// match it; with `continue_on_hash_error` a mismatch is only logged.
    pub fn read_header(
        &mut self,
        expected_hash: Option<&str>,
        continue_on_hash_error: bool,
    ) -> Result<&JournalHeader, ReaderError> {
        if self.header.is_some() {
            return Err(ReaderError::Malformed("header already read".into()));
        }
        let root = self.cursor.expect_start(tags::ROOT)?;
        let repository_hash = required_attribute(&root, tags::ROOT, attrs::REPOSITORY_HASH)?;
        let created = date(
            &required_attribute(&root, tags::ROOT, attrs::TIMESTAMP)?,
            "journal timestamp",
        )?;

        if let Some(expected) = expected_hash {
            if expected != repository_hash {
                if !continue_on_hash_error {
                    return Err(ReaderError::RepositoryHashMismatch {
                        journal: repository_hash,
                        repository: expected.to_string(),
                    });
                }
                warn!(
                    journal = %repository_hash,
                    repository = %expected,
                    "Repository hash mismatch; continuing as configured"
                );
            }
        }

        debug!(repository_hash = %repository_hash, created = %format_date(&created), "Journal header read");
        Ok(self.header.insert(JournalHeader {
            repository_hash,
            created,
        }))
    }

    pub fn header(&self) -> Option<&JournalHeader> {
        self.header.as_ref()
    }

    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Read the next entry.
    ///
    /// Returns `None` once the root element has closed.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        if self.header.is_none() {
            return Err(ReaderError::HeaderNotRead);
        }
        if self.finished {
            return Ok(None);
        }

        if self.cursor.at_end(tags::ROOT)? {
            self.cursor.expect_end(tags::ROOT)?;
            self.cursor.expect_eof()?;
            self.finished = true;
            return Ok(None);
        }
        if !self.cursor.at_start(tags::ENTRY)? {
            let found = self.cursor.next_tag()?;
            return Err(self.cursor.unexpected(
                &format!("<{}> or </{}>", tags::ENTRY, tags::ROOT),
                &found,
            ));
        }

        let entry = self.read_entry()?;
        self.entries_read += 1;
        Ok(Some(entry))
    }

    /// Read all remaining entries.
    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn read_entry(&mut self) -> Result<JournalEntry, ReaderError> {
        let start = self.cursor.expect_start(tags::ENTRY)?;
        let method = required_attribute(&start, tags::ENTRY, attrs::METHOD)?;
        let timestamp = date(
            &required_attribute(&start, tags::ENTRY, attrs::TIMESTAMP)?,
            "entry timestamp",
        )?;

        let context = self.read_context()?;
        if EntryId::from(timestamp) != EntryId::from(context.now()) {
            return Err(ReaderError::Malformed(format!(
                "entry timestamp {} disagrees with context now {}",
                format_date(&timestamp),
                format_date(&context.now())
            )));
        }

        let mut arguments = Vec::new();
        while !self.cursor.at_end(tags::ENTRY)? {
            arguments.push(self.read_argument()?);
        }
        self.cursor.expect_end(tags::ENTRY)?;

        Ok(JournalEntry::new(method, context, arguments))
    }

    fn read_context(&mut self) -> Result<Context, ReaderError> {
        self.cursor.expect_start(tags::CONTEXT)?;

        let password_start = self.cursor.expect_start(tags::PASSWORD)?;
        let cipher_type = match attribute(&password_start, attrs::TYPE)? {
            Some(name) => CipherType::parse(&name)?,
            None => CipherType::Plain,
        };
        let ciphered = self.cursor.read_text(tags::PASSWORD)?;

        self.cursor.expect_start(tags::NO_OP)?;
        let no_op = boolean(&self.cursor.read_text(tags::NO_OP)?, "noOp flag")?;

        self.cursor.expect_start(tags::NOW)?;
        let now_text = self.cursor.read_text(tags::NOW)?;
        let now = date(&now_text, "context now")?;

        let password = self
            .cipher
            .decipher(now_text.trim(), cipher_type, &ciphered)?;
        let mut context = Context::new(now)
            .with_password(password)
            .with_no_op(no_op);

        let mut seen = Vec::new();
        while !self.cursor.at_end(tags::CONTEXT)? {
            let map_start = self.cursor.expect_start(tags::MULTI_VALUE_MAP)?;
            let name = required_attribute(&map_start, tags::MULTI_VALUE_MAP, attrs::NAME)?;
            let namespace = Namespace::parse(&name).ok_or_else(|| {
                ReaderError::Malformed(format!("unknown attribute namespace {:?}", name))
            })?;
            if seen.contains(&namespace) {
                return Err(ReaderError::Malformed(format!(
                    "attribute namespace {} appears twice",
                    namespace
                )));
            }
            seen.push(namespace);

            while !self.cursor.at_end(tags::MULTI_VALUE_MAP)? {
                let key_start = self.cursor.expect_start(tags::KEY)?;
                let key = required_attribute(&key_start, tags::KEY, attrs::NAME)?;
                let mut values = Vec::new();
                while !self.cursor.at_end(tags::KEY)? {
                    self.cursor.expect_start(tags::VALUE)?;
                    values.push(self.cursor.read_text(tags::VALUE)?);
                }
                self.cursor.expect_end(tags::KEY)?;
                context.attributes_mut(namespace).set(key, values);
            }
            self.cursor.expect_end(tags::MULTI_VALUE_MAP)?;
        }
        self.cursor.expect_end(tags::CONTEXT)?;

        Ok(context)
    }

    fn read_argument(&mut self) -> Result<Argument, ReaderError> {
        let start = self.cursor.expect_start(tags::ARGUMENT)?;
        let name = required_attribute(&start, tags::ARGUMENT, attrs::NAME)?;
        let kind = required_attribute(&start, tags::ARGUMENT, attrs::TYPE)?;
        let what = format!("{} argument {}", kind, name);

        let value = match kind.as_str() {
            "null" => {
                self.cursor.expect_end(tags::ARGUMENT)?;
                ArgumentValue::Null
            }
            "string" => ArgumentValue::String(self.cursor.read_text(tags::ARGUMENT)?),
            "boolean" => ArgumentValue::Boolean(boolean(&self.cursor.read_text(tags::ARGUMENT)?, &what)?),
            "integer" => {
                let text = self.cursor.read_text(tags::ARGUMENT)?;
                let value = text.trim().parse::<i64>().map_err(|e| {
                    ReaderError::Malformed(format!("bad {} {:?}: {}", what, text, e))
                })?;
                ArgumentValue::Integer(value)
            }
            "date" => ArgumentValue::Date(date(&self.cursor.read_text(tags::ARGUMENT)?, &what)?),
            "stream" => {
                let text = self.cursor.read_text(tags::ARGUMENT)?;
                let bytes = BASE64
                    .decode(text.trim())
                    .map_err(|e| ReaderError::Malformed(format!("bad {}: {}", what, e)))?;
                ArgumentValue::Stream(bytes)
            }
            "string-array" => {
                let mut items = Vec::new();
                while !self.cursor.at_end(tags::ARGUMENT)? {
                    self.cursor.expect_start(tags::ELEMENT)?;
                    items.push(self.cursor.read_text(tags::ELEMENT)?);
                }
                self.cursor.expect_end(tags::ARGUMENT)?;
                ArgumentValue::StringArray(items)
            }
            other => {
                return Err(ReaderError::Malformed(format!(
                    "argument {} has unknown type {:?}",
                    name, other
                )))
            }
        };

        Ok(Argument::new(name, value))
    }
}

// ── Entry Source ────────────────────────────────────────────────────

/// Anything recovery can pull entries from, in order.
pub trait EntrySource {
    /// Next entry, or `None` at the end of the journal.
    fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError>;
}

impl<R: BufRead> EntrySource for JournalReader<R> {
    fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        JournalReader::next_entry(self)
    }
}

// ── File Journal Reader ─────────────────────────────────────────────

/// Configuration for reading a journal directory.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Directory holding `journal-NNNNNN.xml` files.
    pub journal_dir: PathBuf,
    /// Where fully consumed files are moved (None = leave in place).
    pub archive_dir: Option<PathBuf>,
    /// Repository hash journals must carry (None = accept any).
    pub expected_repository_hash: Option<String>,
    /// Log hash mismatches instead of failing.
    pub continue_on_hash_error: bool,
    /// Cipher for context passwords.
    pub cipher: PasswordCipher,
}

impl ReaderConfig {
    pub fn new(journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            journal_dir: journal_dir.into(),
            archive_dir: None,
            expected_repository_hash: None,
            continue_on_hash_error: false,
            cipher: PasswordCipher::plain(),
        }
    }
}

struct CurrentFile {
    path: PathBuf,
    reader: JournalReader<BufReader<File>>,
}

/// Reads every journal file of a directory in index order.
pub struct FileJournalReader {
    config: ReaderConfig,
    files: Vec<PathBuf>,
    next_file: usize,
    current: Option<CurrentFile>,
    files_read: u64,
    entries_read: u64,
}

impl FileJournalReader {
    /// Open a reader over all journal files in the configured directory.
    pub fn open(config: ReaderConfig) -> Result<Self, ReaderError> {
        let files = Self::discover_files(&config.journal_dir)?;
        if let Some(archive) = &config.archive_dir {
            fs::create_dir_all(archive)?;
        }
        info!(
            dir = %config.journal_dir.display(),
            files = files.len(),
            "Journal directory opened"
        );
        Ok(Self {
            config,
            files,
            next_file: 0,
            current: None,
            files_read: 0,
            entries_read: 0,
        })
    }

    /// Journal files, in the order they will be read.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of files fully consumed so far.
    pub fn files_read(&self) -> u64 {
        self.files_read
    }

    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Header of the file currently being read.
    pub fn current_header(&self) -> Option<&JournalHeader> {
        self.current.as_ref().and_then(|f| f.reader.header())
    }

    /// Read the next entry across all files.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        loop {
            if self.current.is_none() && !self.open_next_file()? {
                return Ok(None);
            }
            let Some(file) = self.current.as_mut() else {
                return Ok(None);
            };
            match file.reader.next_entry()? {
                Some(entry) => {
                    self.entries_read += 1;
                    return Ok(Some(entry));
                }
                None => self.finish_current_file()?,
            }
        }
    }

    /// Read all remaining entries.
    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
        if !dir.is_dir() {
            return Err(ReaderError::MissingJournal(dir.to_path_buf()));
        }

        let mut files: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let idx = format::file_index(&e.file_name().to_string_lossy())?;
                Some((idx, e.path()))
            })
            .collect();

        files.sort_by_key(|(idx, _)| *idx);
        Ok(files.into_iter().map(|(_, p)| p).collect())
    }

    fn open_next_file(&mut self) -> Result<bool, ReaderError> {
        let Some(path) = self.files.get(self.next_file).cloned() else {
            return Ok(false);
        };
        self.next_file += 1;

        let mut reader = JournalReader::open_file(&path, self.config.cipher.clone())?;
        reader.read_header(
            self.config.expected_repository_hash.as_deref(),
            self.config.continue_on_hash_error,
        )?;
        debug!(file = %path.display(), "Reading journal file");
        self.current = Some(CurrentFile { path, reader });
        Ok(true)
    }

    fn finish_current_file(&mut self) -> Result<(), ReaderError> {
        if let Some(file) = self.current.take() {
            self.files_read += 1;
            let entries = file.reader.entries_read();
            let path = file.path;
            if let Some(archive) = &self.config.archive_dir {
                let target = Self::archive_target(archive, &path)?;
                fs::rename(&path, &target)?;
                info!(file = %path.display(), archived = %target.display(), entries, "Journal file archived");
            } else {
                debug!(file = %path.display(), entries, "Journal file consumed");
            }
        }
        Ok(())
    }
}

impl FileJournalReader {
    /// First free name for `path` in the archive. An archived journal is
    /// never replaced: a clash gets `journal-NNNNNN.K.xml`.
    fn archive_target(archive: &Path, path: &Path) -> Result<PathBuf, ReaderError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ReaderError::Malformed(format!("bad path {}", path.display())))?;
        let target = archive.join(name);
        if !target.exists() {
            return Ok(target);
        }

        let stem = name.strip_suffix(format::FILE_SUFFIX).unwrap_or(name);
        let mut copy: u32 = 1;
        loop {
            let candidate = archive.join(format!("{}.{}{}", stem, copy, format::FILE_SUFFIX));
            if !candidate.exists() {
                warn!(
                    file = %path.display(),
                    archived = %candidate.display(),
                    "Archive already holds a journal of this name"
                );
                return Ok(candidate);
            }
            copy += 1;
        }
    }
}

impl EntrySource for FileJournalReader {
    fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        FileJournalReader::next_entry(self)
    }
}

// ── Tests ───────────────────────────────────────────────────────────


// ── Property-Based Tests ────────────────────────────────────────────

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::journal::JournalWriter;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::io::Cursor;

    const TEXT: &str = "[a-zA-Z0-9 <>&'\"/:._-]{0,12}";

    fn instant() -> impl Strategy<Value = DateTime<Utc>> {
        (946_684_800_000i64..4_102_444_800_000).prop_map(|ms| Utc.timestamp_millis_opt(ms).unwrap())
    }

    fn value() -> impl Strategy<Value = ArgumentValue> {
        prop_oneof![
            Just(ArgumentValue::Null),
            TEXT.prop_map(ArgumentValue::String),
            prop::collection::vec(TEXT, 0..4).prop_map(ArgumentValue::StringArray),
            any::<bool>().prop_map(ArgumentValue::Boolean),
            any::<i64>().prop_map(ArgumentValue::Integer),
            instant().prop_map(ArgumentValue::date),
            prop::collection::vec(any::<u8>(), 0..64).prop_map(ArgumentValue::Stream),
        ]
    }

    fn entry() -> impl Strategy<Value = JournalEntry> {
        (
            "[a-zA-Z]{1,16}",
            instant(),
            TEXT,
            any::<bool>(),
            prop::collection::vec((0usize..5, "[a-zA-Z:.]{1,8}", TEXT), 0..12),
            prop::collection::vec(("[a-zA-Z]{1,8}", value()), 0..8),
        )
            .prop_map(|(method, now, password, no_op, attributes, arguments)| {
                let mut context = Context::new(now).with_password(password).with_no_op(no_op);
                for (ns, key, value) in attributes {
                    context.attributes_mut(Namespace::ALL[ns]).add(key, value);
                }
                let arguments = arguments
                    .into_iter()
                    .map(|(name, value)| Argument::new(name, value))
                    .collect();
                JournalEntry::new(method, context, arguments)
            })
    }

    proptest! {
        #[test]
        fn prop_written_entries_read_back_equal(
            entries in prop::collection::vec(entry(), 0..6),
            keyed in any::<bool>(),
        ) {
            let cipher = if keyed { PasswordCipher::new("prop-key") } else { PasswordCipher::plain() };
            let mut writer = JournalWriter::new(Vec::new(), cipher.clone());
            writer.write_header("prop-hash", Utc::now()).unwrap();
            for entry in &entries {
                writer.write_entry(entry).unwrap();
            }
            let bytes = writer.finish().unwrap();

            let mut reader = JournalReader::new(Cursor::new(bytes), cipher);
            reader.read_header(Some("prop-hash"), false).unwrap();
            let read = reader.read_all().unwrap();
            prop_assert_eq!(read, entries);
        }
    }
}
