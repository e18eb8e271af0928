//! Journal settings
//!
//! Loaded from a TOML file or built in code. Relative directories resolve
//! against `home`, which is always an explicit value.
//!
//! ```toml
//! home = "/var/lib/repository"
//! journal_dir = "journal"
//! archive_dir = "journal-archive"
//! cipher_key = "change-me"
//! max_file_size = 16777216
//! max_file_age_secs = 3600
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cipher::PasswordCipher;
use crate::journal::JournalConfig;
use crate::reader::ReaderConfig;

const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("journal")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

/// Settings shared by the journal creator, recovery and tooling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalSettings {
    /// Repository home directory.
    pub home: PathBuf,
    /// Directory of live journal files.
    #[serde(default = "default_journal_dir")]
    pub journal_dir: PathBuf,
    /// Where recovery moves consumed files (None = leave in place).
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    /// Secret for ciphering context passwords (None = plain).
    #[serde(default)]
    pub cipher_key: Option<String>,
    /// Expected repository hash for recovery (None = ask the delegate).
    #[serde(default)]
    pub repository_hash: Option<String>,
    #[serde(default)]
    pub continue_on_hash_error: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub max_file_age_secs: Option<u64>,
}

impl JournalSettings {
    /// Settings with defaults for the given home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            journal_dir: default_journal_dir(),
            archive_dir: None,
            cipher_key: None,
            repository_hash: None,
            continue_on_hash_error: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_age_secs: None,
        }
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid("max_file_size must be positive".into()));
        }
        if self.cipher_key.as_deref() == Some("") {
            return Err(ConfigError::Invalid("cipher_key must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve `path` against the home directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.resolve(&self.journal_dir)
    }

    pub fn archive_path(&self) -> Option<PathBuf> {
        self.archive_dir.as_deref().map(|dir| self.resolve(dir))
    }

    pub fn cipher(&self) -> PasswordCipher {
        match &self.cipher_key {
            Some(key) => PasswordCipher::new(key),
            None => PasswordCipher::plain(),
        }
    }

    /// Writer configuration for the journal creator.
    pub fn journal_config(&self) -> JournalConfig {
        JournalConfig {
            max_file_size: self.max_file_size,
            max_file_age: self.max_file_age_secs.map(Duration::from_secs),
            cipher: self.cipher(),
            ..JournalConfig::new(self.journal_path())
        }
    }

    /// Reader configuration for recovery and tooling.
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            archive_dir: self.archive_path(),
            expected_repository_hash: self.repository_hash.clone(),
            continue_on_hash_error: self.continue_on_hash_error,
            cipher: self.cipher(),
            ..ReaderConfig::new(self.journal_path())
        }
    }
}
