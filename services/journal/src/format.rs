//! Journal XML vocabulary
//!
//! Element and attribute names of the journal document. A journal file is
//! one `repositoryJournal` root holding zero or more `journalEntry`
//! elements; see the crate docs for a full example.

pub mod tags {
    pub const ROOT: &str = "repositoryJournal";
    pub const ENTRY: &str = "journalEntry";
    pub const CONTEXT: &str = "context";
    pub const PASSWORD: &str = "password";
    pub const NO_OP: &str = "noOp";
    pub const NOW: &str = "now";
    pub const MULTI_VALUE_MAP: &str = "multiValueMap";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
    pub const ARGUMENT: &str = "argument";
    pub const ELEMENT: &str = "element";
}

pub mod attrs {
    pub const REPOSITORY_HASH: &str = "repositoryHash";
    pub const TIMESTAMP: &str = "timestamp";
    pub const METHOD: &str = "method";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
}

/// Journal file names: `journal-NNNNNN.xml`.
pub const FILE_PREFIX: &str = "journal-";
pub const FILE_SUFFIX: &str = ".xml";

/// Parse the index out of a journal file name.
pub fn file_index(name: &str) -> Option<u64> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse::<u64>()
        .ok()
}

pub fn file_name(index: u64) -> String {
    format!("{}{:06}{}", FILE_PREFIX, index, FILE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_naming() {
        assert_eq!(file_name(42), "journal-000042.xml");
        assert_eq!(file_index("journal-000042.xml"), Some(42));
    }

    #[test]
    fn test_file_index_ignores_foreign_files() {
        assert_eq!(file_index("journal-000001.bin"), None);
        assert_eq!(file_index("notes.xml"), None);
        assert_eq!(file_index("journal-abc.xml"), None);
    }
}
