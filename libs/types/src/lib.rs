//! Types library for the repository management journal
//!
//! This library provides the data model shared by the journal writer, the
//! journal reader and the recovery driver: what a recorded management call
//! looks like in memory, independent of how it is serialized.
//!
//! # Modules
//! - `ids`: Entry identifiers
//! - `time`: Journal date format
//! - `context`: Invocation context and its attribute namespaces
//! - `entry`: Journal entries and typed arguments
//! - `method`: The journaled management methods and their requests
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod time;
pub mod context;
pub mod entry;
pub mod method;
pub mod errors;
