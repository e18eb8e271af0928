//! Journaled management methods
//!
//! Each mutating repository operation has a typed request struct. A
//! `ManagementCall` converts to the ordered argument list stored in a
//! `JournalEntry`, and back again during replay. Argument order and types
//! are part of the journal format: decoding checks both and refuses
//! anything it does not recognize.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::slice;

use crate::context::recovery_keys;
use crate::entry::{Argument, ArgumentValue};
use crate::errors::ArgumentError;

/// Names of the journaled methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ManagementMethod {
    Ingest,
    ModifyObject,
    PurgeObject,
    AddDatastream,
    ModifyDatastreamByReference,
    ModifyDatastreamByValue,
    SetDatastreamState,
    SetDatastreamVersionable,
    PurgeDatastream,
    GetNextPid,
    AddRelationship,
    PurgeRelationship,
}

impl ManagementMethod {
    pub const ALL: [ManagementMethod; 12] = [
        ManagementMethod::Ingest,
        ManagementMethod::ModifyObject,
        ManagementMethod::PurgeObject,
        ManagementMethod::AddDatastream,
        ManagementMethod::ModifyDatastreamByReference,
        ManagementMethod::ModifyDatastreamByValue,
        ManagementMethod::SetDatastreamState,
        ManagementMethod::SetDatastreamVersionable,
        ManagementMethod::PurgeDatastream,
        ManagementMethod::GetNextPid,
        ManagementMethod::AddRelationship,
        ManagementMethod::PurgeRelationship,
    ];

    /// Name as written in the journal.
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagementMethod::Ingest => "ingest",
            ManagementMethod::ModifyObject => "modifyObject",
            ManagementMethod::PurgeObject => "purgeObject",
            ManagementMethod::AddDatastream => "addDatastream",
            ManagementMethod::ModifyDatastreamByReference => "modifyDatastreamByReference",
            ManagementMethod::ModifyDatastreamByValue => "modifyDatastreamByValue",
            ManagementMethod::SetDatastreamState => "setDatastreamState",
            ManagementMethod::SetDatastreamVersionable => "setDatastreamVersionable",
            ManagementMethod::PurgeDatastream => "purgeDatastream",
            ManagementMethod::GetNextPid => "getNextPID",
            ManagementMethod::AddRelationship => "addRelationship",
            ManagementMethod::PurgeRelationship => "purgeRelationship",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for ManagementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Requests ────────────────────────────────────────────────────────

/// Ingest a new digital object from its serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingest {
    pub serialization: Vec<u8>,
    pub log_message: String,
    pub format: String,
    pub encoding: String,
    /// Assign a fresh PID instead of the one in the serialization.
    pub new_pid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyObject {
    pub pid: String,
    pub state: Option<String>,
    pub label: Option<String>,
    pub owner_id: Option<String>,
    pub log_message: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeObject {
    pub pid: String,
    pub log_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDatastream {
    pub pid: String,
    /// Requested datastream ID; the repository assigns one when absent.
    pub ds_id: Option<String>,
    pub alt_ids: Vec<String>,
    pub label: String,
    pub versionable: bool,
    pub mime_type: String,
    pub format_uri: Option<String>,
    pub location: String,
    pub control_group: String,
    pub state: String,
    pub checksum_type: Option<String>,
    pub checksum: Option<String>,
    pub log_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyDatastreamByReference {
    pub pid: String,
    pub ds_id: String,
    pub alt_ids: Vec<String>,
    pub label: Option<String>,
    pub mime_type: Option<String>,
    pub format_uri: Option<String>,
    pub location: Option<String>,
    pub checksum_type: Option<String>,
    pub checksum: Option<String>,
    pub log_message: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyDatastreamByValue {
    pub pid: String,
    pub ds_id: String,
    pub alt_ids: Vec<String>,
    pub label: Option<String>,
    pub mime_type: Option<String>,
    pub format_uri: Option<String>,
    pub content: Option<Vec<u8>>,
    pub checksum_type: Option<String>,
    pub checksum: Option<String>,
    pub log_message: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDatastreamState {
    pub pid: String,
    pub ds_id: String,
    pub state: String,
    pub log_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDatastreamVersionable {
    pub pid: String,
    pub ds_id: String,
    pub versionable: bool,
    pub log_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeDatastream {
    pub pid: String,
    pub ds_id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub log_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetNextPid {
    pub num_pids: i64,
    pub namespace: Option<String>,
}

/// Shared shape of `addRelationship` and `purgeRelationship`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub pid: String,
    pub relationship: String,
    pub object: String,
    pub is_literal: bool,
    pub datatype: Option<String>,
}

/// A decoded management-method invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementCall {
    Ingest(Ingest),
    ModifyObject(ModifyObject),
    PurgeObject(PurgeObject),
    AddDatastream(AddDatastream),
    ModifyDatastreamByReference(ModifyDatastreamByReference),
    ModifyDatastreamByValue(ModifyDatastreamByValue),
    SetDatastreamState(SetDatastreamState),
    SetDatastreamVersionable(SetDatastreamVersionable),
    PurgeDatastream(PurgeDatastream),
    GetNextPid(GetNextPid),
    AddRelationship(Relationship),
    PurgeRelationship(Relationship),
}

/// What a management method returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MethodOutcome {
    Pid(String),
    DatastreamId(String),
    Pids(Vec<String>),
    Timestamp(DateTime<Utc>),
    Timestamps(Vec<DateTime<Utc>>),
    Flag(bool),
}

impl ManagementCall {
    pub fn method(&self) -> ManagementMethod {
        match self {
            ManagementCall::Ingest(_) => ManagementMethod::Ingest,
            ManagementCall::ModifyObject(_) => ManagementMethod::ModifyObject,
            ManagementCall::PurgeObject(_) => ManagementMethod::PurgeObject,
            ManagementCall::AddDatastream(_) => ManagementMethod::AddDatastream,
            ManagementCall::ModifyDatastreamByReference(_) => {
                ManagementMethod::ModifyDatastreamByReference
            }
            ManagementCall::ModifyDatastreamByValue(_) => ManagementMethod::ModifyDatastreamByValue,
            ManagementCall::SetDatastreamState(_) => ManagementMethod::SetDatastreamState,
            ManagementCall::SetDatastreamVersionable(_) => {
                ManagementMethod::SetDatastreamVersionable
            }
            ManagementCall::PurgeDatastream(_) => ManagementMethod::PurgeDatastream,
            ManagementCall::GetNextPid(_) => ManagementMethod::GetNextPid,
            ManagementCall::AddRelationship(_) => ManagementMethod::AddRelationship,
            ManagementCall::PurgeRelationship(_) => ManagementMethod::PurgeRelationship,
        }
    }

    /// Encode as the ordered argument list stored in a journal entry.
    pub fn to_arguments(&self) -> Vec<Argument> {
        match self {
            ManagementCall::Ingest(r) => vec![
                stream("serialization", &r.serialization),
                string("logMessage", &r.log_message),
                string("format", &r.format),
                string("encoding", &r.encoding),
                boolean("newPid", r.new_pid),
            ],
            ManagementCall::ModifyObject(r) => vec![
                string("pid", &r.pid),
                opt_string("state", &r.state),
                opt_string("label", &r.label),
                opt_string("ownerId", &r.owner_id),
                string("logMessage", &r.log_message),
                opt_date("lastModifiedDate", r.last_modified),
            ],
            ManagementCall::PurgeObject(r) => vec![
                string("pid", &r.pid),
                string("logMessage", &r.log_message),
            ],
            ManagementCall::AddDatastream(r) => vec![
                string("pid", &r.pid),
                opt_string("dsId", &r.ds_id),
                strings("altIds", &r.alt_ids),
                string("dsLabel", &r.label),
                boolean("versionable", r.versionable),
                string("mimeType", &r.mime_type),
                opt_string("formatUri", &r.format_uri),
                string("location", &r.location),
                string("controlGroup", &r.control_group),
                string("dsState", &r.state),
                opt_string("checksumType", &r.checksum_type),
                opt_string("checksum", &r.checksum),
                string("logMessage", &r.log_message),
            ],
            ManagementCall::ModifyDatastreamByReference(r) => vec![
                string("pid", &r.pid),
                string("dsId", &r.ds_id),
                strings("altIds", &r.alt_ids),
                opt_string("dsLabel", &r.label),
                opt_string("mimeType", &r.mime_type),
                opt_string("formatUri", &r.format_uri),
                opt_string("location", &r.location),
                opt_string("checksumType", &r.checksum_type),
                opt_string("checksum", &r.checksum),
                string("logMessage", &r.log_message),
                opt_date("lastModifiedDate", r.last_modified),
            ],
            ManagementCall::ModifyDatastreamByValue(r) => vec![
                string("pid", &r.pid),
                string("dsId", &r.ds_id),
                strings("altIds", &r.alt_ids),
                opt_string("dsLabel", &r.label),
                opt_string("mimeType", &r.mime_type),
                opt_string("formatUri", &r.format_uri),
                opt_stream("content", &r.content),
                opt_string("checksumType", &r.checksum_type),
                opt_string("checksum", &r.checksum),
                string("logMessage", &r.log_message),
                opt_date("lastModifiedDate", r.last_modified),
            ],
            ManagementCall::SetDatastreamState(r) => vec![
                string("pid", &r.pid),
                string("dsId", &r.ds_id),
                string("dsState", &r.state),
                string("logMessage", &r.log_message),
            ],
            ManagementCall::SetDatastreamVersionable(r) => vec![
                string("pid", &r.pid),
                string("dsId", &r.ds_id),
                boolean("versionable", r.versionable),
                string("logMessage", &r.log_message),
            ],
            ManagementCall::PurgeDatastream(r) => vec![
                string("pid", &r.pid),
                string("dsId", &r.ds_id),
                opt_date("startDate", r.start_date),
                opt_date("endDate", r.end_date),
                string("logMessage", &r.log_message),
            ],
            ManagementCall::GetNextPid(r) => vec![
                Argument::new("numPids", ArgumentValue::Integer(r.num_pids)),
                opt_string("namespace", &r.namespace),
            ],
            ManagementCall::AddRelationship(r) | ManagementCall::PurgeRelationship(r) => vec![
                string("pid", &r.pid),
                string("relationship", &r.relationship),
                string("object", &r.object),
                boolean("isLiteral", r.is_literal),
                opt_string("datatype", &r.datatype),
            ],
        }
    }

    /// Decode a journal entry's method name and arguments.
    pub fn from_arguments(method: &str, arguments: &[Argument]) -> Result<Self, ArgumentError> {
        let method = ManagementMethod::parse(method).ok_or_else(|| ArgumentError::UnknownMethod {
            method: method.to_string(),
        })?;
        let mut args = ArgumentReader::new(method, arguments);

        let call = match method {
            ManagementMethod::Ingest => ManagementCall::Ingest(Ingest {
                serialization: args.stream("serialization")?,
                log_message: args.string("logMessage")?,
                format: args.string("format")?,
                encoding: args.string("encoding")?,
                new_pid: args.boolean("newPid")?,
            }),
            ManagementMethod::ModifyObject => ManagementCall::ModifyObject(ModifyObject {
                pid: args.string("pid")?,
                state: args.opt_string("state")?,
                label: args.opt_string("label")?,
                owner_id: args.opt_string("ownerId")?,
                log_message: args.string("logMessage")?,
                last_modified: args.opt_date("lastModifiedDate")?,
            }),
            ManagementMethod::PurgeObject => ManagementCall::PurgeObject(PurgeObject {
                pid: args.string("pid")?,
                log_message: args.string("logMessage")?,
            }),
            ManagementMethod::AddDatastream => ManagementCall::AddDatastream(AddDatastream {
                pid: args.string("pid")?,
                ds_id: args.opt_string("dsId")?,
                alt_ids: args.strings("altIds")?,
                label: args.string("dsLabel")?,
                versionable: args.boolean("versionable")?,
                mime_type: args.string("mimeType")?,
                format_uri: args.opt_string("formatUri")?,
                location: args.string("location")?,
                control_group: args.string("controlGroup")?,
                state: args.string("dsState")?,
                checksum_type: args.opt_string("checksumType")?,
                checksum: args.opt_string("checksum")?,
                log_message: args.string("logMessage")?,
            }),
            ManagementMethod::ModifyDatastreamByReference => {
                ManagementCall::ModifyDatastreamByReference(ModifyDatastreamByReference {
                    pid: args.string("pid")?,
                    ds_id: args.string("dsId")?,
                    alt_ids: args.strings("altIds")?,
                    label: args.opt_string("dsLabel")?,
                    mime_type: args.opt_string("mimeType")?,
                    format_uri: args.opt_string("formatUri")?,
                    location: args.opt_string("location")?,
                    checksum_type: args.opt_string("checksumType")?,
                    checksum: args.opt_string("checksum")?,
                    log_message: args.string("logMessage")?,
                    last_modified: args.opt_date("lastModifiedDate")?,
                })
            }
            ManagementMethod::ModifyDatastreamByValue => {
                ManagementCall::ModifyDatastreamByValue(ModifyDatastreamByValue {
                    pid: args.string("pid")?,
                    ds_id: args.string("dsId")?,
                    alt_ids: args.strings("altIds")?,
                    label: args.opt_string("dsLabel")?,
                    mime_type: args.opt_string("mimeType")?,
                    format_uri: args.opt_string("formatUri")?,
                    content: args.opt_stream("content")?,
                    checksum_type: args.opt_string("checksumType")?,
                    checksum: args.opt_string("checksum")?,
                    log_message: args.string("logMessage")?,
                    last_modified: args.opt_date("lastModifiedDate")?,
                })
            }
            ManagementMethod::SetDatastreamState => {
                ManagementCall::SetDatastreamState(SetDatastreamState {
                    pid: args.string("pid")?,
                    ds_id: args.string("dsId")?,
                    state: args.string("dsState")?,
                    log_message: args.string("logMessage")?,
                })
            }
            ManagementMethod::SetDatastreamVersionable => {
                ManagementCall::SetDatastreamVersionable(SetDatastreamVersionable {
                    pid: args.string("pid")?,
                    ds_id: args.string("dsId")?,
                    versionable: args.boolean("versionable")?,
                    log_message: args.string("logMessage")?,
                })
            }
            ManagementMethod::PurgeDatastream => ManagementCall::PurgeDatastream(PurgeDatastream {
                pid: args.string("pid")?,
                ds_id: args.string("dsId")?,
                start_date: args.opt_date("startDate")?,
                end_date: args.opt_date("endDate")?,
                log_message: args.string("logMessage")?,
            }),
            ManagementMethod::GetNextPid => ManagementCall::GetNextPid(GetNextPid {
                num_pids: args.integer("numPids")?,
                namespace: args.opt_string("namespace")?,
            }),
            ManagementMethod::AddRelationship => {
                ManagementCall::AddRelationship(args.relationship()?)
            }
            ManagementMethod::PurgeRelationship => {
                ManagementCall::PurgeRelationship(args.relationship()?)
            }
        };

        args.finish()?;
        Ok(call)
    }

    /// Results of the live invocation that a replay has to reuse, as
    /// `(recovery key, values)` pairs.
    pub fn recovery_values(&self, outcome: &MethodOutcome) -> Vec<(&'static str, Vec<String>)> {
        match (self, outcome) {
            (ManagementCall::Ingest(_), MethodOutcome::Pid(pid)) => {
                vec![(recovery_keys::PID, vec![pid.clone()])]
            }
            (ManagementCall::AddDatastream(_), MethodOutcome::DatastreamId(ds_id)) => {
                vec![(recovery_keys::DATASTREAM_ID, vec![ds_id.clone()])]
            }
            (ManagementCall::GetNextPid(_), MethodOutcome::Pids(pids)) => {
                vec![(recovery_keys::PID_LIST, pids.clone())]
            }
            _ => Vec::new(),
        }
    }
}

// ── Argument encoding ───────────────────────────────────────────────

fn string(name: &str, value: &str) -> Argument {
    Argument::new(name, ArgumentValue::String(value.to_string()))
}

fn opt_string(name: &str, value: &Option<String>) -> Argument {
    match value {
        Some(v) => string(name, v),
        None => Argument::new(name, ArgumentValue::Null),
    }
}

fn strings(name: &str, values: &[String]) -> Argument {
    Argument::new(name, ArgumentValue::StringArray(values.to_vec()))
}

fn boolean(name: &str, value: bool) -> Argument {
    Argument::new(name, ArgumentValue::Boolean(value))
}

fn opt_date(name: &str, value: Option<DateTime<Utc>>) -> Argument {
    match value {
        Some(d) => Argument::new(name, ArgumentValue::date(d)),
        None => Argument::new(name, ArgumentValue::Null),
    }
}

fn stream(name: &str, bytes: &[u8]) -> Argument {
    Argument::new(name, ArgumentValue::Stream(bytes.to_vec()))
}

fn opt_stream(name: &str, bytes: &Option<Vec<u8>>) -> Argument {
    match bytes {
        Some(b) => stream(name, b),
        None => Argument::new(name, ArgumentValue::Null),
    }
}

// ── Argument decoding ───────────────────────────────────────────────

/// Positional, type-checked cursor over an entry's arguments.
struct ArgumentReader<'a> {
    method: ManagementMethod,
    args: slice::Iter<'a, Argument>,
}

impl<'a> ArgumentReader<'a> {
    fn new(method: ManagementMethod, arguments: &'a [Argument]) -> Self {
        Self {
            method,
            args: arguments.iter(),
        }
    }

    fn next(&mut self, name: &str) -> Result<&'a ArgumentValue, ArgumentError> {
        let arg = self.args.next().ok_or_else(|| ArgumentError::Missing {
            method: self.method.as_str().to_string(),
            name: name.to_string(),
        })?;
        if arg.name != name {
            return Err(ArgumentError::NameMismatch {
                method: self.method.as_str().to_string(),
                expected: name.to_string(),
                found: arg.name.clone(),
            });
        }
        Ok(&arg.value)
    }

    fn mismatch(&self, name: &str, expected: &str, found: &ArgumentValue) -> ArgumentError {
        ArgumentError::TypeMismatch {
            method: self.method.as_str().to_string(),
            name: name.to_string(),
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }

    fn string(&mut self, name: &str) -> Result<String, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::String(s) => Ok(s.clone()),
            other => Err(self.mismatch(name, "string", other)),
        }
    }

    fn opt_string(&mut self, name: &str) -> Result<Option<String>, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::Null => Ok(None),
            ArgumentValue::String(s) => Ok(Some(s.clone())),
            other => Err(self.mismatch(name, "string", other)),
        }
    }

    fn strings(&mut self, name: &str) -> Result<Vec<String>, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::Null => Ok(Vec::new()),
            ArgumentValue::StringArray(items) => Ok(items.clone()),
            other => Err(self.mismatch(name, "string-array", other)),
        }
    }

    fn boolean(&mut self, name: &str) -> Result<bool, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::Boolean(b) => Ok(*b),
            other => Err(self.mismatch(name, "boolean", other)),
        }
    }

    fn integer(&mut self, name: &str) -> Result<i64, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::Integer(i) => Ok(*i),
            other => Err(self.mismatch(name, "integer", other)),
        }
    }

    fn opt_date(&mut self, name: &str) -> Result<Option<DateTime<Utc>>, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::Null => Ok(None),
            ArgumentValue::Date(d) => Ok(Some(*d)),
            other => Err(self.mismatch(name, "date", other)),
        }
    }

    fn stream(&mut self, name: &str) -> Result<Vec<u8>, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::Stream(bytes) => Ok(bytes.clone()),
            other => Err(self.mismatch(name, "stream", other)),
        }
    }

    fn opt_stream(&mut self, name: &str) -> Result<Option<Vec<u8>>, ArgumentError> {
        match self.next(name)? {
            ArgumentValue::Null => Ok(None),
            ArgumentValue::Stream(bytes) => Ok(Some(bytes.clone())),
            other => Err(self.mismatch(name, "stream", other)),
        }
    }

    fn relationship(&mut self) -> Result<Relationship, ArgumentError> {
        Ok(Relationship {
            pid: self.string("pid")?,
            relationship: self.string("relationship")?,
            object: self.string("object")?,
            is_literal: self.boolean("isLiteral")?,
            datatype: self.opt_string("datatype")?,
        })
    }

    fn finish(mut self) -> Result<(), ArgumentError> {
        match self.args.next() {
            Some(extra) => Err(ArgumentError::Unexpected {
                method: self.method.as_str().to_string(),
                name: extra.name.clone(),
            }),
            None => Ok(()),
        }
    }
}
