//! Invocation context types
//!
//! A `Context` captures who invoked a management method, from where, and
//! against what, as multi-valued attribute maps partitioned into namespaces.
//! The `recovery` namespace carries results of the live invocation that a
//! replay must reproduce (for example the PID an ingest assigned).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::truncate_to_millis;

/// Attribute namespace within a `Context`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Environment,
    Subject,
    Action,
    Resource,
    Recovery,
}

impl Namespace {
    /// All namespaces, in the order they are serialized.
    pub const ALL: [Namespace; 5] = [
        Namespace::Environment,
        Namespace::Subject,
        Namespace::Action,
        Namespace::Resource,
        Namespace::Recovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Environment => "environment",
            Namespace::Subject => "subject",
            Namespace::Action => "action",
            Namespace::Resource => "resource",
            Namespace::Recovery => "recovery",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.as_str() == name)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known keys of the `recovery` namespace.
pub mod recovery_keys {
    /// PID assigned by `ingest`.
    pub const PID: &str = "pid";
    /// Datastream ID assigned by `addDatastream`.
    pub const DATASTREAM_ID: &str = "dsId";
    /// PIDs handed out by `getNextPID`.
    pub const PID_LIST: &str = "pidList";
}

/// Insertion-ordered map from attribute name to its values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiValueMap(IndexMap<String, Vec<String>>);

impl MultiValueMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Replace all values of `key`. A new key goes to the end.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    /// Append one value to `key`, creating it if absent.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// First value of `key`, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The context a management method was invoked in.
///
/// `now` is truncated to milliseconds on construction. The password is kept
/// in the clear in memory; it is only ciphered when serialized, and is left
/// out of `Debug` and `Serialize` output.
#[derive(Clone, PartialEq, Serialize)]
pub struct Context {
    environment: MultiValueMap,
    subject: MultiValueMap,
    action: MultiValueMap,
    resource: MultiValueMap,
    recovery: MultiValueMap,
    now: DateTime<Utc>,
    #[serde(skip)]
    password: String,
    no_op: bool,
}

impl Context {
    /// Create an empty context for an invocation happening at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            environment: MultiValueMap::new(),
            subject: MultiValueMap::new(),
            action: MultiValueMap::new(),
            resource: MultiValueMap::new(),
            recovery: MultiValueMap::new(),
            now: truncate_to_millis(now),
            password: String::new(),
            no_op: false,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_no_op(mut self, no_op: bool) -> Self {
        self.no_op = no_op;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_no_op(&self) -> bool {
        self.no_op
    }

    pub fn attributes(&self, namespace: Namespace) -> &MultiValueMap {
        match namespace {
            Namespace::Environment => &self.environment,
            Namespace::Subject => &self.subject,
            Namespace::Action => &self.action,
            Namespace::Resource => &self.resource,
            Namespace::Recovery => &self.recovery,
        }
    }

    pub fn attributes_mut(&mut self, namespace: Namespace) -> &mut MultiValueMap {
        match namespace {
            Namespace::Environment => &mut self.environment,
            Namespace::Subject => &mut self.subject,
            Namespace::Action => &mut self.action,
            Namespace::Resource => &mut self.resource,
            Namespace::Recovery => &mut self.recovery,
        }
    }

    /// Builder-style single attribute append.
    pub fn with_attribute(
        mut self,
        namespace: Namespace,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes_mut(namespace).add(key, value);
        self
    }

    /// First recovery value stored under `key`.
    pub fn recovery_value(&self, key: &str) -> Option<&str> {
        self.recovery.first(key)
    }

    /// All recovery values stored under `key` (empty if none).
    pub fn recovery_values(&self, key: &str) -> &[String] {
        self.recovery.get(key).unwrap_or(&[])
    }

    pub fn set_recovery_values(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.recovery.set(key, values);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("environment", &self.environment)
            .field("subject", &self.subject)
            .field("action", &self.action)
            .field("resource", &self.resource)
            .field("recovery", &self.recovery)
            .field("now", &self.now)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("no_op", &self.no_op)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn test_namespace_round_trip_names() {
        for ns in Namespace::ALL {
            assert_eq!(Namespace::parse(ns.as_str()), Some(ns));
        }
        assert_eq!(Namespace::parse("policy"), None);
    }

    #[test]
    fn test_multi_value_map_preserves_insertion_order() {
        let mut map = MultiValueMap::new();
        map.add("zeta", "1");
        map.add("alpha", "2");
        map.add("zeta", "3");

        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(map.get("zeta").unwrap(), ["1".to_string(), "3".to_string()]);
        assert_eq!(map.first("alpha"), Some("2"));
    }

    #[test]
    fn test_multi_value_map_set_replaces() {
        let mut map = MultiValueMap::new();
        map.add("k", "old");
        map.set("k", vec!["new".into()]);
        assert_eq!(map.get("k").unwrap(), ["new".to_string()]);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_context_recovery_values() {
        let mut ctx = Context::new(now());
        assert_eq!(ctx.recovery_value(recovery_keys::PID), None);
        assert!(ctx.recovery_values(recovery_keys::PID_LIST).is_empty());

        ctx.set_recovery_values(recovery_keys::PID, vec!["demo:1".into()]);
        assert_eq!(ctx.recovery_value(recovery_keys::PID), Some("demo:1"));
    }

    #[test]
    fn test_context_now_is_truncated() {
        let ctx = Context::new(now() + chrono::Duration::microseconds(1_500));
        assert_eq!(ctx.now(), now() + chrono::Duration::milliseconds(1));
    }

    #[test]
    fn test_context_debug_redacts_password() {
        let ctx = Context::new(now()).with_password("hunter2");
        let debug = format!("{:?}", ctx);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_context_serialize_skips_password() {
        let ctx = Context::new(now())
            .with_password("hunter2")
            .with_attribute(Namespace::Subject, "loginId", "repoAdmin");
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("repoAdmin"));
    }
}
