//! Management Delegate — the repository capability behind journaled calls
//!
//! The embedding server supplies the delegate. Live calls reach it through
//! `JournalCreator`; recovery drives it with decoded journal entries.
//!
//! On replay the context carries the `recovery` values of the live call
//! (see `types::context::recovery_keys`). A delegate must reuse them, e.g.
//! ingest under the recorded PID instead of minting a new one, or the
//! rebuilt repository diverges from the original.

use chrono::{DateTime, Utc};
use types::context::{recovery_keys, Context};
use types::errors::ManagementError;
use types::method::{
    AddDatastream, GetNextPid, Ingest, ManagementCall, MethodOutcome, ModifyDatastreamByReference,
    ModifyDatastreamByValue, ModifyObject, PurgeDatastream, PurgeObject, Relationship,
    SetDatastreamState, SetDatastreamVersionable,
};

// ── Delegate Trait ──────────────────────────────────────────────────

/// One method per journaled management method.
pub trait ManagementDelegate {
    /// Marker identifying the repository, written to every journal header
    /// and checked before replay.
    fn repository_hash(&self) -> Result<String, ManagementError>;

    /// Returns the PID of the new object.
    fn ingest(&mut self, context: &Context, request: &Ingest) -> Result<String, ManagementError>;

    fn modify_object(
        &mut self,
        context: &Context,
        request: &ModifyObject,
    ) -> Result<DateTime<Utc>, ManagementError>;

    fn purge_object(
        &mut self,
        context: &Context,
        request: &PurgeObject,
    ) -> Result<DateTime<Utc>, ManagementError>;

    /// Returns the ID of the new datastream.
    fn add_datastream(
        &mut self,
        context: &Context,
        request: &AddDatastream,
    ) -> Result<String, ManagementError>;

    fn modify_datastream_by_reference(
        &mut self,
        context: &Context,
        request: &ModifyDatastreamByReference,
    ) -> Result<DateTime<Utc>, ManagementError>;

    fn modify_datastream_by_value(
        &mut self,
        context: &Context,
        request: &ModifyDatastreamByValue,
    ) -> Result<DateTime<Utc>, ManagementError>;

    fn set_datastream_state(
        &mut self,
        context: &Context,
        request: &SetDatastreamState,
    ) -> Result<DateTime<Utc>, ManagementError>;

    fn set_datastream_versionable(
        &mut self,
        context: &Context,
        request: &SetDatastreamVersionable,
    ) -> Result<DateTime<Utc>, ManagementError>;

    /// Returns the creation dates of the purged versions.
    fn purge_datastream(
        &mut self,
        context: &Context,
        request: &PurgeDatastream,
    ) -> Result<Vec<DateTime<Utc>>, ManagementError>;

    fn get_next_pid(
        &mut self,
        context: &Context,
        request: &GetNextPid,
    ) -> Result<Vec<String>, ManagementError>;

    /// Returns whether the relationship was added.
    fn add_relationship(
        &mut self,
        context: &Context,
        request: &Relationship,
    ) -> Result<bool, ManagementError>;

    /// Returns whether the relationship was removed.
    fn purge_relationship(
        &mut self,
        context: &Context,
        request: &Relationship,
    ) -> Result<bool, ManagementError>;
}

/// Dispatch a decoded call to the matching delegate method.
pub fn invoke<D: ManagementDelegate + ?Sized>(
    delegate: &mut D,
    context: &Context,
    call: &ManagementCall,
) -> Result<MethodOutcome, ManagementError> {
    let outcome = match call {
        ManagementCall::Ingest(r) => MethodOutcome::Pid(delegate.ingest(context, r)?),
        ManagementCall::ModifyObject(r) => {
            MethodOutcome::Timestamp(delegate.modify_object(context, r)?)
        }
        ManagementCall::PurgeObject(r) => MethodOutcome::Timestamp(delegate.purge_object(context, r)?),
        ManagementCall::AddDatastream(r) => {
            MethodOutcome::DatastreamId(delegate.add_datastream(context, r)?)
        }
        ManagementCall::ModifyDatastreamByReference(r) => {
            MethodOutcome::Timestamp(delegate.modify_datastream_by_reference(context, r)?)
        }
        ManagementCall::ModifyDatastreamByValue(r) => {
            MethodOutcome::Timestamp(delegate.modify_datastream_by_value(context, r)?)
        }
        ManagementCall::SetDatastreamState(r) => {
            MethodOutcome::Timestamp(delegate.set_datastream_state(context, r)?)
        }
        ManagementCall::SetDatastreamVersionable(r) => {
            MethodOutcome::Timestamp(delegate.set_datastream_versionable(context, r)?)
        }
        ManagementCall::PurgeDatastream(r) => {
            MethodOutcome::Timestamps(delegate.purge_datastream(context, r)?)
        }
        ManagementCall::GetNextPid(r) => MethodOutcome::Pids(delegate.get_next_pid(context, r)?),
        ManagementCall::AddRelationship(r) => MethodOutcome::Flag(delegate.add_relationship(context, r)?),
        ManagementCall::PurgeRelationship(r) => {
            MethodOutcome::Flag(delegate.purge_relationship(context, r)?)
        }
    };
    Ok(outcome)
}

// ── Recording Delegate ──────────────────────────────────────────────

/// One call seen by a `RecordingDelegate`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub context: Context,
    pub call: ManagementCall,
}

/// Delegate that accepts every call and only records it.
///
/// Used for dry-run replays. Outcomes reuse the context's recovery values
/// where present and are synthesized otherwise.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    repository_hash: String,
    calls: Vec<RecordedCall>,
    minted: u64,
}

impl RecordingDelegate {
    pub fn new(repository_hash: impl Into<String>) -> Self {
        Self {
            repository_hash: repository_hash.into(),
            calls: Vec::new(),
            minted: 0,
        }
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<RecordedCall> {
        self.calls
    }

    fn record(&mut self, context: &Context, call: ManagementCall) {
        self.calls.push(RecordedCall {
            context: context.clone(),
            call,
        });
    }

    fn mint(&mut self, prefix: &str) -> String {
        self.minted += 1;
        format!("{}:{}", prefix, self.minted)
    }
}

impl ManagementDelegate for RecordingDelegate {
    fn repository_hash(&self) -> Result<String, ManagementError> {
        Ok(self.repository_hash.clone())
    }

    fn ingest(&mut self, context: &Context, request: &Ingest) -> Result<String, ManagementError> {
        self.record(context, ManagementCall::Ingest(request.clone()));
        Ok(match context.recovery_value(recovery_keys::PID) {
            Some(pid) => pid.to_string(),
            None => self.mint("recorded"),
        })
    }

    fn modify_object(
        &mut self,
        context: &Context,
        request: &ModifyObject,
    ) -> Result<DateTime<Utc>, ManagementError> {
        self.record(context, ManagementCall::ModifyObject(request.clone()));
        Ok(context.now())
    }

    fn purge_object(
        &mut self,
        context: &Context,
        request: &PurgeObject,
    ) -> Result<DateTime<Utc>, ManagementError> {
        self.record(context, ManagementCall::PurgeObject(request.clone()));
        Ok(context.now())
    }

    fn add_datastream(
        &mut self,
        context: &Context,
        request: &AddDatastream,
    ) -> Result<String, ManagementError> {
        self.record(context, ManagementCall::AddDatastream(request.clone()));
        let recorded = context
            .recovery_value(recovery_keys::DATASTREAM_ID)
            .map(str::to_string)
            .or_else(|| request.ds_id.clone());
        Ok(match recorded {
            Some(ds_id) => ds_id,
            None => self.mint("DS"),
        })
    }

    fn modify_datastream_by_reference(
        &mut self,
        context: &Context,
        request: &ModifyDatastreamByReference,
    ) -> Result<DateTime<Utc>, ManagementError> {
        self.record(context, ManagementCall::ModifyDatastreamByReference(request.clone()));
        Ok(context.now())
    }

    fn modify_datastream_by_value(
        &mut self,
        context: &Context,
        request: &ModifyDatastreamByValue,
    ) -> Result<DateTime<Utc>, ManagementError> {
        self.record(context, ManagementCall::ModifyDatastreamByValue(request.clone()));
        Ok(context.now())
    }

    fn set_datastream_state(
        &mut self,
        context: &Context,
        request: &SetDatastreamState,
    ) -> Result<DateTime<Utc>, ManagementError> {
        self.record(context, ManagementCall::SetDatastreamState(request.clone()));
        Ok(context.now())
    }

    fn set_datastream_versionable(
        &mut self,
        context: &Context,
        request: &SetDatastreamVersionable,
    ) -> Result<DateTime<Utc>, ManagementError> {
        self.record(context, ManagementCall::SetDatastreamVersionable(request.clone()));
        Ok(context.now())
    }

    fn purge_datastream(
        &mut self,
        context: &Context,
        request: &PurgeDatastream,
    ) -> Result<Vec<DateTime<Utc>>, ManagementError> {
        self.record(context, ManagementCall::PurgeDatastream(request.clone()));
        Ok(vec![context.now()])
    }

    fn get_next_pid(
        &mut self,
        context: &Context,
        request: &GetNextPid,
    ) -> Result<Vec<String>, ManagementError> {
        self.record(context, ManagementCall::GetNextPid(request.clone()));
        let recorded = context.recovery_values(recovery_keys::PID_LIST);
        if !recorded.is_empty() {
            return Ok(recorded.to_vec());
        }
        let prefix = request.namespace.clone().unwrap_or_else(|| "recorded".to_string());
        Ok((0..request.num_pids.max(0)).map(|_| self.mint(&prefix)).collect())
    }

    fn add_relationship(
        &mut self,
        context: &Context,
        request: &Relationship,
    ) -> Result<bool, ManagementError> {
        self.record(context, ManagementCall::AddRelationship(request.clone()));
        Ok(true)
    }

    fn purge_relationship(
        &mut self,
        context: &Context,
        request: &Relationship,
    ) -> Result<bool, ManagementError> {
        self.record(context, ManagementCall::PurgeRelationship(request.clone()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> Context {
        Context::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    fn ingest() -> ManagementCall {
        ManagementCall::Ingest(Ingest {
            serialization: b"<object/>".to_vec(),
            log_message: "created".into(),
            format: "object-xml-1.0".into(),
            encoding: "UTF-8".into(),
            new_pid: true,
        })
    }

    #[test]
    fn test_invoke_dispatches_to_matching_method() {
        let mut delegate = RecordingDelegate::new("h");
        let purge = ManagementCall::PurgeObject(PurgeObject {
            pid: "demo:1".into(),
            log_message: "gone".into(),
        });

        let outcome = invoke(&mut delegate, &context(), &purge).unwrap();
        assert_eq!(outcome, MethodOutcome::Timestamp(context().now()));
        assert_eq!(delegate.calls().len(), 1);
        assert_eq!(delegate.calls()[0].call, purge);
    }

    #[test]
    fn test_recording_delegate_reuses_recovery_pid() {
        let mut delegate = RecordingDelegate::new("h");
        let mut ctx = context();
        ctx.set_recovery_values(recovery_keys::PID, vec!["demo:42".into()]);

        let outcome = invoke(&mut delegate, &ctx, &ingest()).unwrap();
        assert_eq!(outcome, MethodOutcome::Pid("demo:42".into()));
    }

    #[test]
    fn test_recording_delegate_mints_without_recovery_values() {
        let mut delegate = RecordingDelegate::new("h");
        let first = invoke(&mut delegate, &context(), &ingest()).unwrap();
        let second = invoke(&mut delegate, &context(), &ingest()).unwrap();
        assert_ne!(first, second);

        let pids = invoke(
            &mut delegate,
            &context(),
            &ManagementCall::GetNextPid(GetNextPid {
                num_pids: 3,
                namespace: Some("demo".into()),
            }),
        )
        .unwrap();
        match pids {
            MethodOutcome::Pids(pids) => {
                assert_eq!(pids.len(), 3);
                assert!(pids.iter().all(|p| p.starts_with("demo:")));
            }
            other => panic!("Expected Pids, got: {:?}", other),
        }
    }

    #[test]
    fn test_invoke_through_trait_object() {
        let mut delegate = RecordingDelegate::new("h");
        let dyn_delegate: &mut dyn ManagementDelegate = &mut delegate;
        assert_eq!(dyn_delegate.repository_hash().unwrap(), "h");
        invoke(dyn_delegate, &context(), &ingest()).unwrap();
        assert_eq!(delegate.into_calls().len(), 1);
    }
}
