//! Test doubles for the transfer layer
//!
//! - [`ScriptedClient`]: in-memory store whose failures are scripted per
//!   operation, per part index or per archive id
//! - [`RecordingObserver`]: keeps every event for later assertions

use crate::client::{
    ClientError, ClientResult, FailureKind, Operation, RemoteArchive, TransferClient,
    UploadSession,
};
use crate::engine::UploadState;
use crate::events::{TransferEvent, TransferObserver};
use frostline_core::PartRange;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// A call received by [`ScriptedClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `check_vault`
    CheckVault {
        /// Vault name
        vault: String,
    },
    /// `upload_single`
    UploadSingle {
        /// Vault name
        vault: String,
        /// Archive description
        description: String,
        /// Body length
        length: u64,
    },
    /// `initiate_multipart`
    InitiateMultipart {
        /// Vault name
        vault: String,
        /// Part size
        part_size: u64,
        /// Archive description
        description: String,
    },
    /// `upload_part`
    UploadPart {
        /// Session id
        session_id: String,
        /// Part index
        index: u64,
        /// Range start
        start: u64,
        /// Body length
        length: u64,
    },
    /// `complete_multipart`
    CompleteMultipart {
        /// Session id
        session_id: String,
        /// Declared total size
        total_size: u64,
        /// Whole-archive checksum
        checksum: String,
    },
    /// `delete_remote`
    DeleteRemote {
        /// Vault name
        vault: String,
        /// Archive id
        archive_id: String,
    },
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    failures: HashMap<Operation, VecDeque<FailureKind>>,
    always_fail: HashMap<Operation, FailureKind>,
    part_failures: HashMap<u64, VecDeque<FailureKind>>,
    delete_failures: HashSet<String>,
    archives: BTreeMap<String, Vec<u8>>,
    sessions: HashMap<String, BTreeMap<u64, Vec<u8>>>,
    deleted: Vec<String>,
    next_id: u64,
}

/// In-memory [`TransferClient`] with scriptable failures
#[derive(Default)]
pub struct ScriptedClient {
    state: Mutex<State>,
}

impl ScriptedClient {
    /// Create a client that succeeds on every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls of `operation` with `kind`
    pub fn fail_next(&self, operation: Operation, kind: FailureKind, times: usize) {
        let mut state = self.state.lock();
        let queue = state.failures.entry(operation).or_default();
        queue.extend(std::iter::repeat(kind).take(times));
    }

    /// Fail every call of `operation` with `kind`
    pub fn fail_always(&self, operation: Operation, kind: FailureKind) {
        self.state.lock().always_fail.insert(operation, kind);
    }

    /// Fail the next `times` uploads of part `index` with `kind`
    pub fn fail_part(&self, index: u64, kind: FailureKind, times: usize) {
        let mut state = self.state.lock();
        let queue = state.part_failures.entry(index).or_default();
        queue.extend(std::iter::repeat(kind).take(times));
    }

    /// Fail every deletion of `archive_id` fatally
    pub fn fail_delete_of(&self, archive_id: impl Into<String>) {
        self.state.lock().delete_failures.insert(archive_id.into());
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of calls of the given operation
    pub fn count(&self, operation: Operation) -> usize {
        self.calls()
            .iter()
            .filter(|call| call_operation(call) == operation)
            .count()
    }

    /// Contents of a stored archive
    pub fn archive(&self, archive_id: &str) -> Option<Vec<u8>> {
        self.state.lock().archives.get(archive_id).cloned()
    }

    /// Number of stored archives
    pub fn archive_count(&self) -> usize {
        self.state.lock().archives.len()
    }

    /// Archive ids deleted so far, in order
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    fn scripted_failure(state: &mut State, operation: Operation) -> Option<ClientError> {
        let kind = match state.failures.get_mut(&operation).and_then(|q| q.pop_front()) {
            Some(kind) => Some(kind),
            None => state.always_fail.get(&operation).copied(),
        };
        kind.map(|kind| ClientError {
            kind,
            operation,
            message: "scripted failure".to_string(),
        })
    }

    fn store(state: &mut State, vault: &str, data: Vec<u8>) -> RemoteArchive {
        state.next_id += 1;
        let archive_id = format!("archive-{}", state.next_id);
        state.archives.insert(archive_id.clone(), data);
        RemoteArchive {
            location: format!("/{}/archives/{}", vault, archive_id),
            archive_id,
        }
    }
}

fn call_operation(call: &Call) -> Operation {
    match call {
        Call::CheckVault { .. } => Operation::CheckVault,
        Call::UploadSingle { .. } => Operation::UploadSingle,
        Call::InitiateMultipart { .. } => Operation::InitiateMultipart,
        Call::UploadPart { .. } => Operation::UploadPart,
        Call::CompleteMultipart { .. } => Operation::CompleteMultipart,
        Call::DeleteRemote { .. } => Operation::DeleteRemote,
    }
}

impl TransferClient for ScriptedClient {
    fn check_vault(&self, vault: &str) -> ClientResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::CheckVault {
            vault: vault.to_string(),
        });
        match Self::scripted_failure(&mut state, Operation::CheckVault) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn upload_single(
        &self,
        vault: &str,
        description: &str,
        body: &[u8],
    ) -> ClientResult<RemoteArchive> {
        let mut state = self.state.lock();
        state.calls.push(Call::UploadSingle {
            vault: vault.to_string(),
            description: description.to_string(),
            length: body.len() as u64,
        });
        if let Some(e) = Self::scripted_failure(&mut state, Operation::UploadSingle) {
            return Err(e);
        }
        Ok(Self::store(&mut state, vault, body.to_vec()))
    }

    fn initiate_multipart(
        &self,
        vault: &str,
        part_size: u64,
        description: &str,
    ) -> ClientResult<UploadSession> {
        let mut state = self.state.lock();
        state.calls.push(Call::InitiateMultipart {
            vault: vault.to_string(),
            part_size,
            description: description.to_string(),
        });
        if let Some(e) = Self::scripted_failure(&mut state, Operation::InitiateMultipart) {
            return Err(e);
        }
        state.next_id += 1;
        let session_id = format!("session-{}", state.next_id);
        state.sessions.insert(session_id.clone(), BTreeMap::new());
        Ok(UploadSession {
            session_id,
            vault: vault.to_string(),
            part_size,
        })
    }

    fn upload_part(
        &self,
        session: &UploadSession,
        range: &PartRange,
        body: &[u8],
        _checksum: &str,
    ) -> ClientResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::UploadPart {
            session_id: session.session_id.clone(),
            index: range.index,
            start: range.start,
            length: body.len() as u64,
        });
        let part_failure = state
            .part_failures
            .get_mut(&range.index)
            .and_then(|q| q.pop_front());
        if let Some(kind) = part_failure {
            return Err(ClientError {
                kind,
                operation: Operation::UploadPart,
                message: format!("scripted failure of part {}", range.index),
            });
        }
        if let Some(e) = Self::scripted_failure(&mut state, Operation::UploadPart) {
            return Err(e);
        }
        match state.sessions.get_mut(&session.session_id) {
            Some(parts) => {
                parts.insert(range.start, body.to_vec());
                Ok(())
            }
            None => Err(ClientError::fatal(Operation::UploadPart, "unknown session")),
        }
    }

    fn complete_multipart(
        &self,
        session: &UploadSession,
        total_size: u64,
        checksum: &str,
    ) -> ClientResult<RemoteArchive> {
        let mut state = self.state.lock();
        state.calls.push(Call::CompleteMultipart {
            session_id: session.session_id.clone(),
            total_size,
            checksum: checksum.to_string(),
        });
        if let Some(e) = Self::scripted_failure(&mut state, Operation::CompleteMultipart) {
            return Err(e);
        }
        let parts = match state.sessions.remove(&session.session_id) {
            Some(parts) => parts,
            None => {
                return Err(ClientError::fatal(
                    Operation::CompleteMultipart,
                    "unknown session",
                ))
            }
        };
        let data: Vec<u8> = parts.into_values().flatten().collect();
        Ok(Self::store(&mut state, &session.vault, data))
    }

    fn delete_remote(&self, vault: &str, archive_id: &str) -> ClientResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::DeleteRemote {
            vault: vault.to_string(),
            archive_id: archive_id.to_string(),
        });
        if state.delete_failures.contains(archive_id) {
            return Err(ClientError::fatal(
                Operation::DeleteRemote,
                format!("scripted failure deleting {}", archive_id),
            ));
        }
        if let Some(e) = Self::scripted_failure(&mut state, Operation::DeleteRemote) {
            return Err(e);
        }
        state.archives.remove(archive_id);
        state.deleted.push(archive_id.to_string());
        Ok(())
    }
}

/// Observer that records every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TransferEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().clone()
    }

    /// State transitions recorded so far, in order
    pub fn states(&self) -> Vec<UploadState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TransferEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl TransferObserver for RecordingObserver {
    fn on_event(&self, event: &TransferEvent) {
        self.events.lock().push(event.clone());
    }
}
