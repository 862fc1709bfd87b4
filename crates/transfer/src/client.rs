//! Remote archival store capability
//!
//! The transfer engine depends only on [`TransferClient`]. Adapters over a
//! real store are responsible for mapping their own error taxonomy into the
//! two [`FailureKind`]s; nothing vendor-specific crosses this boundary.

use frostline_core::PartRange;
use std::fmt;
use thiserror::Error;

/// Result type alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Retry eligibility of a failed client call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Network or service condition; the same call may succeed later
    Transient,
    /// Malformed request, authorization or missing resource; never retried
    Fatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Client operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Single-shot upload
    UploadSingle,
    /// Multi-part session creation
    InitiateMultipart,
    /// Upload of one part
    UploadPart,
    /// Multi-part session completion
    CompleteMultipart,
    /// Archive deletion
    DeleteRemote,
    /// Vault preflight
    CheckVault,
}

impl Operation {
    /// Stable snake_case name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::UploadSingle => "upload_single",
            Operation::InitiateMultipart => "initiate_multipart",
            Operation::UploadPart => "upload_part",
            Operation::CompleteMultipart => "complete_multipart",
            Operation::DeleteRemote => "delete_remote",
            Operation::CheckVault => "check_vault",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Classified failure of a client call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed ({kind}): {message}")]
pub struct ClientError {
    /// Retry classification
    pub kind: FailureKind,
    /// Operation that failed
    pub operation: Operation,
    /// Store-provided detail
    pub message: String,
}

impl ClientError {
    /// Create a transient error
    pub fn transient(operation: Operation, message: impl Into<String>) -> Self {
        ClientError {
            kind: FailureKind::Transient,
            operation,
            message: message.into(),
        }
    }

    /// Create a fatal error
    pub fn fatal(operation: Operation, message: impl Into<String>) -> Self {
        ClientError {
            kind: FailureKind::Fatal,
            operation,
            message: message.into(),
        }
    }

    /// Whether the retry policy may try this call again
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Archive identity returned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArchive {
    /// Store-assigned archive id
    pub archive_id: String,
    /// Store-specific location string
    pub location: String,
}

/// Open multi-part upload
///
/// Lives only for the duration of one upload; abandoned sessions are left
/// to the store's own expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Store-assigned session id
    pub session_id: String,
    /// Vault the archive is being uploaded to
    pub vault: String,
    /// Part size agreed at initiation
    pub part_size: u64,
}

/// Operations required from a remote archival store
///
/// Implementations must be safe to share across threads; the engine calls
/// them sequentially.
pub trait TransferClient: Send + Sync {
    /// Verify the vault exists and is reachable
    fn check_vault(&self, vault: &str) -> ClientResult<()> {
        let _ = vault;
        Ok(())
    }

    /// Upload a whole archive in one request
    fn upload_single(&self, vault: &str, description: &str, body: &[u8])
        -> ClientResult<RemoteArchive>;

    /// Open a multi-part upload session
    fn initiate_multipart(
        &self,
        vault: &str,
        part_size: u64,
        description: &str,
    ) -> ClientResult<UploadSession>;

    /// Upload one part of an open session
    ///
    /// `checksum` is the tree hash of `body`; stores that validate parts
    /// compare against it.
    fn upload_part(
        &self,
        session: &UploadSession,
        range: &PartRange,
        body: &[u8],
        checksum: &str,
    ) -> ClientResult<()>;

    /// Finish a session, assembling the uploaded parts
    fn complete_multipart(
        &self,
        session: &UploadSession,
        total_size: u64,
        checksum: &str,
    ) -> ClientResult<RemoteArchive>;

    /// Delete an archive
    fn delete_remote(&self, vault: &str, archive_id: &str) -> ClientResult<()>;
}
