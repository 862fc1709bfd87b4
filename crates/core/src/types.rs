//! Transfer receipts and lineage records

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Timestamp layout used for lineage `date` values
///
/// Fixed width with microseconds, in UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Identifier assigned by the remote store
    pub remote_id: String,
    /// Location of the archive on the remote store
    pub remote_location: String,
    /// Whether the multi-part protocol was used
    pub is_multi_part: bool,
    /// Archive size in bytes
    pub size_bytes: u64,
}

/// A lineage record that has not been written yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLineageEntry {
    /// Directory that was backed up
    pub source_directory: PathBuf,
    /// Remote archive identifier
    pub remote_archive_id: String,
    /// Vault the archive was uploaded to
    pub vault: String,
    /// Remote archive location
    pub remote_location: String,
    /// Encryption recipient id, if the archive was encrypted
    pub encryption_recipient: Option<String>,
    /// Whether the multi-part protocol was used
    pub is_multi_part: bool,
    /// Archive size in bytes
    pub size_bytes: u64,
}

impl NewLineageEntry {
    /// Build a record for an upload described by `receipt`
    pub fn from_receipt(
        source_directory: impl Into<PathBuf>,
        vault: impl Into<String>,
        encryption_recipient: Option<String>,
        receipt: &TransferReceipt,
    ) -> Self {
        NewLineageEntry {
            source_directory: source_directory.into(),
            remote_archive_id: receipt.remote_id.clone(),
            vault: vault.into(),
            remote_location: receipt.remote_location.clone(),
            encryption_recipient,
            is_multi_part: receipt.is_multi_part,
            size_bytes: receipt.size_bytes,
        }
    }
}

/// One recorded backup of a source directory
///
/// `deleted` is the only field that changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEntry {
    /// Ledger row id, increasing in insertion order
    pub id: i64,
    /// Directory that was backed up
    pub source_directory: PathBuf,
    /// Remote archive identifier
    pub remote_archive_id: String,
    /// Vault the archive was uploaded to
    pub vault: String,
    /// Remote archive location
    pub remote_location: String,
    /// Encryption recipient id, if the archive was encrypted
    pub encryption_recipient: Option<String>,
    /// Whether the multi-part protocol was used
    pub is_multi_part: bool,
    /// Archive size in bytes
    pub size_bytes: u64,
    /// Soft-delete flag
    pub deleted: bool,
    /// When the entry was appended (UTC)
    pub created_at: NaiveDateTime,
}

impl LineageEntry {
    /// Whether the archive was encrypted before upload
    pub fn encrypted(&self) -> bool {
        self.encryption_recipient.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> TransferReceipt {
        TransferReceipt {
            remote_id: "abc".to_string(),
            remote_location: "/vault/archives/abc".to_string(),
            is_multi_part: true,
            size_bytes: 300,
        }
    }

    #[test]
    fn test_new_entry_from_receipt() {
        let entry = NewLineageEntry::from_receipt("/data/photos", "vault", None, &receipt());
        assert_eq!(entry.remote_archive_id, "abc");
        assert_eq!(entry.remote_location, "/vault/archives/abc");
        assert_eq!(entry.source_directory, PathBuf::from("/data/photos"));
        assert!(entry.is_multi_part);
        assert_eq!(entry.size_bytes, 300);
    }

    #[test]
    fn test_timestamp_format_sorts_chronologically() {
        let a = NaiveDateTime::parse_from_str("2024-01-02 03:04:05.000001", TIMESTAMP_FORMAT)
            .unwrap();
        let b = NaiveDateTime::parse_from_str("2024-01-02 03:04:05.000010", TIMESTAMP_FORMAT)
            .unwrap();
        let (sa, sb) = (
            a.format(TIMESTAMP_FORMAT).to_string(),
            b.format(TIMESTAMP_FORMAT).to_string(),
        );
        assert!(sa < sb);
        assert_eq!(sa.len(), sb.len());
    }

    #[test]
    fn test_receipt_serializes() {
        let json = serde_json::to_string(&receipt()).unwrap();
        assert!(json.contains("\"remote_id\":\"abc\""));
    }
}
