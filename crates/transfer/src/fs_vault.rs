//! Local directory vault
//!
//! A [`TransferClient`] over a directory tree, for offline targets such as a
//! mounted cold-storage drive:
//!
//! ```text
//! <root>/<vault>/archives/<archive-id>          completed archives
//! <root>/<vault>/uploads/<session-id>/part_size multi-part session metadata
//! <root>/<vault>/uploads/<session-id>/<start>.part
//! ```
//!
//! Archive and session ids are UUID v4 strings. Completed archives appear
//! atomically (temp file + rename). `io::ErrorKind`s are mapped into
//! transient and fatal failures in [`classify`] and nowhere else.

use crate::checksum::{tree_hash, TreeHasher};
use crate::client::{
    ClientError, ClientResult, Operation, RemoteArchive, TransferClient, UploadSession,
};
use frostline_core::PartRange;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const ARCHIVES_DIR: &str = "archives";
const UPLOADS_DIR: &str = "uploads";
const PART_SIZE_FILE: &str = "part_size";
const PART_SUFFIX: &str = ".part";

/// Map an I/O failure to a retry classification
///
/// Missing resources, permission problems and rejected input will not go
/// away on their own; everything else (interruptions, timeouts, a full
/// disk) may.
pub fn classify(operation: Operation, err: io::Error) -> ClientError {
    match err.kind() {
        io::ErrorKind::NotFound
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::AlreadyExists => ClientError::fatal(operation, err.to_string()),
        _ => ClientError::transient(operation, err.to_string()),
    }
}

/// Archival store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FsVault { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a vault if it does not exist yet
    pub fn create_vault(&self, vault: &str) -> io::Result<()> {
        validate_vault_name(vault)?;
        let dir = self.root.join(vault);
        fs::create_dir_all(dir.join(ARCHIVES_DIR))?;
        fs::create_dir_all(dir.join(UPLOADS_DIR))?;
        Ok(())
    }

    /// Path of a completed archive
    pub fn archive_path(&self, vault: &str, archive_id: &str) -> PathBuf {
        self.root.join(vault).join(ARCHIVES_DIR).join(archive_id)
    }

    /// Ids of all completed archives in a vault, sorted
    pub fn list_archives(&self, vault: &str) -> io::Result<Vec<String>> {
        let dir = self.vault_dir(vault)?.join(ARCHIVES_DIR);
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if Uuid::parse_str(&name).is_ok() {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Number of multi-part sessions that were opened and never completed
    pub fn open_sessions(&self, vault: &str) -> io::Result<usize> {
        let dir = self.vault_dir(vault)?.join(UPLOADS_DIR);
        Ok(fs::read_dir(dir)?.count())
    }

    fn vault_dir(&self, vault: &str) -> io::Result<PathBuf> {
        validate_vault_name(vault)?;
        let dir = self.root.join(vault);
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("vault {} not found", vault),
            ));
        }
        Ok(dir)
    }

    fn session_dir(&self, session: &UploadSession) -> io::Result<PathBuf> {
        validate_id(&session.session_id)?;
        let dir = self
            .vault_dir(&session.vault)?
            .join(UPLOADS_DIR)
            .join(&session.session_id);
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("upload session {} not found", session.session_id),
            ));
        }
        Ok(dir)
    }

    fn location(vault: &str, archive_id: &str) -> String {
        format!("/{}/{}/{}", vault, ARCHIVES_DIR, archive_id)
    }

    fn upload_single_inner(&self, vault: &str, description: &str, body: &[u8]) -> io::Result<RemoteArchive> {
        let archives = self.vault_dir(vault)?.join(ARCHIVES_DIR);
        let archive_id = Uuid::new_v4().to_string();
        write_atomically(&archives.join(&archive_id), |w| w.write_all(body))?;
        debug!(vault, archive_id = %archive_id, description, "Stored archive");
        Ok(RemoteArchive {
            location: Self::location(vault, &archive_id),
            archive_id,
        })
    }

    fn initiate_inner(&self, vault: &str, part_size: u64) -> io::Result<UploadSession> {
        let uploads = self.vault_dir(vault)?.join(UPLOADS_DIR);
        let session_id = Uuid::new_v4().to_string();
        let dir = uploads.join(&session_id);
        fs::create_dir(&dir)?;
        fs::write(dir.join(PART_SIZE_FILE), part_size.to_string())?;
        Ok(UploadSession {
            session_id,
            vault: vault.to_string(),
            part_size,
        })
    }

    fn upload_part_inner(
        &self,
        session: &UploadSession,
        range: &PartRange,
        body: &[u8],
        checksum: &str,
    ) -> io::Result<()> {
        let dir = self.session_dir(session)?;
        let part_size = read_part_size(&dir)?;

        if body.len() as u64 != range.length {
            return Err(invalid_input(format!(
                "part {} body is {} bytes, range declares {}",
                range.index,
                body.len(),
                range.length
            )));
        }
        if range.start % part_size != 0 || range.length > part_size || range.length == 0 {
            return Err(invalid_input(format!(
                "part {} range {}+{} does not fit part size {}",
                range.index, range.start, range.length, part_size
            )));
        }
        if tree_hash(body) != checksum {
            return Err(invalid_data(format!(
                "part {} checksum mismatch",
                range.index
            )));
        }

        let path = dir.join(format!("{:020}{}", range.start, PART_SUFFIX));
        write_atomically(&path, |w| w.write_all(body))
    }

    fn complete_inner(
        &self,
        session: &UploadSession,
        total_size: u64,
        checksum: &str,
    ) -> io::Result<RemoteArchive> {
        let dir = self.session_dir(session)?;
        let parts = list_parts(&dir)?;

        let mut expected_start = 0;
        for (start, path) in &parts {
            if *start != expected_start {
                return Err(invalid_input(format!(
                    "missing bytes {}..{} in session {}",
                    expected_start, start, session.session_id
                )));
            }
            expected_start += fs::metadata(path)?.len();
        }
        if expected_start != total_size {
            return Err(invalid_input(format!(
                "session {} holds {} bytes, completion declares {}",
                session.session_id, expected_start, total_size
            )));
        }

        let archives = self.vault_dir(&session.vault)?.join(ARCHIVES_DIR);
        let archive_id = Uuid::new_v4().to_string();
        let final_path = archives.join(&archive_id);
        let temp_path = archives.join(format!("{}.tmp", archive_id));

        let assembled = assemble(&parts, &temp_path).and_then(|digest| {
            if digest == checksum {
                Ok(())
            } else {
                Err(invalid_data(format!(
                    "archive checksum mismatch: expected {}, got {}",
                    checksum, digest
                )))
            }
        });
        if let Err(e) = assembled {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &final_path)?;
        fs::remove_dir_all(&dir)?;
        Ok(RemoteArchive {
            location: Self::location(&session.vault, &archive_id),
            archive_id,
        })
    }

    fn delete_inner(&self, vault: &str, archive_id: &str) -> io::Result<()> {
        validate_id(archive_id)?;
        let path = self.vault_dir(vault)?.join(ARCHIVES_DIR).join(archive_id);
        fs::remove_file(path)
    }
}

impl TransferClient for FsVault {
    fn check_vault(&self, vault: &str) -> ClientResult<()> {
        self.vault_dir(vault)
            .map(|_| ())
            .map_err(|e| classify(Operation::CheckVault, e))
    }

    fn upload_single(
        &self,
        vault: &str,
        description: &str,
        body: &[u8],
    ) -> ClientResult<RemoteArchive> {
        self.upload_single_inner(vault, description, body)
            .map_err(|e| classify(Operation::UploadSingle, e))
    }

    fn initiate_multipart(
        &self,
        vault: &str,
        part_size: u64,
        description: &str,
    ) -> ClientResult<UploadSession> {
        let session = self
            .initiate_inner(vault, part_size)
            .map_err(|e| classify(Operation::InitiateMultipart, e))?;
        debug!(vault, session_id = %session.session_id, description, "Opened upload session");
        Ok(session)
    }

    fn upload_part(
        &self,
        session: &UploadSession,
        range: &PartRange,
        body: &[u8],
        checksum: &str,
    ) -> ClientResult<()> {
        self.upload_part_inner(session, range, body, checksum)
            .map_err(|e| classify(Operation::UploadPart, e))
    }

    fn complete_multipart(
        &self,
        session: &UploadSession,
        total_size: u64,
        checksum: &str,
    ) -> ClientResult<RemoteArchive> {
        self.complete_inner(session, total_size, checksum)
            .map_err(|e| classify(Operation::CompleteMultipart, e))
    }

    fn delete_remote(&self, vault: &str, archive_id: &str) -> ClientResult<()> {
        self.delete_inner(vault, archive_id)
            .map_err(|e| classify(Operation::DeleteRemote, e))
    }
}

fn validate_vault_name(vault: &str) -> io::Result<()> {
    let valid = !vault.is_empty()
        && vault
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && vault != "."
        && vault != "..";
    if valid {
        Ok(())
    } else {
        Err(invalid_input(format!("invalid vault name: {:?}", vault)))
    }
}

fn validate_id(id: &str) -> io::Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| invalid_input(format!("invalid id: {:?}", id)))
}

fn invalid_input(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn read_part_size(session_dir: &Path) -> io::Result<u64> {
    let raw = fs::read_to_string(session_dir.join(PART_SIZE_FILE))?;
    raw.trim()
        .parse()
        .map_err(|_| invalid_data(format!("corrupt part size {:?}", raw)))
}

fn list_parts(session_dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut parts = Vec::new();
    for entry in fs::read_dir(session_dir)? {
        let path = entry?.path();
        let start = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(PART_SUFFIX))
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(start) = start {
            parts.push((start, path));
        }
    }
    parts.sort_by_key(|(start, _)| *start);
    Ok(parts)
}

/// Concatenate parts into `dest`, returning the tree hash of the result
fn assemble(parts: &[(u64, PathBuf)], dest: &Path) -> io::Result<String> {
    let mut hasher = TreeHasher::new();
    let mut writer = BufWriter::new(File::create(dest)?);
    let mut buf = vec![0u8; 64 * 1024];
    for (_, path) in parts {
        let mut part = File::open(path)?;
        loop {
            let n = part.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            writer.write_all(&buf[..n])?;
        }
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(hasher.finish())
}

fn write_atomically<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let temp_path = path.with_extension("tmp");
    let result = File::create(&temp_path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    });
    match result {
        Ok(()) => fs::rename(&temp_path, path),
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}
