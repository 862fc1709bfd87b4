//! Archive production
//!
//! Each selected directory is packed into a tar stream (zstd compressed by
//! default) in the temp directory, optionally encrypted with gpg. The file
//! lives only as long as the returned [`TempArchive`].

use crate::config::Compression;
use crate::discovery::BackupDirectory;
use crate::error::{ArchiveError, ArchiveResult};
use frostline_core::{ArchiveBlob, FileBlob};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tar::{Builder, Header, HeaderMode};
use tracing::{debug, warn};

/// Builds an archive for one directory
pub trait ArchiveProducer: Send + Sync {
    /// Produce the archive for `directory`, encrypted for `recipient` if set
    fn produce(
        &self,
        directory: &BackupDirectory,
        recipient: Option<&str>,
    ) -> ArchiveResult<TempArchive>;

    /// Confirm archives can be encrypted for `recipient`
    ///
    /// Called once per run, before any directory is archived.
    fn check_recipient(&self, _recipient: &str) -> ArchiveResult<()> {
        Ok(())
    }
}

/// Archive file that is removed when dropped
pub struct TempArchive {
    blob: FileBlob,
}

impl TempArchive {
    /// Take ownership of an existing file
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ArchiveError::Missing(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let blob = FileBlob::open(path, name).map_err(|e| ArchiveError::io(path, e))?;
        Ok(TempArchive { blob })
    }

    /// Location of the archive file
    pub fn path(&self) -> &Path {
        self.blob.path()
    }
}

impl ArchiveBlob for TempArchive {
    fn name(&self) -> &str {
        self.blob.name()
    }

    fn size(&self) -> u64 {
        self.blob.size()
    }

    fn read_range(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        self.blob.read_range(offset, length)
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        match fs::remove_file(self.blob.path()) {
            Ok(()) => debug!(path = %self.blob.path().display(), "Removed archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.blob.path().display(),
                error = %e,
                "Failed to remove archive"
            ),
        }
    }
}

/// tar + zstd producer with optional gpg encryption
#[derive(Debug, Clone)]
pub struct TarZstdProducer {
    temp_dir: PathBuf,
    compression: Compression,
    compression_level: i32,
    gpg_program: PathBuf,
}

impl TarZstdProducer {
    /// Stage archives in `temp_dir`
    pub fn new(temp_dir: impl Into<PathBuf>, compression: Compression, level: i32) -> Self {
        TarZstdProducer {
            temp_dir: temp_dir.into(),
            compression,
            compression_level: level,
            gpg_program: PathBuf::from("gpg"),
        }
    }

    /// Use a different gpg executable
    pub fn with_gpg_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.gpg_program = program.into();
        self
    }

    /// File the archive for `directory` is written to, before encryption
    pub fn archive_path(&self, directory: &BackupDirectory) -> PathBuf {
        let extension = match self.compression {
            Compression::Zstd => "tar.zst",
            Compression::None => "tar",
        };
        self.temp_dir
            .join(format!("{}.{}", directory.archive_name, extension))
    }

    fn write_tar(&self, directory: &BackupDirectory, path: &Path) -> ArchiveResult<()> {
        let partial = path.with_extension("partial");
        match self.write_tar_inner(directory, &partial) {
            Ok(()) => fs::rename(&partial, path).map_err(|e| ArchiveError::io(path, e)),
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    fn write_tar_inner(&self, directory: &BackupDirectory, path: &Path) -> ArchiveResult<()> {
        let file = File::create(path).map_err(|e| ArchiveError::io(path, e))?;
        let writer = BufWriter::new(file);

        let writer = match self.compression {
            Compression::Zstd => {
                let encoder = zstd::Encoder::new(writer, self.compression_level)
                    .map_err(|e| ArchiveError::io(path, e))?;
                append_directory(Builder::new(encoder), directory)?
                    .into_inner()
                    .map_err(|e| ArchiveError::io(path, e))?
                    .finish()
                    .map_err(|e| ArchiveError::io(path, e))?
            }
            Compression::None => append_directory(Builder::new(writer), directory)?
                .into_inner()
                .map_err(|e| ArchiveError::io(path, e))?,
        };
        writer
            .into_inner()
            .map_err(|e| ArchiveError::io(path, e.into_error()))?
            .sync_all()
            .map_err(|e| ArchiveError::io(path, e))
    }

    /// Look up `recipient` with `gpg --fingerprint`
    pub fn check_recipient_key(&self, recipient: &str) -> ArchiveResult<()> {
        let status = Command::new(&self.gpg_program)
            .arg("--batch")
            .arg("--fingerprint")
            .arg(recipient)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        let failure = |reason: String| ArchiveError::UnknownRecipient {
            recipient: recipient.to_string(),
            reason,
        };
        match status {
            Ok(status) if status.success() => {
                debug!(recipient, "Encryption key found");
                Ok(())
            }
            Ok(status) => Err(failure(status.to_string())),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    fn encrypt(&self, plaintext: &Path, recipient: &str) -> ArchiveResult<PathBuf> {
        let mut encrypted = plaintext.as_os_str().to_owned();
        encrypted.push(".gpg");
        let encrypted = PathBuf::from(encrypted);

        let status = Command::new(&self.gpg_program)
            .arg("--batch")
            .arg("--yes")
            .arg("--encrypt")
            .arg("--recipient")
            .arg(recipient)
            .arg("--output")
            .arg(&encrypted)
            .arg(plaintext)
            .stdin(Stdio::null())
            .status();
        let _ = fs::remove_file(plaintext);

        let failure = |reason: String| ArchiveError::Encryption {
            recipient: recipient.to_string(),
            reason,
        };
        match status {
            Ok(status) if status.success() => Ok(encrypted),
            Ok(status) => {
                let _ = fs::remove_file(&encrypted);
                Err(failure(status.to_string()))
            }
            Err(e) => Err(failure(e.to_string())),
        }
    }
}

fn append_directory<W: Write>(
    mut builder: Builder<W>,
    directory: &BackupDirectory,
) -> ArchiveResult<Builder<W>> {
    let mut pending = vec![(directory.path.clone(), PathBuf::from(&directory.name))];
    while let Some((source, name)) = pending.pop() {
        let is_root = source == directory.path;
        match append_entry(&mut builder, &source, &name) {
            Ok(children) => {
                // Reversed so entries come off the stack in sorted order.
                pending.extend(children.into_iter().rev());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !is_root => {
                warn!(path = %source.display(), "File vanished while archiving, skipped");
            }
            Err(e) => return Err(ArchiveError::io(&source, e)),
        }
    }
    builder
        .finish()
        .map_err(|e| ArchiveError::io(&directory.path, e))?;
    Ok(builder)
}

/// Append one filesystem entry, returning the children of a directory
///
/// Regular files are written with the length taken from a single stat of
/// the open handle. A file that grows while being read is cut at that
/// length and one that shrinks is padded with zeros, so the entry always
/// matches its header.
fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    source: &Path,
    name: &Path,
) -> io::Result<Vec<(PathBuf, PathBuf)>> {
    let metadata = fs::symlink_metadata(source)?;
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&metadata, HeaderMode::Complete);

    if metadata.is_dir() {
        let mut children = Vec::new();
        for child in fs::read_dir(source)? {
            let child = child?;
            children.push((child.path(), name.join(child.file_name())));
        }
        children.sort();
        header.set_size(0);
        builder.append_data(&mut header, name, io::empty())?;
        Ok(children)
    } else if metadata.file_type().is_symlink() {
        let target = fs::read_link(source)?;
        header.set_size(0);
        builder.append_link(&mut header, name, target)?;
        Ok(Vec::new())
    } else if metadata.is_file() {
        let file = File::open(source)?;
        let metadata = file.metadata()?;
        header.set_metadata_in_mode(&metadata, HeaderMode::Complete);
        let len = metadata.len();
        builder.append_data(&mut header, name, exact_len((&file).take(len), len))?;

        let now = file.metadata().map(|m| m.len()).unwrap_or(len);
        if now != len {
            warn!(
                path = %source.display(),
                archived = len,
                current = now,
                "File changed size while archiving"
            );
        }
        Ok(Vec::new())
    } else {
        debug!(path = %source.display(), "Skipping special file");
        Ok(Vec::new())
    }
}

/// Reader yielding exactly `len` bytes, zero filled past the end of `reader`
fn exact_len<R: Read>(reader: R, len: u64) -> impl Read {
    reader.chain(io::repeat(0)).take(len)
}

impl ArchiveProducer for TarZstdProducer {
    fn produce(
        &self,
        directory: &BackupDirectory,
        recipient: Option<&str>,
    ) -> ArchiveResult<TempArchive> {
        let path = self.archive_path(directory);
        self.write_tar(directory, &path)?;
        debug!(
            directory = %directory.path.display(),
            archive = %path.display(),
            "Archive written"
        );

        let path = match recipient {
            Some(recipient) => self.encrypt(&path, recipient)?,
            None => path,
        };
        TempArchive::open(path)
    }

    fn check_recipient(&self, recipient: &str) -> ArchiveResult<()> {
        self.check_recipient_key(recipient)
    }
}
