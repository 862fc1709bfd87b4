//! Archive blobs
//!
//! An archive blob is an opaque, immutable byte sequence of known size with
//! a stable name. The transfer engine only ever reads byte ranges from it;
//! building the blob (tar, compression, encryption) happens elsewhere.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Read-only, randomly seekable archive contents
pub trait ArchiveBlob: Send + Sync {
    /// Stable archive name, used in descriptions and error messages
    fn name(&self) -> &str;

    /// Total size in bytes
    fn size(&self) -> u64;

    /// Read `length` bytes starting at `offset`
    ///
    /// Fails with `InvalidInput` if the range extends past `size()`.
    fn read_range(&self, offset: u64, length: u64) -> io::Result<Vec<u8>>;
}

fn check_range(size: u64, offset: u64, length: u64) -> io::Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "range {}+{} exceeds archive size {}",
                offset, length, size
            ),
        )),
    }
}

/// Archive blob backed by a file on disk
///
/// The size is captured when the blob is opened; the file must not be
/// modified while the blob is alive.
#[derive(Debug)]
pub struct FileBlob {
    name: String,
    path: PathBuf,
    size: u64,
    file: Mutex<File>,
}

impl FileBlob {
    /// Open `path` as a blob named `name`
    pub fn open(path: impl AsRef<Path>, name: impl Into<String>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(FileBlob {
            name: name.into(),
            path,
            size,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveBlob for FileBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        check_range(self.size, offset, length)?;

        let mut buf = vec![0u8; length as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Archive blob held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryBlob {
    name: String,
    data: Vec<u8>,
}

impl MemoryBlob {
    /// Wrap `data` as a blob named `name`
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        MemoryBlob {
            name: name.into(),
            data,
        }
    }
}

impl ArchiveBlob for MemoryBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        check_range(self.size(), offset, length)?;
        let start = offset as usize;
        Ok(self.data[start..start + length as usize].to_vec())
    }
}
