//! Byte source/sink behind a transfer
//!
//! A transfer only ever sees a [`Read`] (when sending) or a [`Write`] (when
//! receiving). Dropping the handle closes it.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use super::error::StorageError;

/// Handle a sending transfer reads blocks from
pub type Source = Box<dyn Read + Send>;
/// Handle a receiving transfer writes blocks to
pub type Sink = Box<dyn Write + Send>;

/// Opens named files for a transfer
pub trait Storage: Send + Sync {
    /// Open `name`, the raw filename of a read request
    fn open_read(&self, name: &[u8]) -> Result<Source, StorageError>;

    /// Open `name`, the raw filename of a write request
    fn open_write(&self, name: &[u8]) -> Result<Sink, StorageError>;
}

/// Files under a pair of root directories
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    send_directory: PathBuf,
    receive_directory: PathBuf,
    read_only: bool,
    overwrite: bool,
}

impl DirectoryStorage {
    pub fn new(send_directory: PathBuf, receive_directory: PathBuf) -> Self {
        Self {
            send_directory,
            receive_directory,
            read_only: false,
            overwrite: true,
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Resolve a requested filename below `root`.
    ///
    /// Leading slashes are ignored; every remaining component must be a plain name.
    fn resolve(root: &Path, name: &[u8]) -> Result<PathBuf, StorageError> {
        let start = name.iter().position(|&b| b != b'/').unwrap_or(name.len());
        let relative = wire_path(&name[start..]).ok_or(StorageError::AccessViolation)?;
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::AccessViolation);
        }
        Ok(root.join(relative))
    }
}

/// Filename bytes as a path, verbatim
#[cfg(unix)]
fn wire_path(name: &[u8]) -> Option<&Path> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Some(Path::new(OsStr::from_bytes(name)))
}

/// Filename bytes as a path; names that are not UTF-8 cannot be represented
#[cfg(not(unix))]
fn wire_path(name: &[u8]) -> Option<&Path> {
    std::str::from_utf8(name).ok().map(Path::new)
}

impl Storage for DirectoryStorage {
    fn open_read(&self, name: &[u8]) -> Result<Source, StorageError> {
        let path = Self::resolve(&self.send_directory, name)?;
        if !path.is_file() {
            return Err(StorageError::NotFound);
        }
        let file = File::open(&path)?;
        log::debug!("Opened {} for reading", path.display());
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, name: &[u8]) -> Result<Sink, StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let path = Self::resolve(&self.receive_directory, name)?;

        let mut options = OpenOptions::new();
        options.write(true);
        if self.overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let file = options.open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists,
            io::ErrorKind::NotFound => StorageError::AccessViolation,
            _ => StorageError::Io(e),
        })?;
        log::debug!("Opened {} for writing", path.display());
        Ok(Box::new(BufWriter::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_files_under_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let storage = DirectoryStorage::new(dir.path().into(), dir.path().into());

        let mut content = Vec::new();
        storage
            .open_read(b"/a.txt")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"hello");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path().into(), dir.path().into());
        assert!(matches!(
            storage.open_read(b"nope"),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path().into(), dir.path().into());
        for name in ["../etc/passwd", "a/../../b", "", "/", "./x"] {
            assert!(
                matches!(
                    storage.open_read(name.as_bytes()),
                    Err(StorageError::AccessViolation)
                ),
                "{name}"
            );
            assert!(
                matches!(
                    storage.open_write(name.as_bytes()),
                    Err(StorageError::AccessViolation)
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let storage =
            DirectoryStorage::new(dir.path().into(), dir.path().into()).with_read_only(true);
        assert!(matches!(
            storage.open_write(b"new.bin"),
            Err(StorageError::ReadOnly)
        ));
    }

    #[test]
    fn overwrite_policy() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("x"), b"old").unwrap();

        let keep = DirectoryStorage::new(dir.path().into(), dir.path().into()).with_overwrite(false);
        assert!(matches!(
            keep.open_write(b"x"),
            Err(StorageError::AlreadyExists)
        ));

        let replace = DirectoryStorage::new(dir.path().into(), dir.path().into());
        let mut sink = replace.open_write(b"x").unwrap();
        sink.write_all(b"new").unwrap();
        sink.flush().unwrap();
        drop(sink);
        assert_eq!(std::fs::read(dir.path().join("x")).unwrap(), b"new");
    }

    #[test]
    fn writes_go_to_receive_directory() {
        let send = tempdir().unwrap();
        let receive = tempdir().unwrap();
        let storage = DirectoryStorage::new(send.path().into(), receive.path().into());

        let mut sink = storage.open_write(b"up.bin").unwrap();
        sink.write_all(b"data").unwrap();
        sink.flush().unwrap();
        drop(sink);

        assert!(receive.path().join("up.bin").exists());
        assert!(!send.path().join("up.bin").exists());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_open_the_exact_file() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let name = b"caf\xe9.bin";
        std::fs::write(dir.path().join(OsStr::from_bytes(name)), b"latin-1").unwrap();
        std::fs::write(dir.path().join("caf\u{fffd}.bin"), b"replaced").unwrap();
        let storage = DirectoryStorage::new(dir.path().into(), dir.path().into());

        let mut content = Vec::new();
        storage
            .open_read(name)
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"latin-1");
    }
}
