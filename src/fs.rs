//! Low-level filesystem access
//!
//! Directory enumeration goes through the raw dirent stream so the
//! entry-type byte comes back without a per-entry stat; that byte is the
//! whole reason the walk stays cheap on network filesystems. Metadata is
//! a thin `lstat` wrapper. Both keep `nix` errnos at this boundary so
//! callers can decide what is recoverable.

use nix::dir::{Dir, Type};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::{lstat, Mode, SFlag};

/// Entry kind derived from the dirent type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `DT_DIR`
    Dir,
    /// `DT_REG`
    File,
    /// Symlinks, sockets, fifos, devices
    Other,
    /// `DT_UNKNOWN` - the filesystem did not fill in a type
    Unknown,
}

/// One directory entry as enumerated, before any stat.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Metadata subset the counter needs, from `lstat`.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub size: u64,
    pub uid: u32,
    pub inode: u64,
    pub nlink: u64,
    pub is_dir: bool,
}

/// An open directory stream. The handle closes on drop, so every exit
/// path (including an early return from the consumer) releases it.
#[derive(Debug)]
pub struct DirStream {
    dir: Dir,
}

impl DirStream {
    /// Open a directory for enumeration.
    pub fn open(path: &str) -> Result<Self, Errno> {
        let dir = Dir::open(
            path,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )?;
        Ok(Self { dir })
    }

    /// Lazily iterate the entries, skipping `.` and `..`.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries {
            inner: self.dir.iter(),
        }
    }
}

/// Iterator adapter over the raw dirent stream.
pub struct Entries<'d> {
    inner: nix::dir::Iter<'d>,
}

impl Iterator for Entries<'_> {
    type Item = Result<DirEntry, Errno>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };

            let raw = entry.file_name().to_bytes();
            if raw == b"." || raw == b".." {
                continue;
            }

            let kind = match entry.file_type() {
                Some(Type::Directory) => EntryKind::Dir,
                Some(Type::File) => EntryKind::File,
                Some(_) => EntryKind::Other,
                None => EntryKind::Unknown,
            };

            let name = String::from_utf8_lossy(raw).into_owned();
            return Some(Ok(DirEntry { name, kind }));
        }
    }
}

/// `lstat` a path into the metadata subset the counter uses.
pub fn lstat_meta(path: &str) -> Result<FileMeta, Errno> {
    let st = lstat(path)?;
    Ok(FileMeta {
        size: st.st_size as u64,
        uid: st.st_uid,
        inode: st.st_ino,
        nlink: st.st_nlink as u64,
        is_dir: st.st_mode & SFlag::S_IFMT.bits() == SFlag::S_IFDIR.bits(),
    })
}

/// Errnos the walk survives: the entry is logged and skipped.
pub fn recoverable(errno: Errno) -> bool {
    matches!(errno, Errno::EACCES | Errno::ENOENT)
}

/// Join a directory path and a child name the way paths print in the
/// report (no trailing-slash doubling).
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
