//! Native filesystem access: lstat-based metadata, lchown, and the primitives
//! the materializer builds on.

use super::{EntryKind, LocalMetadata, MetadataAccessor};
use crate::index::timestamp;
use chrono::{DateTime, TimeZone, Utc};
use filetime::FileTime;
use std::fs::{File, Metadata};
use std::io;
use std::path::Path;

/// Accessor backed by the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeMetadata;

impl MetadataAccessor for NativeMetadata {
    fn read_local(&self, path: &Path) -> io::Result<Option<LocalMetadata>> {
        match std::fs::symlink_metadata(path) {
            Ok(metadata) => Ok(Some(summarize(&metadata))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::lchown(path, Some(uid), Some(gid))
        }

        #[cfg(not(unix))]
        {
            let _ = (path, uid, gid);
            Ok(())
        }
    }
}

fn entry_kind(metadata: &Metadata) -> EntryKind {
    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

pub fn summarize(metadata: &Metadata) -> LocalMetadata {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        let at = |secs: i64, nanos: i64| {
            timestamp::from_unix(secs, nanos.clamp(0, 999_999_999) as u32).unwrap_or_else(epoch)
        };
        LocalMetadata {
            kind: entry_kind(metadata),
            change_time: at(metadata.ctime(), metadata.ctime_nsec()),
            mod_time: at(metadata.mtime(), metadata.mtime_nsec()),
            access_time: at(metadata.atime(), metadata.atime_nsec()),
            mode: metadata.mode(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            len: metadata.len(),
        }
    }

    #[cfg(not(unix))]
    {
        let at = |time: io::Result<std::time::SystemTime>| {
            time.map(DateTime::<Utc>::from).unwrap_or_else(|_| epoch())
        };
        let mod_time = at(metadata.modified());
        let mode = if metadata.is_dir() {
            0o755
        } else if metadata.permissions().readonly() {
            0o444
        } else {
            0o644
        };
        LocalMetadata {
            kind: entry_kind(metadata),
            // No inode change time here; creation time is the closest signal.
            change_time: metadata.created().map(DateTime::<Utc>::from).unwrap_or(mod_time),
            mod_time,
            access_time: at(metadata.accessed()),
            mode,
            uid: 0,
            gid: 0,
            len: metadata.len(),
        }
    }
}

pub fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    #[cfg(windows)]
    {
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_readonly((mode & 0o200) == 0);
        std::fs::set_permissions(path, perms)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

/// Mode for a symlink itself. Unix has no portable lchmod and link
/// permissions are ignored there, so this only acts elsewhere.
pub fn apply_symlink_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        let _ = (path, mode);
        Ok(())
    }

    #[cfg(not(unix))]
    {
        apply_mode(path, mode)
    }
}

/// Create `dir` and any missing ancestors; new directories get `mode` when given.
pub fn create_dir_chain(dir: &Path, mode: Option<u32>) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        if let Some(mode) = mode {
            builder.mode(mode);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
    }
    builder.create(dir)
}

/// Set access and modification times without following a final symlink.
pub fn set_times<Tz: TimeZone>(
    path: &Path,
    access: &DateTime<Tz>,
    modified: &DateTime<Tz>,
) -> io::Result<()> {
    let to_filetime = |t: &DateTime<Tz>| FileTime::from_unix_time(t.timestamp(), t.timestamp_subsec_nanos());
    filetime::set_symlink_file_times(path, to_filetime(access), to_filetime(modified))
}

pub fn create_symlink(link_target: &Path, path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(link_target, path)
    }

    #[cfg(windows)]
    {
        match std::os::windows::fs::symlink_file(link_target, path) {
            Ok(()) => Ok(()),
            Err(file_err) => std::os::windows::fs::symlink_dir(link_target, path).map_err(|dir_err| {
                io::Error::new(
                    dir_err.kind(),
                    format!(
                        "failed to create symlink as file ({}) and directory ({})",
                        file_err, dir_err
                    ),
                )
            }),
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (link_target, path);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symlink creation is not supported on this platform",
        ))
    }
}

/// Write `buf` at `offset` without touching the file cursor where possible.
pub fn write_at(file: &File, offset: u64, buf: &[u8]) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.write_all_at(buf, offset)
    }

    #[cfg(not(unix))]
    {
        use std::io::{Seek, SeekFrom, Write};
        let mut handle = file;
        handle.seek(SeekFrom::Start(offset))?;
        handle.write_all(buf)
    }
}

/// Remove a file, symlink, or empty directory.
pub fn remove_entry(path: &Path, kind: EntryKind) -> io::Result<()> {
    match kind {
        EntryKind::Directory => std::fs::remove_dir(path),
        _ => std::fs::remove_file(path),
    }
}
