//! File-permission audit of the node root.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Permission bits reserved for the owner.
pub const OWNER_PERMS_MASK: u32 = 0o700;

/// A file under the root grants access beyond its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionViolation {
    pub path: PathBuf,
    /// Permission bits only (`mode & 0o777`).
    pub mode: u32,
}

impl fmt::Display for PermissionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} has overly permissive file permissions, {}",
            self.path.display(),
            mode_string(self.mode)
        )
    }
}

impl std::error::Error for PermissionViolation {}

/// Walk `root` and fail on the first entry with any bit outside
/// [`OWNER_PERMS_MASK`]. The root itself is checked; symlinks are checked as
/// links and not followed. Traversal errors surface as [`AppError::Io`].
#[cfg(unix)]
pub fn check_file_permissions(root: &Path) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(std::io::Error::from)?;
        let metadata = entry.metadata().map_err(std::io::Error::from)?;
        let mode = metadata.permissions().mode() & 0o777;
        if mode & !OWNER_PERMS_MASK != 0 {
            return Err(PermissionViolation { path: entry.into_path(), mode }.into());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn check_file_permissions(_root: &Path) -> Result<(), AppError> {
    Ok(())
}

/// `0o644` → `-rw-r--r--`.
fn mode_string(mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push('-');
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
