//! Key file import.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::app::Store;
use crate::app::local::create_owner_only_dir;
use crate::error::AppError;

/// Copy `src` into `keys_dir` and sync the directory into the store.
///
/// `keys_dir` is created owner-only when missing. The copy is made with mode
/// 0600 and keeps the source's file name; the source is left untouched. A
/// failed sync leaves the copied file in place.
pub fn import_key(keys_dir: &Path, store: &dyn Store, src: &Path) -> Result<PathBuf, AppError> {
    if !keys_dir.exists() {
        create_owner_only_dir(keys_dir).map_err(|e| {
            AppError::KeyImport(format!("cannot create {}: {e}", keys_dir.display()))
        })?;
    }

    let name = src
        .file_name()
        .ok_or_else(|| AppError::KeyImport(format!("{} does not name a file", src.display())))?;
    let dst = keys_dir.join(name);

    copy_file(src, &dst).map_err(|e| {
        AppError::KeyImport(format!("cannot copy {} to {}: {e}", src.display(), dst.display()))
    })?;

    store
        .sync_disk_keystore()
        .map_err(|e| AppError::KeyImport(format!("cannot sync key directory: {e}")))?;

    info!(src = %src.display(), dst = %dst.display(), "imported key");
    Ok(dst)
}

fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut from = File::open(src)?;
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut to = options.open(dst)?;
    io::copy(&mut from, &mut to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use tempfile::TempDir;

    fn source_file(tmp: &TempDir, len: usize) -> (PathBuf, Vec<u8>) {
        let bytes: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
        let path = tmp.path().join("UTC--2019-key.json");
        fs::write(&path, &bytes).unwrap();
        (path, bytes)
    }

    #[test]
    fn copies_bytes_and_syncs_once() {
        let tmp = TempDir::new().unwrap();
        let (src, bytes) = source_file(&tmp, 10 * 1024);
        let keys_dir = tmp.path().join("root").join("tempkeys");
        let store = MemoryStore::default();

        let dst = import_key(&keys_dir, &store, &src).unwrap();

        assert_eq!(dst, keys_dir.join("UTC--2019-key.json"));
        assert_eq!(fs::read(&dst).unwrap(), bytes);
        assert_eq!(fs::read(&src).unwrap(), bytes);
        assert_eq!(store.sync_calls(), 1);
    }

    #[test]
    fn failed_sync_keeps_copied_file() {
        let tmp = TempDir::new().unwrap();
        let (src, bytes) = source_file(&tmp, 512);
        let keys_dir = tmp.path().join("tempkeys");
        let store = MemoryStore::default();
        store.fail_sync();

        let err = import_key(&keys_dir, &store, &src).unwrap_err();

        assert!(matches!(err, AppError::KeyImport(_)));
        assert_eq!(fs::read(keys_dir.join("UTC--2019-key.json")).unwrap(), bytes);
        assert_eq!(store.sync_calls(), 1);
    }

    #[test]
    fn missing_source_does_not_sync() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryStore::default();
        let err = import_key(&tmp.path().join("tempkeys"), &store, &tmp.path().join("absent.json"))
            .unwrap_err();
        assert!(err.to_string().contains("cannot copy"));
        assert_eq!(store.sync_calls(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn created_paths_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let (src, _) = source_file(&tmp, 64);
        let keys_dir = tmp.path().join("tempkeys");
        let dst = import_key(&keys_dir, &MemoryStore::default(), &src).unwrap();

        let dir_mode = fs::metadata(&keys_dir).unwrap().permissions().mode();
        let file_mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }
}
