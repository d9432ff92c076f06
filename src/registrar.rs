//! Display handles for encoded images.
//!
//! A UI that previews an upload needs something it can point at, such as a
//! file path or URL, rather than a byte buffer. A [`ResourceRegistrar`] turns
//! bytes into such a [`DisplayHandle`] and revokes it again. Handles are
//! never created implicitly. Whoever asks for one owns it and releases it.
//!
//! [`TempFileRegistrar`] is the stock implementation: each handle is a
//! temporary file holding the bytes, addressed by a `file://` URI. Releasing
//! deletes the file; dropping the registrar deletes whatever is left.

use crate::naming::extension_for_mime;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempPath;
use thiserror::Error;
use tracing::debug;

/// Bytes that may not appear literally in a `file://` URI path.
const URI_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encoded `file://` URI for an absolute path.
pub fn file_uri(path: &Path) -> String {
    format!(
        "file://{}",
        utf8_percent_encode(&path.to_string_lossy(), URI_PATH)
    )
}

/// The path a `file://` URI points at, or `None` for other schemes.
pub fn path_from_file_uri(uri: &str) -> Option<PathBuf> {
    let encoded = uri.strip_prefix("file://")?;
    let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
    Some(PathBuf::from(decoded.into_owned()))
}

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque, revocable reference to displayable bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayHandle {
    pub id: u64,
    pub uri: String,
}

/// Trait for display-handle registrars.
pub trait ResourceRegistrar: Send + Sync {
    /// Register `bytes` and return a handle that stays valid until released.
    fn create(&self, bytes: &[u8], mime_type: &str) -> Result<DisplayHandle, RegistrarError>;

    /// Revoke a handle. Unknown or already released handles are ignored.
    fn release(&self, handle: &DisplayHandle);
}

/// Registrar that backs each handle with a temporary file.
#[derive(Debug)]
pub struct TempFileRegistrar {
    dir: Option<PathBuf>,
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, TempPath>>,
}

impl TempFileRegistrar {
    /// Place files in the system temp directory.
    pub fn new() -> Self {
        Self {
            dir: None,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Place files in `dir`, which must exist.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::new()
        }
    }

    /// Number of handles created and not yet released.
    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    // The map holds no invariant a panicking holder could break
    fn live(&self) -> MutexGuard<'_, HashMap<u64, TempPath>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TempFileRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistrar for TempFileRegistrar {
    fn create(&self, bytes: &[u8], mime_type: &str) -> Result<DisplayHandle, RegistrarError> {
        let suffix = format!(".{}", extension_for_mime(mime_type).unwrap_or("bin"));
        let mut builder = tempfile::Builder::new();
        builder.prefix("imgprep-").suffix(&suffix);
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;

        let path = file.into_temp_path();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = DisplayHandle {
            id,
            uri: file_uri(&path),
        };
        debug!(id, uri = %handle.uri, "registered display handle");

        self.live().insert(id, path);
        Ok(handle)
    }

    fn release(&self, handle: &DisplayHandle) {
        let removed = self.live().remove(&handle.id);
        if let Some(path) = removed {
            debug!(id = handle.id, "released display handle");
            // Deletion failure leaves a stray temp file; not worth surfacing
            let _ = path.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_of(handle: &DisplayHandle) -> PathBuf {
        path_from_file_uri(&handle.uri).unwrap()
    }

    #[test]
    fn create_writes_bytes_with_matching_extension() {
        let tmp = TempDir::new().unwrap();
        let registrar = TempFileRegistrar::in_dir(tmp.path());

        let handle = registrar.create(b"jpeg bytes", "image/jpeg").unwrap();
        let path = path_of(&handle);

        assert!(handle.uri.starts_with("file://"));
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");
        assert_eq!(registrar.live_count(), 1);
    }

    #[test]
    fn release_deletes_the_file() {
        let tmp = TempDir::new().unwrap();
        let registrar = TempFileRegistrar::in_dir(tmp.path());

        let handle = registrar.create(b"x", "image/png").unwrap();
        let path = path_of(&handle);
        registrar.release(&handle);

        assert!(!path.exists());
        assert_eq!(registrar.live_count(), 0);
    }

    #[test]
    fn release_is_idempotent_and_ignores_unknown_handles() {
        let tmp = TempDir::new().unwrap();
        let registrar = TempFileRegistrar::in_dir(tmp.path());

        let handle = registrar.create(b"x", "image/png").unwrap();
        registrar.release(&handle);
        registrar.release(&handle);
        registrar.release(&DisplayHandle {
            id: 999,
            uri: "file:///nowhere".into(),
        });
        assert_eq!(registrar.live_count(), 0);
    }

    #[test]
    fn handles_get_distinct_ids() {
        let tmp = TempDir::new().unwrap();
        let registrar = TempFileRegistrar::in_dir(tmp.path());

        let a = registrar.create(b"a", "image/png").unwrap();
        let b = registrar.create(b"b", "image/png").unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.uri, b.uri);
    }

    #[test]
    fn dropping_registrar_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let path = {
            let registrar = TempFileRegistrar::in_dir(tmp.path());
            let handle = registrar.create(b"x", "image/webp").unwrap();
            path_of(&handle)
        };
        assert!(!path.exists());
    }

    #[test]
    fn unknown_mime_gets_bin_extension() {
        let tmp = TempDir::new().unwrap();
        let registrar = TempFileRegistrar::in_dir(tmp.path());
        let handle = registrar.create(b"x", "application/x-thing").unwrap();
        assert_eq!(path_of(&handle).extension().unwrap(), "bin");
    }

    #[test]
    fn uri_escapes_spaces_and_hashes() {
        let tmp = tempfile::Builder::new()
            .prefix("upload preview #")
            .tempdir()
            .unwrap();
        let registrar = TempFileRegistrar::in_dir(tmp.path());

        let handle = registrar.create(b"png", "image/png").unwrap();
        assert!(!handle.uri.contains(' '));
        assert!(!handle.uri.contains('#'));
        assert!(handle.uri.contains("upload%20preview%20%23"));
        assert_eq!(std::fs::read(path_of(&handle)).unwrap(), b"png");
    }

    #[test]
    fn file_uri_round_trips() {
        let path = Path::new("/tmp/a b/100%/c?.jpg");
        let uri = file_uri(path);
        assert_eq!(uri, "file:///tmp/a%20b/100%25/c%3F.jpg");
        assert_eq!(path_from_file_uri(&uri).unwrap(), path);
        assert_eq!(path_from_file_uri("mem://1"), None);
    }

    #[test]
    fn poisoned_map_keeps_files_alive() {
        let tmp = TempDir::new().unwrap();
        let registrar = TempFileRegistrar::in_dir(tmp.path());
        let before = registrar.create(b"a", "image/png").unwrap();

        std::thread::scope(|s| {
            let holder = s.spawn(|| {
                let _guard = registrar.live.lock().unwrap();
                panic!("holder panicked");
            });
            assert!(holder.join().is_err());
        });
        assert!(registrar.live.is_poisoned());

        let after = registrar.create(b"b", "image/png").unwrap();
        assert_eq!(std::fs::read(path_of(&after)).unwrap(), b"b");
        assert_eq!(registrar.live_count(), 2);

        registrar.release(&before);
        assert!(!path_of(&before).exists());
        assert!(path_of(&after).exists());
    }
}
