//! Candidate-socket scanning and validation.
//!
//! Discovery is best-effort per candidate: a path that is not a socket, does
//! not accept a connection, or answers the identity probe with garbage is
//! skipped with a warning. One bad socket must never block using the rest.
//! The returned handle order equals sorted candidate-path order, so repeated
//! discovery over the same paths is stable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::process::ProcessHandle;
use hapadmin_proto::Transport;

pub(crate) async fn discover(paths: &[PathBuf], transport: Transport) -> Vec<Arc<ProcessHandle>> {
    let mut candidates: Vec<PathBuf> = paths.to_vec();
    candidates.sort();
    candidates.dedup();

    let mut handles = Vec::new();
    for path in candidates {
        if !is_unix_socket(&path) {
            debug!(candidate = %path.display(), "not a socket special file, skipping");
            continue;
        }
        match ProcessHandle::connect(path.clone(), transport).await {
            Ok(handle) => {
                debug!(
                    socket = %path.display(),
                    pid = handle.identity().pid,
                    process = handle.process_num(),
                    "discovered worker process"
                );
                handles.push(Arc::new(handle));
            }
            Err(err) => {
                warn!(
                    candidate = %path.display(),
                    error = %err,
                    "skipping unusable admin socket"
                );
            }
        }
    }
    handles
}

/// Scan a directory (non-recursively) for candidate socket paths.
pub(crate) fn scan_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        paths.push(entry?.path());
    }
    Ok(paths)
}

fn is_unix_socket(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::metadata(path).is_ok_and(|meta| meta.file_type().is_socket())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unix_socket_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-socket");
        std::fs::write(&file, b"hello").unwrap();
        assert!(!is_unix_socket(&file));
    }

    #[test]
    fn test_is_unix_socket_rejects_missing_path() {
        assert!(!is_unix_socket(Path::new("/nonexistent/admin.sock")));
    }

    #[tokio::test]
    async fn test_is_unix_socket_accepts_bound_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.sock");
        let _listener = tokio::net::UnixListener::bind(&path).unwrap();
        assert!(is_unix_socket(&path));
    }

    #[test]
    fn test_scan_dir_lists_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"").unwrap();
        std::fs::write(dir.path().join("b"), b"").unwrap();
        let mut paths = scan_dir(dir.path()).unwrap();
        paths.sort();
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_skips_non_sockets_silently() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stray.pid");
        std::fs::write(&file, b"123").unwrap();

        let handles = discover(&[file], Transport::default()).await;
        assert!(handles.is_empty());
    }
}
