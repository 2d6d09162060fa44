//! Atomically claims an archive out of an incoming directory so at most one
//! worker (and, if multiple server instances ever run, at most one process)
//! ever extracts a given file.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Renames `path` into `extraction_dir` under a unique name. A rename is
/// atomic on a POSIX filesystem, so two workers racing on the same source
/// file see exactly one succeed; the loser's rename fails with `NotFound`
/// (or `AlreadyExists`, depending on OS) and it simply skips the file.
pub fn claim(path: &Path, extraction_dir: &Path) -> std::io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "archive path has no file name"))?;
    let claimed_name = format!("{}-{}", Uuid::new_v4(), file_name.to_string_lossy());
    let dest = extraction_dir.join(claimed_name);
    std::fs::rename(path, &dest)?;
    Ok(dest)
}

pub fn is_archive(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tbz") | Some("bz2")
    ) || path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".tar.bz2"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_archive_extensions() {
        assert!(is_archive(Path::new("foo.tbz")));
        assert!(is_archive(Path::new("foo.tar.bz2")));
        assert!(!is_archive(Path::new("foo.txt")));
    }

    #[test]
    fn claim_moves_file_and_is_idempotent_against_races() {
        let dir = tempfile::tempdir().unwrap();
        let incoming = dir.path().join("incoming");
        let extraction = dir.path().join("extraction");
        std::fs::create_dir_all(&incoming).unwrap();
        std::fs::create_dir_all(&extraction).unwrap();

        let archive_path = incoming.join("test.tbz");
        std::fs::write(&archive_path, b"fake archive bytes").unwrap();

        let claimed = claim(&archive_path, &extraction).unwrap();
        assert!(claimed.exists());
        assert!(!archive_path.exists());

        // A second claim attempt on the now-gone source file fails, which
        // is how a racing worker discovers it lost the race.
        assert!(claim(&archive_path, &extraction).is_err());
    }
}
