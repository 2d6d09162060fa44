//! Scan phase: hard-link newly arrived files into every destination's queue.

use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use wsprnet_config::Destination;

use crate::error::ReflectorError;

/// Tracks files already fanned out, by `(device, inode)` so a file that is
/// deleted from incoming and later replaced by one of the same name (but a
/// different inode) is treated as new.
#[derive(Default)]
pub struct FanOutState {
    seen: HashSet<(u64, u64)>,
}

impl FanOutState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies every destination queue directory lives on the same
    /// filesystem as `incoming_dir`. A hard link cannot cross filesystems,
    /// so a mismatch here is a fatal configuration error, checked once at
    /// startup.
    pub fn verify_same_filesystem(
        incoming_dir: &Path,
        spool_base_dir: &Path,
        destinations: &[Destination],
    ) -> Result<(), ReflectorError> {
        std::fs::create_dir_all(incoming_dir)?;
        let incoming_dev = std::fs::metadata(incoming_dir)?.dev();

        for destination in destinations {
            let queue_dir = spool_base_dir.join(&destination.name);
            std::fs::create_dir_all(&queue_dir)?;
            let dev = std::fs::metadata(&queue_dir)?.dev();
            if dev != incoming_dev {
                return Err(ReflectorError::CrossFilesystem {
                    name: destination.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Enumerates files matching `glob_pattern` and hard-links any not yet
    /// seen into every destination's queue directory. Returns how many
    /// files were newly fanned out.
    pub fn scan_and_link(
        &mut self,
        glob_pattern: &str,
        spool_base_dir: &Path,
        destinations: &[Destination],
    ) -> Result<usize, ReflectorError> {
        let mut linked = 0;
        for entry in glob::glob(glob_pattern).map_err(|e| {
            ReflectorError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
        })? {
            let path = match entry {
                Ok(p) if p.is_file() => p,
                _ => continue,
            };

            let metadata = std::fs::metadata(&path)?;
            let key = (metadata.dev(), metadata.ino());
            if !self.seen.insert(key) {
                continue;
            }

            for destination in destinations {
                let queue_dir = spool_base_dir.join(&destination.name);
                std::fs::create_dir_all(&queue_dir)?;
                let dest_path = link_destination(&path, &queue_dir);
                match std::fs::hard_link(&path, &dest_path) {
                    Ok(()) => debug!(file = %path.display(), destination = %destination.name, "fanned out"),
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(e.into()),
                }
            }
            linked += 1;
        }

        if linked > 0 {
            info!(count = linked, "fanned out new files to all destinations");
        }
        Ok(linked)
    }
}

fn link_destination(source: &Path, queue_dir: &Path) -> PathBuf {
    let file_name = source.file_name().expect("glob match always has a file name");
    queue_dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(name: &str) -> Destination {
        Destination {
            name: name.to_string(),
            user: "u".to_string(),
            host: "h".to_string(),
            path: "/remote".to_string(),
        }
    }

    #[test]
    fn links_new_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let incoming = dir.path().join("incoming");
        let spool = dir.path().join("spool");
        std::fs::create_dir_all(&incoming).unwrap();
        std::fs::write(incoming.join("a.tbz"), b"data").unwrap();

        let destinations = vec![dest("alpha"), dest("beta")];
        let mut state = FanOutState::new();
        let pattern = format!("{}/*.tbz", incoming.display());

        let linked = state.scan_and_link(&pattern, &spool, &destinations).unwrap();
        assert_eq!(linked, 1);
        assert!(spool.join("alpha").join("a.tbz").exists());
        assert!(spool.join("beta").join("a.tbz").exists());

        // Second scan of the same file is a no-op.
        let linked_again = state.scan_and_link(&pattern, &spool, &destinations).unwrap();
        assert_eq!(linked_again, 0);
    }

    #[test]
    fn hard_linked_files_share_inode() {
        let dir = tempfile::tempdir().unwrap();
        let incoming = dir.path().join("incoming");
        let spool = dir.path().join("spool");
        std::fs::create_dir_all(&incoming).unwrap();
        std::fs::write(incoming.join("a.tbz"), b"data").unwrap();

        let destinations = vec![dest("alpha")];
        let mut state = FanOutState::new();
        let pattern = format!("{}/*.tbz", incoming.display());
        state.scan_and_link(&pattern, &spool, &destinations).unwrap();

        let original_ino = std::fs::metadata(incoming.join("a.tbz")).unwrap().ino();
        let linked_ino = std::fs::metadata(spool.join("alpha").join("a.tbz")).unwrap().ino();
        assert_eq!(original_ino, linked_ino);
    }
}
