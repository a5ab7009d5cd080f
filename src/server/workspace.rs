//! Request-scoped upload workspace
//!
//! Each request spools its uploads into a fresh temporary directory that
//! is removed when the workspace is dropped. Every upload gets its own
//! numbered folder, so repeated file names never overwrite each other and
//! a sorted scan returns uploads in the order they arrived.

use crate::discovery::{self, DiscoveredFile};
use crate::error::{MuprepError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Name used for uploads whose file name is empty or unusable
const FALLBACK_UPLOAD_NAME: &str = "upload";

pub struct RequestWorkspace {
    dir: TempDir,
    stored: usize,
}

impl RequestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("muprep-").tempdir()?;
        debug!("Created request workspace {}", dir.path().display());
        Ok(Self { dir, stored: 0 })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write one upload; only the base name of `file_name` is used
    pub fn store(&mut self, file_name: &str, content: &[u8]) -> Result<PathBuf> {
        let slot = self.dir.path().join(format!("{:05}", self.stored));
        std::fs::create_dir(&slot).map_err(|e| MuprepError::output_error(&slot, e))?;

        let path = slot.join(safe_file_name(file_name));
        std::fs::write(&path, content).map_err(|e| MuprepError::output_error(&path, e))?;

        self.stored += 1;
        Ok(path)
    }

    /// Every stored MIDI file, in upload order
    pub fn midi_files(&self) -> Result<Vec<DiscoveredFile>> {
        discovery::scan(self.dir.path(), true)
    }
}

/// Base name of an uploaded file name, never a path
fn safe_file_name(file_name: &str) -> &str {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    match base {
        "" | "." | ".." => FALLBACK_UPLOAD_NAME,
        name => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("song.mid"), "song.mid");
        assert_eq!(safe_file_name("../../etc/passwd.mid"), "passwd.mid");
        assert_eq!(safe_file_name("C:\\Users\\me\\x.midi"), "x.midi");
        assert_eq!(safe_file_name(".."), "upload");
        assert_eq!(safe_file_name("dir/"), "upload");
    }

    #[test]
    fn test_same_name_uploads_are_kept_in_order() {
        let mut ws = RequestWorkspace::new().unwrap();
        ws.store("b.mid", b"first").unwrap();
        ws.store("b.mid", b"second").unwrap();
        ws.store("a.mid", b"third").unwrap();
        ws.store("notes.txt", b"ignored").unwrap();

        let files = ws.midi_files().unwrap();
        let bodies: Vec<Vec<u8>> = files.iter().map(|f| std::fs::read(&f.path).unwrap()).collect();
        assert_eq!(bodies, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let ws = RequestWorkspace::new().unwrap();
        let path = ws.path().to_path_buf();
        assert!(path.exists());
        drop(ws);
        assert!(!path.exists());
    }
}
