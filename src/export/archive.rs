//! Zip packaging of a batch

use crate::error::{MuprepError, Result};
use crate::types::OutputArtifact;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the summary table at the archive root
pub const SUMMARY_FILE_NAME: &str = "mu_prep_summary.csv";

/// Build a deflated zip holding every artifact plus the summary table
///
/// Artifact paths must be relative and unique.
pub fn build_archive(artifacts: &[OutputArtifact], summary_csv: &[u8]) -> Result<Vec<u8>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(artifacts.len() + 1);
    seen.insert(SUMMARY_FILE_NAME);

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for artifact in artifacts {
        let path = artifact.archive_path.as_str();
        if path.starts_with('/') || path.split('/').any(|part| part == "..") {
            return Err(archive_error(format!("artifact path is not relative: {}", path)));
        }
        if !seen.insert(path) {
            return Err(archive_error(format!("duplicate artifact path: {}", path)));
        }

        zip.start_file(path, options).map_err(|e| archive_error(e.to_string()))?;
        zip.write_all(&artifact.content)?;
        debug!("Archived {} ({} bytes)", path, artifact.content.len());
    }

    zip.start_file(SUMMARY_FILE_NAME, options)
        .map_err(|e| archive_error(e.to_string()))?;
    zip.write_all(summary_csv)?;

    let cursor = zip.finish().map_err(|e| archive_error(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn archive_error(reason: String) -> MuprepError {
    MuprepError::ArchiveError { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Arc;
    use zip::ZipArchive;

    fn artifact(path: &str, body: &[u8]) -> OutputArtifact {
        OutputArtifact {
            content: Arc::from(body),
            archive_path: path.to_string(),
        }
    }

    #[test]
    fn test_archive_contains_artifacts_and_summary() {
        let artifacts = [
            artifact("C/a + b/a^Unknown^C^80.0^SongA.mid", b"first"),
            artifact("C/a + b/b^Unknown^C^80.0^SongB.mid", b"second"),
        ];
        let bytes = build_archive(&artifacts, b"header\r\n").unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut content = String::new();
        archive
            .by_name("C/a + b/b^Unknown^C^80.0^SongB.mid")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");

        let mut summary = String::new();
        archive
            .by_name(SUMMARY_FILE_NAME)
            .unwrap()
            .read_to_string(&mut summary)
            .unwrap();
        assert_eq!(summary, "header\r\n");
    }

    #[test]
    fn test_duplicate_path_is_rejected() {
        let artifacts = [artifact("C/x/x.mid", b"1"), artifact("C/x/x.mid", b"2")];
        let err = build_archive(&artifacts, b"").unwrap_err();
        assert!(matches!(err, MuprepError::ArchiveError { .. }));
    }

    #[test]
    fn test_absolute_path_is_rejected() {
        let err = build_archive(&[artifact("/tmp/x.mid", b"1")], b"").unwrap_err();
        assert!(err.to_string().contains("not relative"));
        assert!(build_archive(&[artifact("../x.mid", b"1")], b"").is_err());
    }
}
