//! Backup relocation for processed input files.

use std::path::{Path, PathBuf};

use tracing::info;

use aoirelay_shared::{RelayError, Result};

/// Move a processed input file into the backup directory, replacing any
/// prior file of the same name.
///
/// This runs after every file's processing, success or failure, so the
/// input directory never accumulates already-attempted files. On failure
/// the file stays in place and the next cycle reconsiders it.
pub fn archive_input(backup_dir: &Path, input: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(backup_dir).map_err(|e| RelayError::archive(backup_dir, e))?;

    let Some(file_name) = input.file_name() else {
        return Err(RelayError::archive(
            input,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let target = backup_dir.join(file_name);

    // Rename first; fall back to copy + remove when the backup directory
    // sits on another filesystem.
    if std::fs::rename(input, &target).is_err() {
        std::fs::copy(input, &target).map_err(|e| RelayError::archive(&target, e))?;
        std::fs::remove_file(input).map_err(|e| RelayError::archive(input, e))?;
    }

    info!(from = %input.display(), to = %target.display(), "input archived");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "aoirelay-archive-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn archive_moves_the_file() {
        let tmp = temp_dir();
        let input = tmp.join("board.csv");
        let backup = tmp.join("backup");
        std::fs::write(&input, "Barcode,SN1\n").unwrap();

        let target = archive_input(&backup, &input).unwrap();

        assert!(!input.exists());
        assert_eq!(target, backup.join("board.csv"));
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "Barcode,SN1\n"
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn archive_overwrites_same_name() {
        let tmp = temp_dir();
        let backup = tmp.join("backup");

        let input = tmp.join("board.csv");
        std::fs::write(&input, "first\n").unwrap();
        archive_input(&backup, &input).unwrap();

        std::fs::write(&input, "second\n").unwrap();
        archive_input(&backup, &input).unwrap();

        // Only the most recent version survives, never duplicates.
        let entries: Vec<_> = std::fs::read_dir(&backup).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            std::fs::read_to_string(backup.join("board.csv")).unwrap(),
            "second\n"
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_source_is_an_archive_error() {
        let tmp = temp_dir();
        let err = archive_input(&tmp.join("backup"), &tmp.join("gone.csv")).unwrap_err();
        assert!(matches!(err, RelayError::Archive { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
