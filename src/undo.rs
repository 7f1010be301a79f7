/// Reverting classification.
///
/// Two levels are supported: forgetting dry-run decisions (memory only), and
/// a full rollback that moves every file in every immediate subdirectory of
/// the root back to the root.
use crate::file_organizer::{FileOrganizer, OrganizeError, OrganizeResult};
use crate::record::ClassificationState;
use crate::table::PropertyTable;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Represents the result of an unclassify operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnclassifyReport {
    /// Records whose dry-run directory was forgotten.
    pub cleared_pseudo: usize,
    /// Files moved back to the root.
    pub restored_files: Vec<String>,
    /// Files left in a subdirectory because the root already holds that name.
    pub collisions: Vec<PathBuf>,
    /// Files that could not be moved for any other reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Subdirectories removed after being emptied.
    pub removed_dirs: Vec<String>,
}

impl UnclassifyReport {
    /// Returns true if every file made it back to the root.
    pub fn is_complete_success(&self) -> bool {
        self.collisions.is_empty() && self.failed_restores.is_empty()
    }
}

/// Manages rollback of classification state.
pub struct UndoManager;

impl UndoManager {
    /// Forgets the directory of every record still sitting in the root.
    ///
    /// Touches nothing on disk.
    pub fn clear_pseudo_flags(root: &Path, table: &mut PropertyTable) -> UnclassifyReport {
        let mut report = UnclassifyReport::default();
        for record in table.records_mut() {
            if record.state_in(root) == ClassificationState::PseudoClassified {
                record.classified_directory = None;
                report.cleared_pseudo += 1;
            }
        }
        info!(cleared = report.cleared_pseudo, "dry-run classification cleared");
        report
    }

    /// Moves every file in every subdirectory of `root` back to the root.
    ///
    /// All recorded directories are cleared first. A file that cannot come
    /// back (name already taken at the root, or a failed move) stays where it
    /// is and its record, if any, points at that subdirectory again. Emptied
    /// subdirectories are removed; removal failures are ignored.
    ///
    /// # Errors
    ///
    /// Fails only if the root itself cannot be listed. Per-file problems are
    /// collected in the report.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vidtidy::table::PropertyTable;
    /// use vidtidy::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// let mut table = PropertyTable::default();
    /// match UndoManager::rollback(Path::new("/videos"), &mut table) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files.len()),
    ///     Err(e) => eprintln!("Unclassify failed: {}", e),
    /// }
    /// ```
    pub fn rollback(root: &Path, table: &mut PropertyTable) -> OrganizeResult<UnclassifyReport> {
        for record in table.records_mut() {
            record.classified_directory = None;
        }

        let mut report = UnclassifyReport::default();
        let directories = FileOrganizer::list_dirs(root)?;

        for directory in &directories {
            let dir_path = root.join(directory);
            let files = match FileOrganizer::list_files(&dir_path) {
                Ok(files) => files,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable subdirectory");
                    continue;
                }
            };

            for filename in files {
                match FileOrganizer::move_to_root(root, directory, &filename) {
                    Ok(_) => report.restored_files.push(filename),
                    Err(e) => {
                        warn!(error = %e, "file left in subdirectory");
                        if let Some(record) = table.find_mut(&filename) {
                            record.classified_directory = Some(directory.clone());
                        }
                        let path = dir_path.join(&filename);
                        match e {
                            OrganizeError::MoveCollision { .. } => report.collisions.push(path),
                            other => report.failed_restores.push((path, other.to_string())),
                        }
                    }
                }
            }

            if FileOrganizer::remove_if_empty(&dir_path) {
                report.removed_dirs.push(directory.clone());
            }
        }

        info!(
            restored = report.restored_files.len(),
            collisions = report.collisions.len(),
            failed = report.failed_restores.len(),
            "rollback finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::RawProps;
    use crate::record::VideoRecord;
    use std::fs;
    use tempfile::TempDir;

    fn record(name: &str, dir: Option<&str>) -> VideoRecord {
        let mut record = VideoRecord::from_probe(name, RawProps::default(), 0);
        record.classified_directory = dir.map(str::to_string);
        record
    }

    #[test]
    fn test_clear_pseudo_flags_only_touches_files_at_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("dry.mp4"), "video").expect("Failed to write file");

        let mut table = PropertyTable::default();
        table.push(record("dry.mp4", Some("16-9")));
        table.push(record("moved.mp4", Some("4-3")));

        let report = UndoManager::clear_pseudo_flags(root, &mut table);

        assert_eq!(report.cleared_pseudo, 1);
        assert_eq!(table.find("dry.mp4").unwrap().classified_directory, None);
        assert_eq!(
            table.find("moved.mp4").unwrap().classified_directory.as_deref(),
            Some("4-3")
        );
    }

    #[test]
    fn test_rollback_restores_and_removes_dirs() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("16-9")).expect("Failed to create directory");
        fs::write(root.join("16-9").join("a.mp4"), "video").expect("Failed to write file");

        let mut table = PropertyTable::default();
        table.push(record("a.mp4", Some("16-9")));

        let report = UndoManager::rollback(root, &mut table).expect("Rollback failed");

        assert!(report.is_complete_success());
        assert_eq!(report.restored_files, vec!["a.mp4"]);
        assert_eq!(report.removed_dirs, vec!["16-9"]);
        assert!(root.join("a.mp4").exists());
        assert!(!root.join("16-9").exists());
        assert_eq!(table.find("a.mp4").unwrap().classified_directory, None);
    }

    #[test]
    fn test_rollback_collision_keeps_both_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("clip.mp4"), "root").expect("Failed to write file");
        fs::create_dir(root.join("4-3")).expect("Failed to create directory");
        fs::write(root.join("4-3").join("clip.mp4"), "sub").expect("Failed to write file");

        let mut table = PropertyTable::default();
        table.push(record("clip.mp4", Some("16-9")));

        let report = UndoManager::rollback(root, &mut table).expect("Rollback failed");

        assert_eq!(report.collisions, vec![root.join("4-3").join("clip.mp4")]);
        assert!(!report.is_complete_success());
        assert_eq!(fs::read_to_string(root.join("clip.mp4")).unwrap(), "root");
        assert_eq!(
            fs::read_to_string(root.join("4-3").join("clip.mp4")).unwrap(),
            "sub"
        );
        assert!(root.join("4-3").is_dir());
        assert_eq!(
            table.find("clip.mp4").unwrap().classified_directory.as_deref(),
            Some("4-3")
        );
    }

    #[test]
    fn test_rollback_with_no_subdirectories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut table = PropertyTable::default();
        table.push(record("a.mp4", Some("16-9")));

        let report = UndoManager::rollback(temp_dir.path(), &mut table).expect("Rollback failed");

        assert_eq!(report, UnclassifyReport::default());
        assert_eq!(table.find("a.mp4").unwrap().classified_directory, None);
    }
}
