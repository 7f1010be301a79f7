/// Filesystem operations used by classification and rollback.
///
/// Files only ever move one level: from the root directory into one of its
/// immediate subdirectories, or back. A move never overwrites an existing
/// file; a name clash is reported as [`OrganizeError::MoveCollision`] and the
/// file stays where it was.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Record of a single completed move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Where the file is now.
    pub new_path: PathBuf,
    /// The subdirectory involved in the move.
    pub directory: String,
}

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The root directory is missing or not a directory.
    #[error("Invalid root directory {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },
    /// A directory listing could not be read.
    #[error("Failed to read directory {}: {error}", path.display())]
    ReadDirFailed {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    /// Failed to create a classification subdirectory.
    #[error("Failed to create directory {}: {error}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    /// The destination already holds a file with the same name.
    #[error("Refusing to overwrite {} with {}", to.display(), from.display())]
    MoveCollision { from: PathBuf, to: PathBuf },
    /// The rename itself failed.
    #[error("Failed to move {} to {}: {error}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },
}

/// Result type for filesystem operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Moves files between a root directory and its subdirectories.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Fails with [`OrganizeError::InvalidRoot`] unless `root` is an existing directory.
    pub fn validate_root(root: &Path) -> OrganizeResult<()> {
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(OrganizeError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(OrganizeError::InvalidRoot {
                path: root.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    /// Names of the files directly under `dir`, sorted.
    ///
    /// Symlinks count as what they point to. Entries whose names are not
    /// valid UTF-8 are skipped.
    pub fn list_files(dir: &Path) -> OrganizeResult<Vec<String>> {
        Self::list_entries(dir, Path::is_file)
    }

    /// Names of the directories directly under `dir`, sorted.
    pub fn list_dirs(dir: &Path) -> OrganizeResult<Vec<String>> {
        Self::list_entries(dir, Path::is_dir)
    }

    fn list_entries<F>(dir: &Path, keep: F) -> OrganizeResult<Vec<String>>
    where
        F: Fn(&Path) -> bool,
    {
        let entries = fs::read_dir(dir).map_err(|e| OrganizeError::ReadDirFailed {
            path: dir.to_path_buf(),
            error: e,
        })?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            if keep(&entry.path()) {
                match entry.file_name().into_string() {
                    Ok(name) => names.push(name),
                    Err(raw) => {
                        tracing::warn!(name = ?raw, "skipping entry with a non UTF-8 name")
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns true if `filename` exists directly under `root`.
    pub fn file_exists_in(root: &Path, filename: &str) -> bool {
        root.join(filename).is_file()
    }

    /// Moves `root/filename` into `root/directory/filename`.
    ///
    /// The subdirectory is created if it doesn't exist. Fails with
    /// [`OrganizeError::MoveCollision`] if the destination is already taken.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vidtidy::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// match FileOrganizer::move_into_subdir(Path::new("/videos"), "clip.mp4", "16-9") {
    ///     Ok(op) => println!("Moved to {}", op.new_path.display()),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    pub fn move_into_subdir(
        root: &Path,
        filename: &str,
        directory: &str,
    ) -> OrganizeResult<Operation> {
        Self::validate_root(root)?;

        let target_dir = root.join(directory);
        if !target_dir.is_dir() {
            fs::create_dir_all(&target_dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: target_dir.clone(),
                error: e,
            })?;
        }

        let from = root.join(filename);
        let to = target_dir.join(filename);
        Self::rename_no_clobber(from, to, directory)
    }

    /// Moves `root/directory/filename` back to `root/filename`.
    ///
    /// Fails with [`OrganizeError::MoveCollision`] if the root already holds a
    /// file of that name.
    pub fn move_to_root(root: &Path, directory: &str, filename: &str) -> OrganizeResult<Operation> {
        let from = root.join(directory).join(filename);
        let to = root.join(filename);
        Self::rename_no_clobber(from, to, directory)
    }

    fn rename_no_clobber(from: PathBuf, to: PathBuf, directory: &str) -> OrganizeResult<Operation> {
        if to.exists() {
            return Err(OrganizeError::MoveCollision { from, to });
        }

        fs::rename(&from, &to).map_err(|e| OrganizeError::FileMoveFailure {
            from: from.clone(),
            to: to.clone(),
            error: e,
        })?;
        debug!(from = %from.display(), to = %to.display(), "moved");

        Ok(Operation {
            new_path: to,
            directory: directory.to_string(),
        })
    }

    /// Removes `dir` if it is empty. Returns whether it was removed.
    ///
    /// Failures (not empty, permissions) are not errors.
    pub fn remove_if_empty(dir: &Path) -> bool {
        match fs::remove_dir(dir) {
            Ok(()) => true,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "directory kept");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_move_into_subdir_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("clip.mp4"), "video").expect("Failed to write test file");

        let op = FileOrganizer::move_into_subdir(root, "clip.mp4", "16-9")
            .expect("Failed to move file");

        assert!(root.join("16-9").is_dir());
        assert!(!root.join("clip.mp4").exists());
        assert!(root.join("16-9").join("clip.mp4").exists());
        assert_eq!(op.new_path, root.join("16-9").join("clip.mp4"));
        assert_eq!(op.directory, "16-9");
    }

    #[test]
    fn test_move_into_existing_subdir() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("rev 16-9")).expect("Failed to create directory");
        fs::write(root.join("tall.mp4"), "video").expect("Failed to write test file");

        FileOrganizer::move_into_subdir(root, "tall.mp4", "rev 16-9").expect("Failed to move file");

        assert!(root.join("rev 16-9").join("tall.mp4").exists());
    }

    #[test]
    fn test_move_into_subdir_never_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("16-9")).expect("Failed to create directory");
        fs::write(root.join("16-9").join("clip.mp4"), "old").expect("Failed to write file");
        fs::write(root.join("clip.mp4"), "new").expect("Failed to write file");

        let result = FileOrganizer::move_into_subdir(root, "clip.mp4", "16-9");

        assert!(matches!(result, Err(OrganizeError::MoveCollision { .. })));
        assert_eq!(fs::read_to_string(root.join("clip.mp4")).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(root.join("16-9").join("clip.mp4")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_move_to_root_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("clip.mp4"), "video").expect("Failed to write test file");

        FileOrganizer::move_into_subdir(root, "clip.mp4", "4-3").expect("Failed to move file");
        FileOrganizer::move_to_root(root, "4-3", "clip.mp4").expect("Failed to move back");

        assert!(root.join("clip.mp4").exists());
        assert!(FileOrganizer::remove_if_empty(&root.join("4-3")));
        assert!(!root.join("4-3").exists());
    }

    #[test]
    fn test_remove_if_empty_keeps_non_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("busy")).expect("Failed to create directory");
        fs::write(root.join("busy").join("a.mp4"), "video").expect("Failed to write file");

        assert!(!FileOrganizer::remove_if_empty(&root.join("busy")));
        assert!(root.join("busy").is_dir());
    }

    #[test]
    fn test_listing_separates_files_and_dirs() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("b.mp4"), "video").expect("Failed to write file");
        fs::write(root.join("a.mp4"), "video").expect("Failed to write file");
        fs::create_dir(root.join("16-9")).expect("Failed to create directory");

        assert_eq!(FileOrganizer::list_files(root).unwrap(), vec!["a.mp4", "b.mp4"]);
        assert_eq!(FileOrganizer::list_dirs(root).unwrap(), vec!["16-9"]);
        assert!(FileOrganizer::file_exists_in(root, "a.mp4"));
        assert!(!FileOrganizer::file_exists_in(root, "16-9"));
    }

    #[cfg(unix)]
    #[test]
    fn test_listing_follows_symlinks() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let elsewhere = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(elsewhere.path().join("real.mp4"), "video").expect("Failed to write file");
        symlink(elsewhere.path().join("real.mp4"), root.join("linked.mp4"))
            .expect("Failed to create symlink");
        symlink(elsewhere.path(), root.join("linked-dir")).expect("Failed to create symlink");
        symlink(root.join("gone.mp4"), root.join("dangling.mp4"))
            .expect("Failed to create symlink");

        let files = FileOrganizer::list_files(root).unwrap();
        assert_eq!(files, vec!["linked.mp4"]);
        assert!(FileOrganizer::file_exists_in(root, &files[0]));
        assert_eq!(FileOrganizer::list_dirs(root).unwrap(), vec!["linked-dir"]);
    }

    #[test]
    fn test_invalid_root() {
        let result = FileOrganizer::validate_root(Path::new("/non/existent/path"));
        assert!(matches!(result, Err(OrganizeError::InvalidRoot { .. })));

        let result = FileOrganizer::move_into_subdir(Path::new("/non/existent/path"), "a", "b");
        assert!(result.is_err());
    }
}
