use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

pub trait FileSystemProvider {
    /// Removes the specified file or directory safely.
    ///
    /// If the path does not exist, this function returns `Ok(())` without error. Directories are
    /// removed recursively.
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError::Io`] if the removal fails for any reason other than the path
    /// not existing.
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Creates a directory structure if it doesn't exist.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Io`] if the directory could not be created.
    /// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Writes `content` to `path` without ever exposing a partially written file under `path`.
    ///
    /// The bytes go to a `.part` sibling first, which is then renamed over the target.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Io`] if writing or renaming fails.
    fn write_atomic<P: AsRef<Path>>(&self, path: P, content: &[u8]) -> FileSystemResult<()>;

    /// Marks a file as executable (`0o755`). This is a no-op on non-Unix platforms.
    fn make_executable<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;
}

pub struct StandardFileSystemProvider;

impl FileSystemProvider for StandardFileSystemProvider {
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();

        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        match result {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FileSystemError::io(path, "remove", err)),
            Ok(()) => Ok(()),
        }
    }

    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();

        if !path.exists() {
            fs::create_dir_all(path)
                .map_err(|err| FileSystemError::io(path, "create directory", err))?;
        }

        if !path.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    fn write_atomic<P: AsRef<Path>>(&self, path: P, content: &[u8]) -> FileSystemResult<()> {
        let path = path.as_ref();
        let partial = partial_path(path);
        let write_failed = |source| FileSystemError::io(&partial, "write", source);

        let mut file = fs::File::create(&partial).map_err(write_failed)?;
        let written = file.write_all(content).and_then(|()| file.sync_all());
        drop(file);
        if let Err(err) = written {
            let _ = fs::remove_file(&partial);
            return Err(write_failed(err));
        }

        fs::rename(&partial, path).map_err(|err| {
            let _ = fs::remove_file(&partial);
            FileSystemError::io(path, "rename", err)
        })
    }

    #[cfg(unix)]
    fn make_executable<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        use std::os::unix::fs::PermissionsExt as _;

        let path = path.as_ref();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|err| FileSystemError::io(path, "set permissions on", err))
    }

    #[cfg(not(unix))]
    fn make_executable<P: AsRef<Path>>(&self, _path: P) -> FileSystemResult<()> {
        Ok(())
    }
}

/// Returns the temporary sibling used while writing `path`.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Creates a directory structure if it doesn't exist.
///
/// See [`FileSystemProvider::ensure_dir_exists`] for detailed documentation.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.ensure_dir_exists(path)
}

/// Removes the specified file or directory safely.
///
/// See [`FileSystemProvider::safe_remove`] for detailed documentation.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.safe_remove(path)
}

/// See [`FileSystemProvider::write_atomic`].
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> FileSystemResult<()> {
    StandardFileSystemProvider.write_atomic(path, content)
}

/// See [`FileSystemProvider::make_executable`].
pub fn make_executable<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.make_executable(path)
}
