use std::{error::Error, fmt, io, path::PathBuf};

#[derive(Debug)]
pub enum HashError {
    Read { path: PathBuf, source: io::Error },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::Read { path, source } => {
                write!(f, "Cannot hash `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for HashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HashError::Read { source, .. } => Some(source),
        }
    }
}

#[derive(Debug)]
pub enum PathError {
    Empty,
    CurrentDir { source: io::Error },
    MissingEnvVar { var: String, input: String },
    UnclosedVariable { input: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "Empty path"),
            PathError::CurrentDir { source } => {
                write!(f, "Cannot resolve relative path: {source}")
            }
            PathError::MissingEnvVar { var, input } => {
                write!(f, "`${var}` is not set (in path `{input}`)")
            }
            PathError::UnclosedVariable { input } => {
                write!(f, "Missing `}}` after `{input}`")
            }
        }
    }
}

impl Error for PathError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PathError::CurrentDir { source } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FileSystemError {
    /// An I/O operation on `path` failed. `action` reads as a verb, e.g. `rename`.
    Io {
        path: PathBuf,
        action: &'static str,
        source: io::Error,
    },
    NotADirectory {
        path: PathBuf,
    },
}

impl FileSystemError {
    pub(crate) fn io(path: impl Into<PathBuf>, action: &'static str, source: io::Error) -> Self {
        FileSystemError::Io {
            path: path.into(),
            action,
            source,
        }
    }
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::Io {
                path,
                action,
                source,
            } => write!(f, "Failed to {action} `{}`: {source}", path.display()),
            FileSystemError::NotADirectory { path } => {
                write!(f, "`{}` exists and is not a directory", path.display())
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileSystemError::Io { source, .. } => Some(source),
            FileSystemError::NotADirectory { .. } => None,
        }
    }
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type HashResult<T> = std::result::Result<T, HashError>;
pub type PathResult<T> = std::result::Result<T, PathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_system_error_names_the_path() {
        let err = FileSystemError::io(
            "/cache/blobs/abc.part",
            "rename",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to rename `/cache/blobs/abc.part`: permission denied"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = PathError::MissingEnvVar {
            var: "KVM_HOME".into(),
            input: "$KVM_HOME/bin".into(),
        };
        assert_eq!(
            err.to_string(),
            "`$KVM_HOME` is not set (in path `$KVM_HOME/bin`)"
        );
    }
}
