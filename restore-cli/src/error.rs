use std::fmt::Display;

pub type CliResult<T> = Result<T, CliError>;

/// Top-level CLI errors: either the restore engine itself failed, or
/// something about wiring it up (manifest parsing, flag validation, the
/// subprocess-backed etcd collaborators) went wrong before the engine ever
/// ran.
pub enum CliError {
    Restore(restore_core::RestoreError),
    Manifest(String),
    Etcd(String),
    Io(std::io::Error),
}

impl From<restore_core::RestoreError> for CliError {
    fn from(e: restore_core::RestoreError) -> Self {
        Self::Restore(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restore(e) => write!(f, "restore failed: {e}"),
            Self::Manifest(e) => write!(f, "invalid manifest: {e}"),
            Self::Etcd(e) => write!(f, "etcd collaborator error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}
