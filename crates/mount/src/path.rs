use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error returned when a bare file name cannot be resolved inside a mount.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum NameError {
    /// The supplied name was empty.
    #[error("file name is empty")]
    Empty,
    /// The supplied name contains a path separator.
    #[error("file name '{0}' contains a path separator")]
    Separator(String),
    /// The supplied name is a reserved path component such as `.` or `..`.
    #[error("file name '{0}' is a reserved path component")]
    Reserved(String),
}

/// Root directory a DFS node exposes as its namespace.
///
/// Both the daemon and the client address files by bare name; the mount path
/// is always prepended locally and never crosses the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MountPath {
    root: PathBuf,
}

impl MountPath {
    /// Creates a mount rooted at the supplied directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the mount root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates `name` and joins it onto the mount root.
    ///
    /// Names must be non-empty, must not be `.` or `..`, and must not contain
    /// `/` or `\`; anything else would let a request escape the mount
    /// directory.
    pub fn wrap(&self, name: &str) -> Result<PathBuf, NameError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// Checks that `name` is a legal bare file name.
pub(crate) fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name == "." || name == ".." {
        return Err(NameError::Reserved(name.to_owned()));
    }
    if name.contains(['/', '\\']) {
        return Err(NameError::Separator(name.to_owned()));
    }
    Ok(())
}
