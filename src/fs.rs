//! Filesystem seam used by discovery strategies and provisioners.
//!
//! [`Filesystem`] keeps every read, write, and removal behind a small trait so tests can
//! swap [`OsFilesystem`] for [`MemoryFilesystem`]. [`expand_home`] resolves the `~`
//! prefix against the filesystem's notion of the home directory.

pub mod memory;
pub mod os;

pub use memory::MemoryFilesystem;
pub use os::OsFilesystem;

// std
use std::io::{self, ErrorKind};
// self
use crate::{_prelude::*, error::ConfigError};

/// Minimal file access contract shared by strategies and provisioners.
pub trait Filesystem
where
	Self: Debug + Send + Sync,
{
	/// Home directory used for `~` expansion, if known.
	fn home_dir(&self) -> Option<PathBuf>;

	/// Reads the whole file.
	fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

	/// Creates missing parent directories and replaces the file with `contents`.
	///
	/// Implementations must not leave a partially written file at `path` when they fail.
	fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

	/// Removes the file.
	fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Removes `path`, treating a missing file as success.
///
/// Returns `true` when a file was actually removed.
pub fn remove_if_exists(fs: &dyn Filesystem, path: &Path) -> io::Result<bool> {
	match fs.remove_file(path) {
		Ok(()) => Ok(true),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
		Err(e) => Err(e),
	}
}

/// Expands a leading `~` or `~/` against the filesystem's home directory.
///
/// Paths without the prefix are returned unchanged; `~user` forms are not supported and
/// are treated as relative paths.
pub fn expand_home(fs: &dyn Filesystem, raw: &str) -> Result<PathBuf, ConfigError> {
	let rest = match raw.strip_prefix('~') {
		Some("") => "",
		Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
		_ => return Ok(PathBuf::from(raw)),
	};
	let home = fs.home_dir().ok_or_else(|| ConfigError::HomeUnavailable { path: raw.into() })?;

	Ok(if rest.is_empty() { home } else { home.join(rest) })
}
