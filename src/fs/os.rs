//! Real filesystem access with atomic, owner-only writes.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::{self, Write},
};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, fs::Filesystem};

/// [`Filesystem`] backed by `std::fs` and the platform home directory.
#[derive(Clone, Debug, Default)]
pub struct OsFilesystem {
	home_override: Option<PathBuf>,
}
impl OsFilesystem {
	/// Uses `home` instead of the platform home directory for `~` expansion.
	pub fn with_home(home: impl Into<PathBuf>) -> Self {
		Self { home_override: Some(home.into()) }
	}

	fn ensure_parent_exists(path: &Path) -> io::Result<()> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}

		Ok(())
	}

	fn staging_path(path: &Path) -> PathBuf {
		let suffix: String = rand::rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect();
		let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

		name.push(format!(".{suffix}.tmp"));

		path.with_file_name(name)
	}

	fn create_private(path: &Path) -> io::Result<File> {
		let mut options = OpenOptions::new();

		options.write(true).create_new(true);

		#[cfg(unix)]
		{
			use std::os::unix::fs::OpenOptionsExt;

			options.mode(0o600);
		}

		options.open(path)
	}
}
impl Filesystem for OsFilesystem {
	fn home_dir(&self) -> Option<PathBuf> {
		self.home_override.clone().or_else(dirs::home_dir)
	}

	fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
		fs::read(path)
	}

	fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
		Self::ensure_parent_exists(path)?;

		let staging = Self::staging_path(path);
		let result = Self::create_private(&staging)
			.and_then(|mut file| {
				file.write_all(contents)?;
				file.sync_all()
			})
			.and_then(|()| fs::rename(&staging, path));

		if result.is_err() {
			let _ = fs::remove_file(&staging);
		}

		result
	}

	fn remove_file(&self, path: &Path) -> io::Result<()> {
		fs::remove_file(path)
	}
}
