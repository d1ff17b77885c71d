//! Thread-safe in-memory [`Filesystem`] for tests and dry runs.

// std
use std::io::{self, ErrorKind};
// self
use crate::{_prelude::*, fs::Filesystem};

type FileMap = Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>;

/// In-process filesystem keyed by absolute path.
///
/// Clones share the same underlying map, so a test can keep a handle while the engine
/// writes through another.
#[derive(Clone, Debug, Default)]
pub struct MemoryFilesystem {
	home: Option<PathBuf>,
	files: FileMap,
	faults: Arc<Mutex<Faults>>,
}
#[derive(Debug, Default)]
struct Faults {
	deny_writes: bool,
	deny_reads: bool,
}
impl MemoryFilesystem {
	/// Creates an empty filesystem whose home directory is `home`.
	pub fn with_home(home: impl Into<PathBuf>) -> Self {
		Self { home: Some(home.into()), ..Self::default() }
	}

	/// Seeds a file.
	pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
		self.files.write().insert(path.into(), contents.into());
	}

	/// Returns a copy of the file's contents, if present.
	pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
		self.files.read().get(path).cloned()
	}

	/// Returns `true` if the file exists.
	pub fn contains(&self, path: &Path) -> bool {
		self.files.read().contains_key(path)
	}

	/// Lists every stored path in lexical order.
	pub fn paths(&self) -> Vec<PathBuf> {
		self.files.read().keys().cloned().collect()
	}

	/// Makes subsequent writes fail with `PermissionDenied`.
	pub fn deny_writes(&self, deny: bool) {
		self.faults.lock().deny_writes = deny;
	}

	/// Makes subsequent reads of existing files fail with `PermissionDenied`.
	pub fn deny_reads(&self, deny: bool) {
		self.faults.lock().deny_reads = deny;
	}
}
impl Filesystem for MemoryFilesystem {
	fn home_dir(&self) -> Option<PathBuf> {
		self.home.clone()
	}

	fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
		let contents = self
			.files
			.read()
			.get(path)
			.cloned()
			.ok_or_else(|| io::Error::new(ErrorKind::NotFound, path.display().to_string()))?;

		if self.faults.lock().deny_reads {
			return Err(io::Error::new(ErrorKind::PermissionDenied, "reads denied"));
		}

		Ok(contents)
	}

	fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
		if self.faults.lock().deny_writes {
			return Err(io::Error::new(ErrorKind::PermissionDenied, "writes denied"));
		}

		self.files.write().insert(path.to_path_buf(), contents.to_vec());

		Ok(())
	}

	fn remove_file(&self, path: &Path) -> io::Result<()> {
		self.files
			.write()
			.remove(path)
			.map(|_| ())
			.ok_or_else(|| io::Error::new(ErrorKind::NotFound, path.display().to_string()))
	}
}
