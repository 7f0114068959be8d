use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::sync::Mutex;

use rfarm_util::data::FileId;
use rfarm_util::error::Error;

/// A `(id, alias)` pair passed to [`WorkerFileStore::create_scratch_dir`]:
/// the content to expose, and the name the renderer will see it under.
#[derive(Debug, Clone)]
pub struct ScratchFile {
	pub id: FileId,
	pub alias: String,
}

struct Inner {
	/// Small blobs, resident in RAM.
	memory: std::collections::HashMap<FileId, Bytes>,
	/// IDs of blobs materialized at `<tmpdir>/<id>`. A blob is never in both
	/// sets at once (I4).
	on_disk: HashSet<FileId>,
	/// Monotonic counter for scratch directory names.
	scratch_counter: u64,
}

/// Content-addressed blob store for a single worker (§4.1).
///
/// A single mutex guards the in-memory map, the on-disk membership set and
/// the scratch-dir counter. `Put`, `Delete` and `CreateScratchDir` hold it
/// for their whole duration; `Get` only holds it while it decides which tier
/// to read from.
pub struct WorkerFileStore {
	tmpdir: PathBuf,
	inmem_threshold: usize,
	inner: Mutex<Inner>,
}

impl WorkerFileStore {
	pub fn new(tmpdir: PathBuf, inmem_threshold: usize) -> Self {
		WorkerFileStore {
			tmpdir,
			inmem_threshold,
			inner: Mutex::new(Inner {
				memory: std::collections::HashMap::new(),
				on_disk: HashSet::new(),
				scratch_counter: 0,
			}),
		}
	}

	fn disk_path(&self, id: &FileId) -> PathBuf {
		self.tmpdir.join(id.to_string())
	}

	/// Number of bytes currently resident in the in-memory tier, for logging.
	pub async fn resident_bytes(&self) -> usize {
		self.inner.lock().await.memory.values().map(|b| b.len()).sum()
	}

	/// Store `bytes` under its content ID. Idempotent: re-putting the same
	/// content is a no-op that returns the same `(id, size)` (I5).
	pub async fn put(&self, bytes: Bytes) -> Result<(FileId, u64), Error> {
		let id = FileId::of(&bytes);
		let size = bytes.len() as u64;

		let mut inner = self.inner.lock().await;
		if inner.memory.contains_key(&id) || inner.on_disk.contains(&id) {
			return Ok((id, size));
		}

		if bytes.len() <= self.inmem_threshold {
			inner.memory.insert(id, bytes);
		} else {
			let path = self.disk_path(&id);
			fs::write(&path, &bytes).await?;
			inner.on_disk.insert(id);
		}

		Ok((id, size))
	}

	/// Fetch the full content of a blob, or `None` if it isn't present in
	/// either tier.
	pub async fn get(&self, id: &FileId) -> Result<Option<Bytes>, Error> {
		let on_disk = {
			let inner = self.inner.lock().await;
			if let Some(bytes) = inner.memory.get(id) {
				return Ok(Some(bytes.clone()));
			}
			inner.on_disk.contains(id)
		};

		if !on_disk {
			return Ok(None);
		}

		match fs::read(self.disk_path(id)).await {
			Ok(bytes) => Ok(Some(Bytes::from(bytes))),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Remove a blob from whichever tier holds it. Absence under either
	/// tier is not an error.
	pub async fn delete(&self, id: &FileId) -> Result<(), Error> {
		let mut inner = self.inner.lock().await;
		if inner.memory.remove(id).is_some() {
			return Ok(());
		}
		if inner.on_disk.remove(id) {
			let path = self.disk_path(id);
			match fs::remove_file(&path).await {
				Ok(()) => {}
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
				Err(e) => return Err(e.into()),
			}
		}
		Ok(())
	}

	/// Read `dir/filename` and `put` its content. Used to ingest renderer
	/// output files (I6: same ID as `Put(readAll(path))`).
	pub async fn retain(&self, dir: &Path, filename: &str) -> Result<(FileId, u64), Error> {
		let path = dir.join(filename);
		let bytes = fs::read(&path).await.map_err(|e| {
			Error::Internal(format!("could not read renderer output {:?}: {}", path, e))
		})?;
		self.put(Bytes::from(bytes)).await
	}

	/// Allocate a fresh scratch directory and populate it with one symlink
	/// per `(id, alias)` pointing at the on-disk copy of that blob,
	/// spilling in-memory blobs to disk first if needed.
	pub async fn create_scratch_dir(&self, files: &[ScratchFile]) -> Result<PathBuf, Error> {
		for file in files {
			if file.alias.contains('/') || file.alias.contains('\\') {
				return Err(Error::InvalidArgument(format!(
					"scratch alias {:?} must not contain a path separator",
					file.alias
				)));
			}
		}

		let mut inner = self.inner.lock().await;
		let index = inner.scratch_counter;
		inner.scratch_counter += 1;
		let dir = self.tmpdir.join(index.to_string());

		let result = self.populate_scratch_dir(&mut inner, &dir, files).await;
		drop(inner);

		if let Err(e) = result {
			let _ = self.remove_scratch_dir(&dir).await;
			return Err(e);
		}

		Ok(dir)
	}

	async fn populate_scratch_dir(
		&self,
		inner: &mut Inner,
		dir: &Path,
		files: &[ScratchFile],
	) -> Result<(), Error> {
		fs::create_dir(dir).await?;

		for file in files {
			if let Some(bytes) = inner.memory.remove(&file.id) {
				let path = self.disk_path(&file.id);
				fs::write(&path, &bytes).await?;
				inner.on_disk.insert(file.id);
			} else if !inner.on_disk.contains(&file.id) {
				return Err(Error::NotFound(format!(
					"blob {} requested for scratch dir is not present in the store",
					file.id
				)));
			}

			let target = self.disk_path(&file.id);
			let link = dir.join(&file.alias);
			symlink(&target, &link).await?;
		}

		Ok(())
	}

	/// Recursively remove a scratch directory. The underlying blobs it
	/// links to are untouched.
	pub async fn remove_scratch_dir(&self, dir: &Path) -> Result<(), Error> {
		match fs::remove_dir_all(dir).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

#[cfg(unix)]
async fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
	tokio::fs::symlink(target, link).await
}

#[cfg(not(unix))]
async fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
	fs::copy(target, link).await.map(|_| ())
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn store() -> (WorkerFileStore, mktemp::Temp) {
		let dir = mktemp::Temp::new_dir().unwrap();
		let store = WorkerFileStore::new(dir.to_path_buf(), 16);
		(store, dir)
	}

	#[tokio::test]
	async fn put_then_get_round_trips() {
		let (store, _dir) = store().await;
		let (id, size) = store.put(Bytes::from_static(b"hello")).await.unwrap();
		assert_eq!(size, 5);
		let got = store.get(&id).await.unwrap().unwrap();
		assert_eq!(&got[..], b"hello");
	}

	#[tokio::test]
	async fn put_then_delete_then_get_is_not_found() {
		let (store, _dir) = store().await;
		let (id, _) = store.put(Bytes::from_static(b"hello")).await.unwrap();
		store.delete(&id).await.unwrap();
		assert!(store.get(&id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn delete_of_absent_blob_is_not_an_error() {
		let (store, _dir) = store().await;
		let id = FileId::of(b"never stored");
		store.delete(&id).await.unwrap();
	}

	#[tokio::test]
	async fn put_is_idempotent() {
		let (store, _dir) = store().await;
		let (id1, size1) = store.put(Bytes::from_static(b"same content")).await.unwrap();
		let (id2, size2) = store.put(Bytes::from_static(b"same content")).await.unwrap();
		assert_eq!(id1, id2);
		assert_eq!(size1, size2);
	}

	#[tokio::test]
	async fn small_blob_stays_in_memory_large_blob_spills_to_disk() {
		let (store, dir) = store().await;
		// threshold is 16 bytes
		let (small_id, _) = store.put(Bytes::from(vec![1u8; 16])).await.unwrap();
		let (large_id, _) = store.put(Bytes::from(vec![2u8; 17])).await.unwrap();

		assert!(!dir.join(small_id.to_string()).exists());
		assert!(dir.join(large_id.to_string()).exists());
	}

	#[tokio::test]
	async fn retain_reads_file_and_ids_it_by_content() {
		let (store, dir) = store().await;
		tokio::fs::write(dir.join("out.png"), b"pixels").await.unwrap();
		let (id, size) = store.retain(&dir, "out.png").await.unwrap();
		assert_eq!(id, FileId::of(b"pixels"));
		assert_eq!(size, 6);
	}

	#[tokio::test]
	async fn scratch_dir_links_resolve_to_blob_content() {
		let (store, dir) = store().await;
		let (id, _) = store.put(Bytes::from_static(b"scene data")).await.unwrap();

		let scratch = store
			.create_scratch_dir(&[ScratchFile {
				id,
				alias: "scene.pbrt".to_string(),
			}])
			.await
			.unwrap();

		let linked = tokio::fs::read(scratch.join("scene.pbrt")).await.unwrap();
		assert_eq!(linked, b"scene data");

		store.remove_scratch_dir(&scratch).await.unwrap();
		assert!(!scratch.exists());
		// the underlying blob must still be reachable after the scratch dir is gone
		assert!(dir.join(id.to_string()).exists());
	}

	#[tokio::test]
	async fn scratch_dir_counter_is_unique_across_calls() {
		let (store, _dir) = store().await;
		let (id, _) = store.put(Bytes::from_static(b"x")).await.unwrap();
		let files = [ScratchFile {
			id,
			alias: "a".to_string(),
		}];
		let d1 = store.create_scratch_dir(&files).await.unwrap();
		let d2 = store.create_scratch_dir(&files).await.unwrap();
		assert_ne!(d1, d2);
	}

	#[tokio::test]
	async fn scratch_dir_rejects_alias_with_path_separator() {
		let (store, _dir) = store().await;
		let (id, _) = store.put(Bytes::from_static(b"x")).await.unwrap();
		let err = store
			.create_scratch_dir(&[ScratchFile {
				id,
				alias: "nested/alias".to_string(),
			}])
			.await
			.unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn scratch_dir_missing_blob_fails_and_cleans_up() {
		let (store, dir) = store().await;
		let missing = FileId::of(b"never put");
		let err = store
			.create_scratch_dir(&[ScratchFile {
				id: missing,
				alias: "x".to_string(),
			}])
			.await
			.unwrap_err();
		assert!(matches!(err, Error::NotFound(_)));
		// no scratch dir left behind
		let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
		assert!(entries.next_entry().await.unwrap().is_none());
	}
}
