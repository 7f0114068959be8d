use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rfarm_util::data::FileId;
use rfarm_util::error::Error;
use rfarm_util::time::now_msec;

use crate::node_directory::WorkerId;

/// Per-`FileId` bookkeeping the master keeps: which workers hold the
/// content, which of those are reference-counted by a running job, its size,
/// and its eviction deadline (§3).
struct FileInfo {
	size: u64,
	expire_at_msec: u64,
	holders: HashSet<WorkerId>,
	locked_by: HashSet<WorkerId>,
}

/// The master's single source of truth for file placement (§4.3). One mutex
/// guards the whole table; critical sections are map work only, so
/// contention stays low even though there's no reader/writer split.
pub struct FileDirectory {
	table: Mutex<HashMap<FileId, FileInfo>>,
	default_ttl_msec: u64,
	round_robin: AtomicU64,
}

impl FileDirectory {
	pub fn new(default_ttl_secs: u64) -> Self {
		FileDirectory {
			table: Mutex::new(HashMap::new()),
			default_ttl_msec: default_ttl_secs * 1000,
			round_robin: AtomicU64::new(0),
		}
	}

	/// Create the entry if missing (`expireAt = now + defaultTtl`); otherwise
	/// augment `holders`/`lockedBy` and extend `expireAt` if the new deadline
	/// is later than the existing one — never shorten it (§4.3).
	pub fn notify_file_put(&self, id: FileId, size: u64, worker: WorkerId, lock: bool) {
		let new_expire = now_msec() + self.default_ttl_msec;
		let mut table = self.table.lock().unwrap();
		let entry = table.entry(id).or_insert_with(|| FileInfo {
			size,
			expire_at_msec: new_expire,
			holders: HashSet::new(),
			locked_by: HashSet::new(),
		});
		entry.size = size;
		entry.expire_at_msec = entry.expire_at_msec.max(new_expire);
		entry.holders.insert(worker);
		if lock {
			entry.locked_by.insert(worker);
		}
	}

	/// Remove `worker` from `holders`/`lockedBy`; delete the entry if it was
	/// the last holder (I1).
	pub fn notify_file_deleted(&self, id: &FileId, worker: WorkerId) {
		let mut table = self.table.lock().unwrap();
		if let Some(entry) = table.get_mut(id) {
			entry.holders.remove(&worker);
			entry.locked_by.remove(&worker);
			if entry.holders.is_empty() {
				table.remove(id);
			}
		}
	}

	/// Remove `worker` from every entry; prune entries it was the last
	/// holder of.
	pub fn notify_worker_removed(&self, worker: WorkerId) {
		let mut table = self.table.lock().unwrap();
		table.retain(|_, entry| {
			entry.holders.remove(&worker);
			entry.locked_by.remove(&worker);
			!entry.holders.is_empty()
		});
	}

	/// Mark `id` eligible for eviction at the next cycle, regardless of any
	/// remaining TTL.
	pub fn expire_file(&self, id: &FileId) {
		let mut table = self.table.lock().unwrap();
		if let Some(entry) = table.get_mut(id) {
			entry.expire_at_msec = now_msec();
		}
	}

	pub fn is_file_alive(&self, id: &FileId) -> bool {
		let table = self.table.lock().unwrap();
		matches!(table.get(id), Some(entry) if entry.expire_at_msec > now_msec())
	}

	/// Lock `ids` for `worker`, all-or-nothing: if any `id`'s entry is
	/// missing or `worker` isn't among its holders, undo the locks already
	/// taken in this call and return `false`. Missing entries are a caller
	/// invariant violation, not a normal miss.
	pub fn lock_files(&self, ids: &[FileId], worker: WorkerId) -> Result<bool, Error> {
		let mut table = self.table.lock().unwrap();
		let mut locked_so_far = Vec::new();

		for id in ids {
			let Some(entry) = table.get_mut(id) else {
				for done in &locked_so_far {
					if let Some(e) = table.get_mut(done) {
						e.locked_by.remove(&worker);
					}
				}
				return Err(Error::Internal(format!(
					"lock_files called for {} which has no FileDirectory entry",
					id
				)));
			};

			if !entry.holders.contains(&worker) {
				for done in &locked_so_far {
					if let Some(e) = table.get_mut(done) {
						e.locked_by.remove(&worker);
					}
				}
				return Ok(false);
			}

			entry.locked_by.insert(worker);
			locked_so_far.push(*id);
		}

		Ok(true)
	}

	/// Remove `worker` from `lockedBy(id)` for each `id`; silent on absence.
	pub fn unlock_files(&self, ids: &[FileId], worker: WorkerId) {
		let mut table = self.table.lock().unwrap();
		for id in ids {
			if let Some(entry) = table.get_mut(id) {
				entry.locked_by.remove(&worker);
			}
		}
	}

	/// The subset of `ids` whose entry exists but doesn't list `worker`
	/// among its holders.
	pub fn list_missing_files(&self, worker: WorkerId, ids: &[FileId]) -> Vec<FileId> {
		let table = self.table.lock().unwrap();
		ids.iter()
			.filter(|id| matches!(table.get(id), Some(entry) if !entry.holders.contains(&worker)))
			.copied()
			.collect()
	}

	/// Any worker currently holding `id`.
	pub fn get_worker_with_file(&self, id: &FileId) -> Option<WorkerId> {
		let table = self.table.lock().unwrap();
		table.get(id).and_then(|entry| entry.holders.iter().next().copied())
	}

	/// The full set of workers currently holding `id`, empty if there is no
	/// entry.
	pub fn holders(&self, id: &FileId) -> HashSet<WorkerId> {
		let table = self.table.lock().unwrap();
		table.get(id).map(|entry| entry.holders.clone()).unwrap_or_default()
	}

	/// Pick a worker to accept new work from `candidates`: prefer the one
	/// already holding the most bytes of `wanted`, tie-broken round-robin
	/// (§4.5 placement policy). `None` if `candidates` is empty.
	pub fn get_empty_worker(&self, candidates: &[WorkerId], wanted: &[FileId]) -> Option<WorkerId> {
		if candidates.is_empty() {
			return None;
		}

		let table = self.table.lock().unwrap();
		let score = |w: &WorkerId| -> usize {
			wanted
				.iter()
				.filter(|id| matches!(table.get(id), Some(entry) if entry.holders.contains(w)))
				.count()
		};

		let best_score = candidates.iter().map(score).max().unwrap_or(0);
		let tied: Vec<&WorkerId> = candidates.iter().filter(|w| score(w) == best_score).collect();

		let index = self.round_robin.fetch_add(1, Ordering::Relaxed) as usize % tied.len();
		Some(*tied[index])
	}

	/// `(id, worker)` pairs eligible for eviction: the entry has expired and
	/// `worker` isn't in its `lockedBy` set (§4.3 supplement).
	pub fn get_unused_files(&self) -> Vec<(FileId, WorkerId)> {
		let table = self.table.lock().unwrap();
		let now = now_msec();
		let mut out = Vec::new();
		for (id, entry) in table.iter() {
			if entry.expire_at_msec > now {
				continue;
			}
			for worker in &entry.holders {
				if !entry.locked_by.contains(worker) {
					out.push((*id, *worker));
				}
			}
		}
		out
	}
}
