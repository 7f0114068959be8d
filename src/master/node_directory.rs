use std::collections::HashMap;
use std::fmt;

use tokio::sync::RwLock;
use tonic::transport::Channel;

use rfarm_proto::worker_service_client::WorkerServiceClient;
use rfarm_util::error::Error;

/// A small non-negative integer assigned by the master at registration;
/// unique and stable for the master's lifetime (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub(crate) u32);

impl WorkerId {
	#[cfg(test)]
	pub(crate) fn new_for_test(id: u32) -> WorkerId {
		WorkerId(id)
	}
}

impl fmt::Display for WorkerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

struct WorkerRecord {
	address: String,
	client: WorkerServiceClient<Channel>,
}

/// Mapping from worker ID to address and RPC client handle (§4.4). ID
/// assignment is serialized by the outer `RwLock`'s write side; reads
/// (address/client lookups, `worker_ids`) all take the read side.
pub struct NodeDirectory {
	workers: RwLock<HashMap<WorkerId, WorkerRecord>>,
	next_id: std::sync::atomic::AtomicU32,
}

impl Default for NodeDirectory {
	fn default() -> Self {
		Self::new()
	}
}

impl NodeDirectory {
	pub fn new() -> Self {
		NodeDirectory {
			workers: RwLock::new(HashMap::new()),
			next_id: std::sync::atomic::AtomicU32::new(0),
		}
	}

	/// Connect to `address` and assign it a fresh worker ID.
	pub async fn add_worker(&self, address: String) -> Result<WorkerId, Error> {
		let endpoint = format!("http://{}", address);
		let channel = tonic::transport::Endpoint::new(endpoint)
			.map_err(|e| Error::Internal(format!("invalid worker address {:?}: {}", address, e)))?
			.connect()
			.await
			.map_err(|e| Error::Internal(format!("could not reach worker {:?}: {}", address, e)))?;

		let client = WorkerServiceClient::new(channel);
		let id = WorkerId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst));

		self.workers.write().await.insert(id, WorkerRecord { address, client });
		info!("registered worker {} at {}", id, self.get_worker_address(id).await?);
		Ok(id)
	}

	/// Parse a comma-separated `host:port` list and register each entry.
	/// An empty string registers zero workers (seed scenario 5).
	pub async fn add_workers_from_string(&self, csv: &str) -> Result<Vec<WorkerId>, Error> {
		let mut ids = Vec::new();
		for address in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
			ids.push(self.add_worker(address.to_string()).await?);
		}
		Ok(ids)
	}

	pub async fn get_worker_address(&self, id: WorkerId) -> Result<String, Error> {
		self.workers
			.read()
			.await
			.get(&id)
			.map(|r| r.address.clone())
			.ok_or_else(|| Error::Internal(format!("unknown worker id {}", id)))
	}

	pub async fn get_worker_client(&self, id: WorkerId) -> Result<WorkerServiceClient<Channel>, Error> {
		self.workers
			.read()
			.await
			.get(&id)
			.map(|r| r.client.clone())
			.ok_or_else(|| Error::Internal(format!("unknown worker id {}", id)))
	}

	pub async fn worker_ids(&self) -> Vec<WorkerId> {
		self.workers.read().await.keys().copied().collect()
	}
}
