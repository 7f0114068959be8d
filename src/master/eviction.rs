use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use rfarm_proto::DeleteRequest;
use rfarm_util::background::worker::{Worker, WorkerStatus};
use rfarm_util::error::Error;

use crate::file_directory::FileDirectory;
use crate::node_directory::NodeDirectory;

/// Background eviction cycle (§4.3 supplement): on each tick, asks
/// `FileDirectory` for `(id, worker)` pairs past their expiration and not
/// locked, issues that worker's `Delete`, and reflects success back with
/// `NotifyFileDeleted`.
pub struct EvictionWorker {
	nodes: Arc<NodeDirectory>,
	files: Arc<FileDirectory>,
	interval: Duration,
}

impl EvictionWorker {
	pub fn new(nodes: Arc<NodeDirectory>, files: Arc<FileDirectory>, interval: Duration) -> Self {
		EvictionWorker { nodes, files, interval }
	}
}

#[async_trait]
impl Worker for EvictionWorker {
	fn name(&self) -> String {
		"file eviction".to_string()
	}

	async fn work(&mut self, _must_exit: &mut watch::Receiver<bool>) -> Result<WorkerStatus, Error> {
		let unused = self.files.get_unused_files();
		for (id, worker) in unused {
			let mut client = self.nodes.get_worker_client(worker).await?;
			match client.delete(DeleteRequest { id: id.to_string() }).await {
				Ok(_) => {
					self.files.notify_file_deleted(&id, worker);
					debug!("evicted {} from worker {}", id, worker);
				}
				Err(status) => {
					warn!("eviction: delete of {} on worker {} failed: {}", id, worker, status);
				}
			}
		}
		Ok(WorkerStatus::Idle)
	}

	async fn wait_for_work(&mut self, _must_exit: &watch::Receiver<bool>) -> WorkerStatus {
		tokio::time::sleep(self.interval).await;
		WorkerStatus::Busy
	}
}
