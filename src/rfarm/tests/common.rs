//! Shared harness for the end-to-end scenarios in `lib.rs`.
//!
//! Each scenario spins up one or more real `WorkerService` servers bound to
//! `127.0.0.1:0` (loopback, OS-assigned ports: never conflict, nothing
//! external) and drives a `Dispatcher` directly as an in-process value
//! against `NodeDirectory`/`FileDirectory` wired to those addresses. Worker
//! registration and peer-to-peer `Transfer` both dial an address at runtime,
//! so this is the natural seam rather than a mocked transport.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use rfarm_block::WorkerFileStore;
use rfarm_proto::worker_service_server::{WorkerService, WorkerServiceServer};
use rfarm_proto::{
	ComposeRequest, ComposeResponse, DeleteRequest, DeleteResponse, GetRequest, GetResponse, PutRequest,
	PutResponse, RunRequest, RunResponse, TransferRequest, TransferResponse,
};
use rfarm_renderer::RendererConfig;
use rfarm_worker::WorkerServiceImpl;

pub struct RunningWorker {
	pub addr: SocketAddr,
	pub store: Arc<WorkerFileStore>,
	// Held for the worker's lifetime so the tmpdir isn't cleaned up under it.
	_tmpdir: mktemp::Temp,
}

fn renderer_config() -> RendererConfig {
	RendererConfig {
		pbrt_binary: PathBuf::from("pbrt"),
		pbrt_output_filename: "out.exr".to_string(),
	}
}

/// Bind a real `WorkerServiceImpl` to an OS-assigned loopback port and serve
/// it for the rest of the test process's life.
pub async fn spawn_worker() -> RunningWorker {
	let tmpdir = mktemp::Temp::new_dir().unwrap();
	let store = Arc::new(WorkerFileStore::new(tmpdir.to_path_buf(), 1024 * 1024));
	let service = WorkerServiceImpl::new(store.clone(), renderer_config());

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		Server::builder()
			.add_service(WorkerServiceServer::new(service))
			.serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
			.await
			.unwrap();
	});

	RunningWorker {
		addr,
		store,
		_tmpdir: tmpdir,
	}
}

type BoxStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

/// A peer that answers every `Get` with fixed bytes regardless of the
/// requested id, for exercising the digest-mismatch path of `Transfer`
/// without needing to corrupt a wire in flight.
#[derive(Default)]
pub struct CorruptPeer;

#[tonic::async_trait]
impl WorkerService for CorruptPeer {
	type RunStream = BoxStream<RunResponse>;

	async fn run(&self, _request: Request<tonic::Streaming<RunRequest>>) -> Result<Response<Self::RunStream>, Status> {
		Err(Status::unimplemented("CorruptPeer only serves Get"))
	}

	async fn compose(&self, _request: Request<ComposeRequest>) -> Result<Response<ComposeResponse>, Status> {
		Err(Status::unimplemented("CorruptPeer only serves Get"))
	}

	async fn transfer(&self, _request: Request<TransferRequest>) -> Result<Response<TransferResponse>, Status> {
		Err(Status::unimplemented("CorruptPeer only serves Get"))
	}

	async fn put(&self, _request: Request<tonic::Streaming<PutRequest>>) -> Result<Response<PutResponse>, Status> {
		Err(Status::unimplemented("CorruptPeer only serves Get"))
	}

	type GetStream = BoxStream<GetResponse>;

	async fn get(&self, _request: Request<GetRequest>) -> Result<Response<Self::GetStream>, Status> {
		let content = b"this is not the content you asked for".to_vec();
		let stream = tokio_stream::once(Ok(GetResponse { content }));
		Ok(Response::new(Box::pin(stream)))
	}

	async fn delete(&self, _request: Request<DeleteRequest>) -> Result<Response<DeleteResponse>, Status> {
		Err(Status::unimplemented("CorruptPeer only serves Get"))
	}
}

pub async fn spawn_corrupt_peer() -> SocketAddr {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		Server::builder()
			.add_service(WorkerServiceServer::new(CorruptPeer))
			.serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
			.await
			.unwrap();
	});
	addr
}
