//! End-to-end scenarios driving real `master`/`worker` wiring without
//! binding to a config file or a fixed port: every worker is a real
//! `WorkerServiceImpl` bound to `127.0.0.1:0`, and the `Dispatcher` is
//! exercised directly as an in-process value against `NodeDirectory`/
//! `FileDirectory` pointed at those addresses.
mod common;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_stream::StreamExt;
use tonic::Request;

use rfarm_master::{Dispatcher, FileDirectory, NodeDirectory};
use rfarm_proto::dispatcher_server::Dispatcher as DispatcherTrait;
use rfarm_proto::worker_service_client::WorkerServiceClient;
use rfarm_proto::{
	ComposeImage, ComposeRequest, DeleteRequest, FileRef, GetRequest, ImageType, PutRequest, RenderRequest,
	Renderer, TransferRequest, UploadDirectRequest,
};
use rfarm_util::background::worker::Worker;
use rfarm_util::data::FileId;

async fn connect(addr: std::net::SocketAddr) -> WorkerServiceClient<tonic::transport::Channel> {
	let channel = tonic::transport::Endpoint::new(format!("http://{}", addr))
		.unwrap()
		.connect()
		.await
		.unwrap();
	WorkerServiceClient::new(channel)
}

fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
	let mut img = image::RgbaImage::new(width, height);
	for px in img.pixels_mut() {
		*px = image::Rgba(rgba);
	}
	let mut bytes = Vec::new();
	image::DynamicImage::ImageRgba8(img)
		.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
		.unwrap();
	bytes
}

/// Seed scenario 1: a single worker renders AOBENCH and returns a 256x256 PNG.
#[tokio::test]
async fn single_worker_aobench_render_succeeds() {
	let worker = common::spawn_worker().await;

	let nodes = Arc::new(NodeDirectory::new());
	nodes.add_worker(worker.addr.to_string()).await.unwrap();
	let files = Arc::new(FileDirectory::new(3600));
	let dispatcher = Dispatcher::new(nodes, files);

	let response = dispatcher
		.render(Request::new(RenderRequest {
			renderer: Renderer::Aobench as i32,
			files: vec![],
		}))
		.await
		.unwrap()
		.into_inner();

	assert_eq!(response.image_type, ImageType::Png as i32);
	let decoded = image::load_from_memory(&response.image).unwrap();
	assert_eq!(decoded.width(), 256);
	assert_eq!(decoded.height(), 256);
}

/// Seed scenario 2: two inputs placed on different workers, a render
/// requesting both forces one to be transferred onto the other; afterwards
/// the transferred file is held by both.
#[tokio::test]
async fn render_with_inputs_split_across_workers_transfers_the_missing_one() {
	let worker_a = common::spawn_worker().await;
	let worker_b = common::spawn_worker().await;

	let nodes = Arc::new(NodeDirectory::new());
	let id_a = nodes.add_worker(worker_a.addr.to_string()).await.unwrap();
	let id_b = nodes.add_worker(worker_b.addr.to_string()).await.unwrap();
	let files = Arc::new(FileDirectory::new(3600));

	let (file1, size1) = worker_a.store.put(Bytes::from_static(b"scene one")).await.unwrap();
	files.notify_file_put(file1, size1, id_a, false);
	let (file2, size2) = worker_b.store.put(Bytes::from_static(b"scene two")).await.unwrap();
	files.notify_file_put(file2, size2, id_b, false);

	assert_eq!(files.holders(&file1).len(), 1);
	assert_eq!(files.holders(&file2).len(), 1);

	let dispatcher = Dispatcher::new(nodes, files.clone());
	let response = dispatcher
		.render(Request::new(RenderRequest {
			renderer: Renderer::Aobench as i32,
			files: vec![
				FileRef {
					id: file1.to_string(),
					alias: "a".to_string(),
				},
				FileRef {
					id: file2.to_string(),
					alias: "b".to_string(),
				},
			],
		}))
		.await
		.unwrap()
		.into_inner();
	assert_eq!(response.image_type, ImageType::Png as i32);

	// Exactly one of the two inputs needed transferring onto the worker that
	// was picked to run the job; the other is untouched.
	let holders1 = files.holders(&file1).len();
	let holders2 = files.holders(&file2).len();
	assert_ne!(holders1, holders2);
	assert_eq!(holders1 + holders2, 3);
}

/// Seed scenario 3: a locked file is not evicted even once its TTL has
/// passed; the blob stays on disk and the master's bookkeeping keeps it.
#[tokio::test]
async fn locked_file_survives_an_eviction_cycle_past_its_ttl() {
	let worker = common::spawn_worker().await;

	let nodes = Arc::new(NodeDirectory::new());
	let worker_id = nodes.add_worker(worker.addr.to_string()).await.unwrap();
	let files = Arc::new(FileDirectory::new(1)); // 1 second TTL

	let (id, size) = worker.store.put(Bytes::from_static(b"keep me")).await.unwrap();
	files.notify_file_put(id, size, worker_id, false);
	assert!(files.lock_files(&[id], worker_id).unwrap());

	tokio::time::sleep(Duration::from_millis(1_100)).await;

	let mut eviction = rfarm_master::EvictionWorker::new(nodes.clone(), files.clone(), Duration::from_secs(60));
	let (_tx, mut rx) = tokio::sync::watch::channel(false);
	eviction.work(&mut rx).await.unwrap();

	assert!(worker.store.get(&id).await.unwrap().is_some());
	assert_eq!(files.holders(&id).len(), 1);
}

/// Seed scenario 4: a peer that answers `Get` with the wrong bytes makes
/// `Transfer` fail as `DATA_LOSS`, and the destination never accepts the
/// content under the id it asked for.
///
/// This drives `WorkerService::transfer` directly rather than through
/// `Dispatcher::render`: the master's own placement would otherwise always
/// route the job to whichever worker its bookkeeping says already holds the
/// wanted file, which here is the very peer we're deliberately making
/// untrustworthy. The digest check this exercises is the same one
/// `Dispatcher::render`'s transfer step relies on (`dispatcher.rs`), whose
/// propagate-`DataLoss`-without-locking behavior is covered separately by
/// `FileDirectory`'s own `lock_files`/`unlock_files` unit tests.
#[tokio::test]
async fn digest_mismatch_on_transfer_is_data_loss() {
	let dst = common::spawn_worker().await;
	let corrupt_addr = common::spawn_corrupt_peer().await;

	let wanted = FileId::of(b"scene that only the corrupt peer claims to have");
	let mut dst_client = connect(dst.addr).await;
	let status = dst_client
		.transfer(TransferRequest {
			id: wanted.to_string(),
			src_address: corrupt_addr.to_string(),
		})
		.await
		.unwrap_err();

	assert_eq!(status.code(), tonic::Code::DataLoss);
	assert!(dst.store.get(&wanted).await.unwrap().is_none());
}

/// Seed scenario 5: with no worker registered, Render fails RESOURCE_EXHAUSTED
/// without ever dialing out.
#[tokio::test]
async fn render_with_no_workers_is_resource_exhausted() {
	let nodes = Arc::new(NodeDirectory::new());
	assert!(nodes.add_workers_from_string("").await.unwrap().is_empty());
	let files = Arc::new(FileDirectory::new(3600));
	let dispatcher = Dispatcher::new(nodes, files);

	let status = dispatcher
		.render(Request::new(RenderRequest {
			renderer: Renderer::Aobench as i32,
			files: vec![],
		}))
		.await
		.unwrap_err();

	assert_eq!(status.code(), tonic::Code::ResourceExhausted);
}

/// Seed scenario 6: compositing a 2x2 red and a 2x2 green image with weights
/// 1:3 produces `(red + 3*green) / 4` through the real `Put`/`Compose`/`Get`
/// RPCs.
#[tokio::test]
async fn compose_weighted_average_through_the_wire() {
	let worker = common::spawn_worker().await;
	let mut client = connect(worker.addr).await;

	let red = solid_png(2, 2, [255, 0, 0, 255]);
	let green = solid_png(2, 2, [0, 255, 0, 255]);

	let red_id = client
		.put(tokio_stream::once(PutRequest { content: red }))
		.await
		.unwrap()
		.into_inner()
		.id;
	let green_id = client
		.put(tokio_stream::once(PutRequest { content: green }))
		.await
		.unwrap()
		.into_inner()
		.id;

	let composed = client
		.compose(ComposeRequest {
			images: vec![
				ComposeImage {
					id: red_id,
					weight: 1,
					image_type: ImageType::Png as i32,
				},
				ComposeImage {
					id: green_id,
					weight: 3,
					image_type: ImageType::Png as i32,
				},
			],
			image_type: ImageType::Png as i32,
		})
		.await
		.unwrap()
		.into_inner();

	let mut stream = client.get(GetRequest { id: composed.id }).await.unwrap().into_inner();
	let mut bytes = Vec::new();
	while let Some(chunk) = stream.next().await {
		bytes.extend_from_slice(&chunk.unwrap().content);
	}

	let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
	assert_eq!(decoded.width(), 2);
	assert_eq!(decoded.height(), 2);
	for px in decoded.pixels() {
		assert!((62..=64).contains(&px[0]));
		assert!((190..=193).contains(&px[1]));
		assert_eq!(px[2], 0);
	}
}

// Sanity check that the two direct-dependency RPC types not otherwise
// exercised above (`TransferRequest`/`DeleteRequest`) round-trip through a
// real worker, since no seed scenario above happens to touch them via a
// standalone client call.
#[tokio::test]
async fn direct_transfer_and_delete_round_trip() {
	let src = common::spawn_worker().await;
	let dst = common::spawn_worker().await;

	let (id, _) = src.store.put(Bytes::from_static(b"peer content")).await.unwrap();

	let mut dst_client = connect(dst.addr).await;
	dst_client
		.transfer(TransferRequest {
			id: id.to_string(),
			src_address: src.addr.to_string(),
		})
		.await
		.unwrap();
	assert_eq!(dst.store.get(&id).await.unwrap().unwrap(), Bytes::from_static(b"peer content"));

	dst_client.delete(DeleteRequest { id: id.to_string() }).await.unwrap();
	assert!(dst.store.get(&id).await.unwrap().is_none());
}

// Exercises `upload_direct`/`UploadDirectRequest`, the one client-facing RPC
// not otherwise touched by a seed scenario above.
#[tokio::test]
async fn upload_direct_registers_the_uploaded_content() {
	let worker = common::spawn_worker().await;
	let nodes = Arc::new(NodeDirectory::new());
	nodes.add_worker(worker.addr.to_string()).await.unwrap();
	let files = Arc::new(FileDirectory::new(3600));
	let dispatcher = Dispatcher::new(nodes, files.clone());

	let response = dispatcher
		.upload_direct(Request::new(UploadDirectRequest {
			content: b"uploaded scene".to_vec(),
		}))
		.await
		.unwrap()
		.into_inner();

	let id = FileId::from_str(&response.id).unwrap();
	assert_eq!(id, FileId::of(b"uploaded scene"));
	assert!(files.is_file_alive(&id));
}
