use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};

use rfarm_block::{ScratchFile, WorkerFileStore};
use rfarm_compositor::WeightedImage;
use rfarm_proto::worker_service_client::WorkerServiceClient;
use rfarm_proto::worker_service_server::WorkerService;
use rfarm_proto::{
	ComposeRequest, ComposeResponse, DeleteRequest, DeleteResponse, FileRef, GetRequest, GetResponse,
	PutRequest, PutResponse, RunRequest, RunResponse, TransferRequest, TransferResponse,
};
use rfarm_renderer::RendererConfig;
use rfarm_util::data::FileId;
use rfarm_util::error::Error;

/// Bridges the generated `WorkerService` RPC trait to `WorkerFileStore` and
/// `rfarm_renderer::render`.
pub struct WorkerServiceImpl {
	store: Arc<WorkerFileStore>,
	renderer_config: RendererConfig,
}

impl WorkerServiceImpl {
	pub fn new(store: Arc<WorkerFileStore>, renderer_config: RendererConfig) -> Self {
		WorkerServiceImpl {
			store,
			renderer_config,
		}
	}
}

fn parse_id(raw: &str) -> Result<FileId, Status> {
	FileId::from_str(raw).map_err(Status::from)
}

fn scratch_files(files: &[FileRef]) -> Result<Vec<ScratchFile>, Status> {
	files
		.iter()
		.map(|f| Ok(ScratchFile {
			id: parse_id(&f.id)?,
			alias: f.alias.clone(),
		}))
		.collect()
}

type BoxStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl WorkerService for WorkerServiceImpl {
	type RunStream = BoxStream<RunResponse>;

	/// Read exactly one request off the stream, run the renderer, write
	/// exactly one response, close (§4.6).
	async fn run(&self, request: Request<Streaming<RunRequest>>) -> Result<Response<Self::RunStream>, Status> {
		let mut inbound = request.into_inner();
		let req = inbound
			.message()
			.await?
			.ok_or_else(|| Status::invalid_argument("Run requires exactly one request message"))?;

		let renderer = rfarm_proto::Renderer::try_from(req.renderer)
			.map_err(|_| Status::invalid_argument("unrecognized renderer value"))?;
		let files = scratch_files(&req.files)?;

		let (id, file_size, image_type) = rfarm_renderer::render(renderer, &files, &self.store, &self.renderer_config)
			.await
			.map_err(Status::from)?;

		let response = RunResponse {
			id: id.to_string(),
			file_size,
			image_type: image_type as i32,
		};

		let stream = tokio_stream::once(Ok(response));
		Ok(Response::new(Box::pin(stream)))
	}

	/// Decode every input, accumulate a weighted average, re-encode and
	/// register the result (§4.6, §4.7).
	async fn compose(&self, request: Request<ComposeRequest>) -> Result<Response<ComposeResponse>, Status> {
		let req = request.into_inner();

		let mut images = Vec::with_capacity(req.images.len());
		for image in &req.images {
			let id = parse_id(&image.id)?;
			let bytes = self
				.store
				.get(&id)
				.await
				.map_err(Status::from)?
				.ok_or_else(|| Status::not_found(format!("compose input {} is not in the store", id)))?;
			let image_type = rfarm_proto::ImageType::try_from(image.image_type)
				.map_err(|_| Status::invalid_argument("unrecognized image type"))?;
			images.push(WeightedImage {
				bytes: bytes.to_vec(),
				image_type,
				weight: image.weight,
			});
		}

		let output_type = rfarm_proto::ImageType::try_from(req.image_type)
			.map_err(|_| Status::invalid_argument("unrecognized output image type"))?;

		let composed = rfarm_compositor::compose(&images, output_type).map_err(Status::from)?;
		let (id, file_size) = self.store.put(Bytes::from(composed)).await.map_err(Status::from)?;

		Ok(Response::new(ComposeResponse {
			id: id.to_string(),
			file_size,
		}))
	}

	/// Pull `request.id` from `request.src_address` and verify its digest
	/// before accepting it into the local store (§4.6).
	async fn transfer(&self, request: Request<TransferRequest>) -> Result<Response<TransferResponse>, Status> {
		let req = request.into_inner();
		let wanted = parse_id(&req.id)?;

		let endpoint = format!("http://{}", req.src_address);
		let channel = tonic::transport::Endpoint::new(endpoint)
			.map_err(|e| Status::internal(format!("invalid peer address {:?}: {}", req.src_address, e)))?
			.connect()
			.await
			.map_err(|e| Status::internal(format!("could not reach peer {:?}: {}", req.src_address, e)))?;

		let mut client = WorkerServiceClient::new(channel);
		let mut inbound = client
			.get(GetRequest { id: req.id.clone() })
			.await?
			.into_inner();

		let mut buf = Vec::new();
		while let Some(chunk) = inbound.next().await {
			buf.extend_from_slice(&chunk?.content);
		}

		let (id, file_size) = self.store.put(Bytes::from(buf)).await.map_err(Status::from)?;
		if id != wanted {
			return Err(Status::from(Error::DataLoss(format!(
				"transfer of {} from {} produced a different digest {}",
				wanted, req.src_address, id
			))));
		}

		Ok(Response::new(TransferResponse { file_size }))
	}

	/// Concatenate the streamed chunks and `put` them as one blob (§4.6).
	async fn put(&self, request: Request<Streaming<PutRequest>>) -> Result<Response<PutResponse>, Status> {
		let mut inbound = request.into_inner();
		let mut buf = Vec::new();
		while let Some(chunk) = inbound.next().await {
			buf.extend_from_slice(&chunk?.content);
		}

		let (id, file_size) = self.store.put(Bytes::from(buf)).await.map_err(Status::from)?;
		Ok(Response::new(PutResponse {
			id: id.to_string(),
			file_size,
		}))
	}

	type GetStream = BoxStream<GetResponse>;

	/// Stream the blob's bytes back in fixed-size chunks (§4.1, §4.6).
	async fn get(&self, request: Request<GetRequest>) -> Result<Response<Self::GetStream>, Status> {
		let req = request.into_inner();
		let id = parse_id(&req.id)?;

		let bytes = self
			.store
			.get(&id)
			.await
			.map_err(Status::from)?
			.ok_or_else(|| Status::not_found(format!("{} is not in the store", id)))?;

		let chunks: Vec<Result<GetResponse, Status>> = rfarm_proto::chunk_bytes(&bytes)
			.into_iter()
			.map(|c| Ok(GetResponse { content: c }))
			.collect();

		Ok(Response::new(Box::pin(tokio_stream::iter(chunks))))
	}

	/// Absence is logged but is not itself an error (§4.6).
	async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteResponse>, Status> {
		let req = request.into_inner();
		let id = parse_id(&req.id)?;
		self.store.delete(&id).await.map_err(Status::from)?;
		Ok(Response::new(DeleteResponse {}))
	}
}
