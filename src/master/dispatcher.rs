use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use futures::Stream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};

use rfarm_proto::dispatcher_server::Dispatcher as DispatcherTrait;
use rfarm_proto::{
	FileRef, GetRequest, ImageType, PutRequest, RenderRequest, RenderResponse, RunRequest, TransferRequest,
	UploadDirectRequest, UploadResponse,
};
use rfarm_util::data::FileId;
use rfarm_util::error::Error;

use crate::file_directory::FileDirectory;
use crate::node_directory::{NodeDirectory, WorkerId};

/// The master's client-facing RPC surface (§4.5): selects a worker, fills in
/// missing inputs via peer transfer, locks, runs, registers the output, and
/// always unlocks on the way out.
pub struct Dispatcher {
	nodes: Arc<NodeDirectory>,
	files: Arc<FileDirectory>,
}

impl Dispatcher {
	pub fn new(nodes: Arc<NodeDirectory>, files: Arc<FileDirectory>) -> Self {
		Dispatcher { nodes, files }
	}

	async fn render_impl(&self, req: RenderRequest) -> Result<(Vec<u8>, ImageType), Error> {
		let ids: Vec<FileId> = req
			.files
			.iter()
			.map(|f| FileId::from_str(&f.id))
			.collect::<Result<_, _>>()?;

		let candidates = self.nodes.worker_ids().await;
		let w = self
			.files
			.get_empty_worker(&candidates, &ids)
			.ok_or_else(|| Error::ResourceExhausted("no live worker is registered".to_string()))?;

		for id in &ids {
			if !self.files.is_file_alive(id) {
				return Err(Error::NotFound(format!(
					"input file {} is not known to the master or has expired",
					id
				)));
			}
		}

		let missing = self.files.list_missing_files(w, &ids);
		let mut transferred = Vec::new();
		for m in &missing {
			let src = self
				.files
				.get_worker_with_file(m)
				.ok_or_else(|| Error::DataLoss(format!("file {} is alive but has no holders", m)))?;
			let src_address = self.nodes.get_worker_address(src).await?;

			let mut client = self.nodes.get_worker_client(w).await?;
			match client
				.transfer(TransferRequest {
					id: m.to_string(),
					src_address,
				})
				.await
			{
				Ok(resp) => {
					self.files.notify_file_put(*m, resp.into_inner().file_size, w, true);
					transferred.push(*m);
				}
				Err(status) => {
					self.files.unlock_files(&transferred, w);
					return Err(Error::from(status));
				}
			}
		}

		if !self.files.lock_files(&ids, w)? {
			self.files.unlock_files(&ids, w);
			return Err(Error::Internal(format!(
				"worker {} is missing an input file right after it was transferred to it",
				w
			)));
		}

		let result = self.run_and_fetch(w, req.renderer, &req.files).await;
		self.files.unlock_files(&ids, w);
		result
	}

	async fn run_and_fetch(&self, w: WorkerId, renderer: i32, files: &[FileRef]) -> Result<(Vec<u8>, ImageType), Error> {
		let mut run_client = self.nodes.get_worker_client(w).await?;
		let run_request = RunRequest {
			renderer,
			files: files.to_vec(),
		};
		let mut inbound = run_client
			.run(tokio_stream::once(run_request))
			.await
			.map_err(Error::from)?
			.into_inner();

		let run_response = inbound
			.message()
			.await
			.map_err(Error::from)?
			.ok_or_else(|| Error::Internal(format!("worker {} closed Run without a response", w)))?;

		let output_id = FileId::from_str(&run_response.id)?;
		self.files.notify_file_put(output_id, run_response.file_size, w, false);

		let mut get_client = self.nodes.get_worker_client(w).await?;
		let mut get_stream = get_client
			.get(GetRequest {
				id: run_response.id.clone(),
			})
			.await
			.map_err(Error::from)?
			.into_inner();

		let mut payload = Vec::new();
		while let Some(chunk) = get_stream.next().await {
			payload.extend_from_slice(&chunk.map_err(Error::from)?.content);
		}

		let image_type = ImageType::try_from(run_response.image_type)
			.map_err(|_| Error::Internal("worker returned an unrecognized image type".to_string()))?;
		Ok((payload, image_type))
	}

	async fn upload_direct_impl(&self, content: Vec<u8>) -> Result<UploadResponse, Error> {
		let candidates = self.nodes.worker_ids().await;
		let w = self
			.files
			.get_empty_worker(&candidates, &[])
			.ok_or_else(|| Error::ResourceExhausted("no live worker is registered".to_string()))?;

		let mut client = self.nodes.get_worker_client(w).await?;
		let response = client
			.put(tokio_stream::once(PutRequest { content }))
			.await
			.map_err(Error::from)?
			.into_inner();

		let id = FileId::from_str(&response.id)?;
		self.files.notify_file_put(id, response.file_size, w, false);

		Ok(UploadResponse { id: response.id })
	}
}

type BoxStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl DispatcherTrait for Dispatcher {
	async fn render(&self, request: Request<RenderRequest>) -> Result<Response<RenderResponse>, Status> {
		let (image, image_type) = self.render_impl(request.into_inner()).await.map_err(Status::from)?;
		Ok(Response::new(RenderResponse {
			image,
			image_type: image_type as i32,
		}))
	}

	async fn upload_direct(&self, request: Request<UploadDirectRequest>) -> Result<Response<UploadResponse>, Status> {
		let response = self
			.upload_direct_impl(request.into_inner().content)
			.await
			.map_err(Status::from)?;
		Ok(Response::new(response))
	}

	type RenderStreamStream = BoxStream<RenderResponse>;

	/// Declared for wire compatibility with the original streaming variant;
	/// never implemented (§3 supplement).
	async fn render_stream(
		&self,
		_request: Request<Streaming<RenderRequest>>,
	) -> Result<Response<Self::RenderStreamStream>, Status> {
		Err(Status::unimplemented("RenderStream is not implemented"))
	}

	/// Declared for wire compatibility with the original streaming variant;
	/// never implemented (§3 supplement).
	async fn upload_direct_stream(
		&self,
		_request: Request<Streaming<UploadDirectRequest>>,
	) -> Result<Response<UploadResponse>, Status> {
		Err(Status::unimplemented("UploadDirectStream is not implemented"))
	}
}
