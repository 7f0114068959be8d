//! `rfarm_renderer` encapsulates the renderer kinds the system recognizes
//! (§4.2). Each kind is a pure-ish function from (scratch inputs, store) to
//! an encoded output blob registered back into the store; adding a renderer
//! means adding a variant here, not touching the dispatcher.
#[macro_use]
extern crate tracing;

mod aobench;
mod pbrt;

use std::path::PathBuf;

use rfarm_block::{ScratchFile, WorkerFileStore};
use rfarm_proto::{ImageType, Renderer};
use rfarm_util::data::FileId;
use rfarm_util::error::Error;

/// Adapter-specific configuration, taken from `WorkerConfig`.
#[derive(Debug, Clone)]
pub struct RendererConfig {
	pub pbrt_binary: PathBuf,
	pub pbrt_output_filename: String,
}

/// Render `kind` using `files` as scratch-directory inputs, and register the
/// result in `store`. Any kind outside {AOBENCH, PBRT} is `NotImplemented`.
pub async fn render(
	kind: Renderer,
	files: &[ScratchFile],
	store: &WorkerFileStore,
	config: &RendererConfig,
) -> Result<(FileId, u64, ImageType), Error> {
	match kind {
		Renderer::Aobench => aobench::render(store).await,
		Renderer::Pbrt => pbrt::render(files, store, config).await,
		Renderer::RendererUnspecified => Err(Error::NotImplemented(
			"no renderer kind was specified".to_string(),
		)),
	}
}
