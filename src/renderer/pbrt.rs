//! PBRT: launches an external path-tracer binary in a scratch directory
//! whose symlinks satisfy the scene's relative-path references (§4.2).
use tokio::process::Command;

use rfarm_block::{ScratchFile, WorkerFileStore};
use rfarm_proto::ImageType;
use rfarm_util::data::FileId;
use rfarm_util::error::Error;

use crate::RendererConfig;

pub async fn render(
	files: &[ScratchFile],
	store: &WorkerFileStore,
	config: &RendererConfig,
) -> Result<(FileId, u64, ImageType), Error> {
	if files.is_empty() {
		return Err(Error::InvalidArgument(
			"PBRT requires at least one scene input file".to_string(),
		));
	}

	let scratch = store.create_scratch_dir(files).await?;

	// The scene file is the first input the caller listed; PBRT is invoked
	// with it as a relative path so scene-internal references resolve
	// against the other symlinks in the same scratch directory.
	let scene_alias = &files[0].alias;

	let result = run_pbrt(&scratch, scene_alias, config).await;

	let outcome = match result {
		Ok(()) => store.retain(&scratch, &config.pbrt_output_filename).await,
		Err(e) => Err(e),
	};

	// The scratch dir is per-job working state; clean it up regardless of
	// how the render went.
	let _ = store.remove_scratch_dir(&scratch).await;

	let (id, size) = outcome?;
	Ok((id, size, ImageType::Exr))
}

async fn run_pbrt(scratch: &std::path::Path, scene_alias: &str, config: &crate::RendererConfig) -> Result<(), Error> {
	// Spawn with an explicit working directory rather than a process-wide
	// chdir, so concurrent Runs on this worker don't race on cwd (§9).
	let output = Command::new(&config.pbrt_binary)
		.arg(scene_alias)
		.current_dir(scratch)
		.output()
		.await
		.map_err(|e| Error::Internal(format!("failed to launch {:?}: {}", config.pbrt_binary, e)))?;

	if !output.status.success() {
		return Err(Error::Internal(format!(
			"{:?} exited with {}: {}",
			config.pbrt_binary,
			output.status,
			String::from_utf8_lossy(&output.stderr)
		)));
	}

	Ok(())
}
