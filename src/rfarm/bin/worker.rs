//! `worker` binary: loads a `WorkerConfig` and serves the `WorkerService` RPC
//! surface over a `WorkerFileStore` and the renderer adapters.
#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;

use rfarm::shutdown::{wait_from, watch_shutdown_signal};
use rfarm_block::WorkerFileStore;
use rfarm_proto::worker_service_server::WorkerServiceServer;
use rfarm_renderer::RendererConfig;
use rfarm_util::config::{read_config, WorkerConfig};
use rfarm_util::error::Error;
use rfarm_worker::WorkerServiceImpl;

#[derive(StructOpt, Debug)]
#[structopt(name = "worker")]
struct Opt {
	/// Configuration file
	#[structopt(short = "c", long = "config", default_value = "./worker.toml")]
	config_file: PathBuf,
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let opt = Opt::from_args();
	match run(opt.config_file).await {
		Ok(()) => std::process::exit(0),
		Err(e) => {
			error!("worker exited with error: {}", e);
			std::process::exit(1)
		}
	}
}

async fn run(config_file: PathBuf) -> Result<(), Error> {
	info!("loading worker configuration...");
	let config: WorkerConfig = read_config(config_file)?;

	let store = Arc::new(WorkerFileStore::new(config.tmpdir.clone(), config.inmem_threshold_bytes));
	let renderer_config = RendererConfig {
		pbrt_binary: config.pbrt_binary.clone(),
		pbrt_output_filename: config.pbrt_output_filename.clone(),
	};
	let service = WorkerServiceImpl::new(store, renderer_config);

	let watch_cancel = watch_shutdown_signal();

	info!("listening on {}", config.bind_addr);
	tonic::transport::Server::builder()
		.add_service(WorkerServiceServer::new(service))
		.serve_with_shutdown(config.bind_addr, wait_from(watch_cancel))
		.await
		.map_err(|e| Error::Internal(format!("could not bind {}: {}", config.bind_addr, e)))?;

	info!("clean shutdown.");
	Ok(())
}
