//! `master` binary: loads a `MasterConfig`, registers the worker fleet,
//! starts the eviction cycle, and serves the `Dispatcher` RPC surface.
#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;

use rfarm::shutdown::{wait_from, watch_shutdown_signal};
use rfarm_master::{Dispatcher, EvictionWorker, FileDirectory, NodeDirectory};
use rfarm_proto::dispatcher_server::DispatcherServer;
use rfarm_util::background::BackgroundRunner;
use rfarm_util::config::{read_config, MasterConfig};
use rfarm_util::error::Error;

#[derive(StructOpt, Debug)]
#[structopt(name = "master")]
struct Opt {
	/// Configuration file
	#[structopt(short = "c", long = "config", default_value = "./master.toml")]
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
			error!("master exited with error: {}", e);
			std::process::exit(1)
		}
	}
}

async fn run(config_file: PathBuf) -> Result<(), Error> {
	info!("loading master configuration...");
	let config: MasterConfig = read_config(config_file)?;

	let nodes = Arc::new(NodeDirectory::new());
	let worker_ids = nodes.add_workers_from_string(&config.workers).await?;
	info!("registered {} worker(s)", worker_ids.len());

	let files = Arc::new(FileDirectory::new(config.default_ttl_secs));

	let watch_cancel = watch_shutdown_signal();
	let (background, await_background_done) = BackgroundRunner::new(1, watch_cancel.clone());
	background.spawn_worker(EvictionWorker::new(
		nodes.clone(),
		files.clone(),
		Duration::from_secs(config.eviction_interval_secs),
	));

	let dispatcher = Dispatcher::new(nodes, files);

	info!("listening on {}", config.bind_addr);
	tonic::transport::Server::builder()
		.add_service(DispatcherServer::new(dispatcher))
		.serve_with_shutdown(config.bind_addr, wait_from(watch_cancel.clone()))
		.await
		.map_err(|e| Error::Internal(format!("could not bind {}: {}", config.bind_addr, e)))?;

	await_background_done.await.map_err(|e| Error::Internal(e.to_string()))?;
	info!("clean shutdown.");
	Ok(())
}
