//! Configuration file formats for the `master` and `worker` binaries.
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

/// Configuration for the master (dispatcher) process.
#[derive(Deserialize, Debug, Clone)]
pub struct MasterConfig {
	/// Address to bind the dispatcher gRPC server on.
	#[serde(default = "default_master_bind_addr")]
	pub bind_addr: SocketAddr,

	/// Comma-separated list of worker addresses, e.g. "127.0.0.1:50052,127.0.0.1:50053"
	#[serde(default)]
	pub workers: String,

	/// Time-to-live given to a newly-registered file, in seconds.
	#[serde(default = "default_ttl_secs")]
	pub default_ttl_secs: u64,

	/// Interval between eviction cycles, in seconds.
	#[serde(default = "default_eviction_interval_secs")]
	pub eviction_interval_secs: u64,
}

/// Configuration for a worker process.
#[derive(Deserialize, Debug, Clone)]
pub struct WorkerConfig {
	/// Address to bind the worker gRPC server on.
	#[serde(default = "default_worker_bind_addr")]
	pub bind_addr: SocketAddr,

	/// Directory used to store on-disk blobs and scratch directories.
	#[serde(default = "default_tmpdir")]
	pub tmpdir: PathBuf,

	/// Blobs of this size or smaller are kept resident in memory; larger
	/// blobs spill to `<tmpdir>/<id>`.
	#[serde(default = "default_inmem_threshold")]
	pub inmem_threshold_bytes: usize,

	/// Path to the external PBRT-compatible renderer binary.
	#[serde(default = "default_pbrt_binary")]
	pub pbrt_binary: PathBuf,

	/// Name of the output file the renderer is expected to write into its
	/// scratch directory.
	#[serde(default = "default_pbrt_output_filename")]
	pub pbrt_output_filename: String,
}

fn default_master_bind_addr() -> SocketAddr {
	"0.0.0.0:50051".parse().unwrap()
}

fn default_worker_bind_addr() -> SocketAddr {
	"0.0.0.0:50052".parse().unwrap()
}

fn default_ttl_secs() -> u64 {
	3600
}

fn default_eviction_interval_secs() -> u64 {
	60
}

fn default_tmpdir() -> PathBuf {
	PathBuf::from("/tmp")
}

fn default_inmem_threshold() -> usize {
	1024 * 1024
}

fn default_pbrt_binary() -> PathBuf {
	PathBuf::from("pbrt")
}

fn default_pbrt_output_filename() -> String {
	"buddha.exr".to_string()
}

impl Default for MasterConfig {
	fn default() -> Self {
		MasterConfig {
			bind_addr: default_master_bind_addr(),
			workers: String::new(),
			default_ttl_secs: default_ttl_secs(),
			eviction_interval_secs: default_eviction_interval_secs(),
		}
	}
}

impl Default for WorkerConfig {
	fn default() -> Self {
		WorkerConfig {
			bind_addr: default_worker_bind_addr(),
			tmpdir: default_tmpdir(),
			inmem_threshold_bytes: default_inmem_threshold(),
			pbrt_binary: default_pbrt_binary(),
			pbrt_output_filename: default_pbrt_output_filename(),
		}
	}
}

/// Read and parse a TOML configuration file.
pub fn read_config<T: serde::de::DeserializeOwned>(config_file: PathBuf) -> Result<T, Error> {
	let mut file = std::fs::OpenOptions::new()
		.read(true)
		.open(config_file.as_path())?;

	let mut config = String::new();
	file.read_to_string(&mut config)?;

	Ok(toml::from_str(&config)?)
}
