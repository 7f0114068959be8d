//! `rfarm_master` is the coordination layer between clients and the worker
//! fleet (§4.3–§4.5): which files live where, which worker to hand a job to,
//! and the `Dispatcher` RPC surface that ties placement, transfer and
//! locking together around a single `Render`/`UploadDirect` call.
#[macro_use]
extern crate tracing;

mod dispatcher;
mod eviction;
mod file_directory;
mod node_directory;

pub use dispatcher::Dispatcher;
pub use eviction::EvictionWorker;
pub use file_directory::FileDirectory;
pub use node_directory::{NodeDirectory, WorkerId};
