//! `rfarm_worker` implements the RPC surface exposed by every render worker
//! (§4.6): `Run`, `Compose`, `Transfer`, `Put`, `Get`, `Delete`. All of it is
//! stateless glue routing requests to `rfarm_block::WorkerFileStore` and
//! `rfarm_renderer::render`; the only state carried here is a handle to the
//! store and the renderer configuration.
#[macro_use]
extern crate tracing;

mod service;

pub use service::WorkerServiceImpl;
