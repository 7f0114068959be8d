//! `rfarm_block` is the per-worker content-addressed blob store: small blobs
//! live in memory, larger ones spill to `<tmpdir>/<id>`, and renderer inputs
//! are exposed through scratch directories of alias symlinks.
#[macro_use]
extern crate tracing;

mod manager;

pub use manager::{ScratchFile, WorkerFileStore};
