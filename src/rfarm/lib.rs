//! Shared glue between the `master` and `worker` binaries: just the
//! shutdown-signal plumbing, since everything else that differs between the
//! two processes lives in `rfarm_master`/`rfarm_worker`.
#[macro_use]
extern crate tracing;

pub mod shutdown;
