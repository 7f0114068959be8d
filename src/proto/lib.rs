//! Generated protobuf/gRPC types for the master/worker wire protocol, plus
//! the glue between `rfarm_util::error::Error` and `tonic::Status`.
pub mod rfarm {
	tonic::include_proto!("rfarm");
}

pub use rfarm::*;

use rfarm_util::error::Error;

/// Natural chunk size for streamed `Get`/`Put` payloads (§4.1: "a streaming
/// variant chunks at a natural block size (e.g., 64 KiB)").
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Map the workspace's error kinds onto the exact `tonic::Code`s named in
/// spec §7. This is the single place that encodes that mapping.
impl From<Error> for tonic::Status {
	fn from(e: Error) -> tonic::Status {
		match e {
			Error::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
			Error::NotFound(msg) => tonic::Status::not_found(msg),
			Error::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
			Error::NotImplemented(msg) => tonic::Status::unimplemented(msg),
			Error::DataLoss(msg) => tonic::Status::data_loss(msg),
			Error::Cancelled => tonic::Status::cancelled("cancelled"),
			Error::Internal(msg) => tonic::Status::internal(msg),
			Error::Io(io_err) => tonic::Status::internal(io_err.to_string()),
			Error::Message(msg) => tonic::Status::internal(msg),
		}
	}
}

/// The master re-throws a worker's RPC failure as its own `Error` (e.g. to
/// fold it into the unlock-then-propagate path of `Dispatcher::Render`).
/// This is the mirror of `From<Error> for Status` above; `Status::message()`
/// is preserved, but a round trip through both conversions does not
/// reproduce the exact original `Error` variant for `Io`/`Message`, which
/// both collapse to `Internal` on the way back.
impl From<tonic::Status> for Error {
	fn from(s: tonic::Status) -> Error {
		let msg = s.message().to_string();
		match s.code() {
			tonic::Code::InvalidArgument => Error::InvalidArgument(msg),
			tonic::Code::NotFound => Error::NotFound(msg),
			tonic::Code::ResourceExhausted => Error::ResourceExhausted(msg),
			tonic::Code::Unimplemented => Error::NotImplemented(msg),
			tonic::Code::DataLoss => Error::DataLoss(msg),
			tonic::Code::Cancelled => Error::Cancelled,
			_ => Error::Internal(msg),
		}
	}
}

/// Split a byte buffer into chunks of at most `STREAM_CHUNK_SIZE` bytes, in
/// order, for use as the body of a streamed RPC response.
pub fn chunk_bytes(bytes: &[u8]) -> Vec<Vec<u8>> {
	if bytes.is_empty() {
		return vec![Vec::new()];
	}
	bytes.chunks(STREAM_CHUNK_SIZE).map(|c| c.to_vec()).collect()
}
