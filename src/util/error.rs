//! The error type shared across the workspace.
//!
//! Each variant corresponds to one of the error kinds of the wire protocol
//! (invalid argument, not found, capacity exhausted, not implemented, data
//! integrity, internal, cancelled). `rfarm_proto` maps each variant onto the
//! matching `tonic::Code`; this crate stays transport-agnostic.
use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error(display = "Invalid argument: {}", _0)]
	InvalidArgument(String),

	#[error(display = "Not found: {}", _0)]
	NotFound(String),

	#[error(display = "Resource exhausted: {}", _0)]
	ResourceExhausted(String),

	#[error(display = "Not implemented: {}", _0)]
	NotImplemented(String),

	#[error(display = "Data loss: {}", _0)]
	DataLoss(String),

	#[error(display = "Cancelled")]
	Cancelled,

	#[error(display = "Internal error: {}", _0)]
	Internal(String),

	#[error(display = "IO error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "{}", _0)]
	Message(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
	fn from(s: String) -> Error {
		Error::Message(s)
	}
}

impl From<&str> for Error {
	fn from(s: &str) -> Error {
		Error::Message(s.to_string())
	}
}

impl From<toml::de::Error> for Error {
	fn from(e: toml::de::Error) -> Error {
		Error::Message(format!("invalid configuration: {}", e))
	}
}

pub trait OkOrMessage<T> {
	fn ok_or_message<S: Into<String>>(self, msg: S) -> Result<T>;
}

impl<T> OkOrMessage<T> for Option<T> {
	fn ok_or_message<S: Into<String>>(self, msg: S) -> Result<T> {
		self.ok_or_else(|| Error::Internal(msg.into()))
	}
}
