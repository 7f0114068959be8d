//! Content-addressed file identifiers.
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// A lowercase hex-encoded SHA-256 digest of a file's byte content.
///
/// Two `FileId`s are equal iff the content they were computed from is
/// byte-identical (I1 in the data model: content-addressed).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId([u8; 32]);

impl FileId {
	/// Compute the content ID of a byte slice.
	pub fn of(bytes: &[u8]) -> Self {
		let digest = Sha256::digest(bytes);
		let mut out = [0u8; 32];
		out.copy_from_slice(&digest);
		FileId(out)
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}
}

impl fmt::Display for FileId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", hex::encode(self.0))
	}
}

impl fmt::Debug for FileId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "FileId({})", self)
	}
}

impl FromStr for FileId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		if s.len() != 64 {
			return Err(Error::InvalidArgument(format!(
				"file id must be 64 hex characters, got {}",
				s.len()
			)));
		}
		let decoded = hex::decode(s)
			.map_err(|e| Error::InvalidArgument(format!("invalid file id: {}", e)))?;
		let mut out = [0u8; 32];
		out.copy_from_slice(&decoded);
		Ok(FileId(out))
	}
}

impl TryFrom<&str> for FileId {
	type Error = Error;
	fn try_from(s: &str) -> Result<Self, Error> {
		s.parse()
	}
}
