use derive_more::Display;

use crate::backend::BackendRejection;

/// Result alias for [`crate::ProbeManager`] operations.
pub type Result<T> = core::result::Result<T, ManagerError>;

#[derive(Debug, Display, PartialEq, Eq)]
pub enum AttachError {
	#[display("backend rejected registration: {_0}")]
	BackendRejected(BackendRejection),
	#[display("probe is already attached")]
	AlreadyAttached,
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum ManagerError {
	#[display("probe id {_0} is already registered")]
	DuplicateId(u32),
	#[display("no probe with id {_0}")]
	NotFound(u32),
	#[display("probe {id} failed to attach: {source}")]
	Attach { id: u32, source: AttachError },
}

// region:    --- Error Boilerplate

impl std::error::Error for AttachError {}

impl std::error::Error for ManagerError {}

// endregion: --- Error Boilerplate
