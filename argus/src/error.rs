use derive_more::{Display, From};
use flume::RecvError;
use tokio::task::JoinError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum Error {
	EventSend(&'static str),
	EventRecv(RecvError),

	// -- Externals
	#[from]
	Manager(argus_core::ManagerError),
	#[from]
	Join(JoinError),
	#[from]
	Io(std::io::Error),
}

impl From<RecvError> for Error {
	fn from(err: RecvError) -> Self {
		Self::EventRecv(err)
	}
}

// region:    --- Error Boilerplate

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
