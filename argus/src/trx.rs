use crate::error::{Error, Result};

/// Named channel pair; the name shows up in send-side errors.
pub fn new_channel<T>(name: &'static str) -> (Tx<T>, Rx<T>) {
	let (tx, rx) = flume::unbounded();

	(Tx { tx, name }, Rx { rx })
}

pub struct Tx<T> {
	tx: flume::Sender<T>,
	name: &'static str,
}

impl<T> Tx<T> {
	pub async fn send(&self, value: impl Into<T>) -> Result<()> {
		self.tx
			.send_async(value.into())
			.await
			.map_err(|_| Error::EventSend(self.name))
	}
}

impl<T> Clone for Tx<T> {
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
			name: self.name,
		}
	}
}

pub struct Rx<T> {
	rx: flume::Receiver<T>,
}

impl<T> Rx<T> {
	pub async fn recv(&self) -> Result<T> {
		let res = self.rx.recv_async().await?;
		Ok(res)
	}
}

impl<T> Clone for Rx<T> {
	fn clone(&self) -> Self {
		Self { rx: self.rx.clone() }
	}
}
