use argus_core::ProbeSnapshot;
use derive_more::From;

#[derive(From, Debug)]
pub enum AppEvent {
	#[from]
	Report(ProbeSnapshot),
}
