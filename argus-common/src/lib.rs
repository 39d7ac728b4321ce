// region:    --- Modules

mod event;

pub use event::*;

// endregion: --- Modules
