mod driver;
mod snapshot;

pub use driver::*;
pub use snapshot::*;
