mod driver;
mod session;

pub use driver::{spawn, ModelHandle};
pub use session::{Checkpoint, ElapsedSnapshot, FlushOutcome, Model, ModelSettings};
