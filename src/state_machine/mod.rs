mod record;
mod stage;

pub use record::JobRecord;
pub use stage::{Stage, StageError, check_transition};
