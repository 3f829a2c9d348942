mod engine;

pub use engine::{Pipeline, RunOutcome};
