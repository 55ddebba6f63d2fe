pub mod engine;
pub mod phase;
pub mod queue;
pub mod scheduler;
