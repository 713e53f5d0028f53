pub mod checkpoint;
pub mod delay;
pub mod guardian;
pub mod orchestrator;
pub mod target;
