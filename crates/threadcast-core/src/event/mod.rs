//! Event distribution for posting progress and lifecycle.

pub mod bus;
