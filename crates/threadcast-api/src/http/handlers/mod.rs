//! HTTP handlers grouped by resource.

pub mod health;
pub mod license;
pub mod run;
pub mod status;
pub mod ws;
